//! aotrace agent - loaded into a JVM to record dynamic-lookup API usage.
//!
//! This library is compiled as a cdylib and loaded via
//! `-agentpath:libaotrace_agent.so=<options>`. It installs breakpoints on
//! the reflection, resource, proxy, method-handle, and serialization entry
//! points, re-invokes intercepted calls to observe their outcome, and
//! appends one JSON record per observed call for the offline image
//! builder.

pub mod breakpoints;
pub mod config;
pub mod constant_pool;
pub mod defineclass;
pub mod handles;
pub mod support;

use std::collections::{HashMap, HashSet};
use std::ffi::CStr;
use std::os::raw::{c_char, c_void};
use std::ptr;
use std::sync::{Mutex, OnceLock, RwLock};

use anyhow::{anyhow, Context as _, Result};
use log::{error, info};

use aotrace_jvmti::sys::jni::{jint, jthread, JavaVM, JNIEnv, JNI_ERR, JNI_OK};
use aotrace_jvmti::sys::jvmti::{
    jvmtiEnv, jvmtiEventCallbacks, JVMTI_EVENT_BREAKPOINT, JVMTI_EVENT_CLASS_FILE_LOAD_HOOK,
    JVMTI_EVENT_CLASS_PREPARE, JVMTI_EVENT_NATIVE_METHOD_BIND, JVMTI_EVENT_VM_DEATH,
    JVMTI_EVENT_VM_INIT, JVMTI_JLOCATION_JVMBCI,
};
use aotrace_jvmti::{GlobalRef, JniEnv, Jvmti};
use aotrace_protocol::{TraceSink, TraceWriter};

use breakpoints::{loadclass, native, Breakpoint, MethodKey, MethodLocation};
use config::AgentOptions;
use handles::Handles;

/// Process-wide agent state. Event entry points have no user-data
/// parameter, so they recover this through [`context`].
pub struct AgentContext {
    jvmti: Jvmti,
    sink: Box<dyn TraceSink>,
    options: AgentOptions,
    /// Resolved at VM init, when JNI is fully functional.
    handles: OnceLock<Handles>,
    /// Installed breakpoints by method identity. Insert-only during
    /// install; classloader discovery adds entries concurrently later.
    pub(crate) breakpoints: RwLock<HashMap<MethodKey, Breakpoint>>,
    pub(crate) native: Mutex<native::NativeState>,
    /// Call sites already classified as explicit loadClass invocations.
    pub(crate) explicit_load_class_sites: Mutex<HashSet<MethodLocation>>,
    /// Class references pinned for installed breakpoints, released at VM
    /// death.
    tracked_refs: Mutex<Vec<GlobalRef>>,
}

static CONTEXT: OnceLock<AgentContext> = OnceLock::new();

pub fn context() -> Option<&'static AgentContext> {
    CONTEXT.get()
}

impl AgentContext {
    pub fn jvmti(&self) -> &Jvmti {
        &self.jvmti
    }

    pub fn sink(&self) -> &dyn TraceSink {
        self.sink.as_ref()
    }

    pub fn options(&self) -> &AgentOptions {
        &self.options
    }

    pub fn handles(&self) -> &Handles {
        match self.handles.get() {
            Some(handles) => handles,
            None => crate::fatal!("runtime handles accessed before VM init"),
        }
    }

    /// True once VM init completed and handlers may run.
    pub fn is_live(&self) -> bool {
        self.handles.get().is_some()
    }

    pub(crate) fn track(&self, global: GlobalRef) {
        self.tracked_refs
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(global);
    }

    pub(crate) fn drain_tracked(&self) -> Vec<GlobalRef> {
        std::mem::take(&mut *self.tracked_refs.lock().unwrap_or_else(|e| e.into_inner()))
    }
}

fn print_usage() {
    eprintln!("usage: -agentpath:libaotrace_agent.so=<option>,...");
    eprintln!("  trace-output=<path>                trace file location (default: aotrace-trace.json)");
    eprintln!("  experimental-class-loader-support  instrument loadClass in classloader subclasses");
    eprintln!("  help                               print this message and run without tracing");
}

fn on_load(vm: *mut JavaVM, options_str: &str) -> Result<()> {
    let options = AgentOptions::parse(options_str)?;
    if options.help {
        print_usage();
        return Ok(());
    }
    let sink = TraceWriter::create(&options.trace_output).with_context(|| {
        format!("cannot create trace output {}", options.trace_output.display())
    })?;
    let jvmti =
        Jvmti::from_vm(vm).map_err(|rc| anyhow!("acquiring JVMTI environment failed: {rc}"))?;

    let mut caps = jvmti.get_capabilities()?;
    caps.set_can_generate_breakpoint_events(true);
    caps.set_can_access_local_variables(true);
    caps.set_can_generate_native_method_bind_events(true);
    caps.set_can_generate_all_class_hook_events(true);
    if options.class_loader_support {
        caps.set_can_get_bytecodes(true);
        caps.set_can_get_constant_pool(true);
    }
    jvmti.add_capabilities(&caps)?;

    if options.class_loader_support && jvmti.get_jlocation_format()? != JVMTI_JLOCATION_JVMBCI {
        return Err(anyhow!(
            "host reports non-bytecode-index locations; cannot classify call sites"
        ));
    }

    let mut callbacks = jvmtiEventCallbacks::default();
    callbacks.VMInit = Some(on_vm_init);
    callbacks.VMDeath = Some(on_vm_death);
    callbacks.Breakpoint = Some(breakpoints::on_breakpoint);
    callbacks.NativeMethodBind = Some(native::on_native_method_bind);
    callbacks.ClassFileLoadHook = Some(defineclass::on_class_file_load_hook);
    if options.class_loader_support {
        callbacks.ClassPrepare = Some(loadclass::on_class_prepare);
    }
    jvmti.set_event_callbacks(&callbacks)?;

    let trace_output = options.trace_output.clone();
    CONTEXT
        .set(AgentContext {
            jvmti,
            sink: Box::new(sink),
            options,
            handles: OnceLock::new(),
            breakpoints: RwLock::new(HashMap::new()),
            native: Mutex::new(native::NativeState::new()),
            explicit_load_class_sites: Mutex::new(HashSet::new()),
            tracked_refs: Mutex::new(Vec::new()),
        })
        .map_err(|_| anyhow!("agent loaded twice"))?;

    // Native binds must be observed from the very beginning; breakpoint
    // events stay off until installation completes at VM init.
    jvmti.set_event_notification_mode(true, JVMTI_EVENT_VM_INIT, ptr::null_mut())?;
    jvmti.set_event_notification_mode(true, JVMTI_EVENT_VM_DEATH, ptr::null_mut())?;
    jvmti.set_event_notification_mode(true, JVMTI_EVENT_NATIVE_METHOD_BIND, ptr::null_mut())?;
    jvmti.set_event_notification_mode(true, JVMTI_EVENT_CLASS_FILE_LOAD_HOOK, ptr::null_mut())?;

    info!("aotrace agent loaded, tracing to {}", trace_output.display());
    Ok(())
}

/// Agent entry point, called by the JVM when the library is loaded.
///
/// # Safety
/// Called by the JVM with a valid VM pointer and a NUL-terminated options
/// string (or null).
#[no_mangle]
pub unsafe extern "system" fn Agent_OnLoad(
    vm: *mut JavaVM,
    options: *mut c_char,
    _reserved: *mut c_void,
) -> jint {
    let _ = env_logger::try_init();
    let options_str = if options.is_null() {
        ""
    } else {
        CStr::from_ptr(options).to_str().unwrap_or("")
    };
    match on_load(vm, options_str) {
        Ok(()) => JNI_OK,
        Err(e) => {
            error!("agent load failed: {:#}", e);
            JNI_ERR
        }
    }
}

/// # Safety
/// Called by the JVM during shutdown.
#[no_mangle]
pub unsafe extern "system" fn Agent_OnUnload(_vm: *mut JavaVM) {
    if let Some(ctx) = context() {
        ctx.sink().flush();
    }
}

unsafe extern "system" fn on_vm_init(_jvmti: *mut jvmtiEnv, jni: *mut JNIEnv, _thread: jthread) {
    let Some(ctx) = context() else {
        return;
    };
    let env = JniEnv::from_raw(jni);
    if ctx.handles.set(Handles::resolve(&env)).is_err() {
        crate::fatal!("VM init delivered twice");
    }

    breakpoints::install(ctx, &env);

    let jvmti = ctx.jvmti();
    if let Err(e) = jvmti.set_event_notification_mode(true, JVMTI_EVENT_BREAKPOINT, ptr::null_mut())
    {
        crate::fatal!("enabling breakpoint events failed: {}", e);
    }
    if ctx.options().class_loader_support {
        if let Err(e) =
            jvmti.set_event_notification_mode(true, JVMTI_EVENT_CLASS_PREPARE, ptr::null_mut())
        {
            crate::fatal!("enabling class-prepare events failed: {}", e);
        }
    }
    let installed = ctx
        .breakpoints
        .read()
        .unwrap_or_else(|e| e.into_inner())
        .len();
    info!("{} breakpoints installed", installed);
}

unsafe extern "system" fn on_vm_death(_jvmti: *mut jvmtiEnv, jni: *mut JNIEnv) {
    let Some(ctx) = context() else {
        return;
    };
    let env = JniEnv::from_raw(jni);
    breakpoints::uninstall(ctx, &env);
    if let Some(handles) = ctx.handles.get() {
        handles.release(&env);
    }
    ctx.sink().flush();
    info!("trace output flushed");
}
