//! Interception of `native` methods.
//!
//! The host's breakpoint facility does not cover native methods, so these
//! are hooked by substituting the entry point the runtime would call. The
//! original entry is remembered and invoked from our replacement.
//!
//! Binding events can arrive before installation completes; those entries
//! are parked in a pending map and picked up during install. One mutex
//! guards both maps because registering our replacement re-raises a
//! binding event for the same method.

use std::collections::HashMap;
use std::ffi::CString;
use std::fmt;
use std::os::raw::c_void;
use std::ptr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use aotrace_jvmti::sys::jni::{jlong, jmethodID, jobject, jthread, JNIEnv, JNINativeMethod};
use aotrace_jvmti::sys::jvmti::jvmtiEnv;
use aotrace_jvmti::{GlobalRef, JniEnv};
use log::debug;

use super::handlers::{field_name_and_declaring, verify_and_trace_object_field_offset};
use super::{in_handler, MethodKey, SuppressGuard};
use crate::fatal;
use crate::support::{caller_frame, direct_caller_class};
use crate::AgentContext;

pub type NativeEntryFn =
    unsafe extern "system" fn(jni: *mut JNIEnv, receiver: jobject, arg: jobject) -> jlong;

pub struct NativeBreakpointSpec {
    pub class_name: &'static str,
    pub method_name: &'static str,
    pub signature: &'static str,
    pub replacement: NativeEntryFn,
    /// Each spec is installed at most once.
    installed: AtomicBool,
    /// Original entry point; zero until the first binding event, then
    /// effectively read-only.
    original: AtomicUsize,
}

impl NativeBreakpointSpec {
    fn original_entry(&self) -> Option<NativeEntryFn> {
        let entry = self.original.load(Ordering::Acquire);
        if entry == 0 {
            None
        } else {
            Some(unsafe { std::mem::transmute::<usize, NativeEntryFn>(entry) })
        }
    }
}

impl fmt::Display for NativeBreakpointSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}{}", self.class_name, self.method_name, self.signature)
    }
}

/// The JDK 8 `sun.misc.Unsafe.objectFieldOffset` is itself native; later
/// JDKs wrap the native variant in plain Java methods covered by regular
/// breakpoints.
pub static OBJECT_FIELD_OFFSET_SPEC: NativeBreakpointSpec = NativeBreakpointSpec {
    class_name: "sun/misc/Unsafe",
    method_name: "objectFieldOffset",
    signature: "(Ljava/lang/reflect/Field;)J",
    replacement: native_object_field_offset,
    installed: AtomicBool::new(false),
    original: AtomicUsize::new(0),
};

pub static NATIVE_BREAKPOINT_SPECS: &[&NativeBreakpointSpec] = &[&OBJECT_FIELD_OFFSET_SPEC];

#[derive(Clone, Copy)]
pub struct NativeBreakpoint {
    pub spec: &'static NativeBreakpointSpec,
    pub clazz: GlobalRef,
    pub method: MethodKey,
}

pub struct NativeState {
    /// Resolved native breakpoints; `None` until installation completes.
    installed: Option<HashMap<MethodKey, NativeBreakpoint>>,
    /// Original entries observed before (or without) a matching breakpoint.
    pending: HashMap<MethodKey, usize>,
}

impl NativeState {
    pub fn new() -> Self {
        Self {
            installed: None,
            pending: HashMap::new(),
        }
    }
}

impl Default for NativeState {
    fn default() -> Self {
        Self::new()
    }
}

/// Native-method-bind event entry.
pub(crate) unsafe extern "system" fn on_native_method_bind(
    _jvmti: *mut jvmtiEnv,
    jni: *mut JNIEnv,
    _thread: jthread,
    method: jmethodID,
    address: *mut c_void,
    new_address_ptr: *mut *mut c_void,
) {
    if in_handler() {
        return;
    }
    let Some(ctx) = crate::context() else {
        return;
    };
    let env = JniEnv::from_raw(jni);
    let key = method as MethodKey;
    let mut state = ctx.native.lock().unwrap_or_else(|e| e.into_inner());
    match state.installed.as_ref().and_then(|map| map.get(&key).copied()) {
        Some(bp) => bind_native_breakpoint(&env, &bp, address as usize, new_address_ptr),
        None => {
            state.pending.insert(key, address as usize);
        }
    }
}

/// Remembers the original entry and substitutes ours, either through the
/// event's new-address slot or by explicit re-registration.
fn bind_native_breakpoint(
    env: &JniEnv,
    bp: &NativeBreakpoint,
    original: usize,
    new_address_ptr: *mut *mut c_void,
) {
    if bp
        .spec
        .original
        .compare_exchange(0, original, Ordering::AcqRel, Ordering::Acquire)
        .is_err()
    {
        debug!("original entry for {} already recorded", bp.spec);
    }
    if !new_address_ptr.is_null() {
        unsafe {
            *new_address_ptr = bp.spec.replacement as *mut c_void;
        }
    } else {
        // Registration raises a bind event for our own entry; suppress it.
        let _suppress = SuppressGuard::new();
        let name = CString::new(bp.spec.method_name).expect("static name");
        let signature = CString::new(bp.spec.signature).expect("static signature");
        let method = JNINativeMethod {
            name: name.as_ptr(),
            signature: signature.as_ptr(),
            fnPtr: bp.spec.replacement as *mut c_void,
        };
        if let Err(rc) = env.register_natives(bp.clazz_raw(), &[method]) {
            fatal!("re-registering {} failed: {}", bp.spec, rc);
        }
    }
}

impl NativeBreakpoint {
    pub fn clazz_raw(&self) -> jobject {
        self.clazz.as_raw()
    }
}

/// Resolves the native specs and drains bindings that arrived early.
/// Runs in the single-threaded install phase, before breakpoint events
/// are enabled.
pub(crate) fn install(ctx: &AgentContext, env: &JniEnv) {
    let mut state = ctx.native.lock().unwrap_or_else(|e| e.into_inner());
    let mut installed = HashMap::with_capacity(NATIVE_BREAKPOINT_SPECS.len());
    for &spec in NATIVE_BREAKPOINT_SPECS {
        let Some(clazz) = super::resolve_breakpoint_class(ctx, env, spec.class_name, true) else {
            continue;
        };
        let method = env.get_method_id(clazz.as_raw(), spec.method_name, spec.signature);
        env.clear_exception();
        let Some(method) = method else {
            debug!("native breakpoint target {} not present", spec);
            continue;
        };
        if spec.installed.swap(true, Ordering::SeqCst) {
            fatal!("native breakpoint {} installed twice", spec);
        }
        let bp = NativeBreakpoint {
            spec,
            clazz,
            method: method as MethodKey,
        };
        // On runtimes where this method is plain bytecode it also carries a
        // regular breakpoint; no bind event ever fires for it there, so the
        // entry below stays dormant.
        if let Some(original) = state.pending.get(&bp.method).copied() {
            // Already bound; replace the registered entry.
            bind_native_breakpoint(env, &bp, original, ptr::null_mut());
        }
        if installed.insert(bp.method, bp).is_some() {
            fatal!("duplicate native breakpoint: {}", spec);
        }
    }
    state.installed = Some(installed);
}

pub(crate) fn uninstall(ctx: &AgentContext) {
    let mut state = ctx.native.lock().unwrap_or_else(|e| e.into_inner());
    state.installed = None;
    state.pending.clear();
}

/// Replacement entry for `sun.misc.Unsafe.objectFieldOffset(Field)`.
///
/// Calls the original first, clears any failure it raised, traces, and
/// re-invokes on failure so the caller observes the original exception.
unsafe extern "system" fn native_object_field_offset(
    jni: *mut JNIEnv,
    receiver: jobject,
    field: jobject,
) -> jlong {
    let Some(original) = OBJECT_FIELD_OFFSET_SPEC.original_entry() else {
        fatal!("objectFieldOffset replacement invoked before binding completed");
    };
    let result = original(jni, receiver, field);

    // A very early or very late call while the agent is not fully up.
    let Some(ctx) = crate::context() else {
        return result;
    };
    if !ctx.is_live() {
        return result;
    }

    let env = JniEnv::from_raw(jni);
    let valid = !env.clear_exception();
    let jvmti = ctx.jvmti();
    let current_method = caller_frame(jvmti, 0)
        .map(|(method, _)| method)
        .unwrap_or(ptr::null_mut());
    let caller = direct_caller_class(jvmti);
    let (name, declaring) = field_name_and_declaring(ctx, &env, field);
    verify_and_trace_object_field_offset(ctx, &env, valid, name, declaring, current_method, caller);
    if !valid {
        return original(jni, receiver, field);
    }
    result
}
