//! Breakpoint registry, installer, and dispatch core.
//!
//! Most handlers re-invoke the intercepted method to observe its outcome.
//! Those re-invocations run with a different immediate caller than the
//! original call, which caller-sensitive APIs can observe; short of
//! bytecode instrumentation there is no better option, and the divergence
//! is accepted.
//!
//! When hot-swap or retransformation clears one of our breakpoints, the
//! host offers no usable event to re-install it; such methods silently
//! stop being traced.

pub mod handlers;
pub mod loadclass;
pub mod native;

use std::cell::Cell;
use std::fmt;

use aotrace_jvmti::sys::jni::{jclass, jmethodID, jobject, jthread, JNIEnv};
use aotrace_jvmti::sys::jvmti::{jlocation, jvmtiEnv};
use aotrace_jvmti::{GlobalRef, JniEnv};
use aotrace_protocol::{TraceRecord, TraceValue};

use crate::fatal;
use crate::support::class_name_value;
use crate::AgentContext;

// Thread-local re-entrancy guard. Handlers call back into the runtime to
// re-invoke intercepted methods; without the guard those calls would hit
// our own breakpoints again and recurse.
thread_local! {
    static IN_HANDLER: Cell<bool> = const { Cell::new(false) };
}

pub fn in_handler() -> bool {
    IN_HANDLER.with(|h| h.get())
}

pub fn set_in_handler(value: bool) {
    IN_HANDLER.with(|h| h.set(value));
}

/// Exclusive dispatch guard: taken at most once per thread at a time.
pub struct HandlerGuard(());

impl HandlerGuard {
    pub fn enter() -> Option<Self> {
        if in_handler() {
            return None;
        }
        set_in_handler(true);
        Some(HandlerGuard(()))
    }
}

impl Drop for HandlerGuard {
    fn drop(&mut self) {
        set_in_handler(false);
    }
}

/// RAII guard that suppresses interception for its lifetime, saving and
/// restoring the previous state. Nesting-safe.
pub struct SuppressGuard(bool);

impl SuppressGuard {
    pub fn new() -> Self {
        let was = in_handler();
        set_in_handler(true);
        SuppressGuard(was)
    }
}

impl Drop for SuppressGuard {
    fn drop(&mut self) {
        set_in_handler(self.0);
    }
}

/// Raw method identity used as registry key.
pub type MethodKey = usize;

/// A `(method, bytecode index)` pair identifying one call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MethodLocation {
    pub method: MethodKey,
    pub bci: i32,
}

pub type HandlerFn = fn(&AgentContext, &JniEnv, &Breakpoint) -> bool;

pub struct BreakpointSpec {
    pub class_name: &'static str,
    pub method_name: &'static str,
    pub signature: &'static str,
    pub handler: HandlerFn,
    pub optional: bool,
}

impl fmt::Display for BreakpointSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}{}{}",
            self.class_name,
            self.method_name,
            self.signature,
            if self.optional { " (optional)" } else { "" }
        )
    }
}

/// A spec bound to its resolved class and method identity.
#[derive(Clone, Copy)]
pub struct Breakpoint {
    pub spec: &'static BreakpointSpec,
    pub clazz: GlobalRef,
    pub method: MethodKey,
}

impl Breakpoint {
    pub fn clazz_raw(&self) -> jclass {
        self.clazz.as_raw()
    }

    pub fn method_id(&self) -> jmethodID {
        self.method as jmethodID
    }
}

const fn brk(
    class_name: &'static str,
    method_name: &'static str,
    signature: &'static str,
    handler: HandlerFn,
) -> BreakpointSpec {
    BreakpointSpec {
        class_name,
        method_name,
        signature,
        handler,
        optional: false,
    }
}

const fn optional_brk(
    class_name: &'static str,
    method_name: &'static str,
    signature: &'static str,
    handler: HandlerFn,
) -> BreakpointSpec {
    BreakpointSpec {
        class_name,
        method_name,
        signature,
        handler,
        optional: true,
    }
}

use handlers as h;

pub static BREAKPOINT_SPECS: &[BreakpointSpec] = &[
    brk("java/lang/Class", "forName", "(Ljava/lang/String;)Ljava/lang/Class;", h::for_name),
    brk(
        "java/lang/Class",
        "forName",
        "(Ljava/lang/String;ZLjava/lang/ClassLoader;)Ljava/lang/Class;",
        h::for_name,
    ),
    brk("java/lang/Class", "getFields", "()[Ljava/lang/reflect/Field;", h::bulk_query),
    brk("java/lang/Class", "getMethods", "()[Ljava/lang/reflect/Method;", h::bulk_query),
    brk(
        "java/lang/Class",
        "getConstructors",
        "()[Ljava/lang/reflect/Constructor;",
        h::bulk_query,
    ),
    brk("java/lang/Class", "getClasses", "()[Ljava/lang/Class;", h::bulk_query),
    brk("java/lang/Class", "getDeclaredFields", "()[Ljava/lang/reflect/Field;", h::bulk_query),
    brk("java/lang/Class", "getDeclaredMethods", "()[Ljava/lang/reflect/Method;", h::bulk_query),
    brk(
        "java/lang/Class",
        "getDeclaredConstructors",
        "()[Ljava/lang/reflect/Constructor;",
        h::bulk_query,
    ),
    brk("java/lang/Class", "getDeclaredClasses", "()[Ljava/lang/Class;", h::bulk_query),
    brk(
        "java/lang/Class",
        "getField",
        "(Ljava/lang/String;)Ljava/lang/reflect/Field;",
        h::get_field,
    ),
    brk(
        "java/lang/Class",
        "getDeclaredField",
        "(Ljava/lang/String;)Ljava/lang/reflect/Field;",
        h::get_declared_field,
    ),
    brk(
        "java/lang/Class",
        "getMethod",
        "(Ljava/lang/String;[Ljava/lang/Class;)Ljava/lang/reflect/Method;",
        h::get_method,
    ),
    brk(
        "java/lang/Class",
        "getConstructor",
        "([Ljava/lang/Class;)Ljava/lang/reflect/Constructor;",
        h::get_constructor,
    ),
    brk(
        "java/lang/Class",
        "getDeclaredMethod",
        "(Ljava/lang/String;[Ljava/lang/Class;)Ljava/lang/reflect/Method;",
        h::get_declared_method,
    ),
    brk(
        "java/lang/Class",
        "getDeclaredConstructor",
        "([Ljava/lang/Class;)Ljava/lang/reflect/Constructor;",
        h::get_constructor,
    ),
    brk(
        "java/lang/Class",
        "getEnclosingMethod",
        "()Ljava/lang/reflect/Method;",
        h::get_enclosing_method,
    ),
    brk(
        "java/lang/Class",
        "getEnclosingConstructor",
        "()Ljava/lang/reflect/Constructor;",
        h::get_enclosing_method,
    ),
    brk("java/lang/Class", "newInstance", "()Ljava/lang/Object;", h::new_instance),
    brk(
        "java/lang/reflect/Array",
        "newInstance",
        "(Ljava/lang/Class;I)Ljava/lang/Object;",
        h::new_array_instance,
    ),
    brk(
        "java/lang/reflect/Array",
        "newInstance",
        "(Ljava/lang/Class;[I)Ljava/lang/Object;",
        h::new_array_instance_multi,
    ),
    brk(
        "java/lang/ClassLoader",
        "getResource",
        "(Ljava/lang/String;)Ljava/net/URL;",
        h::get_resource,
    ),
    brk(
        "java/lang/ClassLoader",
        "getResources",
        "(Ljava/lang/String;)Ljava/util/Enumeration;",
        h::get_resources,
    ),
    brk(
        "java/lang/ClassLoader",
        "getSystemResource",
        "(Ljava/lang/String;)Ljava/net/URL;",
        h::get_system_resource,
    ),
    brk(
        "java/lang/ClassLoader",
        "getSystemResources",
        "(Ljava/lang/String;)Ljava/util/Enumeration;",
        h::get_system_resources,
    ),
    // get(System)ResourceAsStream() delegates to get(System)Resource(),
    // no separate breakpoints needed.
    brk(
        "java/lang/reflect/Proxy",
        "getProxyClass",
        "(Ljava/lang/ClassLoader;[Ljava/lang/Class;)Ljava/lang/Class;",
        h::get_proxy_class,
    ),
    brk(
        "java/lang/reflect/Proxy",
        "newProxyInstance",
        "(Ljava/lang/ClassLoader;[Ljava/lang/Class;Ljava/lang/reflect/InvocationHandler;)\
         Ljava/lang/Object;",
        h::new_proxy_instance,
    ),
    brk(
        "java/io/ObjectStreamClass",
        "<init>",
        "(Ljava/lang/Class;)V",
        h::object_stream_class_constructor,
    ),
    optional_brk(
        "java/util/ResourceBundle",
        "getBundleImpl",
        "(Ljava/lang/String;Ljava/util/Locale;Ljava/lang/ClassLoader;\
         Ljava/util/ResourceBundle$Control;)Ljava/util/ResourceBundle;",
        h::get_bundle_impl_jdk8,
    ),
    optional_brk(
        "java/util/ResourceBundle",
        "getBundleImpl",
        "(Ljava/lang/Module;Ljava/lang/Module;Ljava/lang/String;Ljava/util/Locale;\
         Ljava/util/ResourceBundle$Control;)Ljava/util/ResourceBundle;",
        h::get_bundle_impl_jdk11,
    ),
    // On Java 9+ these are plain Java methods delegating to private natives.
    optional_brk(
        "sun/misc/Unsafe",
        "objectFieldOffset",
        "(Ljava/lang/reflect/Field;)J",
        h::object_field_offset,
    ),
    optional_brk(
        "jdk/internal/misc/Unsafe",
        "objectFieldOffset",
        "(Ljava/lang/reflect/Field;)J",
        h::object_field_offset,
    ),
    optional_brk(
        "jdk/internal/misc/Unsafe",
        "objectFieldOffset",
        "(Ljava/lang/Class;Ljava/lang/String;)J",
        h::object_field_offset_by_name,
    ),
    optional_brk(
        "java/lang/invoke/MethodHandles$Lookup",
        "findStatic",
        "(Ljava/lang/Class;Ljava/lang/String;Ljava/lang/invoke/MethodType;)\
         Ljava/lang/invoke/MethodHandle;",
        h::find_method_handle,
    ),
    optional_brk(
        "java/lang/invoke/MethodHandles$Lookup",
        "findVirtual",
        "(Ljava/lang/Class;Ljava/lang/String;Ljava/lang/invoke/MethodType;)\
         Ljava/lang/invoke/MethodHandle;",
        h::find_method_handle,
    ),
    optional_brk(
        "java/lang/invoke/MethodHandles$Lookup",
        "findConstructor",
        "(Ljava/lang/Class;Ljava/lang/invoke/MethodType;)Ljava/lang/invoke/MethodHandle;",
        h::find_constructor_handle,
    ),
    optional_brk(
        "java/lang/invoke/MethodHandles$Lookup",
        "findSpecial",
        "(Ljava/lang/Class;Ljava/lang/String;Ljava/lang/invoke/MethodType;Ljava/lang/Class;)\
         Ljava/lang/invoke/MethodHandle;",
        h::find_special_handle,
    ),
    optional_brk(
        "java/lang/invoke/MethodHandles$Lookup",
        "bind",
        "(Ljava/lang/Object;Ljava/lang/String;Ljava/lang/invoke/MethodType;)\
         Ljava/lang/invoke/MethodHandle;",
        h::bind_handle,
    ),
    optional_brk(
        "java/lang/invoke/MethodHandles$Lookup",
        "findGetter",
        "(Ljava/lang/Class;Ljava/lang/String;Ljava/lang/Class;)Ljava/lang/invoke/MethodHandle;",
        h::find_field_handle,
    ),
    optional_brk(
        "java/lang/invoke/MethodHandles$Lookup",
        "findSetter",
        "(Ljava/lang/Class;Ljava/lang/String;Ljava/lang/Class;)Ljava/lang/invoke/MethodHandle;",
        h::find_field_handle,
    ),
    optional_brk(
        "java/lang/invoke/MethodHandles$Lookup",
        "findStaticGetter",
        "(Ljava/lang/Class;Ljava/lang/String;Ljava/lang/Class;)Ljava/lang/invoke/MethodHandle;",
        h::find_field_handle,
    ),
    optional_brk(
        "java/lang/invoke/MethodHandles$Lookup",
        "findStaticSetter",
        "(Ljava/lang/Class;Ljava/lang/String;Ljava/lang/Class;)Ljava/lang/invoke/MethodHandle;",
        h::find_field_handle,
    ),
    // VarHandles exist since Java 9.
    optional_brk(
        "java/lang/invoke/MethodHandles$Lookup",
        "findVarHandle",
        "(Ljava/lang/Class;Ljava/lang/String;Ljava/lang/Class;)Ljava/lang/invoke/VarHandle;",
        h::find_field_handle,
    ),
    optional_brk(
        "java/lang/invoke/MethodHandles$Lookup",
        "findStaticVarHandle",
        "(Ljava/lang/Class;Ljava/lang/String;Ljava/lang/Class;)Ljava/lang/invoke/VarHandle;",
        h::find_field_handle,
    ),
    optional_brk(
        "java/lang/invoke/MethodHandles$Lookup",
        "findClass",
        "(Ljava/lang/String;)Ljava/lang/Class;",
        h::find_class_on_lookup,
    ),
    optional_brk(
        "java/lang/invoke/MethodHandles$Lookup",
        "unreflectGetter",
        "(Ljava/lang/reflect/Field;)Ljava/lang/invoke/MethodHandle;",
        h::unreflect_field,
    ),
    optional_brk(
        "java/lang/invoke/MethodHandles$Lookup",
        "unreflectSetter",
        "(Ljava/lang/reflect/Field;)Ljava/lang/invoke/MethodHandle;",
        h::unreflect_field,
    ),
    optional_brk(
        "java/lang/invoke/MethodHandleProxies",
        "asInterfaceInstance",
        "(Ljava/lang/Class;Ljava/lang/invoke/MethodHandle;)Ljava/lang/Object;",
        h::as_interface_instance,
    ),
    optional_brk(
        "java/lang/invoke/ConstantBootstraps",
        "getStaticFinal",
        "(Ljava/lang/invoke/MethodHandles$Lookup;Ljava/lang/String;Ljava/lang/Class;\
         Ljava/lang/Class;)Ljava/lang/Object;",
        h::constant_bootstrap_get_static_final,
    ),
    optional_brk(
        "java/lang/invoke/MethodType",
        "fromMethodDescriptorString",
        "(Ljava/lang/String;Ljava/lang/ClassLoader;)Ljava/lang/invoke/MethodType;",
        h::method_type_from_descriptor,
    ),
];

pub static LOAD_CLASS_SPEC: BreakpointSpec = optional_brk(
    "java/lang/ClassLoader",
    "loadClass",
    "(Ljava/lang/String;)Ljava/lang/Class;",
    loadclass::load_class,
);

/// Emits one reflection record, converting handles to names late.
pub(crate) fn trace_breakpoint(
    ctx: &AgentContext,
    env: &JniEnv,
    clazz: jobject,
    declaring: jobject,
    caller: jobject,
    function: &str,
    result: TraceValue,
    args: Vec<TraceValue>,
) {
    let handles = ctx.handles();
    let record = TraceRecord::reflect(function)
        .clazz(class_name_value(env, handles, clazz))
        .declaring_class(class_name_value(env, handles, declaring))
        .caller_class(class_name_value(env, handles, caller))
        .result(result)
        .args(args);
    ctx.sink().trace_call(record);
    if env.exception_check() {
        fatal!("pending exception after tracing {}", function);
    }
}

/// Resolves a spec's class to a pinned global reference. Absent optional
/// classes return `None`.
pub(crate) fn resolve_breakpoint_class(
    ctx: &AgentContext,
    env: &JniEnv,
    class_name: &str,
    optional: bool,
) -> Option<GlobalRef> {
    let clazz = env.find_class(class_name);
    let failed = env.clear_exception();
    match clazz {
        Some(cls) if !failed => {
            let Some(global) = GlobalRef::new(env, cls) else {
                fatal!("failed to pin breakpoint class {}", class_name);
            };
            ctx.track(global);
            Some(global)
        }
        _ if optional => None,
        _ => fatal!("mandatory breakpoint class {} not found", class_name),
    }
}

/// Resolves a method (instance first, then static). Absent optional
/// methods return `None`.
pub(crate) fn resolve_breakpoint_method(
    env: &JniEnv,
    clazz: jclass,
    spec: &BreakpointSpec,
) -> Option<jmethodID> {
    let method = env
        .get_method_id(clazz, spec.method_name, spec.signature)
        .or_else(|| {
            env.clear_exception();
            env.get_static_method_id(clazz, spec.method_name, spec.signature)
        });
    let failed = env.clear_exception();
    match method {
        Some(id) if !failed => Some(id),
        _ if spec.optional => None,
        _ => fatal!("mandatory breakpoint method {} not resolved", spec),
    }
}

fn install_one(
    ctx: &AgentContext,
    env: &JniEnv,
    spec: &'static BreakpointSpec,
    known_class: Option<GlobalRef>,
) -> Option<Breakpoint> {
    let clazz = match known_class {
        Some(clazz) => clazz,
        None => resolve_breakpoint_class(ctx, env, spec.class_name, spec.optional)?,
    };
    let method = resolve_breakpoint_method(env, clazz.as_raw(), spec)?;
    if let Err(e) = ctx.jvmti().set_breakpoint(method, 0) {
        if !spec.optional {
            fatal!("setting breakpoint {} failed: {}", spec, e);
        }
        return None;
    }
    let bp = Breakpoint {
        spec,
        clazz,
        method: method as MethodKey,
    };
    insert_breakpoint(ctx, bp);
    Some(bp)
}

/// Registers a resolved breakpoint. A duplicate method identity means two
/// specs resolved to the same method, which the dispatch table cannot
/// represent.
pub(crate) fn insert_breakpoint(ctx: &AgentContext, bp: Breakpoint) {
    let mut map = ctx
        .breakpoints
        .write()
        .unwrap_or_else(|e| e.into_inner());
    if map.insert(bp.method, bp).is_some() {
        fatal!("duplicate breakpoint: {}", bp.spec);
    }
}

/// Installs the full table. Consecutive specs naming the same class reuse
/// the resolved class reference.
pub fn install(ctx: &AgentContext, env: &JniEnv) {
    if ctx.options().class_loader_support {
        loadclass::install_in_loaded_classloaders(ctx, env);
    }

    let mut last: Option<(&'static str, GlobalRef)> = None;
    for spec in BREAKPOINT_SPECS {
        let known = match last {
            Some((name, clazz)) if name == spec.class_name => Some(clazz),
            _ => None,
        };
        if let Some(bp) = install_one(ctx, env, spec, known) {
            last = Some((spec.class_name, bp.clazz));
        }
    }

    native::install(ctx, env);
}

/// Clears the registry and releases every tracked class reference.
pub fn uninstall(ctx: &AgentContext, env: &JniEnv) {
    ctx.breakpoints
        .write()
        .unwrap_or_else(|e| e.into_inner())
        .clear();
    native::uninstall(ctx);
    for global in ctx.drain_tracked() {
        global.release(env);
    }
}

/// Breakpoint event entry: one handler per thread at a time, no pending
/// exception on return.
pub(crate) unsafe extern "system" fn on_breakpoint(
    _jvmti: *mut jvmtiEnv,
    jni: *mut JNIEnv,
    _thread: jthread,
    method: jmethodID,
    _location: jlocation,
) {
    let Some(_guard) = HandlerGuard::enter() else {
        return;
    };
    let Some(ctx) = crate::context() else {
        fatal!("breakpoint event delivered without agent context");
    };
    let env = JniEnv::from_raw(jni);
    let bp = {
        let map = ctx.breakpoints.read().unwrap_or_else(|e| e.into_inner());
        map.get(&(method as MethodKey)).copied()
    };
    let Some(bp) = bp else {
        fatal!("stale breakpoint event for unknown method {:#x}", method as usize);
    };
    if (bp.spec.handler)(ctx, &env, &bp) && env.exception_check() {
        fatal!("handler for {} left a pending exception", bp.spec);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handler_guard_blocks_reentry() {
        set_in_handler(false);
        let guard = HandlerGuard::enter().expect("first entry");
        assert!(HandlerGuard::enter().is_none());
        drop(guard);
        assert!(!in_handler());
        assert!(HandlerGuard::enter().is_some());
        set_in_handler(false);
    }

    #[test]
    fn test_suppress_guard_restores_previous_state() {
        set_in_handler(false);
        {
            let _outer = SuppressGuard::new();
            assert!(in_handler());
            {
                let _inner = SuppressGuard::new();
                assert!(in_handler());
            }
            // Inner dropped, outer still suppressing.
            assert!(in_handler());
        }
        assert!(!in_handler());
    }

    #[test]
    fn test_suppress_guard_inside_handler_guard() {
        set_in_handler(false);
        let guard = HandlerGuard::enter().unwrap();
        {
            let _suppress = SuppressGuard::new();
            assert!(in_handler());
        }
        // Still inside the handler after the probe finishes.
        assert!(in_handler());
        drop(guard);
        assert!(!in_handler());
    }

    #[test]
    fn test_method_location_equality_is_structural() {
        let a = MethodLocation { method: 0x1000, bci: 7 };
        let b = MethodLocation { method: 0x1000, bci: 7 };
        let c = MethodLocation { method: 0x1000, bci: 8 };
        assert_eq!(a, b);
        assert_ne!(a, c);

        let mut sites = std::collections::HashSet::new();
        assert!(sites.insert(a));
        assert!(!sites.insert(b));
        assert!(sites.insert(c));
    }

    #[test]
    fn test_spec_table_has_no_duplicate_triples() {
        let mut seen = std::collections::HashSet::new();
        for spec in BREAKPOINT_SPECS {
            assert!(
                seen.insert((spec.class_name, spec.method_name, spec.signature)),
                "duplicate spec {}",
                spec
            );
        }
    }

    #[test]
    fn test_mandatory_specs_cover_core_reflection() {
        let mandatory: Vec<_> = BREAKPOINT_SPECS
            .iter()
            .filter(|s| !s.optional)
            .map(|s| (s.class_name, s.method_name))
            .collect();
        assert!(mandatory.contains(&("java/lang/Class", "forName")));
        assert!(mandatory.contains(&("java/lang/Class", "getDeclaredMethod")));
        assert!(mandatory.contains(&("java/io/ObjectStreamClass", "<init>")));
        // Unsafe variants only exist on some JDKs and must stay optional.
        assert!(BREAKPOINT_SPECS
            .iter()
            .filter(|s| s.class_name.ends_with("Unsafe"))
            .all(|s| s.optional));
    }
}
