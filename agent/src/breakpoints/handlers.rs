//! One handler per hook kind.
//!
//! Handlers reconstruct the intercepted call's arguments from the stopped
//! frame, usually re-invoke the method to observe its outcome, and emit
//! one trace record. Failures raised by re-invocation are cleared and
//! reported as an unsuccessful result; nothing propagates into the
//! intercepted frame.

use std::ptr;

use aotrace_jvmti::sys::jni::{jobject, jvalue};
use aotrace_jvmti::JniEnv;
use aotrace_protocol::{TraceRecord, TraceValue};

use super::{trace_breakpoint, Breakpoint};
use crate::fatal;
use crate::support::{
    caller_class, caller_frame, class_array_names, class_name, class_name_value,
    declaring_class, direct_caller_class, object_argument, string_value,
};
use crate::AgentContext;

fn null() -> jobject {
    ptr::null_mut()
}

fn arg(ctx: &AgentContext, slot: i32) -> jobject {
    object_argument(ctx.jvmti(), slot).unwrap_or(ptr::null_mut())
}

pub fn for_name(ctx: &AgentContext, env: &JniEnv, bp: &Breakpoint) -> bool {
    let jvmti = ctx.jvmti();
    let handles = ctx.handles();
    let caller = direct_caller_class(jvmti);
    let name = arg(ctx, 0);
    let class_name_arg = string_value(env, name);

    // The 3-arg overload carries the loader in slot 2; for the 1-arg form
    // we use the direct caller's loader. The caller-sensitive stack walk
    // of forName(String) may skip frames differently for our re-invocation.
    let mut loader = null();
    let loader_valid = if bp.method_id() == handles.java_lang_class_for_name3() {
        match jvmti.get_local_object(ptr::null_mut(), 0, 2) {
            Ok(l) => {
                loader = l;
                true
            }
            Err(_) => false,
        }
    } else if !caller.is_null() {
        match jvmti.get_class_loader(caller) {
            Ok(l) => {
                loader = l;
                true
            }
            Err(_) => false,
        }
    } else {
        true
    };

    let result = if loader_valid {
        // Initialization is forced off: events of interest raised during
        // static initializers would be swallowed by the recursion guard.
        let loaded = env.call_static_object_method(
            bp.clazz_raw(),
            handles.java_lang_class_for_name3(),
            &[
                jvalue::object(name),
                jvalue::boolean(false),
                jvalue::object(loader),
            ],
        );
        let loaded = if env.clear_exception() { null() } else { loaded };
        TraceValue::Bool(!loaded.is_null())
    } else {
        TraceValue::Unknown
    };

    trace_breakpoint(
        ctx,
        env,
        bp.clazz_raw(),
        null(),
        caller,
        bp.spec.method_name,
        result,
        vec![class_name_arg],
    );
    true
}

/// `getFields`, `getMethods`, `getConstructors`, `getClasses` and their
/// `getDeclared*` variants: record the query itself, nothing to re-invoke.
pub fn bulk_query(ctx: &AgentContext, env: &JniEnv, bp: &Breakpoint) -> bool {
    let caller = direct_caller_class(ctx.jvmti());
    let receiver = arg(ctx, 0);
    trace_breakpoint(
        ctx,
        env,
        receiver,
        null(),
        caller,
        bp.spec.method_name,
        TraceValue::Null,
        vec![],
    );
    true
}

pub fn get_field(ctx: &AgentContext, env: &JniEnv, bp: &Breakpoint) -> bool {
    handle_get_field(ctx, env, bp, false)
}

pub fn get_declared_field(ctx: &AgentContext, env: &JniEnv, bp: &Breakpoint) -> bool {
    handle_get_field(ctx, env, bp, true)
}

fn handle_get_field(
    ctx: &AgentContext,
    env: &JniEnv,
    bp: &Breakpoint,
    declared_only: bool,
) -> bool {
    let handles = ctx.handles();
    let caller = direct_caller_class(ctx.jvmti());
    let receiver = arg(ctx, 0);
    let name = arg(ctx, 1);

    let mut result = env.call_object_method(receiver, bp.method_id(), &[jvalue::object(name)]);
    if env.clear_exception() {
        result = null();
    }
    let mut declaring = null();
    if !declared_only && !result.is_null() {
        declaring = env.call_object_method(result, handles.member_get_declaring_class(), &[]);
        if env.clear_exception() {
            declaring = null();
        }
    }
    trace_breakpoint(
        ctx,
        env,
        receiver,
        declaring,
        caller,
        bp.spec.method_name,
        TraceValue::Bool(!result.is_null()),
        vec![string_value(env, name)],
    );
    true
}

pub fn get_method(ctx: &AgentContext, env: &JniEnv, bp: &Breakpoint) -> bool {
    handle_get_method(ctx, env, bp, false)
}

pub fn get_declared_method(ctx: &AgentContext, env: &JniEnv, bp: &Breakpoint) -> bool {
    handle_get_method(ctx, env, bp, true)
}

fn handle_get_method(
    ctx: &AgentContext,
    env: &JniEnv,
    bp: &Breakpoint,
    declared_only: bool,
) -> bool {
    let handles = ctx.handles();
    let caller = direct_caller_class(ctx.jvmti());
    let receiver = arg(ctx, 0);
    let name = arg(ctx, 1);
    let param_types = arg(ctx, 2);

    let mut result = env.call_object_method(
        receiver,
        bp.method_id(),
        &[jvalue::object(name), jvalue::object(param_types)],
    );
    if env.clear_exception() {
        result = null();
    }
    let mut declaring = null();
    if !declared_only && !result.is_null() {
        declaring = env.call_object_method(result, handles.member_get_declaring_class(), &[]);
        if env.clear_exception() {
            declaring = null();
        }
    }
    trace_breakpoint(
        ctx,
        env,
        receiver,
        declaring,
        caller,
        bp.spec.method_name,
        TraceValue::Bool(!result.is_null()),
        vec![
            string_value(env, name),
            class_array_names(env, handles, param_types),
        ],
    );
    true
}

pub fn get_constructor(ctx: &AgentContext, env: &JniEnv, bp: &Breakpoint) -> bool {
    let caller = direct_caller_class(ctx.jvmti());
    let receiver = arg(ctx, 0);
    let param_types = arg(ctx, 1);

    let mut result =
        env.call_object_method(receiver, bp.method_id(), &[jvalue::object(param_types)]);
    if env.clear_exception() {
        result = null();
    }
    trace_breakpoint(
        ctx,
        env,
        receiver,
        null(),
        caller,
        bp.spec.method_name,
        TraceValue::Bool(!result.is_null()),
        vec![class_array_names(env, ctx.handles(), param_types)],
    );
    true
}

pub fn get_enclosing_method(ctx: &AgentContext, env: &JniEnv, bp: &Breakpoint) -> bool {
    let jvmti = ctx.jvmti();
    let caller = direct_caller_class(jvmti);
    let receiver = arg(ctx, 0);

    let enclosing = env.call_object_method(receiver, bp.method_id(), &[]);
    let enclosing = if env.clear_exception() { null() } else { enclosing };

    let mut result = TraceValue::Bool(false);
    if !enclosing.is_null() {
        result = TraceValue::Unknown;
        let method = env.from_reflected_method(enclosing);
        if !env.clear_exception() && !method.is_null() {
            if let Ok(holder) = jvmti.get_method_declaring_class(method) {
                if let Some(holder_name) = class_name(env, ctx.handles(), holder) {
                    if let Ok((name, descriptor)) = jvmti.get_method_name(method) {
                        result = TraceValue::Str(format!("{}.{}{}", holder_name, name, descriptor));
                    }
                }
            }
        }
    }
    trace_breakpoint(
        ctx,
        env,
        null(),
        null(),
        caller,
        bp.spec.method_name,
        result,
        vec![],
    );
    true
}

pub fn new_instance(ctx: &AgentContext, env: &JniEnv, bp: &Breakpoint) -> bool {
    let caller = direct_caller_class(ctx.jvmti());
    let receiver = arg(ctx, 0);

    let mut found = false;
    if !receiver.is_null() {
        found = env.get_method_id(receiver, "<init>", "()V").is_some();
        env.clear_exception();
    }
    trace_breakpoint(
        ctx,
        env,
        receiver,
        null(),
        caller,
        bp.spec.method_name,
        TraceValue::Bool(found),
        vec![],
    );
    true
}

pub fn new_array_instance(ctx: &AgentContext, env: &JniEnv, bp: &Breakpoint) -> bool {
    let component = arg(ctx, 0);
    let length = ctx.jvmti().get_local_int(ptr::null_mut(), 0, 1);
    let args = [
        jvalue::object(component),
        jvalue {
            i: length.unwrap_or(0),
        },
    ];
    handle_new_array_instance(ctx, env, bp, &args, length.is_ok())
}

pub fn new_array_instance_multi(ctx: &AgentContext, env: &JniEnv, bp: &Breakpoint) -> bool {
    let component = arg(ctx, 0);
    let dimensions = arg(ctx, 1);
    let args = [jvalue::object(component), jvalue::object(dimensions)];
    handle_new_array_instance(ctx, env, bp, &args, !dimensions.is_null())
}

fn handle_new_array_instance(
    ctx: &AgentContext,
    env: &JniEnv,
    bp: &Breakpoint,
    args: &[jvalue],
    args_valid: bool,
) -> bool {
    let caller = direct_caller_class(ctx.jvmti());
    let component = unsafe { args[0].l };
    let mut result = null();
    let mut result_class = null();
    if !component.is_null() && args_valid {
        result = env.call_static_object_method(bp.clazz_raw(), bp.method_id(), args);
        if env.clear_exception() {
            result = null();
        } else {
            result_class = env.get_object_class(result);
            if env.clear_exception() {
                result_class = null();
            }
        }
    }
    let result_class_name = class_name_value(env, ctx.handles(), result_class);
    trace_breakpoint(
        ctx,
        env,
        bp.clazz_raw(),
        null(),
        caller,
        bp.spec.method_name,
        TraceValue::Bool(!result.is_null()),
        vec![result_class_name],
    );
    true
}

pub fn get_resource(ctx: &AgentContext, env: &JniEnv, bp: &Breakpoint) -> bool {
    handle_get_resources(ctx, env, bp, false)
}

pub fn get_resources(ctx: &AgentContext, env: &JniEnv, bp: &Breakpoint) -> bool {
    handle_get_resources(ctx, env, bp, true)
}

fn handle_get_resources(
    ctx: &AgentContext,
    env: &JniEnv,
    bp: &Breakpoint,
    returns_enumeration: bool,
) -> bool {
    let caller = direct_caller_class(ctx.jvmti());
    let receiver = arg(ctx, 0);
    let name = arg(ctx, 1);

    let returned = env.call_object_method(receiver, bp.method_id(), &[jvalue::object(name)]);
    let mut result = !returned.is_null();
    if env.clear_exception() {
        result = false;
    }
    if result && returns_enumeration {
        result = has_enumeration_elements(ctx, env, returned);
    }
    // The receiver is a ClassLoader instance; the record names its class.
    let mut receiver_class = null();
    if !receiver.is_null() {
        receiver_class = env.get_object_class(receiver);
        if env.clear_exception() {
            receiver_class = null();
        }
    }
    trace_breakpoint(
        ctx,
        env,
        receiver_class,
        null(),
        caller,
        bp.spec.method_name,
        TraceValue::Bool(result),
        vec![string_value(env, name)],
    );
    true
}

fn has_enumeration_elements(ctx: &AgentContext, env: &JniEnv, enumeration: jobject) -> bool {
    let has = env.call_boolean_method(
        enumeration,
        ctx.handles().enumeration_has_more_elements(),
        &[],
    );
    if env.clear_exception() {
        return false;
    }
    has
}

pub fn get_system_resource(ctx: &AgentContext, env: &JniEnv, bp: &Breakpoint) -> bool {
    handle_get_system_resources(ctx, env, bp, false)
}

pub fn get_system_resources(ctx: &AgentContext, env: &JniEnv, bp: &Breakpoint) -> bool {
    handle_get_system_resources(ctx, env, bp, true)
}

fn handle_get_system_resources(
    ctx: &AgentContext,
    env: &JniEnv,
    bp: &Breakpoint,
    returns_enumeration: bool,
) -> bool {
    let caller = direct_caller_class(ctx.jvmti());
    let name = arg(ctx, 0);

    let returned =
        env.call_static_object_method(bp.clazz_raw(), bp.method_id(), &[jvalue::object(name)]);
    let mut result = !returned.is_null();
    if env.clear_exception() {
        result = false;
    }
    if result && returns_enumeration {
        result = has_enumeration_elements(ctx, env, returned);
    }
    trace_breakpoint(
        ctx,
        env,
        null(),
        null(),
        caller,
        bp.spec.method_name,
        TraceValue::Bool(result),
        vec![string_value(env, name)],
    );
    true
}

pub fn new_proxy_instance(ctx: &AgentContext, env: &JniEnv, bp: &Breakpoint) -> bool {
    let caller = direct_caller_class(ctx.jvmti());
    let loader = arg(ctx, 0);
    let interfaces = arg(ctx, 1);
    let iface_names = class_array_names(env, ctx.handles(), interfaces);
    let invocation_handler = arg(ctx, 2);

    let result = env.call_static_object_method(
        bp.clazz_raw(),
        bp.method_id(),
        &[
            jvalue::object(loader),
            jvalue::object(interfaces),
            jvalue::object(invocation_handler),
        ],
    );
    let mut ok = !result.is_null();
    if env.clear_exception() {
        ok = false;
    }
    trace_breakpoint(
        ctx,
        env,
        null(),
        null(),
        caller,
        bp.spec.method_name,
        TraceValue::Bool(ok),
        vec![TraceValue::Unknown, iface_names, TraceValue::Unknown],
    );
    true
}

pub fn get_proxy_class(ctx: &AgentContext, env: &JniEnv, bp: &Breakpoint) -> bool {
    let caller = direct_caller_class(ctx.jvmti());
    let loader = arg(ctx, 0);
    let interfaces = arg(ctx, 1);
    let iface_names = class_array_names(env, ctx.handles(), interfaces);

    let result = env.call_static_object_method(
        bp.clazz_raw(),
        bp.method_id(),
        &[jvalue::object(loader), jvalue::object(interfaces)],
    );
    let mut ok = !result.is_null();
    if env.clear_exception() {
        ok = false;
    }
    trace_breakpoint(
        ctx,
        env,
        null(),
        null(),
        caller,
        bp.spec.method_name,
        TraceValue::Bool(ok),
        vec![TraceValue::Unknown, iface_names],
    );
    true
}

pub fn get_bundle_impl_jdk8(ctx: &AgentContext, env: &JniEnv, bp: &Breakpoint) -> bool {
    // The breakpointed method sits below getBundle(); the user caller is
    // two frames up.
    let caller = caller_class(ctx.jvmti(), 2);
    let base_name = arg(ctx, 0);
    let locale = arg(ctx, 1);
    let loader = arg(ctx, 2);
    let control = arg(ctx, 3);

    let result = env.call_static_object_method(
        bp.clazz_raw(),
        bp.method_id(),
        &[
            jvalue::object(base_name),
            jvalue::object(locale),
            jvalue::object(loader),
            jvalue::object(control),
        ],
    );
    let result = if env.clear_exception() { null() } else { result };
    trace_breakpoint(
        ctx,
        env,
        null(),
        null(),
        caller,
        "getBundleImplJDK8OrEarlier",
        TraceValue::Bool(!result.is_null()),
        vec![
            string_value(env, base_name),
            TraceValue::Unknown,
            TraceValue::Unknown,
            TraceValue::Unknown,
        ],
    );
    true
}

pub fn get_bundle_impl_jdk11(ctx: &AgentContext, env: &JniEnv, bp: &Breakpoint) -> bool {
    let jvmti = ctx.jvmti();
    // Stack shapes:
    //   getBundleImpl <- getBundleImpl <- getBundleImpl(S,L,C,C) <- getBundle <- caller
    //   getBundleImpl <- getBundle(Impl|FromModule) <- getBundle <- caller
    let intermediate = caller_frame(jvmti, 2).map(|(m, _)| m);
    let depth = match (intermediate, ctx.handles().bundle_get_bundle_impl_slcc(env)) {
        (Some(m), Some(trampoline)) if m == trampoline => 4,
        _ => 3,
    };
    let caller = caller_class(jvmti, depth);

    let caller_module = arg(ctx, 0);
    let module = arg(ctx, 1);
    let base_name = arg(ctx, 2);
    let locale = arg(ctx, 3);
    let control = arg(ctx, 4);

    let result = env.call_static_object_method(
        bp.clazz_raw(),
        bp.method_id(),
        &[
            jvalue::object(caller_module),
            jvalue::object(module),
            jvalue::object(base_name),
            jvalue::object(locale),
            jvalue::object(control),
        ],
    );
    let result = if env.clear_exception() { null() } else { result };
    trace_breakpoint(
        ctx,
        env,
        null(),
        null(),
        caller,
        "getBundleImplJDK11OrLater",
        TraceValue::Bool(!result.is_null()),
        vec![
            TraceValue::Unknown,
            TraceValue::Unknown,
            string_value(env, base_name),
            TraceValue::Unknown,
            TraceValue::Unknown,
        ],
    );
    true
}

pub fn object_field_offset(ctx: &AgentContext, env: &JniEnv, bp: &Breakpoint) -> bool {
    let caller = direct_caller_class(ctx.jvmti());
    let receiver = arg(ctx, 0);
    let field = arg(ctx, 1);

    env.call_long_method(receiver, bp.method_id(), &[jvalue::object(field)]);
    let valid = !env.clear_exception();

    let (name, declaring) = field_name_and_declaring(ctx, env, field);
    verify_and_trace_object_field_offset(ctx, env, valid, name, declaring, bp.method_id(), caller)
}

pub fn object_field_offset_by_name(ctx: &AgentContext, env: &JniEnv, bp: &Breakpoint) -> bool {
    let caller = direct_caller_class(ctx.jvmti());
    let receiver = arg(ctx, 0);
    let declaring = arg(ctx, 1);
    let name = arg(ctx, 2);

    env.call_long_method(
        receiver,
        bp.method_id(),
        &[jvalue::object(declaring), jvalue::object(name)],
    );
    let valid = !env.clear_exception();
    verify_and_trace_object_field_offset(ctx, env, valid, name, declaring, bp.method_id(), caller)
}

/// Reads `Field.getName()` and `Field.getDeclaringClass()` of a reflective
/// field argument, degrading each to null on failure.
pub(super) fn field_name_and_declaring(
    ctx: &AgentContext,
    env: &JniEnv,
    field: jobject,
) -> (jobject, jobject) {
    let handles = ctx.handles();
    let mut name = null();
    let mut declaring = null();
    if !field.is_null() {
        name = env.call_object_method(field, handles.member_get_name(), &[]);
        if env.clear_exception() {
            name = null();
        }
        declaring = env.call_object_method(field, handles.member_get_declaring_class(), &[]);
        if env.clear_exception() {
            declaring = null();
        }
    }
    (name, declaring)
}

pub(super) fn verify_and_trace_object_field_offset(
    ctx: &AgentContext,
    env: &JniEnv,
    valid: bool,
    name: jobject,
    declaring: jobject,
    current_method: aotrace_jvmti::sys::jni::jmethodID,
    caller: jobject,
) -> bool {
    let clazz = declaring_class(ctx.jvmti(), current_method);
    trace_breakpoint(
        ctx,
        env,
        clazz,
        declaring,
        caller,
        "objectFieldOffset",
        TraceValue::Bool(valid),
        vec![string_value(env, name)],
    );
    true
}

/// Outcome filter for method-handle lookups: a failed lookup still counts
/// when it failed with IllegalAccessException, so the image builder
/// registers the member and the same exception is thrown at runtime
/// instead of a missing-member error.
fn should_include_method(ctx: &AgentContext, env: &JniEnv, result: jobject) -> bool {
    if let Some(exception) = env.exception_occurred() {
        env.exception_clear();
        return env.is_instance_of(
            exception,
            ctx.handles().java_lang_illegal_access_exception.as_raw(),
        );
    }
    !result.is_null()
}

/// `MethodType.parameterArray()` of a method type argument, or null.
fn param_types(ctx: &AgentContext, env: &JniEnv, method_type: jobject) -> jobject {
    let Some(mid) = ctx.handles().method_type_parameter_array(env) else {
        return null();
    };
    let params = env.call_object_method(method_type, mid, &[]);
    if env.clear_exception() {
        null()
    } else {
        params
    }
}

fn trace_method_handle(
    ctx: &AgentContext,
    env: &JniEnv,
    declaring: jobject,
    caller: jobject,
    name: jobject,
    param_types_array: jobject,
    ok: bool,
) -> bool {
    trace_breakpoint(
        ctx,
        env,
        declaring,
        null(),
        caller,
        "findMethodHandle",
        TraceValue::Bool(ok),
        vec![
            string_value(env, name),
            class_array_names(env, ctx.handles(), param_types_array),
        ],
    );
    true
}

pub fn find_method_handle(ctx: &AgentContext, env: &JniEnv, bp: &Breakpoint) -> bool {
    let caller = direct_caller_class(ctx.jvmti());
    let lookup = arg(ctx, 0);
    let declaring = arg(ctx, 1);
    let name = arg(ctx, 2);
    let method_type = arg(ctx, 3);

    let result = env.call_object_method(
        lookup,
        bp.method_id(),
        &[
            jvalue::object(declaring),
            jvalue::object(name),
            jvalue::object(method_type),
        ],
    );
    let ok = should_include_method(ctx, env, result);
    trace_method_handle(
        ctx,
        env,
        declaring,
        caller,
        name,
        param_types(ctx, env, method_type),
        ok,
    )
}

pub fn find_special_handle(ctx: &AgentContext, env: &JniEnv, bp: &Breakpoint) -> bool {
    let caller = direct_caller_class(ctx.jvmti());
    let lookup = arg(ctx, 0);
    let declaring = arg(ctx, 1);
    let name = arg(ctx, 2);
    let method_type = arg(ctx, 3);
    let special_caller = arg(ctx, 4);

    let result = env.call_object_method(
        lookup,
        bp.method_id(),
        &[
            jvalue::object(declaring),
            jvalue::object(name),
            jvalue::object(method_type),
            jvalue::object(special_caller),
        ],
    );
    let ok = should_include_method(ctx, env, result);
    trace_method_handle(
        ctx,
        env,
        declaring,
        caller,
        name,
        param_types(ctx, env, method_type),
        ok,
    )
}

pub fn bind_handle(ctx: &AgentContext, env: &JniEnv, bp: &Breakpoint) -> bool {
    let caller = direct_caller_class(ctx.jvmti());
    let lookup = arg(ctx, 0);
    let receiver = arg(ctx, 1);
    let name = arg(ctx, 2);
    let method_type = arg(ctx, 3);

    let result = env.call_object_method(
        lookup,
        bp.method_id(),
        &[
            jvalue::object(receiver),
            jvalue::object(name),
            jvalue::object(method_type),
        ],
    );
    let ok = should_include_method(ctx, env, result);

    let mut declaring = null();
    if !receiver.is_null() {
        declaring = env.get_object_class(receiver);
        if env.clear_exception() {
            declaring = null();
        }
    }
    trace_method_handle(
        ctx,
        env,
        declaring,
        caller,
        name,
        param_types(ctx, env, method_type),
        ok,
    )
}

pub fn find_constructor_handle(ctx: &AgentContext, env: &JniEnv, bp: &Breakpoint) -> bool {
    let caller = direct_caller_class(ctx.jvmti());
    let lookup = arg(ctx, 0);
    let declaring = arg(ctx, 1);
    let method_type = arg(ctx, 2);

    let result = env.call_object_method(
        lookup,
        bp.method_id(),
        &[jvalue::object(declaring), jvalue::object(method_type)],
    );
    let ok = should_include_method(ctx, env, result);
    let params = class_array_names(env, ctx.handles(), param_types(ctx, env, method_type));
    trace_breakpoint(
        ctx,
        env,
        declaring,
        null(),
        caller,
        "findConstructorHandle",
        TraceValue::Bool(ok),
        vec![params],
    );
    true
}

pub fn find_field_handle(ctx: &AgentContext, env: &JniEnv, bp: &Breakpoint) -> bool {
    let caller = direct_caller_class(ctx.jvmti());
    let lookup = arg(ctx, 0);
    let declaring = arg(ctx, 1);
    let name = arg(ctx, 2);
    let field_type = arg(ctx, 3);

    let result = env.call_object_method(
        lookup,
        bp.method_id(),
        &[
            jvalue::object(declaring),
            jvalue::object(name),
            jvalue::object(field_type),
        ],
    );
    let ok = should_include_method(ctx, env, result);
    trace_breakpoint(
        ctx,
        env,
        declaring,
        null(),
        caller,
        "findFieldHandle",
        TraceValue::Bool(ok),
        vec![string_value(env, name)],
    );
    true
}

pub fn find_class_on_lookup(ctx: &AgentContext, env: &JniEnv, bp: &Breakpoint) -> bool {
    let caller = direct_caller_class(ctx.jvmti());
    let lookup = arg(ctx, 0);
    let class_name_arg = arg(ctx, 1);

    let result =
        env.call_object_method(lookup, bp.method_id(), &[jvalue::object(class_name_arg)]);
    let ok = should_include_method(ctx, env, result);
    trace_breakpoint(
        ctx,
        env,
        bp.clazz_raw(),
        null(),
        caller,
        "findClass",
        TraceValue::Bool(ok),
        vec![string_value(env, class_name_arg)],
    );
    true
}

pub fn unreflect_field(ctx: &AgentContext, env: &JniEnv, bp: &Breakpoint) -> bool {
    let caller = direct_caller_class(ctx.jvmti());
    let lookup = arg(ctx, 0);
    let field = arg(ctx, 1);

    let result = env.call_object_method(lookup, bp.method_id(), &[jvalue::object(field)]);
    let ok = should_include_method(ctx, env, result);

    let (name, declaring) = field_name_and_declaring(ctx, env, field);
    trace_breakpoint(
        ctx,
        env,
        declaring,
        null(),
        caller,
        "unreflectField",
        TraceValue::Bool(ok),
        vec![string_value(env, name)],
    );
    true
}

pub fn as_interface_instance(ctx: &AgentContext, env: &JniEnv, bp: &Breakpoint) -> bool {
    let caller = direct_caller_class(ctx.jvmti());
    let interface = arg(ctx, 0);
    let method_handle = arg(ctx, 1);

    let result = env.call_static_object_method(
        bp.clazz_raw(),
        bp.method_id(),
        &[jvalue::object(interface), jvalue::object(method_handle)],
    );
    let ok = should_include_method(ctx, env, result);

    let interface_name = class_name(env, ctx.handles(), interface);
    trace_breakpoint(
        ctx,
        env,
        interface,
        null(),
        caller,
        "asInterfaceInstance",
        TraceValue::Bool(ok),
        vec![],
    );
    // The proxy class itself is registered under a separate operation.
    let names = TraceValue::List(vec![interface_name
        .map(TraceValue::Str)
        .unwrap_or(TraceValue::Null)]);
    trace_breakpoint(
        ctx,
        env,
        null(),
        null(),
        caller,
        "newMethodHandleProxyInstance",
        TraceValue::Bool(ok),
        vec![names],
    );
    true
}

pub fn constant_bootstrap_get_static_final(
    ctx: &AgentContext,
    env: &JniEnv,
    bp: &Breakpoint,
) -> bool {
    let caller = direct_caller_class(ctx.jvmti());
    let lookup = arg(ctx, 0);
    let field_name = arg(ctx, 1);
    let field_type = arg(ctx, 2);
    let declaring = arg(ctx, 3);

    let result = env.call_static_object_method(
        bp.clazz_raw(),
        bp.method_id(),
        &[
            jvalue::object(lookup),
            jvalue::object(field_name),
            jvalue::object(field_type),
            jvalue::object(declaring),
        ],
    );
    let ok = should_include_method(ctx, env, result);
    trace_breakpoint(
        ctx,
        env,
        declaring,
        null(),
        caller,
        "findFieldHandle",
        TraceValue::Bool(ok),
        vec![string_value(env, field_name)],
    );
    true
}

pub fn method_type_from_descriptor(ctx: &AgentContext, env: &JniEnv, bp: &Breakpoint) -> bool {
    let handles = ctx.handles();
    let caller = direct_caller_class(ctx.jvmti());
    let descriptor = arg(ctx, 0);
    let loader = arg(ctx, 1);

    let result = env.call_static_object_method(
        bp.clazz_raw(),
        bp.method_id(),
        &[jvalue::object(descriptor), jvalue::object(loader)],
    );
    let result = if env.clear_exception() { null() } else { result };

    let mut types = Vec::new();
    if !result.is_null() {
        if let Some(mid) = handles.method_type_return_type(env) {
            let rtype = env.call_object_method(result, mid, &[]);
            let rtype = if env.clear_exception() { null() } else { rtype };
            if let Some(name) = class_name(env, handles, rtype) {
                types.push(TraceValue::Str(name));
            }
        }
        if let TraceValue::List(params) =
            class_array_names(env, handles, param_types(ctx, env, result))
        {
            types.extend(params);
        }
    }
    trace_breakpoint(
        ctx,
        env,
        null(),
        null(),
        caller,
        "methodTypeDescriptor",
        TraceValue::Bool(!result.is_null()),
        vec![TraceValue::List(types)],
    );
    true
}

pub fn object_stream_class_constructor(ctx: &AgentContext, env: &JniEnv, bp: &Breakpoint) -> bool {
    let handles = ctx.handles();
    // Constructor frame: slot 0 is `this`, slot 1 the serialization target.
    let target = arg(ctx, 1);
    let target_name = class_name(env, handles, target);

    let instance = env.new_object(bp.clazz_raw(), bp.method_id(), &[jvalue::object(target)]);
    let mut valid = !instance.is_null();
    if env.clear_exception() {
        valid = false;
    }

    // Synthetic lambda classes cannot be registered for serialization.
    if target_name
        .as_deref()
        .is_some_and(|name| name.contains("$$Lambda$"))
    {
        return true;
    }

    let mut transitive_targets = vec![target_name];

    // Constructing an ObjectStreamClass recursively creates descriptors
    // for the serializable supertypes; the class data layout lists them.
    if valid {
        if let Some(layout_mid) = handles.osc_get_class_data_layout0(env) {
            let layout = env.call_object_method(instance, layout_mid, &[]);
            let layout = if env.clear_exception() { null() } else { layout };
            if !layout.is_null() {
                let length = env.get_array_length(layout);
                let length = if env.clear_exception() { 0 } else { length };
                // A single element is the descriptor itself.
                if length > 1 {
                    collect_layout_targets(
                        ctx,
                        env,
                        instance,
                        layout,
                        length,
                        &mut transitive_targets,
                    );
                }
            }
        }
    }

    for name in transitive_targets {
        let record = TraceRecord::serialization("ObjectStreamClass.<init>")
            .result(valid)
            .args(vec![
                name.map(TraceValue::Str).unwrap_or(TraceValue::Null),
                // No custom target constructor observed through this path.
                TraceValue::Null,
            ]);
        ctx.sink().trace_call(record);
        if env.exception_check() {
            fatal!("pending exception after tracing ObjectStreamClass.<init>");
        }
    }
    true
}

fn collect_layout_targets(
    ctx: &AgentContext,
    env: &JniEnv,
    instance: jobject,
    layout: jobject,
    length: i32,
    targets: &mut Vec<Option<String>>,
) {
    let handles = ctx.handles();
    let (Some(has_data_fid), Some(desc_fid), Some(for_class_mid)) = (
        handles.class_data_slot_has_data(env),
        handles.class_data_slot_desc(env),
        handles.osc_for_class(env),
    ) else {
        return;
    };
    for i in 0..length {
        let slot = env.get_object_array_element(layout, i);
        if env.clear_exception() || slot.is_null() {
            continue;
        }
        if !env.get_boolean_field(slot, has_data_fid) {
            continue;
        }
        let descriptor = env.get_object_field(slot, desc_fid);
        if descriptor.is_null() || env.is_same_object(descriptor, instance) {
            continue;
        }
        let target_class = env.call_object_method(descriptor, for_class_mid, &[]);
        let target_class = if env.clear_exception() {
            null()
        } else {
            target_class
        };
        targets.push(class_name(env, handles, target_class));
    }
}
