//! Classloader instrumentation.
//!
//! A breakpoint on `ClassLoader.loadClass` would fire for every VM-driven
//! class load. Each call site is therefore classified once: only sites
//! whose caller bytecode really contains an `invokevirtual` of
//! `loadClass(String)` are traced; everything else is skipped forever.

use std::ptr;

use aotrace_jvmti::sys::jni::{jclass, jmethodID, jthread, jvalue, JNIEnv};
use aotrace_jvmti::sys::jvmti::jvmtiEnv;
use aotrace_jvmti::{GlobalRef, JniEnv};
use aotrace_protocol::TraceValue;
use log::debug;

use super::{
    insert_breakpoint, resolve_breakpoint_method, trace_breakpoint, Breakpoint, BreakpointSpec,
    MethodKey, MethodLocation, LOAD_CLASS_SPEC,
};
use crate::constant_pool::ConstantPool;
use crate::fatal;
use crate::support::{caller_frame, class_name, declaring_class, object_argument, string_value};
use crate::AgentContext;

const INVOKEVIRTUAL: u8 = 0xb6;

pub fn load_class(ctx: &AgentContext, env: &JniEnv, bp: &Breakpoint) -> bool {
    let jvmti = ctx.jvmti();
    let mut caller = ptr::null_mut();
    if let Some((caller_method, location)) = caller_frame(jvmti, 1) {
        caller = declaring_class(jvmti, caller_method);
        if !caller.is_null()
            && env.is_assignable_from(caller, ctx.handles().java_lang_class_loader.as_raw())
        {
            // Recursive loader delegation; the root invocation was already
            // observed.
            return true;
        }
        let site = MethodLocation {
            method: caller_method as MethodKey,
            bci: location as i32,
        };
        let already_explicit = ctx
            .explicit_load_class_sites
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(&site);
        if !already_explicit {
            if !is_load_class_invocation(ctx, env, caller, caller_method, site.bci, bp.spec) {
                return true;
            }
            ctx.explicit_load_class_sites
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .insert(site);
        }
    }

    let receiver = object_argument(jvmti, 0).unwrap_or(ptr::null_mut());
    let name = object_argument(jvmti, 1).unwrap_or(ptr::null_mut());
    let name_value = string_value(env, name);
    let loaded = env.call_object_method(receiver, bp.method_id(), &[jvalue::object(name)]);
    let loaded = if env.clear_exception() {
        ptr::null_mut()
    } else {
        loaded
    };
    trace_breakpoint(
        ctx,
        env,
        bp.clazz_raw(),
        ptr::null_mut(),
        caller,
        bp.spec.method_name,
        TraceValue::Bool(!loaded.is_null()),
        vec![name_value],
    );
    true
}

/// Reads the constant pool index of an `invokevirtual` at `bci`, if that
/// is what the bytecode contains.
fn explicit_invoke_cpi(bytecodes: &[u8], bci: usize) -> Option<u16> {
    if bci + 2 >= bytecodes.len() {
        return None;
    }
    if bytecodes[bci] != INVOKEVIRTUAL {
        return None;
    }
    Some(u16::from_be_bytes([bytecodes[bci + 1], bytecodes[bci + 2]]))
}

/// True when the caller's bytecode at `bci` is an explicit invocation of
/// the hooked signature. Per JVMS 5.5 an `invokevirtual` alone should not
/// trigger class loading, yet it happens, so the invoked method reference
/// is checked as well.
fn is_load_class_invocation(
    ctx: &AgentContext,
    _env: &JniEnv,
    caller_class: jclass,
    method: jmethodID,
    bci: i32,
    spec: &BreakpointSpec,
) -> bool {
    let jvmti = ctx.jvmti();
    let cpi = {
        let Ok(bytecodes) = jvmti.get_bytecodes(method) else {
            return false;
        };
        match explicit_invoke_cpi(&bytecodes, bci as usize) {
            Some(cpi) => cpi,
            None => return false,
        }
    };
    let Ok((entry_count, pool_bytes)) = jvmti.get_constant_pool(caller_class) else {
        return false;
    };
    let Ok(pool) = ConstantPool::parse(&pool_bytes, entry_count as u16) else {
        // Unsupported class file format; never classify this site.
        return false;
    };
    match pool.read_method_ref(cpi) {
        Ok(method_ref) => {
            method_ref.name == spec.method_name && method_ref.descriptor == spec.signature
        }
        Err(_) => false,
    }
}

/// Instruments `loadClass(String)` in `clazz` when it is a classloader.
pub(crate) fn install_if_class_loader(ctx: &AgentContext, env: &JniEnv, clazz: jclass) {
    let handles = ctx.handles();
    if !env.is_assignable_from(clazz, handles.java_lang_class_loader.as_raw()) {
        return;
    }
    let Some(name) = class_name(env, handles, clazz) else {
        return;
    };
    let Some(method) = resolve_breakpoint_method(env, clazz, &LOAD_CLASS_SPEC) else {
        return;
    };
    // Subclasses that do not override loadClass resolve to an already
    // instrumented method; the host rejects the second breakpoint.
    if ctx.jvmti().set_breakpoint(method, 0).is_err() {
        return;
    }
    let Some(global) = GlobalRef::new(env, clazz) else {
        fatal!("failed to pin classloader {}", name);
    };
    ctx.track(global);
    insert_breakpoint(
        ctx,
        Breakpoint {
            spec: &LOAD_CLASS_SPEC,
            clazz: global,
            method: method as MethodKey,
        },
    );
    debug!("instrumented loadClass in {}", name);
}

/// Initial sweep over everything already loaded when the VM comes up.
pub(crate) fn install_in_loaded_classloaders(ctx: &AgentContext, env: &JniEnv) {
    let classes = match ctx.jvmti().get_loaded_classes() {
        Ok(classes) => classes,
        Err(e) => fatal!("enumerating loaded classes failed: {}", e),
    };
    for clazz in classes {
        install_if_class_loader(ctx, env, clazz);
        env.delete_local_ref(clazz);
    }
}

/// Class-prepare event entry; only enabled in discovery mode.
pub(crate) unsafe extern "system" fn on_class_prepare(
    _jvmti: *mut jvmtiEnv,
    jni: *mut JNIEnv,
    _thread: jthread,
    klass: jclass,
) {
    let Some(ctx) = crate::context() else {
        return;
    };
    if !ctx.is_live() {
        return;
    }
    let env = JniEnv::from_raw(jni);
    install_if_class_loader(ctx, &env, klass);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invokevirtual_site_yields_pool_index() {
        // aload_0, aload_1, invokevirtual #0x0102, areturn
        let code = [0x2a, 0x2b, 0xb6, 0x01, 0x02, 0xb0];
        assert_eq!(explicit_invoke_cpi(&code, 2), Some(0x0102));
    }

    #[test]
    fn test_other_opcodes_are_rejected() {
        // invokespecial at the probed index
        let code = [0x2a, 0x2b, 0xb7, 0x00, 0x05, 0xb0];
        assert_eq!(explicit_invoke_cpi(&code, 2), None);
    }

    #[test]
    fn test_truncated_operands_are_rejected() {
        let code = [0xb6, 0x00];
        assert_eq!(explicit_invoke_cpi(&code, 0), None);
        assert_eq!(explicit_invoke_cpi(&[], 0), None);
    }
}
