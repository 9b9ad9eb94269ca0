//! Tracing of dynamically generated class definitions.
//!
//! Every class definition passes through the class-file load hook. A
//! definition counts as dynamically generated when a user loader defines
//! it without a name, or when the name is not visible as a `.class`
//! resource of that loader. The class bytes are never modified.

use std::ffi::CStr;
use std::os::raw::{c_char, c_uchar};

use aotrace_jvmti::sys::jni::{jclass, jint, jobject, jvalue, JNIEnv};
use aotrace_jvmti::sys::jvmti::jvmtiEnv;
use aotrace_jvmti::JniEnv;
use aotrace_protocol::{TraceRecord, TraceValue};

use crate::constant_pool::class_name_from_bytes;
use crate::AgentContext;

pub(crate) unsafe extern "system" fn on_class_file_load_hook(
    _jvmti: *mut jvmtiEnv,
    jni: *mut JNIEnv,
    _class_being_redefined: jclass,
    loader: jobject,
    name: *const c_char,
    _protection_domain: jobject,
    class_data_len: jint,
    class_data: *const c_uchar,
    _new_class_data_len: *mut jint,
    _new_class_data: *mut *mut c_uchar,
) {
    let Some(ctx) = crate::context() else {
        return;
    };
    // Handle resolution happens at VM init; definitions before that are
    // never user-generated.
    if !ctx.is_live() {
        return;
    }
    let env = JniEnv::from_raw(jni);
    let supplied_name = if name.is_null() {
        None
    } else {
        Some(CStr::from_ptr(name).to_string_lossy().into_owned())
    };
    if !is_dynamically_generated(ctx, &env, loader, supplied_name.as_deref()) {
        return;
    }
    let bytes = std::slice::from_raw_parts(class_data, class_data_len.max(0) as usize);
    let internal_name = supplied_name.or_else(|| class_name_from_bytes(bytes).ok());
    let clazz = match internal_name {
        Some(name) => TraceValue::Str(name.replace('/', ".")),
        None => TraceValue::Unknown,
    };
    ctx.sink()
        .trace_call(TraceRecord::reflect("defineClass").clazz(clazz).result(true));
}

fn is_dynamically_generated(
    ctx: &AgentContext,
    env: &JniEnv,
    loader: jobject,
    name: Option<&str>,
) -> bool {
    // Boot classpath definitions carry a null loader.
    if loader.is_null() {
        return false;
    }
    // No name before defining: certainly generated.
    let Some(name) = name else {
        return true;
    };
    // A dynamically defined class is never visible as a class file
    // resource of its own loader. getResource is itself instrumented, so
    // this probe is traced like any other resource lookup.
    let resource_name = format!("{}.class", name.replace('.', "/"));
    let Some(jname) = env.new_string_utf(&resource_name) else {
        return false;
    };
    let url = env.call_object_method(
        loader,
        ctx.handles().class_loader_get_resource(),
        &[jvalue::object(jname)],
    );
    if env.clear_exception() {
        return false;
    }
    url.is_null()
}
