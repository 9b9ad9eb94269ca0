//! Shared helpers for interception handlers: caller frames, argument
//! extraction, and name conversion through the host interface.

use std::ptr;

use aotrace_jvmti::sys::jni::{jint, jmethodID, jobject};
use aotrace_jvmti::sys::jvmti::jlocation;
use aotrace_jvmti::{JniEnv, Jvmti};
use aotrace_protocol::TraceValue;

use crate::handles::Handles;

/// Abort the process with a diagnostic. Invariant violations must not be
/// reported into the traced application.
#[macro_export]
macro_rules! fatal {
    ($($arg:tt)*) => {{
        log::error!($($arg)*);
        std::process::abort();
    }};
}

/// Reads the method and bytecode index of the caller frame at `depth`
/// (0 is the intercepted method itself).
pub fn caller_frame(jvmti: &Jvmti, depth: jint) -> Option<(jmethodID, jlocation)> {
    jvmti.get_frame_location(ptr::null_mut(), depth).ok()
}

/// Declaring class of the frame at `depth`, or null.
pub fn caller_class(jvmti: &Jvmti, depth: jint) -> jobject {
    match caller_frame(jvmti, depth) {
        Some((method, _)) => declaring_class(jvmti, method),
        None => ptr::null_mut(),
    }
}

/// Class of the frame directly above the intercepted method.
pub fn direct_caller_class(jvmti: &Jvmti) -> jobject {
    caller_class(jvmti, 1)
}

pub fn declaring_class(jvmti: &Jvmti, method: jmethodID) -> jobject {
    jvmti.get_method_declaring_class(method).unwrap_or(ptr::null_mut())
}

/// Reads an object argument of the stopped frame by local slot index.
/// Missing locals surface as `None`, never as a crash.
pub fn object_argument(jvmti: &Jvmti, slot: jint) -> Option<jobject> {
    jvmti.get_local_object(ptr::null_mut(), 0, slot).ok()
}

/// Binary name of `clazz` via `Class.getName()`, clearing any failure.
pub fn class_name(env: &JniEnv, handles: &Handles, clazz: jobject) -> Option<String> {
    if clazz.is_null() {
        return None;
    }
    let name = env.call_object_method(clazz, handles.java_lang_class_get_name(), &[]);
    if env.clear_exception() {
        return None;
    }
    env.get_string_utf(name)
}

/// Trace value for a class handle: explicit null stays null, an unreadable
/// name becomes the unknown sentinel.
pub fn class_name_value(env: &JniEnv, handles: &Handles, clazz: jobject) -> TraceValue {
    if clazz.is_null() {
        return TraceValue::Null;
    }
    match class_name(env, handles, clazz) {
        Some(name) => TraceValue::Str(name),
        None => TraceValue::Unknown,
    }
}

/// Trace value for a `java.lang.String` handle.
pub fn string_value(env: &JniEnv, s: jobject) -> TraceValue {
    if s.is_null() {
        return TraceValue::Null;
    }
    match env.get_string_utf(s) {
        Some(v) => TraceValue::Str(v),
        None => TraceValue::Unknown,
    }
}

/// Materialises a `Class[]` argument into a list of class names. A missing
/// array is null, an unreadable length is unknown, and each unreadable
/// element degrades to the unknown sentinel individually.
pub fn class_array_names(env: &JniEnv, handles: &Handles, array: jobject) -> TraceValue {
    if array.is_null() {
        return TraceValue::Null;
    }
    let length = env.get_array_length(array);
    if env.clear_exception() || length < 0 {
        return TraceValue::Unknown;
    }
    let mut names = Vec::with_capacity(length as usize);
    for i in 0..length {
        let clazz = env.get_object_array_element(array, i);
        if env.clear_exception() {
            names.push(TraceValue::Unknown);
        } else {
            names.push(class_name_value(env, handles, clazz));
        }
    }
    TraceValue::List(names)
}
