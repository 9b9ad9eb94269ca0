//! Safe wrapper around the JNI environment.
//!
//! A [`JniEnv`] is valid only on the thread that received it from the host;
//! it is deliberately neither `Send` nor `Sync`. Long-lived references use
//! [`GlobalRef`], which the host guarantees to be usable from any thread.

use std::ffi::{CStr, CString};

use crate::sys::jni::{self, jvalue, JNINativeInterface_, JNINativeMethod};

pub struct JniEnv {
    env: *mut jni::JNIEnv,
}

impl JniEnv {
    /// # Safety
    /// `env` must be the JNI environment of the current thread.
    pub unsafe fn from_raw(env: *mut jni::JNIEnv) -> Self {
        JniEnv { env }
    }

    pub fn raw(&self) -> *mut jni::JNIEnv {
        self.env
    }

    fn fns(&self) -> &JNINativeInterface_ {
        unsafe { &*(*self.env).functions }
    }

    // --- classes and members ---

    /// Finds a class by internal name (e.g. "java/lang/String").
    pub fn find_class(&self, name: &str) -> Option<jni::jclass> {
        let cname = CString::new(name).ok()?;
        let cls = unsafe { (self.fns().FindClass)(self.env, cname.as_ptr()) };
        if cls.is_null() {
            None
        } else {
            Some(cls)
        }
    }

    pub fn get_method_id(
        &self,
        cls: jni::jclass,
        name: &str,
        sig: &str,
    ) -> Option<jni::jmethodID> {
        let cname = CString::new(name).ok()?;
        let csig = CString::new(sig).ok()?;
        let id = unsafe { (self.fns().GetMethodID)(self.env, cls, cname.as_ptr(), csig.as_ptr()) };
        if id.is_null() {
            None
        } else {
            Some(id)
        }
    }

    pub fn get_static_method_id(
        &self,
        cls: jni::jclass,
        name: &str,
        sig: &str,
    ) -> Option<jni::jmethodID> {
        let cname = CString::new(name).ok()?;
        let csig = CString::new(sig).ok()?;
        let id = unsafe {
            (self.fns().GetStaticMethodID)(self.env, cls, cname.as_ptr(), csig.as_ptr())
        };
        if id.is_null() {
            None
        } else {
            Some(id)
        }
    }

    pub fn get_field_id(&self, cls: jni::jclass, name: &str, sig: &str) -> Option<jni::jfieldID> {
        let cname = CString::new(name).ok()?;
        let csig = CString::new(sig).ok()?;
        let id = unsafe { (self.fns().GetFieldID)(self.env, cls, cname.as_ptr(), csig.as_ptr()) };
        if id.is_null() {
            None
        } else {
            Some(id)
        }
    }

    pub fn from_reflected_method(&self, method: jni::jobject) -> jni::jmethodID {
        unsafe { (self.fns().FromReflectedMethod)(self.env, method) }
    }

    // --- object inspection ---

    pub fn get_object_class(&self, obj: jni::jobject) -> jni::jclass {
        unsafe { (self.fns().GetObjectClass)(self.env, obj) }
    }

    pub fn is_instance_of(&self, obj: jni::jobject, cls: jni::jclass) -> bool {
        unsafe { (self.fns().IsInstanceOf)(self.env, obj, cls) != jni::JNI_FALSE }
    }

    pub fn is_assignable_from(&self, sub: jni::jclass, sup: jni::jclass) -> bool {
        unsafe { (self.fns().IsAssignableFrom)(self.env, sub, sup) != jni::JNI_FALSE }
    }

    pub fn is_same_object(&self, a: jni::jobject, b: jni::jobject) -> bool {
        unsafe { (self.fns().IsSameObject)(self.env, a, b) != jni::JNI_FALSE }
    }

    // --- calls ---

    pub fn call_object_method(
        &self,
        obj: jni::jobject,
        method: jni::jmethodID,
        args: &[jvalue],
    ) -> jni::jobject {
        unsafe { (self.fns().CallObjectMethodA)(self.env, obj, method, args.as_ptr()) }
    }

    pub fn call_boolean_method(
        &self,
        obj: jni::jobject,
        method: jni::jmethodID,
        args: &[jvalue],
    ) -> bool {
        unsafe {
            (self.fns().CallBooleanMethodA)(self.env, obj, method, args.as_ptr())
                != jni::JNI_FALSE
        }
    }

    pub fn call_long_method(
        &self,
        obj: jni::jobject,
        method: jni::jmethodID,
        args: &[jvalue],
    ) -> jni::jlong {
        unsafe { (self.fns().CallLongMethodA)(self.env, obj, method, args.as_ptr()) }
    }

    pub fn call_static_object_method(
        &self,
        cls: jni::jclass,
        method: jni::jmethodID,
        args: &[jvalue],
    ) -> jni::jobject {
        unsafe { (self.fns().CallStaticObjectMethodA)(self.env, cls, method, args.as_ptr()) }
    }

    pub fn new_object(
        &self,
        cls: jni::jclass,
        ctor: jni::jmethodID,
        args: &[jvalue],
    ) -> jni::jobject {
        unsafe { (self.fns().NewObjectA)(self.env, cls, ctor, args.as_ptr()) }
    }

    // --- fields ---

    pub fn get_object_field(&self, obj: jni::jobject, field: jni::jfieldID) -> jni::jobject {
        unsafe { (self.fns().GetObjectField)(self.env, obj, field) }
    }

    pub fn get_boolean_field(&self, obj: jni::jobject, field: jni::jfieldID) -> bool {
        unsafe { (self.fns().GetBooleanField)(self.env, obj, field) != jni::JNI_FALSE }
    }

    // --- exceptions ---

    pub fn exception_check(&self) -> bool {
        unsafe { (self.fns().ExceptionCheck)(self.env) != jni::JNI_FALSE }
    }

    pub fn exception_clear(&self) {
        unsafe { (self.fns().ExceptionClear)(self.env) }
    }

    pub fn exception_occurred(&self) -> Option<jni::jthrowable> {
        let t = unsafe { (self.fns().ExceptionOccurred)(self.env) };
        if t.is_null() {
            None
        } else {
            Some(t)
        }
    }

    /// Clears a pending exception and reports whether one was pending.
    pub fn clear_exception(&self) -> bool {
        if self.exception_check() {
            self.exception_clear();
            true
        } else {
            false
        }
    }

    // --- strings and arrays ---

    pub fn new_string_utf(&self, s: &str) -> Option<jni::jstring> {
        let cs = CString::new(s).ok()?;
        let js = unsafe { (self.fns().NewStringUTF)(self.env, cs.as_ptr()) };
        if js.is_null() {
            None
        } else {
            Some(js)
        }
    }

    /// Copies a Java string into a Rust `String` (modified-UTF-8 is accepted
    /// leniently).
    pub fn get_string_utf(&self, s: jni::jstring) -> Option<String> {
        if s.is_null() {
            return None;
        }
        unsafe {
            let chars = (self.fns().GetStringUTFChars)(self.env, s, std::ptr::null_mut());
            if chars.is_null() {
                return None;
            }
            let out = CStr::from_ptr(chars).to_string_lossy().into_owned();
            (self.fns().ReleaseStringUTFChars)(self.env, s, chars);
            Some(out)
        }
    }

    pub fn get_array_length(&self, array: jni::jarray) -> jni::jsize {
        unsafe { (self.fns().GetArrayLength)(self.env, array) }
    }

    pub fn get_object_array_element(
        &self,
        array: jni::jobjectArray,
        index: jni::jsize,
    ) -> jni::jobject {
        unsafe { (self.fns().GetObjectArrayElement)(self.env, array, index) }
    }

    // --- references ---

    pub fn delete_local_ref(&self, obj: jni::jobject) {
        unsafe { (self.fns().DeleteLocalRef)(self.env, obj) }
    }

    // --- native registration ---

    pub fn register_natives(
        &self,
        cls: jni::jclass,
        methods: &[JNINativeMethod],
    ) -> Result<(), jni::jint> {
        let rc = unsafe {
            (self.fns().RegisterNatives)(self.env, cls, methods.as_ptr(), methods.len() as jni::jint)
        };
        if rc == jni::JNI_OK {
            Ok(())
        } else {
            Err(rc)
        }
    }
}

/// Owned global reference pinning a runtime object against reclamation.
///
/// Global references are valid on every thread, so the handle is `Send` and
/// `Sync`; deleting one requires a JNI environment again, hence the explicit
/// [`GlobalRef::release`] instead of `Drop`. The agent releases all tracked
/// references during VM death.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GlobalRef {
    raw: jni::jobject,
}

unsafe impl Send for GlobalRef {}
unsafe impl Sync for GlobalRef {}

impl GlobalRef {
    /// Pins `obj`; returns `None` when the host could not create the
    /// reference (out of memory).
    pub fn new(env: &JniEnv, obj: jni::jobject) -> Option<Self> {
        let raw = unsafe { ((*(*env.raw()).functions).NewGlobalRef)(env.raw(), obj) };
        if raw.is_null() {
            None
        } else {
            Some(GlobalRef { raw })
        }
    }

    pub fn as_raw(&self) -> jni::jobject {
        self.raw
    }

    pub fn release(self, env: &JniEnv) {
        unsafe { ((*(*env.raw()).functions).DeleteGlobalRef)(env.raw(), self.raw) }
    }
}
