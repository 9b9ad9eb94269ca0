//! Safe wrapper around the JVMTI environment.

use std::ffi::CStr;
use std::ops::Deref;
use std::os::raw::{c_char, c_uchar, c_void};

use thiserror::Error;

use crate::sys::jni::{self, jclass, jmethodID, jobject, jthread, JavaVM};
use crate::sys::jvmti::{self, jlocation, jvmtiFrameInfo, jvmtiInterface_1_};

/// A JVMTI call failed. Carries the raw error code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("JVMTI error {code} ({name})", code = self.0, name = self.name())]
pub struct JvmtiError(pub jvmti::jvmtiError);

impl JvmtiError {
    pub fn name(&self) -> &'static str {
        match self.0 {
            jvmti::JVMTI_ERROR_INVALID_THREAD => "INVALID_THREAD",
            jvmti::JVMTI_ERROR_INVALID_CLASS => "INVALID_CLASS",
            jvmti::JVMTI_ERROR_INVALID_METHODID => "INVALID_METHODID",
            jvmti::JVMTI_ERROR_INVALID_LOCATION => "INVALID_LOCATION",
            jvmti::JVMTI_ERROR_INVALID_SLOT => "INVALID_SLOT",
            jvmti::JVMTI_ERROR_TYPE_MISMATCH => "TYPE_MISMATCH",
            jvmti::JVMTI_ERROR_DUPLICATE => "DUPLICATE",
            jvmti::JVMTI_ERROR_NOT_FOUND => "NOT_FOUND",
            jvmti::JVMTI_ERROR_NO_MORE_FRAMES => "NO_MORE_FRAMES",
            jvmti::JVMTI_ERROR_OPAQUE_FRAME => "OPAQUE_FRAME",
            jvmti::JVMTI_ERROR_ABSENT_INFORMATION => "ABSENT_INFORMATION",
            jvmti::JVMTI_ERROR_NOT_AVAILABLE => "NOT_AVAILABLE",
            jvmti::JVMTI_ERROR_MUST_POSSESS_CAPABILITY => "MUST_POSSESS_CAPABILITY",
            jvmti::JVMTI_ERROR_NULL_POINTER => "NULL_POINTER",
            jvmti::JVMTI_ERROR_WRONG_PHASE => "WRONG_PHASE",
            jvmti::JVMTI_ERROR_OUT_OF_MEMORY => "OUT_OF_MEMORY",
            jvmti::JVMTI_ERROR_INTERNAL => "INTERNAL",
            _ => "UNKNOWN",
        }
    }
}

fn check(err: jvmti::jvmtiError) -> Result<(), JvmtiError> {
    if err == jvmti::JVMTI_ERROR_NONE {
        Ok(())
    } else {
        Err(JvmtiError(err))
    }
}

/// Safe wrapper around a JVMTI environment pointer.
///
/// JVMTI environments, unlike JNI ones, may be used from any attached
/// thread.
#[derive(Clone, Copy)]
pub struct Jvmti {
    env: *mut jvmti::jvmtiEnv,
}

unsafe impl Send for Jvmti {}
unsafe impl Sync for Jvmti {}

impl Jvmti {
    /// # Safety
    /// `env` must be a live JVMTI environment.
    pub unsafe fn from_raw(env: *mut jvmti::jvmtiEnv) -> Self {
        Jvmti { env }
    }

    /// Obtains a JVMTI environment from the VM during `Agent_OnLoad`.
    pub fn from_vm(vm: *mut JavaVM) -> Result<Self, jni::jint> {
        let mut env: *mut c_void = std::ptr::null_mut();
        let rc = unsafe { ((*(*vm).functions).GetEnv)(vm, &mut env, jvmti::JVMTI_VERSION_1_2) };
        if rc != jni::JNI_OK || env.is_null() {
            return Err(rc);
        }
        Ok(Jvmti {
            env: env as *mut jvmti::jvmtiEnv,
        })
    }

    pub fn raw(&self) -> *mut jvmti::jvmtiEnv {
        self.env
    }

    fn fns(&self) -> &jvmtiInterface_1_ {
        unsafe { &*(*self.env).functions }
    }

    // --- capabilities and events ---

    pub fn get_capabilities(&self) -> Result<jvmti::jvmtiCapabilities, JvmtiError> {
        let mut caps = jvmti::jvmtiCapabilities::default();
        check(unsafe { (self.fns().GetCapabilities)(self.env, &mut caps) })?;
        Ok(caps)
    }

    pub fn add_capabilities(&self, caps: &jvmti::jvmtiCapabilities) -> Result<(), JvmtiError> {
        check(unsafe { (self.fns().AddCapabilities)(self.env, caps) })
    }

    pub fn set_event_callbacks(
        &self,
        callbacks: &jvmti::jvmtiEventCallbacks,
    ) -> Result<(), JvmtiError> {
        let size = std::mem::size_of::<jvmti::jvmtiEventCallbacks>() as jni::jint;
        check(unsafe { (self.fns().SetEventCallbacks)(self.env, callbacks, size) })
    }

    pub fn set_event_notification_mode(
        &self,
        enable: bool,
        event: jni::jint,
        thread: jthread,
    ) -> Result<(), JvmtiError> {
        let mode = if enable {
            jvmti::JVMTI_ENABLE
        } else {
            jvmti::JVMTI_DISABLE
        };
        check(unsafe { (self.fns().SetEventNotificationMode)(self.env, mode, event, thread) })
    }

    // --- breakpoints ---

    pub fn set_breakpoint(&self, method: jmethodID, location: jlocation) -> Result<(), JvmtiError> {
        check(unsafe { (self.fns().SetBreakpoint)(self.env, method, location) })
    }

    // --- stack and locals ---

    pub fn get_frame_location(
        &self,
        thread: jthread,
        depth: jni::jint,
    ) -> Result<(jmethodID, jlocation), JvmtiError> {
        let mut method: jmethodID = std::ptr::null_mut();
        let mut location: jlocation = 0;
        check(unsafe {
            (self.fns().GetFrameLocation)(self.env, thread, depth, &mut method, &mut location)
        })?;
        Ok((method, location))
    }

    /// Reads up to `max_frames` frames of the current thread starting at
    /// `start_depth`.
    pub fn get_stack_trace(
        &self,
        thread: jthread,
        start_depth: jni::jint,
        max_frames: usize,
    ) -> Result<Vec<jvmtiFrameInfo>, JvmtiError> {
        let mut frames = vec![
            jvmtiFrameInfo {
                method: std::ptr::null_mut(),
                location: 0,
            };
            max_frames
        ];
        let mut count: jni::jint = 0;
        check(unsafe {
            (self.fns().GetStackTrace)(
                self.env,
                thread,
                start_depth,
                max_frames as jni::jint,
                frames.as_mut_ptr(),
                &mut count,
            )
        })?;
        frames.truncate(count.max(0) as usize);
        Ok(frames)
    }

    pub fn get_local_object(
        &self,
        thread: jthread,
        depth: jni::jint,
        slot: jni::jint,
    ) -> Result<jobject, JvmtiError> {
        let mut value: jobject = std::ptr::null_mut();
        check(unsafe { (self.fns().GetLocalObject)(self.env, thread, depth, slot, &mut value) })?;
        Ok(value)
    }

    pub fn get_local_int(
        &self,
        thread: jthread,
        depth: jni::jint,
        slot: jni::jint,
    ) -> Result<jni::jint, JvmtiError> {
        let mut value: jni::jint = 0;
        check(unsafe { (self.fns().GetLocalInt)(self.env, thread, depth, slot, &mut value) })?;
        Ok(value)
    }

    // --- classes and methods ---

    pub fn get_method_declaring_class(&self, method: jmethodID) -> Result<jclass, JvmtiError> {
        let mut cls: jclass = std::ptr::null_mut();
        check(unsafe { (self.fns().GetMethodDeclaringClass)(self.env, method, &mut cls) })?;
        Ok(cls)
    }

    /// Returns the method's name and descriptor.
    pub fn get_method_name(&self, method: jmethodID) -> Result<(String, String), JvmtiError> {
        let mut name: *mut c_char = std::ptr::null_mut();
        let mut sig: *mut c_char = std::ptr::null_mut();
        check(unsafe {
            (self.fns().GetMethodName)(self.env, method, &mut name, &mut sig, std::ptr::null_mut())
        })?;
        let result = unsafe {
            (
                CStr::from_ptr(name).to_string_lossy().into_owned(),
                CStr::from_ptr(sig).to_string_lossy().into_owned(),
            )
        };
        self.deallocate(name as *mut c_uchar);
        self.deallocate(sig as *mut c_uchar);
        Ok(result)
    }

    /// Returns the class signature in descriptor form ("Ljava/lang/Foo;").
    pub fn get_class_signature(&self, klass: jclass) -> Result<String, JvmtiError> {
        let mut sig: *mut c_char = std::ptr::null_mut();
        check(unsafe {
            (self.fns().GetClassSignature)(self.env, klass, &mut sig, std::ptr::null_mut())
        })?;
        let result = unsafe { CStr::from_ptr(sig).to_string_lossy().into_owned() };
        self.deallocate(sig as *mut c_uchar);
        Ok(result)
    }

    pub fn get_class_loader(&self, klass: jclass) -> Result<jobject, JvmtiError> {
        let mut loader: jobject = std::ptr::null_mut();
        check(unsafe { (self.fns().GetClassLoader)(self.env, klass, &mut loader) })?;
        Ok(loader)
    }

    /// Snapshot of all currently loaded classes. The returned local
    /// references belong to the calling thread.
    pub fn get_loaded_classes(&self) -> Result<Vec<jclass>, JvmtiError> {
        let mut count: jni::jint = 0;
        let mut classes: *mut jclass = std::ptr::null_mut();
        check(unsafe { (self.fns().GetLoadedClasses)(self.env, &mut count, &mut classes) })?;
        if classes.is_null() {
            return Ok(Vec::new());
        }
        let out =
            unsafe { std::slice::from_raw_parts(classes, count.max(0) as usize) }.to_vec();
        self.deallocate(classes as *mut c_uchar);
        Ok(out)
    }

    // --- bytecode access ---

    pub fn get_bytecodes(&self, method: jmethodID) -> Result<JvmtiBuf<'_>, JvmtiError> {
        let mut len: jni::jint = 0;
        let mut bytes: *mut c_uchar = std::ptr::null_mut();
        check(unsafe { (self.fns().GetBytecodes)(self.env, method, &mut len, &mut bytes) })?;
        Ok(JvmtiBuf {
            env: self,
            ptr: bytes,
            len: len.max(0) as usize,
        })
    }

    /// Returns the raw constant pool image of `klass` and its entry count.
    pub fn get_constant_pool(&self, klass: jclass) -> Result<(jni::jint, JvmtiBuf<'_>), JvmtiError> {
        let mut count: jni::jint = 0;
        let mut byte_count: jni::jint = 0;
        let mut bytes: *mut c_uchar = std::ptr::null_mut();
        check(unsafe {
            (self.fns().GetConstantPool)(self.env, klass, &mut count, &mut byte_count, &mut bytes)
        })?;
        Ok((
            count,
            JvmtiBuf {
                env: self,
                ptr: bytes,
                len: byte_count.max(0) as usize,
            },
        ))
    }

    pub fn get_jlocation_format(&self) -> Result<jni::jint, JvmtiError> {
        let mut format: jni::jint = 0;
        check(unsafe { (self.fns().GetJLocationFormat)(self.env, &mut format) })?;
        Ok(format)
    }

    pub fn deallocate(&self, mem: *mut c_uchar) {
        if !mem.is_null() {
            unsafe {
                (self.fns().Deallocate)(self.env, mem);
            }
        }
    }
}

/// Runtime-allocated byte buffer, deallocated on drop.
///
/// Guarantees the release-on-every-exit-path discipline for bytecode and
/// constant pool slices.
pub struct JvmtiBuf<'a> {
    env: &'a Jvmti,
    ptr: *mut c_uchar,
    len: usize,
}

impl Deref for JvmtiBuf<'_> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        if self.ptr.is_null() {
            &[]
        } else {
            unsafe { std::slice::from_raw_parts(self.ptr, self.len) }
        }
    }
}

impl Drop for JvmtiBuf<'_> {
    fn drop(&mut self) {
        self.env.deallocate(self.ptr);
    }
}
