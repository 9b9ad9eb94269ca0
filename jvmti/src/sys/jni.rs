// jvmti/src/sys/jni.rs
//
// JNI types and function table, trimmed to what the agent calls.
//
// The vtable keeps every slot of the JNI specification in order so that
// indexing stays correct on any JVM; slots the agent never invokes are
// declared as untyped pointers. Verified against the JDK 8 jni.h layout
// (later JDKs only append at the end).

#![allow(non_snake_case)]
#![allow(non_camel_case_types)]

use std::os::raw::{c_char, c_void};

pub type jint = i32;
pub type jlong = i64;
pub type jbyte = i8;
pub type jboolean = u8;
pub type jchar = u16;
pub type jshort = i16;
pub type jfloat = f32;
pub type jdouble = f64;
pub type jsize = jint;

pub type jobject = *mut c_void;
pub type jclass = jobject;
pub type jstring = jobject;
pub type jthrowable = jobject;
pub type jarray = jobject;
pub type jobjectArray = jobject;
pub type jthread = jobject;

pub type jmethodID = *mut c_void;
pub type jfieldID = *mut c_void;

pub const JNI_OK: jint = 0;
pub const JNI_ERR: jint = -1;

pub const JNI_FALSE: jboolean = 0;
pub const JNI_TRUE: jboolean = 1;

pub const JNI_VERSION_1_8: jint = 0x0001_0008;

/// Argument slot for the `Call*MethodA` families.
#[repr(C)]
#[derive(Copy, Clone)]
pub union jvalue {
    pub z: jboolean,
    pub b: jbyte,
    pub c: jchar,
    pub s: jshort,
    pub i: jint,
    pub j: jlong,
    pub f: jfloat,
    pub d: jdouble,
    pub l: jobject,
}

impl jvalue {
    pub fn object(l: jobject) -> Self {
        jvalue { l }
    }

    pub fn boolean(v: bool) -> Self {
        jvalue {
            z: if v { JNI_TRUE } else { JNI_FALSE },
        }
    }
}

/// Entry for `RegisterNatives`.
#[repr(C)]
pub struct JNINativeMethod {
    pub name: *const c_char,
    pub signature: *const c_char,
    pub fnPtr: *mut c_void,
}

#[repr(C)]
pub struct JNIEnv {
    pub functions: *const JNINativeInterface_,
}

#[repr(C)]
pub struct JavaVM {
    pub functions: *const JNIInvokeInterface_,
}

#[repr(C)]
pub struct JNIInvokeInterface_ {
    pub reserved0: *mut c_void,
    pub reserved1: *mut c_void,
    pub reserved2: *mut c_void,
    pub DestroyJavaVM: *mut c_void,
    pub AttachCurrentThread: *mut c_void,
    pub DetachCurrentThread: *mut c_void,
    pub GetEnv:
        unsafe extern "system" fn(vm: *mut JavaVM, penv: *mut *mut c_void, version: jint) -> jint,
    pub AttachCurrentThreadAsDaemon: *mut c_void,
}

#[repr(C)]
pub struct JNINativeInterface_ {
    pub reserved0: *mut c_void,
    pub reserved1: *mut c_void,
    pub reserved2: *mut c_void,
    pub reserved3: *mut c_void,

    /* 4 */
    pub GetVersion: *mut c_void,
    /* 5 */
    pub DefineClass: *mut c_void,
    /* 6 */
    pub FindClass: unsafe extern "system" fn(env: *mut JNIEnv, name: *const c_char) -> jclass,
    /* 7 */
    pub FromReflectedMethod:
        unsafe extern "system" fn(env: *mut JNIEnv, method: jobject) -> jmethodID,
    /* 8 */
    pub FromReflectedField: *mut c_void,
    /* 9 */
    pub ToReflectedMethod: *mut c_void,
    /* 10 */
    pub GetSuperclass: *mut c_void,
    /* 11 */
    pub IsAssignableFrom:
        unsafe extern "system" fn(env: *mut JNIEnv, sub: jclass, sup: jclass) -> jboolean,
    /* 12 */
    pub ToReflectedField: *mut c_void,
    /* 13 */
    pub Throw: *mut c_void,
    /* 14 */
    pub ThrowNew: *mut c_void,
    /* 15 */
    pub ExceptionOccurred: unsafe extern "system" fn(env: *mut JNIEnv) -> jthrowable,
    /* 16 */
    pub ExceptionDescribe: unsafe extern "system" fn(env: *mut JNIEnv),
    /* 17 */
    pub ExceptionClear: unsafe extern "system" fn(env: *mut JNIEnv),
    /* 18 */
    pub FatalError: *mut c_void,
    /* 19 */
    pub PushLocalFrame: *mut c_void,
    /* 20 */
    pub PopLocalFrame: *mut c_void,
    /* 21 */
    pub NewGlobalRef: unsafe extern "system" fn(env: *mut JNIEnv, obj: jobject) -> jobject,
    /* 22 */
    pub DeleteGlobalRef: unsafe extern "system" fn(env: *mut JNIEnv, gref: jobject),
    /* 23 */
    pub DeleteLocalRef: unsafe extern "system" fn(env: *mut JNIEnv, obj: jobject),
    /* 24 */
    pub IsSameObject:
        unsafe extern "system" fn(env: *mut JNIEnv, obj1: jobject, obj2: jobject) -> jboolean,
    /* 25 */
    pub NewLocalRef: *mut c_void,
    /* 26 */
    pub EnsureLocalCapacity: *mut c_void,
    /* 27 */
    pub AllocObject: *mut c_void,
    /* 28 */
    pub NewObject: *mut c_void,
    /* 29 */
    pub NewObjectV: *mut c_void,
    /* 30 */
    pub NewObjectA: unsafe extern "system" fn(
        env: *mut JNIEnv,
        clazz: jclass,
        method: jmethodID,
        args: *const jvalue,
    ) -> jobject,
    /* 31 */
    pub GetObjectClass: unsafe extern "system" fn(env: *mut JNIEnv, obj: jobject) -> jclass,
    /* 32 */
    pub IsInstanceOf:
        unsafe extern "system" fn(env: *mut JNIEnv, obj: jobject, clazz: jclass) -> jboolean,
    /* 33 */
    pub GetMethodID: unsafe extern "system" fn(
        env: *mut JNIEnv,
        clazz: jclass,
        name: *const c_char,
        sig: *const c_char,
    ) -> jmethodID,

    /* 34-36: CallObjectMethod, V, A */
    pub CallObjectMethod: *mut c_void,
    pub CallObjectMethodV: *mut c_void,
    pub CallObjectMethodA: unsafe extern "system" fn(
        env: *mut JNIEnv,
        obj: jobject,
        method: jmethodID,
        args: *const jvalue,
    ) -> jobject,
    /* 37-39: CallBooleanMethod, V, A */
    pub CallBooleanMethod: *mut c_void,
    pub CallBooleanMethodV: *mut c_void,
    pub CallBooleanMethodA: unsafe extern "system" fn(
        env: *mut JNIEnv,
        obj: jobject,
        method: jmethodID,
        args: *const jvalue,
    ) -> jboolean,
    /* 40-42: CallByteMethod, V, A */
    pub CallByteMethod: *mut c_void,
    pub CallByteMethodV: *mut c_void,
    pub CallByteMethodA: *mut c_void,
    /* 43-45: CallCharMethod, V, A */
    pub CallCharMethod: *mut c_void,
    pub CallCharMethodV: *mut c_void,
    pub CallCharMethodA: *mut c_void,
    /* 46-48: CallShortMethod, V, A */
    pub CallShortMethod: *mut c_void,
    pub CallShortMethodV: *mut c_void,
    pub CallShortMethodA: *mut c_void,
    /* 49-51: CallIntMethod, V, A */
    pub CallIntMethod: *mut c_void,
    pub CallIntMethodV: *mut c_void,
    pub CallIntMethodA: *mut c_void,
    /* 52-54: CallLongMethod, V, A */
    pub CallLongMethod: *mut c_void,
    pub CallLongMethodV: *mut c_void,
    pub CallLongMethodA: unsafe extern "system" fn(
        env: *mut JNIEnv,
        obj: jobject,
        method: jmethodID,
        args: *const jvalue,
    ) -> jlong,
    /* 55-57: CallFloatMethod, V, A */
    pub CallFloatMethod: *mut c_void,
    pub CallFloatMethodV: *mut c_void,
    pub CallFloatMethodA: *mut c_void,
    /* 58-60: CallDoubleMethod, V, A */
    pub CallDoubleMethod: *mut c_void,
    pub CallDoubleMethodV: *mut c_void,
    pub CallDoubleMethodA: *mut c_void,
    /* 61-63: CallVoidMethod, V, A */
    pub CallVoidMethod: *mut c_void,
    pub CallVoidMethodV: *mut c_void,
    pub CallVoidMethodA: *mut c_void,

    /* 64-93: CallNonvirtual<Type>Method, V, A */
    pub CallNonvirtualObjectMethod: *mut c_void,
    pub CallNonvirtualObjectMethodV: *mut c_void,
    pub CallNonvirtualObjectMethodA: *mut c_void,
    pub CallNonvirtualBooleanMethod: *mut c_void,
    pub CallNonvirtualBooleanMethodV: *mut c_void,
    pub CallNonvirtualBooleanMethodA: *mut c_void,
    pub CallNonvirtualByteMethod: *mut c_void,
    pub CallNonvirtualByteMethodV: *mut c_void,
    pub CallNonvirtualByteMethodA: *mut c_void,
    pub CallNonvirtualCharMethod: *mut c_void,
    pub CallNonvirtualCharMethodV: *mut c_void,
    pub CallNonvirtualCharMethodA: *mut c_void,
    pub CallNonvirtualShortMethod: *mut c_void,
    pub CallNonvirtualShortMethodV: *mut c_void,
    pub CallNonvirtualShortMethodA: *mut c_void,
    pub CallNonvirtualIntMethod: *mut c_void,
    pub CallNonvirtualIntMethodV: *mut c_void,
    pub CallNonvirtualIntMethodA: *mut c_void,
    pub CallNonvirtualLongMethod: *mut c_void,
    pub CallNonvirtualLongMethodV: *mut c_void,
    pub CallNonvirtualLongMethodA: *mut c_void,
    pub CallNonvirtualFloatMethod: *mut c_void,
    pub CallNonvirtualFloatMethodV: *mut c_void,
    pub CallNonvirtualFloatMethodA: *mut c_void,
    pub CallNonvirtualDoubleMethod: *mut c_void,
    pub CallNonvirtualDoubleMethodV: *mut c_void,
    pub CallNonvirtualDoubleMethodA: *mut c_void,
    pub CallNonvirtualVoidMethod: *mut c_void,
    pub CallNonvirtualVoidMethodV: *mut c_void,
    pub CallNonvirtualVoidMethodA: *mut c_void,

    /* 94 */
    pub GetFieldID: unsafe extern "system" fn(
        env: *mut JNIEnv,
        clazz: jclass,
        name: *const c_char,
        sig: *const c_char,
    ) -> jfieldID,
    /* 95-103: Get<Type>Field */
    pub GetObjectField:
        unsafe extern "system" fn(env: *mut JNIEnv, obj: jobject, field: jfieldID) -> jobject,
    pub GetBooleanField:
        unsafe extern "system" fn(env: *mut JNIEnv, obj: jobject, field: jfieldID) -> jboolean,
    pub GetByteField: *mut c_void,
    pub GetCharField: *mut c_void,
    pub GetShortField: *mut c_void,
    pub GetIntField: *mut c_void,
    pub GetLongField: *mut c_void,
    pub GetFloatField: *mut c_void,
    pub GetDoubleField: *mut c_void,
    /* 104-112: Set<Type>Field */
    pub SetObjectField: *mut c_void,
    pub SetBooleanField: *mut c_void,
    pub SetByteField: *mut c_void,
    pub SetCharField: *mut c_void,
    pub SetShortField: *mut c_void,
    pub SetIntField: *mut c_void,
    pub SetLongField: *mut c_void,
    pub SetFloatField: *mut c_void,
    pub SetDoubleField: *mut c_void,

    /* 113 */
    pub GetStaticMethodID: unsafe extern "system" fn(
        env: *mut JNIEnv,
        clazz: jclass,
        name: *const c_char,
        sig: *const c_char,
    ) -> jmethodID,
    /* 114-143: CallStatic<Type>Method, V, A */
    pub CallStaticObjectMethod: *mut c_void,
    pub CallStaticObjectMethodV: *mut c_void,
    pub CallStaticObjectMethodA: unsafe extern "system" fn(
        env: *mut JNIEnv,
        clazz: jclass,
        method: jmethodID,
        args: *const jvalue,
    ) -> jobject,
    pub CallStaticBooleanMethod: *mut c_void,
    pub CallStaticBooleanMethodV: *mut c_void,
    pub CallStaticBooleanMethodA: *mut c_void,
    pub CallStaticByteMethod: *mut c_void,
    pub CallStaticByteMethodV: *mut c_void,
    pub CallStaticByteMethodA: *mut c_void,
    pub CallStaticCharMethod: *mut c_void,
    pub CallStaticCharMethodV: *mut c_void,
    pub CallStaticCharMethodA: *mut c_void,
    pub CallStaticShortMethod: *mut c_void,
    pub CallStaticShortMethodV: *mut c_void,
    pub CallStaticShortMethodA: *mut c_void,
    pub CallStaticIntMethod: *mut c_void,
    pub CallStaticIntMethodV: *mut c_void,
    pub CallStaticIntMethodA: *mut c_void,
    pub CallStaticLongMethod: *mut c_void,
    pub CallStaticLongMethodV: *mut c_void,
    pub CallStaticLongMethodA: *mut c_void,
    pub CallStaticFloatMethod: *mut c_void,
    pub CallStaticFloatMethodV: *mut c_void,
    pub CallStaticFloatMethodA: *mut c_void,
    pub CallStaticDoubleMethod: *mut c_void,
    pub CallStaticDoubleMethodV: *mut c_void,
    pub CallStaticDoubleMethodA: *mut c_void,
    pub CallStaticVoidMethod: *mut c_void,
    pub CallStaticVoidMethodV: *mut c_void,
    pub CallStaticVoidMethodA: *mut c_void,

    /* 144 */
    pub GetStaticFieldID: *mut c_void,
    /* 145-153: GetStatic<Type>Field */
    pub GetStaticObjectField: *mut c_void,
    pub GetStaticBooleanField: *mut c_void,
    pub GetStaticByteField: *mut c_void,
    pub GetStaticCharField: *mut c_void,
    pub GetStaticShortField: *mut c_void,
    pub GetStaticIntField: *mut c_void,
    pub GetStaticLongField: *mut c_void,
    pub GetStaticFloatField: *mut c_void,
    pub GetStaticDoubleField: *mut c_void,
    /* 154-162: SetStatic<Type>Field */
    pub SetStaticObjectField: *mut c_void,
    pub SetStaticBooleanField: *mut c_void,
    pub SetStaticByteField: *mut c_void,
    pub SetStaticCharField: *mut c_void,
    pub SetStaticShortField: *mut c_void,
    pub SetStaticIntField: *mut c_void,
    pub SetStaticLongField: *mut c_void,
    pub SetStaticFloatField: *mut c_void,
    pub SetStaticDoubleField: *mut c_void,

    /* 163 */
    pub NewString: *mut c_void,
    /* 164 */
    pub GetStringLength: *mut c_void,
    /* 165 */
    pub GetStringChars: *mut c_void,
    /* 166 */
    pub ReleaseStringChars: *mut c_void,
    /* 167 */
    pub NewStringUTF: unsafe extern "system" fn(env: *mut JNIEnv, utf: *const c_char) -> jstring,
    /* 168 */
    pub GetStringUTFLength: *mut c_void,
    /* 169 */
    pub GetStringUTFChars: unsafe extern "system" fn(
        env: *mut JNIEnv,
        s: jstring,
        is_copy: *mut jboolean,
    ) -> *const c_char,
    /* 170 */
    pub ReleaseStringUTFChars:
        unsafe extern "system" fn(env: *mut JNIEnv, s: jstring, chars: *const c_char),
    /* 171 */
    pub GetArrayLength: unsafe extern "system" fn(env: *mut JNIEnv, array: jarray) -> jsize,
    /* 172 */
    pub NewObjectArray: *mut c_void,
    /* 173 */
    pub GetObjectArrayElement: unsafe extern "system" fn(
        env: *mut JNIEnv,
        array: jobjectArray,
        index: jsize,
    ) -> jobject,
    /* 174 */
    pub SetObjectArrayElement: *mut c_void,
    /* 175-182: New<Prim>Array */
    pub NewBooleanArray: *mut c_void,
    pub NewByteArray: *mut c_void,
    pub NewCharArray: *mut c_void,
    pub NewShortArray: *mut c_void,
    pub NewIntArray: *mut c_void,
    pub NewLongArray: *mut c_void,
    pub NewFloatArray: *mut c_void,
    pub NewDoubleArray: *mut c_void,
    /* 183-190: Get<Prim>ArrayElements */
    pub GetBooleanArrayElements: *mut c_void,
    pub GetByteArrayElements: *mut c_void,
    pub GetCharArrayElements: *mut c_void,
    pub GetShortArrayElements: *mut c_void,
    pub GetIntArrayElements: *mut c_void,
    pub GetLongArrayElements: *mut c_void,
    pub GetFloatArrayElements: *mut c_void,
    pub GetDoubleArrayElements: *mut c_void,
    /* 191-198: Release<Prim>ArrayElements */
    pub ReleaseBooleanArrayElements: *mut c_void,
    pub ReleaseByteArrayElements: *mut c_void,
    pub ReleaseCharArrayElements: *mut c_void,
    pub ReleaseShortArrayElements: *mut c_void,
    pub ReleaseIntArrayElements: *mut c_void,
    pub ReleaseLongArrayElements: *mut c_void,
    pub ReleaseFloatArrayElements: *mut c_void,
    pub ReleaseDoubleArrayElements: *mut c_void,
    /* 199-206: Get<Prim>ArrayRegion */
    pub GetBooleanArrayRegion: *mut c_void,
    pub GetByteArrayRegion: *mut c_void,
    pub GetCharArrayRegion: *mut c_void,
    pub GetShortArrayRegion: *mut c_void,
    pub GetIntArrayRegion: *mut c_void,
    pub GetLongArrayRegion: *mut c_void,
    pub GetFloatArrayRegion: *mut c_void,
    pub GetDoubleArrayRegion: *mut c_void,
    /* 207-214: Set<Prim>ArrayRegion */
    pub SetBooleanArrayRegion: *mut c_void,
    pub SetByteArrayRegion: *mut c_void,
    pub SetCharArrayRegion: *mut c_void,
    pub SetShortArrayRegion: *mut c_void,
    pub SetIntArrayRegion: *mut c_void,
    pub SetLongArrayRegion: *mut c_void,
    pub SetFloatArrayRegion: *mut c_void,
    pub SetDoubleArrayRegion: *mut c_void,

    /* 215 */
    pub RegisterNatives: unsafe extern "system" fn(
        env: *mut JNIEnv,
        clazz: jclass,
        methods: *const JNINativeMethod,
        count: jint,
    ) -> jint,
    /* 216 */
    pub UnregisterNatives: *mut c_void,
    /* 217 */
    pub MonitorEnter: *mut c_void,
    /* 218 */
    pub MonitorExit: *mut c_void,
    /* 219 */
    pub GetJavaVM: *mut c_void,
    /* 220 */
    pub GetStringRegion: *mut c_void,
    /* 221 */
    pub GetStringUTFRegion: *mut c_void,
    /* 222 */
    pub GetPrimitiveArrayCritical: *mut c_void,
    /* 223 */
    pub ReleasePrimitiveArrayCritical: *mut c_void,
    /* 224 */
    pub GetStringCritical: *mut c_void,
    /* 225 */
    pub ReleaseStringCritical: *mut c_void,
    /* 226 */
    pub NewWeakGlobalRef: *mut c_void,
    /* 227 */
    pub DeleteWeakGlobalRef: *mut c_void,
    /* 228 */
    pub ExceptionCheck: unsafe extern "system" fn(env: *mut JNIEnv) -> jboolean,
    /* 229 */
    pub NewDirectByteBuffer: *mut c_void,
    /* 230 */
    pub GetDirectBufferAddress: *mut c_void,
    /* 231 */
    pub GetDirectBufferCapacity: *mut c_void,
    /* 232 */
    pub GetObjectRefType: *mut c_void,
}
