// jvmti/src/sys/jvmti.rs
//
// JVMTI types and function table, trimmed to what the agent calls.
//
// Slot numbering follows the jvmti.h function table (stable since JDK 1.5,
// extended only at the end). Unused slots are untyped pointers so the
// layout stays index-correct.

#![allow(non_snake_case)]
#![allow(non_camel_case_types)]
#![allow(non_upper_case_globals)]

use std::os::raw::{c_char, c_uchar, c_void};

use super::jni::{jclass, jint, jlong, jmethodID, jobject, jthread, JNIEnv};

pub const JVMTI_VERSION_1_2: jint = 0x3001_0200;

pub type jlocation = jlong;

/// JVMTI error code. Kept as a plain integer because the host may return
/// codes this crate does not name.
pub type jvmtiError = u32;

pub const JVMTI_ERROR_NONE: jvmtiError = 0;
pub const JVMTI_ERROR_INVALID_THREAD: jvmtiError = 10;
pub const JVMTI_ERROR_INVALID_CLASS: jvmtiError = 21;
pub const JVMTI_ERROR_INVALID_METHODID: jvmtiError = 23;
pub const JVMTI_ERROR_INVALID_LOCATION: jvmtiError = 24;
pub const JVMTI_ERROR_INVALID_SLOT: jvmtiError = 35;
pub const JVMTI_ERROR_TYPE_MISMATCH: jvmtiError = 34;
pub const JVMTI_ERROR_DUPLICATE: jvmtiError = 40;
pub const JVMTI_ERROR_NOT_FOUND: jvmtiError = 41;
pub const JVMTI_ERROR_NO_MORE_FRAMES: jvmtiError = 31;
pub const JVMTI_ERROR_OPAQUE_FRAME: jvmtiError = 32;
pub const JVMTI_ERROR_ABSENT_INFORMATION: jvmtiError = 101;
pub const JVMTI_ERROR_NOT_AVAILABLE: jvmtiError = 98;
pub const JVMTI_ERROR_MUST_POSSESS_CAPABILITY: jvmtiError = 99;
pub const JVMTI_ERROR_NULL_POINTER: jvmtiError = 100;
pub const JVMTI_ERROR_WRONG_PHASE: jvmtiError = 112;
pub const JVMTI_ERROR_OUT_OF_MEMORY: jvmtiError = 110;
pub const JVMTI_ERROR_INTERNAL: jvmtiError = 113;

pub const JVMTI_ENABLE: jint = 1;
pub const JVMTI_DISABLE: jint = 0;

pub const JVMTI_EVENT_VM_INIT: jint = 50;
pub const JVMTI_EVENT_VM_DEATH: jint = 51;
pub const JVMTI_EVENT_CLASS_FILE_LOAD_HOOK: jint = 54;
pub const JVMTI_EVENT_CLASS_PREPARE: jint = 56;
pub const JVMTI_EVENT_BREAKPOINT: jint = 62;
pub const JVMTI_EVENT_NATIVE_METHOD_BIND: jint = 68;

pub const JVMTI_JLOCATION_JVMBCI: jint = 1;

#[repr(C)]
#[derive(Copy, Clone, Debug)]
pub struct jvmtiFrameInfo {
    pub method: jmethodID,
    pub location: jlocation,
}

/// Capability bit set (`jvmtiCapabilities`), 128 bits of C bitfields.
///
/// Bit offsets follow the declaration order in jvmti.h; only the
/// capabilities this agent requests have accessors.
#[repr(C)]
#[derive(Debug, Copy, Clone, Default)]
pub struct jvmtiCapabilities {
    bits: [u32; 4],
}

impl jvmtiCapabilities {
    fn set_bit(&mut self, bit: usize, value: bool) {
        let word = bit / 32;
        let index = bit % 32;
        if value {
            self.bits[word] |= 1 << index;
        } else {
            self.bits[word] &= !(1 << index);
        }
    }

    fn get_bit(&self, bit: usize) -> bool {
        (self.bits[bit / 32] & (1 << (bit % 32))) != 0
    }

    // [3]
    pub fn set_can_get_bytecodes(&mut self, v: bool) {
        self.set_bit(3, v);
    }
    pub fn can_get_bytecodes(&self) -> bool {
        self.get_bit(3)
    }

    // [14]
    pub fn set_can_access_local_variables(&mut self, v: bool) {
        self.set_bit(14, v);
    }
    pub fn can_access_local_variables(&self) -> bool {
        self.get_bit(14)
    }

    // [19]
    pub fn set_can_generate_breakpoint_events(&mut self, v: bool) {
        self.set_bit(19, v);
    }
    pub fn can_generate_breakpoint_events(&self) -> bool {
        self.get_bit(19)
    }

    // [26]
    pub fn set_can_generate_all_class_hook_events(&mut self, v: bool) {
        self.set_bit(26, v);
    }
    pub fn can_generate_all_class_hook_events(&self) -> bool {
        self.get_bit(26)
    }

    // [30]
    pub fn set_can_generate_native_method_bind_events(&mut self, v: bool) {
        self.set_bit(30, v);
    }
    pub fn can_generate_native_method_bind_events(&self) -> bool {
        self.get_bit(30)
    }

    // [35]
    pub fn set_can_get_constant_pool(&mut self, v: bool) {
        self.set_bit(35, v);
    }
    pub fn can_get_constant_pool(&self) -> bool {
        self.get_bit(35)
    }
}

pub type JvmtiVMInitFn =
    unsafe extern "system" fn(jvmti: *mut jvmtiEnv, jni: *mut JNIEnv, thread: jthread);
pub type JvmtiVMDeathFn = unsafe extern "system" fn(jvmti: *mut jvmtiEnv, jni: *mut JNIEnv);
pub type JvmtiClassFileLoadHookFn = unsafe extern "system" fn(
    jvmti: *mut jvmtiEnv,
    jni: *mut JNIEnv,
    class_being_redefined: jclass,
    loader: jobject,
    name: *const c_char,
    protection_domain: jobject,
    class_data_len: jint,
    class_data: *const c_uchar,
    new_class_data_len: *mut jint,
    new_class_data: *mut *mut c_uchar,
);
pub type JvmtiClassPrepareFn = unsafe extern "system" fn(
    jvmti: *mut jvmtiEnv,
    jni: *mut JNIEnv,
    thread: jthread,
    klass: jclass,
);
pub type JvmtiBreakpointFn = unsafe extern "system" fn(
    jvmti: *mut jvmtiEnv,
    jni: *mut JNIEnv,
    thread: jthread,
    method: jmethodID,
    location: jlocation,
);
pub type JvmtiNativeMethodBindFn = unsafe extern "system" fn(
    jvmti: *mut jvmtiEnv,
    jni: *mut JNIEnv,
    thread: jthread,
    method: jmethodID,
    address: *mut c_void,
    new_address_ptr: *mut *mut c_void,
);

/// Event callback table; layout matches `jvmtiEventCallbacks` in jvmti.h.
#[repr(C)]
pub struct jvmtiEventCallbacks {
    pub VMInit: Option<JvmtiVMInitFn>,
    pub VMDeath: Option<JvmtiVMDeathFn>,
    pub ThreadStart: *mut c_void,
    pub ThreadEnd: *mut c_void,
    pub ClassFileLoadHook: Option<JvmtiClassFileLoadHookFn>,
    pub ClassLoad: *mut c_void,
    pub ClassPrepare: Option<JvmtiClassPrepareFn>,
    pub VMStart: *mut c_void,
    pub Exception: *mut c_void,
    pub ExceptionCatch: *mut c_void,
    pub SingleStep: *mut c_void,
    pub FramePop: *mut c_void,
    pub Breakpoint: Option<JvmtiBreakpointFn>,
    pub FieldAccess: *mut c_void,
    pub FieldModification: *mut c_void,
    pub MethodEntry: *mut c_void,
    pub MethodExit: *mut c_void,
    pub NativeMethodBind: Option<JvmtiNativeMethodBindFn>,
    pub CompiledMethodLoad: *mut c_void,
    pub CompiledMethodUnload: *mut c_void,
    pub DynamicCodeGenerated: *mut c_void,
    pub DataDumpRequest: *mut c_void,
    pub MonitorWait: *mut c_void,
    pub MonitorWaited: *mut c_void,
    pub MonitorContendedEnter: *mut c_void,
    pub MonitorContendedEntered: *mut c_void,
    pub ResourceExhausted: *mut c_void,
    pub GarbageCollectionStart: *mut c_void,
    pub GarbageCollectionFinish: *mut c_void,
    pub ObjectFree: *mut c_void,
    pub VMObjectAlloc: *mut c_void,
    pub SampledObjectAlloc: *mut c_void,
}

impl Default for jvmtiEventCallbacks {
    fn default() -> Self {
        // All-null callback table; raw pointers rule out derive.
        unsafe { std::mem::zeroed() }
    }
}

#[repr(C)]
pub struct jvmtiEnv {
    pub functions: *const jvmtiInterface_1_,
}

#[repr(C)]
pub struct jvmtiInterface_1_ {
    /* 1: reserved */
    pub reserved1: *mut c_void,
    /* 2 */
    pub SetEventNotificationMode: unsafe extern "system" fn(
        env: *mut jvmtiEnv,
        mode: jint,
        event_type: jint,
        event_thread: jthread,
    ) -> jvmtiError,
    /* 3 */
    pub GetAllModules: *mut c_void,
    /* 4 */
    pub GetAllThreads: *mut c_void,
    /* 5 */
    pub SuspendThread: *mut c_void,
    /* 6 */
    pub ResumeThread: *mut c_void,
    /* 7 */
    pub StopThread: *mut c_void,
    /* 8 */
    pub InterruptThread: *mut c_void,
    /* 9 */
    pub GetThreadInfo: *mut c_void,
    /* 10 */
    pub GetOwnedMonitorInfo: *mut c_void,
    /* 11 */
    pub GetCurrentContendedMonitor: *mut c_void,
    /* 12 */
    pub RunAgentThread: *mut c_void,
    /* 13 */
    pub GetTopThreadGroups: *mut c_void,
    /* 14 */
    pub GetThreadGroupInfo: *mut c_void,
    /* 15 */
    pub GetThreadGroupChildren: *mut c_void,
    /* 16 */
    pub GetFrameCount: *mut c_void,
    /* 17 */
    pub GetThreadState: *mut c_void,
    /* 18 */
    pub GetCurrentThread: *mut c_void,
    /* 19 */
    pub GetFrameLocation: unsafe extern "system" fn(
        env: *mut jvmtiEnv,
        thread: jthread,
        depth: jint,
        method_ptr: *mut jmethodID,
        location_ptr: *mut jlocation,
    ) -> jvmtiError,
    /* 20 */
    pub NotifyFramePop: *mut c_void,
    /* 21 */
    pub GetLocalObject: unsafe extern "system" fn(
        env: *mut jvmtiEnv,
        thread: jthread,
        depth: jint,
        slot: jint,
        value_ptr: *mut jobject,
    ) -> jvmtiError,
    /* 22 */
    pub GetLocalInt: unsafe extern "system" fn(
        env: *mut jvmtiEnv,
        thread: jthread,
        depth: jint,
        slot: jint,
        value_ptr: *mut jint,
    ) -> jvmtiError,
    /* 23 */
    pub GetLocalLong: *mut c_void,
    /* 24 */
    pub GetLocalFloat: *mut c_void,
    /* 25 */
    pub GetLocalDouble: *mut c_void,
    /* 26 */
    pub SetLocalObject: *mut c_void,
    /* 27 */
    pub SetLocalInt: *mut c_void,
    /* 28 */
    pub SetLocalLong: *mut c_void,
    /* 29 */
    pub SetLocalFloat: *mut c_void,
    /* 30 */
    pub SetLocalDouble: *mut c_void,
    /* 31 */
    pub CreateRawMonitor: *mut c_void,
    /* 32 */
    pub DestroyRawMonitor: *mut c_void,
    /* 33 */
    pub RawMonitorEnter: *mut c_void,
    /* 34 */
    pub RawMonitorExit: *mut c_void,
    /* 35 */
    pub RawMonitorWait: *mut c_void,
    /* 36 */
    pub RawMonitorNotify: *mut c_void,
    /* 37 */
    pub RawMonitorNotifyAll: *mut c_void,
    /* 38 */
    pub SetBreakpoint: unsafe extern "system" fn(
        env: *mut jvmtiEnv,
        method: jmethodID,
        location: jlocation,
    ) -> jvmtiError,
    /* 39 */
    pub ClearBreakpoint: *mut c_void,
    /* 40 */
    pub GetNamedModule: *mut c_void,
    /* 41 */
    pub SetFieldAccessWatch: *mut c_void,
    /* 42 */
    pub ClearFieldAccessWatch: *mut c_void,
    /* 43 */
    pub SetFieldModificationWatch: *mut c_void,
    /* 44 */
    pub ClearFieldModificationWatch: *mut c_void,
    /* 45 */
    pub IsModifiableClass: *mut c_void,
    /* 46 */
    pub Allocate: *mut c_void,
    /* 47 */
    pub Deallocate:
        unsafe extern "system" fn(env: *mut jvmtiEnv, mem: *mut c_uchar) -> jvmtiError,
    /* 48 */
    pub GetClassSignature: unsafe extern "system" fn(
        env: *mut jvmtiEnv,
        klass: jclass,
        signature_ptr: *mut *mut c_char,
        generic_ptr: *mut *mut c_char,
    ) -> jvmtiError,
    /* 49 */
    pub GetClassStatus: *mut c_void,
    /* 50 */
    pub GetSourceFileName: *mut c_void,
    /* 51 */
    pub GetClassModifiers: *mut c_void,
    /* 52 */
    pub GetClassMethods: *mut c_void,
    /* 53 */
    pub GetClassFields: *mut c_void,
    /* 54 */
    pub GetImplementedInterfaces: *mut c_void,
    /* 55 */
    pub IsInterface: *mut c_void,
    /* 56 */
    pub IsArrayClass: *mut c_void,
    /* 57 */
    pub GetClassLoader: unsafe extern "system" fn(
        env: *mut jvmtiEnv,
        klass: jclass,
        classloader_ptr: *mut jobject,
    ) -> jvmtiError,
    /* 58 */
    pub GetObjectHashCode: *mut c_void,
    /* 59 */
    pub GetObjectMonitorUsage: *mut c_void,
    /* 60 */
    pub GetFieldName: *mut c_void,
    /* 61 */
    pub GetFieldDeclaringClass: *mut c_void,
    /* 62 */
    pub GetFieldModifiers: *mut c_void,
    /* 63 */
    pub IsFieldSynthetic: *mut c_void,
    /* 64 */
    pub GetMethodName: unsafe extern "system" fn(
        env: *mut jvmtiEnv,
        method: jmethodID,
        name_ptr: *mut *mut c_char,
        signature_ptr: *mut *mut c_char,
        generic_ptr: *mut *mut c_char,
    ) -> jvmtiError,
    /* 65 */
    pub GetMethodDeclaringClass: unsafe extern "system" fn(
        env: *mut jvmtiEnv,
        method: jmethodID,
        declaring_class_ptr: *mut jclass,
    ) -> jvmtiError,
    /* 66 */
    pub GetMethodModifiers: *mut c_void,
    /* 67: reserved before JDK 25 */
    pub ClearAllFramePops: *mut c_void,
    /* 68 */
    pub GetMaxLocals: *mut c_void,
    /* 69 */
    pub GetArgumentsSize: *mut c_void,
    /* 70 */
    pub GetLineNumberTable: *mut c_void,
    /* 71 */
    pub GetMethodLocation: *mut c_void,
    /* 72 */
    pub GetLocalVariableTable: *mut c_void,
    /* 73 */
    pub SetNativeMethodPrefix: *mut c_void,
    /* 74 */
    pub SetNativeMethodPrefixes: *mut c_void,
    /* 75 */
    pub GetBytecodes: unsafe extern "system" fn(
        env: *mut jvmtiEnv,
        method: jmethodID,
        bytecode_count_ptr: *mut jint,
        bytecodes_ptr: *mut *mut c_uchar,
    ) -> jvmtiError,
    /* 76 */
    pub IsMethodNative: *mut c_void,
    /* 77 */
    pub IsMethodSynthetic: *mut c_void,
    /* 78 */
    pub GetLoadedClasses: unsafe extern "system" fn(
        env: *mut jvmtiEnv,
        class_count_ptr: *mut jint,
        classes_ptr: *mut *mut jclass,
    ) -> jvmtiError,
    /* 79 */
    pub GetClassLoaderClasses: *mut c_void,
    /* 80 */
    pub PopFrame: *mut c_void,
    /* 81 */
    pub ForceEarlyReturnObject: *mut c_void,
    /* 82 */
    pub ForceEarlyReturnInt: *mut c_void,
    /* 83 */
    pub ForceEarlyReturnLong: *mut c_void,
    /* 84 */
    pub ForceEarlyReturnFloat: *mut c_void,
    /* 85 */
    pub ForceEarlyReturnDouble: *mut c_void,
    /* 86 */
    pub ForceEarlyReturnVoid: *mut c_void,
    /* 87 */
    pub RedefineClasses: *mut c_void,
    /* 88 */
    pub GetVersionNumber: *mut c_void,
    /* 89 */
    pub GetCapabilities: unsafe extern "system" fn(
        env: *mut jvmtiEnv,
        capabilities_ptr: *mut jvmtiCapabilities,
    ) -> jvmtiError,
    /* 90 */
    pub GetSourceDebugExtension: *mut c_void,
    /* 91 */
    pub IsMethodObsolete: *mut c_void,
    /* 92 */
    pub SuspendThreadList: *mut c_void,
    /* 93 */
    pub ResumeThreadList: *mut c_void,
    /* 94 */
    pub AddModuleReads: *mut c_void,
    /* 95 */
    pub AddModuleExports: *mut c_void,
    /* 96 */
    pub AddModuleOpens: *mut c_void,
    /* 97 */
    pub AddModuleUses: *mut c_void,
    /* 98 */
    pub AddModuleProvides: *mut c_void,
    /* 99 */
    pub IsModifiableModule: *mut c_void,
    /* 100 */
    pub GetAllStackTraces: *mut c_void,
    /* 101 */
    pub GetThreadListStackTraces: *mut c_void,
    /* 102 */
    pub GetThreadLocalStorage: *mut c_void,
    /* 103 */
    pub SetThreadLocalStorage: *mut c_void,
    /* 104 */
    pub GetStackTrace: unsafe extern "system" fn(
        env: *mut jvmtiEnv,
        thread: jthread,
        start_depth: jint,
        max_frame_count: jint,
        frame_buffer: *mut jvmtiFrameInfo,
        count_ptr: *mut jint,
    ) -> jvmtiError,
    /* 105: reserved */
    pub reserved105: *mut c_void,
    /* 106 */
    pub GetTag: *mut c_void,
    /* 107 */
    pub SetTag: *mut c_void,
    /* 108 */
    pub ForceGarbageCollection: *mut c_void,
    /* 109 */
    pub IterateOverObjectsReachableFromObject: *mut c_void,
    /* 110 */
    pub IterateOverReachableObjects: *mut c_void,
    /* 111 */
    pub IterateOverHeap: *mut c_void,
    /* 112 */
    pub IterateOverInstancesOfClass: *mut c_void,
    /* 113: reserved */
    pub reserved113: *mut c_void,
    /* 114 */
    pub GetObjectsWithTags: *mut c_void,
    /* 115 */
    pub FollowReferences: *mut c_void,
    /* 116 */
    pub IterateThroughHeap: *mut c_void,
    /* 117: reserved */
    pub reserved117: *mut c_void,
    /* 118 */
    pub SuspendAllVirtualThreads: *mut c_void,
    /* 119 */
    pub ResumeAllVirtualThreads: *mut c_void,
    /* 120 */
    pub SetJNIFunctionTable: *mut c_void,
    /* 121 */
    pub GetJNIFunctionTable: *mut c_void,
    /* 122 */
    pub SetEventCallbacks: unsafe extern "system" fn(
        env: *mut jvmtiEnv,
        callbacks: *const jvmtiEventCallbacks,
        size_of_callbacks: jint,
    ) -> jvmtiError,
    /* 123 */
    pub GenerateEvents: *mut c_void,
    /* 124 */
    pub GetExtensionFunctions: *mut c_void,
    /* 125 */
    pub GetExtensionEvents: *mut c_void,
    /* 126 */
    pub SetExtensionEventCallback: *mut c_void,
    /* 127 */
    pub DisposeEnvironment: *mut c_void,
    /* 128 */
    pub GetErrorName: *mut c_void,
    /* 129 */
    pub GetJLocationFormat: unsafe extern "system" fn(
        env: *mut jvmtiEnv,
        format_ptr: *mut jint,
    ) -> jvmtiError,
    /* 130 */
    pub GetSystemProperties: *mut c_void,
    /* 131 */
    pub GetSystemProperty: *mut c_void,
    /* 132 */
    pub SetSystemProperty: *mut c_void,
    /* 133 */
    pub GetPhase: *mut c_void,
    /* 134 */
    pub GetCurrentThreadCpuTimerInfo: *mut c_void,
    /* 135 */
    pub GetCurrentThreadCpuTime: *mut c_void,
    /* 136 */
    pub GetThreadCpuTimerInfo: *mut c_void,
    /* 137 */
    pub GetThreadCpuTime: *mut c_void,
    /* 138 */
    pub GetTimerInfo: *mut c_void,
    /* 139 */
    pub GetTime: *mut c_void,
    /* 140 */
    pub GetPotentialCapabilities: *mut c_void,
    /* 141: reserved */
    pub reserved141: *mut c_void,
    /* 142 */
    pub AddCapabilities: unsafe extern "system" fn(
        env: *mut jvmtiEnv,
        capabilities_ptr: *const jvmtiCapabilities,
    ) -> jvmtiError,
    /* 143 */
    pub RelinquishCapabilities: *mut c_void,
    /* 144 */
    pub GetAvailableProcessors: *mut c_void,
    /* 145 */
    pub GetClassVersionNumbers: *mut c_void,
    /* 146 */
    pub GetConstantPool: unsafe extern "system" fn(
        env: *mut jvmtiEnv,
        klass: jclass,
        constant_pool_count_ptr: *mut jint,
        constant_pool_byte_count_ptr: *mut jint,
        constant_pool_bytes_ptr: *mut *mut c_uchar,
    ) -> jvmtiError,
    /* 147 */
    pub GetEnvironmentLocalStorage: *mut c_void,
    /* 148 */
    pub SetEnvironmentLocalStorage: *mut c_void,
    /* 149 */
    pub AddToBootstrapClassLoaderSearch: *mut c_void,
    /* 150 */
    pub SetVerboseFlag: *mut c_void,
    /* 151 */
    pub AddToSystemClassLoaderSearch: *mut c_void,
    /* 152 */
    pub RetransformClasses: *mut c_void,
    /* 153 */
    pub GetOwnedMonitorStackDepthInfo: *mut c_void,
    /* 154 */
    pub GetObjectSize: *mut c_void,
    /* 155 */
    pub GetLocalInstance: *mut c_void,
    /* 156 */
    pub SetHeapSamplingInterval: *mut c_void,
}
