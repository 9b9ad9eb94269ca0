//! Cached class and member handles of the host runtime.
//!
//! The required set is resolved once during VM init; everything only
//! present on some JDK versions resolves lazily and degrades to `None`.

use std::sync::OnceLock;

use aotrace_jvmti::sys::jni::{jclass, jfieldID, jmethodID};
use aotrace_jvmti::{GlobalRef, JniEnv};

use crate::fatal;

/// Raw method identity, stable for the lifetime of the method.
pub type MethodId = usize;
/// Raw field identity.
pub type FieldId = usize;

pub struct Handles {
    pub java_lang_class: GlobalRef,
    pub java_lang_class_loader: GlobalRef,
    pub java_lang_illegal_access_exception: GlobalRef,

    java_lang_class_for_name3: MethodId,
    java_lang_class_get_name: MethodId,
    member_get_name: MethodId,
    member_get_declaring_class: MethodId,
    enumeration_has_more_elements: MethodId,
    class_loader_get_resource: MethodId,

    method_type_parameter_array: OnceLock<Option<MethodId>>,
    method_type_return_type: OnceLock<Option<MethodId>>,
    osc_get_class_data_layout0: OnceLock<Option<MethodId>>,
    osc_for_class: OnceLock<Option<MethodId>>,
    class_data_slot_has_data: OnceLock<Option<FieldId>>,
    class_data_slot_desc: OnceLock<Option<FieldId>>,
    bundle_get_bundle_impl_slcc: OnceLock<Option<MethodId>>,
}

impl Handles {
    pub fn resolve(env: &JniEnv) -> Self {
        let java_lang_class = required_class(env, "java/lang/Class");
        let java_lang_class_loader = required_class(env, "java/lang/ClassLoader");
        let java_lang_illegal_access_exception =
            required_class(env, "java/lang/IllegalAccessException");
        let member = required_class(env, "java/lang/reflect/Member");
        let enumeration = required_class(env, "java/util/Enumeration");

        let handles = Self {
            java_lang_class_for_name3: required_static_method(
                env,
                java_lang_class.as_raw(),
                "forName",
                "(Ljava/lang/String;ZLjava/lang/ClassLoader;)Ljava/lang/Class;",
            ),
            java_lang_class_get_name: required_method(
                env,
                java_lang_class.as_raw(),
                "getName",
                "()Ljava/lang/String;",
            ),
            member_get_name: required_method(
                env,
                member.as_raw(),
                "getName",
                "()Ljava/lang/String;",
            ),
            member_get_declaring_class: required_method(
                env,
                member.as_raw(),
                "getDeclaringClass",
                "()Ljava/lang/Class;",
            ),
            enumeration_has_more_elements: required_method(
                env,
                enumeration.as_raw(),
                "hasMoreElements",
                "()Z",
            ),
            class_loader_get_resource: required_method(
                env,
                java_lang_class_loader.as_raw(),
                "getResource",
                "(Ljava/lang/String;)Ljava/net/URL;",
            ),
            java_lang_class,
            java_lang_class_loader,
            java_lang_illegal_access_exception,
            method_type_parameter_array: OnceLock::new(),
            method_type_return_type: OnceLock::new(),
            osc_get_class_data_layout0: OnceLock::new(),
            osc_for_class: OnceLock::new(),
            class_data_slot_has_data: OnceLock::new(),
            class_data_slot_desc: OnceLock::new(),
            bundle_get_bundle_impl_slcc: OnceLock::new(),
        };
        member.release(env);
        enumeration.release(env);
        handles
    }

    pub fn java_lang_class_for_name3(&self) -> jmethodID {
        self.java_lang_class_for_name3 as jmethodID
    }

    pub fn java_lang_class_get_name(&self) -> jmethodID {
        self.java_lang_class_get_name as jmethodID
    }

    pub fn member_get_name(&self) -> jmethodID {
        self.member_get_name as jmethodID
    }

    pub fn member_get_declaring_class(&self) -> jmethodID {
        self.member_get_declaring_class as jmethodID
    }

    pub fn enumeration_has_more_elements(&self) -> jmethodID {
        self.enumeration_has_more_elements as jmethodID
    }

    pub fn class_loader_get_resource(&self) -> jmethodID {
        self.class_loader_get_resource as jmethodID
    }

    /// `MethodType.parameterArray()`, absent before method handles existed.
    pub fn method_type_parameter_array(&self, env: &JniEnv) -> Option<jmethodID> {
        self.lazy_method(
            env,
            &self.method_type_parameter_array,
            "java/lang/invoke/MethodType",
            "parameterArray",
            "()[Ljava/lang/Class;",
        )
    }

    pub fn method_type_return_type(&self, env: &JniEnv) -> Option<jmethodID> {
        self.lazy_method(
            env,
            &self.method_type_return_type,
            "java/lang/invoke/MethodType",
            "returnType",
            "()Ljava/lang/Class;",
        )
    }

    pub fn osc_get_class_data_layout0(&self, env: &JniEnv) -> Option<jmethodID> {
        self.lazy_method(
            env,
            &self.osc_get_class_data_layout0,
            "java/io/ObjectStreamClass",
            "getClassDataLayout0",
            "()[Ljava/io/ObjectStreamClass$ClassDataSlot;",
        )
    }

    pub fn osc_for_class(&self, env: &JniEnv) -> Option<jmethodID> {
        self.lazy_method(
            env,
            &self.osc_for_class,
            "java/io/ObjectStreamClass",
            "forClass",
            "()Ljava/lang/Class;",
        )
    }

    pub fn class_data_slot_has_data(&self, env: &JniEnv) -> Option<jfieldID> {
        let id = self.class_data_slot_has_data.get_or_init(|| {
            let cls = optional_class(env, "java/io/ObjectStreamClass$ClassDataSlot")?;
            let id = env.get_field_id(cls, "hasData", "Z");
            env.clear_exception();
            id.map(|id| id as FieldId)
        });
        id.map(|id| id as jfieldID)
    }

    pub fn class_data_slot_desc(&self, env: &JniEnv) -> Option<jfieldID> {
        let id = self.class_data_slot_desc.get_or_init(|| {
            let cls = optional_class(env, "java/io/ObjectStreamClass$ClassDataSlot")?;
            let id = env.get_field_id(cls, "desc", "Ljava/io/ObjectStreamClass;");
            env.clear_exception();
            id.map(|id| id as FieldId)
        });
        id.map(|id| id as jfieldID)
    }

    /// The `getBundleImpl(String, Locale, ClassLoader, Control)` trampoline
    /// that changes the caller frame depth on JDK 11+.
    pub fn bundle_get_bundle_impl_slcc(&self, env: &JniEnv) -> Option<jmethodID> {
        self.lazy_method(
            env,
            &self.bundle_get_bundle_impl_slcc,
            "java/util/ResourceBundle",
            "getBundleImpl",
            "(Ljava/lang/String;Ljava/util/Locale;Ljava/lang/ClassLoader;\
             Ljava/util/ResourceBundle$Control;)Ljava/util/ResourceBundle;",
        )
    }

    fn lazy_method(
        &self,
        env: &JniEnv,
        cell: &OnceLock<Option<MethodId>>,
        class_name: &str,
        name: &str,
        sig: &str,
    ) -> Option<jmethodID> {
        let id = cell.get_or_init(|| {
            let cls = optional_class(env, class_name)?;
            let id = env
                .get_method_id(cls, name, sig)
                .or_else(|| {
                    env.clear_exception();
                    env.get_static_method_id(cls, name, sig)
                });
            env.clear_exception();
            id.map(|id| id as MethodId)
        });
        id.map(|id| id as jmethodID)
    }

    /// Releases the pinned classes during VM death.
    pub fn release(&self, env: &JniEnv) {
        self.java_lang_class.release(env);
        self.java_lang_class_loader.release(env);
        self.java_lang_illegal_access_exception.release(env);
    }
}

fn optional_class(env: &JniEnv, name: &str) -> Option<jclass> {
    let cls = env.find_class(name);
    env.clear_exception();
    cls
}

fn required_class(env: &JniEnv, name: &str) -> GlobalRef {
    let Some(cls) = env.find_class(name) else {
        fatal!("required class {} not found in host runtime", name);
    };
    let Some(global) = GlobalRef::new(env, cls) else {
        fatal!("failed to pin {}", name);
    };
    global
}

fn required_method(env: &JniEnv, cls: jclass, name: &str, sig: &str) -> MethodId {
    match env.get_method_id(cls, name, sig) {
        Some(id) => id as MethodId,
        None => fatal!("required method {}{} not found", name, sig),
    }
}

fn required_static_method(env: &JniEnv, cls: jclass, name: &str, sig: &str) -> MethodId {
    match env.get_static_method_id(cls, name, sig) {
        Some(id) => id as MethodId,
        None => fatal!("required static method {}{} not found", name, sig),
    }
}
