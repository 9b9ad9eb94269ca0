//! Minimal JNI and JVMTI bindings for the aotrace agent.
//!
//! Layered like the classic agent stacks: `sys` holds the raw vtables with
//! every slot in specification order (only the functions the agent calls
//! carry typed signatures), and the `JniEnv`/`Jvmti` wrappers add `Result`
//! returns, string conversion, and RAII for runtime-allocated buffers and
//! global references.

pub mod env;
pub mod jni;
pub mod sys;

pub use env::{Jvmti, JvmtiBuf, JvmtiError};
pub use jni::{GlobalRef, JniEnv};
