//! Common trace types shared between the aotrace agent and trace consumers.

pub mod record;
pub mod writer;

pub use record::*;
pub use writer::*;
