//! Engine selection

pub mod selector;

pub use crate::task::EngineKind;
pub use selector::{EngineSelector, DEFAULT_STREAMING_DOMAINS};
