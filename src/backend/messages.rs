use crate::task::EngineKind;
use serde::Serialize;
use serde_json::{Map, Value};
use std::path::PathBuf;

/// Per-submission options shared by every link in a batch
#[derive(Debug, Clone, Default)]
pub struct TaskOptions {
    /// Output directory; each engine's working directory when unset
    pub dir: Option<PathBuf>,
    /// Cookie header value for sites that need a session
    pub cookie: Option<String>,
    /// Extra aria2 options passed through as-is
    pub extra: Map<String, Value>,
}

/// Result of submitting one link
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Submission {
    pub link: String,
    pub engine: Option<EngineKind>,
    pub id: Option<String>,
    pub error: Option<String>,
}

impl Submission {
    pub fn accepted(link: String, engine: EngineKind, id: String) -> Self {
        Self {
            link,
            engine: Some(engine),
            id: Some(id),
            error: None,
        }
    }

    pub fn rejected(link: String, engine: Option<EngineKind>, error: String) -> Self {
        Self {
            link,
            engine,
            id: None,
            error: Some(error),
        }
    }

    pub fn is_accepted(&self) -> bool {
        self.id.is_some()
    }
}

/// Result of applying an action to one task id
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActionOutcome {
    pub id: String,
    pub error: Option<String>,
}

impl ActionOutcome {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}
