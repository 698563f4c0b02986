use crate::task::EngineKind;
use serde::{Deserialize, Serialize};

/// A download finished and its payload is ready to be relocated
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionEvent {
    pub engine: EngineKind,
    pub task_id: String,
}

impl CompletionEvent {
    pub fn rpc(gid: impl Into<String>) -> Self {
        Self {
            engine: EngineKind::Rpc,
            task_id: gid.into(),
        }
    }

    pub fn process(task_id: impl Into<String>) -> Self {
        Self {
            engine: EngineKind::Process,
            task_id: task_id.into(),
        }
    }
}
