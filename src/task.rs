//! Unified task model shared by both download engines

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Backend engine that owns a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    /// aria2 daemon driven over JSON-RPC
    Rpc,
    /// One spawned yt-dlp process per task
    Process,
}

impl EngineKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EngineKind::Rpc => "rpc",
            EngineKind::Process => "process",
        }
    }
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Task status, shared vocabulary with aria2
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    #[default]
    Waiting,
    Active,
    Paused,
    Complete,
    Error,
    Removed,
}

impl TaskStatus {
    /// complete, error and removed accept no further transitions
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskStatus::Complete | TaskStatus::Error | TaskStatus::Removed
        )
    }

    /// Whether moving from `self` to `next` is allowed.
    ///
    /// waiting, paused and active move freely between each other; any of them may end in a
    /// terminal status; terminal statuses never change.
    pub fn can_transition_to(&self, next: TaskStatus) -> bool {
        if self.is_terminal() {
            return *self == next;
        }
        true
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Waiting => "waiting",
            TaskStatus::Active => "active",
            TaskStatus::Paused => "paused",
            TaskStatus::Complete => "complete",
            TaskStatus::Error => "error",
            TaskStatus::Removed => "removed",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// User action on a set of tasks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskAction {
    Pause,
    Resume,
    Remove,
}

impl fmt::Display for TaskAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskAction::Pause => "pause",
            TaskAction::Resume => "resume",
            TaskAction::Remove => "remove",
        };
        f.write_str(s)
    }
}

/// One submitted link's lifecycle record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub engine: EngineKind,
    pub name: String,
    pub status: TaskStatus,
    pub total_length: u64,
    pub completed_length: u64,
    pub download_speed: Option<f64>,
    pub dir: PathBuf,
    #[serde(default)]
    pub files: Vec<PathBuf>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub error_message: Option<String>,
    pub added_at: DateTime<Utc>,
    #[serde(default)]
    pub finished_at: Option<DateTime<Utc>>,
}

impl Task {
    /// Fresh `waiting` task with zeroed progress, named after its source link
    pub fn waiting(id: String, engine: EngineKind, source: &str, dir: PathBuf) -> Self {
        Self {
            id,
            engine,
            name: source.to_string(),
            status: TaskStatus::Waiting,
            total_length: 0,
            completed_length: 0,
            download_speed: None,
            dir,
            files: Vec::new(),
            source: Some(source.to_string()),
            error_message: None,
            added_at: Utc::now(),
            finished_at: None,
        }
    }

    /// Progress as a fraction (0.0 to 1.0)
    pub fn percentage(&self) -> f64 {
        if self.total_length == 0 {
            return 0.0;
        }
        self.completed_length as f64 / self.total_length as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_statuses() {
        assert!(TaskStatus::Complete.is_terminal());
        assert!(TaskStatus::Error.is_terminal());
        assert!(TaskStatus::Removed.is_terminal());
        assert!(!TaskStatus::Waiting.is_terminal());
        assert!(!TaskStatus::Active.is_terminal());
        assert!(!TaskStatus::Paused.is_terminal());
    }

    #[test]
    fn test_transitions() {
        assert!(TaskStatus::Waiting.can_transition_to(TaskStatus::Active));
        assert!(TaskStatus::Active.can_transition_to(TaskStatus::Paused));
        assert!(TaskStatus::Paused.can_transition_to(TaskStatus::Waiting));
        assert!(TaskStatus::Active.can_transition_to(TaskStatus::Complete));
        assert!(!TaskStatus::Complete.can_transition_to(TaskStatus::Active));
        assert!(!TaskStatus::Error.can_transition_to(TaskStatus::Complete));
        assert!(!TaskStatus::Removed.can_transition_to(TaskStatus::Waiting));
    }

    #[test]
    fn test_task_serializes_camel_case() {
        let task = Task::waiting(
            "abc".to_string(),
            EngineKind::Process,
            "https://youtube.com/watch?v=abc",
            PathBuf::from("/tmp/downloads"),
        );
        let json = serde_json::to_value(&task).unwrap();
        assert_eq!(json["totalLength"], 0);
        assert_eq!(json["completedLength"], 0);
        assert!(json["downloadSpeed"].is_null());
        assert_eq!(json["status"], "waiting");
        assert_eq!(json["engine"], "process");
        assert_eq!(json["name"], "https://youtube.com/watch?v=abc");
    }

    #[test]
    fn test_percentage() {
        let mut task = Task::waiting("a".into(), EngineKind::Rpc, "x", PathBuf::from("/"));
        assert_eq!(task.percentage(), 0.0);
        task.total_length = 1000;
        task.completed_length = 250;
        assert_eq!(task.percentage(), 0.25);
    }
}
