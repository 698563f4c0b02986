//! Process engine: one yt-dlp process per task

use crate::extractor::ytdlp::{build_args, classify_line, OutputLine};
use crate::queue::events::CompletionEvent;
use crate::queue::registry::TaskRegistry;
use crate::task::{EngineKind, Task, TaskStatus};
use crate::utils::error::HaulError;
use anyhow::Result;
use chrono::Utc;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command as AsyncCommand;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, error, info, warn};

/// Options for a process-engine task
#[derive(Debug, Clone, Default)]
pub struct ProcessOptions {
    /// Output directory; the manager's working directory when unset
    pub dir: Option<PathBuf>,
    /// Raw `Cookie` header value forwarded to yt-dlp
    pub cookie: Option<String>,
}

/// Spawns and tracks yt-dlp processes.
///
/// Tasks go `waiting -> active -> complete | error`. There is no pause, resume, removal or
/// cancellation, and no cap on how many processes run at once.
pub struct ProcessManager {
    registry: Arc<RwLock<TaskRegistry>>,
    binary: PathBuf,
    working_dir: PathBuf,
    completions: Option<mpsc::Sender<CompletionEvent>>,
}

impl ProcessManager {
    pub fn new(binary: PathBuf, working_dir: PathBuf, retention: Option<chrono::Duration>) -> Self {
        Self {
            registry: Arc::new(RwLock::new(TaskRegistry::new(retention))),
            binary,
            working_dir,
            completions: None,
        }
    }

    /// Send a [`CompletionEvent`] whenever a process exits successfully
    pub fn with_completions(mut self, completions: mpsc::Sender<CompletionEvent>) -> Self {
        self.completions = Some(completions);
        self
    }

    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    /// Register a task and start its process in the background. Returns the task id at once.
    pub async fn add_task(&self, uri: &str, options: ProcessOptions) -> Result<String> {
        let dir = options.dir.unwrap_or_else(|| self.working_dir.clone());

        let id = {
            let mut registry = self.registry.write().await;
            registry.evict_expired(Utc::now());
            registry.insert_with(generate_task_id, |id| {
                Task::waiting(id, EngineKind::Process, uri, dir.clone())
            })
        };

        info!("Adding {} to yt-dlp as {}", uri, id);

        let args = build_args(uri, &dir, options.cookie.as_deref());
        let run = ProcessRun {
            id: id.clone(),
            binary: self.binary.clone(),
            args,
            dir,
            registry: Arc::clone(&self.registry),
            completions: self.completions.clone(),
        };
        tokio::spawn(run.execute());

        Ok(id)
    }

    pub async fn get_task(&self, id: &str) -> Option<Task> {
        self.registry.read().await.get(id)
    }

    /// Read handle on the registry that does not keep the completion channel open
    pub fn tasks(&self) -> ProcessTasks {
        ProcessTasks {
            registry: Arc::clone(&self.registry),
        }
    }

    pub async fn contains(&self, id: &str) -> bool {
        self.registry.read().await.contains(id)
    }

    /// Snapshot of all tracked tasks in submission order
    pub async fn list_tasks(&self) -> Vec<Task> {
        let mut registry = self.registry.write().await;
        registry.evict_expired(Utc::now());
        registry.list()
    }
}

/// Read-only view of the process engine's tasks
#[derive(Clone)]
pub struct ProcessTasks {
    registry: Arc<RwLock<TaskRegistry>>,
}

impl ProcessTasks {
    pub async fn get(&self, id: &str) -> Option<Task> {
        self.registry.read().await.get(id)
    }
}

/// 8 random bytes as lowercase hex
pub fn generate_task_id() -> String {
    let bytes: [u8; 8] = rand::random();
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Everything a spawned task needs, detached from the manager
struct ProcessRun {
    id: String,
    binary: PathBuf,
    args: Vec<String>,
    dir: PathBuf,
    registry: Arc<RwLock<TaskRegistry>>,
    completions: Option<mpsc::Sender<CompletionEvent>>,
}

impl ProcessRun {
    async fn execute(self) {
        if let Err(e) = tokio::fs::create_dir_all(&self.dir).await {
            warn!("Failed to create output directory {:?}: {}", self.dir, e);
        }

        let mut child = match AsyncCommand::new(&self.binary)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
        {
            Ok(child) => child,
            Err(e) => {
                error!("Failed to start {:?} for task {}: {}", self.binary, self.id, e);
                let message = if e.kind() == std::io::ErrorKind::NotFound {
                    HaulError::YtDlpNotFound.to_string()
                } else {
                    format!("failed to start yt-dlp: {}", e)
                };
                self.registry
                    .write()
                    .await
                    .finish(&self.id, TaskStatus::Error, Some(message));
                return;
            }
        };

        if let Some(stderr) = child.stderr.take() {
            let id = self.id.clone();
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!("yt-dlp [{}] stderr: {}", id, line);
                }
            });
        }

        // stdout is read to EOF before the exit status is applied, so no progress line can land
        // after the terminal status
        if let Some(stdout) = child.stdout.take() {
            if let Err(e) = self.consume_stdout(stdout).await {
                warn!("Failed reading yt-dlp output for task {}: {}", self.id, e);
            }
        }

        let (status, message) = match child.wait().await {
            Ok(exit) if exit.success() => (TaskStatus::Complete, None),
            Ok(exit) => {
                let message = match exit.code() {
                    Some(code) => format!("yt-dlp exited with code {}", code),
                    None => "yt-dlp was terminated by a signal".to_string(),
                };
                (TaskStatus::Error, Some(message))
            }
            Err(e) => (
                TaskStatus::Error,
                Some(format!("failed to wait for yt-dlp: {}", e)),
            ),
        };

        self.registry
            .write()
            .await
            .finish(&self.id, status, message.clone());

        match status {
            TaskStatus::Complete => {
                info!("Task {} completed", self.id);
                if let Some(completions) = &self.completions {
                    if completions
                        .send(CompletionEvent::process(self.id.clone()))
                        .await
                        .is_err()
                    {
                        warn!("Completion channel closed; task {} will not be relocated", self.id);
                    }
                }
            }
            _ => error!(
                "Task {} failed: {}",
                self.id,
                message.unwrap_or_default()
            ),
        }
    }

    /// yt-dlp may redraw progress with `\r`, so split on both line terminators
    async fn consume_stdout<R>(&self, stdout: R) -> std::io::Result<()>
    where
        R: AsyncRead + Unpin,
    {
        let mut segments = BufReader::new(stdout).split(b'\n');

        while let Some(segment) = segments.next_segment().await? {
            for part in segment.split(|b| *b == b'\r') {
                let line = String::from_utf8_lossy(part);
                if line.trim().is_empty() {
                    continue;
                }
                self.handle_line(&line).await;
            }
        }

        Ok(())
    }

    async fn handle_line(&self, line: &str) {
        match classify_line(line) {
            OutputLine::Progress(sample) => {
                self.registry.write().await.apply_progress(&self.id, &sample);
            }
            OutputLine::Malformed(detail) => {
                warn!("Failed to parse progress JSON for task {}: {}", self.id, detail);
            }
            OutputLine::Destination(path) => {
                let path = if path.is_absolute() {
                    path
                } else {
                    self.dir.join(path)
                };
                debug!("Task {} writes to {:?}", self.id, path);
                self.registry.write().await.record_output(&self.id, path);
            }
            OutputLine::Other => {
                debug!("yt-dlp [{}]: {}", self.id, line.trim());
            }
        }
    }
}
