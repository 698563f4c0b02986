//! Consumes completion events and moves finished payloads into the library

use crate::queue::{CompletionEvent, ProcessTasks};
use crate::rpc::RpcEngine;
use crate::task::{EngineKind, TaskStatus};
use crate::utils::error::HaulError;
use crate::utils::relocator::{RelocationReport, Relocator};
use anyhow::Result;
use std::path::PathBuf;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

pub struct CompletionWorker {
    rpc: RpcEngine,
    process: ProcessTasks,
    relocator: Relocator,
}

impl CompletionWorker {
    pub fn new(rpc: RpcEngine, process: ProcessTasks, relocator: Relocator) -> Self {
        Self {
            rpc,
            process,
            relocator,
        }
    }

    /// Relocate the payload of one finished task
    pub async fn handle(&self, event: &CompletionEvent) -> Result<RelocationReport> {
        let (dir, files) = match event.engine {
            EngineKind::Rpc => {
                let status = self.rpc.api().tell_status(&event.task_id).await?;
                let files = status.payload_files();
                (PathBuf::from(status.dir), files)
            }
            EngineKind::Process => {
                let task = self
                    .process
                    .get(&event.task_id)
                    .await
                    .ok_or_else(|| HaulError::TaskNotFound(event.task_id.clone()))?;
                if task.status != TaskStatus::Complete {
                    warn!(
                        "Task {} reported complete but is {}",
                        event.task_id, task.status
                    );
                }
                (task.dir, task.files)
            }
        };

        if files.is_empty() {
            warn!("Task {} finished without any known files", event.task_id);
            return Ok(RelocationReport::default());
        }

        Ok(self.relocator.relocate(&dir, &files).await)
    }

    /// Handle events one at a time until the channel closes or `cancel` fires
    pub async fn run(self, mut events: mpsc::Receiver<CompletionEvent>, cancel: CancellationToken) {
        info!(
            "Completion worker started, library at {:?}",
            self.relocator.library_root()
        );

        loop {
            let event = tokio::select! {
                _ = cancel.cancelled() => break,
                event = events.recv() => match event {
                    Some(event) => event,
                    None => break,
                },
            };

            match self.handle(&event).await {
                Ok(report) if report.is_clean() => {
                    info!(
                        "{} task {} relocated ({} moved, {} skipped)",
                        event.engine,
                        event.task_id,
                        report.moved.len(),
                        report.skipped.len()
                    );
                }
                Ok(report) => {
                    error!(
                        "{} task {}: {} file(s) could not be relocated",
                        event.engine,
                        event.task_id,
                        report.failed.len()
                    );
                }
                Err(e) => {
                    error!(
                        "Failed to relocate {} task {}: {:#}",
                        event.engine, event.task_id, e
                    );
                }
            }
        }

        info!("Completion worker stopped");
    }
}
