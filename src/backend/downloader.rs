//! Unified front over the RPC and process engines

use super::messages::{ActionOutcome, Submission, TaskOptions};
use crate::engine::EngineSelector;
use crate::extractor::ytdlp::resolve_binary;
use crate::queue::{CompletionEvent, ProcessManager, ProcessOptions};
use crate::rpc::{Aria2Client, RpcEngine};
use crate::task::{EngineKind, Task, TaskAction};
use crate::utils::config::AppSettings;
use crate::utils::error::HaulError;
use anyhow::Result;
use futures::future::join_all;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

/// Capacity of the completion channel built by [`Downloader::from_settings`]
pub const COMPLETION_CHANNEL_CAPACITY: usize = 256;

pub struct Downloader {
    rpc: RpcEngine,
    process: Arc<ProcessManager>,
    selector: EngineSelector,
}

impl Downloader {
    pub fn new(rpc: RpcEngine, process: Arc<ProcessManager>, selector: EngineSelector) -> Self {
        Self {
            rpc,
            process,
            selector,
        }
    }

    /// Production wiring: aria2 over HTTP, yt-dlp from config or discovery, and a completion
    /// channel fed by the process engine. The returned sender is for the notification listener.
    pub fn from_settings(
        settings: &AppSettings,
    ) -> Result<(
        Self,
        mpsc::Sender<CompletionEvent>,
        mpsc::Receiver<CompletionEvent>,
    )> {
        let (tx, rx) = mpsc::channel(COMPLETION_CHANNEL_CAPACITY);

        let client = Aria2Client::new(
            settings.rpc_url.clone(),
            settings.rpc_secret.clone(),
            settings.rpc_timeout(),
        )?;
        let rpc = RpcEngine::new(Arc::new(client), settings.listing_limit);

        let binary = resolve_binary(settings.ytdlp_path.as_deref());
        let process = ProcessManager::new(
            binary,
            settings.working_dir.clone(),
            settings.task_retention(),
        )
        .with_completions(tx.clone());

        let selector = EngineSelector::new(settings.streaming_domains.iter().cloned());

        info!(
            "Downloader ready (aria2 at {}, working dir {:?})",
            settings.rpc_url, settings.working_dir
        );
        Ok((Self::new(rpc, Arc::new(process), selector), tx, rx))
    }

    pub fn rpc(&self) -> &RpcEngine {
        &self.rpc
    }

    pub fn process(&self) -> &Arc<ProcessManager> {
        &self.process
    }

    pub fn selector(&self) -> &EngineSelector {
        &self.selector
    }

    /// Submit one link. `engine` bypasses the selector when set.
    pub async fn add_task(
        &self,
        link: &str,
        options: &TaskOptions,
        engine: Option<EngineKind>,
    ) -> Result<String> {
        let link = link.trim();
        if link.is_empty() {
            return Err(HaulError::InvalidUrl("empty link".to_string()).into());
        }

        let engine = engine.unwrap_or_else(|| self.selector.select(link));
        self.submit(link, engine, options).await
    }

    /// Submit every link concurrently. A failing link is logged and reported; the rest still go
    /// through. Results come back in input order.
    pub async fn add_tasks<S>(
        &self,
        links: &[S],
        options: &TaskOptions,
        engine: Option<EngineKind>,
    ) -> Vec<Submission>
    where
        S: AsRef<str>,
    {
        let submissions = links.iter().map(|link| async move {
            let raw = link.as_ref();
            let link = raw.trim();
            if link.is_empty() {
                let e = HaulError::InvalidUrl("empty link".to_string());
                error!("Failed to add {:?}: {}", raw, e);
                return Submission::rejected(raw.to_string(), None, e.to_string());
            }

            let kind = engine.unwrap_or_else(|| self.selector.select(link));
            match self.submit(link, kind, options).await {
                Ok(id) => Submission::accepted(link.to_string(), kind, id),
                Err(e) => {
                    error!("Failed to add {}: {:#}", link, e);
                    Submission::rejected(link.to_string(), Some(kind), format!("{:#}", e))
                }
            }
        });

        join_all(submissions).await
    }

    async fn submit(&self, link: &str, engine: EngineKind, options: &TaskOptions) -> Result<String> {
        match engine {
            EngineKind::Rpc => {
                let mut extra = options.extra.clone();
                if let Some(cookie) = options.cookie.as_deref().filter(|c| !c.trim().is_empty()) {
                    extra
                        .entry("header")
                        .or_insert_with(|| Value::String(format!("Cookie: {}", cookie.trim())));
                }
                self.rpc.add_uri(link, options.dir.as_deref(), &extra).await
            }
            EngineKind::Process => {
                self.process
                    .add_task(
                        link,
                        ProcessOptions {
                            dir: options.dir.clone(),
                            cookie: options.cookie.clone(),
                        },
                    )
                    .await
            }
        }
    }

    /// Every known task: daemon tasks (active, waiting, stopped) then process tasks in
    /// submission order. An unreachable daemon only drops its own part.
    pub async fn list_tasks(&self) -> Vec<Task> {
        let mut tasks = match self.rpc.list_all().await {
            Ok(tasks) => tasks,
            Err(e) => {
                warn!("Could not list aria2 tasks: {:#}", e);
                Vec::new()
            }
        };

        tasks.extend(self.process.list_tasks().await);
        tasks
    }

    /// Apply `action` to each id. Ids owned by the process engine are rejected since it cannot
    /// pause, resume or remove; every other id goes to the daemon.
    pub async fn dispatch<S>(&self, ids: &[S], action: TaskAction) -> Vec<ActionOutcome>
    where
        S: AsRef<str>,
    {
        let outcomes = ids.iter().map(|id| async move {
            let id = id.as_ref();
            let result = self.apply(id, action).await;
            if let Err(e) = &result {
                error!("Failed to {} {}: {:#}", action, id, e);
            }
            ActionOutcome {
                id: id.to_string(),
                error: result.err().map(|e| format!("{:#}", e)),
            }
        });

        join_all(outcomes).await
    }

    async fn apply(&self, id: &str, action: TaskAction) -> Result<()> {
        if self.process.contains(id).await {
            return Err(HaulError::Unsupported {
                engine: EngineKind::Process,
                action,
            }
            .into());
        }

        match action {
            TaskAction::Pause => self.rpc.pause(id).await,
            TaskAction::Resume => self.rpc.unpause(id).await,
            TaskAction::Remove => self.rpc.remove(id).await,
        }
    }
}
