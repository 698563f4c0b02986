//! Typed task contract over the aria2 transport

use crate::rpc::client::Aria2Api;
use crate::task::Task;
use anyhow::Result;
use serde_json::{Map, Value};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// aria2-backed engine as seen by the orchestrator
#[derive(Clone)]
pub struct RpcEngine {
    api: Arc<dyn Aria2Api>,
    listing_limit: usize,
}

impl RpcEngine {
    pub fn new(api: Arc<dyn Aria2Api>, listing_limit: usize) -> Self {
        Self {
            api,
            listing_limit: listing_limit.max(1),
        }
    }

    pub fn api(&self) -> &Arc<dyn Aria2Api> {
        &self.api
    }

    pub fn listing_limit(&self) -> usize {
        self.listing_limit
    }

    /// Submit one link; the daemon receives a single-element URI list
    pub async fn add_uri(
        &self,
        uri: &str,
        dir: Option<&Path>,
        extra: &Map<String, Value>,
    ) -> Result<String> {
        let mut options = extra.clone();
        if let Some(dir) = dir {
            options.insert(
                "dir".to_string(),
                Value::String(dir.to_string_lossy().into_owned()),
            );
        }
        let options = if options.is_empty() {
            None
        } else {
            Some(Value::Object(options))
        };

        let gid = self.api.add_uri(vec![uri.to_string()], options).await?;
        info!("aria2 accepted {} as {}", uri, gid);
        Ok(gid)
    }

    pub async fn list_active(&self) -> Result<Vec<Task>> {
        let list = self.api.tell_active().await?;
        Ok(list.into_iter().map(|s| s.into_task()).collect())
    }

    pub async fn list_waiting(&self) -> Result<Vec<Task>> {
        let list = self.api.tell_waiting(0, self.listing_limit).await?;
        Ok(list.into_iter().map(|s| s.into_task()).collect())
    }

    pub async fn list_stopped(&self) -> Result<Vec<Task>> {
        let list = self.api.tell_stopped(0, self.listing_limit).await?;
        Ok(list.into_iter().map(|s| s.into_task()).collect())
    }

    /// Snapshot of active, then waiting, then stopped downloads
    pub async fn list_all(&self) -> Result<Vec<Task>> {
        let snapshot = self.api.tell_all(self.listing_limit).await?;
        Ok(snapshot
            .into_ordered()
            .into_iter()
            .map(|s| s.into_task())
            .collect())
    }

    pub async fn pause(&self, gid: &str) -> Result<()> {
        self.api.pause(gid).await?;
        info!("Paused aria2 task {}", gid);
        Ok(())
    }

    pub async fn unpause(&self, gid: &str) -> Result<()> {
        self.api.unpause(gid).await?;
        info!("Resumed aria2 task {}", gid);
        Ok(())
    }

    pub async fn status(&self, gid: &str) -> Result<Task> {
        Ok(self.api.tell_status(gid).await?.into_task())
    }

    pub async fn remove_result(&self, gid: &str) -> Result<()> {
        self.api.remove_download_result(gid).await?;
        Ok(())
    }

    /// Remove a task.
    ///
    /// aria2 keeps stopped downloads around as results: a task in a terminal status must have
    /// its result cleared with `removeDownloadResult` before `remove` is issued. The daemon may
    /// reject that trailing `remove` once the result is gone, which is not an error here.
    pub async fn remove(&self, gid: &str) -> Result<()> {
        let status = self.api.tell_status(gid).await?;

        if status.status.is_terminal() {
            self.api.remove_download_result(gid).await?;
            if let Err(e) = self.api.remove(gid).await {
                debug!("remove after clearing result of {}: {}", gid, e);
            }
        } else {
            self.api.remove(gid).await?;
        }

        info!("Removed aria2 task {} (was {})", gid, status.status);
        Ok(())
    }
}
