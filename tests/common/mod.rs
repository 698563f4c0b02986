//! Shared fixtures: an in-memory aria2 stand-in and shell-script yt-dlp stand-ins

#![allow(dead_code)]

use anyhow::Result;
use async_trait::async_trait;
use haul::rpc::{Aria2Api, Aria2File, Aria2Status};
use haul::{HaulError, TaskStatus};
use serde_json::Value;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Records every call in order and serves statuses from memory
#[derive(Default)]
pub struct MockAria2 {
    calls: Mutex<Vec<String>>,
    statuses: Mutex<Vec<Aria2Status>>,
    rejected: HashSet<String>,
    offline: bool,
    next_gid: AtomicU64,
}

impl MockAria2 {
    pub fn new() -> Self {
        Self::default()
    }

    /// `addUri` fails for these links
    pub fn rejecting<I, S>(links: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            rejected: links.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Every call fails as if the daemon were down
    pub fn offline() -> Self {
        Self {
            offline: true,
            ..Self::default()
        }
    }

    pub fn with_status(self, status: Aria2Status) -> Self {
        self.statuses.lock().unwrap().push(status);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) -> Result<()> {
        self.calls.lock().unwrap().push(call);
        if self.offline {
            return Err(HaulError::EngineUnavailable("connection refused".to_string()).into());
        }
        Ok(())
    }

    fn find(&self, gid: &str) -> Result<Aria2Status> {
        self.statuses
            .lock()
            .unwrap()
            .iter()
            .find(|s| s.gid == gid)
            .cloned()
            .ok_or_else(|| {
                HaulError::Rpc {
                    code: 1,
                    message: format!("GID {} is not found", gid),
                }
                .into()
            })
    }

    fn with_state(&self, states: &[TaskStatus]) -> Vec<Aria2Status> {
        self.statuses
            .lock()
            .unwrap()
            .iter()
            .filter(|s| states.contains(&s.status))
            .cloned()
            .collect()
    }

    fn set_state(&self, gid: &str, state: TaskStatus) {
        if let Some(status) = self.statuses.lock().unwrap().iter_mut().find(|s| s.gid == gid) {
            status.status = state;
        }
    }
}

#[async_trait]
impl Aria2Api for MockAria2 {
    async fn add_uri(&self, uris: Vec<String>, options: Option<Value>) -> Result<String> {
        let dir = options
            .as_ref()
            .and_then(|o| o.get("dir"))
            .and_then(Value::as_str)
            .map(|d| format!(" dir={}", d))
            .unwrap_or_default();
        self.record(format!("addUri {:?}{}", uris, dir))?;

        if uris.iter().any(|u| self.rejected.contains(u)) {
            return Err(HaulError::Rpc {
                code: 1,
                message: "No URI to download.".to_string(),
            }
            .into());
        }

        let n = self.next_gid.fetch_add(1, Ordering::SeqCst) + 1;
        let gid = format!("{:016x}", n);
        self.statuses.lock().unwrap().push(Aria2Status {
            gid: gid.clone(),
            status: TaskStatus::Waiting,
            ..Default::default()
        });
        Ok(gid)
    }

    async fn pause(&self, gid: &str) -> Result<String> {
        self.record(format!("pause {}", gid))?;
        self.find(gid)?;
        self.set_state(gid, TaskStatus::Paused);
        Ok(gid.to_string())
    }

    async fn unpause(&self, gid: &str) -> Result<String> {
        self.record(format!("unpause {}", gid))?;
        self.find(gid)?;
        self.set_state(gid, TaskStatus::Waiting);
        Ok(gid.to_string())
    }

    async fn remove(&self, gid: &str) -> Result<String> {
        self.record(format!("remove {}", gid))?;
        let status = self.find(gid)?;
        if status.status.is_terminal() {
            return Err(HaulError::Rpc {
                code: 1,
                message: format!("Active Download not found for GID#{}", gid),
            }
            .into());
        }
        self.set_state(gid, TaskStatus::Removed);
        Ok(gid.to_string())
    }

    async fn remove_download_result(&self, gid: &str) -> Result<String> {
        self.record(format!("removeDownloadResult {}", gid))?;
        self.find(gid)?;
        Ok("OK".to_string())
    }

    async fn tell_status(&self, gid: &str) -> Result<Aria2Status> {
        self.record(format!("tellStatus {}", gid))?;
        self.find(gid)
    }

    async fn tell_active(&self) -> Result<Vec<Aria2Status>> {
        self.record("tellActive".to_string())?;
        Ok(self.with_state(&[TaskStatus::Active]))
    }

    async fn tell_waiting(&self, offset: usize, count: usize) -> Result<Vec<Aria2Status>> {
        self.record(format!("tellWaiting {} {}", offset, count))?;
        Ok(self
            .with_state(&[TaskStatus::Waiting, TaskStatus::Paused])
            .into_iter()
            .skip(offset)
            .take(count)
            .collect())
    }

    async fn tell_stopped(&self, offset: usize, count: usize) -> Result<Vec<Aria2Status>> {
        self.record(format!("tellStopped {} {}", offset, count))?;
        Ok(self
            .with_state(&[TaskStatus::Complete, TaskStatus::Error, TaskStatus::Removed])
            .into_iter()
            .skip(offset)
            .take(count)
            .collect())
    }
}

pub fn aria2_status(gid: &str, status: TaskStatus, dir: &Path, files: &[PathBuf]) -> Aria2Status {
    Aria2Status {
        gid: gid.to_string(),
        status,
        total_length: 100,
        completed_length: if status == TaskStatus::Complete { 100 } else { 0 },
        dir: dir.to_string_lossy().into_owned(),
        files: files
            .iter()
            .enumerate()
            .map(|(i, path)| Aria2File {
                index: (i + 1).to_string(),
                path: path.to_string_lossy().into_owned(),
                length: 100,
                completed_length: 100,
                selected: "true".to_string(),
                uris: Vec::new(),
            })
            .collect(),
        ..Default::default()
    }
}

/// Write an executable shell script standing in for yt-dlp
#[cfg(unix)]
pub fn fake_ytdlp(dir: &Path, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join("yt-dlp");
    std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
    let mut perms = std::fs::metadata(&path).unwrap().permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&path, perms).unwrap();
    path
}

/// Poll until `check` holds or the deadline passes
pub async fn eventually<F, Fut>(mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    for _ in 0..250 {
        if check().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    false
}
