//! aria2 push notifications over WebSocket
//!
//! aria2 pushes JSON-RPC notifications such as
//! `{"jsonrpc":"2.0","method":"aria2.onDownloadComplete","params":[{"gid":"..."}]}` to every
//! connected WebSocket client. Completion notifications are forwarded to the completion channel;
//! the rest are only logged.

use crate::queue::events::CompletionEvent;
use anyhow::Result;
use futures::StreamExt;
use serde::Deserialize;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Notification kinds aria2 emits
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Aria2Notification {
    DownloadStart(String),
    DownloadPause(String),
    DownloadStop(String),
    DownloadComplete(String),
    DownloadError(String),
    BtDownloadComplete(String),
}

impl Aria2Notification {
    pub fn gid(&self) -> &str {
        match self {
            Aria2Notification::DownloadStart(gid)
            | Aria2Notification::DownloadPause(gid)
            | Aria2Notification::DownloadStop(gid)
            | Aria2Notification::DownloadComplete(gid)
            | Aria2Notification::DownloadError(gid)
            | Aria2Notification::BtDownloadComplete(gid) => gid,
        }
    }

    /// Completion notifications that should trigger relocation
    pub fn completion(&self) -> Option<CompletionEvent> {
        match self {
            Aria2Notification::DownloadComplete(gid)
            | Aria2Notification::BtDownloadComplete(gid) => Some(CompletionEvent::rpc(gid.clone())),
            _ => None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawNotification {
    method: String,
    #[serde(default)]
    params: Vec<RawEvent>,
}

#[derive(Debug, Deserialize)]
struct RawEvent {
    gid: String,
}

/// Parse one WebSocket text frame. Responses and unknown methods yield `None`.
pub fn parse_notification(text: &str) -> Option<Aria2Notification> {
    let raw: RawNotification = serde_json::from_str(text).ok()?;
    let gid = raw.params.into_iter().next()?.gid;

    let notification = match raw.method.as_str() {
        "aria2.onDownloadStart" => Aria2Notification::DownloadStart(gid),
        "aria2.onDownloadPause" => Aria2Notification::DownloadPause(gid),
        "aria2.onDownloadStop" => Aria2Notification::DownloadStop(gid),
        "aria2.onDownloadComplete" => Aria2Notification::DownloadComplete(gid),
        "aria2.onDownloadError" => Aria2Notification::DownloadError(gid),
        "aria2.onBtDownloadComplete" => Aria2Notification::BtDownloadComplete(gid),
        _ => return None,
    };
    Some(notification)
}

/// Long-lived notification subscriber
pub struct NotificationListener {
    url: String,
    reconnect_delay: Duration,
    completions: mpsc::Sender<CompletionEvent>,
}

impl NotificationListener {
    pub fn new(
        url: impl Into<String>,
        reconnect_delay: Duration,
        completions: mpsc::Sender<CompletionEvent>,
    ) -> Self {
        Self {
            url: url.into(),
            reconnect_delay,
            completions,
        }
    }

    /// Listen until cancelled or the completion channel closes, reconnecting on failure
    pub async fn run(self, cancel: CancellationToken) {
        info!("Listening for aria2 notifications on {}", self.url);

        loop {
            let outcome = tokio::select! {
                _ = cancel.cancelled() => break,
                outcome = self.listen_once() => outcome,
            };

            match outcome {
                Ok(true) => {
                    debug!("Completion channel closed, stopping notification listener");
                    break;
                }
                Ok(false) => warn!("aria2 notification socket closed"),
                Err(e) => warn!("aria2 notification socket error: {}", e),
            }

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.reconnect_delay) => {}
            }
            debug!("Reconnecting to {}", self.url);
        }

        info!("aria2 notification listener stopped");
    }

    /// One connection; `Ok(true)` means the receiver side is gone
    async fn listen_once(&self) -> Result<bool> {
        let (mut socket, _) = connect_async(self.url.as_str()).await?;
        info!("Connected to aria2 notifications");

        while let Some(message) = socket.next().await {
            let message = message?;
            if !message.is_text() {
                continue;
            }

            let text = message.to_text()?;
            let Some(notification) = parse_notification(text) else {
                continue;
            };

            debug!("aria2 notification: {:?}", notification);

            if let Some(event) = notification.completion() {
                info!("aria2 task {} completed", event.task_id);
                if self.completions.send(event).await.is_err() {
                    return Ok(true);
                }
            }
        }

        Ok(false)
    }
}
