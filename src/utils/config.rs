//! Application configuration

use crate::engine::selector::DEFAULT_STREAMING_DOMAINS;
use crate::utils::error::HaulError;
use crate::utils::platform;
use anyhow::{Context, Result};
use path_absolutize::Absolutize;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    /// Engine working directory (downloads in progress)
    pub working_dir: PathBuf,

    /// Canonical library root (finished payloads)
    pub library_dir: PathBuf,

    /// aria2 JSON-RPC endpoint
    pub rpc_url: String,

    /// aria2 `--rpc-secret`
    pub rpc_secret: Option<String>,

    /// WebSocket endpoint for aria2 notifications; derived from `rpc_url` when unset
    pub rpc_ws_url: Option<String>,

    /// Per-request timeout for RPC calls
    pub rpc_timeout_secs: u64,

    /// Explicit yt-dlp binary; discovered when unset
    pub ytdlp_path: Option<PathBuf>,

    /// Hostname suffixes routed to yt-dlp
    pub streaming_domains: Vec<String>,

    /// Cap for aria2 waiting/stopped listings
    pub listing_limit: usize,

    /// How long finished yt-dlp tasks stay visible; `None` keeps them forever
    pub task_retention_secs: Option<u64>,

    /// Delay before reconnecting the notification socket
    pub reconnect_delay_secs: u64,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            working_dir: platform::default_working_dir(),
            library_dir: platform::default_library_dir(),
            rpc_url: "http://127.0.0.1:6800/jsonrpc".to_string(),
            rpc_secret: None,
            rpc_ws_url: None,
            rpc_timeout_secs: 10,
            ytdlp_path: None,
            streaming_domains: DEFAULT_STREAMING_DOMAINS
                .iter()
                .map(|d| d.to_string())
                .collect(),
            listing_limit: 1000,
            task_retention_secs: Some(6 * 60 * 60),
            reconnect_delay_secs: 5,
        }
    }
}

impl AppSettings {
    /// Load settings from a JSON file. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("Settings file {:?} not found, using defaults", path);
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings file {:?}", path))?;
        let settings: AppSettings = serde_json::from_str(&content)
            .map_err(HaulError::from)
            .with_context(|| format!("Failed to parse settings file {:?}", path))?;

        info!("Loaded settings from {:?}", path);
        Ok(settings)
    }

    /// Full resolution used by the binary: file, then environment, then path normalisation
    pub fn resolve(path: Option<&Path>) -> Result<Self> {
        let path = path
            .map(Path::to_path_buf)
            .unwrap_or_else(platform::default_settings_path);

        let mut settings = Self::load(&path)?;
        settings.apply_env(|key| std::env::var(key).ok());
        settings.absolutize_paths()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Apply `HAUL_*` overrides through the given lookup
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup("HAUL_DOWNLOADS_DIR") {
            self.working_dir = PathBuf::from(dir);
        }
        if let Some(dir) = lookup("HAUL_FILES_DIR") {
            self.library_dir = PathBuf::from(dir);
        }
        if let Some(url) = lookup("HAUL_RPC_URL") {
            self.rpc_url = url;
        }
        if let Some(secret) = lookup("HAUL_RPC_SECRET") {
            self.rpc_secret = Some(secret).filter(|s| !s.is_empty());
        }
    }

    /// Make both filesystem roots absolute
    pub fn absolutize_paths(&mut self) -> Result<()> {
        self.working_dir = self.working_dir.absolutize()?.into_owned();
        self.library_dir = self.library_dir.absolutize()?.into_owned();
        if let Some(path) = &self.ytdlp_path {
            self.ytdlp_path = Some(path.absolutize()?.into_owned());
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.rpc_url.trim().is_empty() {
            return Err(HaulError::Config("rpc_url must not be empty".to_string()).into());
        }
        if self.listing_limit == 0 {
            return Err(HaulError::Config("listing_limit must be at least 1".to_string()).into());
        }
        if self.working_dir == self.library_dir {
            return Err(HaulError::Config(
                "working_dir and library_dir must be different directories".to_string(),
            )
            .into());
        }
        Ok(())
    }

    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_secs(self.rpc_timeout_secs)
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_secs(self.reconnect_delay_secs)
    }

    pub fn task_retention(&self) -> Option<chrono::Duration> {
        self.task_retention_secs
            .and_then(|secs| chrono::Duration::try_seconds(secs as i64))
    }

    /// WebSocket URL for notifications
    pub fn notification_url(&self) -> String {
        match &self.rpc_ws_url {
            Some(url) => url.clone(),
            None => derive_ws_url(&self.rpc_url),
        }
    }
}

/// `http://host:6800/jsonrpc` -> `ws://host:6800/jsonrpc`
pub fn derive_ws_url(rpc_url: &str) -> String {
    if let Some(rest) = rpc_url.strip_prefix("https://") {
        format!("wss://{}", rest)
    } else if let Some(rest) = rpc_url.strip_prefix("http://") {
        format!("ws://{}", rest)
    } else {
        rpc_url.to_string()
    }
}
