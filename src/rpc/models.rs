//! aria2 wire types

use crate::task::{EngineKind, Task, TaskStatus};
use chrono::Utc;
use serde::{Deserialize, Deserializer, Serialize};
use std::path::{Path, PathBuf};

/// aria2 reports every number as a decimal string
fn number_string<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Str(String),
        Num(u64),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Num(n) => Ok(n),
        Raw::Str(s) if s.is_empty() => Ok(0),
        Raw::Str(s) => s.parse().map_err(serde::de::Error::custom),
    }
}

/// Subset of `aria2.tellStatus` used by haul
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Aria2Status {
    pub gid: String,
    pub status: TaskStatus,
    #[serde(deserialize_with = "number_string")]
    pub total_length: u64,
    #[serde(deserialize_with = "number_string")]
    pub completed_length: u64,
    #[serde(deserialize_with = "number_string")]
    pub download_speed: u64,
    pub dir: String,
    pub files: Vec<Aria2File>,
    pub bittorrent: Option<Aria2Bittorrent>,
    pub error_code: Option<String>,
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Aria2File {
    pub index: String,
    pub path: String,
    #[serde(deserialize_with = "number_string")]
    pub length: u64,
    #[serde(deserialize_with = "number_string")]
    pub completed_length: u64,
    pub selected: String,
    pub uris: Vec<Aria2Uri>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Aria2Uri {
    pub uri: String,
    pub status: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Aria2Bittorrent {
    pub info: Option<Aria2BittorrentInfo>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Aria2BittorrentInfo {
    pub name: String,
}

impl Aria2File {
    /// Torrent metadata pseudo-files carry no payload
    pub fn is_metadata(&self) -> bool {
        self.path.starts_with("[METADATA]")
    }

    pub fn is_selected(&self) -> bool {
        self.selected != "false"
    }
}

impl Aria2Status {
    /// Payload files worth relocating: selected, on disk, not torrent metadata
    pub fn payload_files(&self) -> Vec<PathBuf> {
        self.files
            .iter()
            .filter(|f| !f.path.is_empty() && !f.is_metadata() && f.is_selected())
            .map(|f| PathBuf::from(&f.path))
            .collect()
    }

    fn first_uri(&self) -> Option<&str> {
        self.files
            .iter()
            .flat_map(|f| f.uris.iter())
            .map(|u| u.uri.as_str())
            .find(|u| !u.is_empty())
    }

    /// Torrent name, else first file name, else first URI, else the gid
    pub fn display_name(&self) -> String {
        if let Some(info) = self.bittorrent.as_ref().and_then(|b| b.info.as_ref()) {
            if !info.name.is_empty() {
                return info.name.clone();
            }
        }

        if let Some(name) = self
            .files
            .iter()
            .filter(|f| !f.path.is_empty())
            .find_map(|f| Path::new(&f.path).file_name())
        {
            return name.to_string_lossy().into_owned();
        }

        self.first_uri()
            .map(str::to_string)
            .unwrap_or_else(|| self.gid.clone())
    }

    /// Unified task view of a daemon-held download
    pub fn into_task(self) -> Task {
        let name = self.display_name();
        let source = self.first_uri().map(str::to_string);
        let files = self.payload_files();
        let download_speed = if self.status == TaskStatus::Active {
            Some(self.download_speed as f64)
        } else {
            None
        };

        Task {
            id: self.gid,
            engine: EngineKind::Rpc,
            name,
            status: self.status,
            total_length: self.total_length,
            completed_length: self.completed_length,
            download_speed,
            dir: PathBuf::from(self.dir),
            files,
            source,
            error_message: self.error_message.filter(|m| !m.is_empty()),
            // aria2 does not expose submission time; the snapshot time stands in
            added_at: Utc::now(),
            finished_at: None,
        }
    }
}

/// One merged listing from the daemon
#[derive(Debug, Clone, Default)]
pub struct Aria2Snapshot {
    pub active: Vec<Aria2Status>,
    pub waiting: Vec<Aria2Status>,
    pub stopped: Vec<Aria2Status>,
}

impl Aria2Snapshot {
    /// active, then waiting, then stopped
    pub fn into_ordered(self) -> Vec<Aria2Status> {
        let mut all = self.active;
        all.extend(self.waiting);
        all.extend(self.stopped);
        all
    }
}
