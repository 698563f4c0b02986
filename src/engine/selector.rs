//! Link routing between the aria2 daemon and yt-dlp

use crate::task::EngineKind;
use tracing::debug;
use url::Url;

/// Hostname suffixes handled by yt-dlp out of the box
pub const DEFAULT_STREAMING_DOMAINS: &[&str] = &[
    "youtube.com",
    "youtu.be",
    "twitch.tv",
    "vimeo.com",
    "dailymotion.com",
    "facebook.com",
    "twitter.com",
    "x.com",
    "tiktok.com",
    "soundcloud.com",
];

/// Maps a submitted link to the engine that should download it.
///
/// Rules are checked in order and the first match wins:
/// 1. `magnet:` links go to aria2
/// 2. links ending in `.torrent` go to aria2
/// 3. `http(s)`/`ftp` links whose hostname ends with a streaming domain go to yt-dlp,
///    every other one (including unparsable ones) goes to aria2
/// 4. anything else goes to aria2
#[derive(Debug, Clone)]
pub struct EngineSelector {
    streaming_domains: Vec<String>,
}

impl EngineSelector {
    pub fn new<I, S>(streaming_domains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            streaming_domains: streaming_domains
                .into_iter()
                .map(|d| d.into().to_lowercase())
                .filter(|d| !d.is_empty())
                .collect(),
        }
    }

    pub fn streaming_domains(&self) -> &[String] {
        &self.streaming_domains
    }

    /// Pick the engine for `link`. Never fails. The link is matched as given; callers trim.
    pub fn select(&self, link: &str) -> EngineKind {
        let lower = link.to_lowercase();

        if lower.starts_with("magnet:") {
            return EngineKind::Rpc;
        }

        if lower.ends_with(".torrent") {
            return EngineKind::Rpc;
        }

        if lower.starts_with("http://") || lower.starts_with("https://") || lower.starts_with("ftp://")
        {
            let engine = match Url::parse(&lower) {
                Ok(url) => match url.host_str() {
                    Some(host) if self.is_streaming_host(host) => EngineKind::Process,
                    _ => EngineKind::Rpc,
                },
                Err(e) => {
                    debug!("Unparsable link {}: {}, routing to aria2", link, e);
                    EngineKind::Rpc
                }
            };
            return engine;
        }

        EngineKind::Rpc
    }

    fn is_streaming_host(&self, host: &str) -> bool {
        self.streaming_domains
            .iter()
            .any(|domain| host.ends_with(domain.as_str()))
    }
}

impl Default for EngineSelector {
    fn default() -> Self {
        Self::new(DEFAULT_STREAMING_DOMAINS.iter().copied())
    }
}
