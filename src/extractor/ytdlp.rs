//! yt-dlp invocation and output parsing
//!
//! yt-dlp is driven with a JSON progress template so every progress tick arrives on stdout as a
//! single JSON object. Its regular status lines are still printed and are used to learn where
//! the payload was written.

use regex::Regex;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tracing::{debug, info, warn};

/// Progress template handed to `--progress-template`
pub const PROGRESS_TEMPLATE: &str = concat!(
    "download:",
    r#"{"totalLength":%(progress.total_bytes)s,"#,
    r#""completedLength":%(progress.downloaded_bytes)s,"#,
    r#""downloadSpeed":%(progress.speed)s}"#
);

/// Output file name template, relative to the task directory
pub const OUTPUT_TEMPLATE: &str = "%(title)s.%(ext)s";

static NA_TOKEN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\bNA\b").expect("static regex"));

/// Build the yt-dlp argument list for one task
pub fn build_args(uri: &str, dir: &Path, cookie: Option<&str>) -> Vec<String> {
    let mut args = vec![
        uri.to_string(),
        "-o".to_string(),
        dir.join(OUTPUT_TEMPLATE).to_string_lossy().into_owned(),
        "--progress-template".to_string(),
        PROGRESS_TEMPLATE.to_string(),
    ];

    if let Some(cookie) = cookie.filter(|c| !c.trim().is_empty()) {
        args.push("--add-header".to_string());
        args.push(format!("Cookie: {}", cookie.trim()));
    }

    args
}

/// One progress tick. yt-dlp prints `NA` for values it does not know yet.
#[derive(Debug, Clone, Copy, PartialEq, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressSample {
    pub total_length: Option<f64>,
    pub completed_length: Option<f64>,
    pub download_speed: Option<f64>,
}

impl ProgressSample {
    pub fn total_bytes(&self) -> Option<u64> {
        self.total_length.filter(|v| *v >= 0.0).map(|v| v as u64)
    }

    pub fn completed_bytes(&self) -> Option<u64> {
        self.completed_length.filter(|v| *v >= 0.0).map(|v| v as u64)
    }
}

/// Parse a progress line produced by [`PROGRESS_TEMPLATE`]
pub fn parse_progress(line: &str) -> Result<ProgressSample, serde_json::Error> {
    let sanitized = NA_TOKEN.replace_all(line.trim(), "null");
    serde_json::from_str(&sanitized)
}

/// Classified stdout line
#[derive(Debug, Clone, PartialEq)]
pub enum OutputLine {
    Progress(ProgressSample),
    /// Looked like a progress line but did not parse
    Malformed(String),
    /// Where the payload is (or will end up) on disk
    Destination(PathBuf),
    Other,
}

/// Classify one stdout line
pub fn classify_line(line: &str) -> OutputLine {
    let line = line.trim();

    if line.starts_with('{') {
        return match parse_progress(line) {
            Ok(sample) => OutputLine::Progress(sample),
            Err(e) => OutputLine::Malformed(format!("{}: {}", line, e)),
        };
    }

    if let Some(path) = destination_of(line) {
        return OutputLine::Destination(PathBuf::from(path));
    }

    OutputLine::Other
}

fn destination_of(line: &str) -> Option<&str> {
    if let Some(rest) = line.strip_prefix("[Merger] Merging formats into ") {
        return Some(rest.trim().trim_matches('"'));
    }

    for prefix in ["[download] Destination: ", "[ExtractAudio] Destination: "] {
        if let Some(rest) = line.strip_prefix(prefix) {
            return Some(rest.trim());
        }
    }

    if let Some(rest) = line.strip_prefix("[download] ") {
        if let Some(path) = rest.strip_suffix(" has already been downloaded") {
            return Some(path.trim());
        }
    }

    None
}

/// Resolve the yt-dlp binary: configured path, then PATH, then common install locations.
/// Falls back to the bare command name so a missing binary surfaces as a spawn failure.
pub fn resolve_binary(configured: Option<&Path>) -> PathBuf {
    if let Some(path) = configured {
        return path.to_path_buf();
    }

    match find_ytdlp() {
        Some(path) => path,
        None => {
            warn!("yt-dlp not found; streaming downloads will fail until it is installed");
            PathBuf::from("yt-dlp")
        }
    }
}

/// Find yt-dlp in PATH or in common installation paths
pub fn find_ytdlp() -> Option<PathBuf> {
    if let Ok(path) = which::which("yt-dlp") {
        info!("Using system yt-dlp: {:?}", path);
        return Some(path);
    }

    let common_paths = [
        // macOS Homebrew (Apple Silicon)
        "/opt/homebrew/bin/yt-dlp",
        // macOS Homebrew (Intel)
        "/usr/local/bin/yt-dlp",
        "/usr/bin/yt-dlp",
        "~/.local/bin/yt-dlp",
    ];

    for path_str in common_paths {
        let expanded = match path_str.strip_prefix("~/") {
            Some(rest) => match dirs::home_dir() {
                Some(home) => home.join(rest),
                None => continue,
            },
            None => PathBuf::from(path_str),
        };

        if expanded.is_file() && is_executable(&expanded) {
            info!("Using yt-dlp from common path: {:?}", expanded);
            return Some(expanded);
        }
    }

    debug!("yt-dlp not found in PATH or common locations");
    None
}

fn is_executable(path: &Path) -> bool {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;

        std::fs::metadata(path)
            .map(|m| m.permissions().mode() & 0o111 != 0)
            .unwrap_or(false)
    }

    #[cfg(not(unix))]
    {
        path.exists()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_args() {
        let args = build_args(
            "https://youtube.com/watch?v=abc",
            Path::new("/data/downloads"),
            None,
        );
        assert_eq!(
            args,
            vec![
                "https://youtube.com/watch?v=abc".to_string(),
                "-o".to_string(),
                "/data/downloads/%(title)s.%(ext)s".to_string(),
                "--progress-template".to_string(),
                PROGRESS_TEMPLATE.to_string(),
            ]
        );
    }

    #[test]
    fn test_build_args_with_cookie() {
        let args = build_args("u", Path::new("/d"), Some(" SID=1 "));
        assert_eq!(&args[5..], &["--add-header".to_string(), "Cookie: SID=1".to_string()]);
        assert_eq!(build_args("u", Path::new("/d"), Some("  ")).len(), 5);
    }

    #[test]
    fn test_progress_template_is_json_shaped() {
        assert!(PROGRESS_TEMPLATE.starts_with("download:{\"totalLength\":"));
        assert!(PROGRESS_TEMPLATE.ends_with("%(progress.speed)s}"));
    }

    #[test]
    fn test_parse_progress() {
        let sample =
            parse_progress(r#"{"totalLength":1000,"completedLength":500,"downloadSpeed":50}"#)
                .unwrap();
        assert_eq!(sample.total_bytes(), Some(1000));
        assert_eq!(sample.completed_bytes(), Some(500));
        assert_eq!(sample.download_speed, Some(50.0));
    }

    #[test]
    fn test_parse_progress_na_tokens() {
        let sample =
            parse_progress(r#"{"totalLength":NA,"completedLength":1024,"downloadSpeed":NA}"#)
                .unwrap();
        assert_eq!(sample.total_bytes(), None);
        assert_eq!(sample.completed_bytes(), Some(1024));
        assert_eq!(sample.download_speed, None);
    }

    #[test]
    fn test_parse_progress_float_speed() {
        let sample = parse_progress(
            r#"{"totalLength":2048,"completedLength":1024.0,"downloadSpeed":1523.7}"#,
        )
        .unwrap();
        assert_eq!(sample.completed_bytes(), Some(1024));
        assert_eq!(sample.download_speed, Some(1523.7));
    }

    #[test]
    fn test_classify_malformed() {
        match classify_line(r#"{"totalLength":10,"completedLength":"#) {
            OutputLine::Malformed(msg) => assert!(msg.contains("totalLength")),
            other => panic!("expected malformed, got {:?}", other),
        }
    }

    #[test]
    fn test_classify_destinations() {
        assert_eq!(
            classify_line("[download] Destination: /d/Song.webm"),
            OutputLine::Destination(PathBuf::from("/d/Song.webm"))
        );
        assert_eq!(
            classify_line(r#"[Merger] Merging formats into "/d/Clip.mkv""#),
            OutputLine::Destination(PathBuf::from("/d/Clip.mkv"))
        );
        assert_eq!(
            classify_line("[ExtractAudio] Destination: /d/Song.mp3"),
            OutputLine::Destination(PathBuf::from("/d/Song.mp3"))
        );
        assert_eq!(
            classify_line("[download] /d/Old.mp4 has already been downloaded"),
            OutputLine::Destination(PathBuf::from("/d/Old.mp4"))
        );
        assert_eq!(
            classify_line("[youtube] abc: Downloading webpage"),
            OutputLine::Other
        );
    }

    #[test]
    fn test_resolve_binary_prefers_config() {
        let configured = PathBuf::from("/opt/tools/yt-dlp");
        assert_eq!(resolve_binary(Some(&configured)), configured);
    }

    #[test]
    fn test_find_ytdlp() {
        let result = find_ytdlp();
        println!("yt-dlp found at: {:?}", result);
        // Don't assert - yt-dlp might not be installed in CI
    }
}
