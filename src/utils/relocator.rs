//! Moves finished payloads from the working directory into the library tree

use anyhow::{Context, Result};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct Relocator {
    library_root: PathBuf,
}

/// Outcome of relocating one task's files
#[derive(Debug, Default, PartialEq)]
pub struct RelocationReport {
    /// `(source, destination)` pairs that were moved
    pub moved: Vec<(PathBuf, PathBuf)>,
    /// Sources that no longer existed
    pub skipped: Vec<PathBuf>,
    /// Sources that failed to move, with the reason
    pub failed: Vec<(PathBuf, String)>,
}

impl RelocationReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

impl Relocator {
    pub fn new(library_root: impl Into<PathBuf>) -> Self {
        Self {
            library_root: library_root.into(),
        }
    }

    pub fn library_root(&self) -> &Path {
        &self.library_root
    }

    /// Where `file` lands when its task was downloaded into `dir`
    pub fn destination_for(&self, dir: &Path, file: &Path) -> PathBuf {
        match file.strip_prefix(dir) {
            Ok(relative) if !relative.as_os_str().is_empty() => self.library_root.join(relative),
            _ => match file.file_name() {
                Some(name) => self.library_root.join(name),
                None => self.library_root.join(file),
            },
        }
    }

    /// Move every file of a finished task, keeping its path relative to `dir`.
    ///
    /// A source that no longer exists is skipped, so running this twice is harmless. Any other
    /// I/O failure is recorded for that file and the rest still move.
    pub async fn relocate(&self, dir: &Path, files: &[PathBuf]) -> RelocationReport {
        let mut report = RelocationReport::default();

        for file in files {
            let target = self.destination_for(dir, file);

            match move_file(file, &target).await {
                Ok(true) => {
                    debug!("Moved {:?} -> {:?}", file, target);
                    report.moved.push((file.clone(), target));
                }
                Ok(false) => {
                    debug!("Nothing to move at {:?}", file);
                    report.skipped.push(file.clone());
                }
                Err(e) => {
                    warn!("Failed to move {:?} into the library: {:#}", file, e);
                    report.failed.push((file.clone(), format!("{:#}", e)));
                }
            }
        }

        if !report.moved.is_empty() {
            info!(
                "Moved {} file(s) into {:?}",
                report.moved.len(),
                self.library_root
            );
        }
        report
    }
}

/// Move `source` to `target`, creating parent directories. Returns `Ok(false)` when the source
/// is already gone; every other failure to inspect it is an error.
pub async fn move_file(source: &Path, target: &Path) -> Result<bool> {
    match fs::symlink_metadata(source).await {
        Ok(_) => {}
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(e).with_context(|| format!("Failed to inspect {:?}", source)),
    }

    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create {:?}", parent))?;
    }

    match fs::rename(source, target).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) if e.kind() == ErrorKind::CrossesDevices => {
            debug!("{:?} is on another device, copying", source);
            fs::copy(source, target)
                .await
                .with_context(|| format!("Failed to copy {:?} to {:?}", source, target))?;
            fs::remove_file(source)
                .await
                .with_context(|| format!("Failed to remove {:?} after copying", source))?;
            Ok(true)
        }
        Err(e) => Err(e).with_context(|| format!("Failed to move {:?} to {:?}", source, target)),
    }
}
