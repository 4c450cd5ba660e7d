//! # soundboar-repository
//!
//! The sound library: audio files under one root directory, addressed by
//! their path relative to that root.

use std::collections::BTreeSet;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use serde::Serialize;
use soundboar_core::media::suffix_of;
use soundboar_core::{Error, Result};
use tokio::io::{AsyncRead, AsyncWriteExt};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// A file in the repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileEntry {
    /// Path relative to the root, `/` separated.
    pub id: String,
    /// File stem, for display.
    pub name: String,
    pub location: PathBuf,
}

/// Audio files under a root directory.
#[derive(Debug, Clone)]
pub struct Repository {
    root: PathBuf,
    supported: BTreeSet<String>,
}

impl Repository {
    /// Open the repository at `root`, which must be an existing directory.
    pub fn new(root: impl Into<PathBuf>, supported: BTreeSet<String>) -> Result<Self> {
        let root = root.into();
        if !root.is_dir() {
            return Err(Error::InvalidArgument(format!(
                "Path is no valid directory: {}",
                root.display()
            )));
        }
        info!("Repository at {}", root.display());
        Ok(Self { root, supported })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub const fn supported(&self) -> &BTreeSet<String> {
        &self.supported
    }

    /// Location of `id`. The file need not exist.
    ///
    /// Identifiers are plain relative paths; anything that could leave the
    /// root is rejected.
    pub fn file(&self, id: &str) -> Result<PathBuf> {
        let relative = Path::new(id);
        let plain = !id.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !plain {
            return Err(Error::InvalidArgument(format!("Invalid file identifier: {id}")));
        }
        Ok(self.root.join(relative))
    }

    pub fn file_info(&self, id: &str) -> Result<FileEntry> {
        let location = self.file(id)?;
        let name = location
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(FileEntry {
            id: id.to_string(),
            name,
            location,
        })
    }

    /// Every supported file, sorted by identifier.
    pub fn all(&self) -> Result<Vec<FileEntry>> {
        let mut entries = Vec::new();

        for entry in WalkDir::new(&self.root).follow_links(true) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Skipping unreadable entry: {e}");
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }

            let supported = entry
                .file_name()
                .to_str()
                .and_then(suffix_of)
                .is_some_and(|s| self.supported.contains(&s));
            if !supported {
                continue;
            }

            let Ok(relative) = entry.path().strip_prefix(&self.root) else {
                continue;
            };
            let id = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            entries.push(self.file_info(&id)?);
        }

        entries.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(entries)
    }

    /// Index of `id` in [`all`](Self::all).
    pub fn file_position(&self, id: &str) -> Result<usize> {
        self.all()?
            .iter()
            .position(|e| e.id == id)
            .ok_or_else(|| Error::NotFound(format!("File {id} does not exist")))
    }

    /// Store `data` as a new file. Never overwrites.
    pub async fn write(&self, data: impl AsRef<[u8]>, id: &str) -> Result<FileEntry> {
        self.write_from(data.as_ref(), id).await
    }

    /// Store everything `reader` yields as a new file. Never overwrites; a
    /// failed write leaves no file behind.
    pub async fn write_from(&self, mut reader: impl AsyncRead + Unpin, id: &str) -> Result<FileEntry> {
        let location = self.file(id)?;
        let mut file = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&location)
            .await
            .map_err(|e| match e.kind() {
                ErrorKind::AlreadyExists => Error::AlreadyExists(format!("File {id} already exists")),
                _ => Error::Io(e),
            })?;

        let written = async {
            let count = tokio::io::copy(&mut reader, &mut file).await?;
            file.flush().await?;
            Ok::<_, std::io::Error>(count)
        }
        .await;

        match written {
            Ok(count) => {
                debug!("Wrote {count} bytes to {}", location.display());
                self.file_info(id)
            }
            Err(e) => {
                drop(file);
                if let Err(cleanup) = tokio::fs::remove_file(&location).await {
                    warn!("Could not remove partial {}: {cleanup}", location.display());
                }
                Err(e.into())
            }
        }
    }

    /// Remove `id` if it is a file. Returns whether something was deleted.
    pub async fn delete(&self, id: &str) -> Result<bool> {
        let location = self.file(id)?;
        if !tokio::fs::metadata(&location).await.is_ok_and(|m| m.is_file()) {
            return Ok(false);
        }
        match tokio::fs::remove_file(&location).await {
            Ok(()) => {
                info!("Deleted {id}");
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}
