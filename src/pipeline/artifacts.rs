//! Working directory for intermediate and output files.
//!
//! Files are named `modified_<request id>_<template base name>`, and the
//! converter writes `<same stem>.pdf` next to it. Both are held through
//! `TempPath` guards so they are removed on every exit path.

use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempPath;
use uuid::Uuid;

use super::converter::TARGET_FORMAT;

pub const INTERMEDIATE_PREFIX: &str = "modified_";

#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the working directory if it does not exist yet.
    pub async fn ensure_dir(&self) -> io::Result<()> {
        tokio::fs::create_dir_all(&self.root).await
    }

    /// Path of the filled document for one request.
    pub fn intermediate_path(&self, template: &Path, request_id: &Uuid) -> PathBuf {
        let base = template
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "template.docx".to_string());
        self.root
            .join(format!("{INTERMEDIATE_PREFIX}{request_id}_{base}"))
    }

    /// Where the converter is expected to leave its output for `intermediate`.
    pub fn expected_output_path(&self, intermediate: &Path) -> PathBuf {
        intermediate.with_extension(TARGET_FORMAT)
    }

    /// Delete regular files older than `max_age`. Returns how many were removed.
    pub async fn sweep(&self, max_age: Duration) -> io::Result<usize> {
        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e),
        };

        let mut removed = 0;
        while let Some(entry) = entries.next_entry().await? {
            let metadata = match entry.metadata().await {
                Ok(m) if m.is_file() => m,
                _ => continue,
            };
            let age = match metadata.modified().map(|t| t.elapsed()) {
                Ok(Ok(age)) => age,
                _ => continue,
            };
            if age < max_age {
                continue;
            }
            match tokio::fs::remove_file(entry.path()).await {
                Ok(()) => {
                    log::info!("Swept orphaned artifact {}", entry.path().display());
                    removed += 1;
                }
                Err(e) => log::warn!(
                    "Failed to sweep orphaned artifact {}: {}",
                    entry.path().display(),
                    e
                ),
            }
        }
        Ok(removed)
    }
}

/// Periodically remove files left behind by crashed or killed conversions.
pub async fn start_sweep_worker(store: ArtifactStore, every: Duration, max_age: Duration) {
    if every.is_zero() {
        log::error!(
            "Artifact sweeper for {} not started: interval must be greater than 0",
            store.root().display()
        );
        return;
    }

    log::info!(
        "Artifact sweeper started for {} (every {}s, max age {}s)",
        store.root().display(),
        every.as_secs(),
        max_age.as_secs()
    );

    let mut ticker = tokio::time::interval(every);
    // The first tick completes immediately; skip it so startup stays quiet.
    ticker.tick().await;
    loop {
        ticker.tick().await;
        match store.sweep(max_age).await {
            Ok(0) => log::debug!("Artifact sweep found nothing to remove"),
            Ok(n) => log::info!("Artifact sweep removed {} file(s)", n),
            Err(e) => log::error!("Artifact sweep failed: {}", e),
        }
    }
}

/// A converted document owned by the caller. The file is removed when this is dropped.
#[derive(Debug)]
pub struct OutputArtifact {
    path: TempPath,
    download_name: String,
}

impl OutputArtifact {
    pub(crate) fn new(path: PathBuf, download_name: String) -> Self {
        Self {
            path: TempPath::from_path(path),
            download_name,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Suggested file name for the client, e.g. `invoice.pdf`.
    pub fn download_name(&self) -> &str {
        &self.download_name
    }

    /// Read the document and delete it from the working directory.
    pub async fn into_bytes(self) -> io::Result<Vec<u8>> {
        let bytes = tokio::fs::read(&*self.path).await?;
        if let Err(e) = self.path.close() {
            log::warn!("Failed to remove output artifact: {}", e);
        }
        Ok(bytes)
    }
}
