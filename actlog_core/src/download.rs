//! Local delivery of serialized exports.

use crate::serialize::ExportPayload;
use crate::{Error, Result};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Download collaborator: saves a serialized export locally
pub trait DownloadSink {
    fn deliver(&mut self, payload: &ExportPayload) -> Result<PathBuf>;
}

/// Saves exports into a directory, replacing any previous export of the same format
pub struct DirectoryDownload {
    dir: PathBuf,
}

impl DirectoryDownload {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl DownloadSink for DirectoryDownload {
    /// Atomically writes the payload by:
    /// 1. Writing to a temp file in the target directory
    /// 2. Syncing to disk
    /// 3. Renaming over `activities.<ext>`
    fn deliver(&mut self, payload: &ExportPayload) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(payload.file_name());

        let mut temp = NamedTempFile::new_in(&self.dir)?;
        temp.write_all(&payload.content)?;
        temp.flush()?;
        temp.as_file().sync_all()?;

        temp.persist(&path).map_err(|e| Error::Io(e.error))?;

        tracing::info!("Saved {} export to {:?}", payload.format, path);
        Ok(path)
    }
}
