//! Scoped download handles
//!
//! A finished archive is parked in a temporary file until it is saved once.
//! Saving consumes the handle; replacing or dropping it deletes the file.

use buildora_core::Result;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::debug;

use crate::export::Archive;

/// One pending download backed by a temporary file
#[derive(Debug)]
pub struct DownloadHandle {
    file: NamedTempFile,
    file_name: String,
}

impl DownloadHandle {
    /// Spill `archive` to a temporary file
    pub fn create(archive: &Archive) -> Result<Self> {
        let mut file = NamedTempFile::new()?;
        file.write_all(&archive.bytes)?;
        file.flush()?;
        debug!(name = %archive.file_name, path = %file.path().display(), "Download staged");
        Ok(Self {
            file,
            file_name: archive.file_name.clone(),
        })
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Where the staged bytes currently live
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Move the download into `dir` under its file name; the handle is used up
    pub fn save_to(self, dir: &Path) -> Result<PathBuf> {
        let dest = dir.join(&self.file_name);
        match self.file.persist(&dest) {
            Ok(_) => {}
            // Rename fails across filesystems; copy, then let the temp file drop
            Err(e) => {
                std::fs::copy(e.file.path(), &dest)?;
            }
        }
        debug!(path = %dest.display(), "Download saved");
        Ok(dest)
    }
}

/// Holds at most one pending download
#[derive(Debug, Default)]
pub struct DownloadSlot {
    current: Option<DownloadHandle>,
}

impl DownloadSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage `archive`, releasing whatever was pending before
    pub fn replace(&mut self, archive: &Archive) -> Result<&DownloadHandle> {
        let handle = DownloadHandle::create(archive)?;
        if let Some(previous) = self.current.replace(handle) {
            debug!(name = %previous.file_name, "Released superseded download");
        }
        self.current
            .as_ref()
            .ok_or_else(|| buildora_core::BuildoraError::Other("download slot empty".to_string()))
    }

    pub fn pending(&self) -> Option<&DownloadHandle> {
        self.current.as_ref()
    }

    /// Take the pending download for its single use
    pub fn take(&mut self) -> Option<DownloadHandle> {
        self.current.take()
    }

    /// Drop the pending download, if any
    pub fn clear(&mut self) {
        self.current = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn archive(name: &str) -> Archive {
        Archive {
            file_name: name.to_string(),
            bytes: b"PK-not-really".to_vec(),
        }
    }

    #[test]
    fn test_replace_releases_previous() {
        let mut slot = DownloadSlot::new();
        let first = slot.replace(&archive("a.zip")).unwrap().path().to_path_buf();
        assert!(first.exists());

        let second = slot.replace(&archive("b.zip")).unwrap().path().to_path_buf();
        assert!(!first.exists());
        assert!(second.exists());

        slot.clear();
        assert!(!second.exists());
    }

    #[test]
    fn test_save_consumes_handle() {
        let out = tempfile::tempdir().unwrap();
        let mut slot = DownloadSlot::new();
        let staged = slot.replace(&archive("site.zip")).unwrap().path().to_path_buf();

        let handle = slot.take().unwrap();
        let saved = handle.save_to(out.path()).unwrap();

        assert_eq!(saved, out.path().join("site.zip"));
        assert_eq!(std::fs::read(&saved).unwrap(), b"PK-not-really");
        assert!(!staged.exists());
        assert!(slot.pending().is_none());
    }
}
