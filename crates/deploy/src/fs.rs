//! File system utils.

use std::{
    fs::{File, OpenOptions},
    io::Write,
    path::Path,
};

use anyhow::Context;
use fs2::FileExt;

pub struct FsHandler;

impl FsHandler {
    /// Create a directory (and its parents) if it doesn't exist yet.
    pub fn create_dir(path: &Path) -> anyhow::Result<()> {
        std::fs::create_dir_all(path)
            .with_context(|| format!("Failed to create directory {}", path.display()))?;
        tracing::debug!("Ensured directory exists: {}", path.display());
        Ok(())
    }

    /// Write `contents` to `path` so that readers observe either the old or the new file.
    ///
    /// The data is written to a sibling temporary file, flushed to disk, then renamed over
    /// the destination.
    pub fn write_atomic(path: &Path, contents: &[u8]) -> anyhow::Result<()> {
        let file_name = path
            .file_name()
            .context("Destination path must name a file")?
            .to_string_lossy();
        let tmp_path = path.with_file_name(format!(".{file_name}.tmp"));

        let mut tmp = File::create(&tmp_path)
            .with_context(|| format!("Failed to create {}", tmp_path.display()))?;
        tmp.write_all(contents)
            .with_context(|| format!("Failed to write {}", tmp_path.display()))?;
        tmp.sync_all()
            .with_context(|| format!("Failed to sync {}", tmp_path.display()))?;
        drop(tmp);

        std::fs::rename(&tmp_path, path).with_context(|| {
            format!(
                "Failed to move {} to {}",
                tmp_path.display(),
                path.display()
            )
        })?;

        Ok(())
    }

    /// Try to take an exclusive advisory lock on `path`, creating the file if needed.
    ///
    /// Returns `Ok(None)` when another process already holds the lock. The lock is released
    /// when the returned file is dropped.
    pub fn try_lock(path: &Path) -> anyhow::Result<Option<File>> {
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(path)
            .with_context(|| format!("Failed to open lock file {}", path.display()))?;

        match file.try_lock_exclusive() {
            Ok(()) => Ok(Some(file)),
            Err(e) if e.kind() == fs2::lock_contended_error().kind() => Ok(None),
            Err(e) => {
                Err(e).with_context(|| format!("Failed to lock {}", path.display()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempdir::TempDir;

    #[test]
    fn test_write_atomic_replaces_content() {
        let temp_dir = TempDir::new("shipyard-fs").expect("Failed to create temp dir");
        let path = temp_dir.path().join("record.json");

        FsHandler::write_atomic(&path, b"first").expect("first write");
        FsHandler::write_atomic(&path, b"second").expect("second write");

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "second");
        assert!(
            !temp_dir.path().join(".record.json.tmp").exists(),
            "Temporary file should be renamed away"
        );
    }

    #[test]
    fn test_lock_is_exclusive() {
        let temp_dir = TempDir::new("shipyard-fs").expect("Failed to create temp dir");
        let path = temp_dir.path().join(".lock");

        let held = FsHandler::try_lock(&path).expect("lock").expect("first lock");
        assert!(FsHandler::try_lock(&path).expect("lock").is_none());

        drop(held);
        assert!(FsHandler::try_lock(&path).expect("lock").is_some());
    }
}
