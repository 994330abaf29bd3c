//! Durable file storage with atomic replace.
//!
//! Every persisted record (environment manifests, session state) is written
//! through [`write_atomic`]: the full document is staged into a sibling temp
//! file, flushed, then renamed over the target. Readers therefore observe
//! either the previous complete document or the new complete document.
//!
//! The [`Storage`] trait deliberately exposes no removal operation. Nothing
//! written by envkit is ever taken away again.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Minimal file operations needed by the manifest and session stores.
pub trait Storage {
    /// Read a whole file. `Ok(None)` when the file does not exist.
    fn read(&self, path: &Path) -> io::Result<Option<String>>;

    /// Write `contents` to the temp sibling of `path` and flush it to disk.
    /// Returns the staged path.
    fn stage(&self, path: &Path, contents: &str) -> io::Result<PathBuf>;

    /// Move a staged file over `path`.
    fn commit(&self, staged: &Path, path: &Path) -> io::Result<()>;

    /// Create a directory and its parents if missing.
    fn ensure_dir(&self, path: &Path) -> io::Result<()>;
}

/// Temp sibling used while staging `path`: `<dir>/.<file>.tmp`
pub fn staged_path(path: &Path) -> PathBuf {
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("record");
    let parent = path
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    parent.join(format!(".{}.tmp", file_name))
}

/// Stage then commit. A crash between the two steps leaves `path` untouched.
pub fn write_atomic<S: Storage + ?Sized>(
    storage: &S,
    path: &Path,
    contents: &str,
) -> io::Result<()> {
    if let Some(parent) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        storage.ensure_dir(parent)?;
    }
    let staged = storage.stage(path, contents)?;
    storage.commit(&staged, path)
}

/// Production storage backed by the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct DiskStorage;

impl Storage for DiskStorage {
    fn read(&self, path: &Path) -> io::Result<Option<String>> {
        match fs::read_to_string(path) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn stage(&self, path: &Path, contents: &str) -> io::Result<PathBuf> {
        let staged = staged_path(path);
        let mut file = fs::File::create(&staged)?;
        file.write_all(contents.as_bytes())?;
        file.sync_all()?;
        Ok(staged)
    }

    fn commit(&self, staged: &Path, path: &Path) -> io::Result<()> {
        fs::rename(staged, path)
    }

    fn ensure_dir(&self, path: &Path) -> io::Result<()> {
        fs::create_dir_all(path)
    }
}
