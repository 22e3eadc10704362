//! Workspace store: candidate files under a single root directory.
//!
//! Layout is whatever the caller writes; the store only guarantees that
//! every path stays under the root, writes are atomic, and backups live next
//! to their source as `<path>.backup`.

use std::ffi::OsString;
use std::fs;
use std::io::Write;
use std::path::{Component, Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::debug;
use walkdir::WalkDir;

use crate::error::{HarnessError, Result};

/// Suffix appended to a file name to form its backup name.
pub const BACKUP_SUFFIX: &str = ".backup";

/// Filesystem-backed store rooted at one directory.
#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    /// Open a workspace at `root`, creating the directory and its parents if needed.
    ///
    /// The stored root is canonical: absolute, with no `.` or `..` components
    /// and symlinks resolved.
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        let given = root.as_ref();
        fs::create_dir_all(given).map_err(|e| HarnessError::Io {
            path: given.to_path_buf(),
            source: e,
        })?;
        let root = fs::canonicalize(given).map_err(|e| HarnessError::from_io(given, e))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the root directory if it is missing. Idempotent.
    pub fn ensure_root(&self) -> Result<()> {
        fs::create_dir_all(&self.root).map_err(|e| HarnessError::Io {
            path: self.root.clone(),
            source: e,
        })
    }

    /// Map a workspace-relative (or in-root absolute) path to an absolute path.
    pub fn resolve(&self, path: impl AsRef<Path>) -> Result<PathBuf> {
        let path = path.as_ref();
        if path.is_absolute() {
            if path.starts_with(&self.root) && !has_parent_component(path) {
                return Ok(path.to_path_buf());
            }
            return Err(HarnessError::InvalidPath {
                path: path.to_path_buf(),
            });
        }
        if has_parent_component(path) {
            return Err(HarnessError::InvalidPath {
                path: path.to_path_buf(),
            });
        }
        Ok(self.root.join(path))
    }

    /// Read a UTF-8 text file.
    pub fn read(&self, path: impl AsRef<Path>) -> Result<String> {
        let full = self.resolve(path)?;
        fs::read_to_string(&full).map_err(|e| HarnessError::from_io(&full, e))
    }

    /// Write `text` to `path`, creating parent directories.
    ///
    /// The content lands in a temp file in the same directory and is renamed
    /// into place, so readers never observe a truncated file.
    pub fn write(&self, path: impl AsRef<Path>, text: &str) -> Result<PathBuf> {
        let full = self.resolve(path)?;
        write_atomic(&full, text.as_bytes())?;
        debug!(path = %full.display(), bytes = text.len(), "wrote file");
        Ok(full)
    }

    /// Copy the current content of `path` to `<path>.backup`, replacing any older backup.
    pub fn backup(&self, path: impl AsRef<Path>) -> Result<PathBuf> {
        let full = self.resolve(path)?;
        if !full.is_file() {
            return Err(HarnessError::NotFound { path: full });
        }
        let backup = backup_path(&full);
        fs::copy(&full, &backup).map_err(|e| HarnessError::from_io(&full, e))?;
        debug!(path = %full.display(), backup = %backup.display(), "backed up file");
        Ok(backup)
    }

    /// Put the last backup of `path` back in place.
    pub fn restore(&self, path: impl AsRef<Path>) -> Result<PathBuf> {
        let full = self.resolve(path)?;
        let backup = backup_path(&full);
        let bytes = fs::read(&backup).map_err(|e| HarnessError::from_io(&backup, e))?;
        write_atomic(&full, &bytes)?;
        Ok(full)
    }

    /// Recursively list files under `dir`, optionally keeping only the given extensions.
    ///
    /// Extensions match on the file-name suffix, with or without a leading dot.
    /// A missing directory yields nothing. Entries come out sorted by file name.
    pub fn list(
        &self,
        dir: impl AsRef<Path>,
        extensions: Option<&[&str]>,
    ) -> Result<impl Iterator<Item = PathBuf>> {
        let start = self.resolve(dir)?;
        let suffixes: Option<Vec<String>> = extensions.map(|exts| {
            exts.iter()
                .map(|e| format!(".{}", e.trim_start_matches('.')))
                .collect()
        });

        let iter = WalkDir::new(start)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .filter(move |entry| match &suffixes {
                None => true,
                Some(suffixes) => {
                    let name = entry.file_name().to_string_lossy();
                    suffixes.iter().any(|s| name.ends_with(s.as_str()))
                }
            })
            .map(|entry| entry.into_path());
        Ok(iter)
    }
}

/// `<path>.backup` for a given file path.
pub fn backup_path(path: &Path) -> PathBuf {
    let mut name: OsString = path.as_os_str().to_owned();
    name.push(BACKUP_SUFFIX);
    PathBuf::from(name)
}

fn has_parent_component(path: &Path) -> bool {
    path.components().any(|c| matches!(c, Component::ParentDir))
}

fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    let parent = path
        .parent()
        .ok_or_else(|| HarnessError::InvalidPath {
            path: path.to_path_buf(),
        })?;
    fs::create_dir_all(parent).map_err(|e| HarnessError::from_io(parent, e))?;

    let mut tmp = NamedTempFile::new_in(parent).map_err(|e| HarnessError::from_io(parent, e))?;
    tmp.write_all(data)
        .map_err(|e| HarnessError::from_io(tmp.path(), e))?;
    tmp.persist(path)
        .map_err(|e| HarnessError::from_io(path, e.error))?;
    Ok(())
}
