//! Document store: the file collaborator the rename passes run against.
//!
//! DESIGN
//! ======
//! `DocumentStore` is the seam between rename logic and the file system.
//! Paths are vault-relative strings with `/` separators, the same form the
//! canvas stores in node `file` fields. `FsStore` maps them onto a root
//! directory with `tokio::fs`; tests use the in-memory store in
//! `test_helpers`.
//!
//! ERROR HANDLING
//! ==============
//! A vanished source surfaces as `NotFound` so callers can apply the
//! retry-once policy. `rename` refuses to overwrite an existing destination
//! and reports `Conflict` instead; a platform rename would silently clobber
//! another image.

use std::io;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use serde::Serialize;

use crate::config::CANVAS_EXTENSION;
use crate::error::ErrorCode;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("file not found: {0}")]
    NotFound(String),
    #[error("destination already exists: {0}")]
    Conflict(String),
    #[error("invalid vault path: {0}")]
    InvalidPath(String),
    #[error("io error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },
}

impl ErrorCode for StoreError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "E_NOT_FOUND",
            Self::Conflict(_) => "E_CONFLICT",
            Self::InvalidPath(_) => "E_INVALID_PATH",
            Self::Io { .. } => "E_IO",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::NotFound(_) | Self::Io { .. })
    }
}

impl StoreError {
    fn from_io(path: &str, source: io::Error) -> Self {
        if source.kind() == io::ErrorKind::NotFound {
            Self::NotFound(path.to_owned())
        } else {
            Self::Io { path: path.to_owned(), source }
        }
    }
}

/// A file that resolved at the time of lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileHandle {
    pub path: String,
    /// Lowercased extension, empty when the name has none.
    pub extension: String,
}

impl FileHandle {
    #[must_use]
    pub fn new(path: impl Into<String>) -> Self {
        let path = path.into();
        let extension = path
            .rsplit('/')
            .next()
            .and_then(|name| name.rsplit_once('.'))
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .unwrap_or_default();
        Self { path, extension }
    }
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Read a whole document as text.
    async fn read(&self, path: &str) -> Result<String, StoreError>;

    /// Replace a document's content.
    async fn write(&self, path: &str, text: &str) -> Result<(), StoreError>;

    /// Look up a file; `None` if nothing is at `path`.
    async fn resolve(&self, path: &str) -> Result<Option<FileHandle>, StoreError>;

    /// Move `file` to `new_path`.
    async fn rename(&self, file: &FileHandle, new_path: &str) -> Result<(), StoreError>;

    /// Every file in the store, sorted by path.
    async fn list_files(&self) -> Result<Vec<FileHandle>, StoreError>;
}

/// Vault paths of every canvas document, sorted.
///
/// # Errors
///
/// Returns a `StoreError` if the store cannot be listed.
pub async fn canvas_documents(store: &dyn DocumentStore) -> Result<Vec<String>, StoreError> {
    let extension = CANVAS_EXTENSION.trim_start_matches('.');
    let files = store.list_files().await?;
    Ok(files
        .into_iter()
        .filter(|f| f.extension == extension)
        .map(|f| f.path)
        .collect())
}

// =============================================================================
// FILESYSTEM STORE
// =============================================================================

/// Store rooted at a vault directory.
pub struct FsStore {
    root: PathBuf,
}

impl FsStore {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a vault path onto the root, refusing anything that could escape it.
    fn locate(&self, path: &str) -> Result<PathBuf, StoreError> {
        let relative = Path::new(path);
        let escapes = path.is_empty()
            || relative
                .components()
                .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if escapes {
            return Err(StoreError::InvalidPath(path.to_owned()));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl DocumentStore for FsStore {
    async fn read(&self, path: &str) -> Result<String, StoreError> {
        let full = self.locate(path)?;
        tokio::fs::read_to_string(&full)
            .await
            .map_err(|e| StoreError::from_io(path, e))
    }

    async fn write(&self, path: &str, text: &str) -> Result<(), StoreError> {
        let full = self.locate(path)?;
        tokio::fs::write(&full, text)
            .await
            .map_err(|e| StoreError::from_io(path, e))
    }

    async fn resolve(&self, path: &str) -> Result<Option<FileHandle>, StoreError> {
        let full = self.locate(path)?;
        match tokio::fs::metadata(&full).await {
            Ok(meta) if meta.is_file() => Ok(Some(FileHandle::new(path))),
            Ok(_) => Ok(None),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::from_io(path, e)),
        }
    }

    async fn rename(&self, file: &FileHandle, new_path: &str) -> Result<(), StoreError> {
        let from = self.locate(&file.path)?;
        let to = self.locate(new_path)?;
        let exists = tokio::fs::try_exists(&to)
            .await
            .map_err(|e| StoreError::from_io(new_path, e))?;
        if exists {
            return Err(StoreError::Conflict(new_path.to_owned()));
        }
        tokio::fs::rename(&from, &to)
            .await
            .map_err(|e| StoreError::from_io(&file.path, e))
    }

    async fn list_files(&self) -> Result<Vec<FileHandle>, StoreError> {
        let mut files = Vec::new();
        let mut pending: Vec<(PathBuf, String)> = vec![(self.root.clone(), String::new())];

        while let Some((dir, prefix)) = pending.pop() {
            let mut entries = tokio::fs::read_dir(&dir)
                .await
                .map_err(|e| StoreError::from_io(&prefix, e))?;
            while let Some(entry) = entries
                .next_entry()
                .await
                .map_err(|e| StoreError::from_io(&prefix, e))?
            {
                let name = entry.file_name().to_string_lossy().into_owned();
                // Hidden entries hold editor state (`.obsidian`, `.trash`).
                if name.starts_with('.') {
                    continue;
                }
                let path = format!("{prefix}{name}");
                let kind = entry
                    .file_type()
                    .await
                    .map_err(|e| StoreError::from_io(&path, e))?;
                if kind.is_dir() {
                    pending.push((entry.path(), format!("{path}/")));
                } else if kind.is_file() {
                    files.push(FileHandle::new(path));
                }
            }
        }

        files.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(files)
    }
}

// =============================================================================
// TEST HELPERS
// =============================================================================


#[cfg(test)]
#[path = "store_test.rs"]
mod tests;
