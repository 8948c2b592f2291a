use crate::batch::schema::EditBatch;
use std::fmt;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

/// Failure to read or parse a batch document.
///
/// Semantic checks (empty batch, missing `file`) are not done here; they are
/// part of applying the batch and surface in its `ApplyResult`.
#[derive(Debug)]
pub enum LoadError {
    Io {
        path: Option<PathBuf>,
        source: std::io::Error,
    },
    Json {
        path: Option<PathBuf>,
        source: serde_json::Error,
    },
}

impl LoadError {
    fn with_path(self, path: &Path) -> Self {
        let path = Some(path.to_path_buf());
        match self {
            LoadError::Io { path: None, source } => LoadError::Io { path, source },
            LoadError::Json { path: None, source } => LoadError::Json { path, source },
            other => other,
        }
    }
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadError::Io { path, source } => match path {
                Some(path) => write!(f, "failed to read edit batch from {}: {}", path.display(), source),
                None => write!(f, "failed to read edit batch: {}", source),
            },
            LoadError::Json { path, source } => match path {
                Some(path) => write!(f, "failed to parse edit batch JSON ({}): {}", path.display(), source),
                None => write!(f, "failed to parse edit batch JSON: {}", source),
            },
        }
    }
}

impl std::error::Error for LoadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LoadError::Io { source, .. } => Some(source),
            LoadError::Json { source, .. } => Some(source),
        }
    }
}

pub fn load_from_str(input: &str) -> Result<EditBatch, LoadError> {
    serde_json::from_str(input).map_err(|source| LoadError::Json { path: None, source })
}

pub fn load_from_reader(mut reader: impl Read) -> Result<EditBatch, LoadError> {
    let mut contents = String::new();
    reader
        .read_to_string(&mut contents)
        .map_err(|source| LoadError::Io { path: None, source })?;
    load_from_str(&contents)
}

pub fn load_from_path(path: impl AsRef<Path>) -> Result<EditBatch, LoadError> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: Some(path.to_path_buf()),
        source,
    })?;
    load_from_str(&contents).map_err(|error| error.with_path(path))
}
