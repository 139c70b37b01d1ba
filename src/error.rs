//! Domain error handling
//!
//! Error type shared by the cache, the settings loader and the frame pipeline,
//! plus helpers that attach path context to foreign errors.

use std::fs;
use std::io::Write;
use std::path::Path;

/// Result type for domain operations
pub type DomainResult<T> = Result<T, DomainError>;

/// Errors surfaced by the domain manager
#[derive(Debug, thiserror::Error)]
pub enum DomainError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Compression error: {0}")]
    Compression(String),

    #[error("Corrupted data: {0}")]
    CorruptedData(String),

    #[error("Version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: String, found: String },

    #[error("Cache layout mismatch for {channel}: {reason}")]
    CacheMismatch { channel: String, reason: String },

    #[error("Grid allocation failed: {cells} cells")]
    AllocationFailed { cells: usize },

    #[error("Invalid settings: {0}")]
    InvalidSettings(String),

    #[error("Solver error: {0}")]
    Solver(String),
}

impl From<bincode::Error> for DomainError {
    fn from(error: bincode::Error) -> Self {
        DomainError::Serialization(error.to_string())
    }
}

impl From<toml::de::Error> for DomainError {
    fn from(error: toml::de::Error) -> Self {
        DomainError::InvalidSettings(error.to_string())
    }
}

impl From<serde_json::Error> for DomainError {
    fn from(error: serde_json::Error) -> Self {
        DomainError::Serialization(error.to_string())
    }
}

/// Helper trait for attaching context to foreign errors
pub trait DomainErrorContext<T> {
    fn domain_context(self, context: &str) -> DomainResult<T>;
}

impl<T, E> DomainErrorContext<T> for Result<T, E>
where
    E: std::error::Error + 'static,
{
    fn domain_context(self, context: &str) -> DomainResult<T> {
        self.map_err(|e| {
            DomainError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                format!("{}: {}", context, e),
            ))
        })
    }
}

/// Create a save error
pub fn save_error(path: impl AsRef<Path>, error: impl std::fmt::Display) -> DomainError {
    DomainError::Io(std::io::Error::new(
        std::io::ErrorKind::Other,
        format!("Save failed for {}: {}", path.as_ref().display(), error),
    ))
}

/// Create a load error
pub fn load_error(path: impl AsRef<Path>, error: impl std::fmt::Display) -> DomainError {
    DomainError::Io(std::io::Error::new(
        std::io::ErrorKind::Other,
        format!("Load failed for {}: {}", path.as_ref().display(), error),
    ))
}

/// Create a corrupted data error
pub fn corrupted_data(reason: impl Into<String>) -> DomainError {
    DomainError::CorruptedData(reason.into())
}

/// Write a file by writing a sibling temp file and renaming it over the target
pub fn atomic_write(path: &Path, data: &[u8]) -> DomainResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = Path::new(&tmp);

    {
        let mut file = fs::File::create(tmp).map_err(|e| save_error(tmp, e))?;
        file.write_all(data).map_err(|e| save_error(tmp, e))?;
        file.sync_all().map_err(|e| save_error(tmp, e))?;
    }

    fs::rename(tmp, path).map_err(|e| save_error(path, e))?;
    Ok(())
}
