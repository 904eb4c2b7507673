/// Error types for the comparison engine.
///
/// Four failure classes cross the public API: bad request parameters,
/// missing disks/files, inspection-backend failures, and cache trouble.
/// Cache errors are non-fatal on the read/write path — the cache logs and
/// falls back to a fresh computation — so they only surface to callers
/// from construction ([`crate::cache::FingerprintCache::new`]).
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    /// Missing or invalid request parameter. Reported before any work
    /// starts; nothing is partially computed.
    #[error("invalid input: {0}")]
    Input(String),

    /// A referenced disk or file does not exist. Two-sided comparisons
    /// catch this per side and substitute a sentinel instead of aborting.
    #[error("not found: {0}")]
    NotFound(String),

    /// The inspection backend failed (unreadable image, mount failure).
    /// Surfaced with the backend's message; the operation is aborted.
    #[error("inspection backend error: {0}")]
    Collaborator(String),

    /// Cache failure that could not be absorbed (e.g. the cache directory
    /// cannot be created).
    #[error("cache error: {0}")]
    Cache(#[from] CacheError),

    /// Raw block-source I/O failure (open/seek/read on an image file).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Cache-specific errors.
#[derive(Debug, Error)]
pub enum CacheError {
    /// The entry file exists but does not deserialize. Treated as a miss
    /// by readers.
    #[error("cache entry corrupted: {path}")]
    Corrupted { path: PathBuf },

    #[error("cache I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("cache JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type EngineResult<T> = Result<T, EngineError>;
pub type CacheResult<T> = Result<T, CacheError>;
