/// Explicit configuration passed in at construction time.
///
/// There is deliberately no process-wide state here: every cache instance
/// gets its own directory, and cache freshness is decided per call by the
/// caller, not by a hidden per-operation default.
use std::path::PathBuf;

/// Where the fingerprint cache keeps its entry files.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Directory holding one JSON file per cached entry. Created on first
    /// use if missing.
    pub dir: PathBuf,
}

impl CacheConfig {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

/// Freshness policy for a single cached operation.
///
/// `Reuse` serves a stored payload when one exists — repeated reads of the
/// same comparison must not repeat expensive inspection calls. `Refresh`
/// always recomputes and overwrites the stored entry. Every entry point in
/// [`crate::compare`] takes the policy explicitly and documents which one
/// it recommends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CachePolicy {
    /// Serve a stored payload without recomputation if present.
    #[default]
    Reuse,
    /// Always invoke the compute function and overwrite the stored entry.
    Refresh,
}
