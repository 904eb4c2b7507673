/// On-disk fingerprint cache for expensive inspection results.
///
/// Every cacheable operation is keyed by `<operation>_<sha256(request)>`
/// and stored as one pretty-printed JSON file under the cache directory,
/// so entries survive across runs and can be inspected with a text
/// editor. A small in-process map fronts the disk so repeat lookups
/// within one run skip the filesystem. Persisting an entry is
/// best-effort: a write failure is logged and the freshly computed value
/// is still returned.
pub mod fingerprint;

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::{CacheConfig, CachePolicy};
use crate::error::{CacheError, CacheResult, EngineResult};

use self::fingerprint::cache_key;

/// Distinguishes concurrent writers racing on the same entry.
static TMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// On-disk envelope around a cached payload. The originating request is
/// kept verbatim so an entry can be audited without reverse-engineering
/// its fingerprint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub operation: String,
    pub request: Value,
    pub payload: Value,
    pub created_at: DateTime<Utc>,
}

/// Request-fingerprinted result cache, disk-backed with a hot in-memory
/// layer.
pub struct FingerprintCache {
    dir: PathBuf,
    hot: RwLock<HashMap<String, CacheEntry>>,
}

impl FingerprintCache {
    /// Open (and create if needed) the cache directory.
    pub fn new(config: CacheConfig) -> CacheResult<Self> {
        fs::create_dir_all(&config.dir)?;
        Ok(Self {
            dir: config.dir,
            hot: RwLock::new(HashMap::new()),
        })
    }

    /// Directory backing this cache.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Return the cached result for `(operation, request)` or run
    /// `compute` and remember its output. `CachePolicy::Refresh` skips
    /// the lookup and overwrites whatever is stored.
    pub fn get_or_compute<P, T, F>(
        &self,
        operation: &str,
        request: &P,
        policy: CachePolicy,
        compute: F,
    ) -> EngineResult<T>
    where
        P: Serialize,
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> EngineResult<T>,
    {
        let key = cache_key(operation, request)?;

        if policy == CachePolicy::Reuse {
            if let Some(payload) = self.lookup(&key) {
                match serde_json::from_value::<T>(payload) {
                    Ok(decoded) => {
                        debug!(operation, key, "cache hit");
                        return Ok(decoded);
                    }
                    Err(err) => {
                        debug!(operation, key, %err, "cached payload does not decode, recomputing");
                    }
                }
            }
        }

        let value = compute()?;
        if let Err(err) = self.store(operation, request, &key, &value) {
            warn!(operation, key, %err, "failed to persist cache entry");
        }
        Ok(value)
    }

    /// Drop the entry for `(operation, request)`, in memory and on disk.
    /// Removing an entry that does not exist is not an error.
    pub fn invalidate<P: Serialize>(&self, operation: &str, request: &P) -> CacheResult<()> {
        let key = cache_key(operation, request)?;
        self.hot.write().remove(&key);
        match fs::remove_file(self.entry_path(&key)) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    /// Drop every entry, in memory and on disk. Only `.json` files are
    /// touched so foreign files in the directory survive.
    pub fn clear(&self) -> CacheResult<()> {
        self.hot.write().clear();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                fs::remove_file(&path)?;
            }
        }
        Ok(())
    }

    fn lookup(&self, key: &str) -> Option<Value> {
        if let Some(entry) = self.hot.read().get(key) {
            return Some(entry.payload.clone());
        }
        match self.read_entry(key) {
            Ok(Some(entry)) => {
                let payload = entry.payload.clone();
                self.hot.write().insert(key.to_string(), entry);
                Some(payload)
            }
            Ok(None) => None,
            Err(err) => {
                debug!(key, %err, "unreadable cache entry treated as a miss");
                None
            }
        }
    }

    fn read_entry(&self, key: &str) -> CacheResult<Option<CacheEntry>> {
        let path = self.entry_path(key);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|_| CacheError::Corrupted { path })
    }

    fn store<P, T>(&self, operation: &str, request: &P, key: &str, value: &T) -> CacheResult<()>
    where
        P: Serialize,
        T: Serialize,
    {
        let entry = CacheEntry {
            operation: operation.to_string(),
            request: serde_json::to_value(request)?,
            payload: serde_json::to_value(value)?,
            created_at: Utc::now(),
        };
        let bytes = serde_json::to_vec_pretty(&entry)?;
        atomic_write(&self.entry_path(key), &bytes)?;
        self.hot.write().insert(key.to_string(), entry);
        Ok(())
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

/// Write-then-rename so a reader never observes a half-written entry.
/// The temp name carries a counter and the pid to stay unique when two
/// writers race on the same key.
fn atomic_write(path: &Path, bytes: &[u8]) -> CacheResult<()> {
    let n = TMP_COUNTER.fetch_add(1, Ordering::Relaxed);
    let tmp = path.with_extension(format!("tmp.{n}.{}", std::process::id()));
    {
        let mut file = File::create(&tmp)?;
        file.write_all(bytes)?;
        file.flush()?;
        file.sync_all()?;
    }
    if let Err(err) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(err.into());
    }
    Ok(())
}
