/// Canonical request fingerprints.
///
/// A cache key must not depend on field order or on how the caller's map
/// types iterate, so requests are first converted to `serde_json::Value`
/// (whose object maps are backed by `BTreeMap` and therefore serialize
/// with sorted keys) and the digest is taken over that canonical string.
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::error::CacheResult;

/// SHA-256 of the canonical JSON form of `params`, as lowercase hex.
pub fn fingerprint<P: Serialize>(params: &P) -> CacheResult<String> {
    let canonical = serde_json::to_string(&serde_json::to_value(params)?)?;
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    Ok(format!("{:x}", hasher.finalize()))
}

/// Full cache key: `<operation>_<digest>`. Doubles as the on-disk file
/// stem, so operations must stay filename-safe.
pub fn cache_key<P: Serialize>(operation: &str, params: &P) -> CacheResult<String> {
    Ok(format!("{operation}_{}", fingerprint(params)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[derive(Serialize)]
    struct Request {
        disk_path: String,
        verbose: bool,
    }

    #[test]
    fn same_request_same_digest() {
        let a = Request {
            disk_path: "/images/alpha.qcow2".into(),
            verbose: true,
        };
        let b = Request {
            disk_path: "/images/alpha.qcow2".into(),
            verbose: true,
        };
        assert_eq!(fingerprint(&a).unwrap(), fingerprint(&b).unwrap());
    }

    #[test]
    fn different_request_different_digest() {
        let a = Request {
            disk_path: "/images/alpha.qcow2".into(),
            verbose: true,
        };
        let b = Request {
            disk_path: "/images/alpha.qcow2".into(),
            verbose: false,
        };
        assert_ne!(fingerprint(&a).unwrap(), fingerprint(&b).unwrap());
    }

    /// HashMap iteration order varies between instances; the canonical
    /// JSON pass must erase that.
    #[test]
    fn map_insertion_order_does_not_matter() {
        let mut forward = HashMap::new();
        forward.insert("alpha", 1);
        forward.insert("beta", 2);
        forward.insert("gamma", 3);

        let mut reverse = HashMap::new();
        reverse.insert("gamma", 3);
        reverse.insert("beta", 2);
        reverse.insert("alpha", 1);

        assert_eq!(
            fingerprint(&forward).unwrap(),
            fingerprint(&reverse).unwrap()
        );
    }

    #[test]
    fn digest_is_lowercase_hex() {
        let digest = fingerprint(&"payload").unwrap();
        assert_eq!(digest.len(), 64);
        assert!(digest.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(digest, digest.to_lowercase());
    }

    #[test]
    fn key_prefixes_operation() {
        let key = cache_key("list_files", &"x").unwrap();
        assert!(key.starts_with("list_files_"));
        assert_eq!(key.len(), "list_files_".len() + 64);
    }
}
