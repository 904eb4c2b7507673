/// Comparison core for VM disk images: what changed between two guest
/// filesystems, where two raw images diverge block by block, and who owns
/// the bytes on a disk.
///
/// Everything here works on data an inspection backend has already
/// extracted. The backend is abstracted behind
/// [`inspect::InspectionClient`]; callers hand each operation a typed
/// request from [`inspect::request`], and expensive results are
/// fingerprint-cached so repeating a request is free. No UI lives in this
/// crate, so any frontend can sit on top of [`compare::Comparator`].
///
/// # Modules
///
/// - [`model`] — File records, file sets, and display helpers.
/// - [`analysis`] — The comparison engines (path sets, contents, blocks, ownership).
/// - [`cache`] — Fingerprint-keyed result cache with atomic on-disk persistence.
/// - [`inspect`] — The guest-inspection backend trait, typed requests, and an in-memory client.
/// - [`compare`] — Per-operation entry points wiring cache → client → engine.
/// - [`jobs`] — Background execution of long comparisons with progress reporting.
/// - [`export`] — Writers for listings and ownership summaries (table, CSV, numbered JSON, text report).
pub mod analysis;
pub mod cache;
pub mod compare;
pub mod config;
pub mod error;
pub mod export;
pub mod inspect;
pub mod jobs;
pub mod model;
