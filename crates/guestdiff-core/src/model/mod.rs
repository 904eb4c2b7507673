/// Data model for inspected disk images.
///
/// Re-exports the file record snapshot types and display helpers.
pub mod file_record;
pub mod size;

pub use file_record::{FileKind, FileRecord, FileSet};
pub use size::{display_bytes, format_count, format_size};
