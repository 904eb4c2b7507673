/// Inspection backend abstraction.
///
/// Everything the engine knows about a disk image comes through
/// [`InspectionClient`]: listings, file reads, raw blocks, account name
/// tables. The engine itself never mounts or parses an image, so a
/// backend can be libguestfs, a fixture directory, or the in-memory
/// client used by the test suite. Backends report missing disks and
/// missing guest paths as [`EngineError::NotFound`] and their own crashes
/// as [`EngineError::Collaborator`].
///
/// [`EngineError::NotFound`]: crate::error::EngineError::NotFound
/// [`EngineError::Collaborator`]: crate::error::EngineError::Collaborator
pub mod memory;
pub mod request;

use serde::{Deserialize, Serialize};

use crate::analysis::ownership::NameTables;
use crate::error::EngineResult;
use crate::model::FileRecord;

use self::request::ConvertFormatRequest;

/// Bytes read from a guest file, already decoded when the read was
/// requested as text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilePayload {
    Text(String),
    Binary(Vec<u8>),
}

impl FilePayload {
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            FilePayload::Text(s) => s.as_bytes(),
            FilePayload::Binary(b) => b,
        }
    }

    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.as_bytes().is_empty()
    }
}

/// Outcome of an existence probe on a known disk. A missing path is a
/// plain `exists: false`, not an error — only a missing disk errors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileExistence {
    pub exists: bool,
    pub record: Option<FileRecord>,
}

/// Truncation controls for a guest file read. `max_bytes` caps the read
/// first; `stop_delimiter` then cuts just before its first occurrence.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReadOptions {
    pub binary: bool,
    pub max_bytes: Option<u64>,
    pub stop_delimiter: Option<String>,
}

/// One inspection backend over disk images.
pub trait InspectionClient: Send + Sync {
    /// Every file and directory on the image, with metadata when
    /// `verbose` is set.
    fn list_files(&self, disk_path: &str, verbose: bool) -> EngineResult<Vec<FileRecord>>;

    /// Bare guest paths, optionally scoped to one directory.
    fn list_filenames(&self, disk_path: &str, directory: Option<&str>)
        -> EngineResult<Vec<String>>;

    /// Read one guest file. Relative guest paths are coerced absolute.
    fn read_file_contents(
        &self,
        disk_path: &str,
        path: &str,
        options: &ReadOptions,
    ) -> EngineResult<FilePayload>;

    /// Raw bytes of block `index` at the given granularity. Short at the
    /// end of the image, empty past it.
    fn read_block(&self, disk_path: &str, index: u64, block_size: u64) -> EngineResult<Vec<u8>>;

    /// uid/gid name tables from the guest's account databases.
    fn ownership_names(&self, disk_path: &str) -> EngineResult<NameTables>;

    /// Existence probe for one guest path.
    fn file_exists(&self, disk_path: &str, path: &str) -> EngineResult<FileExistence>;

    /// Convert a disk image between on-disk formats.
    fn convert_format(&self, request: &ConvertFormatRequest) -> EngineResult<()>;

    /// Identifier of the backend and its version, for logs and cache
    /// audits.
    fn backend_version(&self) -> String;
}
