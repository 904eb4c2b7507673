/// Request types for every engine operation.
///
/// These structs are the unit of cache identity: a request is serialized
/// to canonical JSON and fingerprinted, so adding a field changes the key
/// and old entries simply stop matching. Optional fields carry
/// `#[serde(default)]` so requests written by older versions still
/// deserialize.
use serde::{Deserialize, Serialize};

use crate::analysis::block_diff::{BlockFormat, BlockRange, DEFAULT_BLOCK_SIZE, LAST_BLOCK};
use crate::error::{EngineError, EngineResult};

use super::ReadOptions;

fn require_non_empty(field: &str, value: &str) -> EngineResult<()> {
    if value.is_empty() {
        return Err(EngineError::Input(format!("{field} must not be empty")));
    }
    Ok(())
}

fn default_block_size() -> u64 {
    DEFAULT_BLOCK_SIZE
}

fn default_end_block() -> i64 {
    LAST_BLOCK
}

/// Full listing of one disk image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListFilesRequest {
    pub disk_path: String,
    /// Include ownership and timestamps, which cost extra backend calls.
    #[serde(default)]
    pub verbose: bool,
}

impl ListFilesRequest {
    pub fn validate(&self) -> EngineResult<()> {
        require_non_empty("disk_path", &self.disk_path)
    }
}

/// Bare path listing of one disk image, optionally scoped to a directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListFilenamesRequest {
    pub disk_path: String,
    #[serde(default)]
    pub directory: Option<String>,
}

impl ListFilenamesRequest {
    pub fn validate(&self) -> EngineResult<()> {
        require_non_empty("disk_path", &self.disk_path)
    }
}

/// Read one guest file, optionally truncated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadFileRequest {
    pub disk_path: String,
    /// Guest path; coerced to absolute by the backend if the leading
    /// slash is missing.
    pub path: String,
    #[serde(default)]
    pub binary: bool,
    /// Stop reading after this many bytes.
    #[serde(default)]
    pub max_bytes: Option<u64>,
    /// Cut the content just before the first occurrence of this marker.
    #[serde(default)]
    pub stop_delimiter: Option<String>,
}

impl ReadFileRequest {
    pub fn validate(&self) -> EngineResult<()> {
        require_non_empty("disk_path", &self.disk_path)?;
        require_non_empty("path", &self.path)
    }

    pub fn options(&self) -> ReadOptions {
        ReadOptions {
            binary: self.binary,
            max_bytes: self.max_bytes,
            stop_delimiter: self.stop_delimiter.clone(),
        }
    }
}

/// Which paths exist on which of two disks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompareFilenamesRequest {
    pub disk_left: String,
    pub disk_right: String,
    #[serde(default)]
    pub directory: Option<String>,
}

impl CompareFilenamesRequest {
    pub fn validate(&self) -> EngineResult<()> {
        require_non_empty("disk_left", &self.disk_left)?;
        require_non_empty("disk_right", &self.disk_right)
    }
}

/// Line-level comparison of one guest file across two disks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompareContentsRequest {
    pub disk_left: String,
    pub disk_right: String,
    pub path: String,
    #[serde(default)]
    pub binary: bool,
    #[serde(default)]
    pub max_bytes: Option<u64>,
    #[serde(default)]
    pub stop_delimiter: Option<String>,
}

impl CompareContentsRequest {
    pub fn validate(&self) -> EngineResult<()> {
        require_non_empty("disk_left", &self.disk_left)?;
        require_non_empty("disk_right", &self.disk_right)?;
        require_non_empty("path", &self.path)
    }

    pub fn options(&self) -> ReadOptions {
        ReadOptions {
            binary: self.binary,
            max_bytes: self.max_bytes,
            stop_delimiter: self.stop_delimiter.clone(),
        }
    }
}

/// Raw block scan across two disk images.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompareBlocksRequest {
    pub disk_left: String,
    pub disk_right: String,
    #[serde(default = "default_block_size")]
    pub block_size: u64,
    #[serde(default)]
    pub start_block: u64,
    /// Inclusive end block; `-1` means the last block of the longer image.
    #[serde(default = "default_end_block")]
    pub end_block: i64,
}

impl CompareBlocksRequest {
    pub fn validate(&self) -> EngineResult<()> {
        require_non_empty("disk_left", &self.disk_left)?;
        require_non_empty("disk_right", &self.disk_right)?;
        if self.block_size == 0 {
            return Err(EngineError::Input("block_size must be positive".into()));
        }
        if self.end_block < LAST_BLOCK {
            return Err(EngineError::Input(format!(
                "end_block must be >= -1, got {}",
                self.end_block
            )));
        }
        Ok(())
    }

    pub fn range(&self) -> BlockRange {
        BlockRange {
            block_size: self.block_size,
            start_block: self.start_block,
            end_block: self.end_block,
        }
    }
}

/// Render one block of one disk image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewBlockRequest {
    pub disk_path: String,
    pub block_index: u64,
    #[serde(default = "default_block_size")]
    pub block_size: u64,
    #[serde(default)]
    pub format: BlockFormat,
}

impl ViewBlockRequest {
    pub fn validate(&self) -> EngineResult<()> {
        require_non_empty("disk_path", &self.disk_path)?;
        if self.block_size == 0 {
            return Err(EngineError::Input("block_size must be positive".into()));
        }
        Ok(())
    }
}

/// Ownership rollup of one disk image's listing. Carries only the disk
/// path: the rollup always reads a verbose listing, so there is nothing
/// else to vary per request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnershipRequest {
    pub disk_path: String,
}

impl OwnershipRequest {
    pub fn validate(&self) -> EngineResult<()> {
        require_non_empty("disk_path", &self.disk_path)
    }
}

/// Existence probe for one guest path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileExistsRequest {
    pub disk_path: String,
    pub path: String,
}

impl FileExistsRequest {
    pub fn validate(&self) -> EngineResult<()> {
        require_non_empty("disk_path", &self.disk_path)?;
        require_non_empty("path", &self.path)
    }
}

/// Convert a disk image between formats (e.g. qcow2 → raw). Never cached:
/// the product is the destination file itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConvertFormatRequest {
    pub src_path: String,
    pub dest_path: String,
    pub src_format: String,
    pub dest_format: String,
}

impl ConvertFormatRequest {
    pub fn validate(&self) -> EngineResult<()> {
        require_non_empty("src_path", &self.src_path)?;
        require_non_empty("dest_path", &self.dest_path)?;
        require_non_empty("src_format", &self.src_format)?;
        require_non_empty("dest_format", &self.dest_format)
    }
}
