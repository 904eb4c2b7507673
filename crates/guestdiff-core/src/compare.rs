/// Comparator façade — one typed entry point per operation.
///
/// Every method validates its request, consults the fingerprint cache
/// under the caller's [`CachePolicy`], and on a miss pulls data from the
/// inspection client (or a raw block source) and runs the matching
/// engine. The cache policy is always explicit: the crate never decides
/// freshness behind the caller's back. Each method documents the policy
/// it recommends.
use std::path::Path;

use tracing::{debug, info};

use crate::analysis::block_diff::{diff_blocks, render_block, BlockDiffResult, FileBlockSource};
use crate::analysis::content_diff::{diff_contents, DiffMode, DiffRow};
use crate::analysis::ownership::{aggregate, OwnershipAggregate};
use crate::analysis::set_diff::{diff_path_sets, SetDiff};
use crate::cache::FingerprintCache;
use crate::config::{CacheConfig, CachePolicy};
use crate::error::{EngineError, EngineResult};
use crate::inspect::request::{
    CompareBlocksRequest, CompareContentsRequest, CompareFilenamesRequest, ConvertFormatRequest,
    FileExistsRequest, ListFilenamesRequest, ListFilesRequest, OwnershipRequest, ReadFileRequest,
    ViewBlockRequest,
};
use crate::inspect::{FileExistence, FilePayload, InspectionClient, ReadOptions};
use crate::model::FileRecord;

/// Cache-fronted comparison engine over one inspection backend.
///
/// Holds the client and the cache; every engine call is otherwise
/// stateless, so one `Comparator` serves any number of concurrent
/// callers.
pub struct Comparator<C> {
    client: C,
    cache: FingerprintCache,
}

impl<C: InspectionClient> Comparator<C> {
    /// Wire a client to a fresh cache. Fails only when the cache
    /// directory cannot be created.
    pub fn new(client: C, cache_config: CacheConfig) -> EngineResult<Self> {
        let cache = FingerprintCache::new(cache_config)?;
        info!(backend = %client.backend_version(), cache_dir = %cache.dir().display(), "comparator ready");
        Ok(Self { client, cache })
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn cache(&self) -> &FingerprintCache {
        &self.cache
    }

    /// Full listing of one disk. Recommended policy: `Reuse` — the
    /// backend mounts the image per call, which dwarfs the cache read.
    pub fn list_files(
        &self,
        req: &ListFilesRequest,
        policy: CachePolicy,
    ) -> EngineResult<Vec<FileRecord>> {
        req.validate()?;
        self.cache.get_or_compute("list_files", req, policy, || {
            info!(disk = %req.disk_path, verbose = req.verbose, "listing files");
            self.client.list_files(&req.disk_path, req.verbose)
        })
    }

    /// Bare path listing, optionally scoped to one directory. Recommended
    /// policy: `Reuse`.
    pub fn list_filenames(
        &self,
        req: &ListFilenamesRequest,
        policy: CachePolicy,
    ) -> EngineResult<Vec<String>> {
        req.validate()?;
        self.cache.get_or_compute("list_filenames", req, policy, || {
            info!(disk = %req.disk_path, directory = req.directory.as_deref(), "listing filenames");
            self.client
                .list_filenames(&req.disk_path, req.directory.as_deref())
        })
    }

    /// Partition the paths of two disks into only-left / only-right /
    /// common. The two listings are cached per side under
    /// `list_filenames`; the partition itself is cheap and recomputed.
    /// Recommended policy: `Reuse`.
    pub fn compare_filenames(
        &self,
        req: &CompareFilenamesRequest,
        policy: CachePolicy,
    ) -> EngineResult<SetDiff> {
        req.validate()?;
        let side = |disk: &str| ListFilenamesRequest {
            disk_path: disk.to_string(),
            directory: req.directory.clone(),
        };
        let left = self.list_filenames(&side(&req.disk_left), policy)?;
        let right = self.list_filenames(&side(&req.disk_right), policy)?;
        Ok(diff_path_sets(left, right))
    }

    /// Aligned diff of one guest file across two disks. A side whose disk
    /// or file is missing renders as the sentinel line instead of
    /// aborting the comparison. Recommended policy: caller's choice,
    /// default `Reuse`.
    pub fn compare_file_contents(
        &self,
        req: &CompareContentsRequest,
        policy: CachePolicy,
    ) -> EngineResult<Vec<DiffRow>> {
        req.validate()?;
        self.cache
            .get_or_compute("compare_file_contents", req, policy, || {
                let options = req.options();
                let left = self.read_side(&req.disk_left, &req.path, &options)?;
                let right = self.read_side(&req.disk_right, &req.path, &options)?;
                let mode = if req.binary {
                    DiffMode::Binary
                } else {
                    DiffMode::Text
                };
                Ok(diff_contents(left.as_deref(), right.as_deref(), mode))
            })
    }

    /// Read one side of a content comparison, mapping `NotFound` (disk or
    /// file) to a missing side.
    fn read_side(
        &self,
        disk: &str,
        path: &str,
        options: &ReadOptions,
    ) -> EngineResult<Option<Vec<u8>>> {
        match self.client.read_file_contents(disk, path, options) {
            Ok(payload) => Ok(Some(payload.as_bytes().to_vec())),
            Err(EngineError::NotFound(what)) => {
                debug!(%what, "missing side renders as sentinel");
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    /// Block-by-block scan of two raw image files. The heaviest
    /// operation in the crate; recommended policy: `Reuse`. For
    /// interactive callers prefer [`crate::jobs::spawn_block_diff`].
    pub fn compare_blocks(
        &self,
        req: &CompareBlocksRequest,
        policy: CachePolicy,
    ) -> EngineResult<BlockDiffResult> {
        req.validate()?;
        self.cache.get_or_compute("compare_blocks", req, policy, || {
            info!(
                left = %req.disk_left,
                right = %req.disk_right,
                block_size = req.block_size,
                "comparing blocks"
            );
            let mut left = FileBlockSource::open(Path::new(&req.disk_left))?;
            let mut right = FileBlockSource::open(Path::new(&req.disk_right))?;
            diff_blocks(&mut left, &mut right, &req.range())
        })
    }

    /// Render one block of one disk in the requested format. Recommended
    /// policy: `Reuse` — block content only changes when the image does.
    pub fn view_block(&self, req: &ViewBlockRequest, policy: CachePolicy) -> EngineResult<String> {
        req.validate()?;
        self.cache.get_or_compute("view_block", req, policy, || {
            let content = self
                .client
                .read_block(&req.disk_path, req.block_index, req.block_size)?;
            Ok(render_block(&content, req.format))
        })
    }

    /// Per-user/per-group rollup of one disk's listing. Recommended
    /// policy: `Reuse`.
    pub fn aggregate_ownership(
        &self,
        req: &OwnershipRequest,
        policy: CachePolicy,
    ) -> EngineResult<OwnershipAggregate> {
        req.validate()?;
        self.cache
            .get_or_compute("aggregate_ownership", req, policy, || {
                info!(disk = %req.disk_path, "aggregating ownership");
                // The rollup needs uid/gid on every record, so the
                // listing is always verbose.
                let records = self.client.list_files(&req.disk_path, true)?;
                let names = self.client.ownership_names(&req.disk_path)?;
                Ok(aggregate(&records, &names))
            })
    }

    /// Existence probe for one guest path. Recommended policy: caller's
    /// choice, default `Reuse`; pass `Refresh` when probing a disk that
    /// may have been rewritten since the last look.
    pub fn file_exists(
        &self,
        req: &FileExistsRequest,
        policy: CachePolicy,
    ) -> EngineResult<FileExistence> {
        req.validate()?;
        self.cache.get_or_compute("file_exists", req, policy, || {
            self.client.file_exists(&req.disk_path, &req.path)
        })
    }

    /// Read one guest file, honoring `max_bytes` and `stop_delimiter`.
    /// Recommended policy: caller's choice, default `Reuse`.
    pub fn read_file_contents(
        &self,
        req: &ReadFileRequest,
        policy: CachePolicy,
    ) -> EngineResult<FilePayload> {
        req.validate()?;
        self.cache
            .get_or_compute("read_file_contents", req, policy, || {
                self.client
                    .read_file_contents(&req.disk_path, &req.path, &req.options())
            })
    }

    /// Convert a disk image between formats. Never cached — the product
    /// is the destination file on disk, not the returned status line.
    pub fn convert_format(&self, req: &ConvertFormatRequest) -> EngineResult<String> {
        req.validate()?;
        info!(src = %req.src_path, dest = %req.dest_path, "converting disk image");
        self.client.convert_format(req)?;
        Ok(format!(
            "Converted {} ({}) to {} ({})",
            req.src_path, req.src_format, req.dest_path, req.dest_format
        ))
    }
}
