/// In-memory inspection backend.
///
/// Disks are plain structs registered up front, so tests can stage two
/// guest filesystems and drive every engine operation without an actual
/// image or a hypervisor toolchain. Each trait call is counted, which
/// lets tests assert that the cache really absorbed repeat requests.
use std::collections::HashMap;

use parking_lot::RwLock;

use crate::analysis::block_diff::{BlockSource, SliceSource};
use crate::analysis::ownership::NameTables;
use crate::error::{EngineError, EngineResult};
use crate::model::{FileRecord, FileSet};

use super::request::ConvertFormatRequest;
use super::{FileExistence, FilePayload, InspectionClient, ReadOptions};

/// One staged disk image: its listing, file contents, account names, and
/// optionally raw image bytes for block reads.
#[derive(Debug, Clone, Default)]
pub struct MemoryDisk {
    records: FileSet,
    contents: HashMap<String, Vec<u8>>,
    names: NameTables,
    image: Vec<u8>,
}

impl MemoryDisk {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage a regular file: a record sized to the content, plus the
    /// content itself.
    pub fn file(mut self, path: &str, content: impl AsRef<[u8]>) -> Self {
        let content = content.as_ref();
        let path = absolute(path);
        self.records
            .insert(FileRecord::file(path.as_str(), content.len() as u64));
        self.contents.insert(path, content.to_vec());
        self
    }

    /// Stage a directory record.
    pub fn dir(mut self, path: &str) -> Self {
        self.records.insert(FileRecord::directory(absolute(path)));
        self
    }

    /// Stage a fully custom record (ownership, timestamps, permissions).
    /// Content, if any, must be staged separately via [`Self::file`].
    pub fn record(mut self, record: FileRecord) -> Self {
        self.records.insert(record);
        self
    }

    /// Attach uid/gid name tables.
    pub fn names(mut self, names: NameTables) -> Self {
        self.names = names;
        self
    }

    /// Attach raw image bytes for block-level reads.
    pub fn image(mut self, bytes: Vec<u8>) -> Self {
        self.image = bytes;
        self
    }
}

/// [`InspectionClient`] over a map of staged [`MemoryDisk`]s.
#[derive(Default)]
pub struct MemoryClient {
    disks: HashMap<String, MemoryDisk>,
    conversions: RwLock<Vec<ConvertFormatRequest>>,
    calls: RwLock<HashMap<String, usize>>,
}

impl MemoryClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn disk(mut self, path: &str, disk: MemoryDisk) -> Self {
        self.disks.insert(path.to_string(), disk);
        self
    }

    /// How many times the named trait method ran. Cache tests use this to
    /// prove a second request never reached the backend.
    pub fn call_count(&self, method: &str) -> usize {
        self.calls.read().get(method).copied().unwrap_or(0)
    }

    /// Conversion requests seen so far, in order.
    pub fn conversions(&self) -> Vec<ConvertFormatRequest> {
        self.conversions.read().clone()
    }

    fn tally(&self, method: &str) {
        *self.calls.write().entry(method.to_string()).or_insert(0) += 1;
    }

    fn staged(&self, disk_path: &str) -> EngineResult<&MemoryDisk> {
        self.disks
            .get(disk_path)
            .ok_or_else(|| EngineError::NotFound(disk_path.to_string()))
    }
}

impl InspectionClient for MemoryClient {
    fn list_files(&self, disk_path: &str, verbose: bool) -> EngineResult<Vec<FileRecord>> {
        self.tally("list_files");
        let disk = self.staged(disk_path)?;
        let records = disk.records.records().cloned().map(|mut r| {
            // Non-verbose listings skip the expensive stat fields, the
            // same way a real backend avoids the extra guest calls.
            if !verbose {
                r.uid = None;
                r.gid = None;
                r.modified_at = None;
            }
            r
        });
        Ok(records.collect())
    }

    fn list_filenames(
        &self,
        disk_path: &str,
        directory: Option<&str>,
    ) -> EngineResult<Vec<String>> {
        self.tally("list_filenames");
        let disk = self.staged(disk_path)?;
        let paths = disk.records.paths();
        Ok(match directory {
            None => paths.map(str::to_string).collect(),
            Some(dir) => {
                let dir = normalize_dir(dir);
                paths
                    .filter(|p| parent_of(p) == dir)
                    .map(str::to_string)
                    .collect()
            }
        })
    }

    fn read_file_contents(
        &self,
        disk_path: &str,
        path: &str,
        options: &ReadOptions,
    ) -> EngineResult<FilePayload> {
        self.tally("read_file_contents");
        let disk = self.staged(disk_path)?;
        let path = absolute(path);
        let bytes = disk
            .contents
            .get(&path)
            .ok_or_else(|| EngineError::NotFound(format!("{disk_path}:{path}")))?;

        let mut bytes = match options.max_bytes {
            Some(limit) => bytes[..bytes.len().min(limit as usize)].to_vec(),
            None => bytes.clone(),
        };
        if let Some(delimiter) = options.stop_delimiter.as_deref() {
            if !delimiter.is_empty() {
                let needle = delimiter.as_bytes();
                if let Some(at) = bytes.windows(needle.len()).position(|w| w == needle) {
                    bytes.truncate(at);
                }
            }
        }

        Ok(if options.binary {
            FilePayload::Binary(bytes)
        } else {
            FilePayload::Text(String::from_utf8_lossy(&bytes).into_owned())
        })
    }

    fn read_block(&self, disk_path: &str, index: u64, block_size: u64) -> EngineResult<Vec<u8>> {
        self.tally("read_block");
        let disk = self.staged(disk_path)?;
        let mut source = SliceSource::new(&disk.image);
        Ok(source.read_window(index, block_size)?.content)
    }

    fn ownership_names(&self, disk_path: &str) -> EngineResult<NameTables> {
        self.tally("ownership_names");
        Ok(self.staged(disk_path)?.names.clone())
    }

    fn file_exists(&self, disk_path: &str, path: &str) -> EngineResult<FileExistence> {
        self.tally("file_exists");
        let disk = self.staged(disk_path)?;
        let path = absolute(path);
        let record = disk.records.get(&path).cloned();
        Ok(FileExistence {
            exists: record.is_some(),
            record,
        })
    }

    fn convert_format(&self, request: &ConvertFormatRequest) -> EngineResult<()> {
        self.tally("convert_format");
        self.staged(&request.src_path)?;
        self.conversions.write().push(request.clone());
        Ok(())
    }

    fn backend_version(&self) -> String {
        format!("memory-client {}", env!("CARGO_PKG_VERSION"))
    }
}

/// Guest paths are absolute by definition; tolerate callers that drop the
/// leading slash.
fn absolute(path: &str) -> String {
    if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{path}")
    }
}

/// Coerce absolute and strip any trailing slash (except for the root).
fn normalize_dir(dir: &str) -> String {
    let dir = absolute(dir);
    if dir.len() > 1 && dir.ends_with('/') {
        dir[..dir.len() - 1].to_string()
    } else {
        dir
    }
}

fn parent_of(path: &str) -> &str {
    match path.rsplit_once('/') {
        Some(("", _)) => "/",
        Some((parent, _)) => parent,
        None => "/",
    }
}
