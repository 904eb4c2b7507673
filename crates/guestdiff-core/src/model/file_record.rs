/// File records captured by guest-filesystem inspection.
///
/// A record is an immutable snapshot of one path inside a disk image at
/// inspection time. Records arrive from the inspection backend already
/// extracted — nothing here touches the image itself.
use chrono::{DateTime, Utc};
use compact_str::CompactString;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// What kind of filesystem object a record describes.
///
/// Symlinks, sockets, devices, and fifos all fold into `Other`; the
/// aggregation engine counts only files and directories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    File,
    Directory,
    Other,
}

impl FileKind {
    /// Lowercase label for display and CSV export.
    pub fn label(self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Directory => "directory",
            Self::Other => "other",
        }
    }
}

/// One path inside an inspected disk image.
///
/// Guest paths are absolute posix-style strings. `size` is `None` when the
/// backend could not stat the object; such records still count toward file
/// and directory totals but contribute zero bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    /// Absolute posix-style path inside the guest (e.g. `/etc/hosts`).
    pub path: CompactString,

    /// Size in bytes, `None` when unknown.
    pub size: Option<u64>,

    /// Nine-character `rwxrwxrwx` triplet string.
    pub permissions: CompactString,

    /// Last-modified timestamp, `None` when the backend reported none.
    pub modified_at: Option<DateTime<Utc>>,

    /// Numeric owner, when known.
    pub uid: Option<u32>,

    /// Numeric group, when known.
    pub gid: Option<u32>,

    pub kind: FileKind,
}

impl FileRecord {
    /// A regular-file record with the given size. Remaining fields start
    /// empty and may be filled in directly.
    pub fn file(path: impl Into<CompactString>, size: u64) -> Self {
        Self {
            path: path.into(),
            size: Some(size),
            permissions: CompactString::new(""),
            modified_at: None,
            uid: None,
            gid: None,
            kind: FileKind::File,
        }
    }

    /// A directory record. Directories usually report size 0.
    pub fn directory(path: impl Into<CompactString>) -> Self {
        Self {
            path: path.into(),
            size: Some(0),
            permissions: CompactString::new(""),
            modified_at: None,
            uid: None,
            gid: None,
            kind: FileKind::Directory,
        }
    }

    /// A record for anything that is neither file nor directory.
    pub fn other(path: impl Into<CompactString>) -> Self {
        Self {
            path: path.into(),
            size: None,
            permissions: CompactString::new(""),
            modified_at: None,
            uid: None,
            gid: None,
            kind: FileKind::Other,
        }
    }
}

/// Render a posix mode's permission bits as the nine-character
/// `rwxrwxrwx` triplet string (no file-type prefix, no setuid/sticky
/// markers).
pub fn permissions_string(mode: u32) -> CompactString {
    const FLAGS: [u32; 9] = [
        0o400, 0o200, 0o100, 0o040, 0o020, 0o010, 0o004, 0o002, 0o001,
    ];
    const CHARS: [char; 9] = ['r', 'w', 'x', 'r', 'w', 'x', 'r', 'w', 'x'];

    let mut out = CompactString::new("");
    for (flag, ch) in FLAGS.iter().zip(CHARS.iter()) {
        out.push(if mode & flag != 0 { *ch } else { '-' });
    }
    out
}

/// Display a timestamp as `YYYY-MM-DD HH:MM:SS` (UTC), or `-` when absent.
pub fn format_timestamp(ts: Option<DateTime<Utc>>) -> String {
    match ts {
        Some(t) => t.format("%Y-%m-%d %H:%M:%S").to_string(),
        None => "-".to_string(),
    }
}

/// All records of one inspected root (a whole disk or a directory
/// subtree), indexed by path.
///
/// Iteration order is lexicographic by path, which keeps listings and
/// exports deterministic without a separate sort.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSet {
    records: BTreeMap<CompactString, FileRecord>,
}

impl FileSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index a sequence of records by path. A later record for the same
    /// path replaces the earlier one.
    pub fn from_records(records: impl IntoIterator<Item = FileRecord>) -> Self {
        let mut set = Self::new();
        for record in records {
            set.insert(record);
        }
        set
    }

    pub fn insert(&mut self, record: FileRecord) {
        self.records.insert(record.path.clone(), record);
    }

    pub fn get(&self, path: &str) -> Option<&FileRecord> {
        self.records.get(path)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.records.contains_key(path)
    }

    /// Paths in lexicographic order.
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.records.keys().map(|p| p.as_str())
    }

    /// Records in lexicographic path order.
    pub fn records(&self) -> impl Iterator<Item = &FileRecord> {
        self.records.values()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
