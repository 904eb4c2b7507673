/// Ownership aggregation over a file listing.
///
/// Reduces a stream of file records into per-user and per-group rollups
/// plus grand totals in a single pass. Name resolution is the caller's
/// input: the tables come from the guest's account databases via the
/// inspection backend, and ids missing from them get placeholder names.
use crate::model::{FileKind, FileRecord};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// uid → name and gid → name, as read from the guest's `/etc/passwd` and
/// `/etc/group`. Ids listed here are seeded into the output even when no
/// record references them, so "this user owns nothing" is visible.
#[derive(Debug, Clone, Default)]
pub struct NameTables {
    pub users: HashMap<u32, String>,
    pub groups: HashMap<u32, String>,
}

/// One row of the per-user or per-group table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnerRow {
    pub id: u32,
    /// Resolved symbolic name, or `uid_<id>` / `gid_<id>` when the id is
    /// not in the name tables.
    pub name: String,
    pub files: u64,
    pub dirs: u64,
    /// File plus directory bytes owned by this id.
    pub bytes: u64,
}

/// Grand totals and ordered per-owner tables for one listing.
///
/// `total_bytes` is always `total_file_bytes + total_dir_bytes`, and when
/// every record carries a uid the per-user `bytes` column sums to it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnershipAggregate {
    pub files_count: u64,
    pub dirs_count: u64,
    pub total_file_bytes: u64,
    pub total_dir_bytes: u64,
    pub total_bytes: u64,
    pub users_total: u64,
    pub users_with_files: u64,
    pub groups_total: u64,
    pub groups_with_files: u64,
    /// Sorted by descending bytes, ties by ascending id.
    pub per_user: Vec<OwnerRow>,
    /// Same ordering as `per_user`.
    pub per_group: Vec<OwnerRow>,
}

#[derive(Debug, Clone, Copy, Default)]
struct Counters {
    files: u64,
    dirs: u64,
    bytes: u64,
}

impl Counters {
    fn tally(&mut self, is_file: bool, bytes: u64) {
        if is_file {
            self.files += 1;
        } else {
            self.dirs += 1;
        }
        self.bytes += bytes;
    }
}

/// Aggregate a listing.
///
/// Files and directories count; everything else (symlinks, devices,
/// sockets) is skipped. A record with unknown size counts but contributes
/// zero bytes. Records without a uid/gid contribute to the grand totals
/// but not to the respective per-owner table. Truncating the tables to a
/// top-N view is the caller's business — the aggregate itself is complete.
pub fn aggregate<'a, I>(records: I, names: &NameTables) -> OwnershipAggregate
where
    I: IntoIterator<Item = &'a FileRecord>,
{
    // Seed every known id so zero-owner rows survive into the tables.
    let mut per_uid: HashMap<u32, Counters> = names
        .users
        .keys()
        .map(|&id| (id, Counters::default()))
        .collect();
    let mut per_gid: HashMap<u32, Counters> = names
        .groups
        .keys()
        .map(|&id| (id, Counters::default()))
        .collect();

    let mut agg = OwnershipAggregate::default();
    for record in records {
        let is_file = match record.kind {
            FileKind::File => true,
            FileKind::Directory => false,
            FileKind::Other => continue,
        };
        let bytes = record.size.unwrap_or(0);

        if is_file {
            agg.files_count += 1;
            agg.total_file_bytes += bytes;
        } else {
            agg.dirs_count += 1;
            agg.total_dir_bytes += bytes;
        }

        if let Some(uid) = record.uid {
            per_uid.entry(uid).or_default().tally(is_file, bytes);
        }
        if let Some(gid) = record.gid {
            per_gid.entry(gid).or_default().tally(is_file, bytes);
        }
    }

    agg.total_bytes = agg.total_file_bytes + agg.total_dir_bytes;
    agg.per_user = build_rows(per_uid, &names.users, "uid");
    agg.per_group = build_rows(per_gid, &names.groups, "gid");
    agg.users_total = agg.per_user.len() as u64;
    agg.users_with_files = agg.per_user.iter().filter(|r| r.files > 0).count() as u64;
    agg.groups_total = agg.per_group.len() as u64;
    agg.groups_with_files = agg.per_group.iter().filter(|r| r.files > 0).count() as u64;
    agg
}

fn build_rows(
    counters: HashMap<u32, Counters>,
    names: &HashMap<u32, String>,
    placeholder: &str,
) -> Vec<OwnerRow> {
    let mut rows: Vec<OwnerRow> = counters
        .into_iter()
        .map(|(id, c)| OwnerRow {
            id,
            name: names
                .get(&id)
                .cloned()
                .unwrap_or_else(|| format!("{placeholder}_{id}")),
            files: c.files,
            dirs: c.dirs,
            bytes: c.bytes,
        })
        .collect();
    // When byte totals tie, sort by ascending id so two runs over the
    // same listing render identically.
    rows.sort_by(|a, b| b.bytes.cmp(&a.bytes).then_with(|| a.id.cmp(&b.id)));
    rows
}
