/// End-to-end comparison flows through the façade.
///
/// Two staged in-memory disks drive the file-level operations; real temp
/// files drive the block-level ones. These tests cover the wiring the
/// unit tests cannot: request → cache → client → engine → result, plus
/// the background job path.
use std::fs;
use std::path::Path;

use anyhow::Result;
use tempfile::TempDir;

use guestdiff_core::analysis::block_diff::{diff_blocks, BlockRange, FileBlockSource};
use guestdiff_core::analysis::content_diff::{RowKind, BINARY_ROW_TOKENS};
use guestdiff_core::analysis::ownership::NameTables;
use guestdiff_core::analysis::set_diff::PathStatus;
use guestdiff_core::compare::Comparator;
use guestdiff_core::config::{CacheConfig, CachePolicy};
use guestdiff_core::inspect::memory::{MemoryClient, MemoryDisk};
use guestdiff_core::inspect::request::{
    CompareBlocksRequest, CompareContentsRequest, CompareFilenamesRequest, OwnershipRequest,
    ViewBlockRequest,
};
use guestdiff_core::jobs::{spawn_block_diff, JobProgress};
use guestdiff_core::model::FileRecord;

fn init_logs() {
    let _ = tracing_subscriber::fmt().try_init();
}

/// Stage two guest filesystems that differ the way a patched VM differs
/// from its golden image:
///
/// ```text
/// alpha                          beta
///   /etc                           /etc
///   /etc/hostname  "alpha\n"       /etc/hostname  "beta\n"
///   /etc/hosts     (identical)     /etc/hosts     (identical)
///   /etc/alpha.conf                /etc/beta.conf
/// ```
fn staged_pair() -> MemoryClient {
    let hosts = "127.0.0.1 localhost\n10.0.0.7 db\n";
    MemoryClient::new()
        .disk(
            "/images/alpha.qcow2",
            MemoryDisk::new()
                .dir("/etc")
                .file("/etc/hostname", "alpha\n")
                .file("/etc/hosts", hosts)
                .file("/etc/alpha.conf", "left only\n"),
        )
        .disk(
            "/images/beta.qcow2",
            MemoryDisk::new()
                .dir("/etc")
                .file("/etc/hostname", "beta\n")
                .file("/etc/hosts", hosts)
                .file("/etc/beta.conf", "right only\n"),
        )
}

fn comparator(client: MemoryClient, dir: &TempDir) -> Comparator<MemoryClient> {
    Comparator::new(client, CacheConfig::new(dir.path())).unwrap()
}

// ── Path-set comparison ──────────────────────────────────────────────────

#[test]
fn compare_filenames_partitions_both_disks() -> Result<()> {
    init_logs();
    let dir = TempDir::new()?;
    let cmp = comparator(staged_pair(), &dir);

    let req = CompareFilenamesRequest {
        disk_left: "/images/alpha.qcow2".into(),
        disk_right: "/images/beta.qcow2".into(),
        directory: None,
    };
    let diff = cmp.compare_filenames(&req, CachePolicy::Reuse)?;

    let by_status = |status: PathStatus| -> Vec<&str> {
        diff.rows
            .iter()
            .filter(|r| r.status == status)
            .map(|r| r.path.as_str())
            .collect()
    };
    assert_eq!(by_status(PathStatus::OnlyLeft), ["/etc/alpha.conf"]);
    assert_eq!(by_status(PathStatus::OnlyRight), ["/etc/beta.conf"]);
    assert_eq!(
        by_status(PathStatus::Common),
        ["/etc", "/etc/hostname", "/etc/hosts"]
    );
    assert_eq!(diff.summary.total_distinct, 5);

    // Both per-side listings are cached; a repeat never reaches the backend.
    cmp.compare_filenames(&req, CachePolicy::Reuse)?;
    assert_eq!(cmp.client().call_count("list_filenames"), 2);
    Ok(())
}

#[test]
fn compare_filenames_scoped_to_directory() -> Result<()> {
    let dir = TempDir::new()?;
    let cmp = comparator(staged_pair(), &dir);

    let req = CompareFilenamesRequest {
        disk_left: "/images/alpha.qcow2".into(),
        disk_right: "/images/beta.qcow2".into(),
        directory: Some("/etc".into()),
    };
    let diff = cmp.compare_filenames(&req, CachePolicy::Reuse)?;
    // The /etc directory record itself is not a child of /etc.
    assert_eq!(diff.summary.common_count, 2, "hostname and hosts");
    assert_eq!(diff.summary.total_distinct, 4);
    Ok(())
}

// ── Content comparison ───────────────────────────────────────────────────

#[test]
fn content_diff_flags_changed_line() -> Result<()> {
    let dir = TempDir::new()?;
    let cmp = comparator(staged_pair(), &dir);

    let req = CompareContentsRequest {
        disk_left: "/images/alpha.qcow2".into(),
        disk_right: "/images/beta.qcow2".into(),
        path: "/etc/hostname".into(),
        binary: false,
        max_bytes: None,
        stop_delimiter: None,
    };
    let rows = cmp.compare_file_contents(&req, CachePolicy::Reuse)?;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].kind, RowKind::Replaced);
    assert_eq!(rows[0].left.as_deref(), Some("alpha"));
    assert_eq!(rows[0].right.as_deref(), Some("beta"));
    Ok(())
}

#[test]
fn identical_file_diffs_all_equal() -> Result<()> {
    let dir = TempDir::new()?;
    let cmp = comparator(staged_pair(), &dir);

    let req = CompareContentsRequest {
        disk_left: "/images/alpha.qcow2".into(),
        disk_right: "/images/beta.qcow2".into(),
        path: "/etc/hosts".into(),
        binary: false,
        max_bytes: None,
        stop_delimiter: None,
    };
    let rows = cmp.compare_file_contents(&req, CachePolicy::Reuse)?;
    assert_eq!(rows.len(), 2);
    assert!(rows.iter().all(|r| r.kind == RowKind::Equal));
    Ok(())
}

/// Binary mode regroups each side into 32-token hex rows before aligning.
#[test]
fn binary_diff_rows_are_fixed_width() -> Result<()> {
    let dir = TempDir::new()?;
    let mut left_bytes = vec![0x11u8; 96];
    let right_bytes = left_bytes.clone();
    left_bytes[40] = 0xEE; // inside the second 32-byte row

    let client = MemoryClient::new()
        .disk(
            "/images/alpha.qcow2",
            MemoryDisk::new().file("/bin/tool", left_bytes),
        )
        .disk(
            "/images/beta.qcow2",
            MemoryDisk::new().file("/bin/tool", right_bytes),
        );
    let cmp = comparator(client, &dir);

    let req = CompareContentsRequest {
        disk_left: "/images/alpha.qcow2".into(),
        disk_right: "/images/beta.qcow2".into(),
        path: "/bin/tool".into(),
        binary: true,
        max_bytes: None,
        stop_delimiter: None,
    };
    let rows = cmp.compare_file_contents(&req, CachePolicy::Reuse)?;
    assert_eq!(rows.len(), 3, "96 bytes -> three 32-byte rows");
    let kinds: Vec<RowKind> = rows.iter().map(|r| r.kind).collect();
    assert_eq!(kinds, [RowKind::Equal, RowKind::Replaced, RowKind::Equal]);
    for row in &rows {
        let cell = row.left.as_deref().unwrap();
        assert_eq!(cell.split(' ').count(), BINARY_ROW_TOKENS);
    }
    Ok(())
}

// ── Block comparison ─────────────────────────────────────────────────────

fn write_image(path: &Path, bytes: &[u8]) -> Result<()> {
    fs::write(path, bytes)?;
    Ok(())
}

#[test]
fn compare_blocks_finds_mutated_block_and_caches() -> Result<()> {
    init_logs();
    let dir = TempDir::new()?;
    let cache_dir = TempDir::new()?;
    let left = dir.path().join("golden.img");
    let right = dir.path().join("patched.img");

    let mut bytes = vec![0xA5u8; 4096 * 5];
    write_image(&left, &bytes)?;
    bytes[4096 * 2 + 100] = 0x00; // mutate one byte in block 2
    write_image(&right, &bytes)?;

    let cmp = comparator(MemoryClient::new(), &cache_dir);
    let req = CompareBlocksRequest {
        disk_left: left.to_string_lossy().into_owned(),
        disk_right: right.to_string_lossy().into_owned(),
        block_size: 4096,
        start_block: 0,
        end_block: -1,
    };
    let result = cmp.compare_blocks(&req, CachePolicy::Reuse)?;
    assert_eq!(result.total_scanned, 5);
    let indices: Vec<u64> = result.differing.keys().copied().collect();
    assert_eq!(indices, [2]);

    // The result is served from the cache even after the images vanish.
    fs::remove_file(&left)?;
    fs::remove_file(&right)?;
    let cached = cmp.compare_blocks(&req, CachePolicy::Reuse)?;
    assert_eq!(cached, result);
    Ok(())
}

#[test]
fn view_block_is_cached_per_index() -> Result<()> {
    let dir = TempDir::new()?;
    let mut image = vec![0u8; 4096 * 2];
    image[4096] = 0xFF;
    let client = MemoryClient::new().disk("/images/alpha.qcow2", MemoryDisk::new().image(image));
    let cmp = comparator(client, &dir);

    let req = ViewBlockRequest {
        disk_path: "/images/alpha.qcow2".into(),
        block_index: 1,
        block_size: 4096,
        format: Default::default(),
    };
    let text = cmp.view_block(&req, CachePolicy::Reuse)?;
    assert!(text.starts_with("0000: FF 00 00"), "{text}");
    assert_eq!(text.lines().count(), 256, "4096 bytes / 16 per row");

    cmp.view_block(&req, CachePolicy::Reuse)?;
    assert_eq!(cmp.client().call_count("read_block"), 1);
    Ok(())
}

// ── Ownership rollup ─────────────────────────────────────────────────────

#[test]
fn ownership_rollup_resolves_names_and_sorts() -> Result<()> {
    let dir = TempDir::new()?;

    let mut shadow = FileRecord::file("/etc/shadow", 1_200);
    shadow.uid = Some(0);
    shadow.gid = Some(42);
    let mut home = FileRecord::file("/home/alice/notes.txt", 8_000);
    home.uid = Some(1000);
    home.gid = Some(1000);
    let mut homedir = FileRecord::directory("/home/alice");
    homedir.uid = Some(1000);
    homedir.gid = Some(1000);

    let names = NameTables {
        users: [(0, "root".to_string()), (1000, "alice".to_string())].into(),
        groups: [(42, "shadow".to_string())].into(),
    };
    let client = MemoryClient::new().disk(
        "/images/alpha.qcow2",
        MemoryDisk::new()
            .record(shadow)
            .record(home)
            .record(homedir)
            .names(names),
    );
    let cmp = comparator(client, &dir);

    let req = OwnershipRequest {
        disk_path: "/images/alpha.qcow2".into(),
    };
    let agg = cmp.aggregate_ownership(&req, CachePolicy::Reuse)?;

    assert_eq!(agg.files_count, 2);
    assert_eq!(agg.dirs_count, 1);
    assert_eq!(agg.total_bytes, agg.total_file_bytes + agg.total_dir_bytes);

    // alice owns the most bytes, so she sorts first; gid 1000 has no
    // table entry and falls back to the placeholder.
    assert_eq!(agg.per_user[0].name, "alice");
    assert_eq!(agg.per_user[0].bytes, 8_000);
    let gid_row = agg.per_group.iter().find(|r| r.id == 1000).unwrap();
    assert_eq!(gid_row.name, "gid_1000");

    // Repeat under Reuse: one listing, one name-table fetch, and a
    // single cache entry for the disk.
    cmp.aggregate_ownership(&req, CachePolicy::Reuse)?;
    assert_eq!(cmp.client().call_count("list_files"), 1);
    assert_eq!(cmp.client().call_count("ownership_names"), 1);
    let rollup_entries = fs::read_dir(dir.path())?
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .filter(|name| name.starts_with("aggregate_ownership_"))
        .count();
    assert_eq!(rollup_entries, 1);
    Ok(())
}

// ── Background jobs ──────────────────────────────────────────────────────

/// The background worker must agree exactly with the synchronous engine.
#[test]
fn background_job_matches_direct_diff() -> Result<()> {
    init_logs();
    let dir = TempDir::new()?;
    let left = dir.path().join("l.img");
    let right = dir.path().join("r.img");
    let mut bytes: Vec<u8> = (0..4096u32 * 4).map(|i| (i % 255) as u8).collect();
    write_image(&left, &bytes)?;
    bytes[4096 + 7] ^= 0xFF;
    bytes[4096 * 3] ^= 0x01;
    write_image(&right, &bytes)?;

    let range = BlockRange::default();
    let direct = diff_blocks(
        &mut FileBlockSource::open(&left)?,
        &mut FileBlockSource::open(&right)?,
        &range,
    )?;

    let handle = spawn_block_diff(left, right, range);
    let deadline = std::time::Instant::now() + std::time::Duration::from_secs(30);
    loop {
        assert!(std::time::Instant::now() < deadline, "job timed out");
        match handle.progress_rx.recv_timeout(std::time::Duration::from_millis(100)) {
            Ok(JobProgress::Complete { result, .. }) => {
                assert_eq!(result, direct);
                let indices: Vec<u64> = result.differing.keys().copied().collect();
                assert_eq!(indices, [1, 3]);
                break;
            }
            Ok(JobProgress::Update { .. }) => continue,
            Ok(other) => panic!("unexpected terminal event: {other:?}"),
            Err(crossbeam_channel::RecvTimeoutError::Timeout) => continue,
            Err(crossbeam_channel::RecvTimeoutError::Disconnected) => {
                panic!("worker exited without a terminal event")
            }
        }
    }
    Ok(())
}
