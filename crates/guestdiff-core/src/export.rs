/// Export writers for listings and ownership rollups.
///
/// Three renderings of a file listing: a right-aligned fixed-width text
/// table, CSV, and a JSON object keyed by 1-based row number. Plus a
/// human-readable text report of an ownership aggregate. All are pure
/// functions of the data passed in; unknown sizes and missing timestamps
/// render as the `-` sentinel.
use std::io::{self, Write};

use serde_json::{Map, Value};

use crate::analysis::ownership::{OwnerRow, OwnershipAggregate};
use crate::model::file_record::format_timestamp;
use crate::model::{display_bytes, format_count, format_size, FileRecord};

/// Length of the `=` rule under the table header.
pub const TABLE_RULE_WIDTH: usize = 60;

fn permissions_cell(record: &FileRecord) -> &str {
    if record.permissions.is_empty() {
        "-"
    } else {
        record.permissions.as_str()
    }
}

/// Write the listing as a fixed-width table.
///
/// Columns `Size`, `Permission`, and `Last Modified` are right-aligned to
/// 10, 10, and 20 characters; `Name` is unpadded so long guest paths
/// never truncate.
pub fn write_listing_table<W: Write>(records: &[FileRecord], out: &mut W) -> io::Result<()> {
    writeln!(
        out,
        "{:>10} {:>10} {:>20} {:>20}",
        "Size", "Permission", "Last Modified", "Name"
    )?;
    writeln!(out, "{}", "=".repeat(TABLE_RULE_WIDTH))?;
    for record in records {
        writeln!(
            out,
            "{:>10} {:>10} {:>20} {}",
            display_bytes(record.size),
            permissions_cell(record),
            format_timestamp(record.modified_at),
            record.path
        )?;
    }
    Ok(())
}

/// Write the listing as CSV with the header row
/// `path,kind,size,permissions,modified,uid,gid`. Absent uid/gid cells
/// are left empty.
pub fn write_listing_csv<W: Write>(records: &[FileRecord], out: W) -> csv::Result<()> {
    let mut writer = csv::Writer::from_writer(out);
    writer.write_record(["path", "kind", "size", "permissions", "modified", "uid", "gid"])?;
    for record in records {
        let size = display_bytes(record.size);
        let modified = format_timestamp(record.modified_at);
        let uid = record.uid.map(|id| id.to_string()).unwrap_or_default();
        let gid = record.gid.map(|id| id.to_string()).unwrap_or_default();
        writer.write_record([
            record.path.as_str(),
            record.kind.label(),
            size.as_str(),
            permissions_cell(record),
            modified.as_str(),
            uid.as_str(),
            gid.as_str(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

/// Render the listing as a JSON object keyed `"1"`, `"2"`, … in listing
/// order, each row `{"Size", "Permission", "Last Modified", "Name"}`.
pub fn listing_to_numbered_json(records: &[FileRecord]) -> Value {
    let mut out = Map::new();
    for (i, record) in records.iter().enumerate() {
        let mut row = Map::new();
        row.insert("Size".into(), Value::String(display_bytes(record.size)));
        row.insert(
            "Permission".into(),
            Value::String(permissions_cell(record).to_string()),
        );
        row.insert(
            "Last Modified".into(),
            Value::String(format_timestamp(record.modified_at)),
        );
        row.insert("Name".into(), Value::String(record.path.to_string()));
        out.insert((i + 1).to_string(), Value::Object(row));
    }
    Value::Object(out)
}

/// Write the ownership rollup as a text report: grand totals with a
/// rounded size next to each exact byte figure, then the full per-user
/// and per-group tables including zero rows.
pub fn write_ownership_summary<W: Write>(
    agg: &OwnershipAggregate,
    out: &mut W,
) -> io::Result<()> {
    let rule = "=".repeat(TABLE_RULE_WIDTH);
    writeln!(out, "{rule}")?;
    writeln!(out, "Totals:")?;
    writeln!(out, "  files: {}", format_count(agg.files_count))?;
    writeln!(out, "  dirs: {}", format_count(agg.dirs_count))?;
    writeln!(
        out,
        "  total_file_bytes: {} ({})",
        agg.total_file_bytes,
        format_size(agg.total_file_bytes)
    )?;
    writeln!(
        out,
        "  total_dir_bytes: {} ({})",
        agg.total_dir_bytes,
        format_size(agg.total_dir_bytes)
    )?;
    writeln!(
        out,
        "  total_bytes: {} ({})",
        agg.total_bytes,
        format_size(agg.total_bytes)
    )?;
    writeln!(out, "{rule}")?;
    writeln!(out, "Users (all, including zero):")?;
    for row in &agg.per_user {
        write_owner_row(row, "uid", out)?;
    }
    writeln!(out, "{rule}")?;
    writeln!(out, "Groups (all, including zero):")?;
    for row in &agg.per_group {
        write_owner_row(row, "gid", out)?;
    }
    writeln!(out, "{rule}")?;
    Ok(())
}

fn write_owner_row<W: Write>(row: &OwnerRow, id_label: &str, out: &mut W) -> io::Result<()> {
    writeln!(
        out,
        "  {} ({}={}): files={} dirs={} bytes={}",
        row.name, id_label, row.id, row.files, row.dirs, row.bytes
    )
}
