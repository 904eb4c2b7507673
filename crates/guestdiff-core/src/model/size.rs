/// Human-readable size and count formatting.
///
/// Engine results carry exact `u64` byte counts end to end; these
/// helpers exist for the ownership summary writer and any frontend that
/// wants a rounded figure next to the exact one. Floating point never
/// leaves this module.

/// Render a byte count with a binary-unit suffix (KB = 1024 bytes,
/// labeled with the short forms readers expect).
pub fn format_size(bytes: u64) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = KB * 1024.0;
    const GB: f64 = MB * 1024.0;
    const TB: f64 = GB * 1024.0;

    let b = bytes as f64;
    if b < KB {
        format!("{bytes} B")
    } else if b < MB {
        format!("{:.1} KB", b / KB)
    } else if b < GB {
        format!("{:.1} MB", b / MB)
    } else if b < TB {
        format!("{:.2} GB", b / GB)
    } else {
        format!("{:.2} TB", b / TB)
    }
}

/// Display an exact byte count, or the `-` sentinel when the size is
/// unknown. Listings and exports use this rather than the rounded
/// [`format_size`] so byte totals stay comparable across disks.
pub fn display_bytes(size: Option<u64>) -> String {
    match size {
        Some(n) => n.to_string(),
        None => "-".to_string(),
    }
}

/// Format a count with thousand separators.
pub fn format_count(count: u64) -> String {
    if count < 1_000 {
        return count.to_string();
    }
    let s = count.to_string();
    let mut result = String::with_capacity(s.len() + s.len() / 3);
    for (i, ch) in s.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(ch);
    }
    result.chars().rev().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn size_units_scale() {
        assert_eq!(format_size(0), "0 B");
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(4_096), "4.0 KB");
        assert_eq!(format_size(1_572_864), "1.5 MB");
        assert_eq!(format_size(2_147_483_648), "2.00 GB");
        assert_eq!(format_size(3_298_534_883_328), "3.00 TB");
    }

    /// The unit boundary rounds into the next unit, not "1024.0 KB".
    #[test]
    fn size_unit_boundaries() {
        assert_eq!(format_size(1_023), "1023 B");
        assert_eq!(format_size(1_024), "1.0 KB");
        assert_eq!(format_size(1_048_576), "1.0 MB");
    }

    #[test]
    fn display_bytes_sentinel() {
        assert_eq!(display_bytes(Some(0)), "0");
        assert_eq!(display_bytes(Some(4096)), "4096");
        assert_eq!(display_bytes(None), "-");
    }

    #[test]
    fn counts_get_separators() {
        assert_eq!(format_count(7), "7");
        assert_eq!(format_count(999), "999");
        assert_eq!(format_count(1_042), "1,042");
        assert_eq!(format_count(987_654_321), "987,654,321");
    }
}
