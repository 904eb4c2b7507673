/// Block-level comparison of two disk images.
///
/// Walks a configurable index range, reads one fixed-size byte window per
/// index from each source, and records the indices whose windows differ.
/// Sources are raw byte stores — no image format is decoded here; a qcow2
/// and a raw image of the same guest will simply differ at almost every
/// block, which is itself a meaningful answer.
use crate::error::{EngineError, EngineResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;
use tracing::debug;

/// Default comparison granularity, matching the common filesystem block.
pub const DEFAULT_BLOCK_SIZE: u64 = 4096;

/// `end_block` value meaning "through the last block of the longer source".
pub const LAST_BLOCK: i64 = -1;

/// Bytes per row in [`BlockFormat::Hex`] rendering.
pub const HEX_BYTES_PER_ROW: usize = 16;

/// Bits per row in [`BlockFormat::Bits`] rendering (8 bytes).
pub const BITS_PER_ROW: usize = 64;

/// Index range and granularity for one block comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockRange {
    pub block_size: u64,
    pub start_block: u64,
    /// Last index to scan, inclusive; [`LAST_BLOCK`] resolves to the block
    /// count of the longer source. Values past the last block clamp to it
    /// — beyond both sources every window is empty and could never differ.
    pub end_block: i64,
}

impl Default for BlockRange {
    fn default() -> Self {
        Self {
            block_size: DEFAULT_BLOCK_SIZE,
            start_block: 0,
            end_block: LAST_BLOCK,
        }
    }
}

/// One window read from a source. `content` is shorter than `size` at
/// end-of-source and empty past it — reading past the end is never an
/// error, it just yields nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockWindow {
    pub index: u64,
    /// The size that was asked for, not the size that came back.
    pub size: u64,
    pub content: Vec<u8>,
}

impl BlockWindow {
    fn empty(index: u64, size: u64) -> Self {
        Self {
            index,
            size,
            content: Vec::new(),
        }
    }
}

/// Random-access byte store the block engine reads from.
pub trait BlockSource {
    /// Total length in bytes.
    fn len(&self) -> u64;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Read the window at byte offset `index * block_size`.
    fn read_window(&mut self, index: u64, block_size: u64) -> std::io::Result<BlockWindow>;

    /// Number of blocks this source spans at the given granularity (the
    /// final partial block counts).
    fn block_count(&self, block_size: u64) -> u64 {
        self.len().div_ceil(block_size)
    }
}

/// Block source over an in-memory byte buffer. Used by tests and small
/// payload comparisons.
#[derive(Debug, Clone)]
pub struct SliceSource<'a> {
    bytes: &'a [u8],
}

impl<'a> SliceSource<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes }
    }
}

impl BlockSource for SliceSource<'_> {
    fn len(&self) -> u64 {
        self.bytes.len() as u64
    }

    fn read_window(&mut self, index: u64, block_size: u64) -> std::io::Result<BlockWindow> {
        let Some(offset) = index.checked_mul(block_size) else {
            return Ok(BlockWindow::empty(index, block_size));
        };
        if offset >= self.len() {
            return Ok(BlockWindow::empty(index, block_size));
        }
        let start = offset as usize;
        let end = (offset + block_size).min(self.len()) as usize;
        Ok(BlockWindow {
            index,
            size: block_size,
            content: self.bytes[start..end].to_vec(),
        })
    }
}

/// Block source over a disk image file on the host filesystem.
///
/// The handle closes on drop, on every exit path. The length is captured
/// at open time; comparisons are snapshots, not watches.
#[derive(Debug)]
pub struct FileBlockSource {
    file: File,
    len: u64,
}

impl FileBlockSource {
    /// Open an image file read-only. A missing path maps to
    /// [`EngineError::NotFound`] so callers can tell it apart from I/O
    /// trouble.
    pub fn open(path: &Path) -> EngineResult<Self> {
        let file = File::open(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                EngineError::NotFound(path.display().to_string())
            } else {
                EngineError::Io(e)
            }
        })?;
        let len = file.metadata()?.len();
        Ok(Self { file, len })
    }
}

impl BlockSource for FileBlockSource {
    fn len(&self) -> u64 {
        self.len
    }

    fn read_window(&mut self, index: u64, block_size: u64) -> std::io::Result<BlockWindow> {
        let Some(offset) = index.checked_mul(block_size) else {
            return Ok(BlockWindow::empty(index, block_size));
        };
        if offset >= self.len {
            return Ok(BlockWindow::empty(index, block_size));
        }
        let want = block_size.min(self.len - offset) as usize;
        let mut content = vec![0u8; want];
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.read_exact(&mut content)?;
        Ok(BlockWindow {
            index,
            size: block_size,
            content,
        })
    }
}

/// Why a block index was recorded: the two window lengths. Unequal
/// lengths already prove a difference; equal lengths mean the bytes
/// differed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockDelta {
    pub left_len: u64,
    pub right_len: u64,
}

/// Sparse comparison result: only differing indices are stored, in index
/// order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockDiffResult {
    pub differing: BTreeMap<u64, BlockDelta>,
    pub total_scanned: u64,
    pub total_differing: u64,
}

/// Running counters handed to the progress observer after every block.
#[derive(Debug, Clone, Copy)]
pub struct BlockScanProgress {
    pub current_index: u64,
    pub blocks_scanned: u64,
    pub differing_so_far: u64,
}

/// Observer verdict: keep scanning or stop after the current block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanControl {
    Continue,
    Stop,
}

/// A possibly-stopped scan. `completed` is false when the observer
/// stopped it; `result` then covers only the blocks scanned so far.
#[derive(Debug, Clone)]
pub struct BlockScan {
    pub result: BlockDiffResult,
    pub completed: bool,
}

/// Compare two sources over `range`, calling `observe` after each block.
///
/// This is the cancellable primitive behind [`diff_blocks`]; background
/// workers poll their cancel flag from the observer, so no block is ever
/// interrupted mid-read. Scanning an unchanged pair of sources twice
/// yields identical results — there is no hidden state.
pub fn diff_blocks_with_progress<A, B, F>(
    left: &mut A,
    right: &mut B,
    range: &BlockRange,
    mut observe: F,
) -> EngineResult<BlockScan>
where
    A: BlockSource,
    B: BlockSource,
    F: FnMut(BlockScanProgress) -> ScanControl,
{
    if range.block_size == 0 {
        return Err(EngineError::Input("block_size must be non-zero".into()));
    }
    if range.end_block < LAST_BLOCK {
        return Err(EngineError::Input(format!(
            "end_block must be {LAST_BLOCK} (last block) or a block index, got {}",
            range.end_block
        )));
    }

    // The longer source decides how many blocks exist; the shorter side
    // reads empty windows past its end.
    let available = left
        .block_count(range.block_size)
        .max(right.block_count(range.block_size));

    let mut result = BlockDiffResult::default();
    if available == 0 || range.start_block >= available {
        debug!(
            start_block = range.start_block,
            available, "block range starts past both sources; nothing to scan"
        );
        return Ok(BlockScan {
            result,
            completed: true,
        });
    }

    let end = match range.end_block {
        LAST_BLOCK => available - 1,
        explicit => (explicit as u64).min(available - 1),
    };
    if end < range.start_block {
        return Ok(BlockScan {
            result,
            completed: true,
        });
    }

    for index in range.start_block..=end {
        let lw = left.read_window(index, range.block_size)?;
        let rw = right.read_window(index, range.block_size)?;
        result.total_scanned += 1;
        if lw.content != rw.content {
            result.differing.insert(
                index,
                BlockDelta {
                    left_len: lw.content.len() as u64,
                    right_len: rw.content.len() as u64,
                },
            );
            result.total_differing += 1;
        }

        let verdict = observe(BlockScanProgress {
            current_index: index,
            blocks_scanned: result.total_scanned,
            differing_so_far: result.total_differing,
        });
        if verdict == ScanControl::Stop && index < end {
            return Ok(BlockScan {
                result,
                completed: false,
            });
        }
    }

    debug!(
        scanned = result.total_scanned,
        differing = result.total_differing,
        "block scan complete"
    );
    Ok(BlockScan {
        result,
        completed: true,
    })
}

/// Compare two sources over `range` to completion.
pub fn diff_blocks<A, B>(
    left: &mut A,
    right: &mut B,
    range: &BlockRange,
) -> EngineResult<BlockDiffResult>
where
    A: BlockSource,
    B: BlockSource,
{
    let scan = diff_blocks_with_progress(left, right, range, |_| ScanControl::Continue)?;
    Ok(scan.result)
}

// ── Block renderer ────────────────────────────────────────────────────────

/// Textual rendering for one block's content.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockFormat {
    /// 16 uppercase hex byte tokens per row.
    #[default]
    Hex,
    /// 64 bit characters per row.
    Bits,
}

/// Render a block's bytes as offset-prefixed rows.
///
/// Hex rows look like `0010: 41 42 ...` — 16 space-joined byte tokens
/// prefixed by the row's starting byte index, zero-padded to four
/// uppercase hex digits. Bits rows carry 64 `0`/`1` characters and the
/// prefix is the row's starting bit index divided by 8 (a byte offset
/// again). Rows are joined by `\n`; empty content renders as the empty
/// string. Pure function of its input — identical bytes always render
/// identical text.
pub fn render_block(content: &[u8], format: BlockFormat) -> String {
    match format {
        BlockFormat::Hex => render_hex(content),
        BlockFormat::Bits => render_bits(content),
    }
}

fn render_hex(content: &[u8]) -> String {
    let rows: Vec<String> = content
        .chunks(HEX_BYTES_PER_ROW)
        .enumerate()
        .map(|(i, chunk)| {
            let offset = i * HEX_BYTES_PER_ROW;
            let tokens: Vec<String> = chunk.iter().map(|b| format!("{b:02X}")).collect();
            format!("{offset:04X}: {}", tokens.join(" "))
        })
        .collect();
    rows.join("\n")
}

fn render_bits(content: &[u8]) -> String {
    let rows: Vec<String> = content
        .chunks(BITS_PER_ROW / 8)
        .enumerate()
        .map(|(i, chunk)| {
            let offset = i * (BITS_PER_ROW / 8);
            let mut bits = String::with_capacity(chunk.len() * 8);
            for b in chunk {
                bits.push_str(&format!("{b:08b}"));
            }
            format!("{offset:04X}: {bits}")
        })
        .collect();
    rows.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── diff_blocks ──────────────────────────────────────────────────────

    /// Identical sources: zero differing, total_scanned == ceil(N / S).
    #[test]
    fn identical_sources_scan_clean() {
        let bytes = vec![7u8; 10_000];
        let mut a = SliceSource::new(&bytes);
        let mut b = SliceSource::new(&bytes);
        let range = BlockRange {
            block_size: 4096,
            ..BlockRange::default()
        };

        let result = diff_blocks(&mut a, &mut b, &range).unwrap();
        assert_eq!(result.total_differing, 0);
        assert!(result.differing.is_empty());
        assert_eq!(result.total_scanned, 3, "10000 bytes / 4096 -> 3 blocks");
    }

    /// Mutating exactly one byte inside block k flags exactly {k}.
    #[test]
    fn single_byte_change_flags_one_block() {
        let left = vec![0u8; 4096 * 4];
        let mut right = left.clone();
        right[4096 * 2 + 17] = 0xFF;

        let mut a = SliceSource::new(&left);
        let mut b = SliceSource::new(&right);
        let result = diff_blocks(&mut a, &mut b, &BlockRange::default()).unwrap();

        assert_eq!(result.total_differing, 1);
        let indices: Vec<u64> = result.differing.keys().copied().collect();
        assert_eq!(indices, [2]);
        let delta = result.differing[&2];
        assert_eq!(delta.left_len, 4096);
        assert_eq!(delta.right_len, 4096);
    }

    /// The longer source resolves `end_block = -1`; the shorter side's
    /// out-of-range windows are empty and differ from real content.
    #[test]
    fn longer_source_sets_range_end() {
        let left = vec![1u8; 100]; // 1 block at size 64 -> 2 blocks
        let right = vec![1u8; 300]; // 5 blocks at size 64
        let mut a = SliceSource::new(&left);
        let mut b = SliceSource::new(&right);
        let range = BlockRange {
            block_size: 64,
            start_block: 0,
            end_block: LAST_BLOCK,
        };

        let result = diff_blocks(&mut a, &mut b, &range).unwrap();
        assert_eq!(result.total_scanned, 5);
        // Block 0 matches (both full of 1s). Block 1: left has 36 bytes,
        // right 64 -> differs. Blocks 2..=4: left empty, right full.
        assert_eq!(result.total_differing, 4);
        let delta = result.differing[&1];
        assert_eq!((delta.left_len, delta.right_len), (36, 64));
        let delta = result.differing[&4];
        assert_eq!((delta.left_len, delta.right_len), (0, 44));
    }

    /// start_block past both sources yields an empty result, not an error.
    #[test]
    fn start_past_available_is_empty() {
        let bytes = vec![0u8; 128];
        let mut a = SliceSource::new(&bytes);
        let mut b = SliceSource::new(&bytes);
        let range = BlockRange {
            block_size: 64,
            start_block: 99,
            end_block: LAST_BLOCK,
        };

        let result = diff_blocks(&mut a, &mut b, &range).unwrap();
        assert_eq!(result.total_scanned, 0);
        assert!(result.differing.is_empty());
    }

    #[test]
    fn empty_sources_scan_nothing() {
        let mut a = SliceSource::new(&[]);
        let mut b = SliceSource::new(&[]);
        let result = diff_blocks(&mut a, &mut b, &BlockRange::default()).unwrap();
        assert_eq!(result.total_scanned, 0);
    }

    /// An explicit sub-range scans only that window of indices.
    #[test]
    fn explicit_range_is_inclusive() {
        let left = vec![0u8; 64 * 8];
        let right = vec![9u8; 64 * 8]; // every block differs
        let mut a = SliceSource::new(&left);
        let mut b = SliceSource::new(&right);
        let range = BlockRange {
            block_size: 64,
            start_block: 2,
            end_block: 5,
        };

        let result = diff_blocks(&mut a, &mut b, &range).unwrap();
        assert_eq!(result.total_scanned, 4, "blocks 2, 3, 4, 5");
        let indices: Vec<u64> = result.differing.keys().copied().collect();
        assert_eq!(indices, [2, 3, 4, 5]);
    }

    /// An end past the last block clamps instead of scanning empty pairs.
    #[test]
    fn end_past_available_clamps() {
        let bytes = vec![5u8; 64 * 2];
        let mut a = SliceSource::new(&bytes);
        let mut b = SliceSource::new(&bytes);
        let range = BlockRange {
            block_size: 64,
            start_block: 0,
            end_block: 1_000,
        };

        let result = diff_blocks(&mut a, &mut b, &range).unwrap();
        assert_eq!(result.total_scanned, 2);
    }

    #[test]
    fn zero_block_size_is_input_error() {
        let mut a = SliceSource::new(&[]);
        let mut b = SliceSource::new(&[]);
        let range = BlockRange {
            block_size: 0,
            ..BlockRange::default()
        };
        let err = diff_blocks(&mut a, &mut b, &range).unwrap_err();
        assert!(matches!(err, EngineError::Input(_)));
    }

    #[test]
    fn invalid_negative_end_is_input_error() {
        let mut a = SliceSource::new(&[]);
        let mut b = SliceSource::new(&[]);
        let range = BlockRange {
            end_block: -2,
            ..BlockRange::default()
        };
        let err = diff_blocks(&mut a, &mut b, &range).unwrap_err();
        assert!(matches!(err, EngineError::Input(_)));
    }

    /// Two scans over unchanged sources must agree exactly.
    #[test]
    fn scan_is_deterministic() {
        let left: Vec<u8> = (0..64 * 5).map(|i| (i % 251) as u8).collect();
        let right: Vec<u8> = (0..64 * 5).map(|i| (i % 241) as u8).collect();
        let range = BlockRange {
            block_size: 64,
            ..BlockRange::default()
        };

        let first = diff_blocks(
            &mut SliceSource::new(&left),
            &mut SliceSource::new(&right),
            &range,
        )
        .unwrap();
        let second = diff_blocks(
            &mut SliceSource::new(&left),
            &mut SliceSource::new(&right),
            &range,
        )
        .unwrap();
        assert_eq!(first, second);
    }

    /// Stopping from the observer returns partial counts and
    /// completed == false.
    #[test]
    fn observer_can_stop_scan() {
        let left = vec![0u8; 64 * 10];
        let right = vec![1u8; 64 * 10];
        let mut a = SliceSource::new(&left);
        let mut b = SliceSource::new(&right);
        let range = BlockRange {
            block_size: 64,
            ..BlockRange::default()
        };

        let scan = diff_blocks_with_progress(&mut a, &mut b, &range, |p| {
            if p.blocks_scanned >= 3 {
                ScanControl::Stop
            } else {
                ScanControl::Continue
            }
        })
        .unwrap();

        assert!(!scan.completed);
        assert_eq!(scan.result.total_scanned, 3);
        assert_eq!(scan.result.total_differing, 3);
    }

    // ── render_block ─────────────────────────────────────────────────────

    /// A 32-byte block renders as exactly two 16-byte rows with offsets
    /// 0000 and 0010.
    #[test]
    fn hex_render_32_bytes_two_rows() {
        let content = vec![0x41u8; 32];
        let text = render_block(&content, BlockFormat::Hex);
        let rows: Vec<&str> = text.lines().collect();
        assert_eq!(rows.len(), 2);
        assert!(rows[0].starts_with("0000: 41 41"));
        assert!(rows[1].starts_with("0010: 41 41"));
        assert_eq!(rows[0].split(' ').count(), 17, "offset token plus 16 bytes");
    }

    #[test]
    fn hex_render_partial_row() {
        let text = render_block(&[0x00, 0x0F, 0x1A], BlockFormat::Hex);
        assert_eq!(text, "0000: 00 0F 1A");
    }

    /// Bits rows carry 64 bit characters; the prefix is the byte offset of
    /// the row (bit index / 8).
    #[test]
    fn bits_render_rows_and_offsets() {
        let content = vec![0xFFu8; 16];
        let text = render_block(&content, BlockFormat::Bits);
        let rows: Vec<&str> = text.lines().collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0], format!("0000: {}", "1".repeat(64)));
        assert_eq!(rows[1], format!("0008: {}", "1".repeat(64)));
    }

    #[test]
    fn bits_render_zero_byte() {
        assert_eq!(render_block(&[0x00], BlockFormat::Bits), "0000: 00000000");
        assert_eq!(render_block(&[0xA5], BlockFormat::Bits), "0000: 10100101");
    }

    #[test]
    fn render_empty_content_is_empty_string() {
        assert_eq!(render_block(&[], BlockFormat::Hex), "");
        assert_eq!(render_block(&[], BlockFormat::Bits), "");
    }

    /// Offsets keep growing past 0xFFFF rather than wrapping.
    #[test]
    fn hex_offsets_widen_past_four_digits() {
        let content = vec![0u8; 0x10010];
        let text = render_block(&content, BlockFormat::Hex);
        let last = text.lines().last().unwrap();
        assert!(last.starts_with("10000: "), "got {last}");
    }
}
