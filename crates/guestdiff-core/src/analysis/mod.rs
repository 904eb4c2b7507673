/// Comparison engines — pure algorithms over already-extracted data.
///
/// The four engines are independent siblings: none of them calls another,
/// none of them does inspection I/O (the block engine reads raw image
/// bytes through its own [`block_diff::BlockSource`] abstraction), and all
/// of them are deterministic functions of their inputs.

pub mod block_diff;
pub mod content_diff;
pub mod ownership;
pub mod set_diff;

pub use block_diff::{diff_blocks, render_block, BlockDiffResult, BlockFormat, BlockRange};
pub use content_diff::{diff_contents, DiffMode, DiffRow, RowKind};
pub use ownership::{aggregate, NameTables, OwnershipAggregate};
pub use set_diff::{diff_path_sets, DiffPartition, PathStatus, SetDiff};
