/// Path-set comparison between two disk listings.
///
/// Partitions two path collections into only-left / only-right / common
/// and flattens the partition into one lexicographically sorted row list
/// for rendering. Purely set-theoretic; no I/O.
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Which side(s) of the comparison a path appeared on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PathStatus {
    Common,
    OnlyLeft,
    OnlyRight,
}

/// Three pairwise-disjoint path sets whose union is the union of the two
/// inputs. `BTreeSet` keeps every view of the partition in lexicographic
/// order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffPartition {
    pub only_left: BTreeSet<String>,
    pub only_right: BTreeSet<String>,
    pub common: BTreeSet<String>,
}

/// One row of the flattened comparison table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathDiffRow {
    pub path: String,
    pub status: PathStatus,
}

/// Row counts for the comparison header line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetDiffSummary {
    /// Distinct paths across both sides; always the sum of the other three.
    pub total_distinct: usize,
    pub only_left_count: usize,
    pub only_right_count: usize,
    pub common_count: usize,
}

/// Full result of a path-set comparison: the partition, the flat sorted
/// row list, and the counts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetDiff {
    pub partition: DiffPartition,
    pub rows: Vec<PathDiffRow>,
    pub summary: SetDiffSummary,
}

/// Partition two path collections.
///
/// Duplicate paths within one side collapse. An empty side leaves
/// `common` empty and reports every path of the other side as exclusive;
/// identical sides report everything common.
pub fn diff_path_sets<L, R>(left: L, right: R) -> SetDiff
where
    L: IntoIterator,
    L::Item: Into<String>,
    R: IntoIterator,
    R::Item: Into<String>,
{
    let left: BTreeSet<String> = left.into_iter().map(Into::into).collect();
    let right: BTreeSet<String> = right.into_iter().map(Into::into).collect();

    let mut partition = DiffPartition::default();
    for path in left.union(&right) {
        let status = match (left.contains(path), right.contains(path)) {
            (true, true) => &mut partition.common,
            (true, false) => &mut partition.only_left,
            (false, true) => &mut partition.only_right,
            // union() only yields paths present on at least one side
            (false, false) => unreachable!(),
        };
        status.insert(path.clone());
    }

    // BTreeSet::union iterates in sorted order, so the rows come out
    // already sorted without a second pass.
    let rows: Vec<PathDiffRow> = left
        .union(&right)
        .map(|path| PathDiffRow {
            path: path.clone(),
            status: if partition.common.contains(path) {
                PathStatus::Common
            } else if partition.only_left.contains(path) {
                PathStatus::OnlyLeft
            } else {
                PathStatus::OnlyRight
            },
        })
        .collect();

    let summary = SetDiffSummary {
        total_distinct: rows.len(),
        only_left_count: partition.only_left.len(),
        only_right_count: partition.only_right.len(),
        common_count: partition.common.len(),
    };

    SetDiff {
        partition,
        rows,
        summary,
    }
}
