/// Background execution of long comparisons.
///
/// A full-disk block diff can take minutes; interactive callers run it on
/// a named worker thread and watch a bounded progress channel instead of
/// blocking. Cancellation is cooperative: the worker polls its flag from
/// the scan observer, so no block comparison is ever interrupted mid-read.
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender};
use tracing::info;

use crate::analysis::block_diff::{
    diff_blocks_with_progress, BlockDiffResult, BlockRange, BlockScan, FileBlockSource,
    ScanControl,
};
use crate::error::EngineResult;

/// Maximum progress messages that may queue up in the channel.
///
/// Callers drain the channel on their own cadence (a UI frame, a poll
/// loop). With updates throttled to one per [`PROGRESS_UPDATE_INTERVAL`]
/// blocks, 1 024 slots cover over a quarter million scanned blocks of
/// backlog; past that, further updates are dropped rather than blocking
/// the worker — only the terminal event is delivered reliably.
pub const PROGRESS_CHANNEL_CAPACITY: usize = 1_024;

/// Blocks scanned between progress updates. One message per block would
/// swamp the channel on a large image; one per 256 blocks (1 MiB at the
/// default block size) still updates many times per second.
pub const PROGRESS_UPDATE_INTERVAL: u64 = 256;

/// Progress events sent from the worker thread.
///
/// Exactly one terminal event (`Complete`, `Cancelled`, or `Failed`)
/// arrives per job, always last.
#[derive(Debug)]
pub enum JobProgress {
    /// Periodic update with running totals.
    Update {
        current_index: u64,
        blocks_scanned: u64,
        differing_so_far: u64,
    },
    /// The scan ran to the end of its range.
    Complete {
        result: BlockDiffResult,
        duration: Duration,
    },
    /// The scan stopped at a block boundary after [`JobHandle::cancel`].
    Cancelled,
    /// The scan could not run or aborted mid-way (missing image, I/O).
    Failed { message: String },
}

/// Handle to a running or finished background job.
pub struct JobHandle {
    /// Receiver for progress and the terminal event.
    pub progress_rx: Receiver<JobProgress>,
    cancel_flag: Arc<AtomicBool>,
    thread: Option<thread::JoinHandle<()>>,
}

impl JobHandle {
    /// Ask the worker to stop after the block it is currently comparing.
    pub fn cancel(&self) {
        self.cancel_flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel_flag.load(Ordering::Relaxed)
    }
}

impl Drop for JobHandle {
    /// Cancel, drain, and join so an abandoned job cannot outlive its
    /// handle or leave the worker blocked on a full channel.
    fn drop(&mut self) {
        self.cancel();
        while self.progress_rx.try_recv().is_ok() {}
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

/// Start a block diff of two raw image files on a background thread.
///
/// Invalid paths or ranges surface as a [`JobProgress::Failed`] event
/// rather than an immediate error, so callers handle every outcome in one
/// place: the channel.
pub fn spawn_block_diff(left: PathBuf, right: PathBuf, range: BlockRange) -> JobHandle {
    let (progress_tx, progress_rx) =
        crossbeam_channel::bounded::<JobProgress>(PROGRESS_CHANNEL_CAPACITY);
    let cancel_flag = Arc::new(AtomicBool::new(false));
    let cancel_clone = cancel_flag.clone();

    let thread = thread::Builder::new()
        .name("guestdiff-blockdiff".into())
        .spawn(move || {
            let started = Instant::now();
            info!(
                left = %left.display(),
                right = %right.display(),
                block_size = range.block_size,
                "starting background block diff"
            );
            let outcome = run_block_diff(&left, &right, &range, &progress_tx, &cancel_clone);
            let terminal = match outcome {
                Ok(scan) if scan.completed => JobProgress::Complete {
                    result: scan.result,
                    duration: started.elapsed(),
                },
                Ok(_) => JobProgress::Cancelled,
                Err(err) => JobProgress::Failed {
                    message: err.to_string(),
                },
            };
            // The caller may have discarded the handle; a dead channel is
            // not the worker's problem.
            let _ = progress_tx.send(terminal);
        })
        .expect("failed to spawn block diff thread");

    JobHandle {
        progress_rx,
        cancel_flag,
        thread: Some(thread),
    }
}

fn run_block_diff(
    left: &std::path::Path,
    right: &std::path::Path,
    range: &BlockRange,
    progress_tx: &Sender<JobProgress>,
    cancel_flag: &AtomicBool,
) -> EngineResult<BlockScan> {
    let mut left = FileBlockSource::open(left)?;
    let mut right = FileBlockSource::open(right)?;
    diff_blocks_with_progress(&mut left, &mut right, range, |p| {
        if p.blocks_scanned % PROGRESS_UPDATE_INTERVAL == 0 {
            // try_send: a full channel drops the update, never stalls the
            // scan.
            let _ = progress_tx.try_send(JobProgress::Update {
                current_index: p.current_index,
                blocks_scanned: p.blocks_scanned,
                differing_so_far: p.differing_so_far,
            });
        }
        if cancel_flag.load(Ordering::Relaxed) {
            ScanControl::Stop
        } else {
            ScanControl::Continue
        }
    })
}
