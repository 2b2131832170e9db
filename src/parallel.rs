//! Parallel driver for the relation builder.
//!
//! The smaller axis of `initial × terminal` is cut into near-equal chunks. Each
//! worker evaluates its chunk against a shared [`TableauSnapshot`] and writes
//! the partial relation as JSON into a scratch directory; the driver then
//! merges the partials by direct copy. Only characteristic values are
//! computed here, never ledgers.

use std::any::Any;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::num::NonZeroUsize;
use std::ops::Range;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use once_cell::sync::OnceCell;
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use serde::{Deserialize, Serialize};
use tempfile::TempDir;
use tracing::{debug, warn};

use crate::aggregate::{AggregatorSettings, PairwiseAggregator, TableauSnapshot};
use crate::config::{StartMethod, ThreadingConfig};
use crate::error::{OutrankingError, Result};
use crate::relation::Relation;
use crate::valuation::ValuationDomain;

static SHARED_POOL: OnceCell<ThreadPool> = OnceCell::new();

/// Requested worker count: `nbr_cores` when set, otherwise the host's available parallelism.
pub fn resolve_cores(threading: &ThreadingConfig) -> usize {
    match threading.nbr_cores {
        Some(n) => n.max(1),
        None => std::thread::available_parallelism()
            .map(NonZeroUsize::get)
            .unwrap_or(1),
    }
}

/// Split `0..len` into at most `parts` contiguous ranges whose sizes differ by at most one.
pub fn partition(len: usize, parts: usize) -> Vec<Range<usize>> {
    let parts = parts.clamp(1, len.max(1));
    let base = len / parts;
    let extra = len % parts;
    let mut ranges = Vec::with_capacity(parts);
    let mut start = 0;
    for k in 0..parts {
        let size = base + usize::from(k < extra);
        if size > 0 {
            ranges.push(start..start + size);
        }
        start += size;
    }
    ranges
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
enum SplitAxis {
    Rows,
    Cols,
}

/// Artifact written by one worker.
#[derive(Debug, Serialize, Deserialize)]
struct PartialRelation {
    worker: usize,
    axis: SplitAxis,
    first: usize,
    /// One line (row or column, per `axis`) per split index.
    block: Vec<Vec<f64>>,
}

enum WorkerPool {
    Owned(ThreadPool),
    Global,
    Shared(&'static ThreadPool),
}

impl WorkerPool {
    fn for_method(method: StartMethod, cores: usize) -> Result<Self> {
        match method {
            StartMethod::Spawn => Ok(Self::Owned(build_pool(cores)?)),
            StartMethod::Fork => Ok(Self::Global),
            StartMethod::Forkserver => SHARED_POOL.get_or_try_init(|| build_pool(cores)).map(Self::Shared),
        }
    }

    fn threads(&self) -> usize {
        match self {
            Self::Owned(pool) => pool.current_num_threads(),
            Self::Global => rayon::current_num_threads(),
            Self::Shared(pool) => pool.current_num_threads(),
        }
    }

    fn install<R: Send>(&self, op: impl FnOnce() -> R + Send) -> R {
        match self {
            Self::Owned(pool) => pool.install(op),
            Self::Global => op(),
            Self::Shared(pool) => pool.install(op),
        }
    }
}

fn build_pool(cores: usize) -> Result<ThreadPool> {
    ThreadPoolBuilder::new()
        .num_threads(cores)
        .thread_name(|i| format!("outranking-worker-{i}"))
        .build()
        .map_err(|e| OutrankingError::Pool(e.to_string()))
}

fn scratch_dir(threading: &ThreadingConfig) -> Result<TempDir> {
    let mut builder = tempfile::Builder::new();
    builder.prefix("outranking-");
    let dir = match &threading.temp_dir {
        Some(parent) => builder.tempdir_in(parent)?,
        None => builder.tempdir()?,
    };
    Ok(dir)
}

pub(crate) struct ParallelRun {
    /// Normalized, unrounded characteristic values.
    pub relation: Relation,
    pub threads: usize,
    pub chunks: usize,
}

pub(crate) fn build_relation(
    snapshot: Arc<TableauSnapshot>,
    settings: AggregatorSettings,
    rows: &[usize],
    cols: &[usize],
    threading: &ThreadingConfig,
    cores: usize,
) -> Result<ParallelRun> {
    let axis = if rows.len() <= cols.len() {
        SplitAxis::Rows
    } else {
        SplitAxis::Cols
    };
    let split_len = match axis {
        SplitAxis::Rows => rows.len(),
        SplitAxis::Cols => cols.len(),
    };
    let chunks = partition(split_len, cores);
    let pool = WorkerPool::for_method(threading.start_method, cores)?;
    let threads = pool.threads();
    if threads != cores {
        debug!(
            start_method = threading.start_method.as_str(),
            requested = cores,
            threads,
            "worker pool size differs from the requested core count"
        );
    }
    let scratch = scratch_dir(threading)?;
    debug!(
        start_method = threading.start_method.as_str(),
        chunks = chunks.len(),
        ?axis,
        scratch = %scratch.path().display(),
        "starting parallel relation build"
    );

    let job = |_worker: usize, range: Range<usize>, cancel: &AtomicBool| -> Result<Vec<Vec<f64>>> {
        let snapshot = Arc::clone(&snapshot);
        let aggregator = PairwiseAggregator::new(&snapshot, settings);
        let mut block = Vec::with_capacity(range.len());
        for k in range {
            if cancel.load(Ordering::Relaxed) {
                break;
            }
            let line: Vec<f64> = match axis {
                SplitAxis::Rows => cols.iter().map(|&y| aggregator.value(rows[k], y)).collect(),
                SplitAxis::Cols => rows.iter().map(|&x| aggregator.value(x, cols[k])).collect(),
            };
            block.push(line);
        }
        Ok(block)
    };
    let partials = run_chunks(&pool, scratch.path(), axis, &chunks, job)?;

    let ids = snapshot.alternative_ids();
    let mut relation = Relation::indeterminate(
        ValuationDomain::normalized(),
        rows.iter().map(|&x| ids[x].clone()).collect(),
        cols.iter().map(|&y| ids[y].clone()).collect(),
    );
    for path in &partials {
        let partial: PartialRelation = serde_json::from_reader(BufReader::new(File::open(path)?))?;
        match partial.axis {
            SplitAxis::Rows => relation.copy_rows(partial.first, &partial.block),
            SplitAxis::Cols => relation.copy_cols(partial.first, &partial.block),
        }
    }
    scratch.close()?;

    Ok(ParallelRun {
        relation,
        threads,
        chunks: chunks.len(),
    })
}

/// Run `job` once per chunk on `pool`, writing each block into `scratch`.
///
/// The first failing or panicking worker raises the shared cancellation flag;
/// remaining workers stop at their next line and the failure is returned as
/// [`OutrankingError::WorkerFailure`].
fn run_chunks<F>(
    pool: &WorkerPool,
    scratch: &Path,
    axis: SplitAxis,
    chunks: &[Range<usize>],
    job: F,
) -> Result<Vec<PathBuf>>
where
    F: Fn(usize, Range<usize>, &AtomicBool) -> Result<Vec<Vec<f64>>> + Sync,
{
    let cancel = AtomicBool::new(false);
    let first_failure: Mutex<Option<OutrankingError>> = Mutex::new(None);

    let written: Vec<Option<PathBuf>> = pool.install(|| {
        chunks
            .par_iter()
            .enumerate()
            .map(|(worker, range)| {
                if cancel.load(Ordering::Relaxed) {
                    return None;
                }
                let outcome = panic::catch_unwind(AssertUnwindSafe(|| job(worker, range.clone(), &cancel)))
                    .unwrap_or_else(|payload| Err(OutrankingError::Pool(panic_message(payload.as_ref()))))
                    .and_then(|block| {
                        let partial = PartialRelation {
                            worker,
                            axis,
                            first: range.start,
                            block,
                        };
                        write_partial(scratch, &partial)
                    });
                match outcome {
                    Ok(path) => Some(path),
                    Err(err) => {
                        if !cancel.swap(true, Ordering::SeqCst) {
                            warn!(worker, error = %err, "worker failed; cancelling remaining chunks");
                            if let Ok(mut slot) = first_failure.lock() {
                                *slot = Some(OutrankingError::WorkerFailure {
                                    worker,
                                    reason: err.to_string(),
                                });
                            }
                        }
                        None
                    }
                }
            })
            .collect()
    });

    if let Some(err) = first_failure.into_inner().ok().flatten() {
        return Err(err);
    }
    written
        .into_iter()
        .enumerate()
        .map(|(worker, path)| {
            path.ok_or_else(|| OutrankingError::WorkerFailure {
                worker,
                reason: "worker produced no partial relation".into(),
            })
        })
        .collect()
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    let detail = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown cause".to_string());
    format!("worker panicked: {detail}")
}

fn write_partial(scratch: &Path, partial: &PartialRelation) -> Result<PathBuf> {
    let path = scratch.join(format!("partial-{:04}.json", partial.worker));
    let mut writer = BufWriter::new(File::create(&path)?);
    serde_json::to_writer(&mut writer, partial)?;
    writer.flush()?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partition_is_near_equal_and_drops_empty_chunks() {
        assert_eq!(partition(10, 3), vec![0..4, 4..7, 7..10]);
        assert_eq!(partition(2, 4), vec![0..1, 1..2]);
        assert_eq!(partition(5, 1), vec![0..5]);
        assert!(partition(0, 3).is_empty());
    }

    #[test]
    fn explicit_core_count_wins() {
        let threading = ThreadingConfig {
            nbr_cores: Some(3),
            ..ThreadingConfig::default()
        };
        assert_eq!(resolve_cores(&threading), 3);
        let zero = ThreadingConfig {
            nbr_cores: Some(0),
            ..ThreadingConfig::default()
        };
        assert_eq!(resolve_cores(&zero), 1);
        assert!(resolve_cores(&ThreadingConfig::default()) >= 1);
    }

    #[test]
    fn chunks_are_written_in_worker_order() {
        let scratch = tempfile::tempdir().unwrap();
        let pool = WorkerPool::for_method(StartMethod::Spawn, 2).unwrap();
        let chunks = partition(5, 2);
        let paths = run_chunks(&pool, scratch.path(), SplitAxis::Rows, &chunks, |_, range, _| {
            Ok(range.map(|k| vec![k as f64]).collect())
        })
        .unwrap();
        assert_eq!(paths.len(), 2);
        let partial: PartialRelation =
            serde_json::from_reader(BufReader::new(File::open(&paths[1]).unwrap())).unwrap();
        assert_eq!(partial.first, 3);
        assert_eq!(partial.block, vec![vec![3.0], vec![4.0]]);
    }

    #[test]
    fn failing_worker_surfaces_as_worker_failure() {
        let scratch = tempfile::tempdir().unwrap();
        let pool = WorkerPool::for_method(StartMethod::Spawn, 2).unwrap();
        let chunks = partition(4, 4);
        let err = run_chunks(&pool, scratch.path(), SplitAxis::Cols, &chunks, |worker, range, _| {
            if worker == 2 {
                return Err(OutrankingError::InvalidTableau("boom".into()));
            }
            Ok(range.map(|_| vec![0.0]).collect())
        })
        .unwrap_err();
        match err {
            OutrankingError::WorkerFailure { worker, reason } => {
                assert_eq!(worker, 2);
                assert!(reason.contains("boom"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn panicking_worker_surfaces_as_worker_failure() {
        let scratch = tempfile::tempdir().unwrap();
        let pool = WorkerPool::for_method(StartMethod::Spawn, 2).unwrap();
        let chunks = partition(3, 3);
        let err = run_chunks(&pool, scratch.path(), SplitAxis::Rows, &chunks, |worker, range, _| {
            if worker == 1 {
                panic!("line {} is corrupt", range.start);
            }
            Ok(range.map(|_| vec![0.0]).collect())
        })
        .unwrap_err();
        match err {
            OutrankingError::WorkerFailure { worker, reason } => {
                assert_eq!(worker, 1);
                assert!(reason.contains("panicked"), "{reason}");
                assert!(reason.contains("line 1 is corrupt"), "{reason}");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn scratch_dir_is_created_under_the_configured_parent() {
        let parent = tempfile::tempdir().unwrap();
        let threading = ThreadingConfig {
            temp_dir: Some(parent.path().to_path_buf()),
            ..ThreadingConfig::default()
        };
        let scratch = scratch_dir(&threading).unwrap();
        assert!(scratch.path().starts_with(parent.path()));
        let path = scratch.path().to_path_buf();
        scratch.close().unwrap();
        assert!(!path.exists());
    }
}
