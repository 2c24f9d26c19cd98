//! The run orchestrator: fan documents out to the extractor, merge, sort.
//!
//! ## Algorithm
//!
//! ```text
//! snapshot ──▶ [encode ─▶ extract] × N ──▶ try_collect ──▶ merge ──▶ sort by date
//!               (buffer_unordered)         (first error     (input    (stable)
//!                                           aborts run)      order)
//! ```
//!
//! A run is all-or-nothing. The first failing document fails the run: the
//! remaining in-flight futures are dropped and results already extracted
//! for other documents are discarded.
//!
//! ## Observable state
//!
//! [`Pipeline::state`] exposes [`RunState`] for a UI shell. Every state write
//! is tagged with the run's generation; [`Pipeline::reset`] bumps the
//! generation, so a run that was reset while in flight can never publish its
//! results into a later run's state. Progress callbacks are gated the same
//! way: a superseded run goes silent.

use crate::config::ExtractionConfig;
use crate::document::DocumentFile;
use crate::error::RunError;
use crate::pipeline::encode::encode_document;
use crate::pipeline::llm::TransactionExtractor;
use crate::progress::ProgressCallback;
use crate::transaction::{sort_by_date, Transaction};
use futures::stream::{self, StreamExt, TryStreamExt};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Run status as seen by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum RunState {
    #[default]
    Idle,
    Processing { completed: usize, total: usize },
    Success(Vec<Transaction>),
    Error(String),
}

impl RunState {
    pub fn is_processing(&self) -> bool {
        matches!(self, RunState::Processing { .. })
    }

    /// Transactions of a successful run, empty otherwise.
    pub fn transactions(&self) -> &[Transaction] {
        match self {
            RunState::Success(txs) => txs,
            _ => &[],
        }
    }
}

#[derive(Debug, Default)]
struct Slot {
    generation: u64,
    state: RunState,
}

/// Multi-document extraction pipeline.
///
/// One `Pipeline` runs at most one extraction at a time; a concurrent call to
/// [`run`](Self::run) is rejected with [`RunError::Busy`].
pub struct Pipeline {
    extractor: Arc<dyn TransactionExtractor>,
    concurrency: usize,
    progress: Option<ProgressCallback>,
    slot: Mutex<Slot>,
}

impl Pipeline {
    pub fn new(extractor: Arc<dyn TransactionExtractor>, config: &ExtractionConfig) -> Self {
        Self {
            extractor,
            concurrency: config.concurrency.max(1),
            progress: config.progress_callback.clone(),
            slot: Mutex::new(Slot::default()),
        }
    }

    /// Snapshot of the current run state.
    pub fn state(&self) -> RunState {
        self.lock().state.clone()
    }

    /// Return to `Idle`. An in-flight run keeps going but its outcome is discarded.
    pub fn reset(&self) {
        let mut slot = self.lock();
        slot.generation += 1;
        slot.state = RunState::Idle;
        debug!("Pipeline reset (generation {})", slot.generation);
    }

    /// Extract, merge and date-sort the transactions of every document.
    ///
    /// # Errors
    /// - the first [`RunError::Read`] / [`RunError::Extraction`] of any document
    /// - [`RunError::Busy`] if another run is processing
    /// - [`RunError::Superseded`] if [`reset`](Self::reset) was called meanwhile
    pub async fn run(&self, files: &[DocumentFile]) -> Result<Vec<Transaction>, RunError> {
        let start = Instant::now();
        let snapshot: Vec<DocumentFile> = files.to_vec();
        let total = snapshot.len();

        let generation = self.begin(total)?;
        let guard = AbortGuard {
            pipeline: self,
            generation,
            armed: true,
        };
        info!("Starting extraction run over {} documents", total);

        if let Some(ref cb) = self.progress {
            cb.on_run_start(total);
        }

        let completed = AtomicUsize::new(0);
        let outcome: Result<Vec<(usize, Vec<Transaction>)>, RunError> =
            stream::iter(snapshot.iter().enumerate().map(|(idx, file)| {
                self.process_file(generation, idx, file, total, &completed)
            }))
            .buffer_unordered(self.concurrency)
            .try_collect()
            .await;

        let result = self.finish(generation, outcome);
        guard.disarm();

        if let Ok(ref txs) = result {
            info!(
                "Extraction run complete: {} transactions from {} documents in {}ms",
                txs.len(),
                total,
                start.elapsed().as_millis()
            );
            if let Some(ref cb) = self.progress {
                cb.on_run_complete(total, txs.len());
            }
        }
        result
    }

    /// Encode then extract one document, reporting progress on success.
    async fn process_file(
        &self,
        generation: u64,
        idx: usize,
        file: &DocumentFile,
        total: usize,
        completed: &AtomicUsize,
    ) -> Result<(usize, Vec<Transaction>), RunError> {
        if let Some(ref cb) = self.progress {
            if self.is_current(generation) {
                cb.on_file_start(&file.name, total);
            }
        }

        let result = async {
            let encoded = encode_document(file).await?;
            let txs = self.extractor.extract(&encoded).await?;
            Ok::<_, RunError>(txs)
        }
        .await;

        match result {
            Ok(txs) => {
                let Some(done) = self.record_completion(generation, total, completed) else {
                    debug!("{}: finished after reset, not reported", file.name);
                    return Ok((idx, txs));
                };
                debug!("{}: {} transactions ({}/{})", file.name, txs.len(), done, total);
                if let Some(ref cb) = self.progress {
                    cb.on_file_complete(&file.name, done, total, txs.len());
                }
                Ok((idx, txs))
            }
            Err(e) => {
                warn!("{}: {}", file.name, e);
                if let Some(ref cb) = self.progress {
                    if self.is_current(generation) {
                        cb.on_file_error(&file.name, &e.to_string());
                    }
                }
                Err(e)
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn begin(&self, total: usize) -> Result<u64, RunError> {
        let mut slot = self.lock();
        if slot.state.is_processing() {
            return Err(RunError::Busy);
        }
        slot.generation += 1;
        slot.state = RunState::Processing { completed: 0, total };
        Ok(slot.generation)
    }

    /// Whether `generation` is still the live run. Callbacks of a superseded
    /// run are suppressed so its events never interleave with the next run's.
    fn is_current(&self, generation: u64) -> bool {
        self.lock().generation == generation
    }

    /// Bump the counter under the state lock so each completion gets a distinct count.
    ///
    /// Returns `None` once the run has been superseded.
    fn record_completion(
        &self,
        generation: u64,
        total: usize,
        completed: &AtomicUsize,
    ) -> Option<usize> {
        let mut slot = self.lock();
        if slot.generation != generation {
            return None;
        }
        let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
        slot.state = RunState::Processing {
            completed: done,
            total,
        };
        Some(done)
    }

    fn finish(
        &self,
        generation: u64,
        outcome: Result<Vec<(usize, Vec<Transaction>)>, RunError>,
    ) -> Result<Vec<Transaction>, RunError> {
        let merged = outcome.map(merge_sorted);

        let mut slot = self.lock();
        if slot.generation != generation {
            debug!("Discarding outcome of superseded run (generation {})", generation);
            return Err(RunError::Superseded);
        }
        match merged {
            Ok(txs) => {
                slot.state = RunState::Success(txs.clone());
                Ok(txs)
            }
            Err(e) => {
                slot.state = RunState::Error(e.to_string());
                Err(e)
            }
        }
    }
}

/// Restore the input order of per-file results, flatten, and sort by date.
///
/// Completion order is nondeterministic; re-ordering by input index first makes
/// the stable sort's tie-breaking reproducible across runs.
fn merge_sorted(mut per_file: Vec<(usize, Vec<Transaction>)>) -> Vec<Transaction> {
    per_file.sort_by_key(|(idx, _)| *idx);
    let mut merged: Vec<Transaction> = per_file.into_iter().flat_map(|(_, txs)| txs).collect();
    sort_by_date(&mut merged);
    merged
}

/// Puts the pipeline back to `Idle` if a run future is dropped mid-flight.
struct AbortGuard<'a> {
    pipeline: &'a Pipeline,
    generation: u64,
    armed: bool,
}

impl AbortGuard<'_> {
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for AbortGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut slot = self.pipeline.lock();
        if slot.generation == self.generation {
            warn!("Extraction run dropped before completion; state reset to Idle");
            slot.state = RunState::Idle;
        }
    }
}
