//! Progress-callback trait for per-document extraction events.
//!
//! Inject an [`Arc<dyn RunProgressCallback>`] via
//! [`crate::config::ExtractionConfigBuilder::progress_callback`] to receive
//! events as the pipeline works through each document.
//!
//! # Example
//!
//! ```rust
//! use edgequake_statement2tsv::{ExtractionConfig, RunProgressCallback};
//! use std::sync::Arc;
//!
//! struct Printer;
//!
//! impl RunProgressCallback for Printer {
//!     fn on_file_complete(&self, name: &str, completed: usize, total: usize, found: usize) {
//!         eprintln!("{completed}/{total} {name}: {found} transactions");
//!     }
//! }
//!
//! let config = ExtractionConfig::builder()
//!     .progress_callback(Arc::new(Printer) as Arc<dyn RunProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by [`crate::run::Pipeline`] as a run progresses.
///
/// Documents are processed concurrently, so per-file methods may be called
/// from different tasks in any order. The `completed` count passed to
/// [`on_file_complete`](Self::on_file_complete) is taken under the
/// pipeline's state lock: every value from 1 to `total` is delivered exactly
/// once on a successful run. All methods default to no-ops.
pub trait RunProgressCallback: Send + Sync {
    /// Called once before any document is read.
    fn on_run_start(&self, total_files: usize) {
        let _ = total_files;
    }

    /// Called just before a document is read and sent to the model.
    fn on_file_start(&self, name: &str, total_files: usize) {
        let _ = (name, total_files);
    }

    /// Called when a document has been extracted successfully.
    ///
    /// # Arguments
    /// * `name`         — document file name
    /// * `completed`    — documents finished so far, including this one
    /// * `total_files`  — documents in the run
    /// * `transactions` — records extracted from this document
    fn on_file_complete(&self, name: &str, completed: usize, total_files: usize, transactions: usize) {
        let _ = (name, completed, total_files, transactions);
    }

    /// Called when a document fails; the run fails with it.
    fn on_file_error(&self, name: &str, error: &str) {
        let _ = (name, error);
    }

    /// Called once after a successful run with the merged record count.
    fn on_run_complete(&self, total_files: usize, transactions: usize) {
        let _ = (total_files, transactions);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl RunProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ExtractionConfig`].
pub type ProgressCallback = Arc<dyn RunProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct Tracking {
        starts: AtomicUsize,
        completed: Mutex<Vec<usize>>,
        errors: AtomicUsize,
    }

    impl RunProgressCallback for Tracking {
        fn on_file_start(&self, _name: &str, _total: usize) {
            self.starts.fetch_add(1, Ordering::SeqCst);
        }

        fn on_file_complete(&self, _name: &str, completed: usize, _total: usize, _found: usize) {
            self.completed.lock().unwrap().push(completed);
        }

        fn on_file_error(&self, _name: &str, _error: &str) {
            self.errors.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_run_start(2);
        cb.on_file_start("a.pdf", 2);
        cb.on_file_complete("a.pdf", 1, 2, 12);
        cb.on_file_error("b.pdf", "boom");
        cb.on_run_complete(2, 12);
    }

    #[test]
    fn tracking_callback_receives_events() {
        let t = Tracking::default();
        t.on_file_start("a.pdf", 2);
        t.on_file_complete("a.pdf", 1, 2, 3);
        t.on_file_start("b.pdf", 2);
        t.on_file_error("b.pdf", "timeout");
        assert_eq!(t.starts.load(Ordering::SeqCst), 2);
        assert_eq!(*t.completed.lock().unwrap(), vec![1]);
        assert_eq!(t.errors.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn arc_dyn_callback_is_send_sync() {
        fn assert_send_sync<T: Send + Sync + ?Sized>() {}
        assert_send_sync::<dyn RunProgressCallback>();
        let cb: ProgressCallback = Arc::new(NoopProgressCallback);
        cb.on_run_start(1);
    }
}
