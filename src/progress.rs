//! Listener trait for session state changes.
//!
//! Register an [`Arc<dyn SessionListener>`] with
//! [`crate::session::IngestionSession::subscribe`] to receive a full snapshot
//! of the file list every time the session publishes, plus finer-grained OCR
//! progress events while a multi-page file is being transcribed.
//!
//! Listeners run on the worker task, outside the session's lock, and receive
//! a cloned snapshot; they cannot mutate session state.
//!
//! # Example
//!
//! ```rust
//! use edgequake_ingest::{FileStatus, SessionListener, UploadedFile};
//! use std::sync::atomic::{AtomicUsize, Ordering};
//!
//! struct ReadyCounter(AtomicUsize);
//!
//! impl SessionListener for ReadyCounter {
//!     fn on_change(&self, files: &[UploadedFile]) {
//!         let ready = files.iter().filter(|f| f.status() == FileStatus::Ready).count();
//!         self.0.store(ready, Ordering::SeqCst);
//!     }
//! }
//!
//! let counter = ReadyCounter(AtomicUsize::new(0));
//! counter.on_change(&[]);
//! assert_eq!(counter.0.load(Ordering::SeqCst), 0);
//! ```

use crate::model::{FileId, UploadedFile};
use std::sync::Arc;

/// Observer of an ingestion session.
///
/// `on_change` is required; the other methods default to no-ops.
pub trait SessionListener: Send + Sync {
    /// Called with the full file list after every published change.
    fn on_change(&self, files: &[UploadedFile]);

    /// Called after each transcribed page of the file `id`.
    ///
    /// # Arguments
    /// * `id`: the file being transcribed
    /// * `percent`: `round(page / total × 100)`, 1-based page
    fn on_ocr_progress(&self, id: FileId, percent: u8) {
        let _ = (id, percent);
    }

    /// Once this returns `true` the session drops the listener.
    fn is_closed(&self) -> bool {
        false
    }
}

/// Plain closures over the snapshot are listeners.
impl<F> SessionListener for F
where
    F: Fn(&[UploadedFile]) + Send + Sync,
{
    fn on_change(&self, files: &[UploadedFile]) {
        self(files)
    }
}

/// Shared handle stored by the session.
pub type Listener = Arc<dyn SessionListener>;
