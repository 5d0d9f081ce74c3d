//! Ingestion coordinator: the per-file state machine across batches.
//!
//! ```text
//! submit(files)
//!   │
//!   ├─ append Queued records, mark all Processing, publish
//!   ├─ wait for the worker lock (one batch at a time)
//!   └─ for each file, in order:
//!        cancelled? ──yes──▶ Error("cancelled"), publish
//!        dispatch ──ok──▶ Ready(content)  ──┐
//!                 └─err─▶ Error(cause)    ──┴─▶ publish
//! ```
//!
//! If the `submit` future is dropped (a caller timeout, an aborted task),
//! its files still Processing move to Error("cancelled").
//!
//! The file list is the only mutable state. It lives behind a
//! `std::sync::Mutex` that is never held across an `.await`; listeners get a
//! cloned snapshot after the lock is released.

use crate::config::IngestConfig;
use crate::dispatch::Dispatcher;
use crate::error::IngestError;
use crate::model::{FileId, FileStatus, SourceFile, UploadedFile};
use crate::pipeline::ocr::{LlmTranscriber, Transcriber};
use crate::pipeline::pdf::{PdfBackend, PdfiumBackend};
use crate::progress::Listener;
use crate::stream::{snapshot_channel, SnapshotStream};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;
use tracing::{debug, error, info, warn};

// ── Cancellation ─────────────────────────────────────────────────────────

/// Cooperative cancellation flag for one batch.
///
/// Checked at the start of each file and each OCR page; a call already in
/// flight runs to completion (or its timeout).
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// `Err(Cancelled)` once [`cancel`](Self::cancel) has been called.
    pub fn check(&self) -> Result<(), IngestError> {
        if self.is_cancelled() {
            Err(IngestError::Cancelled)
        } else {
            Ok(())
        }
    }
}

// ── Batch summary ────────────────────────────────────────────────────────

/// Outcome of one [`IngestionSession::submit`] call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    /// Ids assigned to the submitted files, in submission order.
    pub ids: Vec<FileId>,
    pub ready: usize,
    pub failed: usize,
    pub elapsed_ms: u64,
}

// ── Session ──────────────────────────────────────────────────────────────

/// Owns the file list and drives files through extraction one at a time.
///
/// Share it behind an `Arc` to submit from one task while observing from
/// another; concurrent `submit` calls are serialized.
pub struct IngestionSession {
    dispatcher: Dispatcher,
    files: Mutex<Vec<UploadedFile>>,
    listeners: Mutex<Vec<Listener>>,
    batches: Mutex<Vec<CancelToken>>,
    worker: tokio::sync::Mutex<()>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl IngestionSession {
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self {
            dispatcher,
            files: Mutex::new(Vec::new()),
            listeners: Mutex::new(Vec::new()),
            batches: Mutex::new(Vec::new()),
            worker: tokio::sync::Mutex::new(()),
        }
    }

    /// Build a session from explicit PDF and OCR collaborators.
    pub fn from_parts(
        pdf: Arc<dyn PdfBackend>,
        transcriber: Arc<dyn Transcriber>,
        config: IngestConfig,
    ) -> Self {
        Self::new(Dispatcher::new(pdf, transcriber, config))
    }

    /// Pdfium from `PDFIUM_LIB_PATH` or the system, and the vision provider
    /// resolved from `config` and the environment.
    pub fn with_defaults(config: IngestConfig) -> Result<Self, IngestError> {
        let transcriber = LlmTranscriber::from_config(&config)?;
        Ok(Self::from_parts(
            Arc::new(PdfiumBackend::from_env()),
            Arc::new(transcriber),
            config,
        ))
    }

    pub fn config(&self) -> &IngestConfig {
        self.dispatcher.config()
    }

    // ── Observation ──────────────────────────────────────────────────────

    /// Register a listener for every future publish.
    pub fn subscribe(&self, listener: Listener) {
        lock(&self.listeners).push(listener);
    }

    /// Stream of snapshots, starting with the current one.
    pub fn updates(&self) -> SnapshotStream {
        let (listener, stream) = snapshot_channel(self.files());
        self.subscribe(listener);
        stream
    }

    /// Snapshot of every tracked file, in submission order.
    pub fn files(&self) -> Vec<UploadedFile> {
        lock(&self.files).clone()
    }

    pub fn get(&self, id: FileId) -> Option<UploadedFile> {
        lock(&self.files).iter().find(|f| f.id == id).cloned()
    }

    /// Downstream context built from every Ready file.
    pub fn context(&self) -> String {
        build_context(&lock(&self.files))
    }

    // ── Mutation ─────────────────────────────────────────────────────────

    /// Drop a finished file. Files still being processed are rejected.
    pub fn remove(&self, id: FileId) -> Result<UploadedFile, IngestError> {
        let removed = {
            let mut files = lock(&self.files);
            let pos = files
                .iter()
                .position(|f| f.id == id)
                .ok_or(IngestError::UnknownFile(id))?;
            if files[pos].status() == FileStatus::Processing {
                return Err(IngestError::FileBusy(id));
            }
            files.remove(pos)
        };
        self.publish();
        Ok(removed)
    }

    /// Drop every Ready or Error file. Returns how many were removed.
    pub fn clear_finished(&self) -> usize {
        let removed = {
            let mut files = lock(&self.files);
            let before = files.len();
            files.retain(|f| !f.status().is_terminal());
            before - files.len()
        };
        if removed > 0 {
            self.publish();
        }
        removed
    }

    /// Stop every running or waiting batch at its next file or page boundary.
    pub fn cancel(&self) {
        let batches = lock(&self.batches);
        info!("Cancelling {} batch(es)", batches.len());
        for token in batches.iter() {
            token.cancel();
        }
    }

    /// Enqueue `sources` and process them one after another.
    ///
    /// Returns once every submitted file is Ready or Error. Per-file failures
    /// are recorded on the file and never abort the batch.
    pub async fn submit(&self, sources: Vec<SourceFile>) -> BatchSummary {
        let start = Instant::now();
        let token = CancelToken::new();
        lock(&self.batches).push(token.clone());

        let ids = self.enqueue(&sources);
        let guard = BatchGuard {
            session: self,
            ids: ids.clone(),
            token: token.clone(),
        };
        self.publish();
        info!("Submitted {} file(s)", ids.len());

        {
            let _worker = self.worker.lock().await;
            for (id, source) in ids.iter().copied().zip(&sources) {
                self.process_one(id, source, &token).await;
            }
        }
        drop(guard);

        let (ready, failed) = {
            let files = lock(&self.files);
            files
                .iter()
                .filter(|f| ids.contains(&f.id))
                .fold((0, 0), |(r, e), f| match f.status() {
                    FileStatus::Ready => (r + 1, e),
                    FileStatus::Error => (r, e + 1),
                    _ => (r, e),
                })
        };
        let summary = BatchSummary {
            ids,
            ready,
            failed,
            elapsed_ms: start.elapsed().as_millis() as u64,
        };
        info!(
            "Batch done: {} ready, {} failed in {}ms",
            summary.ready, summary.failed, summary.elapsed_ms
        );
        summary
    }

    /// Append Queued records and move them straight to Processing.
    fn enqueue(&self, sources: &[SourceFile]) -> Vec<FileId> {
        let mut files = lock(&self.files);
        let mut ids = Vec::with_capacity(sources.len());
        for source in sources {
            let mut record = UploadedFile::queued(source);
            if let Err(e) = record.start() {
                error!("Fresh record for '{}' refused to start: {}", source.name, e);
            }
            ids.push(record.id);
            files.push(record);
        }
        ids
    }

    async fn process_one(&self, id: FileId, source: &SourceFile, token: &CancelToken) {
        let outcome = match token.check() {
            Err(e) => Err(e),
            Ok(()) => {
                info!("Ingesting '{}' ({})", source.name, id);
                let on_progress = |percent: u8| self.report_progress(id, percent);
                self.dispatcher.extract(source, &on_progress, token).await
            }
        };

        self.update(id, |file| match outcome {
            Ok(result) => {
                debug!(
                    "'{}' ready: {} chars, {} OCR page(s), {} blank",
                    file.name,
                    result.text.chars().count(),
                    result.ocr_pages,
                    result.blank_pages
                );
                file.finish_ready(result)
            }
            Err(cause) => {
                warn!("'{}' failed: {}", file.name, cause);
                file.finish_error(&cause)
            }
        });
        self.publish();
    }

    fn report_progress(&self, id: FileId, percent: u8) {
        self.update(id, |file| {
            file.ocr_progress = percent;
            Ok(())
        });
        for listener in self.live_listeners() {
            listener.on_ocr_progress(id, percent);
        }
        self.publish();
    }

    /// Apply `f` to the record `id`, if it is still tracked.
    fn update<F>(&self, id: FileId, f: F)
    where
        F: FnOnce(&mut UploadedFile) -> Result<(), IngestError>,
    {
        let mut files = lock(&self.files);
        match files.iter_mut().find(|file| file.id == id) {
            Some(file) => {
                if let Err(e) = f(file) {
                    error!("State update for '{}' rejected: {}", file.name, e);
                }
            }
            None => debug!("File {} no longer tracked", id),
        }
    }

    fn live_listeners(&self) -> Vec<Listener> {
        let mut listeners = lock(&self.listeners);
        listeners.retain(|l| !l.is_closed());
        listeners.clone()
    }

    /// Send the current snapshot to every listener, outside both locks.
    fn publish(&self) {
        let snapshot = self.files();
        for listener in self.live_listeners() {
            listener.on_change(&snapshot);
        }
    }
}

/// Settles a batch when its `submit` future goes away.
///
/// Runs on normal completion too, where it only retires the token. If the
/// future was dropped mid-batch, every file still Processing becomes Error
/// with [`IngestError::Cancelled`].
struct BatchGuard<'a> {
    session: &'a IngestionSession,
    ids: Vec<FileId>,
    token: CancelToken,
}

impl Drop for BatchGuard<'_> {
    fn drop(&mut self) {
        let session = self.session;
        lock(&session.batches).retain(|t| !Arc::ptr_eq(&t.0, &self.token.0));

        let mut abandoned = 0;
        for file in lock(&session.files).iter_mut() {
            if self.ids.contains(&file.id) && file.status() == FileStatus::Processing {
                if let Err(e) = file.finish_error(&IngestError::Cancelled) {
                    error!("Could not settle '{}': {}", file.name, e);
                    continue;
                }
                abandoned += 1;
            }
        }
        if abandoned > 0 {
            warn!("Batch dropped with {} file(s) unfinished", abandoned);
            session.publish();
        }
    }
}

/// `FILE: <name>\n<content>` for each Ready file, separated by a blank line.
pub fn build_context(files: &[UploadedFile]) -> String {
    files
        .iter()
        .filter(|f| f.status() == FileStatus::Ready)
        .map(|f| format!("FILE: {}\n{}", f.name, f.content()))
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ExtractionResult;

    fn ready(name: &str, text: &str) -> UploadedFile {
        let mut f = UploadedFile::queued(&SourceFile::new(name, "text/plain", Vec::new()));
        f.start().unwrap();
        f.finish_ready(ExtractionResult::text(text)).unwrap();
        f
    }

    fn failed(name: &str) -> UploadedFile {
        let mut f = UploadedFile::queued(&SourceFile::new(name, "text/plain", Vec::new()));
        f.start().unwrap();
        f.finish_error(&IngestError::Cancelled).unwrap();
        f
    }

    #[test]
    fn context_joins_ready_files() {
        let files = vec![ready("a.txt", "alpha"), failed("b.pdf"), ready("c.txt", "gamma")];
        assert_eq!(
            build_context(&files),
            "FILE: a.txt\nalpha\n\nFILE: c.txt\ngamma"
        );
    }

    #[test]
    fn context_of_nothing_is_empty() {
        assert_eq!(build_context(&[failed("x")]), "");
    }

    #[test]
    fn cancel_token_checks() {
        let t = CancelToken::new();
        assert!(t.check().is_ok());
        t.clone().cancel();
        assert!(matches!(t.check(), Err(IngestError::Cancelled)));
    }
}
