//! Error types for the edgequake-ingest library.
//!
//! A single enum, [`IngestError`], covers every way one file can fail to
//! become plaintext. The session never lets one of these escape a batch:
//! it is caught at the per-file boundary, rendered to a string and stored on
//! the file's record (see [`crate::model::UploadedFile::error`]) so the next
//! file in the queue still runs.
//!
//! Transcription failures are special. Under the default
//! [`crate::config::OcrFailurePolicy::BlankPage`] they are logged and the page
//! is treated as blank; only [`crate::config::OcrFailurePolicy::FailFile`]
//! turns them into [`IngestError::Transcription`].

use crate::model::{FileId, FileStatus};
use std::path::PathBuf;
use thiserror::Error;

/// All errors returned by the edgequake-ingest library.
#[derive(Debug, Error)]
pub enum IngestError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("File not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    // ── Extraction errors ─────────────────────────────────────────────────
    /// The byte stream could not be parsed as the dispatched format.
    #[error("Could not decode {format} content: {detail}")]
    Decode { format: &'static str, detail: String },

    /// PDF requires a password but none (or the wrong one) was provided.
    #[error("PDF is encrypted and requires a password.\nProvide it with --password <PASSWORD>.")]
    PasswordRequired,

    /// Page-to-pixel rasterisation failed.
    #[error("Rasterisation failed for page {page}: {detail}")]
    Render { page: usize, detail: String },

    /// The vision service failed and the failure policy says to fail the file.
    #[error("Transcription failed for page {page}: {detail}")]
    Transcription { page: usize, detail: String },

    /// Processing was aborted by [`crate::session::IngestionSession::cancel`].
    #[error("Ingestion cancelled before this file finished")]
    Cancelled,

    // ── State machine ─────────────────────────────────────────────────────
    /// A status change that does not follow Queued → Processing → {Ready, Error}.
    #[error("Invalid status transition {from:?} → {to:?}")]
    InvalidTransition { from: FileStatus, to: FileStatus },

    /// No file with this id is tracked by the session.
    #[error("Unknown file id {0}")]
    UnknownFile(FileId),

    /// The file is still being processed and cannot be removed.
    #[error("File {0} is still processing")]
    FileBusy(FileId),

    // ── Collaborator setup ────────────────────────────────────────────────
    /// The configured vision provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
Set PDFIUM_LIB_PATH=/path/to/libpdfium or install pdfium system-wide.\n"
    )]
    PdfiumBindingFailed(String),

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error (panicked blocking task etc.).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl IngestError {
    /// Shorthand for a [`IngestError::Decode`] with a formatted detail.
    pub(crate) fn decode(format: &'static str, detail: impl std::fmt::Display) -> Self {
        IngestError::Decode {
            format,
            detail: detail.to_string(),
        }
    }
}
