//! Records that flow through an ingestion session.
//!
//! [`UploadedFile`] is the only long-lived, mutable type: the session owns
//! every instance and observers only ever see clones. Status changes go
//! through [`UploadedFile::start`], [`UploadedFile::finish_ready`] and
//! [`UploadedFile::finish_error`], which refuse anything but
//! Queued → Processing → {Ready, Error}.

use crate::error::IngestError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Session-generated identity of one enqueued file.
///
/// Names are user-visible and may repeat within a session, so all internal
/// bookkeeping is keyed by this id instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FileId(Uuid);

impl FileId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for FileId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Lifecycle state of an [`UploadedFile`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    Queued,
    Processing,
    Ready,
    Error,
}

impl FileStatus {
    /// Ready and Error never change again.
    pub fn is_terminal(self) -> bool {
        matches!(self, FileStatus::Ready | FileStatus::Error)
    }

    /// Whether `self → next` is an edge of Queued → Processing → {Ready, Error}.
    pub fn can_transition_to(self, next: FileStatus) -> bool {
        matches!(
            (self, next),
            (FileStatus::Queued, FileStatus::Processing)
                | (FileStatus::Processing, FileStatus::Ready)
                | (FileStatus::Processing, FileStatus::Error)
        )
    }
}

/// Raw input handed to the session: bytes plus what the user told us about them.
#[derive(Clone)]
pub struct SourceFile {
    /// User-visible name, usually the original file name.
    pub name: String,
    /// MIME type or bare extension; may be empty.
    pub declared_type: String,
    /// Shared so the blocking PDF tasks can hold the bytes without copying.
    pub bytes: Arc<Vec<u8>>,
}

impl SourceFile {
    pub fn new(
        name: impl Into<String>,
        declared_type: impl Into<String>,
        bytes: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            name: name.into(),
            declared_type: declared_type.into(),
            bytes: Arc::new(bytes.into()),
        }
    }
}

impl fmt::Debug for SourceFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceFile")
            .field("name", &self.name)
            .field("declared_type", &self.declared_type)
            .field("bytes", &format_args!("<{} bytes>", self.bytes.len()))
            .finish()
    }
}

/// One file tracked by an [`crate::session::IngestionSession`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadedFile {
    pub id: FileId,
    pub name: String,
    pub declared_type: String,
    status: FileStatus,
    content: String,
    /// OCR progress for the file currently being transcribed, 0–100.
    pub ocr_progress: u8,
    error: Option<String>,
    /// Page count reported by the PDF text layer, when the file was a PDF.
    pub page_count: Option<usize>,
    /// Pages that went through the vision transcription path.
    pub ocr_pages: usize,
}

impl UploadedFile {
    /// A fresh Queued record for `source`.
    pub fn queued(source: &SourceFile) -> Self {
        Self {
            id: FileId::new(),
            name: source.name.clone(),
            declared_type: source.declared_type.clone(),
            status: FileStatus::Queued,
            content: String::new(),
            ocr_progress: 0,
            error: None,
            page_count: None,
            ocr_pages: 0,
        }
    }

    pub fn status(&self) -> FileStatus {
        self.status
    }

    /// Extracted plaintext; empty unless the file is Ready.
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Why the file failed, when its status is Error.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Queued → Processing.
    pub fn start(&mut self) -> Result<(), IngestError> {
        self.transition(FileStatus::Processing)
    }

    /// Processing → Ready, storing the extraction output.
    pub fn finish_ready(&mut self, result: ExtractionResult) -> Result<(), IngestError> {
        self.transition(FileStatus::Ready)?;
        self.content = result.text;
        self.page_count = result.page_count;
        self.ocr_pages = result.ocr_pages;
        self.ocr_progress = 0;
        Ok(())
    }

    /// Processing → Error, keeping the cause for display.
    pub fn finish_error(&mut self, cause: &IngestError) -> Result<(), IngestError> {
        self.transition(FileStatus::Error)?;
        self.error = Some(cause.to_string());
        self.ocr_progress = 0;
        Ok(())
    }

    fn transition(&mut self, next: FileStatus) -> Result<(), IngestError> {
        if !self.status.can_transition_to(next) {
            return Err(IngestError::InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }
}

/// What a dispatcher hands back for one file. Folded into the
/// [`UploadedFile`] and then dropped.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractionResult {
    pub text: String,
    /// Set for PDFs; drives the density decision.
    pub page_count: Option<usize>,
    /// Pages transcribed through OCR.
    pub ocr_pages: usize,
    /// OCR pages whose transcription failed and were kept blank.
    pub blank_pages: usize,
}

impl ExtractionResult {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }
}
