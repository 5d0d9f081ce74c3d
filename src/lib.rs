//! # edgequake-ingest
//!
//! Turn heterogeneous documents (PDF, scanned images, DOCX, plain text) into
//! clean plaintext for a downstream reasoning engine.
//!
//! ## Why this crate?
//!
//! Many PDFs carry a text layer that is empty or nearly so: scans, faxes,
//! photographed receipts. Trusting it silently feeds the reasoning engine
//! nothing. This crate measures the text layer's density per page and, when
//! it is too sparse, rasterises each page, enhances it into high-contrast
//! black and white, and hands it to a vision model for transcription.
//!
//! ## Pipeline Overview
//!
//! ```text
//! file
//!  │
//!  ├─ 1. Input     local path or URL → bytes + declared type
//!  ├─ 2. Dispatch  pdf / image / docx / other
//!  ├─ 3. Density   text layer chars < threshold × pages → OCR fallback
//!  ├─ 4. Render    pdfium rasterisation (spawn_blocking)
//!  ├─ 5. Enhance   BT.709 grayscale → stretch → clip → 3×3 sharpen
//!  ├─ 6. OCR       vision transcription with timeout + failure policy
//!  └─ 7. Session   Queued → Processing → Ready | Error, sequentially
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_ingest::{IngestConfig, IngestionSession, SourceFile};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from OPENAI_API_KEY / ANTHROPIC_API_KEY / …
//!     let session = IngestionSession::with_defaults(IngestConfig::default())?;
//!     let bytes = std::fs::read("scan.pdf")?;
//!     let summary = session
//!         .submit(vec![SourceFile::new("scan.pdf", "application/pdf", bytes)])
//!         .await;
//!     eprintln!("{} ready, {} failed", summary.ready, summary.failed);
//!     println!("{}", session.context());
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `ingest` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! edgequake-ingest = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod dispatch;
pub mod error;
pub mod model;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod session;
pub mod stream;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{
    BorderMode, EnhanceConfig, IngestConfig, IngestConfigBuilder, OcrFailurePolicy, SharpenKernel,
};
pub use dispatch::{classify, DocumentKind, Dispatcher};
pub use error::IngestError;
pub use model::{ExtractionResult, FileId, FileStatus, SourceFile, UploadedFile};
pub use pipeline::input::resolve_input;
pub use pipeline::ocr::{LlmTranscriber, Transcriber};
pub use pipeline::pdf::{PdfBackend, PdfiumBackend, TextLayer};
pub use progress::{Listener, SessionListener};
pub use session::{build_context, BatchSummary, CancelToken, IngestionSession};
pub use stream::{settled, SnapshotStream};
