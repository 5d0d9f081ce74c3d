//! Pipeline stages for document ingestion.
//!
//! Each submodule implements exactly one step. The [`crate::dispatch`]
//! module composes them per document kind.
//!
//! ## Data Flow
//!
//! ```text
//!            ┌─▶ pdf ──▶ density ──(sparse)──▶ render ──┐
//! input ─────┤                                          ├─▶ enhance ──▶ encode ──▶ ocr ──▶ postprocess
//! (path/URL) ├─▶ image (render::decode_image) ──────────┘
//!            ├─▶ docx
//!            └─▶ text
//! ```
//!
//! 1. [`input`]: read a local file or download a URL into memory
//! 2. [`pdf`]: text layer and page rasterisation behind [`pdf::PdfBackend`]
//! 3. [`density`]: decide whether the text layer is trustworthy
//! 4. [`render`]: run rasterisation and image decoding on the blocking pool
//! 5. [`enhance`]: grayscale, contrast stretch, clip, sharpen
//! 6. [`encode`]: PNG + base64 for the vision request
//! 7. [`ocr`]: the transcription call with timeout and failure policy;
//!    the only stage with network I/O besides `input`
//! 8. [`postprocess`]: deterministic cleanup of transcribed text
//! 9. [`docx`], [`text`]: the two non-raster formats

pub mod density;
pub mod docx;
pub mod encode;
pub mod enhance;
pub mod input;
pub mod ocr;
pub mod pdf;
pub mod postprocess;
pub mod render;
pub mod text;
