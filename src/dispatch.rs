//! Format dispatch: route one file to the right extractor chain.
//!
//! ```text
//! pdf   ──▶ text layer ──▶ density ok? ──yes──▶ text layer
//!                                   └──no───▶ per page: render → enhance → encode → OCR
//! image ──▶ decode ──▶ enhance → encode → OCR
//! docx  ──▶ word/document.xml runs
//! other ──▶ lossy UTF-8
//! ```
//!
//! The dispatcher owns no state beyond its collaborators; the session decides
//! what happens to the result.

use crate::config::IngestConfig;
use crate::error::IngestError;
use crate::model::{ExtractionResult, SourceFile};
use crate::pipeline::density::needs_ocr;
use crate::pipeline::enhance::{enhance, PixelBuffer};
use crate::pipeline::ocr::{OcrInvoker, Transcriber};
use crate::pipeline::pdf::{extract_text_layer, PdfBackend};
use crate::pipeline::{docx, encode, render, text};
use crate::session::CancelToken;
use edgequake_llm::ImageData;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

const MIME_PDF: &str = "application/pdf";
const MIME_DOCX: &str = "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

/// Which extractor chain a file goes through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    Pdf,
    Image,
    Docx,
    Other,
}

/// Classify by declared MIME type first, then by file-name extension.
///
/// Any recognised declaration wins, including textual ones: `text/plain` on
/// `x.pdf` is Other. The name is consulted only when the declaration is empty
/// or unrecognised (`application/octet-stream`).
pub fn classify(declared_type: &str, name: &str) -> DocumentKind {
    let declared = declared_type.trim().to_ascii_lowercase();
    let declared = declared.trim_start_matches('.');

    match declared {
        MIME_PDF | "pdf" => return DocumentKind::Pdf,
        MIME_DOCX | "docx" => return DocumentKind::Docx,
        t if t.starts_with("image/") => return DocumentKind::Image,
        t if is_textual(t) => return DocumentKind::Other,
        _ => (),
    }
    if let Some(kind) = kind_for_extension(declared) {
        return kind;
    }

    match mime_for_name(name) {
        Some(MIME_PDF) => DocumentKind::Pdf,
        Some(MIME_DOCX) => DocumentKind::Docx,
        Some(m) if m.starts_with("image/") => DocumentKind::Image,
        _ => DocumentKind::Other,
    }
}

fn kind_for_extension(ext: &str) -> Option<DocumentKind> {
    match mime_for_extension(ext)? {
        MIME_PDF => Some(DocumentKind::Pdf),
        MIME_DOCX => Some(DocumentKind::Docx),
        m if m.starts_with("image/") => Some(DocumentKind::Image),
        m if is_textual(m) => Some(DocumentKind::Other),
        _ => None,
    }
}

fn is_textual(mime: &str) -> bool {
    mime.starts_with("text/") || mime.starts_with("application/json")
}

/// MIME type implied by a file name's extension.
pub fn mime_for_name(name: &str) -> Option<&'static str> {
    let ext = Path::new(name).extension()?.to_str()?.to_ascii_lowercase();
    mime_for_extension(&ext)
}

fn mime_for_extension(ext: &str) -> Option<&'static str> {
    Some(match ext {
        "pdf" => MIME_PDF,
        "docx" => MIME_DOCX,
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "bmp" => "image/bmp",
        "tif" | "tiff" => "image/tiff",
        "webp" => "image/webp",
        "txt" | "text" | "log" => "text/plain",
        "md" | "markdown" => "text/markdown",
        "csv" => "text/csv",
        "json" => "application/json",
        _ => return None,
    })
}

/// `--- PAGE i ---` header preceding each transcribed page.
pub fn page_marker(page: usize) -> String {
    format!("--- PAGE {page} ---")
}

/// `round(page / total × 100)`, for 1-based `page`.
pub fn progress_percent(page: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    ((page as f64 / total as f64) * 100.0).round().clamp(0.0, 100.0) as u8
}

/// Routes files through extraction, composing the pipeline stages.
#[derive(Clone)]
pub struct Dispatcher {
    pdf: Arc<dyn PdfBackend>,
    ocr: OcrInvoker,
    config: Arc<IngestConfig>,
}

impl Dispatcher {
    pub fn new(
        pdf: Arc<dyn PdfBackend>,
        transcriber: Arc<dyn Transcriber>,
        config: IngestConfig,
    ) -> Self {
        let ocr = OcrInvoker::from_config(transcriber, &config);
        Self {
            pdf,
            ocr,
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    /// Extract plaintext from one file.
    ///
    /// `on_progress` receives OCR progress (0–100) after each transcribed
    /// page. `cancel` is checked before each page.
    pub async fn extract(
        &self,
        source: &SourceFile,
        on_progress: &(dyn Fn(u8) + Send + Sync),
        cancel: &CancelToken,
    ) -> Result<ExtractionResult, IngestError> {
        let kind = classify(&source.declared_type, &source.name);
        debug!("'{}' classified as {:?}", source.name, kind);

        match kind {
            DocumentKind::Pdf => self.extract_pdf(source, on_progress, cancel).await,
            DocumentKind::Image => self.extract_image(source, on_progress, cancel).await,
            DocumentKind::Docx => {
                let bytes = Arc::clone(&source.bytes);
                let text = tokio::task::spawn_blocking(move || docx::extract_docx_text(&bytes))
                    .await
                    .map_err(|e| IngestError::Internal(format!("DOCX task panicked: {}", e)))??;
                Ok(ExtractionResult::text(text))
            }
            DocumentKind::Other => Ok(ExtractionResult::text(text::decode_text(&source.bytes))),
        }
    }

    async fn extract_pdf(
        &self,
        source: &SourceFile,
        on_progress: &(dyn Fn(u8) + Send + Sync),
        cancel: &CancelToken,
    ) -> Result<ExtractionResult, IngestError> {
        let layer = extract_text_layer(
            Arc::clone(&self.pdf),
            Arc::clone(&source.bytes),
            self.config.password.clone(),
        )
        .await?;
        let total = layer.page_count();
        let full_text = layer.full_text();

        if !needs_ocr(&full_text, total, self.config.density_threshold) {
            debug!("'{}': text layer accepted ({} pages)", source.name, total);
            return Ok(ExtractionResult {
                text: full_text,
                page_count: Some(total),
                ..Default::default()
            });
        }

        info!(
            "'{}': text layer too sparse ({} chars / {} pages), transcribing pages",
            source.name,
            full_text.trim().chars().count(),
            total
        );

        let mut text = String::new();
        let mut blank_pages = 0;
        for index in 0..total {
            cancel.check()?;
            let page = index + 1;

            let pixels = render::render_pdf_page(
                Arc::clone(&self.pdf),
                Arc::clone(&source.bytes),
                index,
                &self.config,
            )
            .await?;
            let image = self.prepare(pixels, page).await?;

            let transcript = self.ocr.transcribe_page(page, image).await?;
            if transcript.is_none() {
                blank_pages += 1;
            }

            text.push_str(&page_marker(page));
            text.push('\n');
            text.push_str(transcript.as_deref().unwrap_or_default());
            text.push_str("\n\n");

            on_progress(progress_percent(page, total));
        }

        Ok(ExtractionResult {
            text: text.trim_end().to_string(),
            page_count: Some(total),
            ocr_pages: total,
            blank_pages,
        })
    }

    async fn extract_image(
        &self,
        source: &SourceFile,
        on_progress: &(dyn Fn(u8) + Send + Sync),
        cancel: &CancelToken,
    ) -> Result<ExtractionResult, IngestError> {
        let pixels = render::decode_image(Arc::clone(&source.bytes)).await?;
        cancel.check()?;
        let image = self.prepare(pixels, 1).await?;

        let transcript = self.ocr.transcribe_page(1, image).await?;
        on_progress(100);

        Ok(ExtractionResult {
            blank_pages: usize::from(transcript.is_none()),
            text: transcript.unwrap_or_default(),
            page_count: None,
            ocr_pages: 1,
        })
    }

    /// Enhance and PNG-encode a raster on a blocking thread.
    async fn prepare(&self, pixels: PixelBuffer, page: usize) -> Result<ImageData, IngestError> {
        let enhance_config = self.config.enhance;
        tokio::task::spawn_blocking(move || {
            encode::encode_page(enhance(pixels, &enhance_config), page)
        })
        .await
        .map_err(|e| IngestError::Internal(format!("Enhance task panicked: {}", e)))?
    }
}
