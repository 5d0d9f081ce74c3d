//! PDF access: the text layer and page rasterisation.
//!
//! The pipeline never talks to pdfium directly. It goes through
//! [`PdfBackend`], which exposes exactly the two things ingestion needs:
//! the text items of every page, and one page rendered to pixels. The
//! default [`PdfiumBackend`] binds pdfium; tests substitute an in-memory fake.
//!
//! ## Binding
//!
//! pdfium keeps thread-local state and its handles are not `Send`. Every
//! backend call runs on a `spawn_blocking` thread, so each call binds,
//! opens the document from the shared byte buffer, does its work and drops
//! everything before returning.

use crate::error::IngestError;
use crate::pipeline::enhance::PixelBuffer;
use pdfium_render::prelude::*;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

/// Page count plus per-page text items.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TextLayer {
    /// `pages[i]` holds the text runs of page `i + 1`, in content order.
    pub pages: Vec<Vec<String>>,
}

impl TextLayer {
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Items joined by single spaces within a page, one line per page.
    pub fn full_text(&self) -> String {
        let mut full = String::new();
        for items in &self.pages {
            full.push_str(&items.join(" "));
            full.push('\n');
        }
        full
    }
}

/// The PDF operations ingestion consumes.
///
/// Implementations are synchronous; callers move them onto blocking threads.
pub trait PdfBackend: Send + Sync {
    /// Read the embedded text of every page.
    fn text_layer(&self, bytes: &[u8], password: Option<&str>) -> Result<TextLayer, IngestError>;

    /// Rasterise page `index` (0-based) at `scale`, capping either dimension at `max_pixels`.
    fn render_page(
        &self,
        bytes: &[u8],
        password: Option<&str>,
        index: usize,
        scale: f32,
        max_pixels: u32,
    ) -> Result<PixelBuffer, IngestError>;
}

/// Read the text layer on a blocking thread.
pub async fn extract_text_layer(
    backend: Arc<dyn PdfBackend>,
    bytes: Arc<Vec<u8>>,
    password: Option<String>,
) -> Result<TextLayer, IngestError> {
    let layer = tokio::task::spawn_blocking(move || {
        backend.text_layer(&bytes, password.as_deref())
    })
    .await
    .map_err(|e| IngestError::Internal(format!("Text-layer task panicked: {}", e)))??;

    debug!(
        "Text layer: {} pages, {} items",
        layer.page_count(),
        layer.pages.iter().map(Vec::len).sum::<usize>()
    );
    Ok(layer)
}

// ── pdfium ───────────────────────────────────────────────────────────────

/// [`PdfBackend`] backed by the pdfium shared library.
///
/// Library lookup order: `PDFIUM_LIB_PATH`, then `./` (the platform library
/// name), then the system library search path.
#[derive(Debug, Clone, Default)]
pub struct PdfiumBackend {
    library: Option<PathBuf>,
}

impl PdfiumBackend {
    /// Use `PDFIUM_LIB_PATH` if set, else the default search.
    pub fn from_env() -> Self {
        let library = std::env::var("PDFIUM_LIB_PATH")
            .ok()
            .filter(|p| !p.is_empty())
            .map(PathBuf::from);
        Self { library }
    }

    /// Bind to an explicit library file.
    pub fn with_library(path: impl Into<PathBuf>) -> Self {
        Self {
            library: Some(path.into()),
        }
    }

    /// Check that the library can be bound at all.
    pub fn probe(&self) -> Result<(), IngestError> {
        self.bind().map(|_| ())
    }

    fn bind(&self) -> Result<Pdfium, IngestError> {
        let bindings = match &self.library {
            Some(path) => Pdfium::bind_to_library(path),
            None => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
                .or_else(|_| Pdfium::bind_to_system_library()),
        }
        .map_err(|e| IngestError::PdfiumBindingFailed(e.to_string()))?;
        Ok(Pdfium::new(bindings))
    }
}

fn open<'a>(
    pdfium: &'a Pdfium,
    bytes: &'a [u8],
    password: Option<&'a str>,
) -> Result<PdfDocument<'a>, IngestError> {
    pdfium.load_pdf_from_byte_slice(bytes, password).map_err(|e| {
        let err_str = format!("{:?}", e);
        if err_str.contains("Password") || err_str.contains("password") {
            IngestError::PasswordRequired
        } else {
            IngestError::decode("pdf", err_str)
        }
    })
}

impl PdfBackend for PdfiumBackend {
    fn text_layer(&self, bytes: &[u8], password: Option<&str>) -> Result<TextLayer, IngestError> {
        let pdfium = self.bind()?;
        let document = open(&pdfium, bytes, password)?;
        let pages = document.pages();
        info!("PDF loaded: {} pages", pages.len());

        let mut layer = TextLayer::default();
        for (idx, page) in pages.iter().enumerate() {
            let text = page.text().map_err(|e| {
                IngestError::decode("pdf", format!("page {} text: {:?}", idx + 1, e))
            })?;
            let items = text
                .segments()
                .iter()
                .map(|segment| segment.text())
                .collect();
            layer.pages.push(items);
        }
        Ok(layer)
    }

    fn render_page(
        &self,
        bytes: &[u8],
        password: Option<&str>,
        index: usize,
        scale: f32,
        max_pixels: u32,
    ) -> Result<PixelBuffer, IngestError> {
        let pdfium = self.bind()?;
        let document = open(&pdfium, bytes, password)?;
        let pages = document.pages();

        let page = pages.iter().nth(index).ok_or_else(|| IngestError::Render {
            page: index + 1,
            detail: format!("document has only {} pages", pages.len()),
        })?;

        let render_config = PdfRenderConfig::new()
            .scale_page_by_factor(scale)
            .set_maximum_width(max_pixels as i32)
            .set_maximum_height(max_pixels as i32);

        let bitmap = page
            .render_with_config(&render_config)
            .map_err(|e| IngestError::Render {
                page: index + 1,
                detail: format!("{:?}", e),
            })?;

        let image = bitmap.as_image();
        debug!(
            "Rendered page {} → {}x{} px",
            index + 1,
            image.width(),
            image.height()
        );
        Ok(PixelBuffer::from(image))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layer(pages: &[&[&str]]) -> TextLayer {
        TextLayer {
            pages: pages
                .iter()
                .map(|p| p.iter().map(|s| s.to_string()).collect())
                .collect(),
        }
    }

    #[test]
    fn items_join_with_spaces_pages_with_newlines() {
        let l = layer(&[&["Hello", "world"], &["Page", "two"]]);
        assert_eq!(l.full_text(), "Hello world\nPage two\n");
        assert_eq!(l.page_count(), 2);
    }

    #[test]
    fn empty_pages_still_count() {
        let l = layer(&[&[], &[], &["x"]]);
        assert_eq!(l.page_count(), 3);
        assert_eq!(l.full_text(), "\n\nx\n");
    }

    #[test]
    fn page_order_is_preserved() {
        let l = layer(&[&["b"], &["a"], &["c"]]);
        assert_eq!(l.full_text(), "b\na\nc\n");
    }

    #[test]
    fn backend_reads_lib_path_from_env() {
        std::env::set_var("PDFIUM_LIB_PATH", "/opt/pdfium/libpdfium.so");
        let b = PdfiumBackend::from_env();
        std::env::remove_var("PDFIUM_LIB_PATH");
        assert_eq!(
            b.library.as_deref(),
            Some(std::path::Path::new("/opt/pdfium/libpdfium.so"))
        );
    }
}
