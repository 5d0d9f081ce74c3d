//! Rasterisation: turn a PDF page or an image file into a [`PixelBuffer`].
//!
//! Both run on the blocking pool: a 3× page takes hundreds of milliseconds
//! of CPU in pdfium or the image decoder.
//!
//! `max_rendered_pixels` caps the longest edge regardless of physical page
//! size (an A0 poster at 3× is roughly 10,000 × 14,000 px).

use crate::config::IngestConfig;
use crate::error::IngestError;
use crate::pipeline::enhance::PixelBuffer;
use crate::pipeline::pdf::PdfBackend;
use std::sync::Arc;
use tracing::debug;

/// Render page `index` (0-based) of a PDF at the configured scale.
pub async fn render_pdf_page(
    backend: Arc<dyn PdfBackend>,
    bytes: Arc<Vec<u8>>,
    index: usize,
    config: &IngestConfig,
) -> Result<PixelBuffer, IngestError> {
    let scale = config.render_scale;
    let max_pixels = config.max_rendered_pixels;
    let password = config.password.clone();

    tokio::task::spawn_blocking(move || {
        backend.render_page(&bytes, password.as_deref(), index, scale, max_pixels)
    })
    .await
    .map_err(|e| IngestError::Internal(format!("Render task panicked: {}", e)))?
}

/// Decode a standalone image at native resolution.
pub async fn decode_image(bytes: Arc<Vec<u8>>) -> Result<PixelBuffer, IngestError> {
    tokio::task::spawn_blocking(move || decode_image_blocking(&bytes))
        .await
        .map_err(|e| IngestError::Internal(format!("Decode task panicked: {}", e)))?
}

fn decode_image_blocking(bytes: &[u8]) -> Result<PixelBuffer, IngestError> {
    let image = image::load_from_memory(bytes).map_err(|e| IngestError::decode("image", e))?;
    debug!("Decoded image → {}x{} px", image.width(), image.height());
    Ok(PixelBuffer::from(image))
}
