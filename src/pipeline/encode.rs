//! Lossless encoding: enhanced [`PixelBuffer`] → base64 PNG `ImageData`.
//!
//! PNG is used because it is lossless. The enhancement stage has just snapped
//! ink and paper to pure black and white; JPEG ringing would smear exactly
//! those edges back into grey.

use crate::error::IngestError;
use crate::pipeline::enhance::PixelBuffer;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::ImageData;
use std::io::Cursor;
use tracing::debug;

pub const PNG_MIME: &str = "image/png";

/// Encode an enhanced page as a base64 PNG ready for the vision API.
///
/// `detail: "high"` asks GPT-4-class models for the full tile budget; at the
/// default 3× render scale small print is otherwise downsampled away.
pub fn encode_page(buffer: PixelBuffer, page: usize) -> Result<ImageData, IngestError> {
    let mut png = Vec::new();
    buffer
        .into_image()
        .write_to(&mut Cursor::new(&mut png), image::ImageFormat::Png)
        .map_err(|e| IngestError::Render {
            page,
            detail: format!("PNG encoding failed: {}", e),
        })?;

    let b64 = STANDARD.encode(&png);
    debug!("Encoded page {} → {} bytes base64", page, b64.len());

    Ok(ImageData::new(b64, PNG_MIME).with_detail("high"))
}
