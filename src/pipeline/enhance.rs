//! Pixel enhancement: make a rasterised page easier for a vision model to read.
//!
//! Three stages run in order, each consuming a [`PixelBuffer`] and returning a
//! new one of the same size:
//!
//! ```text
//! RGBA ──▶ luminance ──▶ clip ──▶ sharpen ──▶ RGBA (gray in R=G=B)
//!          BT.709 +      ink/paper  3×3 high-pass
//!          stretch       snapping
//! ```
//!
//! Scans often arrive low-contrast (grey paper, faded toner). Stretching the
//! luminance histogram to the full 0–255 range and then snapping the extremes
//! to pure black and white gives the model a clean ink/background split;
//! the final high-pass restores stroke edges softened by the scan.

use crate::config::{BorderMode, EnhanceConfig, SharpenKernel};
use image::{DynamicImage, RgbaImage};
use tracing::debug;

/// BT.709 luma weights.
const LUMA_R: f32 = 0.2126;
const LUMA_G: f32 = 0.7152;
const LUMA_B: f32 = 0.0722;

/// Orthogonal neighbour offsets of the sharpening kernel.
const NEIGHBOURS: [(i64, i64); 4] = [(0, -1), (-1, 0), (1, 0), (0, 1)];

/// An RGBA8 raster whose dimensions never change after construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl PixelBuffer {
    /// Wrap raw RGBA samples. Returns `None` if `data` is not `width × height × 4` bytes.
    pub fn from_rgba(width: u32, height: u32, data: Vec<u8>) -> Option<Self> {
        if data.len() != width as usize * height as usize * 4 {
            return None;
        }
        Some(Self {
            width,
            height,
            data,
        })
    }

    /// A buffer where every pixel is `rgba`.
    pub fn filled(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let data = rgba
            .iter()
            .copied()
            .cycle()
            .take(width as usize * height as usize * 4)
            .collect();
        Self {
            width,
            height,
            data,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Raw RGBA samples, row-major.
    pub fn as_rgba(&self) -> &[u8] {
        &self.data
    }

    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let i = self.offset(x, y);
        [
            self.data[i],
            self.data[i + 1],
            self.data[i + 2],
            self.data[i + 3],
        ]
    }

    pub fn set_pixel(&mut self, x: u32, y: u32, rgba: [u8; 4]) {
        let i = self.offset(x, y);
        self.data[i..i + 4].copy_from_slice(&rgba);
    }

    /// Convert to an `image` buffer for encoding.
    pub fn into_image(self) -> DynamicImage {
        // Length is checked at construction, so this cannot fail.
        RgbaImage::from_raw(self.width, self.height, self.data)
            .map(DynamicImage::ImageRgba8)
            .unwrap_or_else(|| DynamicImage::new_rgba8(0, 0))
    }

    fn offset(&self, x: u32, y: u32) -> usize {
        (y as usize * self.width as usize + x as usize) * 4
    }
}

impl From<RgbaImage> for PixelBuffer {
    fn from(img: RgbaImage) -> Self {
        let (width, height) = img.dimensions();
        Self {
            width,
            height,
            data: img.into_raw(),
        }
    }
}

impl From<DynamicImage> for PixelBuffer {
    fn from(img: DynamicImage) -> Self {
        img.into_rgba8().into()
    }
}

/// Run the full enhancement sequence.
pub fn enhance(buffer: PixelBuffer, config: &EnhanceConfig) -> PixelBuffer {
    let (w, h) = (buffer.width, buffer.height);
    let out = normalize_luminance(buffer);
    let out = adaptive_clip(out, config.clip_low, config.clip_high);
    let out = sharpen(out, config.kernel, config.border);
    debug!("Enhanced {}x{} buffer", w, h);
    out
}

/// BT.709 luma of one RGBA pixel.
pub fn luma(rgba: &[u8]) -> f32 {
    LUMA_R * rgba[0] as f32 + LUMA_G * rgba[1] as f32 + LUMA_B * rgba[2] as f32
}

// ── Stage A: luminance normalisation ─────────────────────────────────────

/// Convert to grayscale and stretch the observed range to 0–255.
///
/// A flat image (min == max) maps every pixel to 0.
pub fn normalize_luminance(buffer: PixelBuffer) -> PixelBuffer {
    let grays: Vec<f32> = buffer.data.chunks_exact(4).map(luma).collect();

    let (min, max) = grays
        .iter()
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &g| {
            (lo.min(g), hi.max(g))
        });
    let range = if max > min { max - min } else { 1.0 };

    let mut data = buffer.data;
    for (px, gray) in data.chunks_exact_mut(4).zip(grays) {
        let stretched = ((gray - min) / range * 255.0).round().clamp(0.0, 255.0) as u8;
        px[0] = stretched;
        px[1] = stretched;
        px[2] = stretched;
    }

    PixelBuffer {
        width: buffer.width,
        height: buffer.height,
        data,
    }
}

// ── Stage B: adaptive clipping ───────────────────────────────────────────

/// Snap values above `high` to 255 and below `low` to 0; alpha untouched.
pub fn adaptive_clip(buffer: PixelBuffer, low: u8, high: u8) -> PixelBuffer {
    let mut data = buffer.data;
    for px in data.chunks_exact_mut(4) {
        for v in &mut px[..3] {
            *v = clip_value(*v, low, high);
        }
    }
    PixelBuffer {
        width: buffer.width,
        height: buffer.height,
        data,
    }
}

fn clip_value(v: u8, low: u8, high: u8) -> u8 {
    if v > high {
        255
    } else if v < low {
        0
    } else {
        v
    }
}

// ── Stage C: convolution sharpening ──────────────────────────────────────

/// Apply the 3×3 high-pass kernel to R, G and B independently.
pub fn sharpen(buffer: PixelBuffer, kernel: SharpenKernel, border: BorderMode) -> PixelBuffer {
    let (w, h) = (buffer.width as i64, buffer.height as i64);
    let src = &buffer.data;
    let mut out = vec![0u8; src.len()];
    let full_weight = kernel.center + 4.0 * kernel.edge;

    for y in 0..h {
        for x in 0..w {
            let base = ((y * w + x) * 4) as usize;
            let mut sums: [f32; 3] =
                std::array::from_fn(|c| kernel.center * src[base + c] as f32);
            let mut weight = kernel.center;

            for (dx, dy) in NEIGHBOURS {
                let (nx, ny) = (x + dx, y + dy);
                if nx < 0 || ny < 0 || nx >= w || ny >= h {
                    continue;
                }
                let n = ((ny * w + nx) * 4) as usize;
                for c in 0..3 {
                    sums[c] += kernel.edge * src[n + c] as f32;
                }
                weight += kernel.edge;
            }

            if border == BorderMode::Renormalize && weight.abs() > f32::EPSILON {
                let factor = full_weight / weight;
                for s in &mut sums {
                    *s *= factor;
                }
            }

            for c in 0..3 {
                out[base + c] = sums[c].round().clamp(0.0, 255.0) as u8;
            }
            out[base + 3] = src[base + 3];
        }
    }

    PixelBuffer {
        width: buffer.width,
        height: buffer.height,
        data: out,
    }
}
