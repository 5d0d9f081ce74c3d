//! Configuration types for document ingestion.
//!
//! Every tunable of the pipeline lives in [`IngestConfig`], built via
//! [`IngestConfigBuilder`]. The density threshold, render scale, clip
//! thresholds and sharpening kernel are all exposed here rather than
//! hard-coded: good values depend on the scans a deployment actually sees.

use crate::error::IngestError;
use edgequake_llm::LLMProvider;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Configuration for an ingestion session.
///
/// # Example
/// ```rust
/// use edgequake_ingest::{IngestConfig, OcrFailurePolicy};
///
/// let config = IngestConfig::builder()
///     .density_threshold(40)
///     .render_scale(2.5)
///     .ocr_failure(OcrFailurePolicy::FailFile)
///     .build()
///     .unwrap();
/// assert_eq!(config.density_threshold, 40);
/// ```
#[derive(Clone)]
pub struct IngestConfig {
    /// Minimum trimmed characters per page before a PDF's text layer is
    /// trusted. Default: 50.
    ///
    /// Image-only PDFs usually carry a handful of characters (a producer
    /// stamp, a page number). Anything below `threshold × pages` is sent to
    /// OCR instead.
    pub density_threshold: usize,

    /// Scale factor used when rasterising a PDF page for OCR. Range: 1.0–6.0.
    /// Default: 3.0.
    ///
    /// Page units are 1/72 inch, so 3.0 is roughly 216 DPI: enough for small
    /// print to survive enhancement without producing multi-hundred-megabyte
    /// buffers.
    pub render_scale: f32,

    /// Hard cap on either rendered dimension, in pixels. Default: 6000.
    ///
    /// Applied after `render_scale` so an A0 poster cannot exhaust memory.
    pub max_rendered_pixels: u32,

    /// Pixel enhancement parameters applied before transcription.
    pub enhance: EnhanceConfig,

    /// What to do when the vision service fails for a page. Default: [`OcrFailurePolicy::BlankPage`].
    pub ocr_failure: OcrFailurePolicy,

    /// Per-transcription timeout in seconds. Default: 120.
    pub ocr_timeout_secs: u64,

    /// Vision model identifier, e.g. "gpt-4.1-mini". If None, uses provider default.
    pub model: Option<String>,

    /// LLM provider name (e.g. "openai", "anthropic", "ollama").
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Sampling temperature for transcription. Default: 0.0.
    pub temperature: f32,

    /// Maximum tokens the model may generate per page. Default: 4096.
    pub max_tokens: usize,

    /// Custom transcription prompt. If None, uses the built-in one.
    pub system_prompt: Option<String>,

    /// PDF user password for encrypted documents.
    pub password: Option<String>,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            density_threshold: 50,
            render_scale: 3.0,
            max_rendered_pixels: 6000,
            enhance: EnhanceConfig::default(),
            ocr_failure: OcrFailurePolicy::default(),
            ocr_timeout_secs: 120,
            model: None,
            provider_name: None,
            provider: None,
            temperature: 0.0,
            max_tokens: 4096,
            system_prompt: None,
            password: None,
            download_timeout_secs: 120,
        }
    }
}

impl fmt::Debug for IngestConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IngestConfig")
            .field("density_threshold", &self.density_threshold)
            .field("render_scale", &self.render_scale)
            .field("max_rendered_pixels", &self.max_rendered_pixels)
            .field("enhance", &self.enhance)
            .field("ocr_failure", &self.ocr_failure)
            .field("ocr_timeout_secs", &self.ocr_timeout_secs)
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl IngestConfig {
    /// Create a new builder for `IngestConfig`.
    pub fn builder() -> IngestConfigBuilder {
        IngestConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`IngestConfig`].
#[derive(Debug)]
pub struct IngestConfigBuilder {
    config: IngestConfig,
}

impl IngestConfigBuilder {
    pub fn density_threshold(mut self, chars_per_page: usize) -> Self {
        self.config.density_threshold = chars_per_page;
        self
    }

    pub fn render_scale(mut self, scale: f32) -> Self {
        self.config.render_scale = scale.clamp(1.0, 6.0);
        self
    }

    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.max_rendered_pixels = px.max(100);
        self
    }

    pub fn enhance(mut self, enhance: EnhanceConfig) -> Self {
        self.config.enhance = enhance;
        self
    }

    pub fn clip_thresholds(mut self, low: u8, high: u8) -> Self {
        self.config.enhance.clip_low = low;
        self.config.enhance.clip_high = high;
        self
    }

    pub fn sharpen_kernel(mut self, kernel: SharpenKernel) -> Self {
        self.config.enhance.kernel = kernel;
        self
    }

    pub fn border_mode(mut self, mode: BorderMode) -> Self {
        self.config.enhance.border = mode;
        self
    }

    pub fn ocr_failure(mut self, policy: OcrFailurePolicy) -> Self {
        self.config.ocr_failure = policy;
        self
    }

    pub fn ocr_timeout_secs(mut self, secs: u64) -> Self {
        self.config.ocr_timeout_secs = secs;
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = Some(prompt.into());
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<IngestConfig, IngestError> {
        let c = &self.config;
        if !(1.0..=6.0).contains(&c.render_scale) {
            return Err(IngestError::InvalidConfig(format!(
                "render scale must be 1.0–6.0, got {}",
                c.render_scale
            )));
        }
        if c.enhance.clip_low > c.enhance.clip_high {
            return Err(IngestError::InvalidConfig(format!(
                "clip low ({}) must not exceed clip high ({})",
                c.enhance.clip_low, c.enhance.clip_high
            )));
        }
        if c.ocr_timeout_secs == 0 {
            return Err(IngestError::InvalidConfig(
                "OCR timeout must be ≥ 1 second".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Enhancement ──────────────────────────────────────────────────────────

/// Parameters of the grayscale → stretch → clip → sharpen sequence.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EnhanceConfig {
    /// Stretched values below this become pure black. Default: 50.
    pub clip_low: u8,
    /// Stretched values above this become pure white. Default: 200.
    pub clip_high: u8,
    pub kernel: SharpenKernel,
    pub border: BorderMode,
}

impl Default for EnhanceConfig {
    fn default() -> Self {
        Self {
            clip_low: 50,
            clip_high: 200,
            kernel: SharpenKernel::default(),
            border: BorderMode::default(),
        }
    }
}

/// 3×3 high-pass kernel with zero corners.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SharpenKernel {
    pub center: f32,
    /// Weight of each of the four orthogonal neighbours.
    pub edge: f32,
}

impl Default for SharpenKernel {
    fn default() -> Self {
        Self {
            center: 5.0,
            edge: -1.0,
        }
    }
}

/// How the sharpening convolution treats taps that fall outside the image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BorderMode {
    /// Omit out-of-bounds taps from the sum; no renormalisation.
    #[default]
    Skip,
    /// Omit out-of-bounds taps, then scale the partial sum by
    /// `full kernel weight / in-bounds weight` so a flat field maps to the
    /// same value at borders as in the interior.
    Renormalize,
}

// ── OCR ──────────────────────────────────────────────────────────────────

/// Behaviour when a page transcription fails or times out.
///
/// | Policy | Effect |
/// |--------|--------|
/// | `BlankPage` | log a warning, keep an empty page, continue the document |
/// | `FailFile`  | abort this file with [`IngestError::Transcription`] |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OcrFailurePolicy {
    #[default]
    BlankPage,
    FailFile,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let c = IngestConfig::default();
        assert_eq!(c.density_threshold, 50);
        assert_eq!(c.render_scale, 3.0);
        assert_eq!(c.enhance.clip_low, 50);
        assert_eq!(c.enhance.clip_high, 200);
        assert_eq!(c.enhance.kernel.center, 5.0);
        assert_eq!(c.enhance.kernel.edge, -1.0);
        assert_eq!(c.enhance.border, BorderMode::Skip);
        assert_eq!(c.ocr_failure, OcrFailurePolicy::BlankPage);
    }

    #[test]
    fn builder_clamps_scale() {
        let c = IngestConfig::builder().render_scale(12.0).build().unwrap();
        assert_eq!(c.render_scale, 6.0);
        let c = IngestConfig::builder().render_scale(0.2).build().unwrap();
        assert_eq!(c.render_scale, 1.0);
    }

    #[test]
    fn builder_rejects_inverted_clip() {
        let err = IngestConfig::builder()
            .clip_thresholds(220, 40)
            .build()
            .unwrap_err();
        assert!(matches!(err, IngestError::InvalidConfig(_)));
    }

    #[test]
    fn builder_rejects_zero_timeout() {
        assert!(IngestConfig::builder().ocr_timeout_secs(0).build().is_err());
    }

    #[test]
    fn debug_redacts_password() {
        let c = IngestConfig::builder().password("hunter2").build().unwrap();
        let dbg = format!("{c:?}");
        assert!(!dbg.contains("hunter2"));
        assert!(dbg.contains("<redacted>"));
    }
}
