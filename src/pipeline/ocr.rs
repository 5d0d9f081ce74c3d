//! OCR invocation: send an enhanced page image to a vision model.
//!
//! Two layers:
//!
//! * [`Transcriber`]: the external-service boundary. One call, one image,
//!   one string back. [`LlmTranscriber`] implements it over any
//!   `edgequake-llm` vision provider.
//! * [`OcrInvoker`]: wraps a transcriber with the per-call timeout and
//!   the [`OcrFailurePolicy`], then cleans the returned text.
//!
//! No retries: a failed page is either blanked or fails its file.

use crate::config::{IngestConfig, OcrFailurePolicy};
use crate::error::IngestError;
use crate::pipeline::postprocess::clean_transcription;
use crate::prompts::TRANSCRIPTION_PROMPT;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, ImageData, LLMProvider, ProviderFactory};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Default model when a provider is named without one.
const DEFAULT_VISION_MODEL: &str = "gpt-4.1-mini";

/// A vision service that turns one page image into text.
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Transcribe `image` (page `page`, 1-based; images count as page 1).
    async fn transcribe(&self, page: usize, image: ImageData) -> Result<String, IngestError>;
}

// ── edgequake-llm implementation ─────────────────────────────────────────

/// [`Transcriber`] backed by an `edgequake-llm` vision provider.
pub struct LlmTranscriber {
    provider: Arc<dyn LLMProvider>,
    system_prompt: String,
    options: CompletionOptions,
}

impl LlmTranscriber {
    pub fn new(provider: Arc<dyn LLMProvider>, config: &IngestConfig) -> Self {
        Self {
            provider,
            system_prompt: config
                .system_prompt
                .clone()
                .unwrap_or_else(|| TRANSCRIPTION_PROMPT.to_string()),
            options: build_options(config),
        }
    }

    /// Resolve a provider from `config` and the environment.
    pub fn from_config(config: &IngestConfig) -> Result<Self, IngestError> {
        let provider = resolve_provider(config)?;
        Ok(Self::new(provider, config))
    }
}

#[async_trait]
impl Transcriber for LlmTranscriber {
    async fn transcribe(&self, page: usize, image: ImageData) -> Result<String, IngestError> {
        // The image carries all the content; the user turn only needs to exist.
        let messages = vec![
            ChatMessage::system(&self.system_prompt),
            ChatMessage::user_with_images("", vec![image]),
        ];

        let response = self
            .provider
            .chat(&messages, Some(&self.options))
            .await
            .map_err(|e| IngestError::Transcription {
                page,
                detail: e.to_string(),
            })?;

        debug!(
            "Page {}: {} input tokens, {} output tokens",
            page, response.prompt_tokens, response.completion_tokens
        );
        Ok(response.content)
    }
}

/// Build `CompletionOptions` from the ingestion config.
fn build_options(config: &IngestConfig) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(config.temperature),
        max_tokens: Some(config.max_tokens),
        ..Default::default()
    }
}

fn create_vision_provider(
    provider_name: &str,
    model: &str,
) -> Result<Arc<dyn LLMProvider>, IngestError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        IngestError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

/// Resolve the vision provider, from most-specific to least-specific:
///
/// 1. `config.provider`: a pre-built provider, used as-is.
/// 2. `config.provider_name` (+ `config.model`).
/// 3. `EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`, when both are set.
/// 4. `OPENAI_API_KEY` present → OpenAI.
/// 5. `ProviderFactory::from_env()` auto-detection.
pub fn resolve_provider(config: &IngestConfig) -> Result<Arc<dyn LLMProvider>, IngestError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    let model = config.model.as_deref().unwrap_or(DEFAULT_VISION_MODEL);

    if let Some(ref name) = config.provider_name {
        return create_vision_provider(name, model);
    }

    if let (Ok(prov), Ok(env_model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !env_model.is_empty() {
            return create_vision_provider(&prov, &env_model);
        }
    }

    if std::env::var("OPENAI_API_KEY").is_ok_and(|k| !k.is_empty()) {
        return create_vision_provider("openai", model);
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| IngestError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No vision provider could be auto-detected from environment.\n\
                Set OPENAI_API_KEY, ANTHROPIC_API_KEY, or pass --provider.\n\
                Error: {}",
                e
            ),
        })?;

    Ok(llm_provider)
}

// ── Invoker ──────────────────────────────────────────────────────────────

/// Timeout + cleanup + failure policy around a [`Transcriber`].
#[derive(Clone)]
pub struct OcrInvoker {
    transcriber: Arc<dyn Transcriber>,
    timeout: Duration,
    policy: OcrFailurePolicy,
}

impl OcrInvoker {
    pub fn new(transcriber: Arc<dyn Transcriber>, timeout: Duration, policy: OcrFailurePolicy) -> Self {
        Self {
            transcriber,
            timeout,
            policy,
        }
    }

    pub fn from_config(transcriber: Arc<dyn Transcriber>, config: &IngestConfig) -> Self {
        Self::new(
            transcriber,
            Duration::from_secs(config.ocr_timeout_secs),
            config.ocr_failure,
        )
    }

    /// Transcribe one page.
    ///
    /// Returns `Ok(Some(text))` on success, `Ok(None)` when the call failed
    /// and the policy blanks failed pages, and `Err` when the policy fails
    /// the file.
    pub async fn transcribe_page(
        &self,
        page: usize,
        image: ImageData,
    ) -> Result<Option<String>, IngestError> {
        let start = Instant::now();
        let outcome =
            match tokio::time::timeout(self.timeout, self.transcriber.transcribe(page, image)).await
            {
                Ok(result) => result,
                Err(_) => Err(IngestError::Transcription {
                    page,
                    detail: format!("timed out after {}ms", self.timeout.as_millis()),
                }),
            };

        match outcome {
            Ok(raw) => {
                let text = clean_transcription(&raw);
                debug!(
                    "Page {}: transcribed {} chars in {:?}",
                    page,
                    text.chars().count(),
                    start.elapsed()
                );
                Ok(Some(text))
            }
            Err(e) => match self.policy {
                OcrFailurePolicy::BlankPage => {
                    warn!("Page {}: transcription failed, keeping it blank: {}", page, e);
                    Ok(None)
                }
                OcrFailurePolicy::FailFile => Err(e),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(&'static str);

    #[async_trait]
    impl Transcriber for Fixed {
        async fn transcribe(&self, _page: usize, _image: ImageData) -> Result<String, IngestError> {
            Ok(self.0.to_string())
        }
    }

    struct Failing;

    #[async_trait]
    impl Transcriber for Failing {
        async fn transcribe(&self, page: usize, _image: ImageData) -> Result<String, IngestError> {
            Err(IngestError::Transcription {
                page,
                detail: "HTTP 503".into(),
            })
        }
    }

    struct Stalled;

    #[async_trait]
    impl Transcriber for Stalled {
        async fn transcribe(&self, _page: usize, _image: ImageData) -> Result<String, IngestError> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok("too late".into())
        }
    }

    fn image() -> ImageData {
        ImageData::new("iVBORw0KGgo=", "image/png")
    }

    fn invoker(t: impl Transcriber + 'static, policy: OcrFailurePolicy) -> OcrInvoker {
        OcrInvoker::new(Arc::new(t), Duration::from_millis(50), policy)
    }

    #[test]
    fn build_options_defaults() {
        let config = IngestConfig::default();
        let opts = build_options(&config);
        assert_eq!(opts.temperature, Some(0.0));
        assert_eq!(opts.max_tokens, Some(4096));
    }

    #[tokio::test]
    async fn success_is_cleaned() {
        let inv = invoker(Fixed("```\nTotal: 12.50  \r\n```"), OcrFailurePolicy::BlankPage);
        let out = inv.transcribe_page(1, image()).await.unwrap();
        assert_eq!(out.as_deref(), Some("Total: 12.50"));
    }

    #[tokio::test]
    async fn failure_blanks_page_by_default() {
        let inv = invoker(Failing, OcrFailurePolicy::BlankPage);
        assert_eq!(inv.transcribe_page(2, image()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn failure_fails_file_when_configured() {
        let inv = invoker(Failing, OcrFailurePolicy::FailFile);
        let err = inv.transcribe_page(2, image()).await.unwrap_err();
        assert!(matches!(err, IngestError::Transcription { page: 2, .. }));
    }

    #[tokio::test]
    async fn stalled_call_times_out() {
        let inv = invoker(Stalled, OcrFailurePolicy::FailFile);
        let err = inv.transcribe_page(3, image()).await.unwrap_err();
        assert!(err.to_string().contains("timed out"), "got: {err}");
    }

    #[tokio::test]
    async fn empty_response_is_a_blank_page_not_a_failure() {
        let inv = invoker(Fixed("   "), OcrFailurePolicy::FailFile);
        assert_eq!(inv.transcribe_page(1, image()).await.unwrap(), Some(String::new()));
    }
}
