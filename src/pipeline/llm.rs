//! VLM interaction: send one encoded document, get validated transactions back.
//!
//! [`TransactionExtractor`] is the seam between the orchestrator and the
//! external model. [`LlmExtractor`] implements it on top of any
//! `edgequake_llm` provider; tests substitute scripted extractors.
//!
//! Prompt text lives in [`crate::prompts`], response validation in
//! [`super::schema`]. There are no retries here: a failed call is returned to
//! the caller, and retrying means re-running the whole pipeline.

use crate::config::ExtractionConfig;
use crate::error::ExtractionError;
use crate::pipeline::encode::{attachments, EncodedDocument};
use crate::pipeline::schema::parse_response;
use crate::prompts::{extraction_instructions, USER_INSTRUCTION};
use crate::transaction::Transaction;
use async_trait::async_trait;
use chrono::Datelike;
use edgequake_llm::{ChatMessage, CompletionOptions, ImageData, LLMProvider};
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{timeout, Duration};
use tracing::{debug, warn};

/// Turns one encoded document into transaction records.
#[async_trait]
pub trait TransactionExtractor: Send + Sync {
    async fn extract(&self, doc: &EncodedDocument) -> Result<Vec<Transaction>, ExtractionError>;
}

/// [`TransactionExtractor`] backed by a vision LLM provider.
pub struct LlmExtractor {
    provider: Arc<dyn LLMProvider>,
    system_prompt: Option<String>,
    temperature: f32,
    max_tokens: usize,
    api_timeout_secs: u64,
    max_rendered_pixels: u32,
}

impl LlmExtractor {
    pub fn new(provider: Arc<dyn LLMProvider>, config: &ExtractionConfig) -> Self {
        Self {
            provider,
            system_prompt: config.system_prompt.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            api_timeout_secs: config.api_timeout_secs,
            max_rendered_pixels: config.max_rendered_pixels,
        }
    }

    /// ## Message Layout
    ///
    /// 1. **System message** — extraction rules + JSON response schema
    /// 2. **User message** — a one-line instruction with the document attached
    ///    (one image, or one per page for a PDF)
    fn build_messages(&self, images: Vec<ImageData>) -> Vec<ChatMessage> {
        let year = chrono::Local::now().year();
        vec![
            ChatMessage::system(extraction_instructions(self.system_prompt.as_deref(), year)),
            ChatMessage::user_with_images(USER_INSTRUCTION, images),
        ]
    }
}

#[async_trait]
impl TransactionExtractor for LlmExtractor {
    async fn extract(&self, doc: &EncodedDocument) -> Result<Vec<Transaction>, ExtractionError> {
        let start = Instant::now();
        let images = attachments(doc, self.provider.name(), self.max_rendered_pixels).await?;
        let messages = self.build_messages(images);
        let options = build_options(self.temperature, self.max_tokens);

        let call = self.provider.chat(&messages, Some(&options));
        let response = match timeout(Duration::from_secs(self.api_timeout_secs), call).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                warn!("{}: provider call failed — {}", doc.name, e);
                return Err(ExtractionError::Provider {
                    file: doc.name.clone(),
                    message: e.to_string(),
                });
            }
            Err(_) => {
                warn!("{}: provider call timed out after {}s", doc.name, self.api_timeout_secs);
                return Err(ExtractionError::Timeout {
                    file: doc.name.clone(),
                    secs: self.api_timeout_secs,
                });
            }
        };

        debug!(
            "{}: {} input tokens, {} output tokens, {:?}",
            doc.name,
            response.prompt_tokens,
            response.completion_tokens,
            start.elapsed()
        );

        let parsed = parse_response(&doc.name, &response.content)?;
        Ok(parsed.transactions)
    }
}

/// Build `CompletionOptions`; `max_tokens` is the output-size limit.
fn build_options(temperature: f32, max_tokens: usize) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(temperature),
        max_tokens: Some(max_tokens),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::MediaType;
    use edgequake_llm::{ChatRole, LLMResponse, LlmError, MockProvider};
    use std::sync::Mutex;

    enum Reply {
        Content(&'static str),
        Fail,
        Hang,
    }

    /// Records every request and answers with a fixed reply.
    struct StubProvider {
        reply: Reply,
        requests: Mutex<Vec<Vec<ChatMessage>>>,
    }

    impl StubProvider {
        fn new(reply: Reply) -> Arc<Self> {
            Arc::new(Self {
                reply,
                requests: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl LLMProvider for StubProvider {
        fn name(&self) -> &str {
            "stub"
        }

        fn model(&self) -> &str {
            "stub-vision"
        }

        fn max_context_length(&self) -> usize {
            128_000
        }

        async fn complete(&self, _prompt: &str) -> edgequake_llm::Result<LLMResponse> {
            Err(LlmError::NotSupported("chat only".into()))
        }

        async fn complete_with_options(
            &self,
            prompt: &str,
            _options: &CompletionOptions,
        ) -> edgequake_llm::Result<LLMResponse> {
            self.complete(prompt).await
        }

        async fn chat(
            &self,
            messages: &[ChatMessage],
            _options: Option<&CompletionOptions>,
        ) -> edgequake_llm::Result<LLMResponse> {
            self.requests.lock().unwrap().push(messages.to_vec());
            match self.reply {
                Reply::Content(body) => Ok(LLMResponse::new(body, "stub-vision")),
                Reply::Fail => Err(LlmError::ApiError("quota exhausted".into())),
                Reply::Hang => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Ok(LLMResponse::new("", "stub-vision"))
                }
            }
        }
    }

    fn extractor(provider: Arc<dyn LLMProvider>) -> LlmExtractor {
        let config = ExtractionConfig {
            api_timeout_secs: 1,
            ..ExtractionConfig::default()
        };
        LlmExtractor::new(provider, &config)
    }

    fn receipt() -> EncodedDocument {
        EncodedDocument {
            name: "receipt.png".into(),
            media_type: MediaType::Png,
            payload: "iVBORw0KGgo=".into(),
        }
    }

    #[test]
    fn build_options_defaults() {
        let config = ExtractionConfig::default();
        let opts = build_options(config.temperature, config.max_tokens);
        assert_eq!(opts.temperature, Some(0.0));
        assert_eq!(opts.max_tokens, Some(8192));
    }

    #[tokio::test]
    async fn request_carries_rules_schema_and_document() {
        let provider = StubProvider::new(Reply::Content(
            r#"{"transactions":[{"date":"2024-03-05","description":"Coffee Shop","category":"Dining","amount":-4.50}]}"#,
        ));
        let txs = extractor(provider.clone()).extract(&receipt()).await.unwrap();
        assert_eq!(txs.len(), 1);
        assert_eq!(txs[0].description, "Coffee Shop");

        let requests = provider.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        let messages = &requests[0];
        assert_eq!(messages.len(), 2);

        assert_eq!(messages[0].role, ChatRole::System);
        assert!(messages[0].content.contains("RESPONSE SCHEMA"));
        assert!(messages[0].content.contains("\"transactions\""));
        assert!(!messages[0].has_images());

        assert_eq!(messages[1].role, ChatRole::User);
        let images = messages[1].images.as_ref().unwrap();
        assert_eq!(images.len(), 1);
        assert_eq!(images[0].mime_type, "image/png");
        assert_eq!(images[0].data, "iVBORw0KGgo=");
    }

    #[tokio::test]
    async fn provider_failure_maps_to_provider_error() {
        let err = extractor(StubProvider::new(Reply::Fail))
            .extract(&receipt())
            .await
            .unwrap_err();
        match err {
            ExtractionError::Provider { file, message } => {
                assert_eq!(file, "receipt.png");
                assert!(message.contains("quota exhausted"), "got: {message}");
            }
            other => panic!("expected Provider, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn slow_provider_maps_to_timeout() {
        let err = extractor(StubProvider::new(Reply::Hang))
            .extract(&receipt())
            .await
            .unwrap_err();
        assert!(
            matches!(err, ExtractionError::Timeout { secs: 1, ref file } if file == "receipt.png"),
            "got: {err:?}"
        );
    }

    #[tokio::test]
    async fn empty_content_is_empty_response() {
        let provider = MockProvider::new();
        provider.add_response("").await;
        let err = extractor(Arc::new(provider))
            .extract(&receipt())
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractionError::EmptyResponse { .. }), "got: {err:?}");
    }

    #[tokio::test]
    async fn refused_attachment_never_reaches_provider() {
        let provider = StubProvider::new(Reply::Content(r#"{"transactions":[]}"#));
        let heic = EncodedDocument {
            name: "IMG_0042.heic".into(),
            media_type: MediaType::Heic,
            payload: "AAAA".into(),
        };
        let err = extractor(provider.clone()).extract(&heic).await.unwrap_err();
        assert!(matches!(err, ExtractionError::UnsupportedAttachment { .. }), "got: {err:?}");
        assert!(provider.requests.lock().unwrap().is_empty());
    }
}
