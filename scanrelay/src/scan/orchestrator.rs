use std::sync::Arc;

use super::payload::ImagePayload;
use super::retry::RetryPolicy;
use crate::config::Config;
use crate::error::{Result, ScanError};
use crate::vertex::{Content, GenerateRequest, GenerationConfig, InferenceHandle, Part};

pub const EXTRACTION_PROMPT: &str =
    "Extract all text from this image exactly as it appears. No markdown, no comments.";

pub const TOO_LARGE_MESSAGE: &str = "Image is too large";

pub const NO_IMAGE_MESSAGE: &str = "No image provided. Send the file in an 'image' form field.";

/// Text extracted from one image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanOutput {
    pub text: String,
    pub model: String,
    /// Preferred model that was skipped, when the fallback produced the text.
    pub fallback_from: Option<String>,
}

/// Drives one scan: validate the upload, call the model with retry and
/// fallback, and turn the response into trimmed text.
#[derive(Debug, Clone)]
pub struct Scanner {
    handle: Arc<InferenceHandle>,
    retry: RetryPolicy,
    max_output_tokens: u32,
    max_image_bytes: usize,
}

impl Scanner {
    pub fn new(handle: Arc<InferenceHandle>, config: &Config) -> Self {
        Self {
            handle,
            retry: RetryPolicy::from_config(&config.scan),
            max_output_tokens: config.vertex.max_output_tokens,
            max_image_bytes: config.scan.max_image_bytes,
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn handle(&self) -> &Arc<InferenceHandle> {
        &self.handle
    }

    /// Fixed sampling parameters so the same image always yields the same text.
    pub fn generation_config(&self) -> GenerationConfig {
        GenerationConfig {
            temperature: Some(0.0),
            top_p: Some(1.0),
            top_k: Some(1),
            candidate_count: Some(1),
            max_output_tokens: Some(self.max_output_tokens),
        }
    }

    pub fn build_request(&self, image: &ImagePayload) -> GenerateRequest {
        GenerateRequest {
            contents: vec![Content {
                role: "user".to_string(),
                parts: vec![
                    Part::text(EXTRACTION_PROMPT),
                    Part::inline_data(image.mime_type(), image.to_base64()),
                ],
            }],
            generation_config: Some(self.generation_config()),
        }
    }

    fn validate(&self, image: Option<ImagePayload>) -> Result<ImagePayload> {
        let image = image.ok_or_else(|| ScanError::Validation(NO_IMAGE_MESSAGE.to_string()))?;

        if image.is_empty() {
            return Err(ScanError::Validation("Uploaded image is empty".to_string()));
        }
        if image.len() > self.max_image_bytes {
            return Err(ScanError::Validation(format!(
                "{TOO_LARGE_MESSAGE}: {} bytes (limit {} bytes)",
                image.len(),
                self.max_image_bytes
            )));
        }

        Ok(image)
    }

    pub async fn scan(&self, image: Option<ImagePayload>) -> Result<ScanOutput> {
        let image = self.validate(image)?;
        let router = self.handle.get().await?;

        tracing::info!(
            bytes = image.len(),
            mime_type = image.mime_type(),
            model = router.preferred_model(),
            "Scanning image"
        );

        let request = self.build_request(&image);
        let routed = router.generate(&request, &self.retry).await?;

        if let Some(reason) = routed.response.block_reason() {
            return Err(ScanError::Inference(format!(
                "Model {} blocked the request: {}",
                routed.model, reason
            )));
        }

        let text = routed.response.text().trim().to_string();
        if text.is_empty() {
            return Err(ScanError::EmptyResult {
                model: routed.model,
            });
        }

        Ok(ScanOutput {
            text,
            fallback_from: routed
                .used_fallback
                .then(|| router.preferred_model().to_string()),
            model: routed.model,
        })
    }
}
