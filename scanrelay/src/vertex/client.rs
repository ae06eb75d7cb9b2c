use async_trait::async_trait;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;

use super::types::{ApiErrorEnvelope, GenerateRequest, GenerateResponse};
use crate::config::VertexConfig;
use crate::credentials::TokenSource;
use crate::error::{Result, ScanError};

/// Region whose endpoint has no regional host prefix.
pub const GLOBAL_REGION: &str = "global";

/// Anything that can run a `generateContent` call for a named model.
#[async_trait]
pub trait InferenceBackend: Send + Sync {
    fn region(&self) -> &str;

    async fn generate_content(
        &self,
        model: &str,
        request: &GenerateRequest,
    ) -> Result<GenerateResponse>;
}

/// Authenticated Vertex AI client bound to one project and region.
#[derive(Clone, Debug)]
pub struct VertexClient {
    client: Client,
    project_id: String,
    region: String,
    base_url: Option<String>,
    tokens: Arc<TokenSource>,
}

impl VertexClient {
    pub fn new(
        project_id: impl Into<String>,
        tokens: Arc<TokenSource>,
        config: &VertexConfig,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ScanError::Configuration(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            project_id: project_id.into(),
            region: config.region.clone(),
            base_url: config
                .base_url
                .as_ref()
                .map(|url| url.trim_end_matches('/').to_string()),
            tokens,
        })
    }

    /// Same project, credentials and connection pool, different region.
    pub fn with_region(&self, region: impl Into<String>) -> Self {
        Self {
            region: region.into(),
            ..self.clone()
        }
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    fn host(&self) -> String {
        match &self.base_url {
            Some(base) => base.clone(),
            None if self.region == GLOBAL_REGION => "https://aiplatform.googleapis.com".to_string(),
            None => format!("https://{}-aiplatform.googleapis.com", self.region),
        }
    }

    pub fn endpoint(&self, model: &str) -> String {
        format!(
            "{}/v1/projects/{}/locations/{}/publishers/google/models/{}:generateContent",
            self.host(),
            self.project_id,
            self.region,
            model
        )
    }
}

#[async_trait]
impl InferenceBackend for VertexClient {
    fn region(&self) -> &str {
        &self.region
    }

    async fn generate_content(
        &self,
        model: &str,
        request: &GenerateRequest,
    ) -> Result<GenerateResponse> {
        let url = self.endpoint(model);
        let token = self.tokens.access_token(&self.client).await?;

        tracing::debug!(model, region = %self.region, "Calling Vertex AI generateContent");

        let response = self
            .client
            .post(&url)
            .bearer_auth(token)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let err = classify_error(model, status.as_u16(), &body);
            tracing::warn!(model, status = status.as_u16(), "Vertex AI call failed: {}", err);
            return Err(err);
        }

        response
            .json::<GenerateResponse>()
            .await
            .map_err(|e| ScanError::Inference(format!("Failed to parse Vertex AI response: {e}")))
    }
}

/// Maps a failed `generateContent` response onto the error kinds the scan
/// pipeline reacts to.
///
/// Quota exhaustion becomes [`ScanError::RateLimit`]; a missing model, or a
/// permission error that names the model, becomes
/// [`ScanError::ModelUnavailable`]; everything else is an inference failure.
pub fn classify_error(model: &str, status: u16, body: &str) -> ScanError {
    let (api_status, message) = parse_error_body(body);
    let detail = format!("HTTP {status}: {message}");

    if status == 429 || api_status == "RESOURCE_EXHAUSTED" {
        return ScanError::RateLimit(detail);
    }

    let model_unavailable = status == 404
        || api_status == "NOT_FOUND"
        || ((status == 403 || api_status == "PERMISSION_DENIED")
            && message.to_lowercase().contains("model"));

    if model_unavailable {
        ScanError::ModelUnavailable {
            model: model.to_string(),
            message: detail,
        }
    } else {
        ScanError::Inference(detail)
    }
}

/// Google APIs answer either with an error object or a one-element array of them.
fn parse_error_body(body: &str) -> (String, String) {
    let envelope = serde_json::from_str::<ApiErrorEnvelope>(body).ok().or_else(|| {
        serde_json::from_str::<Vec<ApiErrorEnvelope>>(body)
            .ok()
            .and_then(|list| list.into_iter().next())
    });

    match envelope {
        Some(envelope) => (
            envelope.error.status.unwrap_or_default(),
            envelope
                .error
                .message
                .unwrap_or_else(|| body.trim().to_string()),
        ),
        None => (String::new(), body.trim().to_string()),
    }
}
