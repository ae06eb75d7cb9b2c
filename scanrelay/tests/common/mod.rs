#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, Once};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request};
use serde_json::json;

use scanrelay::config::{Config, GoogleConfig, ScanConfig, VertexConfig};
use scanrelay::error::{Result, ScanError};
use scanrelay::vertex::{
    Candidate, Content, GenerateRequest, GenerateResponse, InferenceBackend, Part,
};

pub const PROJECT_ID: &str = "scan-project";
pub const CLIENT_EMAIL: &str = "scanner@scan-project.iam.gserviceaccount.com";
pub const ACCESS_TOKEN: &str = "ya29.test-access-token";
pub const BOUNDARY: &str = "scanrelay-test-boundary";

/// Smallest useful PNG prefix: the signature plus an IHDR chunk header.
pub const PNG_BYTES: &[u8] = &[
    0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44,
    0x52,
];

static INIT: Once = Once::new();

/// Initialize tracing subscriber once for tests
pub fn init_test_logger() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .try_init();
    });
}

/// Get the path to a fixture file
pub fn fixture_path(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

pub fn load_fixture_string(name: &str) -> String {
    let path = fixture_path(name);
    fs::read_to_string(&path).unwrap_or_else(|e| panic!("Failed to load fixture '{name}': {e}"))
}

/// The test RSA key as a hosting dashboard stores it: one line, `\n` escaped.
pub fn escaped_private_key() -> String {
    load_fixture_string("service_account_key.pem").replace('\n', "\\n")
}

pub fn google_config(token_uri: String) -> GoogleConfig {
    GoogleConfig {
        project_id: Some(PROJECT_ID.to_string()),
        private_key: Some(escaped_private_key()),
        private_key_id: Some("test-key-id".to_string()),
        client_email: Some(CLIENT_EMAIL.to_string()),
        client_id: Some("109876543210".to_string()),
        service_account_json: None,
        token_uri,
    }
}

/// Configuration pointing both the token endpoint and Vertex AI at `server_uri`.
pub fn mock_config(server_uri: &str) -> Config {
    let mut config = Config::with_defaults();
    config.google = google_config(format!("{server_uri}/token"));
    config.vertex = VertexConfig {
        base_url: Some(server_uri.to_string()),
        timeout_secs: 5,
        ..VertexConfig::default()
    };
    config.scan = ScanConfig {
        initial_backoff_ms: 1,
        ..ScanConfig::default()
    };
    config
}

pub fn generate_path(region: &str, model: &str) -> String {
    format!(
        "/v1/projects/{PROJECT_ID}/locations/{region}/publishers/google/models/{model}:generateContent"
    )
}

pub fn token_body() -> serde_json::Value {
    json!({
        "access_token": ACCESS_TOKEN,
        "expires_in": 3599,
        "token_type": "Bearer"
    })
}

pub fn candidate_body(text: &str) -> serde_json::Value {
    json!({
        "candidates": [{
            "content": {"role": "model", "parts": [{"text": text}]},
            "finishReason": "STOP"
        }],
        "usageMetadata": {"promptTokenCount": 264, "candidatesTokenCount": 4, "totalTokenCount": 268},
        "modelVersion": "gemini-2.5-flash"
    })
}

pub fn api_error_body(code: u16, status: &str, message: &str) -> serde_json::Value {
    json!({
        "error": {"code": code, "message": message, "status": status}
    })
}

pub fn multipart_body(field: &str, content_type: &str, bytes: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"{field}\"; filename=\"page.png\"\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(format!("Content-Type: {content_type}\r\n\r\n").as_bytes());
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
    body
}

pub fn scan_request(field: &str, bytes: &[u8]) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/scan")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(multipart_body(field, "image/png", bytes)))
        .unwrap()
}

pub fn json_scan_request(body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/scan")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub async fn read_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

pub fn text_response(text: &str) -> GenerateResponse {
    GenerateResponse {
        candidates: vec![Candidate {
            content: Content {
                role: "model".to_string(),
                parts: vec![Part::text(text)],
            },
            finish_reason: Some("STOP".to_string()),
        }],
        ..Default::default()
    }
}

/// In-process backend that replays scripted outcomes per model.
pub struct ScriptedBackend {
    script: Mutex<Vec<(String, Result<GenerateResponse>)>>,
    calls: Mutex<Vec<(String, tokio::time::Instant)>>,
}

impl ScriptedBackend {
    /// Outcomes are consumed in order; each is tagged with the model expected to ask for it.
    pub fn new(script: Vec<(&str, Result<GenerateResponse>)>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(
                script
                    .into_iter()
                    .rev()
                    .map(|(model, outcome)| (model.to_string(), outcome))
                    .collect(),
            ),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn models_called(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|(model, _)| model.clone())
            .collect()
    }

    pub fn call_times(&self) -> Vec<tokio::time::Instant> {
        self.calls.lock().unwrap().iter().map(|(_, at)| *at).collect()
    }
}

#[async_trait]
impl InferenceBackend for ScriptedBackend {
    fn region(&self) -> &str {
        "us-central1"
    }

    async fn generate_content(
        &self,
        model: &str,
        _request: &GenerateRequest,
    ) -> Result<GenerateResponse> {
        self.calls
            .lock()
            .unwrap()
            .push((model.to_string(), tokio::time::Instant::now()));

        let (expected, outcome) = self
            .script
            .lock()
            .unwrap()
            .pop()
            .unwrap_or_else(|| panic!("unexpected extra call for model {model}"));
        assert_eq!(expected, model, "model called out of order");
        outcome
    }
}

pub fn rate_limited() -> Result<GenerateResponse> {
    Err(ScanError::RateLimit(
        "HTTP 429: Resource exhausted. Please try again later.".to_string(),
    ))
}

pub fn model_not_found(model: &str) -> Result<GenerateResponse> {
    Err(ScanError::ModelUnavailable {
        model: model.to_string(),
        message: format!("HTTP 404: Publisher Model `{model}` was not found"),
    })
}
