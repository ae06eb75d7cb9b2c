mod common;

use std::sync::Arc;

use serde_json::json;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::*;
use scanrelay::credentials::{ServiceAccountCredentials, TokenSource};
use scanrelay::error::{ErrorKind, ScanError};
use scanrelay::vertex::{
    Content, GenerateRequest, GenerationConfig, InferenceBackend, InferenceFactory, Part,
    VertexClient,
};

fn request() -> GenerateRequest {
    GenerateRequest {
        contents: vec![Content {
            role: "user".to_string(),
            parts: vec![
                Part::text("Extract all text"),
                Part::inline_data("image/png", "iVBORw0KGgo="),
            ],
        }],
        generation_config: Some(GenerationConfig {
            temperature: Some(0.0),
            top_p: Some(1.0),
            top_k: Some(1),
            candidate_count: Some(1),
            max_output_tokens: Some(8192),
        }),
    }
}

async fn mount_token_endpoint(server: &MockServer, expected_calls: u64) {
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains(
            "grant_type=urn%3Aietf%3Aparams%3Aoauth%3Agrant-type%3Ajwt-bearer",
        ))
        .and(body_string_contains("assertion="))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body()))
        .expect(expected_calls)
        .mount(server)
        .await;
}

async fn client_for(server: &MockServer) -> VertexClient {
    let config = mock_config(&server.uri());
    let credentials = ServiceAccountCredentials::resolve(&config.google).unwrap();
    let tokens = Arc::new(TokenSource::service_account(&credentials).unwrap());
    VertexClient::new(PROJECT_ID, tokens, &config.vertex).unwrap()
}

#[tokio::test]
async fn test_generate_content_signs_and_reuses_token() {
    init_test_logger();
    let server = MockServer::start().await;
    mount_token_endpoint(&server, 1).await;

    Mock::given(method("POST"))
        .and(path(generate_path("us-central1", "gemini-2.5-flash")))
        .and(header("authorization", format!("Bearer {ACCESS_TOKEN}").as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(candidate_body("RECEIPT")))
        .expect(2)
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let first = client
        .generate_content("gemini-2.5-flash", &request())
        .await
        .unwrap();
    let second = client
        .generate_content("gemini-2.5-flash", &request())
        .await
        .unwrap();

    assert_eq!(first.text(), "RECEIPT");
    assert_eq!(second.text(), "RECEIPT");
}

#[tokio::test]
async fn test_concurrent_callers_share_one_token_exchange() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(token_body())
                .set_delay(std::time::Duration::from_millis(200)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let config = mock_config(&server.uri());
    let credentials = ServiceAccountCredentials::resolve(&config.google).unwrap();
    let tokens = TokenSource::service_account(&credentials).unwrap();
    let http = reqwest::Client::new();

    let (first, second, third) = tokio::join!(
        tokens.access_token(&http),
        tokens.access_token(&http),
        tokens.access_token(&http),
    );

    assert_eq!(first.unwrap(), ACCESS_TOKEN);
    assert_eq!(second.unwrap(), ACCESS_TOKEN);
    assert_eq!(third.unwrap(), ACCESS_TOKEN);
}

#[tokio::test]
async fn test_request_body_uses_vertex_field_names() {
    let server = MockServer::start().await;
    mount_token_endpoint(&server, 1).await;

    Mock::given(method("POST"))
        .and(path(generate_path("us-central1", "gemini-2.5-flash")))
        .and(body_string_contains("\"inlineData\""))
        .and(body_string_contains("\"mimeType\":\"image/png\""))
        .and(body_string_contains("\"maxOutputTokens\":8192"))
        .respond_with(ResponseTemplate::new(200).set_body_json(candidate_body("ok")))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    client
        .generate_content("gemini-2.5-flash", &request())
        .await
        .unwrap();
}

#[tokio::test]
async fn test_rejected_token_exchange_is_configuration_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": "invalid_grant",
            "error_description": "Invalid JWT Signature."
        })))
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let err = client
        .generate_content("gemini-2.5-flash", &request())
        .await
        .unwrap_err();

    assert!(matches!(err, ScanError::Auth(_)));
    assert_eq!(err.kind(), ErrorKind::Configuration);
    assert!(err.to_string().contains("invalid_grant"));
}

#[tokio::test]
async fn test_quota_error_classified_as_rate_limit() {
    let server = MockServer::start().await;
    mount_token_endpoint(&server, 1).await;

    Mock::given(method("POST"))
        .and(path(generate_path("us-central1", "gemini-2.5-flash")))
        .respond_with(ResponseTemplate::new(429).set_body_json(api_error_body(
            429,
            "RESOURCE_EXHAUSTED",
            "Resource exhausted. Please try again later.",
        )))
        .mount(&server)
        .await;

    let err = client_for(&server)
        .await
        .generate_content("gemini-2.5-flash", &request())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::RateLimit);
}

#[tokio::test]
async fn test_missing_model_classified_as_unavailable() {
    let server = MockServer::start().await;
    mount_token_endpoint(&server, 1).await;

    Mock::given(method("POST"))
        .and(path(generate_path("us-central1", "gemini-9-imaginary")))
        .respond_with(ResponseTemplate::new(404).set_body_json(api_error_body(
            404,
            "NOT_FOUND",
            "Publisher Model `projects/scan-project/locations/us-central1/publishers/google/models/gemini-9-imaginary` not found.",
        )))
        .mount(&server)
        .await;

    let err = client_for(&server)
        .await
        .generate_content("gemini-9-imaginary", &request())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ModelUnavailable);
}

#[tokio::test]
async fn test_server_error_classified_as_inference() {
    let server = MockServer::start().await;
    mount_token_endpoint(&server, 1).await;

    Mock::given(method("POST"))
        .and(path(generate_path("us-central1", "gemini-2.5-flash")))
        .respond_with(ResponseTemplate::new(500).set_body_json(api_error_body(
            500,
            "INTERNAL",
            "Internal error encountered.",
        )))
        .mount(&server)
        .await;

    let err = client_for(&server)
        .await
        .generate_content("gemini-2.5-flash", &request())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Inference);
    assert!(err.to_string().contains("Internal error encountered."));
}

#[tokio::test]
async fn test_factory_routes_fallback_to_its_region() {
    let server = MockServer::start().await;
    mount_token_endpoint(&server, 1).await;

    Mock::given(method("POST"))
        .and(path(generate_path("us-central1", "gemini-2.5-flash")))
        .respond_with(ResponseTemplate::new(404).set_body_json(api_error_body(
            404,
            "NOT_FOUND",
            "Publisher Model was not found",
        )))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(generate_path("europe-west4", "gemini-2.0-flash-001")))
        .respond_with(ResponseTemplate::new(200).set_body_json(candidate_body("from fallback")))
        .expect(1)
        .mount(&server)
        .await;

    let mut config = mock_config(&server.uri());
    config.vertex.fallback_region = Some("europe-west4".to_string());
    let router = InferenceFactory::new(&config).build().unwrap();

    let routed = router
        .generate(&request(), &scanrelay::scan::RetryPolicy::from_config(&config.scan))
        .await
        .unwrap();

    assert_eq!(routed.model, "gemini-2.0-flash-001");
    assert!(routed.used_fallback);
    assert_eq!(routed.response.text(), "from fallback");
}
