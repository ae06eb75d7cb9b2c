use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::scan::ScanResult;

/// Coarse classification consumed by the retry loop and the fallback selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    Validation,
    ModelUnavailable,
    RateLimit,
    Inference,
    EmptyResult,
}

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Missing required configuration: {}", .0.join(", "))]
    MissingConfiguration(Vec<String>),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("{0}")]
    Validation(String),

    #[error("Model {model} is unavailable: {message}")]
    ModelUnavailable { model: String, message: String },

    #[error("Rate limit exceeded: {0}")]
    RateLimit(String),

    #[error("Inference error: {0}")]
    Inference(String),

    #[error("Empty response from model {model}: no text was extracted")]
    EmptyResult { model: String },

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ScanError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ScanError::MissingConfiguration(_) | ScanError::Configuration(_) | ScanError::Auth(_) => {
                ErrorKind::Configuration
            }
            ScanError::Validation(_) => ErrorKind::Validation,
            ScanError::ModelUnavailable { .. } => ErrorKind::ModelUnavailable,
            ScanError::RateLimit(_) => ErrorKind::RateLimit,
            ScanError::EmptyResult { .. } => ErrorKind::EmptyResult,
            ScanError::Inference(_) | ScanError::Http(_) | ScanError::Json(_) => {
                ErrorKind::Inference
            }
        }
    }

    pub fn status(&self) -> StatusCode {
        match self.kind() {
            ErrorKind::Validation => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Display strings of this error and every underlying source, outermost first.
    pub fn source_chain(&self) -> Vec<String> {
        let mut chain = vec![self.to_string()];
        let mut current = std::error::Error::source(self);
        while let Some(err) = current {
            chain.push(err.to_string());
            current = err.source();
        }
        chain
    }
}

impl IntoResponse for ScanError {
    fn into_response(self) -> Response {
        (self.status(), Json(ScanResult::from_error(&self, false))).into_response()
    }
}

pub type Result<T> = std::result::Result<T, ScanError>;
