use axum::http::StatusCode;
use serde::{Deserialize, Serialize};

use super::orchestrator::ScanOutput;
use crate::error::{Result, ScanError};

/// JSON body returned by `POST /scan`, for successes and failures alike.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub info: Option<String>,
    /// Error source chain, only present when detail exposure is enabled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<String>>,
}

impl ScanResult {
    pub fn success(output: &ScanOutput) -> Self {
        Self {
            success: true,
            text: Some(output.text.clone()),
            error: None,
            model: Some(output.model.clone()),
            info: output.fallback_from.as_ref().map(|preferred| {
                format!(
                    "Model {preferred} was unavailable; text extracted with fallback model {}",
                    output.model
                )
            }),
            details: None,
        }
    }

    pub fn from_error(err: &ScanError, expose_details: bool) -> Self {
        Self {
            success: false,
            text: None,
            error: Some(err.to_string()),
            model: None,
            info: None,
            details: expose_details.then(|| err.source_chain()),
        }
    }

    /// Status code and body for a finished scan.
    pub fn normalize(outcome: &Result<ScanOutput>, expose_details: bool) -> (StatusCode, Self) {
        match outcome {
            Ok(output) => (StatusCode::OK, Self::success(output)),
            Err(err) => (err.status(), Self::from_error(err, expose_details)),
        }
    }
}
