use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::api::state::AppState;

/// Liveness plus the configured models and client initialization status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthData {
    pub status: String,
    pub version: String,
    pub model: String,
    pub fallback_model: String,
    pub region: String,
    pub init_success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub init_message: Option<String>,
}

/// `GET /` and `GET /ping`
pub async fn health_check(State(state): State<AppState>) -> Json<HealthData> {
    let init = state.scanner.handle().status().await;

    Json(HealthData {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        model: state.config.vertex.model.clone(),
        fallback_model: state.config.vertex.fallback_model.clone(),
        region: state.config.vertex.region.clone(),
        init_success: init.initialized,
        init_message: init.message,
    })
}
