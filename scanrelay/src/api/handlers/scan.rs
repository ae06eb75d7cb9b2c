use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;

use crate::api::extractors::ImageUpload;
use crate::api::state::AppState;
use crate::error::{ErrorKind, ScanError};
use crate::scan::ScanResult;

/// `POST /scan`
///
/// Always answers with a [`ScanResult`] body: 200 with the text, 400 for a
/// bad upload, 500 for everything else.
pub async fn scan_image(
    State(state): State<AppState>,
    upload: Result<ImageUpload, ScanError>,
) -> (StatusCode, Json<ScanResult>) {
    let outcome = match upload {
        Ok(ImageUpload(image)) => state.scanner.scan(image).await,
        Err(e) => Err(e),
    };

    match &outcome {
        Ok(output) => tracing::info!(
            model = %output.model,
            chars = output.text.chars().count(),
            fallback = output.fallback_from.is_some(),
            "Scan succeeded"
        ),
        Err(e) if e.kind() == ErrorKind::Validation => {
            tracing::info!("Rejected scan request: {}", e)
        }
        Err(e) => tracing::error!(kind = ?e.kind(), "Scan failed: {}", e),
    }

    let (status, body) = ScanResult::normalize(&outcome, state.config.scan.expose_error_details);
    (status, Json(body))
}
