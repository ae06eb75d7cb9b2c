use axum::extract::multipart::MultipartError;
use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequest, Multipart, Request};
use axum::http::header::CONTENT_TYPE;
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use crate::error::ScanError;
use crate::scan::{ImagePayload, TOO_LARGE_MESSAGE};

/// Multipart field carrying the image.
pub const IMAGE_FIELD: &str = "image";

/// `application/json` alternative to the multipart upload.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ScanJsonBody {
    #[serde(default)]
    image: Option<String>,
    #[serde(default, alias = "mime_type")]
    mime_type: Option<String>,
}

/// The image sent to `POST /scan`, if any.
///
/// Reads the `image` field of a multipart form, or the `image` member of a
/// JSON body (plain base64 or a data URL). A request without an image yields
/// `ImageUpload(None)` so the scanner can report it uniformly.
#[derive(Debug)]
pub struct ImageUpload(pub Option<ImagePayload>);

impl<S> FromRequest<S> for ImageUpload
where
    S: Send + Sync,
{
    type Rejection = ScanError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_json = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(is_json_content_type)
            .unwrap_or(false);

        if is_json {
            let Json(body) = Json::<ScanJsonBody>::from_request(req, state)
                .await
                .map_err(map_json_rejection)?;
            return body
                .image
                .filter(|image| !image.trim().is_empty())
                .map(|image| ImagePayload::from_base64(&image, body.mime_type.as_deref()))
                .transpose()
                .map(ImageUpload);
        }

        let mut multipart = match Multipart::from_request(req, state).await {
            Ok(multipart) => multipart,
            Err(rejection) => {
                tracing::debug!("Request has no multipart body: {}", rejection.body_text());
                return Ok(ImageUpload(None));
            }
        };

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| multipart_error(e, "Malformed multipart body"))?
        {
            if field.name() != Some(IMAGE_FIELD) {
                continue;
            }

            let content_type = field.content_type().map(str::to_string);
            let bytes = field
                .bytes()
                .await
                .map_err(|e| multipart_error(e, "Failed to read image"))?;

            return Ok(ImageUpload(Some(ImagePayload::new(
                bytes.to_vec(),
                content_type.as_deref(),
            ))));
        }

        Ok(ImageUpload(None))
    }
}

/// Media types compare case-insensitively and may carry parameters.
fn is_json_content_type(value: &str) -> bool {
    let essence = value.split(';').next().unwrap_or_default().trim();
    essence.eq_ignore_ascii_case("application/json")
        || essence
            .rsplit_once('+')
            .is_some_and(|(_, suffix)| suffix.eq_ignore_ascii_case("json"))
}

fn too_large() -> ScanError {
    ScanError::Validation(format!(
        "{TOO_LARGE_MESSAGE}: request body exceeds the configured upload limit"
    ))
}

fn multipart_error(err: MultipartError, context: &str) -> ScanError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        return too_large();
    }
    ScanError::Validation(format!("{context}: {err}"))
}

fn map_json_rejection(rejection: JsonRejection) -> ScanError {
    if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
        return too_large();
    }
    match rejection {
        JsonRejection::JsonDataError(err) => ScanError::Validation(format!("Invalid JSON: {err}")),
        JsonRejection::JsonSyntaxError(err) => {
            ScanError::Validation(format!("JSON syntax error: {err}"))
        }
        JsonRejection::BytesRejection(err) => {
            ScanError::Validation(format!("Failed to read request body: {err}"))
        }
        _ => ScanError::Validation(rejection.body_text()),
    }
}
