use base64::{engine::general_purpose::STANDARD, Engine};

use crate::error::{Result, ScanError};

/// Used when neither the bytes nor the declared type identify the image.
pub const DEFAULT_MIME_TYPE: &str = "image/jpeg";

const PNG_MAGIC: [u8; 4] = [0x89, 0x50, 0x4E, 0x47];
const JPEG_MAGIC: [u8; 2] = [0xFF, 0xD8];

/// An uploaded image and the media type that will be sent to the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePayload {
    bytes: Vec<u8>,
    mime_type: String,
}

impl ImagePayload {
    pub fn new(bytes: Vec<u8>, declared: Option<&str>) -> Self {
        let mime_type = detect_mime_type(&bytes, declared);
        Self { bytes, mime_type }
    }

    /// Decodes plain base64 or a `data:image/...;base64,` URL.
    pub fn from_base64(encoded: &str, declared: Option<&str>) -> Result<Self> {
        let encoded = encoded.trim();
        let (data_url_type, data) = match encoded.strip_prefix("data:") {
            Some(rest) => {
                let (header, data) = rest.split_once(',').ok_or_else(|| {
                    ScanError::Validation("Malformed data URL: missing ',' separator".to_string())
                })?;
                let media_type = header.split(';').next().unwrap_or_default();
                (Some(media_type), data)
            }
            None => (None, encoded),
        };

        let compact: String = data.chars().filter(|c| !c.is_whitespace()).collect();
        let bytes = STANDARD
            .decode(compact.as_bytes())
            .map_err(|e| ScanError::Validation(format!("Image is not valid base64: {e}")))?;

        Ok(Self::new(bytes, declared.or(data_url_type)))
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.bytes)
    }
}

/// Picks the media type from the leading bytes, then from a specific declared
/// `image/*` type, then [`DEFAULT_MIME_TYPE`].
pub fn detect_mime_type(bytes: &[u8], declared: Option<&str>) -> String {
    if bytes.starts_with(&PNG_MAGIC) {
        return "image/png".to_string();
    }
    if bytes.starts_with(&JPEG_MAGIC) {
        return "image/jpeg".to_string();
    }
    if let Some(kind) = infer::get(bytes) {
        if kind.matcher_type() == infer::MatcherType::Image {
            return kind.mime_type().to_string();
        }
    }

    declared
        .and_then(|value| value.split(';').next())
        .map(|value| value.trim().to_ascii_lowercase())
        .filter(|value| value.starts_with("image/") && value != "image/*")
        .unwrap_or_else(|| DEFAULT_MIME_TYPE.to_string())
}
