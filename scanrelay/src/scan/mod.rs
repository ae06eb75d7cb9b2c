//! The scan pipeline: image payload handling, retry and fallback around the
//! model call, and the uniform result body.

mod fallback;
mod orchestrator;
mod payload;
mod response;
mod retry;

pub use fallback::{ModelRoute, ModelRouter, RoutedResponse};
pub use orchestrator::{
    ScanOutput, Scanner, EXTRACTION_PROMPT, NO_IMAGE_MESSAGE, TOO_LARGE_MESSAGE,
};
pub use payload::{detect_mime_type, ImagePayload, DEFAULT_MIME_TYPE};
pub use response::ScanResult;
pub use retry::RetryPolicy;
