//! Vertex AI `generateContent` access: wire types, the authenticated HTTP
//! client and the shared, lazily built handle used by request handlers.

mod client;
mod handle;
mod types;

pub use client::{classify_error, InferenceBackend, VertexClient, GLOBAL_REGION};
pub use handle::{HandleStatus, InferenceFactory, InferenceHandle};
pub use types::{
    Candidate, Content, GenerateRequest, GenerateResponse, GenerationConfig, InlineData, Part,
    PromptFeedback, UsageMetadata,
};
