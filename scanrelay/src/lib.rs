//! HTTP relay that extracts text from images with Gemini models on Vertex AI.

pub mod api;
pub mod config;
pub mod credentials;
pub mod error;
pub mod scan;
pub mod vertex;
