//! Vision module for the external image-understanding service
//!
//! Captures are flattened to PNG and sent to a chat-completions model,
//! which answers with free-form text for the time extractor.

mod client;
mod encode;

use std::future::Future;

use thiserror::Error;

pub use client::{Client, DEFAULT_ENDPOINT, DEFAULT_MODEL};
pub use encode::prepare_png;

/// Vision service errors.
#[derive(Debug, Error)]
pub enum VisionError {
    /// The provided API key was invalid.
    #[error("invalid API key: {reason}")]
    InvalidApiKey { reason: &'static str },
    /// Failed to build HTTP client.
    #[error("failed to build HTTP client: {0}")]
    ClientBuild(#[source] reqwest::Error),
    /// HTTP request failed.
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    /// API returned an error response.
    #[error("API error: {message}")]
    Api { message: String },
    /// Failed to parse response.
    #[error("invalid response: {0}")]
    InvalidResponse(String),
    /// The capture could not be decoded or re-encoded.
    #[error("invalid image: {0}")]
    Image(String),
}

/// A model that reads text out of a PNG image
pub trait VisionModel: Send + Sync {
    /// Returns the model's text, or `None` when it answered without any
    fn read_image(&self, png: &[u8]) -> impl Future<Output = Result<Option<String>, VisionError>> + Send;
}
