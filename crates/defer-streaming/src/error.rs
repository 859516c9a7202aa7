//! Streaming error types.

use defer_core::RenderError;

/// Errors that end a document stream.
#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    #[error("Render error: {0}")]
    Render(#[from] RenderError),

    #[error("Sink error: {0}")]
    Sink(String),

    #[error("Stream already completed")]
    Completed,
}
