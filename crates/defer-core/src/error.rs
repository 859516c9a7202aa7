//! Render error types.

/// Errors raised by the rendering boundary.
///
/// These are collaborator failures: they end the output stream. Failures of a
/// deferred fragment's eventual value are not `RenderError`s, they are
/// rendered in place of the fragment.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("Render failed: {0}")]
    Failed(String),

    #[error("Deferred content was already rendered")]
    FragmentConsumed,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl RenderError {
    /// Create a render failure with a message.
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}
