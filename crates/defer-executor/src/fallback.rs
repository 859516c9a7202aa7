//! Rendering of failed fragments.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use defer_core::{BoxNode, Element, NodeExt};

/// Callback rendering a fragment's failure.
pub type ErrorRender = Arc<dyn Fn(anyhow::Error) -> BoxNode + Send + Sync>;

/// Built-in rendering of a fragment failure.
pub fn error_node(message: &str) -> BoxNode {
    Element::new("div")
        .attr("class", "deferred-error")
        .text(message)
        .boxed()
}

/// Render a fragment failure with `on_error`, falling back to
/// [`error_node`] when there is no callback or the callback panics.
pub fn render_failure(on_error: Option<&ErrorRender>, error: anyhow::Error) -> BoxNode {
    let message = format!("{:#}", error);
    let Some(on_error) = on_error else {
        return error_node(&message);
    };

    match catch_unwind(AssertUnwindSafe(|| on_error(error))) {
        Ok(node) => node,
        Err(_) => {
            tracing::warn!(error = %message, "failure render panicked");
            error_node(&message)
        }
    }
}
