//! Whole-document rendering.

use std::collections::HashMap;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use defer_core::{BoxNode, Environment, Node, NodeExt, RenderError, RequestId, StreamConfig};
use defer_streaming::{
    compile, document_template, into_byte_stream, render_template, safari_pad, Chunk,
    DefaultHead, SlotValue, StreamError, TemplateStream, BODY_SLOT, DEFERRED_SLOTS,
    END_OF_BODY_SLOT, HEAD_SLOT, SAFARI_PAD_SLOT,
};
use futures::{Stream, StreamExt};

use crate::registry::DeferredRegistry;

/// Per-request document settings.
pub struct RenderSettings {
    /// Head content. Defaults to [`DefaultHead`].
    pub head: Option<BoxNode>,
    /// Content rendered after the deferred patches, before `</body>`.
    pub end_of_body: Option<BoxNode>,
    /// Time a deferred fragment may take and still be inlined.
    pub timeout: Duration,
    /// Custom document pattern used instead of the built-in one.
    pub template: Option<String>,
    /// Identifier recorded on the render span.
    pub request_id: RequestId,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            head: None,
            end_of_body: None,
            timeout: StreamConfig::default().timeout(),
            template: None,
            request_id: RequestId::generate(),
        }
    }
}

impl RenderSettings {
    /// Default settings with a fresh request id.
    pub fn new() -> Self {
        Self::default()
    }

    /// Settings taken from shared configuration.
    pub fn from_config(config: &StreamConfig) -> Self {
        Self {
            timeout: config.timeout(),
            template: config.template.clone(),
            ..Self::default()
        }
    }

    /// Set the head content.
    pub fn with_head(mut self, head: impl Node + 'static) -> Self {
        self.head = Some(head.boxed());
        self
    }

    /// Set content rendered after the deferred patches.
    pub fn with_end_of_body(mut self, end_of_body: impl Node + 'static) -> Self {
        self.end_of_body = Some(end_of_body.boxed());
        self
    }

    /// Set the inline-vs-defer timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Use a custom document pattern.
    pub fn with_template(mut self, template: impl Into<String>) -> Self {
        self.template = Some(template.into());
        self
    }

    /// Set the request id.
    pub fn with_request_id(mut self, request_id: RequestId) -> Self {
        self.request_id = request_id;
        self
    }
}

/// Stream a complete document for `body`.
///
/// The head renders without a registry, so fragments in it are awaited
/// inline. The body renders with a fresh [`DeferredRegistry`] in its
/// environment; fragments that miss the timeout are streamed as patches
/// after the body, in completion order, and the document closes once all
/// of them have been written.
pub fn render_document(settings: RenderSettings, body: impl Node + 'static) -> DocumentStream {
    let RenderSettings {
        head,
        end_of_body,
        timeout,
        template,
        request_id,
    } = settings;

    let template = match template {
        Some(pattern) => Arc::new(compile(&pattern)),
        None => document_template(),
    };

    let registry = DeferredRegistry::new(timeout);
    let body_env = Environment::new().with(registry.slots());
    let head = head.unwrap_or_else(|| DefaultHead::new().boxed());

    let mut values = HashMap::from([
        (
            HEAD_SLOT.to_string(),
            SlotValue::pending(async move { head.render(&Environment::new()).await }),
        ),
        (SAFARI_PAD_SLOT.to_string(), SlotValue::from(safari_pad())),
        (
            BODY_SLOT.to_string(),
            SlotValue::pending(async move { body.render(&body_env).await }),
        ),
        (
            DEFERRED_SLOTS.to_string(),
            SlotValue::sequence(registry.drain()),
        ),
    ]);
    if let Some(end_of_body) = end_of_body {
        values.insert(
            END_OF_BODY_SLOT.to_string(),
            SlotValue::pending(async move { end_of_body.render(&Environment::new()).await }),
        );
    }

    let span = tracing::info_span!("render_document", request_id = %request_id);
    span.in_scope(|| tracing::debug!(timeout_ms = timeout.as_millis() as u64, "rendering document"));

    DocumentStream {
        inner: render_template(template, values),
        span,
        request_id,
        chunks: 0,
    }
}

/// [`render_document`] as a stream of byte buffers, ready for an HTTP body.
pub fn render_document_bytes(
    settings: RenderSettings,
    body: impl Node + 'static,
) -> impl Stream<Item = Result<Vec<u8>, StreamError>> + Send {
    into_byte_stream(render_document(settings, body))
}

/// Chunks of a streamed document.
///
/// The head, body and trailing content progress while this stream is
/// polled. Deferred fragments run as tasks from the moment they miss their
/// timeout. Dropping the stream cancels all of them.
pub struct DocumentStream {
    inner: TemplateStream,
    span: tracing::Span,
    request_id: RequestId,
    chunks: usize,
}

impl DocumentStream {
    /// Identifier of the request this document is rendered for.
    pub fn request_id(&self) -> &RequestId {
        &self.request_id
    }
}

impl Stream for DocumentStream {
    type Item = Result<Chunk, RenderError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        let _entered = this.span.enter();

        let poll = this.inner.poll_next_unpin(cx);
        match &poll {
            Poll::Ready(Some(Ok(_))) => this.chunks += 1,
            Poll::Ready(None) => tracing::debug!(chunks = this.chunks, "document complete"),
            _ => {}
        }
        poll
    }
}
