//! Ordered, pull-based resolution of a compiled template.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use defer_core::RenderError;
use futures::future::{BoxFuture, MaybeDone};
use futures::stream::BoxStream;
use futures::{FutureExt, Stream, StreamExt};

use crate::chunk::Chunk;
use crate::template::CompiledTemplate;

/// Content source for a template placeholder.
pub enum SlotValue {
    /// Text available immediately.
    Text(String),
    /// Text available once a future completes.
    Pending(BoxFuture<'static, Result<String, RenderError>>),
    /// Any number of chunks, available as a stream yields them.
    Sequence(BoxStream<'static, Result<Chunk, RenderError>>),
}

impl SlotValue {
    /// Create a slot resolved by a future.
    pub fn pending<F>(future: F) -> Self
    where
        F: Future<Output = Result<String, RenderError>> + Send + 'static,
    {
        Self::Pending(future.boxed())
    }

    /// Create a slot resolved by draining a stream.
    pub fn sequence<S>(stream: S) -> Self
    where
        S: Stream<Item = Result<Chunk, RenderError>> + Send + 'static,
    {
        Self::Sequence(stream.boxed())
    }
}

impl From<String> for SlotValue {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&str> for SlotValue {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

enum SlotState {
    Text(String),
    Pending(MaybeDone<BoxFuture<'static, Result<String, RenderError>>>),
    Sequence(BoxStream<'static, Result<Chunk, RenderError>>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Segment,
    Slot,
}

/// Stream of chunks produced by walking a compiled template.
///
/// Literal segments and slot values are yielded strictly in template
/// order. A pending slot suspends the stream until it completes and a
/// sequence slot is drained to exhaustion before the walk continues.
/// While the stream waits, pending slots further along the template are
/// driven too, so independent renders overlap. Sequences are only polled
/// at their own position.
///
/// Placeholders without a content source resolve to nothing. A
/// `RenderError` from any slot is yielded once and ends the stream.
pub struct TemplateStream {
    template: Arc<CompiledTemplate>,
    slots: Vec<Option<SlotState>>,
    position: usize,
    stage: Stage,
    finished: bool,
}

/// Walk `template`, resolving each placeholder from `values`.
///
/// A name repeated in the template resolves from the same value: text is
/// repeated, while a future or stream is consumed at its first position and
/// later positions resolve to nothing.
pub fn render_template(
    template: Arc<CompiledTemplate>,
    mut values: HashMap<String, SlotValue>,
) -> TemplateStream {
    let slots = template
        .slots()
        .iter()
        .map(|name| match values.get(name) {
            Some(SlotValue::Text(text)) => Some(SlotState::Text(text.clone())),
            Some(_) => match values.remove(name) {
                Some(SlotValue::Pending(future)) => {
                    Some(SlotState::Pending(MaybeDone::Future(future)))
                }
                Some(SlotValue::Sequence(stream)) => Some(SlotState::Sequence(stream)),
                _ => None,
            },
            None => {
                tracing::debug!(slot = %name, "no content source for template slot");
                None
            }
        })
        .collect();

    TemplateStream {
        template,
        slots,
        position: 0,
        stage: Stage::Segment,
        finished: false,
    }
}

impl TemplateStream {
    fn drive_pending(&mut self, cx: &mut Context<'_>) {
        for slot in self.slots.iter_mut().skip(self.position).flatten() {
            if let SlotState::Pending(future @ MaybeDone::Future(_)) = slot {
                let _ = Pin::new(future).poll(cx);
            }
        }
    }

    fn advance(&mut self) {
        if let Some(slot) = self.slots.get_mut(self.position) {
            *slot = None;
        }
        self.position += 1;
        self.stage = Stage::Segment;
    }

    fn fail(&mut self, error: RenderError) -> Poll<Option<Result<Chunk, RenderError>>> {
        tracing::warn!(error = %error, position = self.position, "template stream failed");
        self.finished = true;
        Poll::Ready(Some(Err(error)))
    }
}

impl Stream for TemplateStream {
    type Item = Result<Chunk, RenderError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        loop {
            if this.finished {
                return Poll::Ready(None);
            }

            this.drive_pending(cx);

            match this.stage {
                Stage::Segment => {
                    this.stage = Stage::Slot;
                    let segment = &this.template.segments()[this.position];
                    if !segment.is_empty() {
                        return Poll::Ready(Some(Ok(Chunk::Literal(segment.clone()))));
                    }
                }
                Stage::Slot if this.position >= this.template.slots().len() => {
                    this.finished = true;
                    return Poll::Ready(None);
                }
                Stage::Slot => match this.slots[this.position].as_mut() {
                    None => this.advance(),
                    Some(SlotState::Text(text)) => {
                        let text = std::mem::take(text);
                        this.advance();
                        if !text.is_empty() {
                            return Poll::Ready(Some(Ok(Chunk::Content(text))));
                        }
                    }
                    Some(SlotState::Pending(future)) => {
                        let mut future = Pin::new(future);
                        if future.as_mut().poll(cx).is_pending() {
                            return Poll::Pending;
                        }
                        let output = future.take_output();
                        this.advance();
                        match output {
                            Some(Ok(text)) if !text.is_empty() => {
                                return Poll::Ready(Some(Ok(Chunk::Content(text))));
                            }
                            Some(Err(error)) => return this.fail(error),
                            _ => {}
                        }
                    }
                    Some(SlotState::Sequence(stream)) => match stream.poll_next_unpin(cx) {
                        Poll::Pending => return Poll::Pending,
                        Poll::Ready(Some(Ok(chunk))) => return Poll::Ready(Some(Ok(chunk))),
                        Poll::Ready(Some(Err(error))) => return this.fail(error),
                        Poll::Ready(None) => this.advance(),
                    },
                },
            }
        }
    }
}
