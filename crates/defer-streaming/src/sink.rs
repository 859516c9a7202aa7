//! Writing chunk streams out as bytes.

use std::fmt::Display;

use defer_core::{LifecyclePhase, RenderError, TimingContext};
use futures::{Sink, SinkExt, Stream, StreamExt};

use crate::chunk::Chunk;
use crate::error::StreamError;

/// Convert a chunk stream into a stream of byte buffers.
pub fn into_byte_stream<S>(stream: S) -> impl Stream<Item = Result<Vec<u8>, StreamError>>
where
    S: Stream<Item = Result<Chunk, RenderError>>,
{
    stream.map(|chunk| {
        chunk
            .map(|chunk| chunk.into_string().into_bytes())
            .map_err(StreamError::from)
    })
}

/// Drain a chunk stream into a single string.
pub async fn collect_to_string<S>(stream: S) -> Result<String, StreamError>
where
    S: Stream<Item = Result<Chunk, RenderError>>,
{
    let mut stream = std::pin::pin!(stream);
    let mut content = String::new();
    while let Some(chunk) = stream.next().await {
        content.push_str(chunk?.as_str());
    }
    Ok(content)
}

/// Forwards a document's chunks into a byte sink, tracking lifecycle.
///
/// This is generic over the underlying sink type to work with any
/// `Sink<Vec<u8>>` implementation, such as a channel feeding an HTTP body.
pub struct StreamingSink<S, E>
where
    S: Sink<Vec<u8>, Error = E> + Unpin,
    E: Display,
{
    inner: S,
    phase: LifecyclePhase,
    timing: TimingContext,
    chunks_sent: usize,
    bytes_sent: usize,
}

impl<S, E> StreamingSink<S, E>
where
    S: Sink<Vec<u8>, Error = E> + Unpin,
    E: Display,
{
    /// Create a new streaming sink.
    pub fn new(sink: S, timing: TimingContext) -> Self {
        Self {
            inner: sink,
            phase: LifecyclePhase::Start,
            timing,
            chunks_sent: 0,
            bytes_sent: 0,
        }
    }

    /// Write one chunk.
    pub async fn send_chunk(&mut self, chunk: Chunk) -> Result<(), StreamError> {
        if matches!(
            self.phase,
            LifecyclePhase::Completion | LifecyclePhase::Error(_)
        ) {
            return Err(StreamError::Completed);
        }
        if chunk.is_empty() {
            return Ok(());
        }

        let slot = chunk.slot().map(str::to_string);
        let bytes = chunk.into_string().into_bytes();
        let len = bytes.len();

        self.inner
            .send(bytes)
            .await
            .map_err(|e| StreamError::Sink(e.to_string()))?;

        self.chunks_sent += 1;
        self.bytes_sent += len;

        if self.phase == LifecyclePhase::Start {
            self.timing.mark("shell_sent");
            self.phase = LifecyclePhase::ShellSent;
        }
        if let Some(slot) = slot {
            self.timing.mark_patch_sent(&slot);
            self.phase = LifecyclePhase::PatchSent(slot);
        }

        Ok(())
    }

    /// Write every chunk of `stream`, then complete.
    ///
    /// A render error ends the response: it is recorded in the lifecycle
    /// phase and returned.
    pub async fn send_all<St>(&mut self, stream: St) -> Result<(), StreamError>
    where
        St: Stream<Item = Result<Chunk, RenderError>>,
    {
        let mut stream = std::pin::pin!(stream);
        while let Some(chunk) = stream.next().await {
            let result = match chunk {
                Ok(chunk) => self.send_chunk(chunk).await,
                Err(error) => Err(StreamError::from(error)),
            };
            if let Err(error) = result {
                self.phase = LifecyclePhase::Error(error.to_string());
                return Err(error);
            }
        }
        self.complete().await
    }

    /// Flush and complete the response.
    pub async fn complete(&mut self) -> Result<(), StreamError> {
        self.inner
            .flush()
            .await
            .map_err(|e| StreamError::Sink(e.to_string()))?;
        self.phase = LifecyclePhase::Completion;
        self.timing.mark("complete");
        Ok(())
    }

    /// Get the current lifecycle phase.
    pub fn phase(&self) -> &LifecyclePhase {
        &self.phase
    }

    /// Number of chunks written.
    pub fn chunks_sent(&self) -> usize {
        self.chunks_sent
    }

    /// Number of bytes written.
    pub fn bytes_sent(&self) -> usize {
        self.bytes_sent
    }

    /// Get timing context reference.
    pub fn timing(&self) -> &TimingContext {
        &self.timing
    }

    /// Consume the sink and return the inner value.
    pub fn into_inner(self) -> S {
        self.inner
    }
}
