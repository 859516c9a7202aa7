//! Registry of deferred fragments.

use std::fmt;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};
use std::time::Duration;

use defer_core::{BoxNode, Environment, Node, RenderError};
use defer_streaming::Chunk;
use futures::channel::mpsc;
use futures::future::BoxFuture;
use futures::{FutureExt, Stream, StreamExt};
use tokio::task::AbortHandle;

use crate::fallback::{render_failure, ErrorRender};
use crate::ordering::patch_markup;

/// Identifier of a deferred slot, unique within one document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotId(pub usize);

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "slot-{}", self.0)
    }
}

/// Callback rendering a fragment's resolved value.
pub type ValueRender<T> = Arc<dyn Fn(T) -> BoxNode + Send + Sync>;

/// A fragment whose value missed its timeout.
pub struct DeferredFragment<T> {
    /// The still-running eventual value.
    pub value: BoxFuture<'static, anyhow::Result<T>>,
    /// Renders the value once it resolves.
    pub render: ValueRender<T>,
    /// Renders the error if the value fails.
    pub on_error: Option<ErrorRender>,
    /// Environment snapshot from the fragment's position in the tree.
    pub env: Environment,
}

type Patch = Result<Chunk, RenderError>;

#[derive(Default)]
struct Tasks {
    handles: Vec<AbortHandle>,
    closed: bool,
}

struct Shared {
    next_id: AtomicUsize,
    pending: AtomicUsize,
    timeout: Duration,
    ready: mpsc::UnboundedSender<Patch>,
    tasks: Mutex<Tasks>,
}

impl Shared {
    fn tasks(&self) -> MutexGuard<'_, Tasks> {
        self.tasks.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Handle for handing fragments to a registry.
///
/// The document renderer makes this visible to the body through the
/// [`Environment`], which is how `Defer` finds it. Snapshots taken for
/// deferred fragments carry it too, so fragments nested in deferred
/// content register with the same registry.
#[derive(Clone)]
pub struct DeferredSlots {
    shared: Arc<Shared>,
}

impl DeferredSlots {
    /// Time a fragment may take and still be inlined.
    pub fn timeout(&self) -> Duration {
        self.shared.timeout
    }

    /// Number of registered fragments whose patch has not been drained.
    pub fn pending(&self) -> usize {
        self.shared.pending.load(Ordering::SeqCst)
    }

    /// Register a fragment, returning its slot identifier.
    ///
    /// Never blocks. The fragment is spawned onto the tokio runtime right
    /// away and its patch is buffered until drained. If the drain was
    /// dropped the fragment is discarded.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    pub fn register<T: Send + 'static>(&self, fragment: DeferredFragment<T>) -> SlotId {
        let id = SlotId(self.shared.next_id.fetch_add(1, Ordering::SeqCst));

        let mut tasks = self.shared.tasks();
        if tasks.closed {
            tracing::debug!(slot = %id, "registry drain dropped, fragment discarded");
            return id;
        }

        let pending = self.shared.pending.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::debug!(slot = %id, pending, "registered deferred fragment");

        let ready = self.shared.ready.clone();
        let patch = settle(id, fragment);
        let task = tokio::spawn(async move {
            let patch = match AssertUnwindSafe(patch).catch_unwind().await {
                Ok(patch) => patch,
                Err(_) => Err(RenderError::failed(format!("rendering {} panicked", id))),
            };
            let _ = ready.unbounded_send(patch);
        });
        tasks.handles.push(task.abort_handle());

        id
    }
}

impl fmt::Debug for DeferredSlots {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeferredSlots")
            .field("timeout", &self.timeout())
            .field("pending", &self.pending())
            .finish()
    }
}

fn settle<T: Send + 'static>(id: SlotId, fragment: DeferredFragment<T>) -> BoxFuture<'static, Patch> {
    let DeferredFragment {
        value,
        render,
        on_error,
        env,
    } = fragment;

    async move {
        let node = match value.await {
            Ok(value) => render(value),
            Err(error) => {
                let message = format!("{:#}", error);
                tracing::warn!(slot = %id, error = %message, "deferred fragment failed");
                render_failure(on_error.as_ref(), error)
            }
        };

        let html = node.render(&env).await?;
        let slot = id.to_string();
        Ok(Chunk::Patch {
            markup: patch_markup(&slot, &html),
            slot,
        })
    }
    .boxed()
}

/// Per-document registry of deferred fragments.
pub struct DeferredRegistry {
    slots: DeferredSlots,
    chunks: DeferredChunks,
}

impl DeferredRegistry {
    /// Create a registry whose fragments are inlined if they settle within
    /// `timeout`.
    pub fn new(timeout: Duration) -> Self {
        let (ready, receiver) = mpsc::unbounded();
        let shared = Arc::new(Shared {
            next_id: AtomicUsize::new(0),
            pending: AtomicUsize::new(0),
            timeout,
            ready,
            tasks: Mutex::new(Tasks::default()),
        });

        Self {
            slots: DeferredSlots {
                shared: Arc::clone(&shared),
            },
            chunks: DeferredChunks {
                shared,
                ready: receiver,
            },
        }
    }

    /// Get a registration handle.
    pub fn slots(&self) -> DeferredSlots {
        self.slots.clone()
    }

    /// Register a fragment, returning its slot identifier.
    pub fn register<T: Send + 'static>(&self, fragment: DeferredFragment<T>) -> SlotId {
        self.slots.register(fragment)
    }

    /// Number of registered fragments whose patch has not been drained.
    pub fn pending(&self) -> usize {
        self.slots.pending()
    }

    /// Stream the patches of registered fragments in completion order.
    pub fn drain(self) -> DeferredChunks {
        self.chunks
    }
}

/// Patches of deferred fragments, in the order the fragments complete.
///
/// Patches of fragments that completed before draining started are
/// buffered and yielded first. The stream ends once every registered
/// fragment has produced its patch, including fragments registered after
/// draining started. Dropping it aborts fragments still in flight.
pub struct DeferredChunks {
    shared: Arc<Shared>,
    ready: mpsc::UnboundedReceiver<Patch>,
}

impl DeferredChunks {
    /// Number of registered fragments whose patch has not been yielded.
    pub fn pending(&self) -> usize {
        self.shared.pending.load(Ordering::SeqCst)
    }
}

impl Stream for DeferredChunks {
    type Item = Result<Chunk, RenderError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        match this.ready.poll_next_unpin(cx) {
            Poll::Ready(Some(patch)) => {
                let pending = this.shared.pending.fetch_sub(1, Ordering::SeqCst) - 1;
                if let Ok(chunk) = &patch {
                    tracing::debug!(slot = chunk.slot(), pending, "deferred fragment ready");
                }
                Poll::Ready(Some(patch))
            }
            Poll::Ready(None) => Poll::Ready(None),
            // A fragment registering a nested one is still pending itself,
            // so zero means nothing more can arrive.
            Poll::Pending if this.pending() == 0 => Poll::Ready(None),
            Poll::Pending => Poll::Pending,
        }
    }
}

impl Drop for DeferredChunks {
    fn drop(&mut self) {
        let mut tasks = self.shared.tasks();
        tasks.closed = true;
        for task in tasks.handles.drain(..) {
            task.abort();
        }
    }
}
