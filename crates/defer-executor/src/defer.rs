//! Inline-or-defer decision for slow fragments.

use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use defer_core::{BoxNode, Environment, Node, RenderError};
use defer_data::{race, RaceOutcome};
use futures::future::BoxFuture;
use futures::FutureExt;

use crate::fallback::{render_failure, ErrorRender};
use crate::ordering::placeholder;
use crate::registry::{DeferredFragment, DeferredSlots, ValueRender};

/// Callback rendering the stand-in shown while a fragment is deferred.
pub type FallbackRender = Arc<dyn Fn() -> BoxNode + Send + Sync>;

/// A fragment backed by an eventual value.
///
/// Inside a document body, the value gets the registry's timeout to settle.
/// If it does, the fragment renders inline from the value (or from the
/// failure). If not, the fallback renders inline inside a placeholder and
/// the fragment is handed to the registry, which later streams a patch
/// replacing the placeholder.
///
/// Outside a document body (no [`DeferredSlots`] in the environment, as in
/// the head) the value is awaited inline however long it takes.
///
/// A `Defer` renders once; rendering it again returns
/// [`RenderError::FragmentConsumed`].
pub struct Defer<T> {
    value: Mutex<Option<BoxFuture<'static, anyhow::Result<T>>>>,
    render: ValueRender<T>,
    fallback: FallbackRender,
    on_error: Option<ErrorRender>,
}

impl<T: Send + 'static> Defer<T> {
    /// Create a fragment from its eventual value, the render of that value
    /// and the render shown while it is deferred.
    pub fn new<F, R, B>(value: F, render: R, fallback: B) -> Self
    where
        F: Future<Output = anyhow::Result<T>> + Send + 'static,
        R: Fn(T) -> BoxNode + Send + Sync + 'static,
        B: Fn() -> BoxNode + Send + Sync + 'static,
    {
        Self {
            value: Mutex::new(Some(value.boxed())),
            render: Arc::new(render),
            fallback: Arc::new(fallback),
            on_error: None,
        }
    }

    /// Render failures of the value with `on_error` instead of the built-in
    /// error element.
    pub fn on_error<E>(mut self, on_error: E) -> Self
    where
        E: Fn(anyhow::Error) -> BoxNode + Send + Sync + 'static,
    {
        self.on_error = Some(Arc::new(on_error));
        self
    }

    fn settled(&self, value: anyhow::Result<T>) -> BoxNode {
        match value {
            Ok(value) => (self.render)(value),
            Err(error) => render_failure(self.on_error.as_ref(), error),
        }
    }
}

#[async_trait]
impl<T: Send + 'static> Node for Defer<T> {
    async fn render(&self, env: &Environment) -> Result<String, RenderError> {
        let value = self
            .value
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .ok_or(RenderError::FragmentConsumed)?;

        let Some(slots) = env.get::<DeferredSlots>() else {
            let node = self.settled(value.await);
            return node.render(env).await;
        };

        match race(value, slots.timeout()).await {
            RaceOutcome::Resolved(value) => {
                tracing::trace!("deferred fragment settled in time");
                self.settled(Ok(value)).render(env).await
            }
            RaceOutcome::Rejected(error) => {
                tracing::trace!("deferred fragment failed in time");
                self.settled(Err(error)).render(env).await
            }
            RaceOutcome::TimedOut(value) => {
                let id = slots.register(DeferredFragment {
                    value,
                    render: Arc::clone(&self.render),
                    on_error: self.on_error.clone(),
                    env: env.clone(),
                });
                let fallback = (self.fallback)().render(env).await?;
                Ok(placeholder(&id.to_string(), &fallback))
            }
        }
    }
}
