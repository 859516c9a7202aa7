//! Ambient values visible to a subtree.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Typed, immutable bag of ambient values.
///
/// Values are keyed by type, so every type has at most one visible value.
/// Cloning is cheap and yields a snapshot: later `with` calls on either
/// copy never affect the other.
#[derive(Clone, Default)]
pub struct Environment {
    values: Arc<HashMap<TypeId, Arc<dyn Any + Send + Sync>>>,
}

impl Environment {
    /// Create an empty environment.
    pub fn new() -> Self {
        Self::default()
    }

    /// Return a child environment with `value` visible, shadowing any
    /// previous value of the same type.
    pub fn with<T: Send + Sync + 'static>(&self, value: T) -> Self {
        self.with_shared(Arc::new(value))
    }

    /// Like [`Environment::with`], for a value that is already shared.
    pub fn with_shared<T: Send + Sync + 'static>(&self, value: Arc<T>) -> Self {
        let mut values = (*self.values).clone();
        values.insert(TypeId::of::<T>(), value);
        Self {
            values: Arc::new(values),
        }
    }

    /// Look up the visible value of type `T`.
    pub fn get<T: Send + Sync + 'static>(&self) -> Option<&T> {
        self.values
            .get(&TypeId::of::<T>())
            .and_then(|value| value.downcast_ref::<T>())
    }

    /// Check whether a value of type `T` is visible.
    pub fn contains<T: Send + Sync + 'static>(&self) -> bool {
        self.values.contains_key(&TypeId::of::<T>())
    }

    /// Number of visible values.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether no values are visible.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl fmt::Debug for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Environment")
            .field("values", &self.values.len())
            .finish()
    }
}
