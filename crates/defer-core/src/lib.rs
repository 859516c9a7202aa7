//! Core abstractions for deferred streaming SSR.
//!
//! This crate provides the fundamental types and traits:
//! - `Node` trait - Render a subtree to markup
//! - `Environment` - Ambient values visible to a subtree
//! - `StreamConfig` - Render configuration
//! - `TimingContext` / `LifecyclePhase` - Response lifecycle tracking

mod config;
mod context;
mod env;
mod error;
mod lifecycle;
mod node;

pub use config::*;
pub use context::*;
pub use env::*;
pub use error::*;
pub use lifecycle::*;
pub use node::*;
