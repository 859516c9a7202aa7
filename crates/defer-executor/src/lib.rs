//! Deferred fragment execution.
//!
//! This crate turns slow fragments into out-of-order patches:
//! - `Defer` - Inline a fragment if it settles in time, defer it otherwise
//! - `DeferredRegistry` - Completion-ordered patches for deferred fragments
//! - `render_document` - Stream a whole document
//! - Placeholder and patch markup with the client relocation script

mod defer;
mod document;
mod fallback;
mod ordering;
mod registry;

pub use defer::*;
pub use document::*;
pub use fallback::*;
pub use ordering::*;
pub use registry::*;
