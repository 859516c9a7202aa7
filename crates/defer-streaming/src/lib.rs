//! Template compilation and chunk streaming for deferred SSR.
//!
//! This crate provides:
//! - `compile` / `CompiledTemplate` - `{{name}}` pattern compilation
//! - `TemplateStream` - Ordered, pull-based slot resolution
//! - Document shell markup and `DefaultHead`
//! - `StreamingSink` / `into_byte_stream` - Writing chunks out

mod chunk;
mod error;
mod generator;
mod shell;
mod sink;
mod template;

pub use chunk::*;
pub use error::*;
pub use generator::*;
pub use shell::*;
pub use sink::*;
pub use template::*;
