//! Progressive HTML streaming with deferred fragments.
//!
//! This crate re-exports the whole toolkit:
//!
//! ```ignore
//! use defer_sdk::prelude::*;
//!
//! let body = Element::new("main").child(
//!     Defer::new(
//!         fetch_reviews(product_id),
//!         |reviews: Vec<Review>| render_reviews(reviews),
//!         || Text::new("Loading reviews...").boxed(),
//!     )
//!     .on_error(|_| Text::new("Reviews are unavailable").boxed()),
//! );
//!
//! let settings = RenderSettings::from_config(&config);
//! let bytes = render_document_bytes(settings, body);
//! ```

pub use defer_core;
pub use defer_data;
pub use defer_executor;
pub use defer_streaming;

/// Prelude for convenient imports.
pub mod prelude {
    pub use defer_core::*;
    pub use defer_data::*;
    pub use defer_executor::*;
    pub use defer_streaming::*;
}
