//! Output chunks.

use std::fmt;

/// A self-contained unit of document output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Chunk {
    /// Literal text from the compiled template.
    Literal(String),
    /// A resolved slot value, such as a rendered subtree.
    Content(String),
    /// Out-of-band markup for a deferred slot, relocated by the client.
    Patch {
        /// Identifier of the placeholder this patch replaces.
        slot: String,
        /// Patch markup.
        markup: String,
    },
}

impl Chunk {
    /// Get the chunk text.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Literal(text) | Self::Content(text) => text,
            Self::Patch { markup, .. } => markup,
        }
    }

    /// Consume the chunk, returning its text.
    pub fn into_string(self) -> String {
        match self {
            Self::Literal(text) | Self::Content(text) => text,
            Self::Patch { markup, .. } => markup,
        }
    }

    /// Get the deferred slot this chunk patches, if any.
    pub fn slot(&self) -> Option<&str> {
        match self {
            Self::Patch { slot, .. } => Some(slot),
            _ => None,
        }
    }

    /// Whether the chunk carries no text.
    pub fn is_empty(&self) -> bool {
        self.as_str().is_empty()
    }
}

impl fmt::Display for Chunk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
