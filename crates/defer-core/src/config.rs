//! Render configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default inline-vs-defer timeout in milliseconds.
pub const DEFAULT_TIMEOUT_MS: u64 = 10;

/// Configuration shared by every document rendered with it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamConfig {
    /// Time a deferred fragment may take and still be inlined.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Custom whole-document pattern with `{{name}}` placeholders.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,
}

fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

impl StreamConfig {
    /// Create the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the inline-vs-defer timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Set a custom document pattern.
    pub fn with_template(mut self, template: impl Into<String>) -> Self {
        self.template = Some(template.into());
        self
    }

    /// The inline-vs-defer timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_TIMEOUT_MS,
            template: None,
        }
    }
}
