//! Response lifecycle tracking.

use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Lifecycle phases for a streamed document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecyclePhase {
    /// Nothing has been written yet.
    Start,
    /// The first chunk of the document has been written.
    ShellSent,
    /// A deferred patch has been written.
    PatchSent(String),
    /// The document stream ended normally.
    Completion,
    /// The document stream ended with an error.
    Error(String),
}

/// Timing context for observability.
#[derive(Debug, Clone)]
pub struct TimingContext {
    start: Instant,
    marks: HashMap<String, Instant>,
}

impl TimingContext {
    /// Create a new timing context.
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            marks: HashMap::new(),
        }
    }

    /// Record a timing mark.
    pub fn mark(&mut self, name: &str) {
        self.marks.insert(name.to_string(), Instant::now());
    }

    /// Mark a deferred patch as sent.
    pub fn mark_patch_sent(&mut self, slot: &str) {
        self.mark(&format!("patch_{}_sent", slot));
    }

    /// Get elapsed time since start.
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Get a named mark relative to start.
    pub fn get(&self, name: &str) -> Option<Duration> {
        self.marks.get(name).map(|t| t.duration_since(self.start))
    }

    /// Get time to the first written chunk.
    pub fn time_to_shell(&self) -> Option<Duration> {
        self.get("shell_sent")
    }

    /// Get time to the first deferred patch.
    pub fn time_to_first_patch(&self) -> Option<Duration> {
        self.marks
            .iter()
            .filter(|(k, _)| k.starts_with("patch_") && k.ends_with("_sent"))
            .map(|(_, t)| t.duration_since(self.start))
            .min()
    }

    /// Get timing for a specific patch.
    pub fn patch_timing(&self, slot: &str) -> Option<Duration> {
        self.get(&format!("patch_{}_sent", slot))
    }
}

impl Default for TimingContext {
    fn default() -> Self {
        Self::new()
    }
}
