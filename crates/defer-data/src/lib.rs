//! Eventual values with timeouts.
//!
//! This crate provides:
//! - `after` / `TimedOut` - Timer that resolves to a sentinel
//! - `race` / `RaceOutcome` - Settle-or-timeout selection that keeps the loser

mod timeout;

pub use timeout::*;
