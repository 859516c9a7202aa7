//! Racing eventual values against a timer.

use std::future::Future;
use std::time::Duration;

use futures::future::{select, Either};

/// Sentinel produced when a timer wins a race.
///
/// It is a distinct type, so it can never be confused with a real value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimedOut;

/// Resolve to [`TimedOut`] after `duration`.
///
/// Dropping the returned future cancels the timer.
pub async fn after(duration: Duration) -> TimedOut {
    tokio::time::sleep(duration).await;
    TimedOut
}

/// Outcome of racing an eventual value against a timeout.
#[derive(Debug)]
pub enum RaceOutcome<T, F> {
    /// The value settled successfully first.
    Resolved(T),
    /// The value settled with an error first.
    Rejected(anyhow::Error),
    /// The timer fired first. Carries the still-running value.
    TimedOut(F),
}

impl<T, F> RaceOutcome<T, F> {
    /// Whether the timer won the race.
    pub fn is_timed_out(&self) -> bool {
        matches!(self, Self::TimedOut(_))
    }
}

/// Race `value` against a timer of `timeout`.
///
/// The value is polled first, so a value that is already settled wins even
/// against a zero timeout. When the timer wins, the value future is handed
/// back untouched so the caller can keep waiting on it.
pub async fn race<T, F>(value: F, timeout: Duration) -> RaceOutcome<T, F>
where
    F: Future<Output = anyhow::Result<T>> + Unpin,
{
    let timer = Box::pin(after(timeout));
    match select(value, timer).await {
        Either::Left((Ok(value), _)) => RaceOutcome::Resolved(value),
        Either::Left((Err(error), _)) => RaceOutcome::Rejected(error),
        Either::Right((TimedOut, value)) => RaceOutcome::TimedOut(value),
    }
}
