//! # Periodic re-invocation.
//!
//! [`cron`] turns a routine into a periodic one: the inner chain runs once per tick
//! with the same [`Routine`] until the routine's context is cancelled.
//!
//! ```text
//! loop {
//!   ├─► wait { cancelled ─► exit | tick ─► continue }   (cancellation wins ties)
//!   └─► next(routine).await
//! }
//! ```
//!
//! ## Rules
//! - The first invocation happens one full period after the routine starts.
//! - Invocations never overlap; a slow invocation delays the next tick according to
//!   the [`MissedTickBehavior`].
//! - An invocation already in progress is not interrupted by cancellation.

use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tokio::time::{self, Instant, MissedTickBehavior};

use super::{Middleware, middleware};
use crate::routine::{Routine, Work};

/// Shortest accepted period; smaller periods are raised to it.
const MIN_PERIOD: Duration = Duration::from_millis(1);

/// Longest accepted period (about 30 years); larger periods are lowered to it
/// so the first deadline stays representable.
const MAX_PERIOD: Duration = Duration::from_secs(86_400 * 365 * 30);

/// Re-invokes the inner chain every `period`, skipping ticks missed by a slow invocation.
pub fn cron<M>(period: Duration) -> Middleware<M>
where
    M: Clone + Send + 'static,
{
    cron_with(period, MissedTickBehavior::Skip)
}

/// Like [`cron`] with an explicit policy for ticks missed by a slow invocation.
pub fn cron_with<M>(period: Duration, missed: MissedTickBehavior) -> Middleware<M>
where
    M: Clone + Send + 'static,
{
    let period = period.clamp(MIN_PERIOD, MAX_PERIOD);
    middleware(move |next: Work<M>| -> Work<M> {
        Arc::new(move |routine: Routine<M>| {
            let next = Arc::clone(&next);
            async move {
                let start = Instant::now().checked_add(period).unwrap_or_else(Instant::now);
                let mut ticker = time::interval_at(start, period);
                ticker.set_missed_tick_behavior(missed);
                loop {
                    tokio::select! {
                        biased;
                        _ = routine.context().cancelled() => break,
                        _ = ticker.tick() => {}
                    }
                    next(routine.clone()).await;
                }
            }
            .boxed()
        })
    })
}
