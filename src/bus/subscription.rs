//! # Subscriptions and their termination policies.
//!
//! A [`Subscription`] owns one delivery queue on one channel. It is registered
//! when created and deregistered when dropped.
//!
//! ## Termination
//! ```text
//! loop {
//!   ├─► wait { cancelled ─► stop | message ─► continue }   (cancellation wins ties)
//!   ├─► callback(message)
//!   └─► check policy:
//!         ├─ Unbounded     ─► continue
//!         ├─ Count(n)      ─► stop after n processed messages
//!         └─ Until(pred)   ─► stop if pred() is true
//! }
//! ```
//! The predicate is only evaluated after a processed message; it never wakes
//! the subscription on its own.

use std::fmt;
use std::num::NonZeroUsize;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::broker::Bus;
use super::queue::Outlet;

/// A routine's registered interest in one channel.
///
/// Obtained from [`Routine::subscription`](crate::Routine::subscription). Messages are
/// pulled with [`Subscription::next`]; dropping the value deregisters it from the bus.
pub struct Subscription<M> {
    id: u64,
    channel: String,
    outlet: Outlet<M>,
    bus: Arc<Bus<M>>,
    token: CancellationToken,
}

impl<M> Subscription<M> {
    pub(crate) fn new(
        id: u64,
        channel: String,
        outlet: Outlet<M>,
        bus: Arc<Bus<M>>,
        token: CancellationToken,
    ) -> Self {
        Self {
            id,
            channel,
            outlet,
            bus,
            token,
        }
    }

    /// Returns the channel this subscription listens on.
    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Waits for the next message.
    ///
    /// Returns `None` once the owning routine's context is cancelled or the machine
    /// closed. Cancellation is checked first, so a cancelled subscription stops even
    /// if messages are still queued.
    pub async fn next(&mut self) -> Option<M> {
        let msg = tokio::select! {
            biased;
            _ = self.token.cancelled() => None,
            msg = self.outlet.recv() => msg,
        };
        if msg.is_some() {
            self.bus.counters().record_delivered();
        }
        msg
    }
}

impl<M> Drop for Subscription<M> {
    fn drop(&mut self) {
        self.bus.unsubscribe(&self.channel, self.id);
        debug!(channel = %self.channel, id = self.id, "subscription closed");
    }
}

impl<M> fmt::Debug for Subscription<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("channel", &self.channel)
            .finish()
    }
}

/// When a callback-driven subscription stops, besides cancellation.
pub(crate) enum Termination<'a> {
    /// Only cancellation stops it.
    Unbounded,
    /// Stops after this many processed messages.
    Count(NonZeroUsize),
    /// Stops once the predicate returns `true` after a processed message.
    Until(Box<dyn FnMut() -> bool + Send + 'a>),
}

impl Termination<'_> {
    fn reached(&mut self, processed: usize) -> bool {
        match self {
            Termination::Unbounded => false,
            Termination::Count(n) => processed >= n.get(),
            Termination::Until(pred) => pred(),
        }
    }
}

/// Feeds messages from `sub` into `callback` until the policy or cancellation stops it.
///
/// Returns the number of processed messages.
pub(crate) async fn drive<M, C>(
    mut sub: Subscription<M>,
    mut policy: Termination<'_>,
    mut callback: C,
) -> usize
where
    C: FnMut(M) + Send,
{
    let mut processed = 0;
    while let Some(msg) = sub.next().await {
        callback(msg);
        processed += 1;
        if policy.reached(processed) {
            break;
        }
    }
    processed
}
