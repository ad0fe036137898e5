//! # Named-channel message bus.
//!
//! [`Bus`] maps channel names to the delivery queues of their current subscriptions.
//!
//! ## Architecture
//! ```text
//! publish(channel, msg)
//!     │
//!     ├─ lock ─► snapshot inlets of `channel` ─► unlock
//!     │
//!     ├──► [queue S1] ──► Subscription S1 (routine A)
//!     ├──► [queue S2] ──► Subscription S2 (routine B)
//!     └──► [queue SN] ──► Subscription SN (routine N)
//! ```
//!
//! ## Rules
//! - **Snapshot fan-out**: a publish reaches the subscriptions registered when it
//!   took the snapshot; later subscriptions never see it.
//! - **Non-blocking**: handing off uses `send`/`try_send`, never waits on a consumer.
//! - **Per-subscriber FIFO**: each queue preserves acceptance order; there is no
//!   ordering across subscribers.
//! - **Overflow**: with bounded queues a full queue drops the message for that
//!   subscriber only; the drop is counted and logged.
//! - **Retention**: channels are created lazily and kept until the bus closes.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::queue::{Inlet, Offer, queue};
use super::subscription::Subscription;
use crate::core::stats::Counters;

/// One registered subscription on a channel.
struct Subscriber<M> {
    id: u64,
    pid: Arc<str>,
    inlet: Inlet<M>,
}

impl<M> Clone for Subscriber<M> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            pid: Arc::clone(&self.pid),
            inlet: self.inlet.clone(),
        }
    }
}

struct State<M> {
    closed: bool,
    channels: HashMap<String, Vec<Subscriber<M>>>,
}

/// In-process publish/subscribe bus owned by a machine.
pub(crate) struct Bus<M> {
    state: Mutex<State<M>>,
    bound: Option<usize>,
    next_id: AtomicU64,
    counters: Arc<Counters>,
}

impl<M> Bus<M> {
    /// Creates a bus; `bound` is the per-subscription queue capacity (`None` = unbounded).
    pub(crate) fn new(bound: Option<usize>, counters: Arc<Counters>) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(State {
                closed: false,
                channels: HashMap::new(),
            }),
            bound,
            next_id: AtomicU64::new(1),
            counters,
        })
    }

    /// Removes a subscription; called when the subscription is dropped.
    pub(crate) fn unsubscribe(&self, channel: &str, id: u64) {
        let mut state = self.state.lock();
        if let Some(subs) = state.channels.get_mut(channel) {
            subs.retain(|s| s.id != id);
        }
    }

    /// Closes the bus: later publishes are ignored and every queue is released,
    /// which ends open subscriptions once they drain.
    pub(crate) fn close(&self) {
        let mut state = self.state.lock();
        state.closed = true;
        state.channels.clear();
    }

    pub(crate) fn channel_count(&self) -> usize {
        self.state.lock().channels.len()
    }

    pub(crate) fn subscription_count(&self) -> usize {
        self.state.lock().channels.values().map(Vec::len).sum()
    }

    pub(crate) fn counters(&self) -> &Counters {
        &self.counters
    }
}

impl<M> Bus<M>
where
    M: Clone + Send + 'static,
{
    /// Registers a subscription for `pid` on `channel`.
    ///
    /// On a closed bus the returned subscription is already exhausted.
    pub(crate) fn open(
        self: &Arc<Self>,
        channel: &str,
        pid: &str,
        token: CancellationToken,
    ) -> Subscription<M> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (inlet, outlet) = queue(self.bound);
        {
            let mut state = self.state.lock();
            if !state.closed {
                state
                    .channels
                    .entry(channel.to_string())
                    .or_default()
                    .push(Subscriber {
                        id,
                        pid: Arc::from(pid),
                        inlet,
                    });
            }
        }
        debug!(channel, pid, id, "subscription opened");
        Subscription::new(id, channel.to_string(), outlet, Arc::clone(self), token)
    }

    /// Publishes `msg` to every subscription currently on `channel`.
    ///
    /// Returns how many subscriptions accepted the message.
    pub(crate) fn publish(&self, channel: &str, msg: M) -> usize {
        let targets: Vec<Subscriber<M>> = {
            let mut state = self.state.lock();
            if state.closed {
                debug!(channel, "publish on closed bus ignored");
                return 0;
            }
            state
                .channels
                .entry(channel.to_string())
                .or_default()
                .clone()
        };
        self.counters.record_published();

        let mut accepted = 0;
        let mut msg = Some(msg);
        let last = targets.len().saturating_sub(1);
        for (i, sub) in targets.iter().enumerate() {
            let copy = if i == last { msg.take() } else { msg.clone() };
            let Some(copy) = copy else { break };
            match sub.inlet.offer(copy) {
                Offer::Accepted => accepted += 1,
                Offer::Full => {
                    self.counters.record_dropped();
                    warn!(channel, pid = %sub.pid, "subscription queue full; message dropped");
                }
                Offer::Closed => {}
            }
        }
        accepted
    }
}
