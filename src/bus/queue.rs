//! Per-subscription delivery queue: bounded or unbounded `mpsc`.
//!
//! Handing a message to a queue never waits. A bounded queue that is full
//! rejects the message for that subscriber only.

use tokio::sync::mpsc;

/// Outcome of handing a message to a subscriber queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Offer {
    Accepted,
    Full,
    Closed,
}

/// Sending half, kept by the bus.
pub(crate) enum Inlet<M> {
    Bounded(mpsc::Sender<M>),
    Unbounded(mpsc::UnboundedSender<M>),
}

/// Receiving half, owned by the subscription.
pub(crate) enum Outlet<M> {
    Bounded(mpsc::Receiver<M>),
    Unbounded(mpsc::UnboundedReceiver<M>),
}

/// Creates a queue; `None` means unbounded.
pub(crate) fn queue<M>(bound: Option<usize>) -> (Inlet<M>, Outlet<M>) {
    match bound {
        Some(cap) => {
            let (tx, rx) = mpsc::channel(cap.max(1));
            (Inlet::Bounded(tx), Outlet::Bounded(rx))
        }
        None => {
            let (tx, rx) = mpsc::unbounded_channel();
            (Inlet::Unbounded(tx), Outlet::Unbounded(rx))
        }
    }
}

impl<M> Inlet<M> {
    pub(crate) fn offer(&self, msg: M) -> Offer {
        match self {
            Inlet::Bounded(tx) => match tx.try_send(msg) {
                Ok(()) => Offer::Accepted,
                Err(mpsc::error::TrySendError::Full(_)) => Offer::Full,
                Err(mpsc::error::TrySendError::Closed(_)) => Offer::Closed,
            },
            Inlet::Unbounded(tx) => match tx.send(msg) {
                Ok(()) => Offer::Accepted,
                Err(_) => Offer::Closed,
            },
        }
    }
}

impl<M> Clone for Inlet<M> {
    fn clone(&self) -> Self {
        match self {
            Inlet::Bounded(tx) => Inlet::Bounded(tx.clone()),
            Inlet::Unbounded(tx) => Inlet::Unbounded(tx.clone()),
        }
    }
}

impl<M> Outlet<M> {
    /// Waits for the next message; `None` once every inlet is gone and the queue is drained.
    pub(crate) async fn recv(&mut self) -> Option<M> {
        match self {
            Outlet::Bounded(rx) => rx.recv().await,
            Outlet::Unbounded(rx) => rx.recv().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn bounded_queue_rejects_when_full() {
        let (tx, mut rx) = queue::<u32>(Some(1));
        assert_eq!(tx.offer(1), Offer::Accepted);
        assert_eq!(tx.offer(2), Offer::Full);
        assert_eq!(rx.recv().await, Some(1));
        assert_eq!(tx.offer(3), Offer::Accepted);
        assert_eq!(rx.recv().await, Some(3));
    }

    #[tokio::test]
    async fn closed_outlet_is_reported() {
        let (tx, rx) = queue::<u32>(None);
        drop(rx);
        assert_eq!(tx.offer(1), Offer::Closed);
    }

    #[tokio::test]
    async fn outlet_drains_before_ending() {
        let (tx, mut rx) = queue::<u32>(None);
        assert_eq!(tx.offer(7), Offer::Accepted);
        drop(tx);
        assert_eq!(rx.recv().await, Some(7));
        assert_eq!(rx.recv().await, None);
    }
}
