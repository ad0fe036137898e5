//! In-process message bus: named channels, delivery queues and subscriptions.
//!
//! ## Contents
//! - `broker`: the channel → subscribers map with snapshot fan-out
//! - `queue`: per-subscription bounded/unbounded delivery queue
//! - [`Subscription`]: pull handle plus the callback-driven termination loop
//!
//! Routines reach the bus only through their [`Routine`](crate::Routine) handle.

mod broker;
mod queue;
mod subscription;

pub(crate) use broker::Bus;
pub(crate) use subscription::{Termination, drive};
pub use subscription::Subscription;
