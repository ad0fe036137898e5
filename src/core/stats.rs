//! # Stats registry and snapshots.
//!
//! [`Counters`] holds the monotonically increasing totals written by the machine,
//! the bus and the recovery middleware. [`Stats`] is an immutable snapshot combining
//! those totals with point-in-time registry and bus sizes.
//!
//! ## Rules
//! - Counters only ever increase; gauges (`live`, `running`, `channels`,
//!   `subscriptions`) are read from the owning component when the snapshot is taken.
//! - A snapshot is never updated after it is produced.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Lifetime totals shared by the machine, its bus and its middlewares.
#[derive(Debug, Default)]
pub(crate) struct Counters {
    spawned: AtomicU64,
    published: AtomicU64,
    delivered: AtomicU64,
    dropped: AtomicU64,
    panics: AtomicU64,
}

impl Counters {
    #[inline]
    pub(crate) fn record_spawned(&self) {
        self.spawned.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_published(&self) {
        self.published.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_delivered(&self) {
        self.delivered.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_panic(&self) {
        self.panics.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn spawned(&self) -> u64 {
        self.spawned.load(Ordering::Relaxed)
    }

    pub(crate) fn published(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }

    pub(crate) fn delivered(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }

    pub(crate) fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub(crate) fn panics(&self) -> u64 {
        self.panics.load(Ordering::Relaxed)
    }
}

/// Lifecycle state of a registered routine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoutineState {
    /// Registered, waiting for an admission slot.
    Pending,
    /// Admitted and executing.
    Running,
}

impl fmt::Display for RoutineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoutineState::Pending => f.write_str("pending"),
            RoutineState::Running => f.write_str("running"),
        }
    }
}

/// Per-routine entry of a [`Stats`] snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutineStats {
    /// Routine identifier.
    pub pid: String,
    /// Tags in the order they were given.
    pub tags: Vec<String>,
    /// Current lifecycle state.
    pub state: RoutineState,
    /// Time since the routine was registered.
    pub elapsed: Duration,
}

/// Point-in-time view of a machine.
///
/// Produced by [`Machine::stats`](crate::Machine::stats). The `Display` rendering is a
/// single human-readable line; per-routine details are available in [`Stats::routines`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stats {
    /// Routines currently in the registry (pending or running).
    pub live: usize,
    /// Routines currently holding an admission slot.
    pub running: usize,
    /// Routines admitted since the machine was created.
    pub total: u64,
    /// Channels known to the bus.
    pub channels: usize,
    /// Open subscriptions across all channels.
    pub subscriptions: usize,
    /// Publish calls accepted by the bus.
    pub published: u64,
    /// Messages handed to subscription consumers.
    pub delivered: u64,
    /// Messages dropped because a bounded subscription queue was full.
    pub dropped: u64,
    /// Panics caught by the recovery middleware.
    pub panics: u64,
    /// Registered routines, sorted by PID.
    pub routines: Vec<RoutineStats>,
}

impl fmt::Display for Stats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "live={} running={} total={} channels={} subscriptions={} published={} delivered={} dropped={} panics={}",
            self.live,
            self.running,
            self.total,
            self.channels,
            self.subscriptions,
            self.published,
            self.delivered,
            self.dropped,
            self.panics,
        )?;
        if !self.routines.is_empty() {
            f.write_str(" routines=[")?;
            for (i, r) in self.routines.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{}({}) tags={:?}", r.pid, r.state, r.tags)?;
            }
            f.write_str("]")?;
        }
        Ok(())
    }
}
