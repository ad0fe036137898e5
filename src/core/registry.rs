//! # Routine registry.
//!
//! Maps PIDs to the metadata of routines that are pending admission or running.
//!
//! ## Rules
//! - A PID is held by at most one routine at any instant; reuse after removal is allowed.
//! - Entries are inserted by `Machine::go` before admission and removed by the
//!   routine's lease once the work function and all its middlewares returned.
//! - All access goes through query/command methods; the map itself never escapes.
//! - Operations take the lock briefly and never await while holding it.

use std::collections::HashMap;
use std::time::Instant;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use crate::core::stats::{RoutineState, RoutineStats};
use crate::error::MachineError;

/// Metadata kept for a registered routine.
struct Entry {
    /// Tags in the order supplied by the caller.
    tags: Vec<String>,
    /// The routine's own cancellation token (child of the machine root).
    cancel: CancellationToken,
    /// Pending until an admission slot is acquired.
    state: RoutineState,
    /// When the routine was registered.
    registered: Instant,
}

/// Registry of live routines keyed by PID.
#[derive(Default)]
pub(crate) struct Registry {
    routines: Mutex<HashMap<String, Entry>>,
}

impl Registry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Inserts a pending routine; fails if `pid` is currently held.
    pub(crate) fn register(
        &self,
        pid: &str,
        tags: Vec<String>,
        cancel: CancellationToken,
    ) -> Result<(), MachineError> {
        let mut routines = self.routines.lock();
        if routines.contains_key(pid) {
            return Err(MachineError::PidInUse { pid: pid.to_string() });
        }
        routines.insert(
            pid.to_string(),
            Entry {
                tags,
                cancel,
                state: RoutineState::Pending,
                registered: Instant::now(),
            },
        );
        Ok(())
    }

    /// Marks a routine as holding an admission slot.
    pub(crate) fn mark_running(&self, pid: &str) {
        if let Some(entry) = self.routines.lock().get_mut(pid) {
            entry.state = RoutineState::Running;
        }
    }

    /// Removes a routine and cancels its token so timers and children derived from it stop.
    pub(crate) fn remove(&self, pid: &str) -> bool {
        let removed = self.routines.lock().remove(pid);
        match removed {
            Some(entry) => {
                entry.cancel.cancel();
                true
            }
            None => false,
        }
    }

    pub(crate) fn contains(&self, pid: &str) -> bool {
        self.routines.lock().contains_key(pid)
    }

    /// Cancels the routine's context without removing it; the routine leaves
    /// the registry when its work returns.
    pub(crate) fn cancel(&self, pid: &str) -> bool {
        match self.routines.lock().get(pid) {
            Some(entry) => {
                entry.cancel.cancel();
                true
            }
            None => false,
        }
    }

    /// Returns sorted PIDs of routines carrying `tag`.
    pub(crate) fn with_tag(&self, tag: &str) -> Vec<String> {
        let routines = self.routines.lock();
        let mut pids: Vec<String> = routines
            .iter()
            .filter(|(_, e)| e.tags.iter().any(|t| t == tag))
            .map(|(pid, _)| pid.clone())
            .collect();
        pids.sort_unstable();
        pids
    }

    /// Returns per-routine stats sorted by PID.
    pub(crate) fn snapshot(&self) -> Vec<RoutineStats> {
        let routines = self.routines.lock();
        let mut out: Vec<RoutineStats> = routines
            .iter()
            .map(|(pid, e)| RoutineStats {
                pid: pid.clone(),
                tags: e.tags.clone(),
                state: e.state,
                elapsed: e.registered.elapsed(),
            })
            .collect();
        out.sort_unstable_by(|a, b| a.pid.cmp(&b.pid));
        out
    }

    pub(crate) fn len(&self) -> usize {
        self.routines.lock().len()
    }
}
