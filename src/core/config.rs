//! # Machine configuration.
//!
//! Provides [`Config`] centralized settings for a [`Machine`](crate::Machine).
//!
//! ## Sentinel values
//! - `max_routines = 0` → unbounded (no admission semaphore is created)
//! - `subscription_capacity = 0` → unbounded delivery queues

use std::fmt;

use tokio::sync::Semaphore;

use crate::error::MachineError;
use crate::middleware::Middleware;

/// Configuration for a machine.
///
/// Defines:
/// - **Admission**: how many routines may run at once
/// - **Delivery**: how many undelivered messages a subscription may buffer
/// - **Middlewares**: the machine-level chain wrapped around every routine
///
/// All fields are public. Prefer the helper accessors to avoid
/// sprinkling sentinel checks (`0`) across the codebase.
pub struct Config<M> {
    /// Maximum number of routines running concurrently.
    ///
    /// - `0` = unbounded
    /// - `n > 0` = `Machine::go` waits for a free slot once `n` routines run
    pub max_routines: usize,

    /// Capacity of each subscription's delivery queue.
    ///
    /// - `0` = unbounded; publishers never drop
    /// - `n > 0` = once `n` messages are waiting, further messages for that
    ///   subscriber are dropped and counted in [`Stats::dropped`](crate::Stats::dropped)
    pub subscription_capacity: usize,

    /// Middlewares applied to every routine, outermost first.
    pub middlewares: Vec<Middleware<M>>,
}

impl<M> Config<M> {
    /// Returns the admission limit as an `Option`.
    ///
    /// - `None` → unbounded
    /// - `Some(n)` → at most `n` running routines
    #[inline]
    pub fn admission_limit(&self) -> Option<usize> {
        if self.max_routines == 0 {
            None
        } else {
            Some(self.max_routines)
        }
    }

    /// Returns the subscription queue bound as an `Option` (`None` = unbounded).
    #[inline]
    pub fn queue_bound(&self) -> Option<usize> {
        if self.subscription_capacity == 0 {
            None
        } else {
            Some(self.subscription_capacity)
        }
    }

    /// Checks that every value can be honored.
    pub fn validate(&self) -> Result<(), MachineError> {
        if self.max_routines > Semaphore::MAX_PERMITS {
            return Err(MachineError::InvalidConfig {
                reason: format!(
                    "max_routines {} exceeds the limit of {}",
                    self.max_routines,
                    Semaphore::MAX_PERMITS
                ),
            });
        }
        Ok(())
    }
}

impl<M> Default for Config<M> {
    /// Default configuration:
    ///
    /// - `max_routines = 0` (unbounded)
    /// - `subscription_capacity = 0` (unbounded queues)
    /// - no middlewares
    fn default() -> Self {
        Self {
            max_routines: 0,
            subscription_capacity: 0,
            middlewares: Vec::new(),
        }
    }
}

impl<M> Clone for Config<M> {
    fn clone(&self) -> Self {
        Self {
            max_routines: self.max_routines,
            subscription_capacity: self.subscription_capacity,
            middlewares: self.middlewares.clone(),
        }
    }
}

impl<M> fmt::Debug for Config<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("max_routines", &self.max_routines)
            .field("subscription_capacity", &self.subscription_capacity)
            .field("middlewares", &self.middlewares.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_means_unbounded() {
        let cfg = Config::<()>::default();
        assert_eq!(cfg.admission_limit(), None);
        assert_eq!(cfg.queue_bound(), None);
        assert!(cfg.validate().is_ok());

        let cfg = Config::<()> {
            max_routines: 4,
            subscription_capacity: 16,
            ..Config::default()
        };
        assert_eq!(cfg.admission_limit(), Some(4));
        assert_eq!(cfg.queue_bound(), Some(16));
    }

    #[test]
    fn oversized_bound_is_rejected() {
        let cfg = Config::<()> {
            max_routines: Semaphore::MAX_PERMITS + 1,
            ..Config::default()
        };
        let err = cfg.validate().unwrap_err();
        assert_eq!(err.as_label(), "machine_invalid_config");
    }
}
