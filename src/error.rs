//! Error types used by the routine machine.
//!
//! This module defines two error enums:
//!
//! - [`MachineError`] - misuse of the machine itself (bad configuration, bad
//!   routine spec, use after close).
//! - [`SubscribeError`] - misuse of a subscription call on a [`Routine`](crate::Routine).
//!
//! Cancellation is never an error. A routine whose context is cancelled simply
//! returns, and subscription calls return `Ok` with the number of messages processed.

use thiserror::Error;

/// # Errors produced by the machine.
///
/// Every variant is reported synchronously to the caller that caused it.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MachineError {
    /// A configuration value cannot be honored.
    #[error("invalid configuration: {reason}")]
    InvalidConfig {
        /// What is wrong with the configuration.
        reason: String,
    },

    /// An explicit PID was supplied but it is empty.
    #[error("routine pid must not be empty")]
    EmptyPid,

    /// An explicit timeout of zero was supplied.
    #[error("routine {pid:?} has a zero timeout")]
    ZeroTimeout {
        /// PID of the rejected routine.
        pid: String,
    },

    /// Another live routine already holds this PID.
    #[error("routine pid {pid:?} is already in use")]
    PidInUse {
        /// The contested PID.
        pid: String,
    },

    /// The machine was closed; no new routines are admitted.
    #[error("machine is closed")]
    Closed,
}

impl MachineError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use routine_machine::MachineError;
    ///
    /// let err = MachineError::PidInUse { pid: "worker".into() };
    /// assert_eq!(err.as_label(), "machine_pid_in_use");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            MachineError::InvalidConfig { .. } => "machine_invalid_config",
            MachineError::EmptyPid => "machine_empty_pid",
            MachineError::ZeroTimeout { .. } => "machine_zero_timeout",
            MachineError::PidInUse { .. } => "machine_pid_in_use",
            MachineError::Closed => "machine_closed",
        }
    }
}

/// # Errors produced by subscription calls.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SubscribeError {
    /// `subscribe_n` was called with a count of zero.
    #[error("subscription to {channel:?} needs a positive message count")]
    ZeroCount {
        /// Channel the subscription was requested on.
        channel: String,
    },
}

impl SubscribeError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            SubscribeError::ZeroCount { .. } => "subscribe_zero_count",
        }
    }
}
