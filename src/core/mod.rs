//! Runtime core: admission, lifecycle bookkeeping and stats.
//!
//! The public API from this module is [`Machine`] (with [`MachineBuilder`] and
//! [`Config`]) and the [`Stats`] snapshot types.
//!
//! Internal modules:
//! - `machine`: admits routines, owns the root token, bus and counters;
//! - `registry`: PID → routine metadata;
//! - `stats`: lifetime counters and snapshots;
//! - `config` / `builder`: construction.

mod builder;
mod config;
mod machine;
mod registry;
pub(crate) mod stats;

pub use builder::MachineBuilder;
pub use config::Config;
pub use machine::Machine;
pub use stats::{RoutineState, RoutineStats, Stats};
