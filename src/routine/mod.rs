//! # Routine abstractions.
//!
//! - [`Routine`] - handle passed into a routine's work (identity, context, bus access)
//! - [`Work`] - shared, re-invocable routine body; [`work_fn`] builds one from a closure
//! - [`RoutineSpec`] - per-routine options (PID, tags, timeout, middlewares)

mod handle;
mod spec;
mod work;

pub use handle::Routine;
pub use spec::RoutineSpec;
pub use work::{Work, work_fn};
