//! # Middleware pipeline.
//!
//! A [`Middleware`] turns one [`Work`] into another. Chains are applied with an
//! explicit right fold at spawn time, so the first middleware in a list is the
//! outermost wrapper:
//!
//! ```text
//! machine: [m1, m2]    routine: [r1, r2]
//!
//! m1( m2( r1( r2( work ) ) ) )
//! └── machine-level ──┘└─ per-routine ─┘
//! ```
//!
//! ## Provided middlewares
//! - [`recover`]: contains panics raised by the inner chain
//! - [`cron`] / [`cron_with`]: re-invokes the inner chain on every tick until cancelled
//! - [`trace`]: logs start/finish of each invocation

mod cron;
mod recover;
mod trace;

use std::sync::Arc;

use crate::routine::Work;

pub use cron::{cron, cron_with};
pub use recover::recover;
pub use trace::trace;

/// Wrapper transforming one work function into another.
pub type Middleware<M> = Arc<dyn Fn(Work<M>) -> Work<M> + Send + Sync>;

/// Turns a closure into a [`Middleware`].
pub fn middleware<M, F>(f: F) -> Middleware<M>
where
    F: Fn(Work<M>) -> Work<M> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Wraps `work` in `layers`, the first layer being the outermost.
pub fn compose<'a, M, I>(work: Work<M>, layers: I) -> Work<M>
where
    M: 'a,
    I: IntoIterator<Item = &'a Middleware<M>>,
    I::IntoIter: DoubleEndedIterator,
{
    layers
        .into_iter()
        .rev()
        .fold(work, |inner, layer| layer(inner))
}
