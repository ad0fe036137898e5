//! # Work functions.
//!
//! [`Work`] is the shared, re-invocable body of a routine: each call receives a
//! [`Routine`] handle and produces a fresh future. Middlewares wrap one `Work`
//! into another; periodic middlewares call the inner `Work` many times.
//!
//! ## Example
//! ```rust
//! use routine_machine::{Routine, Work, work_fn};
//!
//! let w: Work<String> = work_fn(|r: Routine<String>| async move {
//!     r.publish("greetings", format!("hello from {}", r.pid()));
//! });
//! # let _ = w;
//! ```

use std::future::Future;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;

use super::handle::Routine;

/// Shared, re-invocable routine body.
pub type Work<M> = Arc<dyn Fn(Routine<M>) -> BoxFuture<'static, ()> + Send + Sync>;

/// Turns a closure returning a future into a [`Work`].
///
/// The closure is `Fn`, not `FnMut`: every invocation builds a new future and
/// shared state must be carried explicitly (e.g. in an `Arc`).
pub fn work_fn<M, F, Fut>(f: F) -> Work<M>
where
    F: Fn(Routine<M>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    Arc::new(move |routine| f(routine).boxed())
}
