//! # Panic recovery.
//!
//! [`recover`] polls the inner chain inside `catch_unwind`. A panic is logged,
//! counted in [`Stats::panics`](crate::Stats::panics) and swallowed, so the routine
//! ends like any other and its slot and registry entry are released normally.
//!
//! **Warning**: `AssertUnwindSafe` is used; state shared through `Arc<Mutex<T>>`
//! may be left inconsistent if the work panicked while holding the lock.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tracing::error;

use super::{Middleware, middleware};
use crate::routine::{Routine, Work};

/// Returns a middleware that contains panics raised by the work or inner middlewares.
pub fn recover<M>() -> Middleware<M>
where
    M: Clone + Send + 'static,
{
    middleware(|next: Work<M>| -> Work<M> {
        Arc::new(move |routine: Routine<M>| {
            let next = Arc::clone(&next);
            async move {
                let call = AssertUnwindSafe(async { next(routine.clone()).await });
                if let Err(panic) = call.catch_unwind().await {
                    let info = panic_message(panic.as_ref());
                    routine.machine().record_panic();
                    error!(pid = routine.pid(), panic = %info, "recovered panic in routine");
                }
            }
            .boxed()
        })
    })
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(msg) = panic.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}
