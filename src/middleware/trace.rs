//! # Invocation logging.
//!
//! [`trace`] logs each invocation of the inner chain at `info` level:
//!
//! ```text
//! INFO routine started pid="publisher" tags=["publish"]
//! INFO routine finished pid="publisher" elapsed=1.0002s cancelled=false
//! ```

use std::sync::Arc;

use futures::FutureExt;
use tokio::time::Instant;
use tracing::info;

use super::{Middleware, middleware};
use crate::routine::{Routine, Work};

/// Returns a middleware that logs start and finish of every invocation.
pub fn trace<M>() -> Middleware<M>
where
    M: Clone + Send + 'static,
{
    middleware(|next: Work<M>| -> Work<M> {
        Arc::new(move |routine: Routine<M>| {
            let next = Arc::clone(&next);
            async move {
                let started = Instant::now();
                info!(pid = routine.pid(), tags = ?routine.tags(), "routine started");
                next(routine.clone()).await;
                info!(
                    pid = routine.pid(),
                    elapsed = ?started.elapsed(),
                    cancelled = routine.context().is_cancelled(),
                    "routine finished"
                );
            }
            .boxed()
        })
    })
}
