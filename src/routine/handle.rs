//! # Routine handle.
//!
//! A [`Routine`] is passed into every invocation of a routine's work. It carries the
//! routine's identity and context and is the only way to reach the machine's bus.
//!
//! Cloning is cheap; all clones refer to the same routine.

use std::fmt;
use std::future::Future;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Instant;

use tokio_util::sync::CancellationToken;

use crate::bus::{Subscription, Termination, drive};
use crate::core::Machine;
use crate::error::{MachineError, SubscribeError};
use crate::routine::RoutineSpec;

struct Inner<M> {
    pid: String,
    tags: Vec<String>,
    token: CancellationToken,
    started: Instant,
    machine: Machine<M>,
}

/// Handle to a running routine.
pub struct Routine<M> {
    inner: Arc<Inner<M>>,
}

impl<M> Clone for Routine<M> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<M> fmt::Debug for Routine<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Routine")
            .field("pid", &self.inner.pid)
            .field("tags", &self.inner.tags)
            .finish()
    }
}

impl<M> Routine<M>
where
    M: Clone + Send + 'static,
{
    pub(crate) fn new(
        pid: String,
        tags: Vec<String>,
        token: CancellationToken,
        machine: Machine<M>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                pid,
                tags,
                token,
                started: Instant::now(),
                machine,
            }),
        }
    }

    /// Returns the routine's PID.
    pub fn pid(&self) -> &str {
        &self.inner.pid
    }

    /// Returns the routine's tags in the order they were given.
    pub fn tags(&self) -> &[String] {
        &self.inner.tags
    }

    /// Returns the machine that runs this routine.
    pub fn machine(&self) -> &Machine<M> {
        &self.inner.machine
    }

    /// Returns the routine's context.
    ///
    /// It is cancelled when the routine's timeout elapses, when the machine closes,
    /// or when [`Routine::cancel`] / [`Machine::cancel_routine`] is called.
    pub fn context(&self) -> &CancellationToken {
        &self.inner.token
    }

    /// Cancels this routine's context.
    pub fn cancel(&self) {
        self.inner.token.cancel();
    }

    /// Returns when the routine was admitted.
    pub fn started(&self) -> Instant {
        self.inner.started
    }

    /// Spawns another routine on the same machine.
    pub async fn go<F, Fut>(&self, work: F, spec: RoutineSpec<M>) -> Result<String, MachineError>
    where
        F: Fn(Routine<M>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.inner.machine.go(work, spec).await
    }

    /// Publishes `msg` to every subscription currently on `channel`.
    ///
    /// Never waits for subscribers. Returns how many subscriptions accepted the message.
    pub fn publish(&self, channel: &str, msg: M) -> usize {
        self.inner.machine.bus().publish(channel, msg)
    }

    /// Opens a pull-style subscription on `channel`, bound to this routine's context.
    pub fn subscription(&self, channel: &str) -> Subscription<M> {
        self.inner
            .machine
            .bus()
            .open(channel, &self.inner.pid, self.inner.token.clone())
    }

    /// Calls `callback` for each message on `channel` until the context is cancelled.
    ///
    /// Returns the number of processed messages.
    pub async fn subscribe<C>(&self, channel: &str, callback: C) -> usize
    where
        C: FnMut(M) + Send,
    {
        drive(self.subscription(channel), Termination::Unbounded, callback).await
    }

    /// Calls `callback` for at most `n` messages on `channel`, stopping earlier if the
    /// context is cancelled.
    ///
    /// Returns the number of processed messages, or an error if `n` is zero.
    pub async fn subscribe_n<C>(
        &self,
        channel: &str,
        n: usize,
        callback: C,
    ) -> Result<usize, SubscribeError>
    where
        C: FnMut(M) + Send,
    {
        let Some(n) = NonZeroUsize::new(n) else {
            return Err(SubscribeError::ZeroCount {
                channel: channel.to_string(),
            });
        };
        Ok(drive(self.subscription(channel), Termination::Count(n), callback).await)
    }

    /// Calls `callback` for each message on `channel`; after each one, stops if
    /// `until()` returns `true`. Also stops when the context is cancelled.
    ///
    /// Returns the number of processed messages.
    pub async fn subscribe_until<P, C>(&self, channel: &str, until: P, callback: C) -> usize
    where
        P: FnMut() -> bool + Send,
        C: FnMut(M) + Send,
    {
        drive(
            self.subscription(channel),
            Termination::Until(Box::new(until)),
            callback,
        )
        .await
    }
}
