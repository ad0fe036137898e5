//! # Machine: admits routines, tracks them, and owns the bus.
//!
//! The [`Machine`] owns the routine registry, the admission semaphore, the root
//! cancellation token, the message bus and the stats counters.
//!
//! ## Lifecycle of one routine
//! ```text
//! Machine::go(work, spec)
//!   ├─► validate spec (pid, timeout)
//!   ├─► registry.register(pid) [Pending]     (seen by has_routine())
//!   ├─► active += 1                          (seen by wait())
//!   ├─► acquire semaphore slot (cancellable by close)
//!   │     └─ closed ─► lease dropped ─► Err(Closed)
//!   ├─► registry.mark_running(pid)
//!   ├─► arm timeout (optional): sleep ─► routine token.cancel()
//!   └─► tokio::spawn(compose(work, machine mws ++ routine mws)(routine))
//!                └─► on exit, normal or unwinding, the lease drops:
//!                      registry.remove(pid) ─► release slot ─► active -= 1
//! ```
//!
//! ## Cancellation tree
//! ```text
//! parent token (caller)
//!   └─► machine root token          ◄── close()
//!         ├─► routine token (pid A) ◄── timeout A / cancel_routine(A)
//!         └─► routine token (pid B)
//! ```
//!
//! ## Rules
//! - `go` awaits only on the admission slot.
//! - A PID leaves the registry only after its work and every middleware returned.
//! - `wait` tracks a live counter, not a snapshot of PIDs, so routines spawned by
//!   routines are covered.
//! - `close` is idempotent.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::{OwnedSemaphorePermit, Semaphore, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use uuid::Uuid;

use super::builder::MachineBuilder;
use super::config::Config;
use super::registry::Registry;
use super::stats::{Counters, RoutineState, Stats};
use crate::bus::Bus;
use crate::error::MachineError;
use crate::middleware::{Middleware, compose};
use crate::routine::{Routine, RoutineSpec, Work, work_fn};

struct Inner<M> {
    token: CancellationToken,
    semaphore: Option<Arc<Semaphore>>,
    middlewares: Vec<Middleware<M>>,
    registry: Registry,
    bus: Arc<Bus<M>>,
    counters: Arc<Counters>,
    active: watch::Sender<usize>,
    closed: AtomicBool,
}

/// Concurrency orchestration engine.
///
/// Cloning is cheap; all clones refer to the same machine.
///
/// ## Example
/// ```rust
/// use std::time::Duration;
/// use tokio_util::sync::CancellationToken;
/// use routine_machine::{Machine, Routine, RoutineSpec, middleware};
///
/// #[tokio::main(flavor = "current_thread")]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let machine = Machine::<String>::builder()
///         .max_routines(10)
///         .with_middleware(middleware::recover())
///         .build(&CancellationToken::new())?;
///
///     machine
///         .go(
///             |r: Routine<String>| async move {
///                 r.publish("greetings", format!("hello from {}", r.pid()));
///             },
///             RoutineSpec::new().with_pid("greeter").with_timeout(Duration::from_secs(1)),
///         )
///         .await?;
///
///     machine.wait().await;
///     machine.close();
///     Ok(())
/// }
/// ```
pub struct Machine<M> {
    inner: Arc<Inner<M>>,
}

impl<M> Clone for Machine<M> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<M> fmt::Debug for Machine<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Machine")
            .field("live", &self.inner.registry.len())
            .field("closed", &self.inner.closed.load(Ordering::Relaxed))
            .finish()
    }
}

impl<M> Machine<M>
where
    M: Clone + Send + 'static,
{
    /// Creates a machine whose root token is a child of `parent`.
    ///
    /// Fails only if `cfg` does not validate.
    pub fn new(parent: &CancellationToken, cfg: Config<M>) -> Result<Self, MachineError> {
        cfg.validate()?;

        let counters = Arc::new(Counters::default());
        let semaphore = cfg.admission_limit().map(Semaphore::new).map(Arc::new);
        let bus = Bus::new(cfg.queue_bound(), Arc::clone(&counters));
        let (active, _) = watch::channel(0usize);

        Ok(Self {
            inner: Arc::new(Inner {
                token: parent.child_token(),
                semaphore,
                middlewares: cfg.middlewares,
                registry: Registry::new(),
                bus,
                counters,
                active,
                closed: AtomicBool::new(false),
            }),
        })
    }

    /// Returns a builder with default configuration.
    pub fn builder() -> MachineBuilder<M> {
        MachineBuilder::new()
    }

    /// Admits one routine and returns its PID.
    ///
    /// Waits only while every admission slot is taken. The work runs on its own
    /// task; this call returns once it has been spawned.
    ///
    /// ### Errors
    /// - [`MachineError::EmptyPid`] / [`MachineError::ZeroTimeout`] for an invalid spec
    /// - [`MachineError::PidInUse`] if another live routine holds the PID
    /// - [`MachineError::Closed`] if the machine is (or becomes) closed before admission
    pub async fn go<F, Fut>(&self, work: F, spec: RoutineSpec<M>) -> Result<String, MachineError>
    where
        F: Fn(Routine<M>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.go_work(work_fn(work), spec).await
    }

    /// Like [`Machine::go`] for an already built [`Work`].
    pub async fn go_work(
        &self,
        work: Work<M>,
        spec: RoutineSpec<M>,
    ) -> Result<String, MachineError> {
        let (pid, tags, timeout, middlewares) = spec.into_parts();
        let pid = match pid {
            Some(pid) if pid.is_empty() => return Err(MachineError::EmptyPid),
            Some(pid) => pid,
            None => Uuid::new_v4().to_string(),
        };
        if timeout == Some(Duration::ZERO) {
            return Err(MachineError::ZeroTimeout { pid });
        }
        if self.is_closed() {
            return Err(MachineError::Closed);
        }

        let token = self.inner.token.child_token();
        self.inner
            .registry
            .register(&pid, tags.clone(), token.clone())?;
        let mut lease = Lease::new(Arc::clone(&self.inner), pid.clone());

        lease.permit = match self.admit().await {
            Some(permit) => permit,
            None => return Err(MachineError::Closed),
        };
        self.inner.registry.mark_running(&pid);
        self.inner.counters.record_spawned();

        if let Some(limit) = timeout {
            arm_timeout(token.clone(), limit);
        }

        let routine = Routine::new(pid.clone(), tags, token, self.clone());
        let wrapped = compose(work, self.inner.middlewares.iter().chain(middlewares.iter()));
        debug!(pid = %pid, "routine admitted");

        tokio::spawn(async move {
            let _lease = lease;
            wrapped(routine).await;
        });
        Ok(pid)
    }

    /// Waits for an admission slot.
    ///
    /// `Some(None)` = unbounded machine, `Some(Some(permit))` = slot acquired,
    /// `None` = machine closed while waiting.
    async fn admit(&self) -> Option<Option<OwnedSemaphorePermit>> {
        let Some(sem) = &self.inner.semaphore else {
            if self.inner.token.is_cancelled() {
                return None;
            }
            return Some(None);
        };
        tokio::select! {
            biased;
            _ = self.inner.token.cancelled() => None,
            permit = Arc::clone(sem).acquire_owned() => permit.ok().map(Some),
        }
    }

    /// Returns whether a routine with `pid` is currently registered.
    pub fn has_routine(&self, pid: &str) -> bool {
        self.inner.registry.contains(pid)
    }

    /// Returns sorted PIDs of live routines carrying `tag`.
    pub fn pids_with_tag(&self, tag: &str) -> Vec<String> {
        self.inner.registry.with_tag(tag)
    }

    /// Cancels the context of the routine with `pid`; returns `false` if it is not live.
    pub fn cancel_routine(&self, pid: &str) -> bool {
        self.inner.registry.cancel(pid)
    }

    /// Returns a snapshot of the machine's state.
    pub fn stats(&self) -> Stats {
        let routines = self.inner.registry.snapshot();
        let counters = &self.inner.counters;
        Stats {
            live: routines.len(),
            running: routines
                .iter()
                .filter(|r| r.state == RoutineState::Running)
                .count(),
            total: counters.spawned(),
            channels: self.inner.bus.channel_count(),
            subscriptions: self.inner.bus.subscription_count(),
            published: counters.published(),
            delivered: counters.delivered(),
            dropped: counters.dropped(),
            panics: counters.panics(),
            routines,
        }
    }

    /// Waits until every routine spawned so far, including routines spawned by
    /// routines, has finished.
    pub async fn wait(&self) {
        let mut rx = self.inner.active.subscribe();
        // The sender lives in `inner`, which `self` keeps alive.
        let _ = rx.wait_for(|active| *active == 0).await;
    }

    /// Closes the machine.
    ///
    /// Cancels every routine's context, stops admitting routines, wakes callers
    /// waiting for a slot, and ends all open subscriptions. Calling it again is a no-op.
    pub fn close(&self) {
        if self.inner.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.inner.token.cancel();
        if let Some(sem) = &self.inner.semaphore {
            sem.close();
        }
        self.inner.bus.close();
        info!(live = self.inner.registry.len(), "machine closed");
    }

    /// Returns whether the machine was closed or its parent token was cancelled.
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst) || self.inner.token.is_cancelled()
    }

    /// Returns the machine's root token, e.g. to nest another machine under it.
    pub fn token(&self) -> &CancellationToken {
        &self.inner.token
    }

    pub(crate) fn bus(&self) -> &Arc<Bus<M>> {
        &self.inner.bus
    }

    pub(crate) fn record_panic(&self) {
        self.inner.counters.record_panic();
    }
}

/// Cancels `token` after `limit` unless it is cancelled first.
fn arm_timeout(token: CancellationToken, limit: Duration) {
    tokio::spawn(async move {
        tokio::select! {
            _ = token.cancelled() => {}
            _ = tokio::time::sleep(limit) => {
                debug!(timeout = ?limit, "routine timeout elapsed");
                token.cancel();
            }
        }
    });
}

/// Bookkeeping held for a routine from registration until it finishes.
///
/// Dropping it (normal return, admission failure, or unwinding) removes the PID,
/// releases the slot, then decrements the active count, in that order.
struct Lease<M> {
    inner: Arc<Inner<M>>,
    pid: String,
    permit: Option<OwnedSemaphorePermit>,
}

impl<M> Lease<M> {
    fn new(inner: Arc<Inner<M>>, pid: String) -> Self {
        inner.active.send_modify(|active| *active += 1);
        Self {
            inner,
            pid,
            permit: None,
        }
    }
}

impl<M> Drop for Lease<M> {
    fn drop(&mut self) {
        self.inner.registry.remove(&self.pid);
        drop(self.permit.take());
        self.inner.active.send_modify(|active| *active -= 1);
        debug!(pid = %self.pid, "routine finished");
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use tokio::sync::oneshot;

    use super::*;

    fn machine(max: usize) -> Machine<u32> {
        Machine::builder()
            .max_routines(max)
            .build(&CancellationToken::new())
            .unwrap()
    }

    #[tokio::test]
    async fn pid_is_visible_until_work_finishes() {
        let m = machine(0);
        let (release_tx, release_rx) = oneshot::channel::<()>();
        let release_rx = parking_lot::Mutex::new(Some(release_rx));

        let pid = m
            .go(
                move |_r: Routine<u32>| {
                    let rx = release_rx.lock().take();
                    async move {
                        if let Some(rx) = rx {
                            let _ = rx.await;
                        }
                    }
                },
                RoutineSpec::new().with_pid("worker").with_tag("t"),
            )
            .await
            .unwrap();

        assert_eq!(pid, "worker");
        assert!(m.has_routine("worker"));
        assert_eq!(m.pids_with_tag("t"), ["worker"]);

        release_tx.send(()).unwrap();
        m.wait().await;
        assert!(!m.has_routine("worker"));
        assert_eq!(m.stats().total, 1);
    }

    #[tokio::test]
    async fn generated_pids_are_unique() {
        let m = machine(0);
        let a = m.go(|_r: Routine<u32>| async {}, RoutineSpec::new()).await.unwrap();
        let b = m.go(|_r: Routine<u32>| async {}, RoutineSpec::new()).await.unwrap();
        assert_ne!(a, b);
        assert!(!a.is_empty());
        m.wait().await;
    }

    #[tokio::test]
    async fn invalid_specs_are_rejected_synchronously() {
        let m = machine(0);
        let err = m
            .go(|_r: Routine<u32>| async {}, RoutineSpec::new().with_pid(""))
            .await
            .unwrap_err();
        assert_eq!(err, MachineError::EmptyPid);

        let err = m
            .go(
                |_r: Routine<u32>| async {},
                RoutineSpec::new()
                    .with_pid("z")
                    .with_timeout(Duration::ZERO),
            )
            .await
            .unwrap_err();
        assert_eq!(err, MachineError::ZeroTimeout { pid: "z".into() });
        assert_eq!(m.stats().live, 0);
    }

    #[tokio::test]
    async fn live_pid_cannot_be_reused() {
        let m = machine(0);
        m.go(
            |r: Routine<u32>| async move { r.context().cancelled().await },
            RoutineSpec::new().with_pid("dup"),
        )
        .await
        .unwrap();

        let err = m
            .go(|_r: Routine<u32>| async {}, RoutineSpec::new().with_pid("dup"))
            .await
            .unwrap_err();
        assert_eq!(err, MachineError::PidInUse { pid: "dup".into() });

        assert!(m.cancel_routine("dup"));
        m.wait().await;
        m.go(|_r: Routine<u32>| async {}, RoutineSpec::new().with_pid("dup"))
            .await
            .unwrap();
        m.wait().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn admission_bounds_running_routines() {
        let m = machine(2);
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        for _ in 0..10 {
            let running = Arc::clone(&running);
            let peak = Arc::clone(&peak);
            m.go(
                move |_r: Routine<u32>| {
                    let running = Arc::clone(&running);
                    let peak = Arc::clone(&peak);
                    async move {
                        let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                        peak.fetch_max(now, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                        running.fetch_sub(1, Ordering::SeqCst);
                    }
                },
                RoutineSpec::new(),
            )
            .await
            .unwrap();
            assert!(m.stats().running <= 2);
        }
        m.wait().await;

        assert!(peak.load(Ordering::SeqCst) <= 2);
        assert_eq!(m.stats().total, 10);
        assert_eq!(m.stats().live, 0);
    }

    #[tokio::test]
    async fn wait_covers_routines_spawned_by_routines() {
        let m = machine(0);
        let leaves = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&leaves);

        m.go(
            move |r: Routine<u32>| {
                let counter = Arc::clone(&counter);
                async move {
                    for _ in 0..3 {
                        let counter = Arc::clone(&counter);
                        r.go(
                            move |_child: Routine<u32>| {
                                let counter = Arc::clone(&counter);
                                async move {
                                    tokio::time::sleep(Duration::from_millis(5)).await;
                                    counter.fetch_add(1, Ordering::SeqCst);
                                }
                            },
                            RoutineSpec::new(),
                        )
                        .await
                        .unwrap();
                    }
                }
            },
            RoutineSpec::new(),
        )
        .await
        .unwrap();

        m.wait().await;
        assert_eq!(leaves.load(Ordering::SeqCst), 3);
        assert_eq!(m.stats().live, 0);

        // Nothing new was spawned; returns immediately.
        m.wait().await;
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_cancels_only_that_routine() {
        let m = machine(0);
        m.go(
            |r: Routine<u32>| async move { r.context().cancelled().await },
            RoutineSpec::new()
                .with_pid("short")
                .with_timeout(Duration::from_secs(1)),
        )
        .await
        .unwrap();
        m.go(
            |r: Routine<u32>| async move { r.context().cancelled().await },
            RoutineSpec::new().with_pid("long"),
        )
        .await
        .unwrap();

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(!m.has_routine("short"));
        assert!(m.has_routine("long"));

        m.close();
        m.wait().await;
        assert!(!m.has_routine("long"));
    }

    #[tokio::test]
    async fn close_is_idempotent_and_rejects_new_routines() {
        let m = machine(0);
        m.go(
            |r: Routine<u32>| async move { r.context().cancelled().await },
            RoutineSpec::new(),
        )
        .await
        .unwrap();

        m.close();
        m.close();
        assert!(m.is_closed());
        m.wait().await;

        let err = m
            .go(|_r: Routine<u32>| async {}, RoutineSpec::new())
            .await
            .unwrap_err();
        assert_eq!(err, MachineError::Closed);
        assert_eq!(m.stats().live, 0);
    }

    #[tokio::test]
    async fn close_wakes_callers_waiting_for_a_slot() {
        let m = machine(1);
        m.go(
            |r: Routine<u32>| async move { r.context().cancelled().await },
            RoutineSpec::new().with_pid("holder"),
        )
        .await
        .unwrap();

        let waiter = {
            let m = m.clone();
            tokio::spawn(async move {
                m.go(|_r: Routine<u32>| async {}, RoutineSpec::new().with_pid("queued"))
                    .await
            })
        };
        while !m.has_routine("queued") {
            tokio::task::yield_now().await;
        }
        assert_eq!(m.stats().running, 1);

        m.close();
        assert_eq!(waiter.await.unwrap(), Err(MachineError::Closed));
        m.wait().await;
        assert!(!m.has_routine("queued"));
    }

    #[tokio::test]
    async fn unbounded_admission_refuses_after_close() {
        let m = machine(0);
        assert!(matches!(m.admit().await, Some(None)));

        m.close();
        assert!(m.admit().await.is_none());
    }

    #[tokio::test]
    async fn parent_cancellation_reaches_routines() {
        let parent = CancellationToken::new();
        let m = Machine::<u32>::new(&parent, Config::default()).unwrap();
        m.go(
            |r: Routine<u32>| async move { r.context().cancelled().await },
            RoutineSpec::new(),
        )
        .await
        .unwrap();

        parent.cancel();
        m.wait().await;
        assert!(m.is_closed());
    }
}
