//! # routine-machine
//!
//! **routine-machine** is a process-local concurrency orchestration engine for Tokio.
//!
//! It spawns and tracks bounded, named units of concurrent work ("routines"),
//! lets them talk through an in-process publish/subscribe bus without holding
//! references to each other, and wraps their execution in a composable
//! middleware pipeline (panic recovery, periodic re-invocation, logging).
//!
//! ## Architecture
//! ### Overview
//! ```text
//!   work + RoutineSpec   work + RoutineSpec   work + RoutineSpec
//!          │                    │                    │
//!          ▼                    ▼                    ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  Machine                                                          │
//! │  - Registry   (PID → tags, token, state)                          │
//! │  - Semaphore  (max_routines admission slots)                      │
//! │  - Root token (parent of every routine token)                     │
//! │  - Bus        (channel → subscription queues)                     │
//! │  - Counters   (stats)                                             │
//! └──────┬──────────────────┬──────────────────┬──────────────────────┘
//!        ▼                  ▼                  ▼
//!   m1(m2(r1(work)))   m1(m2(work))       m1(m2(r1(r2(work))))    ◄── middleware chain
//!        │                  │                  │
//!        ▼                  ▼                  ▼
//!   ┌──────────┐       ┌──────────┐       ┌──────────┐
//!   │ Routine A│       │ Routine B│       │ Routine C│              ◄── one tokio task each
//!   └────┬─────┘       └────┬─────┘       └────┬─────┘
//!        │ publish          │ subscribe        │ subscribe_n
//!        ▼                  ▼                  ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │                Bus: "acme.com" ─► [queue B] [queue C]             │
//! └───────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ### Lifecycle
//! ```text
//! Machine::new ──► go(work, spec)* ──► wait() ──► close()
//!
//! go:    register PID ─► acquire slot ─► spawn wrapped work
//! exit:  remove PID ─► release slot ─► wake wait()
//! close: cancel root token ─► close semaphore ─► close bus
//! ```
//!
//! ## Features
//! | Area              | Description                                                  | Key types                                  |
//! |-------------------|--------------------------------------------------------------|--------------------------------------------|
//! | **Machine**       | Admission control, registry, wait/close.                     | [`Machine`], [`MachineBuilder`], [`Config`] |
//! | **Routines**      | Handle passed into work; identity, context, messaging.       | [`Routine`], [`RoutineSpec`], [`Work`]     |
//! | **Messaging**     | Named channels with fan-out; unbounded/counted/predicate subs.| [`Routine::publish`], [`Subscription`]     |
//! | **Middleware**    | Composable wrappers around work.                             | [`Middleware`], [`middleware::recover`], [`middleware::cron`] |
//! | **Introspection** | Point-in-time stats.                                         | [`Stats`], [`RoutineStats`]                |
//! | **Errors**        | Typed configuration/misuse errors.                           | [`MachineError`], [`SubscribeError`]       |
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use tokio_util::sync::CancellationToken;
//! use routine_machine::{Machine, Routine, RoutineSpec, middleware};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let machine = Machine::<String>::builder()
//!         .max_routines(10)
//!         .with_middleware(middleware::recover())
//!         .build(&CancellationToken::new())?;
//!
//!     // Receives the first two messages on "news", then exits.
//!     machine
//!         .go(
//!             |r: Routine<String>| async move {
//!                 let _ = r.subscribe_n("news", 2, |msg| println!("got {msg}")).await;
//!             },
//!             RoutineSpec::new().with_tag("reader"),
//!         )
//!         .await?;
//!
//!     // Publishes every 100ms until its timeout cancels it.
//!     machine
//!         .go(
//!             |r: Routine<String>| async move {
//!                 r.publish("news", format!("from {}", r.pid()));
//!             },
//!             RoutineSpec::new()
//!                 .with_pid("writer")
//!                 .with_timeout(Duration::from_millis(350))
//!                 .with_middleware(middleware::cron(Duration::from_millis(100))),
//!         )
//!         .await?;
//!
//!     machine.wait().await;
//!     machine.close();
//!     Ok(())
//! }
//! ```
mod bus;
mod core;
mod error;
pub mod middleware;
mod routine;

// ---- Public re-exports ----

pub use bus::Subscription;
pub use core::{Config, Machine, MachineBuilder, RoutineState, RoutineStats, Stats};
pub use error::{MachineError, SubscribeError};
pub use middleware::Middleware;
pub use routine::{Routine, RoutineSpec, Work, work_fn};
