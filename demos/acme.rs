//! # Example: acme
//!
//! One publisher and three subscribers sharing the `acme.com` channel.
//!
//! Demonstrates how to:
//! - Build a [`Machine`] with a slot limit and panic recovery.
//! - Run a periodic, timeout-bound publisher with [`middleware::cron`].
//! - Subscribe with no limit, for a fixed count, and until a predicate holds.
//!
//! ## Flow
//! ```text
//! publisher  (cron 1s, timeout 3s) ──► publish("acme.com") ×3 ──► exits
//! all        (timeout 4s)          ──► every message until its timeout
//! first-three                       ──► first 3 messages, then exits
//! until-gone                        ──► stops after a message once the publisher is gone
//! wait() ──► close()
//! ```
//!
//! ## Run
//! ```bash
//! RUST_LOG=debug cargo run --example acme
//! ```

use std::time::Duration;

use routine_machine::{Machine, Routine, RoutineSpec, middleware};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

const CHANNEL: &str = "acme.com";
const PUBLISHER: &str = "publisher";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let shutdown = CancellationToken::new();
    let m = Machine::<String>::builder()
        .max_routines(10)
        .with_middleware(middleware::recover())
        .build(&shutdown)?;

    m.go(
        |r: Routine<String>| async move {
            let n = r
                .subscribe(CHANNEL, |msg| {
                    println!("{} | received msg = {msg} stats = {}", r.pid(), r.machine().stats());
                })
                .await;
            println!("{} | done after {n} messages", r.pid());
        },
        RoutineSpec::new()
            .with_pid("all")
            .with_tag("subscribe")
            .with_timeout(Duration::from_secs(4)),
    )
    .await?;

    m.go(
        |r: Routine<String>| async move {
            let res = r
                .subscribe_n(CHANNEL, 3, |msg| {
                    println!("{} | received msg = {msg}", r.pid());
                })
                .await;
            println!("{} | done: {res:?}", r.pid());
        },
        RoutineSpec::new().with_pid("first-three").with_tag("subscribeN"),
    )
    .await?;

    m.go(
        |r: Routine<String>| async move {
            let machine = r.machine().clone();
            let n = r
                .subscribe_until(
                    CHANNEL,
                    move || !machine.has_routine(PUBLISHER),
                    |msg| println!("{} | received msg = {msg}", r.pid()),
                )
                .await;
            println!("{} | done after {n} messages", r.pid());
        },
        RoutineSpec::new()
            .with_pid("until-gone")
            .with_tag("subscribeUntil")
            .with_timeout(Duration::from_secs(5)),
    )
    .await?;

    m.go(
        |r: Routine<String>| async move {
            println!("{} | streaming to {CHANNEL} stats = {}", r.pid(), r.machine().stats());
            r.publish(CHANNEL, "hey there bud!".to_string());
        },
        RoutineSpec::new()
            .with_pid(PUBLISHER)
            .with_tag("publish")
            .with_timeout(Duration::from_secs(3))
            .with_middleware(middleware::cron(Duration::from_secs(1))),
    )
    .await?;

    m.wait().await;
    println!("final stats = {}", m.stats());
    m.close();
    Ok(())
}
