//! # Example: bounded_pool
//!
//! Twenty jobs through a machine with three admission slots.
//!
//! `go` waits while all slots are taken, so the loop below is throttled by the
//! machine. The trace middleware logs each job's start and finish; one job panics
//! and is recovered without losing its slot.
//!
//! ## Run
//! ```bash
//! cargo run --example bounded_pool
//! ```

use std::time::Duration;

use routine_machine::{Machine, Routine, RoutineSpec, middleware};
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_target(false).init();

    let m = Machine::<u64>::builder()
        .max_routines(3)
        .with_middlewares([middleware::recover(), middleware::trace()])
        .build(&CancellationToken::new())?;

    for job in 0..20u64 {
        let pid = m
            .go(
                move |r: Routine<u64>| async move {
                    if job == 13 {
                        panic!("job {job} is unlucky");
                    }
                    tokio::time::sleep(Duration::from_millis(50 * (job % 4 + 1))).await;
                    r.publish("results", job * job);
                },
                RoutineSpec::new()
                    .with_pid(format!("job-{job}"))
                    .with_tag("job"),
            )
            .await?;
        let stats = m.stats();
        println!("admitted {pid}: running={} live={}", stats.running, stats.live);
    }

    m.wait().await;
    println!("{}", m.stats());
    m.close();
    Ok(())
}
