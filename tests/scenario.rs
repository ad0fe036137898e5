use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use routine_machine::{Machine, MachineError, Routine, RoutineSpec, SubscribeError, middleware};

const CHANNEL: &str = "acme.com";
const PUBLISHER: &str = "publisher";

fn machine(max: usize) -> Machine<String> {
    Machine::builder()
        .max_routines(max)
        .with_middleware(middleware::recover())
        .build(&CancellationToken::new())
        .unwrap()
}

async fn until_subscriptions(m: &Machine<String>, n: usize) {
    while m.stats().subscriptions < n {
        tokio::task::yield_now().await;
    }
}

#[tokio::test(start_paused = true)]
async fn publisher_and_three_kinds_of_subscribers() {
    let m = machine(10);
    let all = Arc::new(AtomicUsize::new(0));
    let first_three = Arc::new(AtomicUsize::new(0));
    let until_gone = Arc::new(AtomicUsize::new(0));

    let seen = Arc::clone(&all);
    m.go(
        move |r: Routine<String>| {
            let seen = Arc::clone(&seen);
            async move {
                r.subscribe(CHANNEL, |_msg| {
                    seen.fetch_add(1, Ordering::SeqCst);
                })
                .await;
            }
        },
        RoutineSpec::new()
            .with_pid("all")
            .with_tag("subscribe")
            .with_timeout(Duration::from_secs(5)),
    )
    .await
    .unwrap();

    let seen = Arc::clone(&first_three);
    m.go(
        move |r: Routine<String>| {
            let seen = Arc::clone(&seen);
            async move {
                let n = r
                    .subscribe_n(CHANNEL, 3, |_msg| {
                        seen.fetch_add(1, Ordering::SeqCst);
                    })
                    .await
                    .unwrap();
                assert_eq!(n, 3);
            }
        },
        RoutineSpec::new().with_pid("first-three").with_tag("subscribe"),
    )
    .await
    .unwrap();

    let seen = Arc::clone(&until_gone);
    m.go(
        move |r: Routine<String>| {
            let seen = Arc::clone(&seen);
            async move {
                let machine = r.machine().clone();
                r.subscribe_until(
                    CHANNEL,
                    move || !machine.has_routine(PUBLISHER),
                    |_msg| {
                        seen.fetch_add(1, Ordering::SeqCst);
                    },
                )
                .await;
            }
        },
        RoutineSpec::new()
            .with_pid("until-publisher-exits")
            .with_tag("subscribe"),
    )
    .await
    .unwrap();

    until_subscriptions(&m, 3).await;
    assert_eq!(m.pids_with_tag("subscribe").len(), 3);

    m.go(
        |r: Routine<String>| async move {
            r.publish(CHANNEL, format!("hey there from {}", r.pid()));
        },
        RoutineSpec::new()
            .with_pid(PUBLISHER)
            .with_tag("publish")
            .with_timeout(Duration::from_millis(3500))
            .with_middleware(middleware::cron(Duration::from_secs(1))),
    )
    .await
    .unwrap();

    tokio::time::sleep(Duration::from_secs(4)).await;
    assert!(!m.has_routine(PUBLISHER));
    assert!(!m.has_routine("first-three"));
    assert!(m.has_routine("until-publisher-exits"));
    assert_eq!(first_three.load(Ordering::SeqCst), 3);
    assert_eq!(until_gone.load(Ordering::SeqCst), 3);

    // One more message lets the predicate subscriber notice the publisher is gone.
    m.go(
        |r: Routine<String>| async move {
            r.publish(CHANNEL, "last".to_string());
        },
        RoutineSpec::new().with_pid("straggler"),
    )
    .await
    .unwrap();

    m.wait().await;
    assert_eq!(until_gone.load(Ordering::SeqCst), 4);
    assert_eq!(all.load(Ordering::SeqCst), 4);
    assert_eq!(first_three.load(Ordering::SeqCst), 3);

    let stats = m.stats();
    assert_eq!(stats.live, 0);
    assert_eq!(stats.total, 5);
    assert_eq!(stats.published, 4);
    assert_eq!(stats.panics, 0);
    m.close();
}

#[tokio::test(start_paused = true)]
async fn predicate_that_never_holds_runs_until_cancelled() {
    let m = machine(0);
    let processed = Arc::new(AtomicUsize::new(0));
    let started = tokio::time::Instant::now();

    let seen = Arc::clone(&processed);
    m.go(
        move |r: Routine<String>| {
            let seen = Arc::clone(&seen);
            async move {
                let n = r
                    .subscribe_until(CHANNEL, || false, |_msg| {
                        seen.fetch_add(1, Ordering::SeqCst);
                    })
                    .await;
                assert_eq!(n, 5);
            }
        },
        RoutineSpec::new()
            .with_pid("never-satisfied")
            .with_timeout(Duration::from_secs(2)),
    )
    .await
    .unwrap();
    until_subscriptions(&m, 1).await;

    m.go(
        |r: Routine<String>| async move {
            for i in 0..5 {
                r.publish(CHANNEL, i.to_string());
            }
        },
        RoutineSpec::new(),
    )
    .await
    .unwrap();

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(processed.load(Ordering::SeqCst), 5);
    assert!(m.has_routine("never-satisfied"));

    m.wait().await;
    assert!(!m.has_routine("never-satisfied"));
    assert!(started.elapsed() >= Duration::from_secs(2));
    assert_eq!(processed.load(Ordering::SeqCst), 5);
    assert_eq!(m.stats().panics, 0);
}

#[tokio::test]
async fn each_subscriber_sees_publish_order() {
    let m = machine(0);
    let received = Arc::new(Mutex::new(Vec::new()));

    let sink = Arc::clone(&received);
    m.go(
        move |r: Routine<String>| {
            let sink = Arc::clone(&sink);
            async move {
                r.subscribe_n("numbers", 100, |msg| sink.lock().push(msg))
                    .await
                    .unwrap();
            }
        },
        RoutineSpec::new(),
    )
    .await
    .unwrap();
    until_subscriptions(&m, 1).await;

    m.go(
        |r: Routine<String>| async move {
            for i in 0..100 {
                r.publish("numbers", i.to_string());
            }
        },
        RoutineSpec::new(),
    )
    .await
    .unwrap();
    m.wait().await;

    let expected: Vec<String> = (0..100).map(|i| i.to_string()).collect();
    assert_eq!(*received.lock(), expected);
}

#[tokio::test]
async fn zero_count_subscription_is_rejected() {
    let m = machine(0);
    let outcome = Arc::new(Mutex::new(None));

    let slot = Arc::clone(&outcome);
    m.go(
        move |r: Routine<String>| {
            let slot = Arc::clone(&slot);
            async move {
                let res = r.subscribe_n("ch", 0, |_msg| {}).await;
                *slot.lock() = Some(res);
            }
        },
        RoutineSpec::new(),
    )
    .await
    .unwrap();
    m.wait().await;

    assert_eq!(
        outcome.lock().take(),
        Some(Err(SubscribeError::ZeroCount {
            channel: "ch".into()
        }))
    );
    assert_eq!(m.stats().subscriptions, 0);
}

#[tokio::test]
async fn full_bounded_queue_drops_for_that_subscriber_only() {
    let m = Machine::<String>::builder()
        .subscription_capacity(1)
        .build(&CancellationToken::new())
        .unwrap();
    let pulled = Arc::new(Mutex::new(Vec::new()));

    let sink = Arc::clone(&pulled);
    m.go(
        move |r: Routine<String>| {
            let sink = Arc::clone(&sink);
            async move {
                let mut sub = r.subscription("ch");
                let accepted: Vec<usize> = ["a", "b", "c"]
                    .into_iter()
                    .map(|msg| r.publish("ch", msg.to_string()))
                    .collect();
                assert_eq!(accepted, [1, 0, 0]);
                if let Some(msg) = sub.next().await {
                    sink.lock().push(msg);
                }
            }
        },
        RoutineSpec::new(),
    )
    .await
    .unwrap();
    m.wait().await;

    assert_eq!(*pulled.lock(), ["a"]);
    let stats = m.stats();
    assert_eq!(stats.dropped, 2);
    assert_eq!(stats.delivered, 1);
}

#[tokio::test]
async fn close_ends_unbounded_subscriptions() {
    let m = machine(0);
    m.go(
        |r: Routine<String>| async move {
            r.subscribe(CHANNEL, |_msg| {}).await;
        },
        RoutineSpec::new().with_pid("listener"),
    )
    .await
    .unwrap();
    until_subscriptions(&m, 1).await;

    m.close();
    m.wait().await;
    assert!(!m.has_routine("listener"));
    assert_eq!(m.stats().subscriptions, 0);

    let err = m
        .go(|_r: Routine<String>| async {}, RoutineSpec::new())
        .await
        .unwrap_err();
    assert_eq!(err, MachineError::Closed);
}

#[tokio::test]
async fn panics_do_not_shrink_capacity() {
    let m = machine(2);
    for _ in 0..5 {
        m.go(
            |_r: Routine<String>| async { panic!("boom") },
            RoutineSpec::new().with_tag("doomed"),
        )
        .await
        .unwrap();
    }
    m.wait().await;
    assert_eq!(m.stats().panics, 5);

    let done = Arc::new(AtomicUsize::new(0));
    for _ in 0..2 {
        let done = Arc::clone(&done);
        m.go(
            move |_r: Routine<String>| {
                let done = Arc::clone(&done);
                async move {
                    done.fetch_add(1, Ordering::SeqCst);
                }
            },
            RoutineSpec::new(),
        )
        .await
        .unwrap();
    }
    m.wait().await;
    assert_eq!(done.load(Ordering::SeqCst), 2);
    assert!(m.pids_with_tag("doomed").is_empty());
}
