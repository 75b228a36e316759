//! Integration tests for the maintenance timer lifecycle.

#![cfg(feature = "async")]

use stats_throttle::infrastructure::mocks::{CollectingPublisher, MockClock};
use stats_throttle::{
    ClusterKey, Component, ComponentKind, StatsContext, StatsOptions, TimerAction, TimerError,
};
use std::sync::Arc;
use std::time::{Duration, Instant};

const NOW: i64 = 1_700_000_000;

fn setup() -> (StatsContext, MockClock, CollectingPublisher) {
    let clock = MockClock::with_unix_time(Instant::now(), NOW);
    let publisher = CollectingPublisher::new();
    let stats = StatsContext::builder()
        .with_clock(Arc::new(clock.clone()))
        .with_publisher(Arc::new(publisher.clone()))
        .build()
        .unwrap();
    (stats, clock, publisher)
}

fn host(addr: &str) -> ClusterKey {
    ClusterKey::new(Component::plain(ComponentKind::Host), "", Some(addr))
}

#[tokio::test(start_paused = true)]
async fn test_timer_prunes_without_publishing() {
    let (stats, clock, publisher) = setup();
    stats
        .reinit(StatsOptions {
            level: 0,
            log_freq: 0,
            lifetime: 20,
        })
        .unwrap();
    // half the lifetime
    assert_eq!(stats.timer_period(), Some(Duration::from_secs(10)));

    stats.instant_inc_dynamic_counter(0, host("10.1.1.1"), NOW);
    assert_eq!(stats.registry().len(), 1);

    // The wall clock is mocked; move it past the lifetime before the first firing
    clock.advance(Duration::from_secs(30));
    tokio::time::sleep(Duration::from_secs(11)).await;

    assert!(stats.registry().is_empty());
    assert!(publisher.records().is_empty());
    stats.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_timer_publishes_each_period() {
    let (stats, _clock, publisher) = setup();
    stats
        .reinit(StatsOptions {
            level: 0,
            log_freq: 60,
            lifetime: 600,
        })
        .unwrap();

    stats.instant_inc_dynamic_counter(0, host("10.1.1.2"), NOW);
    tokio::time::sleep(Duration::from_secs(185)).await;

    let records = publisher.records();
    assert_eq!(records.len(), 3);
    for record in &records {
        let entry = record.find("host.processed", "", Some("10.1.1.2")).unwrap();
        assert_eq!(entry.value, 1);
    }
    stats.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_clears_registry_and_stops_timer() {
    let (stats, _clock, publisher) = setup();
    stats
        .reinit(StatsOptions {
            log_freq: 1,
            ..StatsOptions::default()
        })
        .unwrap();
    stats.instant_inc_dynamic_counter(0, host("10.1.1.3"), NOW);

    stats.shutdown().await.unwrap();
    assert!(stats.registry().is_empty());
    assert_eq!(stats.timer_period(), None);

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert!(publisher.records().is_empty());

    // A second shutdown has nothing left to stop
    stats.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_teardown_from_sync_code() {
    let (stats, _clock, publisher) = setup();
    stats
        .reinit(StatsOptions {
            log_freq: 1,
            ..StatsOptions::default()
        })
        .unwrap();

    stats.teardown();
    tokio::time::sleep(Duration::from_secs(5)).await;

    assert_eq!(stats.timer_period(), None);
    assert!(publisher.records().is_empty());
}

#[test]
fn test_restart_timer_requires_runtime() {
    let (stats, _clock, _publisher) = setup();
    assert_eq!(stats.restart_timer(), Err(TimerError::NoRuntime));

    // reinit still applies the options
    let options = StatsOptions {
        level: 2,
        ..StatsOptions::default()
    };
    stats.reinit(options).unwrap();
    assert_eq!(stats.options(), options);
}

#[tokio::test(start_paused = true)]
async fn test_spawned_timer_stops_itself() {
    let remaining = Arc::new(std::sync::atomic::AtomicUsize::new(2));
    let counter = Arc::clone(&remaining);

    let handle = stats_throttle::spawn_timer(Duration::from_secs(1), move || {
        if counter.fetch_sub(1, std::sync::atomic::Ordering::SeqCst) > 1 {
            TimerAction::Rearm
        } else {
            TimerAction::Stop
        }
    });

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert!(handle.is_finished());
    assert_eq!(remaining.load(std::sync::atomic::Ordering::SeqCst), 0);
    handle.shutdown().await.unwrap();
}
