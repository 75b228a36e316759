//! Integration tests for the publish-and-prune maintenance pass.

use stats_throttle::infrastructure::mocks::{CollectingPublisher, MockCaptureLayer, MockClock};
use stats_throttle::{
    ClusterKey, Component, ComponentKind, CounterKind, StatsContext, StatsOptions,
    STATS_RECORD_TITLE,
};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;

const NOW: i64 = 1_700_000_000;

fn setup(options: StatsOptions) -> (StatsContext, MockClock, CollectingPublisher) {
    let clock = MockClock::with_unix_time(Instant::now(), NOW);
    let publisher = CollectingPublisher::new();
    let stats = StatsContext::builder()
        .with_options(options)
        .with_clock(Arc::new(clock.clone()))
        .with_publisher(Arc::new(publisher.clone()))
        .build()
        .unwrap();
    (stats, clock, publisher)
}

fn file_key() -> ClusterKey {
    ClusterKey::new(
        Component::source(ComponentKind::File),
        "file",
        Some("/var/log/x"),
    )
}

#[test]
fn test_file_cluster_expires_after_release() {
    let (stats, _clock, _publisher) = setup(StatsOptions {
        lifetime: 600,
        ..StatsOptions::default()
    });

    let processed = stats
        .register_dynamic_counter(0, file_key(), CounterKind::Processed)
        .unwrap();
    let stamp = stats
        .register_dynamic_counter(0, file_key(), CounterKind::Stamp)
        .unwrap();
    processed.add(42);
    stamp.set(NOW);

    let summary = stats.publish_and_prune();
    assert_eq!(summary.dropped, 0);
    assert!(stats.registry().contains(&file_key()));

    // Still referenced: a stale stamp alone is not enough
    stamp.set(NOW - 700);
    let summary = stats.publish_and_prune();
    assert_eq!(summary.dropped, 0);

    stats.unregister_counter(processed);
    stats.unregister_counter(stamp);
    let summary = stats.publish_and_prune();
    assert_eq!(summary.dropped, 1);
    assert_eq!(summary.oldest_timestamp, NOW - 700);
    assert!(!stats.registry().contains(&file_key()));

    let summary = stats.publish_and_prune();
    assert_eq!(summary.dropped, 0);
}

#[test]
fn test_record_lists_every_live_counter() {
    let (stats, _clock, publisher) = setup(StatsOptions::default());

    let processed = stats
        .register_counter(0, file_key(), CounterKind::Processed)
        .unwrap();
    let dropped = stats
        .register_counter(0, file_key(), CounterKind::Dropped)
        .unwrap();
    processed.add(10);
    dropped.inc();

    let center = ClusterKey::new(Component::plain(ComponentKind::Center), "", Some("received"));
    let received = stats
        .register_counter(0, center, CounterKind::Processed)
        .unwrap();
    received.add(7);

    stats.publish_and_prune();

    let record = publisher.last().unwrap();
    assert_eq!(record.title(), STATS_RECORD_TITLE);
    assert_eq!(record.len(), 3);

    let entry = record
        .find("src.file.processed", "file", Some("/var/log/x"))
        .unwrap();
    assert_eq!(entry.value, 10);
    assert_eq!(entry.to_string(), "src.file.processed(file,/var/log/x)=10");

    let entry = record
        .find("src.file.dropped", "file", Some("/var/log/x"))
        .unwrap();
    assert_eq!(entry.value, 1);

    let entry = record
        .find("center.processed", "", Some("received"))
        .unwrap();
    assert_eq!(entry.to_string(), "center.processed(received)=7");
    // never registered, never published
    assert!(record
        .find("src.file.stored", "file", Some("/var/log/x"))
        .is_none());

    stats.unregister_counter(processed);
    stats.unregister_counter(dropped);
    stats.unregister_counter(received);
}

#[test]
fn test_group_components_render_as_direction() {
    let (stats, _clock, publisher) = setup(StatsOptions::default());

    let group = ClusterKey::new(Component::destination(ComponentKind::Group), "d_all", None);
    let handle = stats
        .register_counter(0, group, CounterKind::Stored)
        .unwrap();
    handle.add(5);

    stats.publish_and_prune();

    let record = publisher.last().unwrap();
    let entry = record.find("destination.stored", "d_all", None).unwrap();
    assert_eq!(entry.to_string(), "destination.stored(d_all)=5");
    stats.unregister_counter(handle);
}

#[test]
fn test_pruning_emits_summary_event() {
    let (stats, clock, _publisher) = setup(StatsOptions {
        log_freq: 0,
        lifetime: 60,
        ..StatsOptions::default()
    });

    for (i, host) in ["10.0.0.1", "10.0.0.2", "10.0.0.3"].into_iter().enumerate() {
        let key = ClusterKey::new(Component::plain(ComponentKind::Host), "", Some(host));
        stats.instant_inc_dynamic_counter(0, key, NOW + 10 * i as i64);
        clock.advance(Duration::from_secs(10));
    }

    let capture = MockCaptureLayer::new();
    let subscriber = tracing_subscriber::registry().with(capture.clone());

    clock.advance(Duration::from_secs(45));
    let summary = tracing::subscriber::with_default(subscriber, || stats.publish_and_prune());

    // stamps NOW, NOW+10, NOW+20 against now = NOW+75 and lifetime 60
    assert_eq!(summary.dropped, 2);
    assert_eq!(summary.oldest_timestamp, NOW);

    let events = capture.with_message("Pruning stats-counters have finished");
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].level, Level::INFO);
    assert_eq!(events[0].field("dropped"), Some("2"));
    assert_eq!(events[0].field("oldest_timestamp"), Some(&*NOW.to_string()));
}

#[test]
fn test_no_summary_event_without_pruning() {
    let (stats, _clock, _publisher) = setup(StatsOptions::default());
    let capture = MockCaptureLayer::new();
    let subscriber = tracing_subscriber::registry().with(capture.clone());

    tracing::subscriber::with_default(subscriber, || stats.publish_and_prune());

    assert!(capture
        .with_message("Pruning stats-counters have finished")
        .is_empty());
}

#[test]
fn test_disabled_level_registers_nothing() {
    let (stats, _clock, publisher) = setup(StatsOptions {
        level: 0,
        ..StatsOptions::default()
    });

    let sender = ClusterKey::new(Component::plain(ComponentKind::Sender), "", Some("peer"));
    stats.instant_inc_dynamic_counter(2, sender, NOW);
    assert!(stats.register_counter(1, file_key(), CounterKind::Processed).is_none());

    stats.publish_and_prune();
    assert!(stats.registry().is_empty());
    assert!(publisher.last().unwrap().is_empty());
}
