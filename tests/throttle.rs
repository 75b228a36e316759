//! Integration tests for the token-bucket throttle filter.

use stats_throttle::infrastructure::mocks::{MockCaptureLayer, MockClock};
use stats_throttle::{
    AndFilter, FieldEqualsFilter, FilterExpr, LogRecord, OrFilter, ThrottleConfig,
    ThrottleConfigError, ThrottleDecision, ThrottleFilter, ThrottleOptions,
};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing_subscriber::layer::SubscriberExt;

fn records(host: &str, n: usize) -> Vec<LogRecord> {
    (0..n)
        .map(|i| {
            LogRecord::new()
                .with_field("HOST", host)
                .with_field("MESSAGE", format!("message {}", i))
        })
        .collect()
}

fn keyed_filter(rate: i64) -> (ThrottleFilter, MockClock) {
    let clock = MockClock::new(Instant::now());
    let filter = ThrottleFilter::builder()
        .with_rate(rate)
        .with_key("HOST")
        .with_clock(Arc::new(clock.clone()))
        .build()
        .unwrap();
    (filter, clock)
}

#[test]
fn test_burst_then_steady_rate() {
    let (filter, clock) = keyed_filter(10);

    assert_eq!(filter.check_batch(&records("A", 10)), ThrottleDecision::Admit);
    assert_eq!(filter.check_batch(&records("A", 1)), ThrottleDecision::Deny);

    // 99ms earns nothing yet
    clock.advance(Duration::from_millis(99));
    assert_eq!(filter.check_batch(&records("A", 1)), ThrottleDecision::Deny);

    clock.advance(Duration::from_millis(1));
    assert_eq!(filter.check_batch(&records("A", 1)), ThrottleDecision::Admit);
    assert_eq!(filter.check_batch(&records("A", 1)), ThrottleDecision::Deny);

    clock.advance(Duration::from_millis(500));
    assert_eq!(filter.check_batch(&records("A", 5)), ThrottleDecision::Admit);
}

#[test]
fn test_exhausted_key_does_not_affect_others() {
    let (filter, _clock) = keyed_filter(10);

    assert!(filter.check_batch(&records("A", 10)).is_admit());
    assert!(filter.check_batch(&records("A", 1)).is_deny());

    assert!(filter.check_batch(&records("B", 10)).is_admit());
    assert!(filter.check_batch(&records("B", 1)).is_deny());
    assert_eq!(filter.bucket_count(), 2);
}

#[test]
fn test_fractional_refill_is_not_lost() {
    let (filter, clock) = keyed_filter(10);
    assert!(filter.check_batch(&records("A", 10)).is_admit());

    // 60ms earns 0.6 tokens, kept until the next call completes a whole one
    clock.advance(Duration::from_millis(60));
    assert!(filter.check_batch(&records("A", 1)).is_deny());
    clock.advance(Duration::from_millis(60));
    assert!(filter.check_batch(&records("A", 1)).is_admit());
}

#[test]
fn test_unkeyed_filter_shares_one_bucket() {
    let clock = MockClock::new(Instant::now());
    let filter = ThrottleFilter::builder()
        .with_rate(3)
        .with_clock(Arc::new(clock.clone()))
        .build()
        .unwrap();

    assert!(filter.check_batch(&records("A", 2)).is_admit());
    assert!(filter.check_batch(&records("B", 2)).is_deny());
    assert!(filter.check_batch(&records("C", 1)).is_admit());
    assert_eq!(filter.bucket_count(), 1);
    assert_eq!(filter.bucket_tokens(""), Some(0));
}

#[test]
fn test_invalid_configuration_is_rejected() {
    assert_eq!(
        ThrottleConfig::new(0, Some("HOST".to_string())),
        Err(ThrottleConfigError::NonPositiveRate(0))
    );
    assert!(ThrottleFilter::builder().with_rate(-1).build().is_err());
    assert!(ThrottleFilter::builder()
        .with_rate(1)
        .with_key("")
        .build()
        .is_err());

    let options = ThrottleOptions {
        rate: 0,
        key: None,
    };
    assert!(ThrottleFilter::from_options(options).is_err());
}

#[test]
fn test_bucket_creation_is_logged_once_per_key() {
    let (filter, _clock) = keyed_filter(100);
    let capture = MockCaptureLayer::new();
    let subscriber = tracing_subscriber::registry().with(capture.clone());

    tracing::subscriber::with_default(subscriber, || {
        for _ in 0..5 {
            filter.check_batch(&records("A", 1));
            filter.check_batch(&records("B", 1));
        }
    });

    let created = capture.with_message("creating throttle bucket");
    assert_eq!(created.len(), 2);
    assert_eq!(created[0].field("key"), Some("A"));
    assert_eq!(created[1].field("key"), Some("B"));
    assert_eq!(created[0].field("rate"), Some("100"));
    assert_eq!(filter.metrics().buckets_created(), 2);
}

#[test]
fn test_throttle_only_matching_records() {
    let (throttle, _clock) = keyed_filter(1);
    let mut filter = OrFilter(
        Box::new(FieldEqualsFilter::new("PROGRAM", "cron")),
        Box::new(throttle.clone()),
    );
    filter.init().unwrap();

    let cron = [LogRecord::new()
        .with_field("HOST", "A")
        .with_field("PROGRAM", "cron")];
    let sshd = [LogRecord::new()
        .with_field("HOST", "A")
        .with_field("PROGRAM", "sshd")];

    // cron records bypass the throttle entirely
    for _ in 0..5 {
        assert!(filter.eval(&cron));
    }
    assert!(filter.eval(&sshd));
    assert!(!filter.eval(&sshd));
    assert_eq!(throttle.metrics().batches_admitted(), 1);
}

#[test]
fn test_and_filter_short_circuits_before_throttle() {
    let (throttle, _clock) = keyed_filter(1);
    let mut filter = AndFilter(
        Box::new(FieldEqualsFilter::new("PROGRAM", "sshd")),
        Box::new(throttle.clone()),
    );
    filter.init().unwrap();

    let cron = records("A", 1)
        .into_iter()
        .map(|r| r.with_field("PROGRAM", "cron"))
        .collect::<Vec<_>>();
    assert!(!filter.eval(&cron));
    assert_eq!(throttle.bucket_count(), 0);
}
