//! End-to-end surveillance tests.
//!
//! Runs the full application against stub providers:
//! - Fallback from a rate-limited provider
//! - Flat history followed by a spike raises one volume alert
//! - Shutdown applies every queued item and stops dispatching
//! - Startup backfill makes detection ready on the first live quote

mod integration;
use integration::common::stub_provider::{
    HistoryProvider, Quote, RateLimitedProvider, ScriptedProvider, SlowProvider,
};

use rust_decimal_macros::dec;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use surveil_alert::AlertConfig;
use surveil_app::{AppConfig, Application};
use surveil_core::{AlertRule, Direction, MetricKind, RuleScope, Severity, Symbol};
use surveil_persistence::{AlertFilter, PersistenceConfig};
use surveil_source::{RateLimiter, SourceClient};
use tokio::time::timeout;

fn rules() -> Vec<AlertRule> {
    vec![
        AlertRule::new(
            "volume-spike",
            RuleScope::Any,
            MetricKind::VolumeRatio,
            3.0,
            Direction::Above,
            Duration::from_secs(300),
        ),
        AlertRule::new(
            "price-move",
            RuleScope::Symbol(Symbol::new("XYZ")),
            MetricKind::PriceChangePct,
            5.0,
            Direction::Either,
            Duration::from_secs(300),
        ),
    ]
}

fn config(watchlist: &[&str], polling_interval_ms: u64) -> AppConfig {
    AppConfig {
        watchlist: watchlist.iter().map(|s| s.to_string()).collect(),
        polling_interval_ms,
        alerts: AlertConfig {
            rules: rules(),
            ..Default::default()
        },
        persistence: PersistenceConfig::memory(),
        ..Default::default()
    }
}

/// Test that a spike after flat history raises exactly one high-severity
/// volume alert, fed through the fallback provider.
#[tokio::test]
async fn test_spike_after_flat_history_raises_volume_alert() {
    let limited = RateLimitedProvider::new("a");
    let limited_calls = limited.calls();
    let scripted = ScriptedProvider::new(
        "b",
        Quote {
            price: dec!(100),
            volume: dec!(1000),
        },
        Quote {
            price: dec!(108),
            volume: dec!(10000),
        },
        30,
    );
    let client = SourceClient::new(Duration::from_secs(1))
        .with_provider(Arc::new(limited), RateLimiter::new(100_000, 60))
        .with_provider(Arc::new(scripted), RateLimiter::new(100_000, 60));

    let app = Application::with_source_client(config(&["XYZ"], 5), client).unwrap();
    let handle = app.handle();
    let shutdown = app.shutdown_token();
    let run = tokio::spawn(app.run());

    let symbol = Symbol::new("XYZ");
    let raised = timeout(Duration::from_secs(10), async {
        loop {
            if handle.history(&symbol).len() >= 35 {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    assert!(raised.is_ok(), "pipeline should process the spike within timeout");

    shutdown.cancel();
    let report = timeout(Duration::from_secs(5), run)
        .await
        .expect("shutdown within timeout")
        .unwrap()
        .unwrap();
    assert!(report.pipeline.processed >= 35);

    // Every snapshot came from the fallback provider.
    assert!(handle.history(&symbol).iter().all(|s| s.source == "b"));
    assert!(limited_calls.load(Ordering::SeqCst) >= 35);

    let alerts = handle.recent_alerts(100);
    let volume: Vec<_> = alerts
        .iter()
        .filter(|a| a.rule_id == "volume-spike")
        .collect();
    assert_eq!(volume.len(), 1, "cooldown suppresses repeats");
    let alert = volume[0];
    assert!(alert.severity >= Severity::High);
    assert!(alert.detection.flags.volume_spike);
    assert!(alert.detection.flags.price_spike);
    assert_eq!(alert.detection.price, dec!(108));

    let price: Vec<_> = alerts.iter().filter(|a| a.rule_id == "price-move").collect();
    assert_eq!(price.len(), 1);

    let stored = handle
        .stored_alerts(&AlertFilter::new().min_severity(Severity::High))
        .unwrap();
    assert!(stored.iter().any(|a| a.id == alert.id));

    let usage = handle.provider_usage();
    assert_eq!(usage[0].provider, "a");
    assert_eq!(usage[0].successes, 0);
    assert!(usage[1].successes >= 35);
}

/// Test that shutdown applies every fetched snapshot and stops dispatching.
#[tokio::test]
async fn test_shutdown_drains_queue() {
    let slow = SlowProvider::new(Duration::from_millis(20));
    let started = slow.started.clone();
    let delivered = slow.delivered.clone();
    let client = SourceClient::new(Duration::from_secs(1))
        .with_provider(Arc::new(slow), RateLimiter::new(100_000, 60));

    let mut cfg = config(&["AAA", "BBB", "CCC", "DDD"], 10);
    cfg.pool_size = 2;
    cfg.queue_capacity = 2;
    let app = Application::with_source_client(cfg, client).unwrap();
    let handle = app.handle();
    let shutdown = app.shutdown_token();
    let run = tokio::spawn(app.run());

    tokio::time::sleep(Duration::from_millis(150)).await;
    shutdown.cancel();
    let report = timeout(Duration::from_secs(5), run)
        .await
        .expect("shutdown within timeout")
        .unwrap()
        .unwrap();

    let calls_at_stop = started.load(Ordering::SeqCst);
    let cached: usize = ["AAA", "BBB", "CCC", "DDD"]
        .iter()
        .map(|s| handle.history(&Symbol::new(s)).len())
        .sum();

    assert_eq!(report.scheduler.aborted, 0);
    assert_eq!(cached, delivered.load(Ordering::SeqCst));
    assert_eq!(report.pipeline.received as usize, cached);
    assert_eq!(calls_at_stop, cached);

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(started.load(Ordering::SeqCst), calls_at_stop);
}

/// Test that backfilled history lets the first live quote raise an alert.
#[tokio::test]
async fn test_backfill_readies_detection_at_startup() {
    let provider = HistoryProvider::new(
        Quote {
            price: dec!(100),
            volume: dec!(1000),
        },
        Quote {
            price: dec!(108),
            volume: dec!(10000),
        },
    );
    let history_calls = provider.history_calls.clone();
    let client = SourceClient::new(Duration::from_secs(1))
        .with_provider(Arc::new(provider), RateLimiter::new(100_000, 60));

    let mut cfg = config(&["XYZ"], 3_600_000);
    cfg.history_backfill = 30;
    let app = Application::with_source_client(cfg, client).unwrap();
    let handle = app.handle();
    let shutdown = app.shutdown_token();
    let run = tokio::spawn(app.run());

    let symbol = Symbol::new("XYZ");
    let alerted = timeout(Duration::from_secs(5), async {
        while handle.recent_alerts(10).is_empty() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    assert!(alerted.is_ok(), "first live quote should alert");

    shutdown.cancel();
    let report = timeout(Duration::from_secs(5), run)
        .await
        .expect("shutdown within timeout")
        .unwrap()
        .unwrap();

    assert_eq!(report.backfilled, 30);
    assert_eq!(history_calls.load(Ordering::SeqCst), 1);
    // One tick of an hour-long interval: backfill plus a single live quote.
    assert_eq!(report.pipeline.processed, 1);
    assert_eq!(handle.history(&symbol).len(), 31);
    assert!(handle
        .recent_alerts(10)
        .iter()
        .any(|a| a.rule_id == "volume-spike"));
}

/// Test that a configuration without usable providers is rejected.
#[test]
fn test_application_requires_providers() {
    assert!(Application::new(config(&["XYZ"], 1000)).is_err());
}
