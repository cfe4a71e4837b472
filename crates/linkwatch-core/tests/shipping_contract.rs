//! Contract: shipping watermark
//!
//! Constraints verified:
//! - A shipped delta, once the watermark advanced, is never re-sent
//! - An empty delta performs no outbound call and leaves the watermark alone
//! - A watermark that rotated out of the tail window fails open (full tail)
//! - A failed delivery leaves the watermark untouched; the next success
//!   re-ships the same lines
//! - The shipping success record never ships itself forever

mod common;

use common::CountingSink;
use linkwatch_core::config::SeverityThresholds;
use linkwatch_core::logstore::LogStore;
use linkwatch_core::shipping::{ShipOutcome, Shipper, WatermarkStore};
use std::path::Path;
use std::sync::atomic::Ordering;
use tempfile::tempdir;

fn shipper_over(dir: &Path, sink: CountingSink) -> (Shipper, LogStore, WatermarkStore) {
    let log = LogStore::new(dir.join("log.txt"));
    let watermark = WatermarkStore::new(dir.join("watermark.txt"));
    let shipper = Shipper::new(
        log.clone(),
        WatermarkStore::new(dir.join("watermark.txt")),
        Box::new(sink),
        500,
        SeverityThresholds::default(),
    );
    (shipper, log, watermark)
}

#[tokio::test]
async fn round_trip_is_idempotent() {
    let dir = tempdir().unwrap();
    let sink = CountingSink::new();
    let probe = CountingSink::sharing_counters_with(&sink);
    let (shipper, log, _watermark) = shipper_over(dir.path(), sink);

    log.append("NETWORK UP").await.unwrap();
    log.append("PUBLIC IP 1.2.3.4").await.unwrap();

    assert_eq!(shipper.run_once().await.unwrap(), ShipOutcome::Shipped(2));
    assert_eq!(probe.ship_call_count(), 1);

    // nothing new: the second attempt must not touch the network, even
    // though the success record itself landed in the log
    assert_eq!(shipper.run_once().await.unwrap(), ShipOutcome::NothingToShip);
    assert_eq!(probe.ship_call_count(), 1);
}

#[tokio::test]
async fn empty_log_ships_nothing() {
    let dir = tempdir().unwrap();
    let sink = CountingSink::new();
    let probe = CountingSink::sharing_counters_with(&sink);
    let (shipper, _log, watermark) = shipper_over(dir.path(), sink);

    assert_eq!(shipper.run_once().await.unwrap(), ShipOutcome::NothingToShip);
    assert_eq!(probe.ship_call_count(), 0);
    assert_eq!(watermark.load().await.unwrap(), None);
}

#[tokio::test]
async fn rotated_watermark_fails_open_to_full_tail() {
    let dir = tempdir().unwrap();
    let sink = CountingSink::new();
    let probe = CountingSink::sharing_counters_with(&sink);
    let (shipper, log, watermark) = shipper_over(dir.path(), sink);

    watermark
        .store("2024-01-01T00:00:00.000Z LINE ROTATED AWAY")
        .await
        .unwrap();
    log.append("NETWORK UP").await.unwrap();

    // the watermark line no longer exists in the tail: better to resend a
    // bounded window than to silently drop history
    assert_eq!(shipper.run_once().await.unwrap(), ShipOutcome::Shipped(1));
    assert!(probe.batches()[0].logs.contains("NETWORK UP"));
}

#[tokio::test]
async fn failed_delivery_leaves_watermark_and_retries() {
    let dir = tempdir().unwrap();
    let sink = CountingSink::new();
    let probe = CountingSink::sharing_counters_with(&sink);
    let fail = probe.failure_switch();
    let (shipper, log, watermark) = shipper_over(dir.path(), sink);

    log.append("NETWORK DOWN").await.unwrap();

    fail.store(true, Ordering::SeqCst);
    assert!(shipper.run_once().await.is_err());
    assert_eq!(watermark.load().await.unwrap(), None);

    // recovery: the exact same line is still in the next delta
    fail.store(false, Ordering::SeqCst);
    assert_eq!(shipper.run_once().await.unwrap(), ShipOutcome::Shipped(1));
    assert_eq!(probe.ship_call_count(), 2);
    assert!(probe.batches()[1].logs.contains("NETWORK DOWN"));
}

#[tokio::test]
async fn success_record_does_not_ship_itself_forever() {
    let dir = tempdir().unwrap();
    let sink = CountingSink::new();
    let probe = CountingSink::sharing_counters_with(&sink);
    let (shipper, log, watermark) = shipper_over(dir.path(), sink);

    log.append("NETWORK UP").await.unwrap();
    assert_eq!(shipper.run_once().await.unwrap(), ShipOutcome::Shipped(1));

    // the success record exists in the log but the watermark parks on it
    let tail = log.tail_lines(10).await.unwrap();
    assert!(tail.last().unwrap().contains("LOGS SHIPPED"));
    assert_eq!(
        watermark.load().await.unwrap().as_deref(),
        Some(tail.last().unwrap().as_str())
    );

    // ten more attempts with no new lines: zero further deliveries
    for _ in 0..10 {
        assert_eq!(shipper.run_once().await.unwrap(), ShipOutcome::NothingToShip);
    }
    assert_eq!(probe.ship_call_count(), 1);

    // a genuinely new line ships, and the success marker from the first
    // attempt is not re-sent with it
    log.append("NETWORK DOWN").await.unwrap();
    assert_eq!(shipper.run_once().await.unwrap(), ShipOutcome::Shipped(1));
    let last_batch = probe.batches().last().unwrap().clone();
    assert!(last_batch.logs.contains("NETWORK DOWN"));
    assert!(!last_batch.logs.contains("NETWORK UP"));
}

#[tokio::test]
async fn batch_carries_rendered_html() {
    let dir = tempdir().unwrap();
    let sink = CountingSink::new();
    let probe = CountingSink::sharing_counters_with(&sink);
    let (shipper, log, _watermark) = shipper_over(dir.path(), sink);

    log.append("NETWORK DOWN").await.unwrap();
    shipper.run_once().await.unwrap();

    let batch = probe.batches()[0].clone();
    assert!(batch.html_logs.contains("class=\"error\""));
    assert!(batch.html_logs.contains("NETWORK DOWN"));
}
