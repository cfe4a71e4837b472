//! Test doubles and common utilities for contract tests
//!
//! Minimal controllable probes and a counting sink, so the contracts can
//! be verified without process execution or network access.

use async_trait::async_trait;
use linkwatch_core::config::MonitorConfig;
use linkwatch_core::error::{Error, Result};
use linkwatch_core::traits::{
    IpLookup, ReachabilityProbe, ShipmentBatch, ShipmentSink, ThroughputProbe, ThroughputSample,
};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// A reachability probe whose answer tests can flip at runtime
pub struct SwitchableReachability {
    up: Arc<AtomicBool>,
    check_call_count: Arc<AtomicUsize>,
}

impl SwitchableReachability {
    /// Create a probe together with the switch controlling its answer
    pub fn new(initially_up: bool) -> (Self, Arc<AtomicBool>) {
        let up = Arc::new(AtomicBool::new(initially_up));
        let probe = Self {
            up: Arc::clone(&up),
            check_call_count: Arc::new(AtomicUsize::new(0)),
        };
        (probe, up)
    }

    /// Number of probe attempts so far
    pub fn check_call_count(&self) -> usize {
        self.check_call_count.load(Ordering::SeqCst)
    }

    /// Create a probe that shares counters with an existing one
    pub fn sharing_counters_with(other: &Self) -> Self {
        Self {
            up: Arc::clone(&other.up),
            check_call_count: Arc::clone(&other.check_call_count),
        }
    }
}

#[async_trait]
impl ReachabilityProbe for SwitchableReachability {
    async fn check(&self) -> bool {
        self.check_call_count.fetch_add(1, Ordering::SeqCst);
        self.up.load(Ordering::SeqCst)
    }
}

/// An IP lookup returning a fixed address, or failing on demand
pub struct StaticIpLookup {
    ip: Arc<std::sync::Mutex<String>>,
    fail: Arc<AtomicBool>,
}

impl StaticIpLookup {
    pub fn new(ip: &str) -> Self {
        Self {
            ip: Arc::new(std::sync::Mutex::new(ip.to_string())),
            fail: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Handle that makes every subsequent lookup fail (or recover)
    pub fn failure_switch(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.fail)
    }

    /// Handle that changes the address returned by subsequent lookups
    pub fn address_handle(&self) -> Arc<std::sync::Mutex<String>> {
        Arc::clone(&self.ip)
    }
}

#[async_trait]
impl IpLookup for StaticIpLookup {
    async fn lookup(&self) -> Result<String> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(Error::probe("lookup service unreachable"));
        }
        Ok(self.ip.lock().unwrap().clone())
    }
}

/// A throughput probe returning a fixed sample, or failing on demand
pub struct StaticThroughput {
    sample: ThroughputSample,
    fail: Arc<AtomicBool>,
}

impl StaticThroughput {
    pub fn new(download_mbps: f64, upload_mbps: f64, ping_ms: f64) -> Self {
        Self {
            sample: ThroughputSample {
                download_mbps,
                upload_mbps,
                ping_ms,
            },
            fail: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn failure_switch(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.fail)
    }
}

#[async_trait]
impl ThroughputProbe for StaticThroughput {
    async fn run(&self) -> Result<ThroughputSample> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(Error::probe("speedtest tool exited non-zero"));
        }
        Ok(self.sample)
    }
}

/// A sink that counts deliveries and records every batch
pub struct CountingSink {
    ship_call_count: Arc<AtomicUsize>,
    batches: Arc<std::sync::Mutex<Vec<ShipmentBatch>>>,
    fail: Arc<AtomicBool>,
}

impl CountingSink {
    pub fn new() -> Self {
        Self {
            ship_call_count: Arc::new(AtomicUsize::new(0)),
            batches: Arc::new(std::sync::Mutex::new(Vec::new())),
            fail: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Number of times ship() was called
    pub fn ship_call_count(&self) -> usize {
        self.ship_call_count.load(Ordering::SeqCst)
    }

    /// Every batch the sink accepted or rejected, in order
    pub fn batches(&self) -> Vec<ShipmentBatch> {
        self.batches.lock().unwrap().clone()
    }

    /// Handle that makes every subsequent delivery fail (or recover)
    pub fn failure_switch(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.fail)
    }

    /// Create a sink that shares counters with an existing one
    pub fn sharing_counters_with(other: &Self) -> Self {
        Self {
            ship_call_count: Arc::clone(&other.ship_call_count),
            batches: Arc::clone(&other.batches),
            fail: Arc::clone(&other.fail),
        }
    }
}

#[async_trait]
impl ShipmentSink for CountingSink {
    async fn ship(&self, batch: &ShipmentBatch) -> Result<()> {
        self.ship_call_count.fetch_add(1, Ordering::SeqCst);
        self.batches.lock().unwrap().push(batch.clone());
        if self.fail.load(Ordering::SeqCst) {
            return Err(Error::shipping("endpoint returned 503"));
        }
        Ok(())
    }
}

/// A monitor configuration with every persisted file under `dir` and
/// short scheduler periods suitable for paused-clock tests
pub fn test_config(dir: &Path) -> MonitorConfig {
    let mut config = MonitorConfig::default();
    config.paths.log = dir.join("network_monitor_log.txt");
    config.paths.error_log = dir.join("network_monitor_error.txt");
    config.paths.allow_list = dir.join("network_monitor_IP_addresses.json");
    config.paths.watermark = dir.join("network_monitor_last_log_uploaded.txt");
    config.engine.check_interval_secs = 60;
    config.engine.throughput_interval_secs = 7200;
    config.engine.shipping_interval_secs = 60;
    config.engine.reachability_retries = 3;
    config
}
