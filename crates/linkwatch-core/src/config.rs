//! Configuration types for the connection monitor
//!
//! This module defines all configuration structures used throughout the crate.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main monitor configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Paths of the persisted files
    #[serde(default)]
    pub paths: PathsConfig,

    /// Scheduler settings
    #[serde(default)]
    pub engine: EngineConfig,

    /// Shipping settings (disabled when endpoint or access key is absent)
    #[serde(default)]
    pub shipping: ShippingConfig,

    /// Severity cutoffs for rendered throughput lines
    #[serde(default)]
    pub thresholds: SeverityThresholds,
}

impl MonitorConfig {
    /// Create a new configuration with defaults
    pub fn new() -> Self {
        Self {
            paths: PathsConfig::default(),
            engine: EngineConfig::default(),
            shipping: ShippingConfig::default(),
            thresholds: SeverityThresholds::default(),
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        self.engine.validate()?;
        self.shipping.validate()?;
        Ok(())
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Locations of the durable files the monitor owns
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Append-only event log
    #[serde(default = "default_log_path")]
    pub log: PathBuf,

    /// Append-only error log
    #[serde(default = "default_error_log_path")]
    pub error_log: PathBuf,

    /// Service allow-list JSON document
    #[serde(default = "default_allow_list_path")]
    pub allow_list: PathBuf,

    /// Last-shipped-line watermark
    #[serde(default = "default_watermark_path")]
    pub watermark: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            log: default_log_path(),
            error_log: default_error_log_path(),
            allow_list: default_allow_list_path(),
            watermark: default_watermark_path(),
        }
    }
}

/// Scheduler configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Seconds between connectivity checks
    #[serde(default = "default_check_interval_secs")]
    pub check_interval_secs: u64,

    /// Seconds between throughput measurements
    #[serde(default = "default_throughput_interval_secs")]
    pub throughput_interval_secs: u64,

    /// Seconds between shipping attempts
    #[serde(default = "default_shipping_interval_secs")]
    pub shipping_interval_secs: u64,

    /// Consecutive reachability probe failures required before a cycle
    /// classifies the network as down
    #[serde(default = "default_reachability_retries")]
    pub reachability_retries: usize,

    /// Seconds after which an unchanged signal is re-logged anyway
    #[serde(default = "default_unconditional_log_interval_secs")]
    pub unconditional_log_interval_secs: u64,

    /// Upper bound on any single probe invocation (seconds)
    #[serde(default = "default_probe_timeout_secs")]
    pub probe_timeout_secs: u64,

    /// Upper bound on a throughput test invocation (seconds)
    #[serde(default = "default_throughput_timeout_secs")]
    pub throughput_timeout_secs: u64,

    /// Capacity of the internal event channel
    ///
    /// When full, new events are dropped (with a warning log).
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

impl EngineConfig {
    /// Validate the scheduler configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.check_interval_secs == 0 {
            return Err(crate::Error::config("check interval must be > 0"));
        }
        if self.throughput_interval_secs == 0 {
            return Err(crate::Error::config("throughput interval must be > 0"));
        }
        if self.shipping_interval_secs == 0 {
            return Err(crate::Error::config("shipping interval must be > 0"));
        }
        if self.reachability_retries == 0 {
            return Err(crate::Error::config("reachability retries must be >= 1"));
        }
        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            check_interval_secs: default_check_interval_secs(),
            throughput_interval_secs: default_throughput_interval_secs(),
            shipping_interval_secs: default_shipping_interval_secs(),
            reachability_retries: default_reachability_retries(),
            unconditional_log_interval_secs: default_unconditional_log_interval_secs(),
            probe_timeout_secs: default_probe_timeout_secs(),
            throughput_timeout_secs: default_throughput_timeout_secs(),
            event_channel_capacity: default_event_channel_capacity(),
        }
    }
}

/// Shipping configuration
///
/// Shipping is enabled only when both `endpoint` and `access_key` are set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShippingConfig {
    /// Webhook URL receiving `{logs, htmlLogs}` payloads
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Shared secret sent in the `access-key` header
    #[serde(default)]
    pub access_key: Option<String>,

    /// Number of trailing log lines considered per shipping attempt
    #[serde(default = "default_tail_window")]
    pub tail_window: usize,
}

impl Default for ShippingConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            access_key: None,
            tail_window: default_tail_window(),
        }
    }
}

impl ShippingConfig {
    /// Whether shipping is enabled at all
    pub fn enabled(&self) -> bool {
        self.endpoint.as_deref().is_some_and(|e| !e.is_empty())
            && self.access_key.as_deref().is_some_and(|k| !k.is_empty())
    }

    /// Validate the shipping configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if let Some(endpoint) = &self.endpoint
            && !endpoint.is_empty()
            && !endpoint.starts_with("http://")
            && !endpoint.starts_with("https://")
        {
            return Err(crate::Error::config(format!(
                "shipping endpoint must use HTTP or HTTPS. Got: {}",
                endpoint
            )));
        }
        if self.tail_window == 0 {
            return Err(crate::Error::config("shipping tail window must be > 0"));
        }
        Ok(())
    }
}

/// Severity cutoffs for throughput lines
///
/// Measurements beyond these bounds render as `warn` instead of `ok`.
/// Policy values, not a contract: historical deployments disagree on the
/// exact cutoffs.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SeverityThresholds {
    /// Minimum acceptable download rate (Mbit/s)
    #[serde(default = "default_min_download_mbps")]
    pub min_download_mbps: f64,

    /// Minimum acceptable upload rate (Mbit/s)
    #[serde(default = "default_min_upload_mbps")]
    pub min_upload_mbps: f64,

    /// Maximum acceptable ping (ms)
    #[serde(default = "default_max_ping_ms")]
    pub max_ping_ms: f64,
}

impl Default for SeverityThresholds {
    fn default() -> Self {
        Self {
            min_download_mbps: default_min_download_mbps(),
            min_upload_mbps: default_min_upload_mbps(),
            max_ping_ms: default_max_ping_ms(),
        }
    }
}

fn default_log_path() -> PathBuf {
    PathBuf::from("network_monitor_log.txt")
}

fn default_error_log_path() -> PathBuf {
    PathBuf::from("network_monitor_error.txt")
}

fn default_allow_list_path() -> PathBuf {
    PathBuf::from("network_monitor_IP_addresses.json")
}

fn default_watermark_path() -> PathBuf {
    PathBuf::from("network_monitor_last_log_uploaded.txt")
}

fn default_check_interval_secs() -> u64 {
    60
}

fn default_throughput_interval_secs() -> u64 {
    2 * 60 * 60
}

fn default_shipping_interval_secs() -> u64 {
    60
}

fn default_reachability_retries() -> usize {
    3
}

fn default_unconditional_log_interval_secs() -> u64 {
    4 * 60 * 60
}

fn default_probe_timeout_secs() -> u64 {
    60
}

fn default_throughput_timeout_secs() -> u64 {
    180
}

fn default_event_channel_capacity() -> usize {
    1000
}

fn default_tail_window() -> usize {
    500
}

fn default_min_download_mbps() -> f64 {
    10.0
}

fn default_min_upload_mbps() -> f64 {
    1.0
}

fn default_max_ping_ms() -> f64 {
    100.0
}
