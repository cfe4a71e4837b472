// # Command-Backed Probes
//
// This crate provides the probe adapters that shell out to external tools:
//
// - **PingProbe**: network reachability via `ping -c 1 <target>`
// - **SpeedtestProbe**: throughput via `speedtest-cli --simple`
//
// ## Architecture
//
// Both probes are single-shot observers: one process invocation per call,
// exit status or parsed stdout as the result. Retry policy, debouncing, and
// logging are owned by the engine — a probe failure here is an observation,
// never a crash.
//
// The engine bounds every call with its own timeout, so neither probe
// manages deadlines beyond letting the child run.

use async_trait::async_trait;
use linkwatch_core::traits::{
    ReachabilityProbe, ReachabilityProbeFactory, ThroughputProbe, ThroughputProbeFactory,
    ThroughputSample,
};
use linkwatch_core::{Error, Result};
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

/// Default reachability target
const DEFAULT_PING_TARGET: &str = "google.com";

/// Default ping executable
const DEFAULT_PING_PROGRAM: &str = "ping";

/// Default speed test executable
const DEFAULT_SPEEDTEST_PROGRAM: &str = "speedtest-cli";

/// Reachability via the system `ping`
pub struct PingProbe {
    program: String,
    target: String,
}

impl PingProbe {
    /// Create a probe against the default target
    pub fn new() -> Self {
        Self::with_target(DEFAULT_PING_TARGET)
    }

    /// Create a probe against a specific host
    pub fn with_target(target: impl Into<String>) -> Self {
        Self {
            program: DEFAULT_PING_PROGRAM.to_string(),
            target: target.into(),
        }
    }

    /// Override the ping executable (busybox ping, fping, a test stub)
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }
}

impl Default for PingProbe {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ReachabilityProbe for PingProbe {
    async fn check(&self) -> bool {
        let result = Command::new(&self.program)
            .arg("-c")
            .arg("1")
            .arg(&self.target)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await;

        match result {
            Ok(status) => status.success(),
            Err(e) => {
                // a missing or broken ping binary is a "down" observation,
                // not a reason to crash the monitor
                debug!("failed to spawn {}: {}", self.program, e);
                false
            }
        }
    }
}

/// Throughput via `speedtest-cli --simple`
pub struct SpeedtestProbe {
    program: String,
}

impl SpeedtestProbe {
    /// Create a probe using the default executable
    pub fn new() -> Self {
        Self {
            program: DEFAULT_SPEEDTEST_PROGRAM.to_string(),
        }
    }

    /// Override the speed test executable
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for SpeedtestProbe {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ThroughputProbe for SpeedtestProbe {
    async fn run(&self) -> Result<ThroughputSample> {
        let output = Command::new(&self.program)
            .arg("--simple")
            .stderr(Stdio::null())
            .output()
            .await
            .map_err(|e| Error::probe(format!("failed to run {}: {}", self.program, e)))?;

        if !output.status.success() {
            return Err(Error::probe(format!(
                "{} exited with {}",
                self.program, output.status
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        parse_simple_output(&stdout)
    }
}

/// Parse the three-line `--simple` report:
///
/// ```text
/// Ping: 18.25 ms
/// Download: 52.31 Mbit/s
/// Upload: 9.80 Mbit/s
/// ```
pub fn parse_simple_output(stdout: &str) -> Result<ThroughputSample> {
    let mut ping_ms = None;
    let mut download_mbps = None;
    let mut upload_mbps = None;

    for line in stdout.lines() {
        let line = line.trim();
        if let Some(rest) = line.strip_prefix("Ping:") {
            ping_ms = first_number(rest);
        } else if let Some(rest) = line.strip_prefix("Download:") {
            download_mbps = first_number(rest);
        } else if let Some(rest) = line.strip_prefix("Upload:") {
            upload_mbps = first_number(rest);
        }
    }

    match (download_mbps, upload_mbps, ping_ms) {
        (Some(download_mbps), Some(upload_mbps), Some(ping_ms)) => Ok(ThroughputSample {
            download_mbps,
            upload_mbps,
            ping_ms,
        }),
        _ => Err(Error::probe(format!(
            "unrecognized speed test output: {:?}",
            stdout
        ))),
    }
}

fn first_number(text: &str) -> Option<f64> {
    text.split_whitespace().next()?.parse().ok()
}

/// Factory for creating ping probes
///
/// Accepts `{"target": "...", "program": "..."}`, both optional.
pub struct PingFactory;

impl ReachabilityProbeFactory for PingFactory {
    fn create(&self, config: &serde_json::Value) -> Result<Box<dyn ReachabilityProbe>> {
        let target = config
            .get("target")
            .and_then(|v| v.as_str())
            .unwrap_or(DEFAULT_PING_TARGET);
        let program = config
            .get("program")
            .and_then(|v| v.as_str())
            .unwrap_or(DEFAULT_PING_PROGRAM);
        Ok(Box::new(PingProbe::with_target(target).with_program(program)))
    }
}

/// Factory for creating speed test probes
///
/// Accepts `{"program": "..."}`, optional.
pub struct SpeedtestFactory;

impl ThroughputProbeFactory for SpeedtestFactory {
    fn create(&self, config: &serde_json::Value) -> Result<Box<dyn ThroughputProbe>> {
        let program = config
            .get("program")
            .and_then(|v| v.as_str())
            .unwrap_or(DEFAULT_SPEEDTEST_PROGRAM);
        Ok(Box::new(SpeedtestProbe::with_program(program)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_report() {
        let sample = parse_simple_output("Ping: 18.25 ms\nDownload: 52.31 Mbit/s\nUpload: 9.80 Mbit/s\n")
            .unwrap();
        assert_eq!(sample.ping_ms, 18.25);
        assert_eq!(sample.download_mbps, 52.31);
        assert_eq!(sample.upload_mbps, 9.8);
    }

    #[test]
    fn tolerates_leading_noise_lines() {
        let stdout = "Retrieving speedtest.net configuration...\nPing: 30 ms\nDownload: 10 Mbit/s\nUpload: 2 Mbit/s";
        let sample = parse_simple_output(stdout).unwrap();
        assert_eq!(sample.ping_ms, 30.0);
    }

    #[test]
    fn incomplete_report_is_a_probe_error() {
        let result = parse_simple_output("Ping: 30 ms\n");
        assert!(matches!(result, Err(Error::Probe(_))));
    }

    #[test]
    fn factory_defaults() {
        let factory = PingFactory;
        assert!(factory.create(&serde_json::json!({})).is_ok());

        let factory = SpeedtestFactory;
        assert!(
            factory
                .create(&serde_json::json!({"program": "fake-speedtest"}))
                .is_ok()
        );
    }

    #[tokio::test]
    async fn missing_binary_is_down_not_panic() {
        let probe = PingProbe::with_target("localhost").with_program("definitely-not-a-real-ping");
        assert!(!probe.check().await);
    }
}
