// # Probe Traits
//
// Defines the interfaces for the three external signals the monitor
// consumes: reachability, public IP, and throughput.
//
// ## Implementations
//
// - Command-backed (ping, speedtest-cli): `linkwatch-probe-cmd` crate
// - HTTP-backed IP lookup: `linkwatch-probe-http` crate
//
// Probes are **observers**, not decision-makers: they perform one bounded
// external operation per call and report what they saw. Retry policy,
// debouncing, and logging are owned by the engine. A probe implementation
// must not append to the log store or touch tracker state.

use async_trait::async_trait;

/// One reachability attempt
///
/// Implementations must be thread-safe and usable across async tasks.
/// A failed attempt is a valid "down" observation, not an error, so this
/// trait is infallible: any internal failure maps to `false`.
///
/// The engine drives up to `reachability_retries` attempts per cycle and
/// short-circuits on the first success.
#[async_trait]
pub trait ReachabilityProbe: Send + Sync {
    /// Perform a single probe attempt
    async fn check(&self) -> bool;
}

/// Public IP lookup
#[async_trait]
pub trait IpLookup: Send + Sync {
    /// Fetch the caller's current external IP address
    ///
    /// # Returns
    ///
    /// - `Ok(String)`: the observed address
    /// - `Err(Error::Probe)`: the lookup service was unreachable or returned
    ///   garbage; the caller records the failure and skips classification
    ///   for this cycle
    async fn lookup(&self) -> Result<String, crate::Error>;
}

/// One throughput measurement
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThroughputSample {
    /// Download rate in Mbit/s
    pub download_mbps: f64,
    /// Upload rate in Mbit/s
    pub upload_mbps: f64,
    /// Round-trip latency in milliseconds
    pub ping_ms: f64,
}

impl ThroughputSample {
    /// Render the sample the way it appears in the event log,
    /// matching the field order of `speedtest-cli --simple`.
    pub fn log_message(&self) -> String {
        format!(
            "Ping: {:.1} ms Download: {:.2} Mbit/s Upload: {:.2} Mbit/s",
            self.ping_ms, self.download_mbps, self.upload_mbps
        )
    }
}

/// Throughput test runner
#[async_trait]
pub trait ThroughputProbe: Send + Sync {
    /// Run one complete measurement
    ///
    /// # Returns
    ///
    /// - `Ok(ThroughputSample)`: the measurement
    /// - `Err(Error::Probe)`: the tool failed or timed out
    async fn run(&self) -> Result<ThroughputSample, crate::Error>;
}

/// Helper trait for constructing reachability probes from configuration
pub trait ReachabilityProbeFactory: Send + Sync {
    /// Create a probe instance from configuration
    fn create(&self, config: &serde_json::Value)
    -> Result<Box<dyn ReachabilityProbe>, crate::Error>;
}

/// Helper trait for constructing IP lookups from configuration
pub trait IpLookupFactory: Send + Sync {
    /// Create a lookup instance from configuration
    fn create(&self, config: &serde_json::Value) -> Result<Box<dyn IpLookup>, crate::Error>;
}

/// Helper trait for constructing throughput probes from configuration
pub trait ThroughputProbeFactory: Send + Sync {
    /// Create a probe instance from configuration
    fn create(&self, config: &serde_json::Value) -> Result<Box<dyn ThroughputProbe>, crate::Error>;
}
