// # Shipment Sink Trait
//
// Defines the interface for delivering log lines to the upload endpoint.
//
// ## Trust boundary
//
// Sinks are isolated, stateless, and single-shot: one POST per call, full
// error propagation to the engine. Retry policy and watermark advancement
// are owned by the shipping layer — a sink must not persist anything or
// decide what has already been delivered.

use async_trait::async_trait;
use serde::Serialize;

/// One batch of log lines to deliver, joined for transmission
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ShipmentBatch {
    /// Raw log lines, newline-joined
    pub logs: String,

    /// HTML-rendered variant of the same lines
    #[serde(rename = "htmlLogs")]
    pub html_logs: String,
}

impl ShipmentBatch {
    /// Build a batch from an ordered slice of raw lines and its rendered form
    pub fn new(lines: &[String], html_logs: String) -> Self {
        Self {
            logs: lines.join("\n"),
            html_logs,
        }
    }
}

/// Trait for shipment sink implementations
///
/// Implementations must be thread-safe and usable across async tasks.
#[async_trait]
pub trait ShipmentSink: Send + Sync {
    /// Deliver one batch
    ///
    /// # Returns
    ///
    /// - `Ok(())`: the endpoint confirmed receipt (HTTP 2xx)
    /// - `Err(Error::Shipping)`: any other outcome; the caller leaves the
    ///   watermark untouched and retries on the next cycle
    async fn ship(&self, batch: &ShipmentBatch) -> Result<(), crate::Error>;
}

/// Helper trait for constructing sinks from configuration
pub trait ShipmentSinkFactory: Send + Sync {
    /// Create a sink instance from configuration
    fn create(&self, config: &crate::config::ShippingConfig)
    -> Result<Box<dyn ShipmentSink>, crate::Error>;
}
