// # Webhook Shipment Sink
//
// This crate delivers log batches to the configured upload endpoint.
//
// ## Architecture
//
// The sink is isolated, stateless, and single-shot:
//
// - One POST per `ship()` call, JSON body `{logs, htmlLogs}`
// - Shared secret in the `access-key` header
// - Full error propagation to the shipping layer
// - NO retry logic (owned by the engine's shipping timer)
// - NO watermark knowledge (owned by the Shipper)
//
// ## Security
//
// The access key never appears in logs: the Debug implementation redacts
// it, and error messages carry only HTTP status codes.

use async_trait::async_trait;
use linkwatch_core::traits::{ShipmentBatch, ShipmentSink, ShipmentSinkFactory};
use linkwatch_core::{Error, Result};
use std::time::Duration;

/// Header carrying the shared secret
const ACCESS_KEY_HEADER: &str = "access-key";

/// Default HTTP timeout for upload requests
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Webhook-backed shipment sink
pub struct WebhookSink {
    /// Upload endpoint URL
    endpoint: String,

    /// Shared secret, sent as the `access-key` header.
    /// Never log this value.
    access_key: String,

    /// HTTP client for upload requests
    client: reqwest::Client,
}

// Custom Debug implementation that hides the access key
impl std::fmt::Debug for WebhookSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookSink")
            .field("endpoint", &self.endpoint)
            .field("access_key", &"<REDACTED>")
            .finish()
    }
}

impl WebhookSink {
    /// Create a sink for the given endpoint and shared secret
    pub fn new(endpoint: impl Into<String>, access_key: impl Into<String>) -> Result<Self> {
        let endpoint = endpoint.into();
        let access_key = access_key.into();

        if endpoint.is_empty() {
            return Err(Error::config("webhook endpoint cannot be empty"));
        }
        if access_key.is_empty() {
            return Err(Error::config("webhook access key cannot be empty"));
        }

        let client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .map_err(|e| Error::config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            endpoint,
            access_key,
            client,
        })
    }
}

#[async_trait]
impl ShipmentSink for WebhookSink {
    async fn ship(&self, batch: &ShipmentBatch) -> Result<()> {
        let response = self
            .client
            .post(&self.endpoint)
            .header(ACCESS_KEY_HEADER, &self.access_key)
            .json(batch)
            .send()
            .await
            .map_err(|e| Error::shipping(format!("upload request failed: {}", e)))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        match status.as_u16() {
            401 | 403 => Err(Error::shipping(format!(
                "endpoint rejected the access key (HTTP {})",
                status.as_u16()
            ))),
            429 => Err(Error::shipping("endpoint rate limited the upload (HTTP 429)")),
            code if status.is_server_error() => Err(Error::shipping(format!(
                "endpoint server error (HTTP {})",
                code
            ))),
            code => Err(Error::shipping(format!("upload failed (HTTP {})", code))),
        }
    }
}

/// Factory for creating webhook sinks from shipping configuration
pub struct WebhookFactory;

impl ShipmentSinkFactory for WebhookFactory {
    fn create(
        &self,
        config: &linkwatch_core::config::ShippingConfig,
    ) -> Result<Box<dyn ShipmentSink>> {
        let (Some(endpoint), Some(access_key)) = (&config.endpoint, &config.access_key) else {
            return Err(Error::config(
                "shipping is disabled: endpoint and access key are both required",
            ));
        };
        Ok(Box::new(WebhookSink::new(endpoint, access_key)?))
    }
}
