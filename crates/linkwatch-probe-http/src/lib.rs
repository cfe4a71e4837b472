// # HTTP Public-IP Lookup
//
// This crate provides the IP lookup adapter for the linkwatch monitor.
//
// ## Architecture
//
// Fetches the caller's external IP from a plain-text service (e.g.
// api.ipify.org, icanhazip.com). One GET per call; the response body is
// trimmed and must parse as an IP address — anything else is a probe
// error, which the engine records to the error channel and retries next
// cycle.

use async_trait::async_trait;
use linkwatch_core::traits::{IpLookup, IpLookupFactory};
use linkwatch_core::{Error, Result};
use std::net::IpAddr;
use std::time::Duration;

/// Default lookup service
const DEFAULT_LOOKUP_URL: &str = "https://api.ipify.org";

/// Known plain-text IP services (for operators picking an alternative)
#[allow(dead_code)]
const KNOWN_IP_SERVICES: &[&str] = &[
    "https://api.ipify.org",  // returns plain text IP
    "https://ifconfig.me/ip", // no rate limit documented
    "https://icanhazip.com",  // no rate limit documented
];

/// HTTP request timeout
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// HTTP-backed public IP lookup
pub struct HttpIpLookup {
    /// URL to fetch the IP from
    url: String,

    /// HTTP client
    client: reqwest::Client,
}

impl HttpIpLookup {
    /// Create a lookup against the default service
    pub fn new() -> Self {
        Self::with_url(DEFAULT_LOOKUP_URL)
    }

    /// Create a lookup against a specific service URL
    pub fn with_url(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            client: reqwest::Client::builder()
                .timeout(DEFAULT_HTTP_TIMEOUT)
                .build()
                .unwrap_or_default(),
        }
    }
}

impl Default for HttpIpLookup {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl IpLookup for HttpIpLookup {
    async fn lookup(&self) -> Result<String> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| Error::probe(format!("IP lookup request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(Error::probe(format!(
                "IP lookup returned HTTP {}",
                response.status()
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| Error::probe(format!("failed to read IP lookup response: {}", e)))?;

        let text = body.trim();
        let ip: IpAddr = text
            .parse()
            .map_err(|_| Error::probe(format!("IP lookup returned a non-address: {:?}", text)))?;

        Ok(ip.to_string())
    }
}

/// Factory for creating HTTP IP lookups
///
/// Accepts `{"url": "..."}`, optional.
pub struct HttpLookupFactory;

impl IpLookupFactory for HttpLookupFactory {
    fn create(&self, config: &serde_json::Value) -> Result<Box<dyn IpLookup>> {
        let url = config
            .get("url")
            .and_then(|v| v.as_str())
            .unwrap_or(DEFAULT_LOOKUP_URL);
        if url.is_empty() {
            return Err(Error::config("IP lookup URL cannot be empty"));
        }
        Ok(Box::new(HttpIpLookup::with_url(url)))
    }
}
