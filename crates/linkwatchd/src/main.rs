// # linkwatchd - Connection Monitor Daemon
//
// The linkwatchd daemon is a THIN integration layer:
// 1. Reading configuration from environment variables
// 2. Initializing the runtime and tracing
// 3. Constructing probes, the sink, and the engine
// 4. Serving the read-only query surface
//
// All monitoring logic lives in linkwatch-core. Configuration is via
// environment variables only.
//
// ## Configuration
//
// ### Files
// - `LINKWATCH_LOG_PATH`: event log (default network_monitor_log.txt)
// - `LINKWATCH_ERROR_LOG_PATH`: error log (default network_monitor_error.txt)
// - `LINKWATCH_IP_FILE_PATH`: allow-list document
//   (default network_monitor_IP_addresses.json)
// - `LINKWATCH_WATERMARK_PATH`: last-shipped-line marker
//   (default network_monitor_last_log_uploaded.txt)
//
// ### Probes
// - `LINKWATCH_PING_TARGET`: reachability target (default google.com)
// - `LINKWATCH_PING_PROGRAM`: ping executable (default ping)
// - `LINKWATCH_SPEEDTEST_PROGRAM`: speed test executable (default speedtest-cli)
// - `LINKWATCH_IP_LOOKUP_URL`: plain-text IP service (default https://api.ipify.org)
//
// ### Scheduler
// - `LINKWATCH_CHECK_INTERVAL_SECS`: connectivity period (default 60)
// - `LINKWATCH_THROUGHPUT_INTERVAL_SECS`: throughput period (default 7200)
// - `LINKWATCH_SHIPPING_INTERVAL_SECS`: shipping period (default 60)
// - `LINKWATCH_RETRIES`: reachability retries per cycle (default 3)
//
// ### Shipping (disabled unless both are set)
// - `LINKWATCH_UPLOAD_ENDPOINT`: webhook URL
// - `LINKWATCH_UPLOAD_ACCESS_KEY`: shared secret for the access-key header
//
// ### Surface
// - `PORT`: query surface port (default 8080)
// - `LINKWATCH_LOG_LEVEL`: tracing level (default info)
//
// ## Example
//
// ```bash
// export LINKWATCH_PING_TARGET=google.com
// export LINKWATCH_UPLOAD_ENDPOINT=https://hooks.example.com/network
// export LINKWATCH_UPLOAD_ACCESS_KEY=your_key
// export PORT=8080
//
// linkwatchd
// ```

use anyhow::Result;
use std::env;
use std::process::ExitCode;
use tracing::{Level, error, info};
use tracing_subscriber::FmtSubscriber;

use linkwatch_core::config::MonitorConfig;
use linkwatch_core::engine::MonitorEngine;
use linkwatch_core::traits::{
    IpLookupFactory, ReachabilityProbeFactory, ShipmentSinkFactory, ThroughputProbeFactory,
};
use linkwatch_http::QueryState;

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error (unexpected)
#[derive(Debug, Clone, Copy)]
enum MonitorExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error (unexpected failure)
    RuntimeError = 2,
}

impl From<MonitorExitCode> for ExitCode {
    fn from(code: MonitorExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Application configuration
struct Config {
    monitor: MonitorConfig,
    ping_target: String,
    ping_program: String,
    speedtest_program: String,
    ip_lookup_url: String,
    http_port: u16,
    log_level: String,
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Result<Self> {
        let mut monitor = MonitorConfig::default();

        if let Ok(path) = env::var("LINKWATCH_LOG_PATH") {
            monitor.paths.log = path.into();
        }
        if let Ok(path) = env::var("LINKWATCH_ERROR_LOG_PATH") {
            monitor.paths.error_log = path.into();
        }
        if let Ok(path) = env::var("LINKWATCH_IP_FILE_PATH") {
            monitor.paths.allow_list = path.into();
        }
        if let Ok(path) = env::var("LINKWATCH_WATERMARK_PATH") {
            monitor.paths.watermark = path.into();
        }

        if let Some(secs) = parse_env("LINKWATCH_CHECK_INTERVAL_SECS")? {
            monitor.engine.check_interval_secs = secs;
        }
        if let Some(secs) = parse_env("LINKWATCH_THROUGHPUT_INTERVAL_SECS")? {
            monitor.engine.throughput_interval_secs = secs;
        }
        if let Some(secs) = parse_env("LINKWATCH_SHIPPING_INTERVAL_SECS")? {
            monitor.engine.shipping_interval_secs = secs;
        }
        if let Some(retries) = parse_env("LINKWATCH_RETRIES")? {
            monitor.engine.reachability_retries = retries;
        }

        monitor.shipping.endpoint = env::var("LINKWATCH_UPLOAD_ENDPOINT").ok();
        monitor.shipping.access_key = env::var("LINKWATCH_UPLOAD_ACCESS_KEY").ok();

        Ok(Self {
            monitor,
            ping_target: env::var("LINKWATCH_PING_TARGET")
                .unwrap_or_else(|_| "google.com".to_string()),
            ping_program: env::var("LINKWATCH_PING_PROGRAM").unwrap_or_else(|_| "ping".to_string()),
            speedtest_program: env::var("LINKWATCH_SPEEDTEST_PROGRAM")
                .unwrap_or_else(|_| "speedtest-cli".to_string()),
            ip_lookup_url: env::var("LINKWATCH_IP_LOOKUP_URL")
                .unwrap_or_else(|_| "https://api.ipify.org".to_string()),
            http_port: parse_env("PORT")?.unwrap_or(8080),
            log_level: env::var("LINKWATCH_LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
        })
    }

    /// Validate the configuration
    fn validate(&self) -> Result<()> {
        self.monitor
            .validate()
            .map_err(|e| anyhow::anyhow!("{}", e))?;

        if self.ping_target.is_empty() {
            anyhow::bail!("LINKWATCH_PING_TARGET cannot be empty");
        }

        if !self.ip_lookup_url.starts_with("http://")
            && !self.ip_lookup_url.starts_with("https://")
        {
            anyhow::bail!(
                "LINKWATCH_IP_LOOKUP_URL must use HTTP or HTTPS. Got: {}",
                self.ip_lookup_url
            );
        }

        let retries = self.monitor.engine.reachability_retries;
        if !(1..=10).contains(&retries) {
            anyhow::bail!("LINKWATCH_RETRIES must be between 1 and 10. Got: {}", retries);
        }

        if self.monitor.shipping.endpoint.is_some() != self.monitor.shipping.access_key.is_some() {
            eprintln!(
                "WARNING: only one of LINKWATCH_UPLOAD_ENDPOINT and \
                LINKWATCH_UPLOAD_ACCESS_KEY is set. Shipping stays disabled \
                until both are."
            );
        }

        match self.log_level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!(
                "LINKWATCH_LOG_LEVEL '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                self.log_level
            ),
        }

        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(name: &str) -> Result<Option<T>>
where
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw
            .parse()
            .map(Some)
            .map_err(|e| anyhow::anyhow!("{} is not a valid value for {}: {}", raw, name, e)),
        Err(_) => Ok(None),
    }
}

fn main() -> ExitCode {
    // Load configuration from environment
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return MonitorExitCode::ConfigError.into();
        }
    };

    // Validate configuration
    if let Err(e) = config.validate() {
        eprintln!("Configuration validation error: {}", e);
        return MonitorExitCode::ConfigError.into();
    }

    // Initialize tracing
    let log_level = match config.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return MonitorExitCode::ConfigError.into();
    }

    info!("Starting linkwatchd daemon");

    // Enter tokio runtime
    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return MonitorExitCode::RuntimeError.into();
        }
    };

    let result = rt.block_on(async {
        if let Err(e) = run_daemon(config).await {
            error!("Daemon error: {}", e);
            MonitorExitCode::RuntimeError
        } else {
            MonitorExitCode::CleanShutdown
        }
    });

    result.into()
}

/// Run the daemon
async fn run_daemon(config: Config) -> Result<()> {
    // Construct the probes
    let reachability = linkwatch_probe_cmd::PingFactory.create(&serde_json::json!({
        "target": config.ping_target,
        "program": config.ping_program,
    }))?;
    let throughput = linkwatch_probe_cmd::SpeedtestFactory.create(&serde_json::json!({
        "program": config.speedtest_program,
    }))?;
    let ip_lookup = linkwatch_probe_http::HttpLookupFactory.create(&serde_json::json!({
        "url": config.ip_lookup_url,
    }))?;

    // Construct the sink only when shipping is fully configured
    let sink = if config.monitor.shipping.enabled() {
        info!("Log shipping enabled");
        Some(linkwatch_webhook::WebhookFactory.create(&config.monitor.shipping)?)
    } else {
        info!("Log shipping disabled (endpoint or access key not set)");
        None
    };

    info!("Ping target: {}", config.ping_target);
    info!("IP lookup service: {}", config.ip_lookup_url);
    info!("Event log: {}", config.monitor.paths.log.display());

    let http_port = config.http_port;
    let thresholds = config.monitor.thresholds;

    let (engine, _event_rx) =
        MonitorEngine::new(reachability, ip_lookup, throughput, sink, config.monitor)?;

    // Serve the read-only query surface alongside the engine
    let state = QueryState {
        log: engine.log_store(),
        errors: engine.error_store(),
        allow_list: engine.allow_list(),
        tracker: engine.tracker_handle(),
        thresholds,
    };
    let router = linkwatch_http::router(state);

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", http_port)).await?;
    info!("Query surface listening on port {}", http_port);
    let server = tokio::spawn(async move {
        if let Err(e) = linkwatch_http::serve(listener, router).await {
            error!("Query surface error: {}", e);
        }
    });

    // The engine owns the SIGINT/SIGTERM shutdown path
    info!("Starting monitor engine");
    engine.run().await?;

    server.abort();
    info!("Shutting down daemon");
    Ok(())
}
