//! Core monitor engine
//!
//! The MonitorEngine is responsible for:
//! - Driving the three periodic tasks (connectivity, throughput, shipping)
//! - Applying the retry policy before classifying the network as down
//! - Feeding observations through the debounced status tracker
//! - Writing records through the append-only log store
//! - Emitting events for external monitoring
//!
//! ## Control flow
//!
//! ```text
//! ┌───────────────┐   ┌───────────────┐   ┌───────────────┐
//! │ connectivity  │   │  throughput   │   │   shipping    │
//! │ timer (60 s)  │   │ timer (2 h)   │   │ timer (60 s)  │
//! └───────┬───────┘   └───────┬───────┘   └───────┬───────┘
//!         │                   │                   │
//!         ▼                   ▼                   ▼
//!   StatusTracker        LogStore            Shipper
//!   (debounce)           (append)            (watermark delta)
//! ```
//!
//! All three timers run on one task inside a single `select!` loop, so a
//! timer never overlaps itself and callbacks from different timers never
//! interleave mid-cycle — the same mutual-exclusion guarantee the original
//! deployment got from its single-threaded event loop. The tracker still
//! sits behind a mutex because the read-only query surface inspects it
//! from other tasks.
//!
//! ## Resilience
//!
//! Every cycle is guarded at the timer boundary: a failing cycle is
//! recorded to the error log and never stops the other timers or the next
//! firing of its own.

use chrono::Utc;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, mpsc};
use tokio::time::{MissedTickBehavior, interval, interval_at, timeout};
use tracing::{debug, error, info, warn};

use crate::classify::{AllowListStore, ServiceKind};
use crate::config::MonitorConfig;
use crate::error::{Error, Result};
use crate::logstore::LogStore;
use crate::shipping::{ShipOutcome, Shipper, WatermarkStore};
use crate::tracker::{Signal, StatusTracker};
use crate::traits::{IpLookup, ReachabilityProbe, ShipmentSink, ThroughputProbe};

/// Events emitted by the MonitorEngine
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// Engine started and wrote its startup record
    Started,

    /// A NETWORK UP/DOWN record was appended
    NetworkStatusLogged { up: bool },

    /// A PUBLIC IP record was appended
    PublicIpLogged { ip: String },

    /// Classification ran for this cycle (logged or debounced)
    ServiceClassified {
        ip: String,
        service: Option<ServiceKind>,
    },

    /// A throughput measurement was appended
    ThroughputRecorded {
        download_mbps: f64,
        upload_mbps: f64,
        ping_ms: f64,
    },

    /// The throughput tool failed or timed out
    ThroughputFailed { error: String },

    /// A shipping attempt delivered this many lines
    ShipmentCompleted { lines: usize },

    /// A shipping attempt failed; the watermark was not advanced
    ShipmentFailed { error: String },

    /// A whole cycle failed and was recorded to the error log
    CycleFailed { task: &'static str, error: String },

    /// Engine stopped
    Stopped { reason: String },
}

/// Core monitor engine
///
/// ## Lifecycle
///
/// 1. Create with [`MonitorEngine::new()`]
/// 2. Start with [`MonitorEngine::run()`]
/// 3. Engine runs until shutdown signal received
pub struct MonitorEngine {
    /// Reachability probe (one attempt per call; engine owns retries)
    reachability: Box<dyn ReachabilityProbe>,

    /// Public IP lookup
    ip_lookup: Box<dyn IpLookup>,

    /// Throughput test runner
    throughput: Box<dyn ThroughputProbe>,

    /// Shipping orchestration; `None` when shipping is disabled
    shipper: Option<Shipper>,

    /// Debounce state, shared with the query surface
    tracker: Arc<Mutex<StatusTracker>>,

    /// Service allow-list document
    allow_list: AllowListStore,

    /// Main event log
    log: LogStore,

    /// Error channel
    errors: LogStore,

    /// Scheduler settings
    config: MonitorConfig,

    /// Event sender for external monitoring
    event_tx: mpsc::Sender<EngineEvent>,
}

impl MonitorEngine {
    /// Create a new monitor engine
    ///
    /// # Parameters
    ///
    /// - `reachability`, `ip_lookup`, `throughput`: probe implementations
    /// - `sink`: shipping sink, or `None` to disable shipping entirely
    /// - `config`: monitor configuration
    ///
    /// # Returns
    ///
    /// A tuple of (engine, event_receiver) where event_receiver yields
    /// engine events
    pub fn new(
        reachability: Box<dyn ReachabilityProbe>,
        ip_lookup: Box<dyn IpLookup>,
        throughput: Box<dyn ThroughputProbe>,
        sink: Option<Box<dyn ShipmentSink>>,
        config: MonitorConfig,
    ) -> Result<(Self, mpsc::Receiver<EngineEvent>)> {
        config.validate()?;

        let (tx, rx) = mpsc::channel(config.engine.event_channel_capacity);

        let log = LogStore::new(&config.paths.log);
        let errors = LogStore::new(&config.paths.error_log);
        let allow_list = AllowListStore::new(&config.paths.allow_list);

        let shipper = sink.map(|sink| {
            Shipper::new(
                log.clone(),
                WatermarkStore::new(&config.paths.watermark),
                sink,
                config.shipping.tail_window,
                config.thresholds,
            )
        });

        let tracker = Arc::new(Mutex::new(StatusTracker::new(chrono::Duration::seconds(
            config.engine.unconditional_log_interval_secs as i64,
        ))));

        let engine = Self {
            reachability,
            ip_lookup,
            throughput,
            shipper,
            tracker,
            allow_list,
            log,
            errors,
            config,
            event_tx: tx,
        };

        Ok((engine, rx))
    }

    /// Handle to the shared debounce state (used by the query surface)
    pub fn tracker_handle(&self) -> Arc<Mutex<StatusTracker>> {
        Arc::clone(&self.tracker)
    }

    /// The main event log store
    pub fn log_store(&self) -> LogStore {
        self.log.clone()
    }

    /// The error log store
    pub fn error_store(&self) -> LogStore {
        self.errors.clone()
    }

    /// The allow-list store
    pub fn allow_list(&self) -> AllowListStore {
        self.allow_list.clone()
    }

    /// Run the engine until a shutdown signal is received
    pub async fn run(&self) -> Result<()> {
        self.run_internal(None).await
    }

    /// Test-only helper to run the engine with a controlled shutdown signal
    ///
    /// Production code should use `run()`, which manages shutdown via
    /// SIGINT/SIGTERM rather than programmatic channels.
    pub async fn run_with_shutdown(
        &self,
        shutdown_rx: Option<tokio::sync::oneshot::Receiver<()>>,
    ) -> Result<()> {
        self.run_internal(shutdown_rx).await
    }

    async fn run_internal(
        &self,
        shutdown_rx: Option<tokio::sync::oneshot::Receiver<()>>,
    ) -> Result<()> {
        self.log.append("SERVER RUNNING").await?;
        self.emit_event(EngineEvent::Started);
        info!("monitor engine started");

        // The first connectivity check fires immediately so the log opens
        // with the current state; throughput and shipping wait one full
        // period before their first run.
        let mut check = interval(Duration::from_secs(self.config.engine.check_interval_secs));
        check.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let speed_period = Duration::from_secs(self.config.engine.throughput_interval_secs);
        let mut speed = interval_at(tokio::time::Instant::now() + speed_period, speed_period);
        speed.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let ship_period = Duration::from_secs(self.config.engine.shipping_interval_secs);
        let mut ship = interval_at(tokio::time::Instant::now() + ship_period, ship_period);
        ship.set_missed_tick_behavior(MissedTickBehavior::Delay);

        if let Some(mut rx) = shutdown_rx {
            // Test mode: wait for provided shutdown signal
            loop {
                tokio::select! {
                    _ = check.tick() => {
                        self.guarded("connectivity", self.connectivity_cycle()).await;
                    }
                    _ = speed.tick() => {
                        self.guarded("throughput", self.throughput_cycle()).await;
                    }
                    _ = ship.tick(), if self.shipper.is_some() => {
                        self.guarded("shipping", self.shipping_cycle()).await;
                    }
                    _ = &mut rx => {
                        info!("shutdown signal received");
                        self.emit_event(EngineEvent::Stopped {
                            reason: "Shutdown signal".to_string(),
                        });
                        break;
                    }
                }
            }
        } else {
            // Production mode: wait for SIGINT/SIGTERM
            loop {
                tokio::select! {
                    _ = check.tick() => {
                        self.guarded("connectivity", self.connectivity_cycle()).await;
                    }
                    _ = speed.tick() => {
                        self.guarded("throughput", self.throughput_cycle()).await;
                    }
                    _ = ship.tick(), if self.shipper.is_some() => {
                        self.guarded("shipping", self.shipping_cycle()).await;
                    }
                    _ = tokio::signal::ctrl_c() => {
                        info!("shutdown signal received");
                        self.emit_event(EngineEvent::Stopped {
                            reason: "Shutdown signal".to_string(),
                        });
                        break;
                    }
                }
            }
        }

        Ok(())
    }

    /// Run one cycle, capturing any error at the timer boundary
    ///
    /// One task's failure never blocks the other timers' next firing.
    async fn guarded(
        &self,
        task: &'static str,
        cycle: impl Future<Output = Result<()>>,
    ) {
        if let Err(e) = cycle.await {
            error!("{} cycle failed: {}", task, e);
            self.emit_event(EngineEvent::CycleFailed {
                task,
                error: e.to_string(),
            });
            if let Err(log_err) = self
                .errors
                .append(&format!("{} cycle failed: {}", task, e))
                .await
            {
                error!("failed to record cycle error: {}", log_err);
            }
        }
    }

    /// Probe reachability with the configured retry budget
    ///
    /// Up on the first success; down only after every retry failed.
    async fn probe_reachability(&self) -> bool {
        let bound = Duration::from_secs(self.config.engine.probe_timeout_secs);
        for attempt in 1..=self.config.engine.reachability_retries {
            match timeout(bound, self.reachability.check()).await {
                Ok(true) => return true,
                Ok(false) => debug!(attempt, "reachability probe failed"),
                Err(_) => debug!(attempt, "reachability probe timed out"),
            }
        }
        false
    }

    /// One connectivity check: reachability, then IP lookup + classification
    async fn connectivity_cycle(&self) -> Result<()> {
        let up = self.probe_reachability().await;
        let value = if up { "UP" } else { "DOWN" };

        let now = Utc::now();
        {
            let mut tracker = self.tracker.lock().await;
            if tracker.observe(Signal::Network, value, now).should_emit() {
                self.log.append_at(&format!("NETWORK {}", value), now).await?;
                tracker.commit(Signal::Network, value, now);
                self.emit_event(EngineEvent::NetworkStatusLogged { up });
            }
        }

        if !up {
            // No point asking the outside world for our IP while offline
            return Ok(());
        }

        let bound = Duration::from_secs(self.config.engine.probe_timeout_secs);
        let ip = match timeout(bound, self.ip_lookup.lookup()).await {
            Ok(Ok(ip)) => ip,
            Ok(Err(e)) => {
                self.errors.append(&format!("IP lookup failed: {}", e)).await?;
                return Ok(());
            }
            Err(_) => {
                self.errors.append("IP lookup failed: timed out").await?;
                return Ok(());
            }
        };

        let classification = self.allow_list.classify(&ip).await?;
        let messages = classification.log_messages();
        let service_value = messages.join(" / ");

        let now = Utc::now();
        let mut tracker = self.tracker.lock().await;

        if tracker.observe(Signal::PublicIp, &ip, now).should_emit() {
            self.log.append_at(&format!("PUBLIC IP {}", ip), now).await?;
            tracker.commit(Signal::PublicIp, &ip, now);
            self.emit_event(EngineEvent::PublicIpLogged { ip: ip.clone() });
        }

        if tracker
            .observe(Signal::ConnectionService, &service_value, now)
            .should_emit()
        {
            // the whole trio in one write keeps the statuses mutually
            // consistent in the log
            self.log.append_all_at(&messages, now).await?;
            tracker.commit(Signal::ConnectionService, &service_value, now);
        }

        self.emit_event(EngineEvent::ServiceClassified {
            ip,
            service: classification.service,
        });

        Ok(())
    }

    /// One throughput measurement
    async fn throughput_cycle(&self) -> Result<()> {
        let bound = Duration::from_secs(self.config.engine.throughput_timeout_secs);
        let result = match timeout(bound, self.throughput.run()).await {
            Ok(result) => result,
            Err(_) => Err(Error::probe("speed test timed out")),
        };

        match result {
            Ok(sample) => {
                self.log.append(&sample.log_message()).await?;
                self.emit_event(EngineEvent::ThroughputRecorded {
                    download_mbps: sample.download_mbps,
                    upload_mbps: sample.upload_mbps,
                    ping_ms: sample.ping_ms,
                });
            }
            Err(e) => {
                self.log.append("Speed test failed").await?;
                self.errors.append(&format!("Speed test failed: {}", e)).await?;
                self.emit_event(EngineEvent::ThroughputFailed {
                    error: e.to_string(),
                });
            }
        }

        Ok(())
    }

    /// One shipping attempt
    async fn shipping_cycle(&self) -> Result<()> {
        let Some(shipper) = &self.shipper else {
            return Ok(());
        };

        match shipper.run_once().await {
            Ok(ShipOutcome::Shipped(lines)) => {
                self.emit_event(EngineEvent::ShipmentCompleted { lines });
            }
            Ok(ShipOutcome::NothingToShip) => {}
            Err(e) => {
                // watermark untouched; recorded to the error channel only,
                // never to the main log as a state change
                self.errors.append(&format!("Log shipping failed: {}", e)).await?;
                self.emit_event(EngineEvent::ShipmentFailed {
                    error: e.to_string(),
                });
            }
        }

        Ok(())
    }

    /// Emit an engine event
    fn emit_event(&self, event: EngineEvent) {
        // Send event, logging a warning if the channel is full: dropping
        // beats unbounded memory growth when nobody drains the receiver.
        if self.event_tx.try_send(event).is_err() {
            warn!("event channel full, dropping event");
        }
    }
}
