// # linkwatch-core
//
// Core library for the multi-path connection monitor.
//
// ## Architecture Overview
//
// This library provides the decision logic of the monitor:
// - **Probe traits**: reachability, public IP, and throughput signals enter
//   through injectable adapters
// - **StatusTracker**: debounced change-or-staleness log emission
// - **AllowListStore**: IP-to-service classification with a persisted,
//   prioritized allow-list document
// - **LogStore**: durable append-only record log (events and errors)
// - **Shipper**: watermark-based incremental upload of new log lines
// - **MonitorEngine**: the scheduler that ties the timers together
//
// ## Design Principles
//
// 1. **Separation of Concerns**: probes and the upload sink are external
//    collaborators behind traits; the core never shells out or speaks HTTP
// 2. **Durability**: the log file is the record of truth; tracker state is
//    in-memory and rebuilt from fresh observations after a restart
// 3. **Idempotency**: the shipping watermark guarantees no line is double-
//    sent or lost across restarts
// 4. **Resilience**: every periodic task is independently guarded; one
//    failure never stops the others

pub mod classify;
pub mod config;
pub mod engine;
pub mod error;
pub mod logstore;
pub mod render;
pub mod shipping;
pub mod tracker;
pub mod traits;

// Re-export core types for convenience
pub use classify::{AllowListDoc, AllowListStore, Classification, ServiceKind, ServiceStatus};
pub use config::{EngineConfig, MonitorConfig, PathsConfig, SeverityThresholds, ShippingConfig};
pub use engine::{EngineEvent, MonitorEngine};
pub use error::{Error, Result};
pub use logstore::LogStore;
pub use shipping::{ShipOutcome, Shipper, WatermarkStore, compute_delta};
pub use tracker::{Decision, Signal, StatusTracker};
pub use traits::{
    IpLookup, ReachabilityProbe, ShipmentBatch, ShipmentSink, ThroughputProbe, ThroughputSample,
};
