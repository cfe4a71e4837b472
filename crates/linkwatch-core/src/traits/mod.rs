//! Core traits for the connection monitor
//!
//! This module defines the abstract interfaces that all implementations must follow.
//!
//! - [`ReachabilityProbe`]: one yes/no network reachability attempt
//! - [`IpLookup`]: fetch the current public IP address
//! - [`ThroughputProbe`]: run a download/upload/ping measurement
//! - [`ShipmentSink`]: deliver a batch of log lines to the upload endpoint

pub mod probes;
pub mod sink;

pub use probes::{
    IpLookup, IpLookupFactory, ReachabilityProbe, ReachabilityProbeFactory, ThroughputProbe,
    ThroughputProbeFactory, ThroughputSample,
};
pub use sink::{ShipmentBatch, ShipmentSink, ShipmentSinkFactory};
