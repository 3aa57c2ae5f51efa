//! # eps-collector: EPS Telemetry Snapshot Assembler
//!
//! Turns the line-oriented text telemetry printed by an EPS (electrical power
//! subsystem) board into structured snapshot records.
//!
//! ## Features
//!
//! - **Line classification**: battery, state of charge, ADC channels, solar charger status, cycle boundaries
//! - **Heuristic field extraction**: first-number scanning, channel indices, marker-based solar status
//! - **Two completion policies**: emit-and-reset on boundary lines, or emit a copy on a fixed interval
//! - **Sinks**: JSON lines file, NATS JetStream, in-memory recent readings
//! - **Control surface**: Axum endpoint writing single-symbol commands back to the board
//!
//! ## Example: input stream
//!
//! ```text
//! Battery Voltage: 4.01V
//! State of Charge: 76.2%
//! Channel #6: 30.5
//! Channel #9: NOT CONNECTED
//! Solar Supply Status: OK | Solar Power Path: ON | ... | Charging Status: Charge done | STAT1:ON STAT2:ON
//! ==============================
//! ```
//!
//! ## Example: assembling a snapshot
//!
//! ```
//! use std::time::Duration;
//! use eps_collector::runtime::{PolicyKind, SnapshotAssembler};
//!
//! let now = tokio::time::Instant::now();
//! let mut assembler =
//!     SnapshotAssembler::with_policy(PolicyKind::BoundaryReset, Duration::from_secs(1), now);
//!
//! assembler.process_line("Battery Voltage: 4.01V", now);
//! let snapshot = assembler.process_line("=====", now).unwrap();
//! assert_eq!(snapshot.battery.voltage, Some(4.01));
//! ```

// Core modules
pub mod snapshot;
pub mod extraction;
pub mod error;

// Line-to-snapshot runtime
pub mod runtime;

// External collaborators
pub mod transport;
pub mod sink;
pub mod control;
pub mod collector;

// NATS JetStream integration
pub mod nats;

// Re-export key types
pub use snapshot::{Battery, Snapshot, SolarCharger, SourceMode};
pub use extraction::{extract_fields, LineFields};
pub use error::CollectorError;

// Re-export runtime types
pub use runtime::{
    Accumulator, CollectorConfig, CompletionPolicy, LineCategory, PolicyKind, SnapshotAssembler,
};

pub use transport::{CommandWriter, LineEvent, LineSource, Transport, TransportError};
pub use sink::{JsonlSink, RecentReadings, Sink, SinkError, SinkSet, SinkWriter};
pub use control::{Command, CommandError, ControlState};
pub use collector::{Collector, CollectorSummary, StopReason};

// Re-export nats types
pub use nats::{NatsClient, NatsConfig, SnapshotEnvelope};
