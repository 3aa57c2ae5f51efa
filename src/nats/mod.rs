/// NATS JetStream integration module
///
/// Provides the snapshot envelope and the JetStream client used by the NATS sink

pub mod message_envelope;
pub mod client;

pub use message_envelope::SnapshotEnvelope;
pub use client::{NatsClient, NatsConfig};
