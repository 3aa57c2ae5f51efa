/// NATS JetStream client for snapshot publishing
///
/// Provides connection management and snapshot publishing to NATS JetStream

use async_nats::jetstream;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use crate::nats::message_envelope::SnapshotEnvelope;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NatsConfig {
    pub url: String,
    pub stream_name: String,
    /// Subjects are `<subject_prefix>.<source>`
    pub subject_prefix: String,
    pub source: String,
    pub max_age_secs: u64,
    pub max_bytes: i64,
}

impl Default for NatsConfig {
    fn default() -> Self {
        Self {
            url: "nats://localhost:4222".to_string(),
            stream_name: "EPS".to_string(),
            subject_prefix: "eps.readings".to_string(),
            source: "eps-board".to_string(),
            max_age_secs: 24 * 60 * 60, // 24 hours
            max_bytes: 1024 * 1024 * 1024, // 1GB
        }
    }
}

impl NatsConfig {
    /// Subject snapshots from this collector are published on
    pub fn subject(&self) -> String {
        format!("{}.{}", self.subject_prefix, self.source)
    }
}

#[derive(Clone)]
pub struct NatsClient {
    client: async_nats::Client,
    jetstream: jetstream::Context,
    subject: String,
    source: String,
}

impl NatsClient {
    /// Connect to NATS and initialize JetStream
    pub async fn connect(config: &NatsConfig) -> Result<Self, async_nats::Error> {
        // Connect to NATS
        let client = async_nats::connect(&config.url).await?;
        tracing::info!("Connected to NATS at {}", config.url);

        // Get JetStream context
        let jetstream = jetstream::new(client.clone());

        // Create or get stream
        let _stream = jetstream
            .get_or_create_stream(jetstream::stream::Config {
                name: config.stream_name.clone(),
                subjects: vec![format!("{}.>", config.subject_prefix)],
                max_age: Duration::from_secs(config.max_age_secs),
                max_bytes: config.max_bytes,
                storage: jetstream::stream::StorageType::File,
                num_replicas: 1,
                ..Default::default()
            })
            .await?;

        tracing::info!("JetStream stream '{}' ready", config.stream_name);

        Ok(Self {
            client,
            jetstream,
            subject: config.subject(),
            source: config.source.clone(),
        })
    }

    /// Publish a snapshot to JetStream
    pub async fn publish_snapshot(
        &self,
        snapshot: &crate::snapshot::Snapshot,
    ) -> Result<(), async_nats::Error> {
        let envelope = SnapshotEnvelope::new(self.source.clone(), snapshot.clone());
        let payload = serde_json::to_vec(&envelope)?;

        // Publish with JetStream (durable, acknowledged)
        let ack = self.jetstream
            .publish(self.subject.clone(), payload.into())
            .await?;

        // Wait for acknowledgment
        ack.await?;

        tracing::debug!(
            "Published snapshot {} to JetStream subject {}",
            envelope.message_id,
            self.subject
        );

        Ok(())
    }

    /// Check if the NATS connection is active
    pub fn is_connected(&self) -> bool {
        self.client.connection_state() == async_nats::connection::State::Connected
    }
}
