/// Snapshot envelope for NATS JetStream
///
/// Wraps an emitted snapshot with metadata for tracking downstream

use crate::snapshot::Snapshot;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotEnvelope {
    /// Unique message ID for tracking and deduplication
    pub message_id: Uuid,

    /// Board identifier, also the last subject token
    pub source: String,

    /// Timestamp when the envelope was published
    pub published_at: DateTime<Utc>,

    /// The emitted snapshot
    pub snapshot: Snapshot,
}

impl SnapshotEnvelope {
    /// Create a new envelope
    pub fn new(source: impl Into<String>, snapshot: Snapshot) -> Self {
        Self {
            message_id: Uuid::new_v4(),
            source: source.into(),
            published_at: Utc::now(),
            snapshot,
        }
    }
}
