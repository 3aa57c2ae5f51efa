//! Sinks for emitted snapshots.
//!
//! Every emission is handed to all configured sinks. Writes are
//! fire-and-forget from the processing loop's point of view: failures are
//! logged and never retried.

use crate::nats::NatsClient;
use crate::runtime::config_loader::SinkConfig;
use crate::snapshot::Snapshot;
use std::collections::VecDeque;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Error type for sink operations
#[derive(Debug)]
pub enum SinkError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Serialize(serde_json::Error),
    Nats(async_nats::Error),
}

impl fmt::Display for SinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SinkError::Io { path, source } => {
                write!(f, "I/O error on '{}': {}", path.display(), source)
            }
            SinkError::Serialize(e) => write!(f, "Failed to serialize snapshot: {}", e),
            SinkError::Nats(e) => write!(f, "NATS error: {}", e),
        }
    }
}

impl std::error::Error for SinkError {}

impl From<serde_json::Error> for SinkError {
    fn from(e: serde_json::Error) -> Self {
        SinkError::Serialize(e)
    }
}

/// Appends one JSON document per line.
#[derive(Clone)]
pub struct JsonlSink {
    path: PathBuf,
    file: Arc<tokio::sync::Mutex<tokio::fs::File>>,
}

impl JsonlSink {
    /// Open `path` for appending, creating it if missing.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, SinkError> {
        let path = path.as_ref().to_path_buf();
        let file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|source| SinkError::Io {
                path: path.clone(),
                source,
            })?;

        tracing::info!(path = %path.display(), "Appending snapshots as JSON lines");

        Ok(Self::from_file(path, file))
    }

    /// Wrap an already-open file.
    pub fn from_file(path: impl Into<PathBuf>, file: tokio::fs::File) -> Self {
        Self {
            path: path.into(),
            file: Arc::new(tokio::sync::Mutex::new(file)),
        }
    }

    pub async fn write(&self, snapshot: &Snapshot) -> Result<(), SinkError> {
        let mut line = serde_json::to_vec(snapshot)?;
        line.push(b'\n');

        let mut file = self.file.lock().await;
        let result = async {
            file.write_all(&line).await?;
            file.flush().await
        }
        .await;

        result.map_err(|source| SinkError::Io {
            path: self.path.clone(),
            source,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Bounded in-memory history of emissions, newest last.
#[derive(Clone)]
pub struct RecentReadings {
    inner: Arc<Mutex<VecDeque<Snapshot>>>,
    capacity: usize,
}

impl RecentReadings {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            inner: Arc::new(Mutex::new(VecDeque::with_capacity(capacity))),
            capacity,
        }
    }

    /// Record an emission, evicting the oldest when full.
    pub fn push(&self, snapshot: Snapshot) {
        let mut buffer = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        if buffer.len() == self.capacity {
            buffer.pop_front();
        }
        buffer.push_back(snapshot);
    }

    /// Up to `limit` most recent emissions, newest first.
    pub fn latest(&self, limit: usize) -> Vec<Snapshot> {
        let buffer = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        buffer.iter().rev().take(limit).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// One destination for emitted snapshots.
#[derive(Clone)]
pub enum Sink {
    Jsonl(JsonlSink),
    Nats(NatsClient),
    Recent(RecentReadings),
}

impl Sink {
    pub fn name(&self) -> &'static str {
        match self {
            Sink::Jsonl(_) => "jsonl",
            Sink::Nats(_) => "nats",
            Sink::Recent(_) => "recent",
        }
    }

    pub async fn write(&self, snapshot: &Snapshot) -> Result<(), SinkError> {
        match self {
            Sink::Jsonl(sink) => sink.write(snapshot).await,
            Sink::Nats(client) => client
                .publish_snapshot(snapshot)
                .await
                .map_err(SinkError::Nats),
            Sink::Recent(recent) => {
                recent.push(snapshot.clone());
                Ok(())
            }
        }
    }

    /// Network sinks report their connection state; local sinks are always ready.
    pub fn is_ready(&self) -> bool {
        match self {
            Sink::Nats(client) => client.is_connected(),
            Sink::Jsonl(_) | Sink::Recent(_) => true,
        }
    }
}

/// All sinks receiving emissions.
#[derive(Clone)]
pub struct SinkSet {
    sinks: Arc<Vec<Sink>>,
}

impl SinkSet {
    pub fn new(sinks: Vec<Sink>) -> Self {
        Self {
            sinks: Arc::new(sinks),
        }
    }

    /// Open every sink named in `config`, plus the shared recent buffer.
    ///
    /// # Errors
    /// Fails if the JSON-lines file cannot be opened or NATS is unreachable
    pub async fn from_config(
        config: &SinkConfig,
        recent: RecentReadings,
    ) -> Result<Self, SinkError> {
        let mut sinks = vec![Sink::Recent(recent)];

        if let Some(path) = &config.jsonl_path {
            sinks.push(Sink::Jsonl(JsonlSink::open(path).await?));
        }

        if let Some(nats) = &config.nats {
            let client = NatsClient::connect(nats).await.map_err(SinkError::Nats)?;
            sinks.push(Sink::Nats(client));
        }

        Ok(Self::new(sinks))
    }

    /// Write to every sink in order. Failures are logged; returns how many failed.
    pub async fn write_all(&self, snapshot: &Snapshot) -> usize {
        let mut failed = 0;
        for sink in self.sinks.iter() {
            if let Err(e) = sink.write(snapshot).await {
                failed += 1;
                tracing::error!(sink = sink.name(), "Failed to store snapshot: {}", e);
            }
        }
        failed
    }

    pub fn is_ready(&self) -> bool {
        self.sinks.iter().all(Sink::is_ready)
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.sinks.iter().map(Sink::name).collect()
    }
}

/// Single background task writing queued snapshots to a [`SinkSet`].
///
/// Queuing never waits on a sink. Snapshots are written one at a time in
/// the order they were sent, so the JSON-lines file and the recent buffer
/// stay chronological.
pub struct SinkWriter {
    tx: mpsc::UnboundedSender<Snapshot>,
    worker: JoinHandle<()>,
}

impl SinkWriter {
    /// Start the writer task. Must be called inside a tokio runtime.
    pub fn spawn(sinks: SinkSet) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<Snapshot>();
        let worker = tokio::spawn(async move {
            while let Some(snapshot) = rx.recv().await {
                sinks.write_all(&snapshot).await;
            }
        });
        Self { tx, worker }
    }

    /// Queue a snapshot for writing.
    pub fn send(&self, snapshot: Snapshot) {
        if self.tx.send(snapshot).is_err() {
            tracing::error!("Sink writer stopped, dropping snapshot");
        }
    }

    /// Stop accepting snapshots and wait until every queued one is written.
    pub async fn close(self) {
        let SinkWriter { tx, worker } = self;
        drop(tx);
        if let Err(e) = worker.await {
            tracing::error!("Sink writer task failed: {}", e);
        }
    }
}
