//! Processing loop.
//!
//! Reads lines one at a time, feeds them to the assembler and queues every
//! emitted snapshot for a single background sink writer. The loop owns the
//! assembler exclusively and never waits on a sink.

use std::future::Future;
use tokio::io::AsyncRead;
use tokio::time::Instant;

use crate::runtime::assembler::{AssemblerStats, SnapshotAssembler};
use crate::sink::{SinkSet, SinkWriter};
use crate::transport::{LineEvent, LineSource, TransportError};

/// Why the loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Shutdown was requested
    Shutdown,
    /// The transport reached end of stream
    Closed,
}

/// Counters reported when the loop stops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollectorSummary {
    pub stop_reason: StopReason,
    pub stats: AssemblerStats,
    pub dropped_lines: u64,
}

/// Single-threaded line processing loop.
pub struct Collector<R> {
    source: LineSource<R>,
    assembler: SnapshotAssembler,
    sinks: SinkSet,
    writer: Option<SinkWriter>,
}

impl<R: AsyncRead + Unpin> Collector<R> {
    pub fn new(source: LineSource<R>, assembler: SnapshotAssembler, sinks: SinkSet) -> Self {
        Self {
            source,
            assembler,
            sinks,
            writer: None,
        }
    }

    /// Run until the source closes or `shutdown` resolves.
    ///
    /// # Errors
    /// Returns the transport error that ended the loop, if any
    pub async fn run_until<F>(&mut self, shutdown: F) -> Result<CollectorSummary, TransportError>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        tracing::info!(policy = %self.assembler.policy_kind(), "Processing loop started");

        let stop_reason = loop {
            let event = tokio::select! {
                _ = &mut shutdown => break StopReason::Shutdown,
                event = self.source.next_event() => event?,
            };

            if !self.step(event) {
                tracing::warn!("Transport closed, stopping processing loop");
                break StopReason::Closed;
            }
        };

        let summary = CollectorSummary {
            stop_reason,
            stats: self.assembler.stats(),
            dropped_lines: self.source.dropped(),
        };
        tracing::info!(
            lines = summary.stats.lines_seen,
            emitted = summary.stats.emitted,
            dropped = summary.dropped_lines,
            "Processing loop stopped"
        );
        Ok(summary)
    }

    /// Run until the source closes.
    pub async fn run(&mut self) -> Result<CollectorSummary, TransportError> {
        self.run_until(std::future::pending()).await
    }

    /// Handle one source event. Returns `false` once the source is closed.
    fn step(&mut self, event: LineEvent) -> bool {
        let now = Instant::now();
        let emitted = match event {
            LineEvent::Line(line) => self.assembler.process_line(&line, now),
            LineEvent::Timeout => self.assembler.tick(now),
            LineEvent::Closed => return false,
        };

        if let Some(snapshot) = emitted {
            let sinks = &self.sinks;
            self.writer
                .get_or_insert_with(|| SinkWriter::spawn(sinks.clone()))
                .send(snapshot);
        }
        true
    }

    /// Wait until every queued snapshot has been written.
    pub async fn flush(&mut self) {
        if let Some(writer) = self.writer.take() {
            writer.close().await;
        }
    }

    pub fn assembler(&self) -> &SnapshotAssembler {
        &self.assembler
    }
}
