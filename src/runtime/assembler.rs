//! Snapshot assembler.
//!
//! Wires the line classifier, field extractor, accumulator and completion
//! policy together. One assembler is owned by one processing loop; it is fed
//! lines strictly in order and hands back a snapshot whenever the policy
//! decides one is complete.

use crate::extraction::{extract_fields, LineFields};
use crate::runtime::accumulator::Accumulator;
use crate::runtime::completion::{build_policy, CompletionPolicy, PolicyKind};
use crate::runtime::line_classifier::classify;
use crate::snapshot::Snapshot;
use std::time::Duration;
use tokio::time::Instant;

/// Counters kept by the assembler, reported when the loop stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AssemblerStats {
    pub lines_seen: u64,
    pub lines_applied: u64,
    pub lines_unrecognized: u64,
    pub boundaries: u64,
    pub emitted: u64,
}

/// Stateful line-to-snapshot assembler.
pub struct SnapshotAssembler {
    accumulator: Accumulator,
    policy: Box<dyn CompletionPolicy>,
    stats: AssemblerStats,
}

impl SnapshotAssembler {
    /// Create an assembler driven by `policy`.
    pub fn new(policy: Box<dyn CompletionPolicy>) -> Self {
        Self {
            accumulator: Accumulator::new(),
            policy,
            stats: AssemblerStats::default(),
        }
    }

    /// Create an assembler for a configured policy kind.
    ///
    /// # Arguments
    /// * `kind` - Which completion policy to use
    /// * `interval` - Emission interval (only used by the fixed-interval policy)
    /// * `started` - Instant the interval is measured from
    pub fn with_policy(kind: PolicyKind, interval: Duration, started: Instant) -> Self {
        Self::new(build_policy(kind, interval, started))
    }

    /// Feed one line. Returns the snapshot emitted during this iteration, if any.
    ///
    /// The policy is polled before the line is applied, so a due interval
    /// emission captures the state accumulated up to the previous line.
    pub fn process_line(&mut self, line: &str, now: Instant) -> Option<Snapshot> {
        let line = line.trim();
        self.stats.lines_seen += 1;

        let mut emitted = self.policy.poll(&mut self.accumulator, now);

        let category = classify(line);
        match extract_fields(category, line) {
            None => {
                self.stats.lines_unrecognized += 1;
                tracing::trace!(line, "Dropping unrecognized line");
            }
            Some(LineFields::Boundary) => {
                self.stats.boundaries += 1;
                let on_boundary = self.policy.on_boundary(&mut self.accumulator, now);
                emitted = emitted.or(on_boundary);
            }
            Some(fields) => {
                if self.accumulator.apply(fields) {
                    self.stats.lines_applied += 1;
                }
                tracing::trace!(category = %category, line, "Applied line");
            }
        }

        self.record_emission(emitted)
    }

    /// Poll the policy without a line, e.g. after a read timeout.
    pub fn tick(&mut self, now: Instant) -> Option<Snapshot> {
        let emitted = self.policy.poll(&mut self.accumulator, now);
        self.record_emission(emitted)
    }

    fn record_emission(&mut self, emitted: Option<Snapshot>) -> Option<Snapshot> {
        if let Some(snapshot) = &emitted {
            self.stats.emitted += 1;
            tracing::debug!(
                policy = %self.policy.kind(),
                channels = snapshot.adc.len(),
                voltage = ?snapshot.battery.voltage,
                "Snapshot complete"
            );
        }
        emitted
    }

    /// Read-only view of the in-progress snapshot.
    pub fn live(&self) -> &Snapshot {
        self.accumulator.live()
    }

    pub fn policy_kind(&self) -> PolicyKind {
        self.policy.kind()
    }

    pub fn stats(&self) -> AssemblerStats {
        self.stats
    }
}
