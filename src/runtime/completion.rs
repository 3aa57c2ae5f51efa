//! Completion policies: when does the accumulated snapshot become a record?
//!
//! Two mutually exclusive strategies are supported and selected when the
//! assembler is constructed:
//!
//! - [`BoundaryReset`]: emit the live snapshot on every boundary line, then
//!   start over from a blank one.
//! - [`FixedInterval`]: emit a copy of the live snapshot every `interval`,
//!   regardless of line content. The live snapshot keeps accumulating; a
//!   boundary line only resets it.

use crate::runtime::accumulator::Accumulator;
use crate::snapshot::Snapshot;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tokio::time::Instant;

/// Strategy deciding when the live snapshot is emitted.
pub trait CompletionPolicy: Send {
    /// Called for every boundary marker line.
    fn on_boundary(&mut self, acc: &mut Accumulator, now: Instant) -> Option<Snapshot>;

    /// Called on every processing iteration, including unrecognized lines
    /// and read timeouts.
    fn poll(&mut self, acc: &mut Accumulator, now: Instant) -> Option<Snapshot>;

    /// Which policy this is.
    fn kind(&self) -> PolicyKind;
}

/// Configurable policy selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum PolicyKind {
    BoundaryReset,
    FixedInterval,
}

impl PolicyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PolicyKind::BoundaryReset => "boundary_reset",
            PolicyKind::FixedInterval => "fixed_interval",
        }
    }
}

impl fmt::Display for PolicyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for PolicyKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "boundary_reset" => Ok(PolicyKind::BoundaryReset),
            "fixed_interval" => Ok(PolicyKind::FixedInterval),
            other => Err(format!(
                "unknown completion policy '{}' (expected boundary_reset or fixed_interval)",
                other
            )),
        }
    }
}

/// Build the policy for `kind`. `started` seeds the last-emission instant.
pub fn build_policy(
    kind: PolicyKind,
    interval: Duration,
    started: Instant,
) -> Box<dyn CompletionPolicy> {
    match kind {
        PolicyKind::BoundaryReset => Box::new(BoundaryReset),
        PolicyKind::FixedInterval => Box::new(FixedInterval::new(interval, started)),
    }
}

/// Emit on boundary, then reset.
#[derive(Debug, Default, Clone, Copy)]
pub struct BoundaryReset;

impl CompletionPolicy for BoundaryReset {
    fn on_boundary(&mut self, acc: &mut Accumulator, _now: Instant) -> Option<Snapshot> {
        Some(acc.take().stamped(Utc::now()))
    }

    fn poll(&mut self, _acc: &mut Accumulator, _now: Instant) -> Option<Snapshot> {
        None
    }

    fn kind(&self) -> PolicyKind {
        PolicyKind::BoundaryReset
    }
}

/// Emit a copy every `interval`; boundaries only reset.
#[derive(Debug, Clone)]
pub struct FixedInterval {
    interval: Duration,
    last_emission: Instant,
}

impl FixedInterval {
    pub fn new(interval: Duration, started: Instant) -> Self {
        Self {
            interval,
            last_emission: started,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn last_emission(&self) -> Instant {
        self.last_emission
    }
}

impl CompletionPolicy for FixedInterval {
    fn on_boundary(&mut self, acc: &mut Accumulator, _now: Instant) -> Option<Snapshot> {
        acc.reset();
        None
    }

    fn poll(&mut self, acc: &mut Accumulator, now: Instant) -> Option<Snapshot> {
        if now.saturating_duration_since(self.last_emission) < self.interval {
            return None;
        }
        self.last_emission = now;
        Some(acc.snapshot_copy().stamped(Utc::now()))
    }

    fn kind(&self) -> PolicyKind {
        PolicyKind::FixedInterval
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extraction::LineFields;

    fn filled() -> Accumulator {
        let mut acc = Accumulator::new();
        acc.apply(LineFields::BatteryVoltage(Some(4.0)));
        acc.apply(LineFields::ChannelReading { index: Some(6), value: Some(30.0) });
        acc
    }

    #[test]
    fn test_boundary_reset_emits_and_resets() {
        let mut acc = filled();
        let mut policy = BoundaryReset;
        let now = Instant::now();

        let emitted = policy.on_boundary(&mut acc, now).unwrap();

        assert_eq!(emitted.battery.voltage, Some(4.0));
        assert!(emitted.timestamp.is_some());
        assert!(acc.live().is_blank());
    }

    #[test]
    fn test_boundary_reset_never_emits_on_poll() {
        let mut acc = filled();
        let mut policy = BoundaryReset;
        let now = Instant::now();

        assert!(policy.poll(&mut acc, now + Duration::from_secs(3600)).is_none());
        assert!(!acc.live().is_blank());
    }

    #[test]
    fn test_boundary_reset_repeated_markers_emit_blank() {
        let mut acc = filled();
        let mut policy = BoundaryReset;
        let now = Instant::now();

        policy.on_boundary(&mut acc, now);
        let second = policy.on_boundary(&mut acc, now).unwrap();

        assert!(second.is_blank());
    }

    #[test]
    fn test_fixed_interval_waits_for_interval() {
        let start = Instant::now();
        let mut acc = filled();
        let mut policy = FixedInterval::new(Duration::from_secs(1), start);

        assert!(policy.poll(&mut acc, start).is_none());
        assert!(policy.poll(&mut acc, start + Duration::from_millis(999)).is_none());

        let emitted = policy.poll(&mut acc, start + Duration::from_secs(1)).unwrap();
        assert_eq!(emitted.adc.get(&6), Some(&30.0));
        assert_eq!(policy.last_emission(), start + Duration::from_secs(1));

        // Live snapshot is not reset
        assert_eq!(acc.live().battery.voltage, Some(4.0));
    }

    #[test]
    fn test_fixed_interval_copy_is_independent() {
        let start = Instant::now();
        let mut acc = filled();
        let mut policy = FixedInterval::new(Duration::from_secs(1), start);

        let emitted = policy.poll(&mut acc, start + Duration::from_secs(1)).unwrap();
        acc.apply(LineFields::ChannelReading { index: Some(6), value: Some(99.0) });
        acc.apply(LineFields::BatteryVoltage(Some(3.5)));

        assert_eq!(emitted.adc.get(&6), Some(&30.0));
        assert_eq!(emitted.battery.voltage, Some(4.0));
    }

    #[test]
    fn test_fixed_interval_boundary_only_resets() {
        let start = Instant::now();
        let mut acc = filled();
        let mut policy = FixedInterval::new(Duration::from_secs(1), start);

        assert!(policy.on_boundary(&mut acc, start + Duration::from_secs(5)).is_none());
        assert!(acc.live().is_blank());
        assert_eq!(policy.last_emission(), start);
    }

    #[test]
    fn test_policy_kind_from_str() {
        assert_eq!("boundary_reset".parse::<PolicyKind>(), Ok(PolicyKind::BoundaryReset));
        assert_eq!("Fixed-Interval".parse::<PolicyKind>(), Ok(PolicyKind::FixedInterval));
        assert!("hourly".parse::<PolicyKind>().is_err());
    }

    #[test]
    fn test_build_policy_kind() {
        let now = Instant::now();
        let policy = build_policy(PolicyKind::FixedInterval, Duration::from_secs(1), now);
        assert_eq!(policy.kind(), PolicyKind::FixedInterval);
    }
}
