//! Snapshot accumulator.
//!
//! Owns the live, in-progress snapshot. Extracted line fields are applied as
//! last-write-wins mutations; the completion policy decides when the live
//! snapshot is copied out or reset.

use crate::extraction::LineFields;
use crate::snapshot::Snapshot;

/// Holder of the live snapshot for one processing loop.
#[derive(Debug, Default)]
pub struct Accumulator {
    live: Snapshot,
}

impl Accumulator {
    /// Create an accumulator with a blank live snapshot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one line's fields to the live snapshot.
    ///
    /// Absent values leave the snapshot untouched. Returns `true` when a
    /// field was written or removed.
    pub fn apply(&mut self, fields: LineFields) -> bool {
        match fields {
            LineFields::BatteryVoltage(Some(voltage)) => {
                self.live.battery.voltage = Some(voltage);
                true
            }
            LineFields::StateOfCharge(Some(soc)) => {
                self.live.battery.state_of_charge = Some(soc);
                true
            }
            LineFields::ChannelReading {
                index: Some(index),
                value: Some(value),
            } => {
                self.live.adc.insert(index, value);
                true
            }
            LineFields::ChannelDisconnected { index: Some(index) } => {
                self.live.adc.remove(&index).is_some()
            }
            LineFields::SolarStatus(status) => {
                self.live.solar_charger = Some(status);
                true
            }
            // Boundaries are handled by the completion policy
            LineFields::Boundary => false,
            _ => false,
        }
    }

    /// Replace the live snapshot with a blank one.
    pub fn reset(&mut self) {
        self.live = Snapshot::new();
    }

    /// Deep, independent copy of the live snapshot.
    pub fn snapshot_copy(&self) -> Snapshot {
        self.live.clone()
    }

    /// Take the live snapshot out, leaving a blank one in its place.
    pub fn take(&mut self) -> Snapshot {
        std::mem::take(&mut self.live)
    }

    /// Read-only view of the live snapshot.
    pub fn live(&self) -> &Snapshot {
        &self.live
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::{SolarCharger, SourceMode};

    #[test]
    fn test_new_accumulator_is_blank() {
        let acc = Accumulator::new();
        assert!(acc.live().is_blank());
    }

    #[test]
    fn test_apply_battery_last_write_wins() {
        let mut acc = Accumulator::new();

        assert!(acc.apply(LineFields::BatteryVoltage(Some(3.9))));
        assert!(acc.apply(LineFields::BatteryVoltage(Some(4.1))));
        assert!(acc.apply(LineFields::StateOfCharge(Some(80.0))));

        assert_eq!(acc.live().battery.voltage, Some(4.1));
        assert_eq!(acc.live().battery.state_of_charge, Some(80.0));
    }

    #[test]
    fn test_apply_absent_value_keeps_previous() {
        let mut acc = Accumulator::new();
        acc.apply(LineFields::BatteryVoltage(Some(3.9)));

        assert!(!acc.apply(LineFields::BatteryVoltage(None)));
        assert!(!acc.apply(LineFields::ChannelReading { index: Some(2), value: None }));
        assert!(!acc.apply(LineFields::ChannelReading { index: None, value: Some(1.0) }));

        assert_eq!(acc.live().battery.voltage, Some(3.9));
        assert!(acc.live().adc.is_empty());
    }

    #[test]
    fn test_channel_reading_then_disconnect() {
        let mut acc = Accumulator::new();

        acc.apply(LineFields::ChannelReading { index: Some(6), value: Some(27.31) });
        assert_eq!(acc.live().adc.get(&6), Some(&27.31));

        acc.apply(LineFields::ChannelReading { index: Some(6), value: Some(28.0) });
        assert_eq!(acc.live().adc.get(&6), Some(&28.0));

        assert!(acc.apply(LineFields::ChannelDisconnected { index: Some(6) }));
        assert!(!acc.live().adc.contains_key(&6));
    }

    #[test]
    fn test_disconnect_unknown_channel_is_noop() {
        let mut acc = Accumulator::new();
        acc.apply(LineFields::ChannelReading { index: Some(1), value: Some(1.0) });

        assert!(!acc.apply(LineFields::ChannelDisconnected { index: Some(9) }));
        assert_eq!(acc.live().adc.len(), 1);
    }

    #[test]
    fn test_out_of_range_channel_is_recorded() {
        let mut acc = Accumulator::new();
        acc.apply(LineFields::ChannelReading { index: Some(42), value: Some(0.5) });

        assert_eq!(acc.live().adc.get(&42), Some(&0.5));
    }

    #[test]
    fn test_solar_status_replaces_whole_record() {
        let mut acc = Accumulator::new();
        acc.apply(LineFields::SolarStatus(SolarCharger {
            supply_ok: true,
            stat1: true,
            source_mode: Some(SourceMode::Usb),
            charging_status: Some("Solar-powered charging".to_string()),
            ..Default::default()
        }));
        acc.apply(LineFields::SolarStatus(SolarCharger {
            stat2: true,
            ..Default::default()
        }));

        let solar = acc.live().solar_charger.clone().unwrap();
        assert!(!solar.supply_ok);
        assert!(!solar.stat1);
        assert!(solar.stat2);
        assert_eq!(solar.source_mode, None);
        assert_eq!(solar.charging_status, None);
    }

    #[test]
    fn test_boundary_does_not_mutate() {
        let mut acc = Accumulator::new();
        acc.apply(LineFields::BatteryVoltage(Some(3.9)));

        assert!(!acc.apply(LineFields::Boundary));
        assert_eq!(acc.live().battery.voltage, Some(3.9));
    }

    #[test]
    fn test_reset_blanks_snapshot() {
        let mut acc = Accumulator::new();
        acc.apply(LineFields::BatteryVoltage(Some(3.9)));
        acc.apply(LineFields::ChannelReading { index: Some(0), value: Some(21.0) });

        acc.reset();

        assert!(acc.live().is_blank());
    }

    #[test]
    fn test_snapshot_copy_is_independent() {
        let mut acc = Accumulator::new();
        acc.apply(LineFields::ChannelReading { index: Some(3), value: Some(0.2) });

        let copy = acc.snapshot_copy();
        acc.apply(LineFields::ChannelReading { index: Some(3), value: Some(0.9) });
        acc.apply(LineFields::ChannelDisconnected { index: Some(3) });

        assert_eq!(copy.adc.get(&3), Some(&0.2));
        assert!(acc.live().adc.is_empty());
    }

    #[test]
    fn test_take_leaves_blank() {
        let mut acc = Accumulator::new();
        acc.apply(LineFields::StateOfCharge(Some(50.0)));

        let taken = acc.take();

        assert_eq!(taken.battery.state_of_charge, Some(50.0));
        assert!(acc.live().is_blank());
    }
}
