//! Line classification for the EPS telemetry stream.
//!
//! The board prints one field per line (the solar charger status being the
//! exception, packing nine fields onto one line). Lines are classified by
//! case-sensitive prefix/substring tests evaluated in a fixed priority order.

use std::fmt;

const BATTERY_VOLTAGE_PREFIX: &str = "Battery Voltage";
const STATE_OF_CHARGE_PREFIX: &str = "State of Charge";
const CHANNEL_PREFIX: &str = "Channel #";
const NOT_CONNECTED_MARKER: &str = "NOT CONNECTED";
const SOLAR_STATUS_MARKER: &str = "Solar Supply Status";

/// Shortest run of `=` accepted as a reporting-cycle boundary.
pub const MIN_BOUNDARY_LEN: usize = 2;

/// Category of a telemetry line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LineCategory {
    BatteryVoltage,
    StateOfCharge,
    ChannelReading,
    ChannelDisconnected,
    SolarStatus,
    BoundaryMarker,
    Unrecognized,
}

impl LineCategory {
    /// Stable name used in log output.
    pub fn as_str(&self) -> &'static str {
        match self {
            LineCategory::BatteryVoltage => "battery_voltage",
            LineCategory::StateOfCharge => "state_of_charge",
            LineCategory::ChannelReading => "channel_reading",
            LineCategory::ChannelDisconnected => "channel_disconnected",
            LineCategory::SolarStatus => "solar_status",
            LineCategory::BoundaryMarker => "boundary_marker",
            LineCategory::Unrecognized => "unrecognized",
        }
    }
}

impl fmt::Display for LineCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Classify one trimmed line. First match wins.
pub fn classify(line: &str) -> LineCategory {
    if is_boundary_marker(line) {
        LineCategory::BoundaryMarker
    } else if line.starts_with(BATTERY_VOLTAGE_PREFIX) {
        LineCategory::BatteryVoltage
    } else if line.starts_with(STATE_OF_CHARGE_PREFIX) {
        LineCategory::StateOfCharge
    } else if line.starts_with(CHANNEL_PREFIX) {
        if line.contains(NOT_CONNECTED_MARKER) {
            LineCategory::ChannelDisconnected
        } else {
            LineCategory::ChannelReading
        }
    } else if line.contains(SOLAR_STATUS_MARKER) {
        LineCategory::SolarStatus
    } else {
        LineCategory::Unrecognized
    }
}

fn is_boundary_marker(line: &str) -> bool {
    line.len() >= MIN_BOUNDARY_LEN && line.bytes().all(|b| b == b'=')
}
