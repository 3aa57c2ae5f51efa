//! Snapshot data model for EPS telemetry records.
//!
//! A [`Snapshot`] is the unit of output: everything the power board reported
//! during one accumulation period, stamped at the moment it is emitted.
//! The serialized shape matches the documents the dashboard reads
//! (`battery.voltage_V`, `adc.ch_6`, `solar_charger.solar_supply_ok`, ...).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// One structured telemetry record.
///
/// Scalars start out unset (`None`) and the channel map starts empty.
/// `timestamp` stays `None` on the live instance and is only filled in
/// when a copy is emitted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,

    #[serde(default)]
    pub battery: Battery,

    /// Channel index -> reading. Only connected channels are present.
    #[serde(default, with = "adc_channels")]
    pub adc: BTreeMap<u32, f64>,

    /// Whole solar charger record, replaced in one piece per status line.
    #[serde(default)]
    pub solar_charger: Option<SolarCharger>,
}

impl Snapshot {
    /// Create a blank snapshot.
    pub fn new() -> Self {
        Self::default()
    }

    /// True when no field has been observed yet.
    pub fn is_blank(&self) -> bool {
        self.battery.voltage.is_none()
            && self.battery.state_of_charge.is_none()
            && self.adc.is_empty()
            && self.solar_charger.is_none()
    }

    /// Return this snapshot stamped with the given emission instant.
    pub fn stamped(mut self, at: DateTime<Utc>) -> Self {
        self.timestamp = Some(at);
        self
    }
}

/// Battery gauge readings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Battery {
    #[serde(rename = "voltage_V", default)]
    pub voltage: Option<f64>,

    #[serde(rename = "soc_percent", default)]
    pub state_of_charge: Option<f64>,
}

/// Solar charger status, always derived from a single status line.
///
/// Booleans whose marker is missing from the line are `false`, not unset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SolarCharger {
    #[serde(rename = "solar_supply_ok")]
    pub supply_ok: bool,

    #[serde(rename = "solar_power_path")]
    pub power_path_on: bool,

    #[serde(rename = "solar_mode")]
    pub mode_auto: bool,

    pub input_power_ok: bool,
    pub charger_enabled: bool,

    #[serde(default)]
    pub source_mode: Option<SourceMode>,

    #[serde(default)]
    pub charging_status: Option<String>,

    pub stat1: bool,
    pub stat2: bool,
}

/// Power source the charger reports it is running from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SourceMode {
    Adapter,
    Usb,
    Battery,
}

impl SourceMode {
    /// All modes, in the order they are searched for on a status line.
    pub const ALL: [SourceMode; 3] = [SourceMode::Adapter, SourceMode::Usb, SourceMode::Battery];

    /// Keyword the board prints for this mode.
    pub fn keyword(&self) -> &'static str {
        match self {
            SourceMode::Adapter => "ADAPTER",
            SourceMode::Usb => "USB",
            SourceMode::Battery => "BATTERY",
        }
    }
}

impl fmt::Display for SourceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.keyword())
    }
}

/// (De)serialize the channel map with `ch_<index>` keys.
mod adc_channels {
    use serde::de::Error as _;
    use serde::ser::SerializeMap;
    use serde::{Deserialize, Deserializer, Serializer};
    use std::collections::BTreeMap;

    pub fn serialize<S>(channels: &BTreeMap<u32, f64>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(channels.len()))?;
        for (index, value) in channels {
            map.serialize_entry(&format!("ch_{}", index), value)?;
        }
        map.end()
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<BTreeMap<u32, f64>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw: BTreeMap<String, f64> = BTreeMap::deserialize(deserializer)?;
        raw.into_iter()
            .map(|(key, value)| {
                key.strip_prefix("ch_")
                    .and_then(|n| n.parse::<u32>().ok())
                    .map(|index| (index, value))
                    .ok_or_else(|| D::Error::custom(format!("invalid channel key '{}'", key)))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn test_new_snapshot_is_blank() {
        let snapshot = Snapshot::new();

        assert!(snapshot.is_blank());
        assert_eq!(snapshot.timestamp, None);
        assert_eq!(snapshot.battery.voltage, None);
        assert_eq!(snapshot.battery.state_of_charge, None);
        assert!(snapshot.adc.is_empty());
        assert_eq!(snapshot.solar_charger, None);
    }

    #[test]
    fn test_serialized_shape() {
        let mut snapshot = Snapshot::new();
        snapshot.battery.voltage = Some(4.01);
        snapshot.adc.insert(13, 12.5);
        snapshot.adc.insert(6, 30.5);
        snapshot.solar_charger = Some(SolarCharger {
            supply_ok: true,
            source_mode: Some(SourceMode::Adapter),
            charging_status: Some("Charge done".to_string()),
            ..Default::default()
        });
        let at = Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap();
        let value = serde_json::to_value(snapshot.stamped(at)).unwrap();

        assert_eq!(value["timestamp"], json!("2026-01-02T03:04:05Z"));
        assert_eq!(value["battery"], json!({"voltage_V": 4.01, "soc_percent": null}));
        assert_eq!(value["adc"], json!({"ch_6": 30.5, "ch_13": 12.5}));
        assert_eq!(value["solar_charger"]["solar_supply_ok"], json!(true));
        assert_eq!(value["solar_charger"]["solar_power_path"], json!(false));
        assert_eq!(value["solar_charger"]["source_mode"], json!("ADAPTER"));
        assert_eq!(value["solar_charger"]["charging_status"], json!("Charge done"));
    }

    #[test]
    fn test_blank_solar_charger_serializes_as_null() {
        let value = serde_json::to_value(Snapshot::new()).unwrap();

        assert_eq!(value["solar_charger"], json!(null));
        assert_eq!(value["adc"], json!({}));
    }

    #[test]
    fn test_deserialize_document() {
        let document = json!({
            "timestamp": "2026-01-02T03:04:05Z",
            "battery": {"voltage_V": 3.9, "soc_percent": 55.0},
            "adc": {"ch_0": 21.5, "ch_15": 30.25},
            "solar_charger": null
        });

        let snapshot: Snapshot = serde_json::from_value(document).unwrap();

        assert_eq!(snapshot.battery.state_of_charge, Some(55.0));
        assert_eq!(snapshot.adc.get(&15), Some(&30.25));
        assert!(snapshot.timestamp.is_some());
    }

    #[test]
    fn test_deserialize_rejects_bad_channel_key() {
        let document = json!({"adc": {"channel6": 1.0}});

        let result = serde_json::from_value::<Snapshot>(document);

        assert!(result.is_err());
    }
}
