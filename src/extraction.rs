//! Field extraction primitives for telemetry lines.
//!
//! Every extractor scans free-form text for the first match of a pattern and
//! reports absence as `None`. Nothing in here fails: a malformed token simply
//! leaves the corresponding snapshot field unset.

use crate::runtime::line_classifier::LineCategory;
use crate::snapshot::{SolarCharger, SourceMode};
use regex::Regex;
use std::sync::OnceLock;

const CHARGING_STATUS_LABEL: &str = "Charging Status:";
const FIELD_SEPARATOR: char = '|';

const SUPPLY_OK_MARKER: &str = "Solar Supply Status: OK";
const POWER_PATH_ON_MARKER: &str = "Solar Power Path: ON";
const MODE_AUTO_MARKER: &str = "Solar Mode: AUTO";
const INPUT_POWER_OK_MARKER: &str = "Input Power Status: OK";
const CHARGER_ENABLED_MARKER: &str = "Charger Enable: ON";
const STAT1_ON_MARKER: &str = "STAT1:ON";
const STAT2_ON_MARKER: &str = "STAT2:ON";

fn number_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[-+]?\d*\.\d+|[-+]?\d+").expect("number pattern is valid"))
}

fn channel_index_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"#(\d+)").expect("channel pattern is valid"))
}

/// Typed values pulled out of one classified line.
///
/// One variant per data-carrying category, so a category can never be
/// applied with another category's fields.
#[derive(Debug, Clone, PartialEq)]
pub enum LineFields {
    BatteryVoltage(Option<f64>),
    StateOfCharge(Option<f64>),
    ChannelReading { index: Option<u32>, value: Option<f64> },
    ChannelDisconnected { index: Option<u32> },
    SolarStatus(SolarCharger),
    Boundary,
}

/// Extract the fields implied by `category` from `line`.
///
/// Returns `None` for [`LineCategory::Unrecognized`], which carries no data.
pub fn extract_fields(category: LineCategory, line: &str) -> Option<LineFields> {
    let fields = match category {
        LineCategory::BatteryVoltage => LineFields::BatteryVoltage(first_number(line)),
        LineCategory::StateOfCharge => LineFields::StateOfCharge(first_number(line)),
        LineCategory::ChannelReading => LineFields::ChannelReading {
            index: channel_index(line),
            value: channel_value(line),
        },
        LineCategory::ChannelDisconnected => LineFields::ChannelDisconnected {
            index: channel_index(line),
        },
        LineCategory::SolarStatus => LineFields::SolarStatus(solar_status(line)),
        LineCategory::BoundaryMarker => LineFields::Boundary,
        LineCategory::Unrecognized => return None,
    };
    Some(fields)
}

/// First signed decimal or integer token in `text`.
///
/// This is a heuristic, not a grammar: `"3.87V"` yields `3.87`,
/// `"76%"` yields `76.0`, and `"v2 = 1.5"` yields `2.0`.
pub fn first_number(text: &str) -> Option<f64> {
    number_regex()
        .find(text)
        .and_then(|m| m.as_str().parse::<f64>().ok())
}

/// Integer following the first `#` in `text`.
pub fn channel_index(text: &str) -> Option<u32> {
    channel_index_regex()
        .captures(text)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<u32>().ok())
}

/// Reading on a channel line: the first number after the `:` that follows
/// the channel index.
pub fn channel_value(text: &str) -> Option<f64> {
    let after_index = channel_index_regex()
        .find(text)
        .map(|m| &text[m.end()..])
        .unwrap_or(text);
    let (_, reading) = after_index.split_once(':')?;
    first_number(reading)
}

/// Text after `Charging Status:` up to the next `|` or end of line, trimmed.
///
/// An empty status is reported as absent.
pub fn charging_status(text: &str) -> Option<String> {
    let start = text.find(CHARGING_STATUS_LABEL)? + CHARGING_STATUS_LABEL.len();
    let rest = &text[start..];
    let status = rest
        .split(FIELD_SEPARATOR)
        .next()
        .unwrap_or_default()
        .trim();

    if status.is_empty() {
        None
    } else {
        Some(status.to_string())
    }
}

/// First source mode keyword appearing as a whole word on the line.
pub fn source_mode(text: &str) -> Option<SourceMode> {
    let words: Vec<&str> = text
        .split(|c: char| c == FIELD_SEPARATOR || c == ':' || c.is_whitespace())
        .filter(|w| !w.is_empty())
        .collect();

    SourceMode::ALL
        .into_iter()
        .find(|mode| words.contains(&mode.keyword()))
}

/// Derive the whole solar charger record from one status line.
pub fn solar_status(text: &str) -> SolarCharger {
    SolarCharger {
        supply_ok: text.contains(SUPPLY_OK_MARKER),
        power_path_on: text.contains(POWER_PATH_ON_MARKER),
        mode_auto: text.contains(MODE_AUTO_MARKER),
        input_power_ok: text.contains(INPUT_POWER_OK_MARKER),
        charger_enabled: text.contains(CHARGER_ENABLED_MARKER),
        source_mode: source_mode(text),
        charging_status: charging_status(text),
        stat1: text.contains(STAT1_ON_MARKER),
        stat2: text.contains(STAT2_ON_MARKER),
    }
}
