//! Integration tests for the line-to-snapshot pipeline

use std::time::Duration;
use tokio::time::Instant;

use eps_collector::runtime::{CollectorConfig, PolicyKind, SnapshotAssembler};
use eps_collector::{Collector, LineSource, RecentReadings, SinkSet, StopReason};

const CYCLE: &str = "Battery Voltage: 4.01V
Channel #6: 30.5
Solar Supply Status: OK | Solar Power Path: ON | Solar Mode: AUTO | Input Power Status: OK | Charger Enable: ON | ADAPTER | Charging Status: Charge done | STAT1:ON STAT2:ON
==============================
";

fn boundary_assembler() -> SnapshotAssembler {
    SnapshotAssembler::with_policy(
        PolicyKind::BoundaryReset,
        Duration::from_secs(1),
        Instant::now(),
    )
}

#[test]
fn test_boundary_cycle_serializes_dashboard_keys() {
    let mut assembler = boundary_assembler();
    let now = Instant::now();

    let mut emitted = Vec::new();
    for line in CYCLE.lines() {
        if let Some(snapshot) = assembler.process_line(line, now) {
            emitted.push(snapshot);
        }
    }

    assert_eq!(emitted.len(), 1);
    assert!(assembler.live().is_blank());

    let doc = serde_json::to_value(&emitted[0]).unwrap();
    assert!(doc["timestamp"].is_string());
    assert_eq!(doc["battery"]["voltage_V"], serde_json::json!(4.01));
    assert!(doc["battery"]["soc_percent"].is_null());
    assert_eq!(doc["adc"]["ch_6"], serde_json::json!(30.5));
    assert_eq!(doc["solar_charger"]["source_mode"], "ADAPTER");
    assert_eq!(doc["solar_charger"]["charging_status"], "Charge done");
    assert_eq!(doc["solar_charger"]["stat1"], true);
    assert_eq!(doc["solar_charger"]["stat2"], true);
    assert_eq!(doc["solar_charger"]["solar_supply_ok"], true);
}

#[test]
fn test_disconnected_channel_removes_reading() {
    let mut assembler = boundary_assembler();
    let now = Instant::now();

    assembler.process_line("Channel #9: 1.25", now);
    assert_eq!(assembler.live().adc.get(&9), Some(&1.25));

    assembler.process_line("Channel #9: NOT CONNECTED", now);
    assert!(assembler.live().adc.is_empty());
}

#[tokio::test]
async fn test_replay_appends_json_lines() {
    let dir = tempfile::tempdir().unwrap();
    let jsonl_path = dir.path().join("readings.jsonl");

    let config = CollectorConfig::from_yaml_str(&format!(
        "sinks:\n  jsonl_path: {}\n  recent_capacity: 5\ncontrol:\n  enabled: false\n",
        jsonl_path.display()
    ))
    .unwrap();

    let recent = RecentReadings::new(config.sinks.recent_capacity);
    let sinks = SinkSet::from_config(&config.sinks, recent.clone()).await.unwrap();
    assert_eq!(sinks.names(), vec!["recent", "jsonl"]);

    let input = format!("{}{}garbage line\n", CYCLE, CYCLE);
    let mut collector = Collector::new(
        LineSource::new(input.as_bytes(), config.read_timeout()),
        boundary_assembler(),
        sinks,
    );

    let summary = collector.run().await.unwrap();
    collector.flush().await;

    assert_eq!(summary.stop_reason, StopReason::Closed);
    assert_eq!(summary.stats.emitted, 2);
    assert_eq!(summary.stats.lines_unrecognized, 1);
    assert_eq!(recent.len(), 2);

    let contents = std::fs::read_to_string(&jsonl_path).unwrap();
    let docs: Vec<serde_json::Value> = contents
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(docs.len(), 2);
    assert!(docs.iter().all(|doc| doc["adc"]["ch_6"] == serde_json::json!(30.5)));
}

#[tokio::test(start_paused = true)]
async fn test_fixed_interval_copies_are_independent() {
    let start = Instant::now();
    let mut assembler =
        SnapshotAssembler::with_policy(PolicyKind::FixedInterval, Duration::from_secs(1), start);

    assembler.process_line("Battery Voltage: 3.80V", start);
    let first = assembler
        .tick(start + Duration::from_millis(1000))
        .expect("interval elapsed");

    assembler.process_line("Battery Voltage: 3.95V", start + Duration::from_millis(1100));

    assert_eq!(first.battery.voltage, Some(3.80));
    assert_eq!(assembler.live().battery.voltage, Some(3.95));
    assert!(assembler.tick(start + Duration::from_millis(1500)).is_none());
}
