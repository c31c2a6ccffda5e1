//! End-to-end integration tests: HTTP-shaped ingest through `IngestHandler`
//! feeding a `DetectRun` pass against the in-memory stores, the way
//! `daemon::Daemon` wires the two stages together in production.

use std::sync::Mutex;

use openlews::config::OpenLewsConfig;
use openlews::detect::DetectRun;
use openlews::events::NullEventBus;
use openlews::geocode::NullGeocoder;
use openlews::geohash;
use openlews::ingest::IngestHandler;
use openlews::llm::{ChatEndpoint, LlmClient, LlmError};
use openlews::model::{AlertStatus, Reading, RiskLevel};
use openlews::retry::RetryPolicy;
use openlews::store::memory::{InMemoryAlertStore, InMemoryTelemetryStore, InMemoryZoneStore};
use openlews::store::AlertStore;
use openlews::zones::ZoneIndex;

/// `Mutex`, not `RefCell`: `DetectRun::run` dispatches real OS threads for
/// its bounded fan-out, so the fake endpoint must be `Sync`.
struct FakeEndpoint {
    responses: Mutex<Vec<Result<String, LlmError>>>,
}

impl ChatEndpoint for FakeEndpoint {
    fn chat(&self, _system: &str, _user: &str, _max_tokens: u32, _temperature: f64) -> Result<String, LlmError> {
        self.responses.lock().unwrap().remove(0)
    }
}

fn assessment_json(risk: &str, confidence: f64, action: &str, ttf: &str) -> String {
    serde_json::json!({
        "risk_level": risk,
        "confidence": confidence,
        "reasoning": "Elevated moisture and tilt rate trend.",
        "trigger_factors": ["moisture", "tilt_velocity"],
        "recommended_action": action,
        "time_to_failure_estimate": ttf,
        "references": []
    })
    .to_string()
}

fn reading(sensor_id: &str, lat: f64, lon: f64, moisture: f64, tilt: f64, pore: f64) -> Reading {
    Reading {
        sensor_id: sensor_id.to_string(),
        timestamp: chrono::Utc::now().timestamp(),
        latitude: lat,
        longitude: lon,
        geohash: geohash::encode(lat, lon, 6),
        moisture_percent: moisture,
        tilt_x_degrees: 0.0,
        tilt_y_degrees: 0.0,
        tilt_rate_mm_hr: tilt,
        pore_pressure_kpa: pore,
        vibration_count: 0.0,
        vibration_baseline: None,
        safety_factor: 1.5,
        rainfall_24h_mm: None,
        battery_percent: 90.0,
        temperature_c: 25.0,
        zone_ref: None,
        enriched: false,
        ingested_at: None,
        expiry: None,
    }
}

/// A fixture bundling the fakes a full ingest-then-detect pass needs.
struct Harness {
    telemetry: InMemoryTelemetryStore,
    zone_store: InMemoryZoneStore,
    alert_store: InMemoryAlertStore,
    config: OpenLewsConfig,
    known_sensor_ids: Vec<String>,
}

impl Harness {
    fn new() -> Self {
        Self {
            telemetry: InMemoryTelemetryStore::new(),
            zone_store: InMemoryZoneStore::new(ZoneIndex::new()),
            alert_store: InMemoryAlertStore::new(),
            config: OpenLewsConfig::default(),
            known_sensor_ids: Vec::new(),
        }
    }

    fn ingest(&self, readings: Vec<Reading>) -> openlews::ingest::IngestStatistics {
        let zone_index = ZoneIndex::new();
        let bus = NullEventBus;
        let handler = IngestHandler::new(&self.telemetry, &bus, &zone_index, &self.config);
        handler.handle(readings)
    }

    fn detect_with(&self, responses: Vec<Result<String, LlmError>>) -> openlews::detect::DetectRunSummary {
        let bus = NullEventBus;
        let endpoint = FakeEndpoint { responses: Mutex::new(responses) };
        let llm = LlmClient::new(&endpoint, RetryPolicy::new(3, 0.001));
        let run = DetectRun::new(
            &self.telemetry,
            &self.zone_store,
            &self.alert_store,
            &bus,
            &llm,
            &NullGeocoder,
            &self.config,
            &self.known_sensor_ids,
        );
        run.run().unwrap()
    }
}

#[test]
fn s1_ingest_then_detect_creates_an_alert_for_a_high_risk_sensor() {
    let harness = Harness::new();
    let stats = harness.ingest(vec![reading("S1", 6.85, 80.93, 95.0, 8.0, 15.0)]);
    assert_eq!(stats.written, 1);
    assert_eq!(stats.high_risk_events, 1);

    let summary = harness.detect_with(vec![Ok(assessment_json("Orange", 0.8, "Prepare evacuation", "hours"))]);
    assert_eq!(summary.alerts_created, 1);

    let active = harness.alert_store.list_active().unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].risk_level, RiskLevel::Orange);
    assert_eq!(active[0].status, AlertStatus::Active);
    assert!(!active[0].narrative.is_empty(), "Orange alerts must carry a narrative");
}

#[test]
fn s2_benign_batch_produces_no_alert() {
    let harness = Harness::new();
    harness.ingest(vec![reading("S1", 6.85, 80.93, 15.0, 0.2, 1.0)]);
    let summary = harness.detect_with(vec![]);
    assert_eq!(summary.alerts_created, 0);
    assert!(harness.alert_store.list_active().unwrap().is_empty());
}

#[test]
fn s3_invalid_reading_is_rejected_at_ingest_and_never_reaches_detection() {
    let harness = Harness::new();
    let stats = harness.ingest(vec![reading("S1", 200.0, 80.93, 50.0, 0.0, 0.0)]);
    assert_eq!(stats.validated, 0);
    assert_eq!(stats.validation_errors, 1);

    let summary = harness.detect_with(vec![]);
    assert_eq!(summary.sensors_analyzed, 0);
}

#[test]
fn s4_correlated_cluster_of_high_risk_sensors_collapses_to_one_alert() {
    let harness = Harness::new();
    harness.ingest(vec![
        reading("S1", 6.85000, 80.93000, 95.0, 8.0, 15.0),
        reading("S2", 6.85001, 80.93000, 93.0, 7.5, 14.0),
        reading("S3", 6.84999, 80.93001, 94.0, 8.5, 13.0),
    ]);

    let summary = harness.detect_with(vec![Ok(assessment_json("Red", 0.9, "Evacuate immediately", "hours"))]);

    assert_eq!(summary.clusters_detected, 1);
    assert_eq!(summary.alerts_created, 1);
    let active = harness.alert_store.list_active().unwrap();
    assert_eq!(active.len(), 1);
    assert!(active[0].sensors_affected.len() >= 3);
}

#[test]
fn s5_repeated_detect_runs_on_a_persistent_hazard_escalate_without_duplicating_alerts() {
    let harness = Harness::new();
    harness.ingest(vec![reading("S1", 6.85, 80.93, 70.0, 2.0, 3.0)]);

    let first = harness.detect_with(vec![Ok(assessment_json("Yellow", 0.6, "Monitor closely", "days"))]);
    assert_eq!(first.alerts_created, 1);

    // Same sensor still reporting elevated risk on the next tick, now with
    // stronger confidence — this should escalate the existing alert rather
    // than mint a second one.
    harness.ingest(vec![reading("S1", 6.85, 80.93, 92.0, 7.0, 12.0)]);
    let second = harness.detect_with(vec![Ok(assessment_json("Orange", 0.85, "Prepare evacuation", "hours"))]);
    assert_eq!(second.alerts_created, 0);
    assert_eq!(second.alerts_escalated, 1);

    let active = harness.alert_store.list_active().unwrap();
    assert_eq!(active.len(), 1, "escalation must update the existing alert, not create a second one");
    assert_eq!(active[0].risk_level, RiskLevel::Orange);
    assert_eq!(active[0].escalation_history.len(), 1);
    assert_eq!(active[0].escalation_history[0].from_level, RiskLevel::Yellow);
    assert_eq!(active[0].escalation_history[0].to_level, RiskLevel::Orange);
}

#[test]
fn s6_stale_sensors_are_surfaced_without_generating_alerts() {
    let mut harness = Harness::new();
    harness.known_sensor_ids = vec!["S1".to_string(), "S2".to_string()];
    harness.ingest(vec![reading("S1", 6.85, 80.93, 20.0, 0.0, 0.0)]);

    let summary = harness.detect_with(vec![]);
    assert_eq!(summary.stale_sensors, vec!["S2".to_string()]);
    assert_eq!(summary.alerts_created, 0);
}

#[test]
fn llm_failure_during_assessment_does_not_abort_the_run_or_raise_an_alert() {
    let harness = Harness::new();
    harness.ingest(vec![reading("S1", 6.85, 80.93, 95.0, 8.0, 15.0)]);

    let summary = harness.detect_with(vec![Err(LlmError::Terminal("model rejected the request".to_string()))]);
    assert_eq!(summary.alerts_created, 0);
    assert!(harness.alert_store.list_active().unwrap().is_empty());
}
