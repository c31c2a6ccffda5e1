//! In-memory store implementations used by tests and by any deployment
//! small enough to run without a real database. Not behind a feature
//! flag — the traits make swapping trivial, so there's no need for one.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use chrono::Utc;

use crate::model::{Alert, HazardZone, Reading};
use crate::zones::ZoneIndex;

use super::{AlertStore, StoreError, TelemetryStore, ZoneStore};

#[derive(Default)]
pub struct InMemoryTelemetryStore {
    readings: Mutex<Vec<Reading>>,
}

impl InMemoryTelemetryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TelemetryStore for InMemoryTelemetryStore {
    fn put_batch(&self, readings: &[Reading]) -> Vec<Result<(), StoreError>> {
        let mut store = self.readings.lock().unwrap();
        readings
            .iter()
            .map(|r| {
                store.push(r.clone());
                Ok(())
            })
            .collect()
    }

    fn query_by_time(&self, range_start: i64, range_end: i64, limit: Option<usize>) -> Result<Vec<Reading>, StoreError> {
        let store = self.readings.lock().unwrap();
        let mut matched: Vec<Reading> = store
            .iter()
            .filter(|r| r.timestamp >= range_start && r.timestamp <= range_end)
            .cloned()
            .collect();
        matched.sort_by_key(|r| r.timestamp);
        if let Some(n) = limit {
            matched.truncate(n);
        }
        Ok(matched)
    }

    fn latest_per_sensor(&self, range_start: i64, range_end: i64) -> Result<Vec<Reading>, StoreError> {
        let store = self.readings.lock().unwrap();
        let mut latest: HashMap<String, Reading> = HashMap::new();
        for r in store.iter().filter(|r| r.timestamp >= range_start && r.timestamp <= range_end) {
            latest
                .entry(r.sensor_id.clone())
                .and_modify(|existing| {
                    if r.timestamp > existing.timestamp {
                        *existing = r.clone();
                    }
                })
                .or_insert_with(|| r.clone());
        }
        Ok(latest.into_values().collect())
    }
}

#[derive(Default)]
pub struct InMemoryZoneStore {
    index: ZoneIndex,
}

impl InMemoryZoneStore {
    pub fn new(index: ZoneIndex) -> Self {
        Self { index }
    }
}

impl ZoneStore for InMemoryZoneStore {
    fn find_by_geohash4(&self, cell: &str) -> Result<Vec<HazardZone>, StoreError> {
        Ok(self.index.find_by_geohash4(cell))
    }
}

#[derive(Default)]
pub struct InMemoryAlertStore {
    alerts: Mutex<HashMap<String, Alert>>,
}

impl InMemoryAlertStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AlertStore for InMemoryAlertStore {
    fn get_active_by_prefix(&self, prefix: &str, within: Duration) -> Result<Option<Alert>, StoreError> {
        let alerts = self.alerts.lock().unwrap();
        let cutoff = Utc::now() - chrono::Duration::from_std(within).unwrap_or_default();
        let candidate = alerts
            .values()
            .filter(|a| a.alert_id.starts_with(prefix))
            .filter(|a| a.status == crate::model::AlertStatus::Active)
            .filter(|a| a.updated_at >= cutoff)
            .max_by_key(|a| a.updated_at);
        Ok(candidate.cloned())
    }

    fn upsert_alert(&self, alert: &Alert) -> Result<(), StoreError> {
        let mut alerts = self.alerts.lock().unwrap();
        if let Some(existing) = alerts.get(&alert.alert_id) {
            if alert.risk_level.ordinal() < existing.risk_level.ordinal() {
                return Err(StoreError::Transient(format!(
                    "refusing to downgrade alert {} from {:?} to {:?}",
                    alert.alert_id, existing.risk_level, alert.risk_level
                )));
            }
        }
        alerts.insert(alert.alert_id.clone(), alert.clone());
        Ok(())
    }

    fn list_active(&self) -> Result<Vec<Alert>, StoreError> {
        let alerts = self.alerts.lock().unwrap();
        Ok(alerts.values().filter(|a| a.status == crate::model::AlertStatus::Active).cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AlertStatus, DetectionType, RiskLevel, TimeToFailure};

    fn reading(sensor_id: &str, ts: i64) -> Reading {
        Reading {
            sensor_id: sensor_id.to_string(),
            timestamp: ts,
            latitude: 6.85,
            longitude: 80.93,
            geohash: "tc1xyz".to_string(),
            moisture_percent: 50.0,
            tilt_x_degrees: 0.0,
            tilt_y_degrees: 0.0,
            tilt_rate_mm_hr: 0.0,
            pore_pressure_kpa: 0.0,
            vibration_count: 0.0,
            vibration_baseline: None,
            safety_factor: 1.0,
            rainfall_24h_mm: None,
            battery_percent: 90.0,
            temperature_c: 25.0,
            zone_ref: None,
            enriched: false,
            ingested_at: None,
            expiry: None,
        }
    }

    #[test]
    fn put_and_query_round_trip() {
        let store = InMemoryTelemetryStore::new();
        store.put_batch(&[reading("S1", 100), reading("S1", 200)]);
        let got = store.query_by_time(0, 1000, None).unwrap();
        assert_eq!(got.len(), 2);
    }

    #[test]
    fn latest_per_sensor_picks_most_recent() {
        let store = InMemoryTelemetryStore::new();
        store.put_batch(&[reading("S1", 100), reading("S1", 200), reading("S2", 150)]);
        let latest = store.latest_per_sensor(0, 1000).unwrap();
        assert_eq!(latest.len(), 2);
        let s1 = latest.iter().find(|r| r.sensor_id == "S1").unwrap();
        assert_eq!(s1.timestamp, 200);
    }

    fn alert(id: &str, risk: RiskLevel) -> Alert {
        let now = Utc::now();
        Alert {
            alert_id: id.to_string(),
            created_at: now,
            updated_at: now,
            status: AlertStatus::Active,
            risk_level: risk,
            confidence: 0.7,
            llm_reasoning: "test".to_string(),
            trigger_factors: vec![],
            recommended_action: "Monitor closely".to_string(),
            time_to_failure: TimeToFailure::Unknown,
            narrative: String::new(),
            detection_type: DetectionType::Individual,
            sensors_affected: vec!["S1".to_string()],
            center_location: (6.85, 80.93),
            resolved_location: None,
            zone_snapshot: None,
            escalation_history: vec![],
            expiry: now + chrono::Duration::days(30),
        }
    }

    #[test]
    fn upsert_rejects_risk_level_downgrade() {
        let store = InMemoryAlertStore::new();
        store.upsert_alert(&alert("SENSOR:S1", RiskLevel::Orange)).unwrap();
        let result = store.upsert_alert(&alert("SENSOR:S1", RiskLevel::Yellow));
        assert!(result.is_err());
    }

    #[test]
    fn get_active_by_prefix_finds_recent_active_alert() {
        let store = InMemoryAlertStore::new();
        store.upsert_alert(&alert("SENSOR:S1", RiskLevel::Yellow)).unwrap();
        let found = store.get_active_by_prefix("SENSOR:S1", Duration::from_secs(6 * 3600)).unwrap();
        assert!(found.is_some());
    }

    #[test]
    fn list_active_returns_only_active_alerts() {
        let store = InMemoryAlertStore::new();
        store.upsert_alert(&alert("SENSOR:S1", RiskLevel::Yellow)).unwrap();
        let mut resolved = alert("SENSOR:S2", RiskLevel::Orange);
        resolved.status = AlertStatus::Expired;
        store.upsert_alert(&resolved).unwrap();

        let active = store.list_active().unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].alert_id, "SENSOR:S1");
    }
}
