//! Event bus interface (spec §6): fire-and-forget publication, consumed
//! by the ingest handler (`HighRiskTelemetry`) and the alert manager.

use serde::Serialize;
use thiserror::Error;

use crate::model::Reading;

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("event publish failed: {0}")]
    Failed(String),
}

#[derive(Debug, Clone, Serialize)]
pub struct HighRiskTelemetry {
    pub source: &'static str,
    pub detail_type: &'static str,
    pub sensor_id: String,
    pub reading: Reading,
    pub trigger_reasons: Vec<String>,
}

impl HighRiskTelemetry {
    pub fn new(reading: Reading, trigger_reasons: Vec<String>) -> Self {
        Self {
            source: "openlews.ingestor",
            detail_type: "HighRiskTelemetry",
            sensor_id: reading.sensor_id.clone(),
            reading,
            trigger_reasons,
        }
    }
}

pub trait EventBus {
    fn publish_high_risk_telemetry(&self, event: &HighRiskTelemetry) -> Result<(), PublishError>;
    fn publish_notification(&self, subject: &str, payload: &str) -> Result<(), PublishError>;
}

/// Drops every event. Used where `enable_event_publish = false` or in
/// tests that don't care about the publish side-channel.
pub struct NullEventBus;

impl EventBus for NullEventBus {
    fn publish_high_risk_telemetry(&self, _event: &HighRiskTelemetry) -> Result<(), PublishError> {
        Ok(())
    }

    fn publish_notification(&self, _subject: &str, _payload: &str) -> Result<(), PublishError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    pub struct RecordingEventBus {
        pub published: Mutex<Vec<String>>,
    }

    impl EventBus for RecordingEventBus {
        fn publish_high_risk_telemetry(&self, event: &HighRiskTelemetry) -> Result<(), PublishError> {
            self.published.lock().unwrap().push(event.sensor_id.clone());
            Ok(())
        }

        fn publish_notification(&self, subject: &str, _payload: &str) -> Result<(), PublishError> {
            self.published.lock().unwrap().push(subject.to_string());
            Ok(())
        }
    }

    fn sample_reading() -> Reading {
        Reading {
            sensor_id: "SENSOR_001".to_string(),
            timestamp: 1_735_430_400,
            latitude: 6.85,
            longitude: 80.93,
            geohash: "tc1xyz".to_string(),
            moisture_percent: 90.0,
            tilt_x_degrees: 0.0,
            tilt_y_degrees: 0.0,
            tilt_rate_mm_hr: 6.0,
            pore_pressure_kpa: 12.0,
            vibration_count: 0.0,
            vibration_baseline: None,
            safety_factor: 1.1,
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
    fn null_bus_always_succeeds() {
        let bus = NullEventBus;
        let event = HighRiskTelemetry::new(sample_reading(), vec!["moisture".to_string()]);
        assert!(bus.publish_high_risk_telemetry(&event).is_ok());
    }

    #[test]
    fn recording_bus_captures_published_events() {
        let bus = RecordingEventBus::default();
        let event = HighRiskTelemetry::new(sample_reading(), vec!["moisture".to_string()]);
        bus.publish_high_risk_telemetry(&event).unwrap();
        assert_eq!(bus.published.lock().unwrap().len(), 1);
    }
}
