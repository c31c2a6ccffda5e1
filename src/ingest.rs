//! `IngestHandler` (spec §4.9): validate → enrich (best-effort) → classify
//! high-risk → batch-persist, producing a statistics struct the HTTP
//! front door reports back to the caller.

use chrono::Utc;
use serde::Serialize;

use crate::config::OpenLewsConfig;
use crate::enrich::{self, EnrichmentCache};
use crate::events::{EventBus, HighRiskTelemetry};
use crate::model::{HazardLevel, Reading};
use crate::store::TelemetryStore;
use crate::validate::{self, ValidationError};
use crate::zones::ZoneIndex;

#[derive(Debug, Clone, Serialize)]
pub struct IngestItemError {
    pub index: usize,
    pub sensor_id: String,
    pub error: String,
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct IngestStatistics {
    pub total_received: usize,
    pub validated: usize,
    pub validation_errors: usize,
    pub written: usize,
    pub write_failures: usize,
    pub high_risk_events: usize,
    pub errors: Vec<IngestItemError>,
}

/// Threshold classification (spec §4.9). Evaluated after enrichment so
/// `zone.hazard_level` is available when present.
fn is_high_risk(reading: &Reading) -> bool {
    let moisture_high = reading.moisture_percent >= 85.0;
    let pore_high = reading.pore_pressure_kpa >= 10.0;
    let tilt_high = reading.tilt_rate_mm_hr >= 5.0;
    let safety_marginal = reading.safety_factor > 0.0 && reading.safety_factor < 1.2;
    let zone_and_moisture = reading
        .zone_ref
        .as_ref()
        .map(|z| matches!(z.hazard_level, HazardLevel::High | HazardLevel::VeryHigh) && reading.moisture_percent > 70.0)
        .unwrap_or(false);

    moisture_high || pore_high || tilt_high || safety_marginal || zone_and_moisture
}

pub struct IngestHandler<'a, T: TelemetryStore, B: EventBus> {
    store: &'a T,
    bus: &'a B,
    zone_index: &'a ZoneIndex,
    config: &'a OpenLewsConfig,
}

impl<'a, T: TelemetryStore, B: EventBus> IngestHandler<'a, T, B> {
    pub fn new(store: &'a T, bus: &'a B, zone_index: &'a ZoneIndex, config: &'a OpenLewsConfig) -> Self {
        Self { store, bus, zone_index, config }
    }

    pub fn handle(&self, batch: Vec<Reading>) -> IngestStatistics {
        let mut stats = IngestStatistics { total_received: batch.len(), ..Default::default() };
        let mut cache = EnrichmentCache::new();
        let now = Utc::now();
        let expiry = now + chrono::Duration::days(30);

        let mut to_persist: Vec<Reading> = Vec::new();

        for (index, mut reading) in batch.into_iter().enumerate() {
            if let Err(e) = validate::validate(&reading) {
                stats.validation_errors += 1;
                stats.errors.push(IngestItemError {
                    index,
                    sensor_id: reading.sensor_id.clone(),
                    error: describe_validation_error(&e),
                });
                continue;
            }
            stats.validated += 1;

            if self.config.enable_enrichment {
                enrich::enrich(
                    &mut reading,
                    self.zone_index,
                    &mut cache,
                    self.config.geohash_precision.zone_cell,
                    self.config.max_distance_km,
                );
            }

            reading.ingested_at = Some(now);
            reading.expiry = Some(expiry);

            if is_high_risk(&reading) {
                stats.high_risk_events += 1;
                if self.config.enable_event_publish {
                    let event = HighRiskTelemetry::new(reading.clone(), high_risk_reasons(&reading));
                    let _ = self.bus.publish_high_risk_telemetry(&event);
                }
            }

            to_persist.push(reading);
        }

        let persist_results = self.store.put_batch(&to_persist);
        for (reading, result) in to_persist.iter().zip(persist_results.iter()) {
            match result {
                Ok(()) => stats.written += 1,
                Err(e) => {
                    stats.write_failures += 1;
                    stats.errors.push(IngestItemError {
                        index: usize::MAX,
                        sensor_id: reading.sensor_id.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        stats
    }
}

fn describe_validation_error(e: &ValidationError) -> String {
    e.to_string()
}

fn high_risk_reasons(reading: &Reading) -> Vec<String> {
    let mut reasons = Vec::new();
    if reading.moisture_percent >= 85.0 {
        reasons.push("moisture".to_string());
    }
    if reading.pore_pressure_kpa >= 10.0 {
        reasons.push("pore_pressure".to_string());
    }
    if reading.tilt_rate_mm_hr >= 5.0 {
        reasons.push("tilt_rate".to_string());
    }
    if reading.safety_factor > 0.0 && reading.safety_factor < 1.2 {
        reasons.push("safety_factor".to_string());
    }
    if reading
        .zone_ref
        .as_ref()
        .map(|z| matches!(z.hazard_level, HazardLevel::High | HazardLevel::VeryHigh) && reading.moisture_percent > 70.0)
        .unwrap_or(false)
    {
        reasons.push("zone_hazard".to_string());
    }
    reasons
}
