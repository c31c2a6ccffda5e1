//! `DetectRun` (spec §4.9): one end-to-end detection pass over the latest
//! telemetry window — score each sensor, fuse spatially, cluster, assess
//! the survivors with the LLM, and reconcile the result into alerts.

use std::collections::{HashMap, HashSet};
use std::time::Instant;

use serde::Serialize;
use serde_json::{json, Value};

use crate::alert::manager::EnsureOutcome;
use crate::alert::{AlertManager, Detection};
use crate::config::OpenLewsConfig;
use crate::events::EventBus;
use crate::fusion;
use crate::geocode::{self, Geocoder};
use crate::geohash;
use crate::geomath::{bbox_contains, haversine_m};
use crate::llm::{AssessmentRiskLevel, ChatEndpoint, LlmClient, RecommendedAction, TimeToFailureEstimate};
use crate::model::{Cluster, DetectionType, HazardZone, RiskLevel, SensorAnalysis, TimeToFailure};
use crate::store::{AlertStore, StoreError, TelemetryStore, ZoneStore};

/// Supplemental, non-alerting observation (§11): sensors expected to
/// report but absent from the window. Never affects scoring or alerting.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SensorHealth {
    pub stale_sensors: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct DetectRunSummary {
    pub sensors_analyzed: usize,
    pub clusters_detected: usize,
    pub alerts_created: usize,
    pub alerts_escalated: usize,
    pub execution_time_s: f64,
    pub stale_sensors: Vec<String>,
}

fn map_risk_level(level: AssessmentRiskLevel) -> RiskLevel {
    match level {
        AssessmentRiskLevel::Yellow => RiskLevel::Yellow,
        AssessmentRiskLevel::Orange => RiskLevel::Orange,
        AssessmentRiskLevel::Red => RiskLevel::Red,
    }
}

fn map_time_to_failure(estimate: TimeToFailureEstimate) -> TimeToFailure {
    match estimate {
        TimeToFailureEstimate::Hours => TimeToFailure::Hours,
        TimeToFailureEstimate::Days => TimeToFailure::Days,
        TimeToFailureEstimate::Unknown => TimeToFailure::Unknown,
    }
}

fn recommended_action_str(action: RecommendedAction) -> &'static str {
    match action {
        RecommendedAction::MonitorClosely => "Monitor closely",
        RecommendedAction::PrepareEvacuation => "Prepare evacuation",
        RecommendedAction::EvacuateImmediately => "Evacuate immediately",
    }
}

fn record_outcome(outcome: EnsureOutcome, created: &mut usize, escalated: &mut usize) {
    match outcome {
        EnsureOutcome::Created => *created += 1,
        EnsureOutcome::Escalated => *escalated += 1,
        EnsureOutcome::Unchanged => {}
    }
}

/// Bounded fan-out over independent per-item I/O (location lookup, zone
/// query, LLM assessment — spec §5): caps in-flight work at `max_parallel`
/// by dispatching one OS thread per chunk and joining before the next.
fn bounded_map<I, R, F>(items: &[I], max_parallel: usize, f: F) -> Vec<R>
where
    I: Sync,
    R: Send,
    F: Fn(&I) -> R + Sync,
{
    let mut results = Vec::with_capacity(items.len());
    std::thread::scope(|scope| {
        for chunk in items.chunks(max_parallel.max(1)) {
            let handles: Vec<_> = chunk.iter().map(|item| scope.spawn(|| f(item))).collect();
            for handle in handles {
                results.push(handle.join().expect("detect_run worker panicked"));
            }
        }
    });
    results
}

fn query_neighbourhood<Z: ZoneStore>(
    store: &Z,
    lat: f64,
    lon: f64,
    precision: usize,
) -> Result<Vec<HazardZone>, StoreError> {
    let cell = geohash::encode(lat, lon, precision);
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for ring_cell in geohash::neighbours8(&cell) {
        for zone in store.find_by_geohash4(&ring_cell)? {
            if seen.insert(zone.zone_id.clone()) {
                out.push(zone);
            }
        }
    }
    Ok(out)
}

/// Mirrors `zones::ZoneIndex`'s containing-then-nearest resolution, but
/// against the `ZoneStore` trait (I/O) with a per-run cache by geohash4
/// cell. The cache holds the raw 9-cell candidate list (spec §5: "shared
/// resources" cache type is `geohash4 -> [Zone]`), not the resolved zone —
/// two readings sharing a cell can still fall in different zones'
/// bounding boxes, so containment is recomputed per reading against the
/// cached candidates. A zone-index failure degrades to "no context" rather
/// than aborting the run (spec §7).
fn resolve_zone_context<Z: ZoneStore>(
    store: &Z,
    cache: &mut HashMap<String, Vec<HazardZone>>,
    lat: f64,
    lon: f64,
    precision: usize,
    max_km: f64,
) -> Option<HazardZone> {
    let cell = geohash::encode(lat, lon, precision);
    let candidates = match cache.get(&cell) {
        Some(hit) => hit.clone(),
        None => {
            let fetched = query_neighbourhood(store, lat, lon, precision).unwrap_or_default();
            cache.insert(cell, fetched.clone());
            fetched
        }
    };

    let containing: Vec<&HazardZone> = candidates.iter().filter(|z| bbox_contains(&z.bounding_box, lat, lon)).collect();

    if !containing.is_empty() {
        return containing
            .into_iter()
            .max_by(|a, b| {
                a.hazard_level.cmp(&b.hazard_level).then_with(|| {
                    let da = haversine_m(lat, lon, a.centroid_lat, a.centroid_lon);
                    let db = haversine_m(lat, lon, b.centroid_lat, b.centroid_lon);
                    db.partial_cmp(&da).unwrap_or(std::cmp::Ordering::Equal)
                })
            })
            .cloned();
    }

    let max_m = max_km * 1000.0;
    candidates
        .into_iter()
        .map(|z| (haversine_m(lat, lon, z.centroid_lat, z.centroid_lon), z))
        .filter(|(d, _)| *d <= max_m)
        .min_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(_, z)| z)
}

fn build_context(
    representative_id: &str,
    members: &[SensorAnalysis],
    composite_risk: f64,
    zone: Option<&HazardZone>,
    location_label: &str,
) -> Value {
    json!({
        "representative_sensor_id": representative_id,
        "composite_risk": composite_risk,
        "location": location_label,
        "zone": zone.map(|z| json!({
            "zone_id": z.zone_id,
            "hazard_level": z.hazard_level.as_str(),
            "soil_type": z.soil_type,
            "landslide_type": z.landslide_type,
        })),
        "sensors": members.iter().map(|m| json!({
            "sensor_id": m.sensor_id,
            "base_risk": m.base_risk,
            "composite_risk": m.composite_risk,
            "spatial_correlation": m.spatial_correlation,
            "moisture_percent": m.reading.moisture_percent,
            "tilt_rate_mm_hr": m.reading.tilt_rate_mm_hr,
            "pore_pressure_kpa": m.reading.pore_pressure_kpa,
            "safety_factor": m.reading.safety_factor,
            "critical_moisture_percent": m.critical_moisture_percent,
        })).collect::<Vec<_>>(),
    })
}

pub struct DetectRun<'a, T, Z, S, B, E, G>
where
    T: TelemetryStore,
    Z: ZoneStore,
    S: AlertStore,
    B: EventBus,
    E: ChatEndpoint,
    G: Geocoder,
{
    telemetry: &'a T,
    zones: &'a Z,
    alert_manager: AlertManager<'a, S, B>,
    llm: &'a LlmClient<'a, E>,
    geocoder: &'a G,
    config: &'a OpenLewsConfig,
    known_sensor_ids: &'a [String],
}

impl<'a, T, Z, S, B, E, G> DetectRun<'a, T, Z, S, B, E, G>
where
    T: TelemetryStore,
    Z: ZoneStore,
    S: AlertStore,
    B: EventBus,
    E: ChatEndpoint,
    G: Geocoder,
{
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        telemetry: &'a T,
        zones: &'a Z,
        alert_store: &'a S,
        bus: &'a B,
        llm: &'a LlmClient<'a, E>,
        geocoder: &'a G,
        config: &'a OpenLewsConfig,
        known_sensor_ids: &'a [String],
    ) -> Self {
        let alert_manager = AlertManager::new(alert_store, bus, config.alert_dedup_window_s, config.alert_expiry_grace_s);
        Self { telemetry, zones, alert_manager, llm, geocoder, config, known_sensor_ids }
    }

    /// Runs one detection pass (spec §4.9's dataflow). The telemetry fetch
    /// is the only failure that aborts the run; everything per-item
    /// (zone lookup, LLM call, alert write) is best-effort and logged.
    /// The cluster and individual assessment phases each fan out up to
    /// `config.max_parallel_io` concurrent workers (spec §5).
    pub fn run(&self) -> Result<DetectRunSummary, StoreError>
    where
        T: Sync,
        Z: Sync,
        S: Sync,
        B: Sync,
        E: Sync,
        G: Sync,
    {
        let start = Instant::now();
        let now = chrono::Utc::now().timestamp();
        let range_start = now - self.config.window_seconds;
        let readings = self.telemetry.latest_per_sensor(range_start, now)?;

        let mut zone_cache: HashMap<String, Vec<HazardZone>> = HashMap::new();
        let mut analyses: Vec<SensorAnalysis> = Vec::with_capacity(readings.len());

        for reading in readings {
            let zone_context = if reading.enriched {
                reading.zone_ref.clone()
            } else {
                resolve_zone_context(
                    self.zones,
                    &mut zone_cache,
                    reading.latitude,
                    reading.longitude,
                    self.config.geohash_precision.zone_cell,
                    self.config.max_distance_km,
                )
            };

            let base = crate::scorer::base_risk(&reading, zone_context.as_ref(), self.config);
            let critical_moisture_percent = crate::scorer::critical_moisture_for(zone_context.as_ref(), self.config);

            analyses.push(SensorAnalysis {
                sensor_id: reading.sensor_id.clone(),
                reading,
                base_risk: base,
                spatial_correlation: 0.0,
                composite_risk: 0.0,
                neighbour_ids: Vec::new(),
                zone_context,
                critical_moisture_percent,
            });
        }

        let sensors_analyzed = analyses.len();
        let analyzed_ids: HashSet<String> = analyses.iter().map(|a| a.sensor_id.clone()).collect();
        let stale_sensors: Vec<String> =
            self.known_sensor_ids.iter().filter(|id| !analyzed_ids.contains(*id)).cloned().collect();

        let fused = fusion::fuse(analyses, self.config.correlation_radius_m);
        let clusters =
            fusion::detect_clusters(&fused, self.config.risk_threshold, self.config.cluster_radius_m, self.config.min_cluster_size);
        let clustered_ids: HashSet<&str> = clusters.iter().flat_map(|c| c.member_ids.iter().map(|s| s.as_str())).collect();

        let mut alerts_created = 0;
        let mut alerts_escalated = 0;

        let eligible_clusters: Vec<&Cluster> =
            clusters.iter().filter(|c| c.avg_composite_risk > self.config.risk_threshold).collect();
        for outcome in bounded_map(&eligible_clusters, self.config.max_parallel_io, |cluster| self.process_cluster(*cluster, &fused))
            .into_iter()
            .flatten()
        {
            record_outcome(outcome, &mut alerts_created, &mut alerts_escalated);
        }

        let eligible_individuals: Vec<&SensorAnalysis> = fused
            .iter()
            .filter(|a| !clustered_ids.contains(a.sensor_id.as_str()) && a.composite_risk > self.config.risk_threshold)
            .collect();
        for outcome in bounded_map(&eligible_individuals, self.config.max_parallel_io, |analysis| self.process_individual(*analysis))
            .into_iter()
            .flatten()
        {
            record_outcome(outcome, &mut alerts_created, &mut alerts_escalated);
        }

        Ok(DetectRunSummary {
            sensors_analyzed,
            clusters_detected: clusters.len(),
            alerts_created,
            alerts_escalated,
            execution_time_s: start.elapsed().as_secs_f64(),
            stale_sensors,
        })
    }

    fn process_individual(&self, analysis: &SensorAnalysis) -> Option<EnsureOutcome> {
        let lat = analysis.reading.latitude;
        let lon = analysis.reading.longitude;
        let location = geocode::resolve_location(self.geocoder, lat, lon);
        let context =
            build_context(&analysis.sensor_id, std::slice::from_ref(analysis), analysis.composite_risk, analysis.zone_context.as_ref(), &location.label);

        let assessment = match self.llm.assess_risk(&context, self.config.llm_max_tokens, self.config.llm_temperature) {
            Ok(a) => a,
            Err(e) => {
                log::warn!("detect_run: llm assess_risk failed for sensor {}: {e}", analysis.sensor_id);
                return None;
            }
        };

        let risk_level = map_risk_level(assessment.risk_level);
        let narrative = if risk_level.ordinal() >= RiskLevel::Orange.ordinal() {
            self.llm.generate_narrative(&assessment, &location.label).unwrap_or_default()
        } else {
            String::new()
        };

        let detection = Detection {
            detection_type: DetectionType::Individual,
            sensors_affected: vec![analysis.sensor_id.clone()],
            representative_sensor_id: analysis.sensor_id.clone(),
            risk_level,
            confidence: assessment.confidence,
            llm_reasoning: assessment.reasoning.clone(),
            trigger_factors: assessment.trigger_factors.clone(),
            recommended_action: recommended_action_str(assessment.recommended_action).to_string(),
            time_to_failure: map_time_to_failure(assessment.time_to_failure_estimate),
            narrative,
            center_location: (lat, lon),
            resolved_location: Some(location),
            zone_snapshot: analysis.zone_context.clone(),
        };

        match self.alert_manager.ensure_alert(&detection, self.config.alert_ttl_seconds) {
            Ok((_, outcome)) => Some(outcome),
            Err(e) => {
                log::warn!("detect_run: ensure_alert failed for sensor {}: {e}", analysis.sensor_id);
                None
            }
        }
    }

    fn process_cluster(&self, cluster: &Cluster, fused: &[SensorAnalysis]) -> Option<EnsureOutcome> {
        let representative_id = cluster.member_ids.first()?.clone();
        let representative = fused.iter().find(|a| a.sensor_id == representative_id)?;
        let lat = cluster.centroid_lat;
        let lon = cluster.centroid_lon;
        let location = geocode::resolve_location(self.geocoder, lat, lon);

        let members: Vec<SensorAnalysis> =
            cluster.member_ids.iter().filter_map(|id| fused.iter().find(|a| &a.sensor_id == id).cloned()).collect();
        let context = build_context(&representative_id, &members, cluster.avg_composite_risk, representative.zone_context.as_ref(), &location.label);

        let assessment = match self.llm.assess_risk(&context, self.config.llm_max_tokens, self.config.llm_temperature) {
            Ok(a) => a,
            Err(e) => {
                log::warn!("detect_run: llm assess_risk failed for cluster {representative_id}: {e}");
                return None;
            }
        };

        let risk_level = map_risk_level(assessment.risk_level);
        let narrative = if risk_level.ordinal() >= RiskLevel::Orange.ordinal() {
            self.llm.generate_narrative(&assessment, &location.label).unwrap_or_default()
        } else {
            String::new()
        };

        let detection = Detection {
            detection_type: DetectionType::Cluster,
            sensors_affected: cluster.member_ids.clone(),
            representative_sensor_id: representative_id.clone(),
            risk_level,
            confidence: assessment.confidence,
            llm_reasoning: assessment.reasoning.clone(),
            trigger_factors: assessment.trigger_factors.clone(),
            recommended_action: recommended_action_str(assessment.recommended_action).to_string(),
            time_to_failure: map_time_to_failure(assessment.time_to_failure_estimate),
            narrative,
            center_location: (lat, lon),
            resolved_location: Some(location),
            zone_snapshot: representative.zone_context.clone(),
        };

        match self.alert_manager.ensure_alert(&detection, self.config.alert_ttl_seconds) {
            Ok((_, outcome)) => Some(outcome),
            Err(e) => {
                log::warn!("detect_run: ensure_alert failed for cluster {representative_id}: {e}");
                None
            }
        }
    }
}
