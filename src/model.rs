//! Shared data types for the OpenLEWS core: `Reading`, `HazardZone`,
//! `SensorAnalysis`, `Cluster`, and `Alert`, plus the small enums each one
//! carries.
//!
//! `Reading` and `Alert` are durable (they cross the store boundary);
//! `SensorAnalysis` and `Cluster` are ephemeral and live only for the
//! duration of one `DetectRun`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Reading
// ---------------------------------------------------------------------------

/// A single sensor observation, validated and possibly enriched with
/// hazard-zone context.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Reading {
    pub sensor_id: String,
    /// Epoch seconds.
    pub timestamp: i64,
    pub latitude: f64,
    pub longitude: f64,
    pub geohash: String,

    pub moisture_percent: f64,
    pub tilt_x_degrees: f64,
    pub tilt_y_degrees: f64,
    pub tilt_rate_mm_hr: f64,
    pub pore_pressure_kpa: f64,
    pub vibration_count: f64,
    pub vibration_baseline: Option<f64>,
    pub safety_factor: f64,
    pub rainfall_24h_mm: Option<f64>,
    pub battery_percent: f64,
    pub temperature_c: f64,

    pub zone_ref: Option<HazardZone>,
    #[serde(default)]
    pub enriched: bool,

    /// Ingest-time stamp, set by the writer, not the caller.
    pub ingested_at: Option<DateTime<Utc>>,
    /// `ingested_at + 30 days`.
    pub expiry: Option<DateTime<Utc>>,
}

impl Reading {
    pub fn geohash4(&self) -> &str {
        &self.geohash[..self.geohash.len().min(4)]
    }

    pub fn geohash6(&self) -> &str {
        &self.geohash[..self.geohash.len().min(6)]
    }
}

// ---------------------------------------------------------------------------
// HazardZone
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum HazardLevel {
    Unknown,
    Low,
    Moderate,
    High,
    VeryHigh,
}

impl HazardLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            HazardLevel::Unknown => "Unknown",
            HazardLevel::Low => "Low",
            HazardLevel::Moderate => "Moderate",
            HazardLevel::High => "High",
            HazardLevel::VeryHigh => "VeryHigh",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HazardZone {
    pub zone_id: String,
    pub hazard_level: HazardLevel,
    pub centroid_lat: f64,
    pub centroid_lon: f64,
    pub geohash4: String,
    pub geohash6: String,
    pub bounding_box: BoundingBox,
    pub district: Option<String>,
    pub ds_division: Option<String>,
    pub gn_division: Option<String>,
    pub soil_type: String,
    pub land_use: String,
    pub landslide_type: String,
    pub area_sqm: f64,
    pub version: i32,
}

// ---------------------------------------------------------------------------
// SensorAnalysis / Cluster (ephemeral, one DetectRun)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct SensorAnalysis {
    pub sensor_id: String,
    pub reading: Reading,
    pub base_risk: f64,
    pub spatial_correlation: f64,
    pub composite_risk: f64,
    pub neighbour_ids: Vec<String>,
    pub zone_context: Option<HazardZone>,
    pub critical_moisture_percent: f64,
}

#[derive(Debug, Clone)]
pub struct Cluster {
    pub member_ids: Vec<String>,
    pub centroid_lat: f64,
    pub centroid_lon: f64,
    pub avg_composite_risk: f64,
    pub max_composite_risk: f64,
}

// ---------------------------------------------------------------------------
// Alert
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlertStatus {
    Active,
    Acknowledged,
    Resolved,
    Expired,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RiskLevel {
    Yellow,
    Orange,
    Red,
}

impl RiskLevel {
    pub fn ordinal(&self) -> u8 {
        match self {
            RiskLevel::Yellow => 0,
            RiskLevel::Orange => 1,
            RiskLevel::Red => 2,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Yellow => "Yellow",
            RiskLevel::Orange => "Orange",
            RiskLevel::Red => "Red",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeToFailure {
    Hours,
    Days,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DetectionType {
    Cluster,
    Individual,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResolvedLocation {
    pub label: String,
    pub address: Option<String>,
    pub url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EscalationEntry {
    pub ts: DateTime<Utc>,
    pub from_level: RiskLevel,
    pub to_level: RiskLevel,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Alert {
    pub alert_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub status: AlertStatus,
    pub risk_level: RiskLevel,
    pub confidence: f64,
    pub llm_reasoning: String,
    pub trigger_factors: Vec<String>,
    pub recommended_action: String,
    pub time_to_failure: TimeToFailure,
    /// Required (non-empty) for Orange/Red.
    pub narrative: String,
    pub detection_type: DetectionType,
    pub sensors_affected: Vec<String>,
    pub center_location: (f64, f64),
    pub resolved_location: Option<ResolvedLocation>,
    pub zone_snapshot: Option<HazardZone>,
    pub escalation_history: Vec<EscalationEntry>,
    /// `created_at + 30 days`.
    pub expiry: DateTime<Utc>,
}
