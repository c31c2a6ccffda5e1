//! Configuration surface (spec §6). Every parameter that affects core
//! behaviour is enumerated here and supplied at construction time — no
//! magic reads inside the core.
//!
//! Loaded from a TOML file the same way the teacher's station registry
//! loads from `stations.toml`, except every value here has a sensible
//! default so a deployment can override only what it needs to.

use std::collections::HashMap;
use std::fs;

use serde::Deserialize;

/// Geohash precision used for zone-index cells vs. fine enrichment.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
pub struct GeohashPrecision {
    pub zone_cell: usize,
    pub fine_enrichment: usize,
}

impl Default for GeohashPrecision {
    fn default() -> Self {
        Self { zone_cell: 4, fine_enrichment: 6 }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OpenLewsConfig {
    /// Composite-risk cut for alerting.
    pub risk_threshold: f64,
    /// Fusion neighbourhood radius, metres.
    pub correlation_radius_m: f64,
    /// Cluster single-linkage radius, metres.
    pub cluster_radius_m: f64,
    /// Minimum connected-component size to emit a cluster.
    pub min_cluster_size: usize,
    /// Detection window, seconds.
    pub window_seconds: i64,
    /// Default max distance for `nearest`, km.
    pub max_distance_km: f64,
    /// Default radius for `within_radius`, km.
    pub radius_km: f64,
    pub geohash_precision: GeohashPrecision,

    pub llm_model_id: String,
    pub llm_max_tokens: u32,
    pub llm_temperature: f64,
    pub llm_top_p: f64,
    pub llm_max_attempts: u32,
    pub llm_backoff_base_s: f64,

    /// Alert TTL, seconds (`created_at + alert_ttl_seconds`).
    pub alert_ttl_seconds: i64,
    /// Dedup/escalation lookback window, seconds.
    pub alert_dedup_window_s: i64,
    /// Grace period before an unescalated active alert expires, seconds.
    pub alert_expiry_grace_s: i64,

    pub enable_enrichment: bool,
    pub enable_event_publish: bool,

    /// Soil type -> baseline critical-moisture percent.
    pub hazard_defaults: HashMap<String, f64>,

    /// §9 open question: whether `safety_factor == 0` should be treated as
    /// "most dangerous" (`true`) instead of the spec's default of
    /// "unknown, contributes 0" (`false`).
    pub safety_factor_zero_is_critical: bool,

    /// Bounded fan-out for per-item I/O within a run.
    pub max_parallel_io: usize,
}

impl Default for OpenLewsConfig {
    fn default() -> Self {
        let mut hazard_defaults = HashMap::new();
        hazard_defaults.insert("Colluvium".to_string(), 35.0);
        hazard_defaults.insert("Residual".to_string(), 45.0);
        hazard_defaults.insert("Fill".to_string(), 30.0);
        hazard_defaults.insert("Bedrock".to_string(), 60.0);

        Self {
            risk_threshold: 0.6,
            correlation_radius_m: 50.0,
            cluster_radius_m: 50.0,
            min_cluster_size: 3,
            window_seconds: 24 * 3600,
            max_distance_km: 5.0,
            radius_km: 1.0,
            geohash_precision: GeohashPrecision::default(),

            llm_model_id: "default-risk-model".to_string(),
            llm_max_tokens: 800,
            llm_temperature: 0.2,
            llm_top_p: 0.9,
            llm_max_attempts: 6,
            llm_backoff_base_s: 0.6,

            alert_ttl_seconds: 30 * 86_400,
            alert_dedup_window_s: 6 * 3600,
            alert_expiry_grace_s: 24 * 3600,

            enable_enrichment: true,
            enable_event_publish: true,

            hazard_defaults,
            safety_factor_zero_is_critical: false,
            max_parallel_io: 8,
        }
    }
}

impl OpenLewsConfig {
    /// Loads configuration from a TOML file, falling back to defaults for
    /// any key the file omits.
    ///
    /// # Panics
    /// Panics if the file exists but fails to parse — a malformed config
    /// file should stop the service at startup, not silently degrade.
    pub fn load(path: &str) -> Self {
        let contents = fs::read_to_string(path).unwrap_or_default();
        if contents.trim().is_empty() {
            return Self::default();
        }
        toml::from_str(&contents).unwrap_or_else(|e| panic!("Failed to parse {path}: {e}"))
    }

    pub fn default_critical_moisture(&self, soil_type: &str) -> f64 {
        *self.hazard_defaults.get(soil_type).unwrap_or(&40.0)
    }
}
