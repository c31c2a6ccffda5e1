//! Hazard-zone index — the RAG (retrieval-augmented) query service.
//!
//! Keyed store of zones with a secondary index on geohash4 prefix. The
//! core never writes zones (they're assumed pre-loaded by an external
//! offline pipeline); this module only answers `nearest`, `within_radius`,
//! and `find_by_geohash4` queries plus the `critical_moisture` derivation.

use std::collections::HashMap;

use crate::geohash;
use crate::geomath::{bbox_contains, haversine_m};
use crate::model::{HazardLevel, HazardZone};

/// In-memory secondary index over zones, keyed by `geohash4`. A real
/// deployment backs `find_by_geohash4` with the store adapter in
/// `store::postgres`; this struct is the pure, I/O-free query logic shared
/// by every backing.
#[derive(Debug, Clone, Default)]
pub struct ZoneIndex {
    by_geohash4: HashMap<String, Vec<HazardZone>>,
}

#[derive(Debug, Clone, Default)]
pub struct HazardLevelHistogram {
    pub very_high: usize,
    pub high: usize,
    pub moderate: usize,
    pub low: usize,
    pub unknown: usize,
}

impl HazardLevelHistogram {
    fn record(&mut self, level: HazardLevel) {
        match level {
            HazardLevel::VeryHigh => self.very_high += 1,
            HazardLevel::High => self.high += 1,
            HazardLevel::Moderate => self.moderate += 1,
            HazardLevel::Low => self.low += 1,
            HazardLevel::Unknown => self.unknown += 1,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RadiusResult {
    pub zones: Vec<HazardZone>,
    pub count: usize,
    pub summary: HazardLevelHistogram,
}

impl ZoneIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, zone: HazardZone) {
        self.by_geohash4.entry(zone.geohash4.clone()).or_default().push(zone);
    }

    /// `find_by_geohash4(cell) -> [Zone]` — the store-interface contract
    /// (spec §6). No writes from the core.
    pub fn find_by_geohash4(&self, cell: &str) -> Vec<HazardZone> {
        self.by_geohash4.get(cell).cloned().unwrap_or_default()
    }

    /// The raw 9-cell (self + 8 neighbours) candidate list for `(lat, lon)`,
    /// deduplicated by zone id. Exposed so callers that need to cache
    /// candidates per-run (the enricher, spec §4.4/§5) can do so without
    /// baking in a resolved containment decision.
    pub fn candidates_in_neighbourhood(&self, lat: f64, lon: f64, precision: usize) -> Vec<HazardZone> {
        let cell = geohash::encode(lat, lon, precision);
        let ring = geohash::neighbours8(&cell);
        let mut seen_ids = std::collections::HashSet::new();
        let mut out = Vec::new();
        for c in ring {
            for zone in self.find_by_geohash4(&c) {
                if seen_ids.insert(zone.zone_id.clone()) {
                    out.push(zone);
                }
            }
        }
        out
    }

    /// Distance from `(lat, lon)` to a zone: 0 if the query point falls
    /// inside the zone's bounding box, else the Haversine distance to the
    /// zone's centroid.
    fn distance_to_zone(lat: f64, lon: f64, zone: &HazardZone) -> f64 {
        if bbox_contains(&zone.bounding_box, lat, lon) {
            0.0
        } else {
            haversine_m(lat, lon, zone.centroid_lat, zone.centroid_lon)
        }
    }

    /// `nearest(lat, lon, max_km) -> Zone | null`.
    pub fn nearest(&self, lat: f64, lon: f64, max_km: f64, geohash_precision: usize) -> Option<HazardZone> {
        let candidates = self.candidates_in_neighbourhood(lat, lon, geohash_precision);
        let max_m = max_km * 1000.0;

        let mut best: Option<(f64, HazardZone)> = None;
        for zone in candidates {
            let d = Self::distance_to_zone(lat, lon, &zone);
            if d > max_m {
                continue;
            }
            best = match best {
                None => Some((d, zone)),
                Some((best_d, best_zone)) => {
                    if d < best_d || (d == best_d && zone.hazard_level > best_zone.hazard_level) {
                        Some((d, zone))
                    } else {
                        Some((best_d, best_zone))
                    }
                }
            };
        }
        best.map(|(_, z)| z)
    }

    /// `within_radius(lat, lon, km) -> ([Zone], count, summary)`.
    pub fn within_radius(&self, lat: f64, lon: f64, km: f64, geohash_precision: usize) -> RadiusResult {
        let candidates = self.candidates_in_neighbourhood(lat, lon, geohash_precision);
        let max_m = km * 1000.0;

        let mut survivors: Vec<(f64, HazardZone)> = candidates
            .into_iter()
            .map(|z| (Self::distance_to_zone(lat, lon, &z), z))
            .filter(|(d, _)| *d <= max_m)
            .collect();
        survivors.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap());

        let mut summary = HazardLevelHistogram::default();
        let zones: Vec<HazardZone> = survivors
            .into_iter()
            .map(|(_, z)| {
                summary.record(z.hazard_level);
                z
            })
            .collect();

        RadiusResult { count: zones.len(), summary, zones }
    }

    /// Candidates whose bounding box contains `(lat, lon)`, i.e. the
    /// "containing zones" used by the enricher (spec §4.4). Falls back to
    /// the empty vec if none contain the point — callers should then use
    /// `nearest` for a best-effort match.
    pub fn containing(&self, lat: f64, lon: f64, geohash_precision: usize) -> Vec<HazardZone> {
        self.candidates_in_neighbourhood(lat, lon, geohash_precision)
            .into_iter()
            .filter(|z| bbox_contains(&z.bounding_box, lat, lon))
            .collect()
    }
}

/// Derives a site-specific critical-moisture threshold (spec §4.3).
///
/// Baseline by soil type (with `hazard_defaults` as the fallback table),
/// then adjusted by hazard level, then clamped to `[20, 80]`.
pub fn critical_moisture(zone: &HazardZone, hazard_defaults: &HashMap<String, f64>) -> f64 {
    let baseline = *hazard_defaults.get(&zone.soil_type).unwrap_or(&40.0);
    let adjustment = match zone.hazard_level {
        HazardLevel::VeryHigh => -5.0,
        HazardLevel::High => -2.0,
        HazardLevel::Moderate => 0.0,
        HazardLevel::Low => 5.0,
        HazardLevel::Unknown => 0.0,
    };
    (baseline + adjustment).clamp(20.0, 80.0)
}
