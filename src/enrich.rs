//! Reading enrichment (spec §4.4): attaches hazard-zone context to a
//! validated reading, best-effort. A reading that can't be enriched is
//! still stored — `enriched` stays `false` and downstream scoring falls
//! back to the global soil default.

use std::collections::HashMap;

use crate::geomath::{bbox_contains, haversine_m};
use crate::model::{HazardZone, Reading};
use crate::zones::ZoneIndex;

/// Per-run cache keyed by geohash4 cell, holding the raw 9-cell candidate
/// list (spec §4.4/§5: cache the candidates, not the resolved zone) so a
/// batch of readings clustered in the same area doesn't re-query the index
/// for every reading. Containment still has to be recomputed per reading
/// against the cached candidates: two readings sharing a cell can fall in
/// different zones' bounding boxes within that ~39km x 19km cell.
#[derive(Debug, Default)]
pub struct EnrichmentCache {
    by_cell: HashMap<String, Vec<HazardZone>>,
}

impl EnrichmentCache {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Picks the best zone for `(lat, lon)` among `candidates`: containing
/// zones first (highest hazard_level, ties broken by minimal distance to
/// centroid), else falls back to nearest-within-`max_km`.
fn resolve_zone(candidates: &[HazardZone], lat: f64, lon: f64, max_km: f64) -> Option<HazardZone> {
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
        .iter()
        .map(|z| (haversine_m(lat, lon, z.centroid_lat, z.centroid_lon), z))
        .filter(|(d, _)| *d <= max_m)
        .min_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(_, z)| z.clone())
}

/// Enriches `reading` in place, using and populating `cache` for its run.
pub fn enrich(
    reading: &mut Reading,
    index: &ZoneIndex,
    cache: &mut EnrichmentCache,
    zone_precision: usize,
    max_km: f64,
) {
    let cell = reading.geohash4().to_string();
    let candidates = cache
        .by_cell
        .entry(cell)
        .or_insert_with(|| index.candidates_in_neighbourhood(reading.latitude, reading.longitude, zone_precision));

    match resolve_zone(candidates, reading.latitude, reading.longitude, max_km) {
        Some(z) => {
            reading.zone_ref = Some(z);
            reading.enriched = true;
        }
        None => {
            reading.zone_ref = None;
            reading.enriched = false;
        }
    }
}
