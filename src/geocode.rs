//! Reverse-geocoder interface (spec §6, §9 open question). Optional by
//! design: the core never depends on a specific provider, and the
//! `NullGeocoder` fallback keeps every code path exercisable offline.

use thiserror::Error;

use crate::model::ResolvedLocation;

#[derive(Debug, Error)]
pub enum GeocodeError {
    #[error("reverse geocode failed: {0}")]
    Failed(String),
}

pub trait Geocoder {
    fn reverse(&self, lat: f64, lon: f64) -> Result<ResolvedLocation, GeocodeError>;
}

/// Synthesises `{label: "lat,lon", url: deterministic map URL}` — the
/// fallback the spec mandates when reverse-geocoding is unavailable or
/// disabled.
pub struct NullGeocoder;

impl Geocoder for NullGeocoder {
    fn reverse(&self, lat: f64, lon: f64) -> Result<ResolvedLocation, GeocodeError> {
        Ok(fallback_location(lat, lon))
    }
}

pub fn fallback_location(lat: f64, lon: f64) -> ResolvedLocation {
    ResolvedLocation {
        label: format!("{lat:.5},{lon:.5}"),
        address: None,
        url: Some(format!("https://www.openstreetmap.org/?mlat={lat:.5}&mlon={lon:.5}#map=16")),
    }
}

/// Best-effort reverse-geocode: falls back to the synthesised location on
/// any failure rather than propagating the error (spec §7:
/// `LocationResolveError` never costs an alert).
pub fn resolve_location<G: Geocoder>(geocoder: &G, lat: f64, lon: f64) -> ResolvedLocation {
    geocoder.reverse(lat, lon).unwrap_or_else(|_| fallback_location(lat, lon))
}
