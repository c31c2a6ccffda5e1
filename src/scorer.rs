//! Per-sensor risk scorer (spec §4.5). Pure function of a reading plus an
//! optional zone snapshot — no I/O, no clock.

use crate::config::OpenLewsConfig;
use crate::model::{HazardZone, Reading};
use crate::zones::critical_moisture;

const WEIGHT_MOISTURE: f64 = 0.35;
const WEIGHT_TILT_VELOCITY: f64 = 0.25;
const WEIGHT_VIBRATION: f64 = 0.15;
const WEIGHT_PORE_PRESSURE: f64 = 0.15;
const WEIGHT_SAFETY_FACTOR: f64 = 0.10;

/// Linear interpolation of `x` between breakpoints `(x0, y0)` and `(x1,
/// y1)`, clamped to `[y0, y1]` (or `[y1, y0]` if descending) outside the
/// breakpoint range. Used for every component's piecewise-linear shape.
fn lerp_clamped(x: f64, x0: f64, y0: f64, x1: f64, y1: f64) -> f64 {
    if x <= x0 {
        return y0;
    }
    if x >= x1 {
        return y1;
    }
    y0 + (y1 - y0) * (x - x0) / (x1 - x0)
}

fn moisture_score(moisture_percent: f64, critical: f64) -> f64 {
    let onset = 0.6 * critical;
    lerp_clamped(moisture_percent, onset, 0.0, critical, 1.0).clamp(0.0, 1.0)
}

fn tilt_velocity_score(tilt_rate_mm_hr: f64) -> f64 {
    if tilt_rate_mm_hr <= 1.0 {
        0.0
    } else if tilt_rate_mm_hr <= 5.0 {
        lerp_clamped(tilt_rate_mm_hr, 1.0, 0.0, 5.0, 0.5)
    } else if tilt_rate_mm_hr <= 10.0 {
        lerp_clamped(tilt_rate_mm_hr, 5.0, 0.5, 10.0, 1.0)
    } else {
        1.0
    }
}

fn vibration_score(vibration_count: f64, vibration_baseline: Option<f64>) -> f64 {
    let baseline = vibration_baseline.unwrap_or(0.0).max(1.0);
    let r = vibration_count / baseline;
    if r <= 2.0 {
        0.0
    } else if r <= 5.0 {
        lerp_clamped(r, 2.0, 0.0, 5.0, 0.5)
    } else if r <= 10.0 {
        lerp_clamped(r, 5.0, 0.5, 10.0, 1.0)
    } else {
        1.0
    }
}

fn pore_pressure_score(pore_pressure_kpa: f64) -> f64 {
    if pore_pressure_kpa <= 0.0 {
        0.0
    } else if pore_pressure_kpa <= 5.0 {
        lerp_clamped(pore_pressure_kpa, 0.0, 0.0, 5.0, 0.5)
    } else if pore_pressure_kpa <= 10.0 {
        lerp_clamped(pore_pressure_kpa, 5.0, 0.5, 10.0, 1.0)
    } else {
        1.0
    }
}

fn safety_factor_score(safety_factor: f64, zero_is_critical: bool) -> f64 {
    if safety_factor == 0.0 {
        return if zero_is_critical { 1.0 } else { 0.0 };
    }
    if safety_factor >= 1.5 {
        0.0
    } else if safety_factor >= 1.2 {
        lerp_clamped(safety_factor, 1.5, 0.0, 1.2, 0.5)
    } else if safety_factor >= 1.0 {
        lerp_clamped(safety_factor, 1.2, 0.5, 1.0, 1.0)
    } else {
        1.0
    }
}

fn rainfall_amplifier(rainfall_24h_mm: Option<f64>) -> f64 {
    let r = match rainfall_24h_mm {
        Some(r) => r,
        None => return 1.0,
    };
    if r >= 200.0 {
        1.5
    } else if r >= 150.0 {
        1.3
    } else if r >= 100.0 {
        1.2
    } else if r >= 75.0 {
        1.1
    } else {
        1.0
    }
}

/// Computes `base_risk ∈ [0,1]` for one reading, using `zone` (if present)
/// to derive the critical-moisture threshold; falls back to the config's
/// global soil default when there's no zone context.
pub fn base_risk(reading: &Reading, zone: Option<&HazardZone>, config: &OpenLewsConfig) -> f64 {
    let critical = match zone {
        Some(z) => critical_moisture(z, &config.hazard_defaults),
        None => config.default_critical_moisture("default"),
    };

    let s_moisture = moisture_score(reading.moisture_percent, critical);
    let s_tilt = tilt_velocity_score(reading.tilt_rate_mm_hr);
    let s_vibration = vibration_score(reading.vibration_count, reading.vibration_baseline);
    let s_pore = pore_pressure_score(reading.pore_pressure_kpa);
    let s_safety = safety_factor_score(reading.safety_factor, config.safety_factor_zero_is_critical);

    let weighted = WEIGHT_MOISTURE * s_moisture
        + WEIGHT_TILT_VELOCITY * s_tilt
        + WEIGHT_VIBRATION * s_vibration
        + WEIGHT_PORE_PRESSURE * s_pore
        + WEIGHT_SAFETY_FACTOR * s_safety;

    let amplified = weighted * rainfall_amplifier(reading.rainfall_24h_mm);
    amplified.clamp(0.0, 1.0)
}

/// Derives the critical-moisture percent used for a reading's scoring,
/// exposed so `SensorAnalysis.critical_moisture_percent` can record it
/// without recomputing the scorer internals.
pub fn critical_moisture_for(zone: Option<&HazardZone>, config: &OpenLewsConfig) -> f64 {
    match zone {
        Some(z) => critical_moisture(z, &config.hazard_defaults),
        None => config.default_critical_moisture("default"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_reading() -> Reading {
        Reading {
            sensor_id: "SENSOR_001".to_string(),
            timestamp: 1_735_430_400,
            latitude: 6.85,
            longitude: 80.93,
            geohash: "tc1xyz".to_string(),
            moisture_percent: 20.0,
            tilt_x_degrees: 0.0,
            tilt_y_degrees: 0.0,
            tilt_rate_mm_hr: 0.0,
            pore_pressure_kpa: 0.0,
            vibration_count: 0.0,
            vibration_baseline: Some(1.0),
            safety_factor: 2.0,
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
    fn base_risk_is_zero_for_entirely_benign_reading() {
        let config = OpenLewsConfig::default();
        let risk = base_risk(&sample_reading(), None, &config);
        assert_eq!(risk, 0.0);
    }

    #[test]
    fn base_risk_is_one_for_maximal_reading() {
        let config = OpenLewsConfig::default();
        let mut r = sample_reading();
        r.moisture_percent = 100.0;
        r.tilt_rate_mm_hr = 20.0;
        r.vibration_count = 50.0;
        r.vibration_baseline = Some(1.0);
        r.pore_pressure_kpa = 20.0;
        r.safety_factor = 0.5;
        let risk = base_risk(&r, None, &config);
        assert!((risk - 1.0).abs() < 1e-9);
    }

    #[test]
    fn moisture_component_is_monotonic_in_moisture() {
        let config = OpenLewsConfig::default();
        let mut prev = 0.0;
        for m in [0.0, 10.0, 20.0, 30.0, 40.0, 50.0, 60.0, 100.0] {
            let mut r = sample_reading();
            r.moisture_percent = m;
            let risk = base_risk(&r, None, &config);
            assert!(risk >= prev - 1e-12, "risk decreased at moisture={m}");
            prev = risk;
        }
    }

    #[test]
    fn tilt_velocity_component_is_monotonic() {
        let config = OpenLewsConfig::default();
        let mut prev = 0.0;
        for t in [0.0, 1.0, 2.0, 5.0, 7.0, 10.0, 15.0] {
            let mut r = sample_reading();
            r.tilt_rate_mm_hr = t;
            let risk = base_risk(&r, None, &config);
            assert!(risk >= prev - 1e-12, "risk decreased at tilt_rate={t}");
            prev = risk;
        }
    }

    #[test]
    fn pore_pressure_component_is_monotonic() {
        let config = OpenLewsConfig::default();
        let mut prev = 0.0;
        for p in [-50.0, 0.0, 2.0, 5.0, 8.0, 10.0, 20.0] {
            let mut r = sample_reading();
            r.pore_pressure_kpa = p;
            let risk = base_risk(&r, None, &config);
            assert!(risk >= prev - 1e-12, "risk decreased at pore_pressure={p}");
            prev = risk;
        }
    }

    #[test]
    fn safety_factor_component_increases_as_factor_drops() {
        let config = OpenLewsConfig::default();
        let mut prev = 0.0;
        // descending safety factor should be monotonically *non-decreasing* risk
        for sf in [2.0, 1.5, 1.3, 1.2, 1.1, 1.0] {
            let mut r = sample_reading();
            r.safety_factor = sf;
            let risk = base_risk(&r, None, &config);
            assert!(risk >= prev - 1e-12, "risk decreased at safety_factor={sf}");
            prev = risk;
        }
    }

    #[test]
    fn safety_factor_zero_is_treated_as_missing_by_default() {
        let config = OpenLewsConfig::default();
        let mut r = sample_reading();
        r.safety_factor = 0.0;
        assert_eq!(safety_factor_score(r.safety_factor, config.safety_factor_zero_is_critical), 0.0);
    }

    #[test]
    fn safety_factor_zero_can_be_flipped_to_critical_via_config() {
        let mut config = OpenLewsConfig::default();
        config.safety_factor_zero_is_critical = true;
        assert_eq!(safety_factor_score(0.0, config.safety_factor_zero_is_critical), 1.0);
    }

    #[test]
    fn rainfall_amplifier_steps_match_spec_bands() {
        assert_eq!(rainfall_amplifier(None), 1.0);
        assert_eq!(rainfall_amplifier(Some(10.0)), 1.0);
        assert_eq!(rainfall_amplifier(Some(75.0)), 1.1);
        assert_eq!(rainfall_amplifier(Some(100.0)), 1.2);
        assert_eq!(rainfall_amplifier(Some(150.0)), 1.3);
        assert_eq!(rainfall_amplifier(Some(200.0)), 1.5);
        assert_eq!(rainfall_amplifier(Some(500.0)), 1.5);
    }

    #[test]
    fn base_risk_is_deterministic() {
        let config = OpenLewsConfig::default();
        let r = sample_reading();
        let a = base_risk(&r, None, &config);
        let b = base_risk(&r, None, &config);
        assert_eq!(a, b);
    }

    #[test]
    fn base_risk_never_leaves_unit_interval() {
        let config = OpenLewsConfig::default();
        let mut r = sample_reading();
        r.moisture_percent = 100.0;
        r.tilt_rate_mm_hr = 50.0;
        r.vibration_count = 1000.0;
        r.pore_pressure_kpa = 50.0;
        r.safety_factor = 0.0;
        r.rainfall_24h_mm = Some(500.0);
        let risk = base_risk(&r, None, &config);
        assert!((0.0..=1.0).contains(&risk));
    }
}
