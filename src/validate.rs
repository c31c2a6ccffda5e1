//! Reading validation (spec §4.2). Runs before enrichment and scoring;
//! rejects are counted but never abort a batch.

use thiserror::Error;

use crate::model::Reading;

#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("missing field: {0}")]
    MissingField(&'static str),

    #[error("{field} out of range: {value} not in [{min}, {max}]")]
    OutOfRange { field: &'static str, value: f64, min: f64, max: f64 },

    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),

    #[error("sensor_id too short: {0:?}")]
    ShortIdentifier(String),
}

const MIN_SENSOR_ID_LEN: usize = 3;

fn check_range(field: &'static str, value: f64, min: f64, max: f64) -> Result<(), ValidationError> {
    if value.is_nan() || value < min || value > max {
        return Err(ValidationError::OutOfRange { field, value, min, max });
    }
    Ok(())
}

/// Validates a reading's structural and range constraints.
///
/// Does not touch zone context or scoring — purely a gate on whether the
/// reading is well-formed enough to be stored and analyzed.
pub fn validate(reading: &Reading) -> Result<(), ValidationError> {
    if reading.sensor_id.trim().is_empty() {
        return Err(ValidationError::MissingField("sensor_id"));
    }
    if reading.sensor_id.trim().len() < MIN_SENSOR_ID_LEN {
        return Err(ValidationError::ShortIdentifier(reading.sensor_id.clone()));
    }
    if reading.timestamp <= 0 {
        return Err(ValidationError::InvalidTimestamp(reading.timestamp.to_string()));
    }

    check_range("latitude", reading.latitude, -90.0, 90.0)?;
    check_range("longitude", reading.longitude, -180.0, 180.0)?;
    check_range("moisture_percent", reading.moisture_percent, 0.0, 100.0)?;
    check_range("tilt_x_degrees", reading.tilt_x_degrees, -30.0, 30.0)?;
    check_range("tilt_y_degrees", reading.tilt_y_degrees, -30.0, 30.0)?;
    check_range("tilt_rate_mm_hr", reading.tilt_rate_mm_hr, 0.0, 50.0)?;
    check_range("pore_pressure_kpa", reading.pore_pressure_kpa, -100.0, 50.0)?;
    check_range("vibration_count", reading.vibration_count, 0.0, 1000.0)?;
    check_range("safety_factor", reading.safety_factor, 0.0, 10.0)?;
    check_range("battery_percent", reading.battery_percent, 0.0, 100.0)?;
    check_range("temperature_c", reading.temperature_c, -10.0, 50.0)?;

    if let Some(b) = reading.vibration_baseline {
        check_range("vibration_baseline", b, 0.0, f64::MAX)?;
    }
    if let Some(r) = reading.rainfall_24h_mm {
        check_range("rainfall_24h_mm", r, 0.0, f64::MAX)?;
    }

    Ok(())
}

/// Normalizes a timestamp field that may arrive as ISO-8601 or epoch
/// seconds, returning epoch seconds.
pub fn normalize_timestamp(raw: &str) -> Result<i64, ValidationError> {
    if let Ok(epoch) = raw.parse::<i64>() {
        return Ok(epoch);
    }
    chrono::DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.timestamp())
        .map_err(|_| ValidationError::InvalidTimestamp(raw.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Reading {
        Reading {
            sensor_id: "SENSOR_001".to_string(),
            timestamp: 1_735_430_400,
            latitude: 6.85,
            longitude: 80.93,
            geohash: "tc1xyz".to_string(),
            moisture_percent: 75.5,
            tilt_x_degrees: 1.0,
            tilt_y_degrees: 1.0,
            tilt_rate_mm_hr: 0.5,
            pore_pressure_kpa: 10.0,
            vibration_count: 2.0,
            vibration_baseline: Some(1.0),
            safety_factor: 1.5,
            rainfall_24h_mm: Some(20.0),
            battery_percent: 90.0,
            temperature_c: 25.0,
            zone_ref: None,
            enriched: false,
            ingested_at: None,
            expiry: None,
        }
    }

    #[test]
    fn accepts_well_formed_reading() {
        assert!(validate(&sample()).is_ok());
    }

    #[test]
    fn rejects_empty_sensor_id() {
        let mut r = sample();
        r.sensor_id = "".to_string();
        assert_eq!(validate(&r), Err(ValidationError::MissingField("sensor_id")));
    }

    #[test]
    fn rejects_short_sensor_id() {
        let mut r = sample();
        r.sensor_id = "AB".to_string();
        assert!(matches!(validate(&r), Err(ValidationError::ShortIdentifier(_))));
    }

    #[test]
    fn rejects_out_of_range_latitude() {
        let mut r = sample();
        r.latitude = 200.0;
        assert!(matches!(
            validate(&r),
            Err(ValidationError::OutOfRange { field: "latitude", .. })
        ));
    }

    #[test]
    fn rejects_negative_moisture() {
        let mut r = sample();
        r.moisture_percent = -1.0;
        assert!(matches!(
            validate(&r),
            Err(ValidationError::OutOfRange { field: "moisture_percent", .. })
        ));
    }

    #[test]
    fn rejects_nonpositive_timestamp() {
        let mut r = sample();
        r.timestamp = 0;
        assert!(matches!(validate(&r), Err(ValidationError::InvalidTimestamp(_))));
    }

    #[test]
    fn normalize_timestamp_accepts_epoch_and_rfc3339() {
        assert_eq!(normalize_timestamp("1735430400").unwrap(), 1_735_430_400);
        let ts = normalize_timestamp("2024-12-29T00:00:00Z").unwrap();
        assert_eq!(ts, 1_735_430_400);
    }

    #[test]
    fn normalize_timestamp_rejects_garbage() {
        assert!(normalize_timestamp("not-a-date").is_err());
    }

    #[test]
    fn rejects_tilt_rate_above_50() {
        let mut r = sample();
        r.tilt_rate_mm_hr = 100.0;
        assert!(matches!(
            validate(&r),
            Err(ValidationError::OutOfRange { field: "tilt_rate_mm_hr", .. })
        ));
    }

    #[test]
    fn accepts_negative_pore_pressure_as_suction() {
        let mut r = sample();
        r.pore_pressure_kpa = -50.0;
        assert!(validate(&r).is_ok());
    }

    #[test]
    fn rejects_pore_pressure_above_50() {
        let mut r = sample();
        r.pore_pressure_kpa = 100.0;
        assert!(matches!(
            validate(&r),
            Err(ValidationError::OutOfRange { field: "pore_pressure_kpa", .. })
        ));
    }

    #[test]
    fn rejects_vibration_count_above_1000() {
        let mut r = sample();
        r.vibration_count = 1500.0;
        assert!(matches!(
            validate(&r),
            Err(ValidationError::OutOfRange { field: "vibration_count", .. })
        ));
    }

    #[test]
    fn rejects_temperature_outside_minus10_to_50() {
        let mut r = sample();
        r.temperature_c = 60.0;
        assert!(matches!(
            validate(&r),
            Err(ValidationError::OutOfRange { field: "temperature_c", .. })
        ));
    }

    #[test]
    fn rejects_negative_vibration_baseline() {
        let mut r = sample();
        r.vibration_baseline = Some(-1.0);
        assert!(matches!(
            validate(&r),
            Err(ValidationError::OutOfRange { field: "vibration_baseline", .. })
        ));
    }

    #[test]
    fn accepts_rainfall_with_no_upper_bound() {
        let mut r = sample();
        r.rainfall_24h_mm = Some(5000.0);
        assert!(validate(&r).is_ok());
    }
}
