/// HTTP front door (spec §6): the reference ingest endpoint plus two
/// read-only query endpoints used by external dashboards.
///
/// Endpoints:
/// - POST /ingest            - submit a batch of telemetry readings
/// - GET  /alerts/{alert_id} - look up one alert by its dedup key
/// - GET  /zones/nearest     - nearest hazard zone to ?lat=&lon=
/// - GET  /health            - service health check
use std::io::Read as _;

use serde::{Deserialize, Serialize};

use crate::config::OpenLewsConfig;
use crate::events::EventBus;
use crate::ingest::{IngestHandler, IngestStatistics};
use crate::model::Reading;
use crate::store::{AlertStore, TelemetryStore};
use crate::zones::ZoneIndex;

#[derive(Debug, Deserialize)]
struct IngestRequest {
    telemetry: Vec<Reading>,
}

#[derive(Debug, Serialize)]
struct IngestResponse {
    message: String,
    statistics: IngestStatistics,
}

fn handle_ingest<T: TelemetryStore, B: EventBus>(
    body: &str,
    handler: &IngestHandler<'_, T, B>,
) -> tiny_http::Response<std::io::Cursor<Vec<u8>>> {
    let parsed: Result<IngestRequest, _> = serde_json::from_str(body);
    let request = match parsed {
        Ok(r) => r,
        Err(e) => {
            return create_response(400, serde_json::json!({ "error": format!("malformed request body: {e}") }));
        }
    };

    let statistics = handler.handle(request.telemetry);
    let status = if statistics.validation_errors > 0 && statistics.validated == 0 { 400 } else { 200 };
    let response = IngestResponse {
        message: format!("received {} reading(s), wrote {}", statistics.total_received, statistics.written),
        statistics,
    };
    create_response(status, serde_json::to_value(&response).unwrap())
}

fn handle_alert_lookup<S: AlertStore>(store: &S, alert_id: &str, lookback: std::time::Duration) -> tiny_http::Response<std::io::Cursor<Vec<u8>>> {
    match store.get_active_by_prefix(alert_id, lookback) {
        Ok(Some(alert)) => create_response(200, serde_json::to_value(&alert).unwrap()),
        Ok(None) => create_response(404, serde_json::json!({ "error": "alert not found", "alert_id": alert_id })),
        Err(e) => create_response(500, serde_json::json!({ "error": e.to_string() })),
    }
}

fn handle_nearest_zone(zone_index: &ZoneIndex, query: &str, config: &OpenLewsConfig) -> tiny_http::Response<std::io::Cursor<Vec<u8>>> {
    let params = parse_query(query);
    let (lat, lon) = match (params.get("lat").and_then(|v| v.parse::<f64>().ok()), params.get("lon").and_then(|v| v.parse::<f64>().ok())) {
        (Some(lat), Some(lon)) => (lat, lon),
        _ => return create_response(400, serde_json::json!({ "error": "lat and lon query parameters are required" })),
    };

    match zone_index.nearest(lat, lon, config.max_distance_km, config.geohash_precision.zone_cell) {
        Some(zone) => create_response(200, serde_json::to_value(&zone).unwrap()),
        None => create_response(404, serde_json::json!({ "error": "no hazard zone within range", "lat": lat, "lon": lon })),
    }
}

fn parse_query(query: &str) -> std::collections::HashMap<String, String> {
    query
        .split('&')
        .filter_map(|pair| {
            let mut parts = pair.splitn(2, '=');
            let key = parts.next()?;
            let value = parts.next().unwrap_or("");
            Some((key.to_string(), urlencoding::decode(value).unwrap_or_default().into_owned()))
        })
        .collect()
}

fn handle_health() -> tiny_http::Response<std::io::Cursor<Vec<u8>>> {
    create_response(200, serde_json::json!({ "status": "ok", "service": "openlews", "version": env!("CARGO_PKG_VERSION") }))
}

fn create_response(status_code: u16, json: serde_json::Value) -> tiny_http::Response<std::io::Cursor<Vec<u8>>> {
    let body = serde_json::to_string_pretty(&json).unwrap();
    let bytes = body.into_bytes();

    tiny_http::Response::from_data(bytes)
        .with_status_code(tiny_http::StatusCode::from(status_code))
        .with_header(tiny_http::Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..]).unwrap())
}

/// Blocks the calling thread serving requests. Run it on a dedicated
/// thread from `daemon::run` alongside the detection ticker.
pub fn start_endpoint_server<T, S, B>(
    port: u16,
    telemetry: &T,
    zone_index: &ZoneIndex,
    alert_store: &S,
    bus: &B,
    config: &OpenLewsConfig,
) -> Result<(), String>
where
    T: TelemetryStore,
    S: AlertStore,
    B: EventBus,
{
    let server = tiny_http::Server::http(format!("0.0.0.0:{port}")).map_err(|e| format!("failed to start HTTP server: {e}"))?;
    log::info!("ingest endpoint listening on http://0.0.0.0:{port}");

    let handler = IngestHandler::new(telemetry, bus, zone_index, config);
    let alert_lookback = std::time::Duration::from_secs(config.alert_ttl_seconds.max(0) as u64);

    for mut request in server.incoming_requests() {
        let method = request.method().clone();
        let url = request.url().to_string();
        let (path, query) = url.split_once('?').map(|(p, q)| (p, q)).unwrap_or((url.as_str(), ""));

        let response = match (method, path) {
            (tiny_http::Method::Get, "/health") => handle_health(),
            (tiny_http::Method::Post, "/ingest") => {
                let mut body = String::new();
                if let Err(e) = request.as_reader().read_to_string(&mut body) {
                    create_response(400, serde_json::json!({ "error": format!("failed to read body: {e}") }))
                } else {
                    handle_ingest(&body, &handler)
                }
            }
            (tiny_http::Method::Get, "/zones/nearest") => handle_nearest_zone(zone_index, query, config),
            (tiny_http::Method::Get, p) if p.starts_with("/alerts/") => {
                let alert_id = p.trim_start_matches("/alerts/");
                handle_alert_lookup(alert_store, alert_id, alert_lookback)
            }
            _ => create_response(
                404,
                serde_json::json!({
                    "error": "not found",
                    "available_endpoints": ["POST /ingest", "GET /alerts/{alert_id}", "GET /zones/nearest", "GET /health"]
                }),
            ),
        };

        if let Err(e) = request.respond(response) {
            log::warn!("failed to send HTTP response: {e}");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_query_decodes_lat_lon() {
        let params = parse_query("lat=6.85&lon=80.93");
        assert_eq!(params.get("lat").unwrap(), "6.85");
        assert_eq!(params.get("lon").unwrap(), "80.93");
    }

    #[test]
    fn parse_query_handles_empty_string() {
        let params = parse_query("");
        assert!(params.is_empty());
    }
}
