//! OpenLEWS — Landslide Early Warning Service
//!
//! A server-side daemon that:
//! 1. Validates database connectivity and schema on startup
//! 2. Serves the ingest HTTP front door (`POST /ingest`, `GET /health`,
//!    `GET /alerts/{alert_id}`, `GET /zones/nearest`)
//! 3. Periodically runs a full `DetectRun` pass and sweeps alert expiry
//!
//! Environment:
//!   DATABASE_URL - PostgreSQL connection string
//!   LLM_API_KEY / LLM_ENDPOINT - risk-assessment chat endpoint
//!   OPENLEWS_CONFIG - path to config.toml (default: ./config.toml)

use std::env;

use openlews::config::OpenLewsConfig;
use openlews::daemon::{Daemon, DaemonConfig};
use openlews::events::NullEventBus;
use openlews::geocode::NullGeocoder;
use openlews::llm::LlmClient;
use openlews::retry::RetryPolicy;
use openlews::store::memory::{InMemoryAlertStore, InMemoryTelemetryStore, InMemoryZoneStore};
use openlews::store::postgres::PostgresStore;
use openlews::zones::ZoneIndex;

mod http_llm_endpoint;
use http_llm_endpoint::HttpChatEndpoint;

fn main() {
    env_logger::init();
    dotenv::dotenv().ok();

    log::info!("OpenLEWS landslide early-warning service starting");

    let config_path = env::var("OPENLEWS_CONFIG").unwrap_or_else(|_| "config.toml".to_string());
    let config = OpenLewsConfig::load(&config_path);

    let http_port: u16 = env::var("OPENLEWS_PORT").ok().and_then(|p| p.parse().ok()).unwrap_or(8080);
    let detect_interval_seconds: i64 =
        env::var("OPENLEWS_DETECT_INTERVAL_SECONDS").ok().and_then(|s| s.parse().ok()).unwrap_or(300);
    let daemon_config = DaemonConfig { detect_interval_seconds, http_port };

    let known_sensor_ids: Vec<String> = env::var("OPENLEWS_KNOWN_SENSOR_IDS")
        .map(|s| s.split(',').map(|id| id.trim().to_string()).filter(|id| !id.is_empty()).collect())
        .unwrap_or_default();

    let endpoint = match HttpChatEndpoint::from_env() {
        Ok(e) => e,
        Err(e) => {
            log::error!("failed to configure LLM endpoint: {e}");
            std::process::exit(1);
        }
    };
    let retry_policy = RetryPolicy::new(config.llm_max_attempts, config.llm_backoff_base_s);
    let llm = LlmClient::new(&endpoint, retry_policy);
    let geocoder = NullGeocoder;
    let bus = NullEventBus;

    match env::var("DATABASE_URL") {
        Ok(_) => match PostgresStore::connect() {
            Ok(store) => {
                log::info!("connected to postgres store, schema verified");
                let zone_index = ZoneIndex::new();
                let daemon = Daemon::new(
                    &store,
                    &store,
                    &zone_index,
                    &store,
                    &bus,
                    &llm,
                    &geocoder,
                    &config,
                    daemon_config,
                    &known_sensor_ids,
                );
                if let Err(e) = daemon.run() {
                    log::error!("daemon exited: {e}");
                    std::process::exit(1);
                }
            }
            Err(e) => {
                log::error!("failed to connect to postgres: {e}");
                std::process::exit(1);
            }
        },
        Err(_) => {
            log::warn!("DATABASE_URL not set, running against in-memory stores (development mode)");
            let telemetry = InMemoryTelemetryStore::new();
            let zone_index = ZoneIndex::new();
            let zone_store = InMemoryZoneStore::new(zone_index.clone());
            let alert_store = InMemoryAlertStore::new();

            let daemon = Daemon::new(
                &telemetry,
                &zone_store,
                &zone_index,
                &alert_store,
                &bus,
                &llm,
                &geocoder,
                &config,
                daemon_config,
                &known_sensor_ids,
            );
            if let Err(e) = daemon.run() {
                log::error!("daemon exited: {e}");
                std::process::exit(1);
            }
        }
    }
}
