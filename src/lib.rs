/// openlews: landslide early-warning pipeline — ingest sensor telemetry,
/// enrich it with hazard-zone context, score and spatially fuse it, and
/// raise deduplicated, escalating alerts assessed by an LLM.
///
/// # Module structure
///
/// ```text
/// openlews
/// ├── model       — shared data types (Reading, HazardZone, Alert, …)
/// ├── config      — configuration surface, loaded from TOML
/// ├── geohash     — base-32 geohash encode + 8-neighbour ring
/// ├── geomath     — haversine distance, bounding boxes
/// ├── zones       — in-memory hazard-zone index (RAG query layer)
/// ├── validate    — reading range/shape validation
/// ├── enrich      — attaches hazard-zone context to a reading at ingest time
/// ├── scorer      — per-sensor weighted risk score
/// ├── fusion      — spatial correlation, composite risk, clustering
/// ├── llm         — structured risk assessment + narrative generation
/// ├── retry       — shared exponential-backoff-with-jitter policy
/// ├── geocode     — reverse-geocoding, best-effort
/// ├── events      — fire-and-forget event bus interface
/// ├── store       — TelemetryStore / ZoneStore / AlertStore adapters
/// ├── ingest      — IngestHandler: validate → enrich → classify → persist
/// ├── detect      — DetectRun: score → fuse → cluster → assess → alert
/// ├── alert       — alert dedup/escalation state machine
/// ├── error       — crate-wide error type
/// ├── endpoint    — HTTP front door (ingest + read-only queries)
/// └── daemon      — scheduler loop driving periodic DetectRun ticks
/// ```
pub mod alert;
pub mod config;
pub mod daemon;
pub mod detect;
pub mod endpoint;
pub mod enrich;
pub mod error;
pub mod events;
pub mod fusion;
pub mod geocode;
pub mod geohash;
pub mod geomath;
pub mod ingest;
pub mod llm;
pub mod model;
pub mod retry;
pub mod scorer;
pub mod store;
pub mod validate;
pub mod zones;
