//! Scheduler loop (spec §4.9, §6): runs the HTTP ingest endpoint and the
//! periodic `DetectRun` tick concurrently on borrowed state, no `Arc`
//! required since both halves live for the duration of `run`.

use std::time::Duration;

use chrono::Utc;

use crate::alert::manager::AlertManager;
use crate::config::OpenLewsConfig;
use crate::detect::DetectRun;
use crate::endpoint;
use crate::events::EventBus;
use crate::geocode::Geocoder;
use crate::llm::{ChatEndpoint, LlmClient};
use crate::store::{AlertStore, TelemetryStore, ZoneStore};
use crate::zones::ZoneIndex;

/// Daemon configuration (generalized from the teacher's poll/backfill
/// knobs into the detect-tick cadence this pipeline actually runs on).
#[derive(Debug, Clone, Copy)]
pub struct DaemonConfig {
    /// How often to run a full `DetectRun` pass, seconds.
    pub detect_interval_seconds: i64,
    /// Port the ingest HTTP endpoint listens on.
    pub http_port: u16,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self { detect_interval_seconds: 300, http_port: 8080 }
    }
}

/// Main daemon state: a set of borrowed adapters plus the two config
/// blocks (pipeline + scheduling). Runs until the process is killed —
/// there's no clean-shutdown signal in this spec.
#[allow(clippy::too_many_arguments)]
pub struct Daemon<'a, T, Z, S, B, E, G>
where
    T: TelemetryStore,
    Z: ZoneStore,
    S: AlertStore,
    B: EventBus,
    E: ChatEndpoint,
    G: Geocoder,
{
    telemetry: &'a T,
    zone_store: &'a Z,
    zone_index: &'a ZoneIndex,
    alert_store: &'a S,
    bus: &'a B,
    llm: &'a LlmClient<'a, E>,
    geocoder: &'a G,
    config: &'a OpenLewsConfig,
    daemon_config: DaemonConfig,
    known_sensor_ids: &'a [String],
}

impl<'a, T, Z, S, B, E, G> Daemon<'a, T, Z, S, B, E, G>
where
    T: TelemetryStore,
    Z: ZoneStore,
    S: AlertStore,
    B: EventBus,
    E: ChatEndpoint,
    G: Geocoder,
{
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        telemetry: &'a T,
        zone_store: &'a Z,
        zone_index: &'a ZoneIndex,
        alert_store: &'a S,
        bus: &'a B,
        llm: &'a LlmClient<'a, E>,
        geocoder: &'a G,
        config: &'a OpenLewsConfig,
        daemon_config: DaemonConfig,
        known_sensor_ids: &'a [String],
    ) -> Self {
        Self { telemetry, zone_store, zone_index, alert_store, bus, llm, geocoder, config, daemon_config, known_sensor_ids }
    }

    /// Blocks forever, running the HTTP endpoint and the detect ticker on
    /// sibling threads of one scope. Neither side needs `'static` since
    /// `scope` guarantees both finish before `run` returns (it never
    /// does, barring a panic on one side).
    pub fn run(&self) -> Result<(), String>
    where
        T: Sync,
        Z: Sync,
        S: Sync,
        B: Sync,
        E: Sync,
        G: Sync,
    {
        std::thread::scope(|scope| {
            scope.spawn(|| {
                if let Err(e) = endpoint::start_endpoint_server(
                    self.daemon_config.http_port,
                    self.telemetry,
                    self.zone_index,
                    self.alert_store,
                    self.bus,
                    self.config,
                ) {
                    log::error!("ingest endpoint exited: {e}");
                }
            });

            self.run_detect_loop();
        });

        Ok(())
    }

    fn run_detect_loop(&self) {
        log::info!(
            "detect loop starting: interval {}s, {} known sensors",
            self.daemon_config.detect_interval_seconds,
            self.known_sensor_ids.len()
        );

        loop {
            let start = Utc::now();

            let run = DetectRun::new(
                self.telemetry,
                self.zone_store,
                self.alert_store,
                self.bus,
                self.llm,
                self.geocoder,
                self.config,
                self.known_sensor_ids,
            );

            match run.run() {
                Ok(summary) => {
                    log::info!(
                        "detect run complete: {} sensors, {} clusters, {} alerts created, {} escalated, {} stale ({:.2}s)",
                        summary.sensors_analyzed,
                        summary.clusters_detected,
                        summary.alerts_created,
                        summary.alerts_escalated,
                        summary.stale_sensors.len(),
                        summary.execution_time_s,
                    );
                }
                Err(e) => log::error!("detect run failed: {e}"),
            }

            self.sweep_expired_alerts();

            let elapsed = (Utc::now() - start).num_seconds();
            let sleep_seconds = self.daemon_config.detect_interval_seconds - elapsed;
            if sleep_seconds > 0 {
                std::thread::sleep(Duration::from_secs(sleep_seconds as u64));
            }
        }
    }

    /// Marks alerts idle past their grace period as expired. Kept separate
    /// from `DetectRun` since it has nothing to do with a detection pass —
    /// it only needs the set of currently-active alerts.
    fn sweep_expired_alerts(&self) {
        let manager = AlertManager::new(self.alert_store, self.bus, self.config.alert_dedup_window_s, self.config.alert_expiry_grace_s);

        let active = match self.alert_store.list_active() {
            Ok(a) => a,
            Err(e) => {
                log::warn!("alert expiry sweep: failed to list active alerts: {e}");
                return;
            }
        };

        let expired = manager.expire(&active, Utc::now());
        for alert in &expired {
            if let Err(e) = self.alert_store.upsert_alert(alert) {
                log::warn!("alert expiry sweep: failed to persist expiry for {}: {e}", alert.alert_id);
            }
        }
        if !expired.is_empty() {
            log::info!("alert expiry sweep: expired {} alert(s)", expired.len());
        }
    }
}
