//! `ensure_alert` / `expire`: the dedup-escalate-persist state machine
//! (spec §4.8).

use std::time::Duration;

use chrono::Utc;

use crate::events::EventBus;
use crate::model::{
    Alert, AlertStatus, DetectionType, EscalationEntry, HazardZone, ResolvedLocation, RiskLevel, TimeToFailure,
};
use crate::store::{AlertStore, StoreError};

const ESCALATION_CONFIDENCE_JUMP: f64 = 0.15;

/// One detected high-risk item (a cluster or a lone sensor) carrying
/// everything `ensure_alert` needs — the output of `DetectRun`'s
/// per-item pipeline (score → fuse → zone query → LLM assess/narrative).
pub struct Detection {
    pub detection_type: DetectionType,
    pub sensors_affected: Vec<String>,
    /// Sensor id used to derive the dedup key: the highest-risk member
    /// for a cluster, or the sensor itself for an individual.
    pub representative_sensor_id: String,
    pub risk_level: RiskLevel,
    pub confidence: f64,
    pub llm_reasoning: String,
    pub trigger_factors: Vec<String>,
    pub recommended_action: String,
    pub time_to_failure: TimeToFailure,
    pub narrative: String,
    pub center_location: (f64, f64),
    pub resolved_location: Option<ResolvedLocation>,
    pub zone_snapshot: Option<HazardZone>,
}

impl Detection {
    pub fn dedup_key(&self) -> String {
        match self.detection_type {
            DetectionType::Cluster => format!("CLUSTER:{}", self.representative_sensor_id),
            DetectionType::Individual => format!("SENSOR:{}", self.representative_sensor_id),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnsureOutcome {
    Created,
    Escalated,
    Unchanged,
}

/// True when `new` should replace `existing`'s risk/content: a strictly
/// higher risk_level ordinal, or the same ordinal with a confidence jump
/// of at least 0.15 (spec §4.8, and the invariant in §3).
fn should_escalate(existing: &Alert, new_risk: RiskLevel, new_confidence: f64) -> bool {
    if new_risk.ordinal() > existing.risk_level.ordinal() {
        return true;
    }
    new_risk.ordinal() == existing.risk_level.ordinal() && new_confidence >= existing.confidence + ESCALATION_CONFIDENCE_JUMP
}

pub struct AlertManager<'a, S: AlertStore, B: EventBus> {
    store: &'a S,
    bus: &'a B,
    dedup_window: Duration,
    expiry_grace: chrono::Duration,
}

impl<'a, S: AlertStore, B: EventBus> AlertManager<'a, S, B> {
    pub fn new(store: &'a S, bus: &'a B, dedup_window_s: i64, expiry_grace_s: i64) -> Self {
        Self {
            store,
            bus,
            dedup_window: Duration::from_secs(dedup_window_s.max(0) as u64),
            expiry_grace: chrono::Duration::seconds(expiry_grace_s),
        }
    }

    pub fn ensure_alert(&self, detection: &Detection, alert_ttl_seconds: i64) -> Result<(String, EnsureOutcome), StoreError> {
        let dedup_key = detection.dedup_key();
        let existing = self.store.get_active_by_prefix(&dedup_key, self.dedup_window)?;
        let now = Utc::now();

        match existing {
            None => {
                let alert = Alert {
                    alert_id: dedup_key.clone(),
                    created_at: now,
                    updated_at: now,
                    status: AlertStatus::Active,
                    risk_level: detection.risk_level,
                    confidence: detection.confidence,
                    llm_reasoning: detection.llm_reasoning.clone(),
                    trigger_factors: detection.trigger_factors.clone(),
                    recommended_action: detection.recommended_action.clone(),
                    time_to_failure: detection.time_to_failure,
                    narrative: detection.narrative.clone(),
                    detection_type: detection.detection_type,
                    sensors_affected: detection.sensors_affected.clone(),
                    center_location: detection.center_location,
                    resolved_location: detection.resolved_location.clone(),
                    zone_snapshot: detection.zone_snapshot.clone(),
                    escalation_history: Vec::new(),
                    expiry: now + chrono::Duration::seconds(alert_ttl_seconds),
                };
                self.store.upsert_alert(&alert)?;
                self.publish_best_effort(&dedup_key);
                Ok((dedup_key, EnsureOutcome::Created))
            }
            Some(mut existing_alert) => {
                if should_escalate(&existing_alert, detection.risk_level, detection.confidence) {
                    existing_alert.escalation_history.push(EscalationEntry {
                        ts: now,
                        from_level: existing_alert.risk_level,
                        to_level: detection.risk_level,
                        reason: format!(
                            "confidence {:.2} -> {:.2}",
                            existing_alert.confidence, detection.confidence
                        ),
                    });
                    existing_alert.risk_level = detection.risk_level;
                    existing_alert.confidence = detection.confidence;
                    existing_alert.llm_reasoning = detection.llm_reasoning.clone();
                    existing_alert.narrative = detection.narrative.clone();
                    existing_alert.trigger_factors = detection.trigger_factors.clone();
                    existing_alert.recommended_action = detection.recommended_action.clone();
                    existing_alert.time_to_failure = detection.time_to_failure;
                    existing_alert.updated_at = now;
                    self.store.upsert_alert(&existing_alert)?;
                    self.publish_best_effort(&dedup_key);
                    Ok((existing_alert.alert_id, EnsureOutcome::Escalated))
                } else {
                    existing_alert.updated_at = now;
                    self.store.upsert_alert(&existing_alert)?;
                    Ok((existing_alert.alert_id, EnsureOutcome::Unchanged))
                }
            }
        }
    }

    fn publish_best_effort(&self, dedup_key: &str) {
        // Publication is best-effort: a failure is swallowed, never
        // rolled back against the alert write that already succeeded.
        let _ = self.bus.publish_notification("openlews.alert", dedup_key);
    }

    /// Marks alerts with `updated_at + grace < now` as expired. Run
    /// periodically by the external scheduler, not by `DetectRun` itself.
    pub fn expire(&self, active: &[Alert], now: chrono::DateTime<Utc>) -> Vec<Alert> {
        active
            .iter()
            .filter(|a| a.status == AlertStatus::Active && a.updated_at + self.expiry_grace < now)
            .cloned()
            .map(|mut a| {
                a.status = AlertStatus::Expired;
                a.updated_at = now;
                a
            })
            .collect()
    }
}
