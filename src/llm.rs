//! LLM client (spec §4.7): structured risk assessment and narrative
//! generation against a text-in/text-out chat endpoint, with retry and
//! JSON-schema validation.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::retry::{Retryable, RetryPolicy};

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("llm throttled")]
    Throttled,
    #[error("llm transient error: {0}")]
    Transient(String),
    #[error("llm rejected request: {0}")]
    Terminal(String),
    #[error("llm returned output that failed schema validation after retries: {0}")]
    BadOutput(String),
}

impl Retryable for LlmError {
    fn is_retryable(&self) -> bool {
        matches!(self, LlmError::Throttled | LlmError::Transient(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum AssessmentRiskLevel {
    Yellow,
    Orange,
    Red,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendedAction {
    #[serde(rename = "Monitor closely")]
    MonitorClosely,
    #[serde(rename = "Prepare evacuation")]
    PrepareEvacuation,
    #[serde(rename = "Evacuate immediately")]
    EvacuateImmediately,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeToFailureEstimate {
    Hours,
    Days,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assessment {
    pub risk_level: AssessmentRiskLevel,
    pub confidence: f64,
    pub reasoning: String,
    pub trigger_factors: Vec<String>,
    pub recommended_action: RecommendedAction,
    pub time_to_failure_estimate: TimeToFailureEstimate,
    #[serde(default)]
    pub references: Vec<String>,
}

/// The chat transport the core consumes (spec §6). Implementations own
/// HTTP/network concerns; the client here only orchestrates retries and
/// schema validation.
pub trait ChatEndpoint {
    fn chat(&self, system: &str, user: &str, max_tokens: u32, temperature: f64) -> Result<String, LlmError>;
}

pub struct LlmClient<'a, E: ChatEndpoint> {
    endpoint: &'a E,
    policy: RetryPolicy,
}

const ASSESS_SYSTEM_PROMPT: &str = "You are a landslide risk assessment system. Respond with a single JSON object matching the required schema and nothing else.";
const JSON_NUDGE: &str = "Your previous response did not parse as valid JSON matching the schema. Return only valid JSON, no prose, no markdown fences.";
const MAX_PARSE_RETRIES: u32 = 2;

impl<'a, E: ChatEndpoint> LlmClient<'a, E> {
    pub fn new(endpoint: &'a E, policy: RetryPolicy) -> Self {
        Self { endpoint, policy }
    }

    fn validate_schema(text: &str) -> Result<Assessment, String> {
        let value: Value = serde_json::from_str(text.trim()).map_err(|e| e.to_string())?;
        serde_json::from_value(value).map_err(|e| e.to_string())
    }

    /// `assess_risk(context) -> Assessment`. Retries network-level
    /// failures via the shared policy; separately retries schema parse
    /// failures (up to `MAX_PARSE_RETRIES`) with a "return only valid
    /// JSON" nudge before failing with `LLMBadOutput`.
    pub fn assess_risk(&self, context: &Value, max_tokens: u32, temperature: f64) -> Result<Assessment, LlmError> {
        let user_prompt = context.to_string();
        let mut parse_attempt = 0;
        let mut last_parse_err = String::new();

        loop {
            let prompt = if parse_attempt == 0 {
                user_prompt.clone()
            } else {
                format!("{JSON_NUDGE}\n\n{user_prompt}")
            };

            let raw = self.policy.run_with(
                |_attempt| self.endpoint.chat(ASSESS_SYSTEM_PROMPT, &prompt, max_tokens, temperature),
                |d| std::thread::sleep(d),
            )?;

            match Self::validate_schema(&raw) {
                Ok(assessment) => return Ok(assessment),
                Err(e) => {
                    last_parse_err = e;
                    parse_attempt += 1;
                    if parse_attempt > MAX_PARSE_RETRIES {
                        return Err(LlmError::BadOutput(last_parse_err));
                    }
                }
            }
        }
    }

    /// `generate_narrative(assessment, location) -> String`. Called only
    /// for Orange/Red assessments.
    pub fn generate_narrative(&self, assessment: &Assessment, location_label: &str) -> Result<String, LlmError> {
        let system = "You write short, plain-language landslide-risk narratives for residents and first responders.";
        let user = format!(
            "Risk level: {:?}\nConfidence: {:.2}\nReasoning: {}\nLocation: {}\nWrite a 2-3 sentence narrative.",
            assessment.risk_level, assessment.confidence, assessment.reasoning, location_label
        );
        self.policy
            .run_with(|_attempt| self.endpoint.chat(system, &user, 300, 0.3), |d| std::thread::sleep(d))
    }
}
