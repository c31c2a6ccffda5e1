//! Reference `ChatEndpoint` adapter: a blocking HTTP call to a chat
//! completions API, in the same `reqwest::blocking` style the teacher
//! uses for the USGS/CWMS fetchers. Lives in the binary, not the library,
//! since the wire format of a specific LLM provider is a deployment
//! concern rather than part of the core (spec §6: the core only depends
//! on `ChatEndpoint`).

use std::env;

use serde::Deserialize;
use serde_json::json;

use openlews::llm::{ChatEndpoint, LlmError};

pub struct HttpChatEndpoint {
    client: reqwest::blocking::Client,
    base_url: String,
    api_key: String,
    model_id: String,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

impl HttpChatEndpoint {
    pub fn from_env() -> Result<Self, String> {
        let api_key = env::var("LLM_API_KEY").map_err(|_| "LLM_API_KEY not set".to_string())?;
        let base_url = env::var("LLM_ENDPOINT").unwrap_or_else(|_| "https://api.openai.com/v1/chat/completions".to_string());
        let model_id = env::var("LLM_MODEL_ID").unwrap_or_else(|_| "default-risk-model".to_string());
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(20))
            .build()
            .map_err(|e| format!("failed to build LLM http client: {e}"))?;
        Ok(Self { client, base_url, api_key, model_id })
    }
}

impl ChatEndpoint for HttpChatEndpoint {
    fn chat(&self, system: &str, user: &str, max_tokens: u32, temperature: f64) -> Result<String, LlmError> {
        let body = json!({
            "model": self.model_id,
            "max_tokens": max_tokens,
            "temperature": temperature,
            "messages": [
                {"role": "system", "content": system},
                {"role": "user", "content": user},
            ],
        });

        let response = self
            .client
            .post(&self.base_url)
            .bearer_auth(&self.api_key)
            .header("Accept", "application/json")
            .json(&body)
            .send()
            .map_err(|e| LlmError::Transient(e.to_string()))?;

        let status = response.status();
        if status.as_u16() == 429 {
            return Err(LlmError::Throttled);
        }
        if status.is_server_error() {
            return Err(LlmError::Transient(format!("llm endpoint returned {status}")));
        }
        if !status.is_success() {
            return Err(LlmError::Terminal(format!("llm endpoint returned {status}")));
        }

        let parsed: ChatResponse = response.json().map_err(|e| LlmError::Transient(e.to_string()))?;
        parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| LlmError::BadOutput("llm response had no choices".to_string()))
    }
}
