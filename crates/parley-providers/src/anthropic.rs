//! Anthropic API provider.
//!
//! Calls the Anthropic Messages API.

use async_trait::async_trait;
use parley_core::{
    context::{Completion, CompletionMetadata, Prompt},
    error::ParleyError,
    traits::Provider,
};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, warn};

use crate::{build_client, request_error, require_text, status_error};

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Anthropic Messages API provider.
pub struct AnthropicProvider {
    client: reqwest::Client,
    api_key: String,
    model: String,
}

impl AnthropicProvider {
    /// Create from config values.
    pub fn from_config(api_key: String, model: String, timeout_secs: u64) -> Result<Self, ParleyError> {
        Ok(Self {
            client: build_client(timeout_secs)?,
            api_key,
            model,
        })
    }
}

#[derive(Serialize)]
struct AnthropicRequest {
    model: String,
    max_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "String::is_empty")]
    system: String,
    messages: Vec<AnthropicMessage>,
}

#[derive(Serialize, Deserialize)]
struct AnthropicMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct AnthropicResponse {
    content: Option<Vec<AnthropicContentBlock>>,
    model: Option<String>,
    usage: Option<AnthropicUsage>,
}

#[derive(Deserialize)]
struct AnthropicContentBlock {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    text: String,
}

#[derive(Deserialize)]
struct AnthropicUsage {
    #[serde(default)]
    input_tokens: u64,
    #[serde(default)]
    output_tokens: u64,
}

fn build_request(model: &str, prompt: &Prompt) -> AnthropicRequest {
    let (system, api_messages) = prompt.to_api_messages();
    AnthropicRequest {
        model: model.to_string(),
        max_tokens: prompt.params.max_tokens,
        temperature: prompt.params.temperature,
        system,
        messages: api_messages
            .into_iter()
            .map(|m| AnthropicMessage {
                role: m.role,
                content: m.content,
            })
            .collect(),
    }
}

fn extract_text(resp: &AnthropicResponse) -> Option<String> {
    let text: String = resp
        .content
        .as_ref()?
        .iter()
        .filter(|b| b.kind == "text")
        .map(|b| b.text.as_str())
        .collect();
    Some(text)
}

#[async_trait]
impl Provider for AnthropicProvider {
    fn name(&self) -> &str {
        "anthropic"
    }

    async fn complete(&self, prompt: &Prompt) -> Result<Completion, ParleyError> {
        let start = Instant::now();
        let body = build_request(&self.model, prompt);

        debug!("anthropic: POST {ANTHROPIC_API_URL} model={}", self.model);

        let resp = self
            .client
            .post(ANTHROPIC_API_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(|e| request_error("anthropic", e))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(status_error("anthropic", status, &text));
        }

        let parsed: AnthropicResponse = resp.json().await.map_err(|e| {
            ParleyError::Provider(format!("anthropic: failed to parse response: {e}"))
        })?;

        let text = require_text("anthropic", extract_text(&parsed))?;
        let tokens = parsed
            .usage
            .as_ref()
            .map(|u| u.input_tokens + u.output_tokens);

        Ok(Completion {
            text,
            metadata: CompletionMetadata {
                provider_used: "anthropic".to_string(),
                tokens_used: tokens,
                processing_time_ms: start.elapsed().as_millis() as u64,
                model: parsed.model,
            },
        })
    }

    async fn is_available(&self) -> bool {
        if self.api_key.is_empty() {
            warn!("anthropic: no API key configured");
            return false;
        }
        // No lightweight health endpoint; we trust the key is valid.
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_anthropic_provider_name() {
        let p = AnthropicProvider::from_config(
            "sk-ant-test".into(),
            "claude-3-5-sonnet-20241022".into(),
            60,
        )
        .unwrap();
        assert_eq!(p.name(), "anthropic");
    }

    #[test]
    fn test_anthropic_request_serialization() {
        let prompt = Prompt::new("Be natural.", "Chat History:\n[Contact]: hi");
        let json = serde_json::to_value(build_request("claude-3-5-sonnet-20241022", &prompt)).unwrap();
        assert_eq!(json["model"], "claude-3-5-sonnet-20241022");
        assert_eq!(json["max_tokens"], 512);
        assert_eq!(json["system"], "Be natural.");
        assert_eq!(json["messages"][0]["role"], "user");
    }

    #[test]
    fn test_anthropic_request_empty_system_omitted() {
        let prompt = Prompt::new("", "hello");
        let json = serde_json::to_value(build_request("m", &prompt)).unwrap();
        assert!(json.get("system").is_none());
    }

    #[test]
    fn test_anthropic_response_parsing() {
        let json = r#"{"content":[{"type":"text","text":"Hello!"}],"model":"claude-3-5-sonnet-20241022","usage":{"input_tokens":10,"output_tokens":5}}"#;
        let resp: AnthropicResponse = serde_json::from_str(json).unwrap();
        assert_eq!(extract_text(&resp), Some("Hello!".into()));
        assert_eq!(
            resp.usage
                .as_ref()
                .map(|u| u.input_tokens + u.output_tokens),
            Some(15)
        );
    }

    #[test]
    fn test_anthropic_empty_content_rejected() {
        let json = r#"{"content":[],"model":"m"}"#;
        let resp: AnthropicResponse = serde_json::from_str(json).unwrap();
        assert!(require_text("anthropic", extract_text(&resp)).is_err());
    }
}
