//! Google Gemini API provider.
//!
//! Calls the Gemini `generateContent` endpoint. Auth via the `x-goog-api-key` header.

use async_trait::async_trait;
use parley_core::{
    context::{Completion, CompletionMetadata, ModelParams, Prompt},
    error::ParleyError,
    traits::Provider,
};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, warn};

use crate::{build_client, request_error, require_text, status_error};

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Google Gemini API provider.
pub struct GeminiProvider {
    client: reqwest::Client,
    api_key: String,
    model: String,
}

impl GeminiProvider {
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
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiContent>,
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
}

impl From<ModelParams> for GenerationConfig {
    fn from(params: ModelParams) -> Self {
        Self {
            temperature: params.temperature,
            max_output_tokens: params.max_tokens,
        }
    }
}

#[derive(Serialize, Deserialize)]
struct GeminiContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Serialize, Deserialize)]
struct GeminiPart {
    #[serde(default)]
    text: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    candidates: Option<Vec<GeminiCandidate>>,
    usage_metadata: Option<GeminiUsage>,
}

#[derive(Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiContent>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiUsage {
    #[serde(default)]
    total_token_count: u64,
}

fn build_request(prompt: &Prompt) -> GeminiRequest {
    let (system, api_messages) = prompt.to_api_messages();

    let system_instruction = if system.is_empty() {
        None
    } else {
        Some(GeminiContent {
            role: None,
            parts: vec![GeminiPart { text: system }],
        })
    };

    let contents = api_messages
        .into_iter()
        .map(|m| {
            let role = if m.role == "assistant" { "model" } else { "user" };
            GeminiContent {
                role: Some(role.to_string()),
                parts: vec![GeminiPart { text: m.content }],
            }
        })
        .collect();

    GeminiRequest {
        contents,
        system_instruction,
        generation_config: prompt.params.into(),
    }
}

fn extract_text(resp: &GeminiResponse) -> Option<String> {
    let parts = &resp.candidates.as_ref()?.first()?.content.as_ref()?.parts;
    let text: String = parts.iter().map(|p| p.text.as_str()).collect();
    Some(text)
}

#[async_trait]
impl Provider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn complete(&self, prompt: &Prompt) -> Result<Completion, ParleyError> {
        let start = Instant::now();
        let body = build_request(prompt);

        let url = format!("{GEMINI_BASE_URL}/models/{}:generateContent", self.model);
        debug!("gemini: POST models/{}:generateContent", self.model);

        let resp = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| request_error("gemini", e))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(status_error("gemini", status, &text));
        }

        let parsed: GeminiResponse = resp
            .json()
            .await
            .map_err(|e| ParleyError::Provider(format!("gemini: failed to parse response: {e}")))?;

        let text = require_text("gemini", extract_text(&parsed))?;
        let tokens = parsed.usage_metadata.as_ref().map(|u| u.total_token_count);

        Ok(Completion {
            text,
            metadata: CompletionMetadata {
                provider_used: "gemini".to_string(),
                tokens_used: tokens,
                processing_time_ms: start.elapsed().as_millis() as u64,
                model: Some(self.model.clone()),
            },
        })
    }

    async fn is_available(&self) -> bool {
        if self.api_key.is_empty() {
            warn!("gemini: no API key configured");
            return false;
        }
        let url = format!("{GEMINI_BASE_URL}/models/{}", self.model);
        match self
            .client
            .get(&url)
            .header("x-goog-api-key", &self.api_key)
            .send()
            .await
        {
            Ok(resp) => resp.status().is_success(),
            Err(e) => {
                warn!("gemini not available: {e}");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gemini_provider_name() {
        let p = GeminiProvider::from_config("AIza-test".into(), "gemini-2.5-flash-lite".into(), 60)
            .unwrap();
        assert_eq!(p.name(), "gemini");
    }

    #[test]
    fn test_gemini_request_serialization() {
        let prompt = Prompt::new("Be natural.", "Chat History:\n[Contact]: hi");
        let json = serde_json::to_value(build_request(&prompt)).unwrap();
        assert_eq!(json["systemInstruction"]["parts"][0]["text"], "Be natural.");
        assert!(json["systemInstruction"].get("role").is_none());
        assert_eq!(json["contents"][0]["role"], "user");
        assert_eq!(json["generationConfig"]["maxOutputTokens"], 512);
        let temperature = json["generationConfig"]["temperature"].as_f64().unwrap();
        assert!((temperature - 0.7).abs() < 1e-6);
    }

    #[test]
    fn test_gemini_request_no_system() {
        let prompt = Prompt::new("", "hello");
        let json = serde_json::to_value(build_request(&prompt)).unwrap();
        assert!(json.get("systemInstruction").is_none());
    }

    #[test]
    fn test_gemini_response_parsing_joins_parts() {
        let json = r#"{"candidates":[{"content":{"role":"model","parts":[{"text":"Hi "},{"text":"there!"}]}}],"usageMetadata":{"totalTokenCount":25}}"#;
        let resp: GeminiResponse = serde_json::from_str(json).unwrap();
        assert_eq!(extract_text(&resp), Some("Hi there!".into()));
        assert_eq!(
            resp.usage_metadata.as_ref().map(|u| u.total_token_count),
            Some(25)
        );
    }

    #[test]
    fn test_gemini_blocked_response_has_no_text() {
        let json = r#"{"candidates":[{"finishReason":"SAFETY"}]}"#;
        let resp: GeminiResponse = serde_json::from_str(json).unwrap();
        assert!(require_text("gemini", extract_text(&resp)).is_err());
    }
}
