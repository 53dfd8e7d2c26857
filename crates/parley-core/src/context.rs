use serde::{Deserialize, Serialize};

/// Sampling parameters forwarded to the provider.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelParams {
    pub temperature: f32,
    /// Upper bound on generated tokens.
    pub max_tokens: u32,
}

impl Default for ModelParams {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_tokens: 512,
        }
    }
}

/// A structured message for API-based providers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiMessage {
    /// "user" or "assistant".
    pub role: String,
    /// The message content.
    pub content: String,
}

/// A complete request to an LLM provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prompt {
    /// System prompt describing persona, tone and constraints.
    pub system: String,
    /// The user turn: the rendered chat history plus the instruction.
    pub user: String,
    #[serde(default)]
    pub params: ModelParams,
}

impl Prompt {
    pub fn new(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            user: user.into(),
            params: ModelParams::default(),
        }
    }

    pub fn with_params(mut self, params: ModelParams) -> Self {
        self.params = params;
        self
    }

    /// Convert to structured API messages.
    ///
    /// Returns `(system_prompt, messages)`; the system prompt is separated
    /// because Anthropic and Gemini require it outside the messages array.
    pub fn to_api_messages(&self) -> (String, Vec<ApiMessage>) {
        (
            self.system.clone(),
            vec![ApiMessage {
                role: "user".to_string(),
                content: self.user.clone(),
            }],
        )
    }
}

/// Metadata about how a completion was produced.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CompletionMetadata {
    /// Which provider produced this response.
    pub provider_used: String,
    /// Token count (if available from the provider).
    pub tokens_used: Option<u64>,
    /// Wall-clock processing time in milliseconds.
    pub processing_time_ms: u64,
    /// Model identifier (if applicable).
    pub model: Option<String>,
}

/// Text returned by a provider.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Completion {
    pub text: String,
    pub metadata: CompletionMetadata,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_api_messages_single_user_turn() {
        let prompt = Prompt::new("Be natural.", "Chat History:\n[Contact]: hi");
        let (system, messages) = prompt.to_api_messages();
        assert_eq!(system, "Be natural.");
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].role, "user");
        assert!(messages[0].content.contains("[Contact]: hi"));
    }

    #[test]
    fn test_prompt_deserialize_without_params() {
        let json = r#"{"system":"s","user":"u"}"#;
        let prompt: Prompt = serde_json::from_str(json).unwrap();
        assert_eq!(prompt.params, ModelParams::default());
    }
}
