mod browser;
mod defaults;
mod prompts;
mod providers;

#[cfg(test)]
mod tests;

pub use browser::*;
pub use prompts::*;
pub use providers::*;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use tracing::debug;

use crate::error::ParleyError;
use defaults::*;

/// Top-level Parley configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    pub provider: ProviderConfig,
    pub browser: BrowserConfig,
    pub helper: HelperConfig,
    pub logging: LoggingConfig,
}

/// Reply behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HelperConfig {
    /// Ask the operator before every send.
    #[serde(default = "default_true")]
    pub human_approval: bool,
    /// Context window fed to the model.
    #[serde(default = "default_max_messages")]
    pub max_messages_to_read: usize,
    #[serde(default = "default_response_tone")]
    pub response_tone: String,
    #[serde(default)]
    pub persona: Persona,
    /// Maximum reply length in characters.
    #[serde(default = "default_max_response_length")]
    pub max_response_length: usize,
    #[serde(default = "default_true")]
    pub enable_safety_filter: bool,
    /// Extra blocked terms on top of the built-in rules.
    #[serde(default)]
    pub safety_blocklist: Vec<String>,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
}

impl Default for HelperConfig {
    fn default() -> Self {
        Self {
            human_approval: true,
            max_messages_to_read: default_max_messages(),
            response_tone: default_response_tone(),
            persona: Persona::default(),
            max_response_length: default_max_response_length(),
            enable_safety_filter: true,
            safety_blocklist: Vec::new(),
            poll_interval_secs: default_poll_interval(),
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_file")]
    pub file: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: default_log_file(),
        }
    }
}

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Reads typed values from a key lookup, collecting every parse error.
struct Reader<F> {
    get: F,
    errors: Vec<String>,
}

impl<F: Fn(&str) -> Option<String>> Reader<F> {
    /// Trimmed value of `key`; unset and blank are the same.
    fn raw(&self, key: &str) -> Option<String> {
        (self.get)(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn string(&self, key: &str, default: String) -> String {
        self.raw(key).unwrap_or(default)
    }

    fn boolean(&mut self, key: &str, default: bool) -> bool {
        let Some(value) = self.raw(key) else {
            return default;
        };
        match parse_bool(&value) {
            Some(b) => b,
            None => {
                self.errors
                    .push(format!("{key} must be a boolean (true/false), got '{value}'"));
                default
            }
        }
    }

    fn number<T: FromStr>(&mut self, key: &str, default: T) -> T {
        let Some(value) = self.raw(key) else {
            return default;
        };
        match value.parse() {
            Ok(n) => n,
            Err(_) => {
                self.errors
                    .push(format!("{key} must be a non-negative integer, got '{value}'"));
                default
            }
        }
    }

    fn parsed<T: FromStr<Err = String>>(&mut self, key: &str, default: T) -> T {
        let Some(value) = self.raw(key) else {
            return default;
        };
        match value.parse() {
            Ok(v) => v,
            Err(e) => {
                self.errors.push(e);
                default
            }
        }
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}

impl Config {
    /// Build the configuration from environment-style keys.
    ///
    /// Every malformed value is reported in one `Config` error. Semantic
    /// checks (required keys, positive numbers) run in [`Config::validate`].
    pub fn from_lookup<F>(get: F) -> Result<Self, ParleyError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut r = Reader {
            get,
            errors: Vec::new(),
        };

        let kind = r.parsed("LLM_PROVIDER", ProviderKind::Gemini);
        let provider = ProviderConfig {
            kind,
            timeout_secs: r.number("LLM_TIMEOUT_SECS", default_llm_timeout_secs()),
            openai: OpenAiConfig {
                api_key: r.string("OPENAI_API_KEY", String::new()),
                model: r.string("OPENAI_MODEL", default_openai_model()),
                base_url: r.string("OPENAI_BASE_URL", default_openai_base_url()),
            },
            anthropic: AnthropicConfig {
                api_key: r.string("ANTHROPIC_API_KEY", String::new()),
                model: r.string("CLAUDE_MODEL", default_anthropic_model()),
            },
            gemini: GeminiConfig {
                api_key: r
                    .raw("GOOGLE_API_KEY")
                    .or_else(|| r.raw("GEMINI_API_KEY"))
                    .unwrap_or_default(),
                model: r.string("GEMINI_MODEL", default_gemini_model()),
            },
        };

        let browser = BrowserConfig {
            headless: r.boolean("BROWSER_HEADLESS", false),
            timeout_ms: r.number("BROWSER_TIMEOUT", default_browser_timeout_ms()),
            webdriver_url: r.string("WEBDRIVER_URL", default_webdriver_url()),
            session_dir: r.string("SESSION_DIR", default_session_dir()),
            login_timeout_secs: r.number("LOGIN_TIMEOUT_SECS", default_login_timeout_secs()),
            draft_only: r.boolean("DRAFT_ONLY", false),
            whatsapp_url: r.string("WHATSAPP_WEB_URL", default_whatsapp_url()),
        };

        let helper = HelperConfig {
            human_approval: r.boolean("HUMAN_APPROVAL", true),
            max_messages_to_read: r.number("MAX_MESSAGES_TO_READ", default_max_messages()),
            response_tone: r.string("RESPONSE_TONE", default_response_tone()),
            persona: r.parsed("AGENT_PERSONA", Persona::Default),
            max_response_length: r
                .number("MAX_RESPONSE_LENGTH", default_max_response_length()),
            enable_safety_filter: r.boolean("ENABLE_SAFETY_FILTER", true),
            safety_blocklist: r
                .raw("SAFETY_BLOCKLIST")
                .map(|v| {
                    v.split(',')
                        .map(|t| t.trim().to_string())
                        .filter(|t| !t.is_empty())
                        .collect()
                })
                .unwrap_or_default(),
            poll_interval_secs: r.number("POLL_INTERVAL_SECS", default_poll_interval()),
        };

        let logging = LoggingConfig {
            level: r.string("LOG_LEVEL", default_log_level()).to_lowercase(),
            file: r.string("LOG_FILE", default_log_file()),
        };

        if !r.errors.is_empty() {
            return Err(config_errors(&r.errors));
        }

        Ok(Self {
            provider,
            browser,
            helper,
            logging,
        })
    }

    /// Read the process environment, falling back to `env_file` entries.
    ///
    /// Real environment variables win over the file.
    pub fn from_env(env_file: Option<&Path>) -> Result<Self, ParleyError> {
        let file_vars = match env_file {
            Some(path) => read_env_file(path)?,
            None => HashMap::new(),
        };
        Self::from_lookup(|key| std::env::var(key).ok().or_else(|| file_vars.get(key).cloned()))
    }

    /// Check required keys and value ranges. Reports every problem at once.
    pub fn validate(&self) -> Result<(), ParleyError> {
        let mut errors = Vec::new();

        if self.provider.selected_api_key().is_empty() {
            errors.push(format!(
                "{} is required when LLM_PROVIDER={}",
                self.provider.kind.api_key_var(),
                self.provider.kind
            ));
        }

        for (key, value) in [
            ("LLM_TIMEOUT_SECS", self.provider.timeout_secs),
            ("BROWSER_TIMEOUT", self.browser.timeout_ms),
            ("LOGIN_TIMEOUT_SECS", self.browser.login_timeout_secs),
            ("MAX_MESSAGES_TO_READ", self.helper.max_messages_to_read as u64),
            ("MAX_RESPONSE_LENGTH", self.helper.max_response_length as u64),
            ("POLL_INTERVAL_SECS", self.helper.poll_interval_secs),
        ] {
            if value == 0 {
                errors.push(format!("{key} must be a positive integer"));
            }
        }

        for (key, value) in [
            ("WEBDRIVER_URL", &self.browser.webdriver_url),
            ("SESSION_DIR", &self.browser.session_dir),
            ("RESPONSE_TONE", &self.helper.response_tone),
            ("LOG_FILE", &self.logging.file),
        ] {
            if value.trim().is_empty() {
                errors.push(format!("{key} must not be empty"));
            }
        }

        if !LOG_LEVELS.contains(&self.logging.level.as_str()) {
            errors.push(format!(
                "LOG_LEVEL must be one of {}, got '{}'",
                LOG_LEVELS.join(", "),
                self.logging.level
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(config_errors(&errors))
        }
    }
}

fn config_errors(errors: &[String]) -> ParleyError {
    ParleyError::Config(format!(
        "configuration errors:\n{}",
        errors
            .iter()
            .map(|e| format!("  - {e}"))
            .collect::<Vec<_>>()
            .join("\n")
    ))
}

/// Load a `.env` file into key/value pairs without touching the process
/// environment.
///
/// Parsing follows `dotenvy`: `export` prefixes, comments, quoting, escapes
/// and `${VAR}` substitution. A malformed line is a configuration error.
pub fn read_env_file(path: &Path) -> Result<HashMap<String, String>, ParleyError> {
    let read_error =
        |e: dotenvy::Error| ParleyError::Config(format!("failed to read {}: {e}", path.display()));
    let vars = dotenvy::from_path_iter(path)
        .map_err(read_error)?
        .collect::<Result<HashMap<_, _>, _>>()
        .map_err(read_error)?;
    debug!("loaded {} entries from {}", vars.len(), path.display());
    Ok(vars)
}
