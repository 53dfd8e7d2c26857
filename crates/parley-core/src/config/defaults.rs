//! Default values for every configuration key.

pub fn default_openai_model() -> String {
    "gpt-4o-mini".to_string()
}

pub fn default_openai_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

pub fn default_anthropic_model() -> String {
    "claude-3-5-sonnet-20241022".to_string()
}

pub fn default_gemini_model() -> String {
    "gemini-2.5-flash-lite".to_string()
}

pub fn default_llm_timeout_secs() -> u64 {
    60
}

pub fn default_browser_timeout_ms() -> u64 {
    30_000
}

pub fn default_webdriver_url() -> String {
    "http://localhost:9515".to_string()
}

pub fn default_session_dir() -> String {
    "session".to_string()
}

pub fn default_login_timeout_secs() -> u64 {
    60
}

pub fn default_whatsapp_url() -> String {
    "https://web.whatsapp.com".to_string()
}

pub fn default_true() -> bool {
    true
}

pub fn default_max_messages() -> usize {
    30
}

pub fn default_response_tone() -> String {
    "romantic, respectful, natural".to_string()
}

pub fn default_max_response_length() -> usize {
    500
}

pub fn default_poll_interval() -> u64 {
    2
}

pub fn default_log_level() -> String {
    "info".to_string()
}

pub fn default_log_file() -> String {
    "logs/parley.log".to_string()
}
