use serde::{Deserialize, Serialize};

use super::defaults::*;

/// WhatsApp Web session settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserConfig {
    #[serde(default)]
    pub headless: bool,
    /// Timeout for individual browser operations, in milliseconds.
    #[serde(default = "default_browser_timeout_ms")]
    pub timeout_ms: u64,
    /// chromedriver endpoint.
    #[serde(default = "default_webdriver_url")]
    pub webdriver_url: String,
    /// Persistent browser profile, so the QR login survives restarts.
    #[serde(default = "default_session_dir")]
    pub session_dir: String,
    #[serde(default = "default_login_timeout_secs")]
    pub login_timeout_secs: u64,
    /// Type replies into the compose box without pressing Enter.
    #[serde(default)]
    pub draft_only: bool,
    #[serde(default = "default_whatsapp_url")]
    pub whatsapp_url: String,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: false,
            timeout_ms: default_browser_timeout_ms(),
            webdriver_url: default_webdriver_url(),
            session_dir: default_session_dir(),
            login_timeout_secs: default_login_timeout_secs(),
            draft_only: false,
            whatsapp_url: default_whatsapp_url(),
        }
    }
}
