//! WhatsApp Web session driven through a WebDriver endpoint.
//!
//! Chrome runs with a persistent profile under `SESSION_DIR`, so the QR
//! login survives restarts. The session reads and writes whatever
//! conversation the operator has open in the browser.

mod extract;
mod scripts;
mod send;
mod webdriver;

#[cfg(test)]
mod tests;

use async_trait::async_trait;
use parley_core::{
    config::BrowserConfig, error::ParleyError, message::Message, traits::ChatSession,
};
use serde_json::Value;
use std::path::Path;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

use extract::RawMessage;
use send::{sanitize_for_whatsapp, to_keystrokes};
use webdriver::{element_arg, LaunchOptions, WebDriver};

const LOGIN_POLL: Duration = Duration::from_secs(1);

/// WhatsApp Web automated through chromedriver.
pub struct WhatsAppWebSession {
    config: BrowserConfig,
    driver: Option<WebDriver>,
}

impl WhatsAppWebSession {
    pub fn new(config: BrowserConfig) -> Self {
        Self {
            config,
            driver: None,
        }
    }

    fn driver(&self) -> Result<&WebDriver, ParleyError> {
        self.driver
            .as_ref()
            .ok_or_else(|| ParleyError::Channel("whatsapp session not started".into()))
    }

    /// Absolute profile directory; Chrome resolves relative paths oddly.
    fn profile_dir(&self) -> Result<String, ParleyError> {
        let dir = Path::new(&self.config.session_dir).join("whatsapp_session");
        std::fs::create_dir_all(&dir).map_err(|e| {
            ParleyError::Session(format!("failed to create {}: {e}", dir.display()))
        })?;
        let abs = std::fs::canonicalize(&dir).map_err(|e| {
            ParleyError::Session(format!("failed to resolve {}: {e}", dir.display()))
        })?;
        Ok(abs.to_string_lossy().into_owned())
    }

    /// Wait for the chat list, logging once if a QR code must be scanned.
    async fn wait_for_login(&self, driver: &WebDriver) -> Result<(), ParleyError> {
        let deadline = Instant::now() + Duration::from_secs(self.config.login_timeout_secs);
        let mut qr_logged = false;

        loop {
            let state = driver.execute(scripts::LOGIN_STATE, vec![]).await;
            match state.as_ref().ok().and_then(Value::as_str) {
                Some("chats") => {
                    info!("whatsapp: logged in");
                    return Ok(());
                }
                Some("qr") if !qr_logged => {
                    info!("whatsapp: QR code shown, scan it with your phone to log in");
                    qr_logged = true;
                }
                _ => {}
            }
            if let Err(e) = state {
                debug!("whatsapp: login probe failed: {e}");
            }

            if Instant::now() >= deadline {
                return Err(ParleyError::Session(format!(
                    "login did not complete within {}s",
                    self.config.login_timeout_secs
                )));
            }
            sleep(LOGIN_POLL).await;
        }
    }

    async fn find_compose_box(&self, driver: &WebDriver) -> Result<String, ParleyError> {
        for selector in scripts::COMPOSE_SELECTORS {
            if let Some(element) = driver.find(selector).await? {
                return Ok(element);
            }
        }
        Err(ParleyError::Channel(
            "message input box not found (is a chat open?)".into(),
        ))
    }
}

#[async_trait]
impl ChatSession for WhatsAppWebSession {
    fn name(&self) -> &str {
        "whatsapp-web"
    }

    async fn start(&mut self) -> Result<(), ParleyError> {
        if self.driver.is_some() {
            return Ok(());
        }

        let profile_dir = self.profile_dir()?;
        info!(
            "whatsapp: launching browser via {} (profile {profile_dir})",
            self.config.webdriver_url
        );
        let driver = WebDriver::connect(
            &self.config.webdriver_url,
            &LaunchOptions {
                profile_dir: &profile_dir,
                headless: self.config.headless,
                timeout_ms: self.config.timeout_ms,
            },
        )
        .await?;

        let ready = async {
            driver
                .navigate(&self.config.whatsapp_url)
                .await
                .map_err(|e| ParleyError::Session(format!("failed to open WhatsApp Web: {e}")))?;
            self.wait_for_login(&driver).await
        }
        .await;

        if let Err(e) = ready {
            if let Err(quit_err) = driver.quit().await {
                warn!("whatsapp: failed to close browser after start failure: {quit_err}");
            }
            return Err(e);
        }

        self.driver = Some(driver);
        Ok(())
    }

    async fn get_recent_messages(&mut self, n: usize) -> Result<Vec<Message>, ParleyError> {
        let driver = self.driver()?;
        let value = driver
            .execute(scripts::READ_MESSAGES, vec![Value::from(n)])
            .await?;
        let raw: Vec<RawMessage> = serde_json::from_value(value)?;
        let messages: Vec<Message> = raw.into_iter().map(Message::from).collect();
        debug!("whatsapp: read {} messages", messages.len());
        Ok(messages)
    }

    async fn send_text(&mut self, text: &str) -> Result<(), ParleyError> {
        let driver = self.driver()?;
        let element = self.find_compose_box(driver).await?;

        driver.click(&element).await?;
        driver
            .execute(scripts::CLEAR_INPUT, vec![element_arg(&element)])
            .await?;

        let formatted = sanitize_for_whatsapp(text);
        let submit = !self.config.draft_only;
        driver
            .send_keys(&element, &to_keystrokes(&formatted, submit))
            .await?;

        if submit {
            info!("whatsapp: sent {} chars", formatted.chars().count());
        } else {
            info!("whatsapp: draft typed ({} chars), press Enter in the browser to send", formatted.chars().count());
        }
        Ok(())
    }

    async fn close(&mut self) -> Result<(), ParleyError> {
        if let Some(driver) = self.driver.take() {
            driver.quit().await?;
            info!("whatsapp: browser closed");
        }
        Ok(())
    }
}
