//! Minimal W3C WebDriver client with just the commands the session needs.
//!
//! Talks JSON over HTTP to a chromedriver endpoint. Every response wraps its
//! payload in `{"value": ...}`; failures carry `{"value": {"error", "message"}}`.

use parley_core::error::ParleyError;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

/// W3C element reference key.
pub(super) const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";

/// Enter key.
pub(super) const KEY_ENTER: &str = "\u{E007}";
/// Shift modifier (sticky until [`KEY_NULL`]).
pub(super) const KEY_SHIFT: &str = "\u{E008}";
/// Releases all held modifiers.
pub(super) const KEY_NULL: &str = "\u{E000}";

#[derive(Deserialize)]
struct WireResponse {
    #[serde(default)]
    value: Value,
}

#[derive(Deserialize)]
struct WireError {
    error: String,
    #[serde(default)]
    message: String,
}

/// Browser launch options.
pub(super) struct LaunchOptions<'a> {
    pub profile_dir: &'a str,
    pub headless: bool,
    pub timeout_ms: u64,
}

/// Build the `POST /session` capabilities for Chrome.
pub(super) fn chrome_capabilities(opts: &LaunchOptions<'_>) -> Value {
    let mut args = vec![
        format!("--user-data-dir={}", opts.profile_dir),
        "--disable-blink-features=AutomationControlled".to_string(),
        "--window-size=1280,800".to_string(),
    ];
    if opts.headless {
        args.push("--headless=new".to_string());
    }
    json!({
        "capabilities": {
            "alwaysMatch": {
                "browserName": "chrome",
                "goog:chromeOptions": { "args": args },
                "timeouts": {
                    "script": opts.timeout_ms,
                    "pageLoad": opts.timeout_ms,
                    "implicit": 0
                }
            }
        }
    })
}

/// One live WebDriver session.
pub(super) struct WebDriver {
    client: reqwest::Client,
    base_url: String,
    session_id: String,
}

impl WebDriver {
    /// Start a browser through the driver at `base_url`.
    pub async fn connect(base_url: &str, opts: &LaunchOptions<'_>) -> Result<Self, ParleyError> {
        // Leave room for the driver to report its own timeouts first.
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(opts.timeout_ms) + Duration::from_secs(10))
            .build()
            .map_err(|e| ParleyError::Session(format!("failed to build HTTP client: {e}")))?;
        let base_url = base_url.trim_end_matches('/').to_string();

        let value = send(
            client.post(format!("{base_url}/session")),
            Some(chrome_capabilities(opts)),
        )
        .await
        .map_err(|e| ParleyError::Session(format!("failed to start browser: {e}")))?;
        let session_id = value
            .get("sessionId")
            .and_then(Value::as_str)
            .ok_or_else(|| ParleyError::Session("webdriver returned no sessionId".into()))?
            .to_string();
        debug!("webdriver: session {session_id} created");

        Ok(Self {
            client,
            base_url,
            session_id,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/session/{}{path}", self.base_url, self.session_id)
    }

    pub async fn navigate(&self, url: &str) -> Result<(), ParleyError> {
        send(self.client.post(self.url("/url")), Some(json!({ "url": url }))).await?;
        Ok(())
    }

    /// Run a synchronous script and return its result.
    pub async fn execute(&self, script: &str, args: Vec<Value>) -> Result<Value, ParleyError> {
        send(
            self.client.post(self.url("/execute/sync")),
            Some(json!({ "script": script, "args": args })),
        )
        .await
    }

    /// First element matching `css`, or `None`.
    pub async fn find(&self, css: &str) -> Result<Option<String>, ParleyError> {
        let result = send(
            self.client.post(self.url("/element")),
            Some(json!({ "using": "css selector", "value": css })),
        )
        .await;
        match result {
            Ok(value) => Ok(element_id(&value)),
            Err(ParleyError::Channel(msg)) if msg.starts_with("no such element") => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub async fn click(&self, element: &str) -> Result<(), ParleyError> {
        send(
            self.client.post(self.url(&format!("/element/{element}/click"))),
            Some(json!({})),
        )
        .await?;
        Ok(())
    }

    /// Type `text` into `element`. Special keys use the WebDriver code points.
    pub async fn send_keys(&self, element: &str, text: &str) -> Result<(), ParleyError> {
        send(
            self.client.post(self.url(&format!("/element/{element}/value"))),
            Some(json!({ "text": text })),
        )
        .await?;
        Ok(())
    }

    /// End the session and close the browser.
    pub async fn quit(&self) -> Result<(), ParleyError> {
        send(self.client.delete(self.url("")), None).await?;
        debug!("webdriver: session {} deleted", self.session_id);
        Ok(())
    }
}

/// JSON argument referencing an element inside a script call.
pub(super) fn element_arg(element: &str) -> Value {
    let mut map = serde_json::Map::new();
    map.insert(ELEMENT_KEY.to_string(), Value::String(element.to_string()));
    Value::Object(map)
}

fn element_id(value: &Value) -> Option<String> {
    value.get(ELEMENT_KEY)?.as_str().map(str::to_string)
}

async fn send(request: reqwest::RequestBuilder, body: Option<Value>) -> Result<Value, ParleyError> {
    let request = match body {
        Some(body) => request.json(&body),
        None => request,
    };
    let resp = request.send().await.map_err(|e| {
        if e.is_timeout() || e.is_connect() {
            ParleyError::Timeout(format!("webdriver request failed: {e}"))
        } else {
            ParleyError::Channel(format!("webdriver request failed: {e}"))
        }
    })?;

    let status = resp.status();
    let text = resp.text().await.unwrap_or_default();
    let parsed: WireResponse = serde_json::from_str(&text)
        .map_err(|e| ParleyError::Channel(format!("webdriver returned {status}: {e}")))?;

    if status.is_success() {
        Ok(parsed.value)
    } else {
        Err(wire_error(parsed.value))
    }
}

/// Map a WebDriver error payload onto the error taxonomy.
pub(super) fn wire_error(value: Value) -> ParleyError {
    let Ok(err) = serde_json::from_value::<WireError>(value) else {
        return ParleyError::Channel("webdriver returned a malformed error".into());
    };
    let first_line = err.message.lines().next().unwrap_or_default();
    match err.error.as_str() {
        "timeout" | "script timeout" => {
            ParleyError::Timeout(format!("{}: {first_line}", err.error))
        }
        _ => ParleyError::Channel(format!("{}: {first_line}", err.error)),
    }
}
