//! Conversion of scraped message records into [`Message`]s.

use parley_core::message::{Message, Sender};
use serde::Deserialize;

/// One record returned by the read script.
#[derive(Debug, Deserialize)]
pub(super) struct RawMessage {
    pub text: String,
    #[serde(default)]
    pub outgoing: bool,
    /// `data-pre-plain-text`, e.g. `"[10:42 PM, 10/18/2026] Alice: "`.
    #[serde(default)]
    pub meta: Option<String>,
    #[serde(default)]
    pub id: Option<String>,
}

impl From<RawMessage> for Message {
    fn from(raw: RawMessage) -> Self {
        let sender = if raw.outgoing { Sender::Me } else { Sender::Peer };
        let mut message = Message::new(sender, raw.text.trim());
        if let Some(ts) = raw.meta.as_deref().and_then(timestamp_of) {
            message = message.with_timestamp(ts);
        }
        if let Some(id) = raw.id.filter(|id| !id.is_empty()) {
            message = message.with_platform_id(id);
        }
        message
    }
}

/// The bracketed timestamp of a `data-pre-plain-text` value.
pub(super) fn timestamp_of(meta: &str) -> Option<&str> {
    let rest = meta.trim_start().strip_prefix('[')?;
    let end = rest.find(']')?;
    let ts = rest[..end].trim();
    (!ts.is_empty()).then_some(ts)
}
