use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Who authored a message in the watched conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    /// The operator (our side of the conversation).
    Me,
    /// The other participant.
    Peer,
}

impl Sender {
    /// Label used when the conversation is rendered into a prompt.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Me => "You",
            Self::Peer => "Contact",
        }
    }
}

/// A message observed in the open conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub sender: Sender,
    pub text: String,
    /// Wall-clock label as rendered by the web client (e.g. "10:42 PM, 10/18/2026").
    #[serde(default)]
    pub timestamp: Option<String>,
    /// Stable message identifier exposed by the web client, if any.
    #[serde(default)]
    pub platform_id: Option<String>,
}

impl Message {
    /// Create a message without timestamp or platform id.
    pub fn new(sender: Sender, text: impl Into<String>) -> Self {
        Self {
            sender,
            text: text.into(),
            timestamp: None,
            platform_id: None,
        }
    }

    pub fn with_timestamp(mut self, timestamp: impl Into<String>) -> Self {
        self.timestamp = Some(timestamp.into());
        self
    }

    pub fn with_platform_id(mut self, id: impl Into<String>) -> Self {
        self.platform_id = Some(id.into());
        self
    }

    pub fn is_incoming(&self) -> bool {
        self.sender == Sender::Peer
    }
}

/// Opaque token identifying one incoming message instance.
///
/// Derived from the platform message id when available, otherwise from the
/// message content plus its preceding message. Never from the position in
/// the fetched window, which shifts as the conversation grows.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Fingerprint the message at `index` of an oldest-to-newest sequence.
    ///
    /// Returns `None` when `index` is out of bounds.
    pub fn of(messages: &[Message], index: usize) -> Option<Self> {
        let message = messages.get(index)?;
        let mut hasher = Sha256::new();

        if let Some(ref id) = message.platform_id {
            hasher.update(b"id\0");
            hasher.update(id.as_bytes());
        } else {
            hasher.update(b"content\0");
            feed(&mut hasher, message);
            match index.checked_sub(1).and_then(|i| messages.get(i)) {
                Some(anchor) => {
                    hasher.update(b"anchor\0");
                    feed(&mut hasher, anchor);
                }
                None => hasher.update(b"no-anchor\0"),
            }
        }

        Some(Self(hex::encode(hasher.finalize())))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short prefix for log lines.
    pub fn short(&self) -> &str {
        &self.0[..self.0.len().min(12)]
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn feed(hasher: &mut Sha256, message: &Message) {
    hasher.update(message.sender.label().as_bytes());
    hasher.update(b"\0");
    hasher.update(message.text.as_bytes());
    hasher.update(b"\0");
    hasher.update(message.timestamp.as_deref().unwrap_or("").as_bytes());
    hasher.update(b"\0");
}

/// The most recent messages of the conversation, oldest first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChatContext {
    messages: Vec<Message>,
}

impl ChatContext {
    /// Keep only the last `window` messages.
    pub fn from_recent(mut messages: Vec<Message>, window: usize) -> Self {
        if messages.len() > window {
            messages.drain(..messages.len() - window);
        }
        Self { messages }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// The newest message, if it was written by the peer.
    ///
    /// A peer message followed by one of ours is considered answered.
    pub fn awaiting_reply(&self) -> Option<(Fingerprint, &Message)> {
        let index = self.messages.len().checked_sub(1)?;
        let last = &self.messages[index];
        if !last.is_incoming() {
            return None;
        }
        Fingerprint::of(&self.messages, index).map(|fp| (fp, last))
    }
}
