use crate::{
    context::{Completion, Prompt},
    error::ParleyError,
    message::Message,
};
use async_trait::async_trait;

/// LLM provider trait. Turns a prompt into text.
///
/// Every backend (OpenAI, Anthropic, Gemini) implements this trait to
/// provide a uniform interface to the reply pipeline.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Human-readable provider name.
    fn name(&self) -> &str;

    /// Send a prompt to the provider and get a completion.
    async fn complete(&self, prompt: &Prompt) -> Result<Completion, ParleyError>;

    /// Check if the provider is reachable with the configured credentials.
    async fn is_available(&self) -> bool;
}

/// Chat session trait for the automated messaging client.
///
/// A session is stateful and not safe for concurrent use, hence `&mut self`
/// everywhere. Callers serialize access through a single lock.
#[async_trait]
pub trait ChatSession: Send {
    /// Human-readable session name.
    fn name(&self) -> &str;

    /// Launch the client and restore or complete the login.
    async fn start(&mut self) -> Result<(), ParleyError>;

    /// The last `n` messages of the open conversation, oldest first.
    ///
    /// Returns an empty list when no conversation is open.
    async fn get_recent_messages(&mut self, n: usize) -> Result<Vec<Message>, ParleyError>;

    /// Type and send a message in the open conversation.
    async fn send_text(&mut self, text: &str) -> Result<(), ParleyError>;

    /// Release all client resources.
    async fn close(&mut self) -> Result<(), ParleyError>;
}
