//! Serialized access to the chat session.
//!
//! The browser session is stateful and single-threaded, so every call goes
//! through one async mutex. `close` runs at most once.

use parley_core::{error::ParleyError, message::Message, traits::ChatSession};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;
use tracing::{info, warn};

pub struct SessionLock {
    name: String,
    inner: Mutex<Box<dyn ChatSession>>,
    closed: AtomicBool,
}

impl SessionLock {
    pub fn new(session: Box<dyn ChatSession>) -> Self {
        Self {
            name: session.name().to_string(),
            inner: Mutex::new(session),
            closed: AtomicBool::new(false),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn ensure_open(&self) -> Result<(), ParleyError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(ParleyError::Channel("chat session is closed".into()));
        }
        Ok(())
    }

    pub async fn start(&self) -> Result<(), ParleyError> {
        self.ensure_open()?;
        info!("starting chat session: {}", self.name);
        self.inner.lock().await.start().await
    }

    pub async fn get_recent_messages(&self, n: usize) -> Result<Vec<Message>, ParleyError> {
        self.ensure_open()?;
        self.inner.lock().await.get_recent_messages(n).await
    }

    pub async fn send_text(&self, text: &str) -> Result<(), ParleyError> {
        self.ensure_open()?;
        self.inner.lock().await.send_text(text).await
    }

    /// Release the session. Later calls are no-ops.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        let mut session = self.inner.lock().await;
        match session.close().await {
            Ok(()) => info!("chat session closed"),
            Err(e) => warn!("failed to close chat session cleanly: {e}"),
        }
    }
}
