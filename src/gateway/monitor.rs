//! Message monitor. Polls the open chat and answers new peer messages.

use super::{
    approval::{ApprovalDecision, ApprovalGate},
    pipeline::{GenerateOutcome, ReplyPipeline},
    retry::RetryPolicy,
    session::SessionLock,
};
use parley_core::{
    error::ParleyError, message::ChatContext, safety::BlockCategory, state::HelperState,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Consecutive chat read failures after which the monitor gives up.
pub const MAX_READ_FAILURES: u32 = 5;

/// How one detection cycle ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    NoNewMessage,
    Disabled,
    /// The newest message was already handled by an earlier cycle.
    AlreadyClaimed,
    Sent,
    Rejected,
    Blocked(BlockCategory),
    GenerationFailed,
    SendFailed,
    /// Shutdown arrived during the approval wait.
    Cancelled,
}

/// Settings the monitor needs from the helper configuration.
#[derive(Debug, Clone)]
pub struct MonitorSettings {
    pub poll_interval: Duration,
    pub max_messages: usize,
    pub human_approval: bool,
}

pub struct MessageMonitor {
    state: Arc<HelperState>,
    session: Arc<SessionLock>,
    pipeline: ReplyPipeline,
    gate: ApprovalGate,
    settings: MonitorSettings,
    retry: RetryPolicy,
    shutdown: CancellationToken,
    run_lock: Mutex<()>,
}

impl MessageMonitor {
    pub fn new(
        state: Arc<HelperState>,
        session: Arc<SessionLock>,
        pipeline: ReplyPipeline,
        gate: ApprovalGate,
        settings: MonitorSettings,
        retry: RetryPolicy,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            state,
            session,
            pipeline,
            gate,
            settings,
            retry,
            shutdown,
            run_lock: Mutex::new(()),
        }
    }

    /// Run one detection cycle.
    ///
    /// Cycles never overlap. Only a failed chat read is returned as an
    /// error; every other failure is reported through the outcome.
    pub async fn run_cycle(&self) -> Result<CycleOutcome, ParleyError> {
        let _guard = self.run_lock.lock().await;

        if !self.state.get_enabled() {
            return Ok(CycleOutcome::Disabled);
        }

        let n = self.settings.max_messages;
        let session = &*self.session;
        let messages = self
            .retry
            .run("read chat", move || session.get_recent_messages(n))
            .await?;
        let context = ChatContext::from_recent(messages, n);

        let Some((fingerprint, incoming)) = context.awaiting_reply() else {
            return Ok(CycleOutcome::NoNewMessage);
        };
        if !self.state.try_claim(&fingerprint) {
            return Ok(CycleOutcome::AlreadyClaimed);
        }
        let incoming = incoming.text.clone();
        info!(
            "new message [{}]: {}",
            fingerprint.short(),
            preview(&incoming)
        );

        let pipeline = &self.pipeline;
        let ctx = &context;
        let persona = self.state.persona();
        let generated = self
            .retry
            .run("generate reply", move || async move {
                match pipeline.generate(ctx, persona).await {
                    GenerateOutcome::Failed(e) => Err(e),
                    other => Ok(other),
                }
            })
            .await;

        let mut candidate = match generated {
            Ok(GenerateOutcome::Ready(candidate)) => candidate,
            Ok(GenerateOutcome::Blocked(category)) => {
                warn!("[{}] reply withheld: {category}", fingerprint.short());
                println!("Reply withheld by the safety filter ({category}).");
                return Ok(CycleOutcome::Blocked(category));
            }
            Ok(GenerateOutcome::Failed(e)) | Err(e) => {
                error!("[{}] reply generation failed: {e}", fingerprint.short());
                return Ok(CycleOutcome::GenerationFailed);
            }
        };

        let text = match self
            .gate
            .review(&mut candidate, &incoming, self.settings.human_approval)
            .await
        {
            ApprovalDecision::Approved(text) | ApprovalDecision::Edited(text) => text,
            ApprovalDecision::Rejected => return Ok(CycleOutcome::Rejected),
            ApprovalDecision::Cancelled => return Ok(CycleOutcome::Cancelled),
        };

        let reply = text.as_str();
        match self
            .retry
            .run("send reply", move || session.send_text(reply))
            .await
        {
            Ok(()) => {
                info!(
                    "[{}] reply sent ({:?}): {}",
                    fingerprint.short(),
                    candidate.approval_status,
                    preview(&text)
                );
                Ok(CycleOutcome::Sent)
            }
            Err(e) => {
                error!("[{}] failed to send reply: {e}", fingerprint.short());
                println!("Failed to send the reply: {e}");
                Ok(CycleOutcome::SendFailed)
            }
        }
    }

    /// Poll on the configured interval and on every manual trigger until
    /// shutdown.
    ///
    /// Returns an error after [`MAX_READ_FAILURES`] consecutive read
    /// failures, or on the first fatal one.
    pub async fn run(&self, mut triggers: mpsc::Receiver<()>) -> Result<(), ParleyError> {
        let mut ticker = tokio::time::interval(self.settings.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut triggers_open = true;
        let mut read_failures = 0u32;

        info!(
            "monitor: polling every {}s",
            self.settings.poll_interval.as_secs()
        );

        loop {
            let manual = tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => break,
                trigger = triggers.recv(), if triggers_open => match trigger {
                    Some(()) => true,
                    None => {
                        triggers_open = false;
                        continue;
                    }
                },
                _ = ticker.tick() => false,
            };

            let result = tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => break,
                result = self.run_cycle() => result,
            };

            match result {
                Ok(outcome) => {
                    read_failures = 0;
                    if manual {
                        report_manual(&outcome);
                    }
                    debug!("monitor: cycle finished: {outcome:?}");
                }
                Err(e) if e.is_fatal() => {
                    error!("monitor: fatal error: {e}");
                    return Err(e);
                }
                Err(e) => {
                    read_failures += 1;
                    warn!(
                        "monitor: reading the chat failed ({read_failures}/{MAX_READ_FAILURES}): {e}"
                    );
                    if read_failures >= MAX_READ_FAILURES {
                        return Err(ParleyError::Channel(format!(
                            "reading the chat failed {read_failures} times in a row: {e}"
                        )));
                    }
                }
            }
        }

        info!("monitor: stopped");
        Ok(())
    }
}

fn report_manual(outcome: &CycleOutcome) {
    match outcome {
        CycleOutcome::NoNewMessage | CycleOutcome::AlreadyClaimed => {
            println!("No new message to answer.");
        }
        CycleOutcome::Disabled => println!("Helper is OFF. Type 't' to turn it on."),
        _ => {}
    }
}

/// First 60 characters of `text`, on one line.
fn preview(text: &str) -> String {
    let flat = text.replace('\n', " ");
    match flat.char_indices().nth(60) {
        Some((i, _)) => format!("{}...", &flat[..i]),
        None => flat,
    }
}
