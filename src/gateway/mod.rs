//! Gateway: wires the chat session, the reply pipeline and the operator
//! together, and owns startup and shutdown.
//!
//! Two tasks run side by side: the message monitor (timer-driven poller)
//! and the command handler (operator input). They share one
//! [`HelperState`] and one shutdown token. Whichever stops first takes the
//! other down with it.

pub mod approval;
mod monitor;
mod pipeline;
mod retry;
mod session;


pub use monitor::{MessageMonitor, MonitorSettings};
pub use pipeline::{GenerateOutcome, ReplyPipeline};
pub use retry::RetryPolicy;
pub use session::SessionLock;

use crate::commands::{print_help, CommandHandler, HandlerExit, StatusInfo};
use parley_core::{
    config::Config,
    error::ParleyError,
    state::HelperState,
    traits::{ChatSession, Provider},
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinError;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Clean quit.
pub const EXIT_OK: i32 = 0;
/// Session start failed or the monitor could not recover.
pub const EXIT_RUNTIME: i32 = 1;
/// The configuration did not validate.
pub const EXIT_CONFIG: i32 = 2;

/// How long the surviving task gets to wind down after shutdown.
const SETTLE_TIMEOUT: Duration = Duration::from_secs(5);

enum Finished {
    Monitor(Result<Result<(), ParleyError>, JoinError>),
    Handler(Result<HandlerExit, JoinError>),
    Interrupted,
}

/// Owns every component for one `parley start` run.
pub struct Orchestrator {
    config: Config,
    provider: Arc<dyn Provider>,
    session: Arc<SessionLock>,
    state: Arc<HelperState>,
    retry: RetryPolicy,
    shutdown: CancellationToken,
}

impl Orchestrator {
    pub fn new(
        config: Config,
        provider: Arc<dyn Provider>,
        session: Box<dyn ChatSession>,
        start_enabled: bool,
    ) -> Self {
        let state = HelperState::new(start_enabled).with_persona(config.helper.persona);
        Self {
            config,
            provider,
            session: Arc::new(SessionLock::new(session)),
            state: Arc::new(state),
            retry: RetryPolicy::default(),
            shutdown: CancellationToken::new(),
        }
    }

    /// Replace the back-off used for transient collaborator errors.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    #[cfg(test)]
    pub(crate) fn state(&self) -> Arc<HelperState> {
        self.state.clone()
    }

    /// Run until quit, end of input, Ctrl-C or an unrecoverable failure.
    ///
    /// `lines` carries operator input. The chat session is closed exactly
    /// once before returning, whatever the exit path.
    pub async fn run(self, lines: mpsc::Receiver<String>) -> i32 {
        let code = self.run_inner(lines).await;
        self.session.close().await;
        info!("parley stopped (exit code {code})");
        code
    }

    async fn run_inner(&self, lines: mpsc::Receiver<String>) -> i32 {
        if let Err(e) = self.config.validate() {
            error!("{e}");
            return EXIT_CONFIG;
        }

        let started = tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => return EXIT_OK,
            _ = tokio::signal::ctrl_c() => {
                info!("received Ctrl-C during startup");
                return EXIT_OK;
            }
            started = self.session.start() => started,
        };
        if let Err(e) = started {
            error!("failed to start the chat session: {e}");
            return EXIT_RUNTIME;
        }

        let helper = &self.config.helper;
        let (gate, approvals) = approval::approval_channel(self.shutdown.clone());
        let (trigger_tx, trigger_rx) = mpsc::channel(1);

        let monitor = Arc::new(MessageMonitor::new(
            self.state.clone(),
            self.session.clone(),
            ReplyPipeline::new(self.provider.clone(), helper),
            gate,
            MonitorSettings {
                poll_interval: Duration::from_secs(helper.poll_interval_secs),
                max_messages: helper.max_messages_to_read,
                human_approval: helper.human_approval,
            },
            self.retry.clone(),
            self.shutdown.clone(),
        ));
        let handler = CommandHandler::new(
            self.state.clone(),
            trigger_tx,
            approvals,
            self.shutdown.clone(),
            StatusInfo {
                provider: self.provider.name().to_string(),
                session: self.session.name().to_string(),
                human_approval: helper.human_approval,
                poll_interval_secs: helper.poll_interval_secs,
                started: chrono::Local::now(),
            },
        );

        println!(
            "Parley is running. Helper is {}, replies {}.",
            if self.state.get_enabled() { "ON" } else { "OFF" },
            if helper.human_approval {
                "need your approval"
            } else {
                "are sent automatically"
            }
        );
        print_help();

        let mut monitor_task = {
            let monitor = monitor.clone();
            tokio::spawn(async move { monitor.run(trigger_rx).await })
        };
        let mut handler_task = tokio::spawn(handler.run(lines));

        let finished = tokio::select! {
            result = &mut monitor_task => Finished::Monitor(result),
            result = &mut handler_task => Finished::Handler(result),
            _ = tokio::signal::ctrl_c() => Finished::Interrupted,
        };
        self.shutdown.cancel();

        match finished {
            Finished::Monitor(result) => {
                settle("command handler", handler_task).await;
                match result {
                    Ok(Ok(())) => EXIT_OK,
                    Ok(Err(e)) => {
                        error!("monitor stopped: {e}");
                        println!("Stopping: {e}");
                        EXIT_RUNTIME
                    }
                    Err(e) => {
                        error!("monitor task failed: {e}");
                        EXIT_RUNTIME
                    }
                }
            }
            Finished::Handler(result) => {
                settle("monitor", monitor_task).await;
                match result {
                    Ok(exit) => {
                        info!("command handler stopped: {exit:?}");
                        EXIT_OK
                    }
                    Err(e) => {
                        error!("command handler task failed: {e}");
                        EXIT_RUNTIME
                    }
                }
            }
            Finished::Interrupted => {
                info!("received Ctrl-C, shutting down");
                settle("monitor", monitor_task).await;
                settle("command handler", handler_task).await;
                EXIT_OK
            }
        }
    }
}

/// Wait for a cancelled task to finish, aborting it if it lingers.
async fn settle<T>(name: &str, mut task: tokio::task::JoinHandle<T>) {
    if tokio::time::timeout(SETTLE_TIMEOUT, &mut task).await.is_err() {
        warn!("{name} did not stop within {}s, aborting", SETTLE_TIMEOUT.as_secs());
        task.abort();
    }
}
