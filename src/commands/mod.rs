//! Operator commands, one line of terminal input at a time.


use crate::gateway::approval::{ApprovalRequest, OperatorAnswer};
use chrono::{DateTime, Local};
use parley_core::{config::Persona, state::HelperState};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// A parsed line of operator input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Blank line: run a detection cycle now.
    CheckNow,
    Toggle,
    Enable,
    Disable,
    Status,
    /// Switch persona; without a name, show the current one.
    Persona(Option<Persona>),
    Help,
    Quit,
    Approve,
    Reject,
    Edit(String),
    Unknown(String),
}

impl Command {
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        if line.is_empty() {
            return Self::CheckNow;
        }

        let (word, rest) = match line.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim()),
            None => (line, ""),
        };
        let word = word.to_lowercase();

        if matches!(word.as_str(), "e" | "edit") {
            return if rest.is_empty() {
                Self::Unknown(line.to_string())
            } else {
                Self::Edit(rest.to_string())
            };
        }
        if matches!(word.as_str(), "p" | "persona") {
            if rest.is_empty() {
                return Self::Persona(None);
            }
            return rest
                .parse()
                .map_or_else(|_| Self::Unknown(line.to_string()), |p| Self::Persona(Some(p)));
        }
        if !rest.is_empty() {
            return Self::Unknown(line.to_string());
        }

        match word.as_str() {
            "t" | "toggle" => Self::Toggle,
            "enable" | "on" => Self::Enable,
            "disable" | "off" => Self::Disable,
            "s" | "status" => Self::Status,
            "h" | "help" | "?" => Self::Help,
            "q" | "quit" | "exit" => Self::Quit,
            "y" | "yes" => Self::Approve,
            "n" | "no" => Self::Reject,
            _ => Self::Unknown(line.to_string()),
        }
    }
}

/// Why the command handler stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerExit {
    Quit,
    /// Operator input reached end of file.
    InputClosed,
    /// Shutdown was requested elsewhere.
    Cancelled,
}

/// Static facts shown by `status`.
#[derive(Debug, Clone)]
pub struct StatusInfo {
    pub provider: String,
    pub session: String,
    pub human_approval: bool,
    pub poll_interval_secs: u64,
    pub started: DateTime<Local>,
}

pub struct CommandHandler {
    state: Arc<HelperState>,
    triggers: mpsc::Sender<()>,
    approvals: mpsc::Receiver<ApprovalRequest>,
    shutdown: CancellationToken,
    info: StatusInfo,
    pending: Option<ApprovalRequest>,
}

impl CommandHandler {
    pub fn new(
        state: Arc<HelperState>,
        triggers: mpsc::Sender<()>,
        approvals: mpsc::Receiver<ApprovalRequest>,
        shutdown: CancellationToken,
        info: StatusInfo,
    ) -> Self {
        Self {
            state,
            triggers,
            approvals,
            shutdown,
            info,
            pending: None,
        }
    }

    /// Read commands from `lines` until quit, end of input or shutdown.
    ///
    /// Approval requests are taken one at a time; the next approval answer
    /// goes to the pending one.
    pub async fn run(mut self, mut lines: mpsc::Receiver<String>) -> HandlerExit {
        let mut approvals_open = true;

        loop {
            tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => return HandlerExit::Cancelled,
                request = self.approvals.recv(), if approvals_open && self.pending.is_none() => {
                    match request {
                        Some(request) => {
                            print_approval_prompt(&request);
                            self.pending = Some(request);
                        }
                        None => approvals_open = false,
                    }
                }
                line = lines.recv() => match line {
                    Some(line) => {
                        if let Some(exit) = self.handle(Command::parse(&line)) {
                            return exit;
                        }
                    }
                    None => {
                        info!("operator input closed, shutting down");
                        self.shutdown.cancel();
                        return HandlerExit::InputClosed;
                    }
                },
            }
        }
    }

    /// Apply one command. Returns `Some` when the handler must stop.
    fn handle(&mut self, command: Command) -> Option<HandlerExit> {
        match command {
            Command::Quit => {
                println!("Shutting down...");
                self.shutdown.cancel();
                return Some(HandlerExit::Quit);
            }
            Command::Toggle => {
                let enabled = self.state.toggle();
                info!("helper toggled {}", on_off(enabled));
                println!("Helper is now {}.", on_off(enabled));
            }
            Command::Enable => {
                self.state.set_enabled(true);
                println!("Helper is now ON.");
            }
            Command::Disable => {
                self.state.set_enabled(false);
                println!("Helper is now OFF.");
            }
            Command::Status => self.print_status(),
            Command::Persona(None) => {
                println!(
                    "Persona is {}. Use: persona <default|friendly|flirty>",
                    self.state.persona()
                );
            }
            Command::Persona(Some(persona)) => {
                let previous = self.state.set_persona(persona);
                info!("persona switched from {previous} to {persona}");
                println!("Persona is now {persona}.");
            }
            Command::Help => print_help(),
            Command::CheckNow => match &self.pending {
                Some(request) => print_approval_prompt(request),
                None => match self.triggers.try_send(()) {
                    Ok(()) => println!("Checking for new messages..."),
                    Err(mpsc::error::TrySendError::Full(())) => {
                        println!("A check is already queued.");
                    }
                    Err(mpsc::error::TrySendError::Closed(())) => {
                        warn!("manual check requested but the monitor is not running");
                        println!("The monitor is not running.");
                    }
                },
            },
            Command::Approve => self.answer(OperatorAnswer::Approve),
            Command::Reject => self.answer(OperatorAnswer::Reject),
            Command::Edit(text) => self.answer(OperatorAnswer::Edit(text)),
            Command::Unknown(input) => {
                println!("Unknown command: '{input}'. Type 'help' for the list of commands.");
            }
        }
        None
    }

    fn answer(&mut self, answer: OperatorAnswer) {
        let Some(request) = self.pending.take() else {
            println!("No reply is waiting for approval.");
            return;
        };
        let label = match &answer {
            OperatorAnswer::Approve => "Sending reply.",
            OperatorAnswer::Reject => "Reply discarded.",
            OperatorAnswer::Edit(_) => "Sending your edited reply.",
        };
        if request.answer(answer) {
            println!("{label}");
        } else {
            println!("That reply is no longer waiting.");
        }
    }

    fn print_status(&self) {
        let last = self
            .state
            .last_claimed()
            .map_or_else(|| "none".to_string(), |fp| fp.short().to_string());
        println!("Helper:          {}", on_off(self.state.get_enabled()));
        println!("Persona:         {}", self.state.persona());
        println!("Provider:        {}", self.info.provider);
        println!("Chat session:    {}", self.info.session);
        println!(
            "Human approval:  {}",
            if self.info.human_approval { "required" } else { "off" }
        );
        println!("Poll interval:   {}s", self.info.poll_interval_secs);
        println!(
            "Running since:   {} ({})",
            self.info.started.format("%Y-%m-%d %H:%M"),
            format_uptime(Local::now() - self.info.started)
        );
        println!(
            "Handled:         {} message(s), last {last}",
            self.state.claimed_count()
        );
        if self.pending.is_some() {
            println!("A reply is waiting for approval.");
        }
    }
}

fn format_uptime(elapsed: chrono::TimeDelta) -> String {
    let mins = elapsed.num_minutes().max(0);
    match (mins / 60, mins % 60) {
        (0, m) => format!("{m}m"),
        (h, m) => format!("{h}h {m}m"),
    }
}

fn on_off(enabled: bool) -> &'static str {
    if enabled {
        "ON"
    } else {
        "OFF"
    }
}

fn print_approval_prompt(request: &ApprovalRequest) {
    println!();
    println!("---- Reply ready for approval ----");
    println!("Contact: {}", request.incoming);
    println!("Draft:   {}", request.reply);
    println!("Send it? y = send, n = discard, e <text> = send your own text");
}

pub fn print_help() {
    println!("Commands:");
    println!("  <Enter>          check for a new message now");
    println!("  t, toggle        turn the helper on or off");
    println!("  enable, disable  turn the helper on / off");
    println!("  status           show the current state");
    println!("  persona <name>   reply as default, friendly or flirty");
    println!("  y / n            approve or discard the pending reply");
    println!("  e <text>         send <text> instead of the pending reply");
    println!("  help             show this list");
    println!("  q, quit          stop Parley");
}
