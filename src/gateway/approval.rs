//! Optional human checkpoint between generation and send.
//!
//! The monitor hands a request (candidate text plus a one-shot reply
//! channel) to the command task and waits for the operator. There is no
//! timeout; the shutdown token is the only way out besides an answer.

use parley_core::safety::SafetyVerdict;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Review state of a candidate reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
    /// Approval was not required.
    AutoApproved,
}

/// A drafted reply on its way to the chat.
#[derive(Debug, Clone)]
pub struct ReplyCandidate {
    pub text: String,
    pub safety_verdict: SafetyVerdict,
    pub approval_status: ApprovalStatus,
}

impl ReplyCandidate {
    pub fn new(text: String, safety_verdict: SafetyVerdict) -> Self {
        Self {
            text,
            safety_verdict,
            approval_status: ApprovalStatus::Pending,
        }
    }
}

/// What the operator said about a candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperatorAnswer {
    Approve,
    Reject,
    Edit(String),
}

/// Result of [`ApprovalGate::review`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApprovalDecision {
    /// Send the candidate text unchanged.
    Approved(String),
    /// Send the operator's replacement text.
    Edited(String),
    Rejected,
    /// Shutdown arrived while waiting.
    Cancelled,
}

/// A pending question for the operator.
#[derive(Debug)]
pub struct ApprovalRequest {
    /// The peer message being answered.
    pub incoming: String,
    /// The drafted reply.
    pub reply: String,
    respond: oneshot::Sender<OperatorAnswer>,
}

impl ApprovalRequest {
    /// Deliver the operator's answer. Returns `false` if nobody waits anymore.
    pub fn answer(self, answer: OperatorAnswer) -> bool {
        self.respond.send(answer).is_ok()
    }
}

/// Sending half of the approval channel, owned by the monitor.
pub struct ApprovalGate {
    requests: mpsc::Sender<ApprovalRequest>,
    shutdown: CancellationToken,
}

/// Create a gate and the receiver the command task consumes.
pub fn approval_channel(shutdown: CancellationToken) -> (ApprovalGate, mpsc::Receiver<ApprovalRequest>) {
    let (tx, rx) = mpsc::channel(1);
    (
        ApprovalGate {
            requests: tx,
            shutdown,
        },
        rx,
    )
}

impl ApprovalGate {
    /// Decide whether `candidate` may be sent.
    ///
    /// Without human approval the text is approved as-is. Otherwise the call
    /// suspends until the operator answers or shutdown is requested. A
    /// vanished consumer counts as a rejection.
    pub async fn review(
        &self,
        candidate: &mut ReplyCandidate,
        incoming: &str,
        human_approval: bool,
    ) -> ApprovalDecision {
        if !candidate.safety_verdict.is_safe() {
            warn!("refusing to review a blocked reply");
            candidate.approval_status = ApprovalStatus::Rejected;
            return ApprovalDecision::Rejected;
        }

        if !human_approval {
            candidate.approval_status = ApprovalStatus::AutoApproved;
            return ApprovalDecision::Approved(candidate.text.clone());
        }

        let (respond, answer) = oneshot::channel();
        let request = ApprovalRequest {
            incoming: incoming.to_string(),
            reply: candidate.text.clone(),
            respond,
        };

        let sent = tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => return ApprovalDecision::Cancelled,
            sent = self.requests.send(request) => sent,
        };
        if sent.is_err() {
            warn!("approval consumer is gone, rejecting reply");
            candidate.approval_status = ApprovalStatus::Rejected;
            return ApprovalDecision::Rejected;
        }

        let answer = tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => return ApprovalDecision::Cancelled,
            answer = answer => answer,
        };

        match answer {
            Ok(OperatorAnswer::Approve) => {
                info!("reply approved by operator");
                candidate.approval_status = ApprovalStatus::Approved;
                ApprovalDecision::Approved(candidate.text.clone())
            }
            Ok(OperatorAnswer::Edit(text)) => {
                info!("reply edited by operator");
                candidate.approval_status = ApprovalStatus::Approved;
                candidate.text = text.clone();
                ApprovalDecision::Edited(text)
            }
            Ok(OperatorAnswer::Reject) => {
                info!("reply rejected by operator");
                candidate.approval_status = ApprovalStatus::Rejected;
                ApprovalDecision::Rejected
            }
            Err(_) => {
                warn!("approval request dropped without an answer, rejecting reply");
                candidate.approval_status = ApprovalStatus::Rejected;
                ApprovalDecision::Rejected
            }
        }
    }
}
