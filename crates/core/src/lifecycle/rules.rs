use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::status::{ActorRole, RefundStatus, SupportCaseStatus};
use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DenialReason {
    NoOp { status: String },
    ReopenRequiresAgent,
    AgentOnly { from: String, to: String },
    MissingDecisionReason,
    Terminal { status: String },
    NotPending { status: String },
    Unsupported { from: String, to: String },
}

impl fmt::Display for DenialReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoOp { status } => write!(f, "case is already `{status}`"),
            Self::ReopenRequiresAgent => f.write_str("only an agent can reopen a closed case"),
            Self::AgentOnly { from, to } => {
                write!(f, "only an agent can move a case from `{from}` to `{to}`")
            }
            Self::MissingDecisionReason => f.write_str("rejecting a refund requires a reason"),
            Self::Terminal { status } => write!(f, "refund is `{status}` and can no longer change"),
            Self::NotPending { status } => {
                write!(f, "evidence can only be requested while pending, refund is `{status}`")
            }
            Self::Unsupported { from, to } => {
                write!(f, "no transition from `{from}` to `{to}`")
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TransitionDecision {
    Allowed,
    Denied(DenialReason),
}

impl TransitionDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed)
    }

    pub fn into_result(
        self,
        from: impl fmt::Display,
        to: impl fmt::Display,
    ) -> Result<(), DomainError> {
        match self {
            Self::Allowed => Ok(()),
            Self::Denied(reason) => Err(DomainError::IllegalTransition {
                from: from.to_string(),
                to: to.to_string(),
                reason,
            }),
        }
    }
}

/// Support case transitions, including who may perform them.
pub fn support_transition(
    current: SupportCaseStatus,
    requested: SupportCaseStatus,
    actor: ActorRole,
) -> TransitionDecision {
    use SupportCaseStatus::{Closed, InProgress, Open};

    if current == requested {
        return TransitionDecision::Denied(DenialReason::NoOp { status: current.to_string() });
    }

    match (current, requested) {
        (Open, Closed) => TransitionDecision::Allowed,
        (Open, InProgress) | (InProgress, Closed) => agent_only(actor, current, requested),
        (Closed, Open) if actor.is_agent() => TransitionDecision::Allowed,
        (Closed, Open) => TransitionDecision::Denied(DenialReason::ReopenRequiresAgent),
        _ => TransitionDecision::Denied(DenialReason::Unsupported {
            from: current.to_string(),
            to: requested.to_string(),
        }),
    }
}

/// Refund transitions. Rejections carry a non-blank `decision_reason`.
pub fn refund_transition(
    current: RefundStatus,
    requested: RefundStatus,
    actor: ActorRole,
    decision_reason: Option<&str>,
) -> TransitionDecision {
    use RefundStatus::{Approved, Completed, Pending, Rejected};

    if current == requested {
        return TransitionDecision::Denied(DenialReason::NoOp { status: current.to_string() });
    }
    if current.is_terminal() {
        return TransitionDecision::Denied(DenialReason::Terminal { status: current.to_string() });
    }

    match (current, requested) {
        (Pending, Approved) | (Approved, Completed) => agent_only(actor, current, requested),
        (Pending, Rejected) => {
            if !actor.is_agent() {
                return agent_only(actor, current, requested);
            }
            match decision_reason.map(str::trim) {
                Some(reason) if !reason.is_empty() => TransitionDecision::Allowed,
                _ => TransitionDecision::Denied(DenialReason::MissingDecisionReason),
            }
        }
        _ => TransitionDecision::Denied(DenialReason::Unsupported {
            from: current.to_string(),
            to: requested.to_string(),
        }),
    }
}

/// Asking for more evidence keeps the refund where it is, and only agents
/// may ask while it is still pending.
pub fn evidence_request(current: RefundStatus, actor: ActorRole) -> TransitionDecision {
    if !actor.is_agent() {
        return agent_only(actor, current, current);
    }
    if current != RefundStatus::Pending {
        return TransitionDecision::Denied(DenialReason::NotPending { status: current.to_string() });
    }
    TransitionDecision::Allowed
}

fn agent_only(
    actor: ActorRole,
    from: impl fmt::Display,
    to: impl fmt::Display,
) -> TransitionDecision {
    if actor.is_agent() {
        TransitionDecision::Allowed
    } else {
        TransitionDecision::Denied(DenialReason::AgentOnly {
            from: from.to_string(),
            to: to.to_string(),
        })
    }
}
