pub mod aggregate;
pub mod rules;

pub use aggregate::CaseAggregate;
pub use rules::{
    evidence_request, refund_transition, support_transition, DenialReason, TransitionDecision,
};
