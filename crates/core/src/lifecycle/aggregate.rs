use crate::audit::{AuditCategory, AuditContext, AuditOutcome, AuditSink};
use crate::domain::comment::{Comment, NewComment};
use crate::domain::refund_case::{DecisionInput, RefundCase, RefundCaseId, RefundDecision};
use crate::domain::status::{ActorRole, RefundStatus, SupportCaseStatus};
use crate::domain::support_case::SupportCase;
use crate::errors::DomainError;

/// One support case plus the refund case it owns, if any.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CaseAggregate {
    case: SupportCase,
    refund: Option<RefundCase>,
}

impl CaseAggregate {
    pub fn new(case: SupportCase) -> Self {
        Self { case, refund: None }
    }

    pub fn with_refund(case: SupportCase, refund: RefundCase) -> Result<Self, DomainError> {
        let mut aggregate = Self::new(case);
        aggregate.attach_refund(refund)?;
        Ok(aggregate)
    }

    pub fn case(&self) -> &SupportCase {
        &self.case
    }

    pub fn refund(&self) -> Option<&RefundCase> {
        self.refund.as_ref()
    }

    pub fn into_parts(self) -> (SupportCase, Option<RefundCase>) {
        (self.case, self.refund)
    }

    pub fn link_refund(&mut self, refund_case_id: RefundCaseId) -> Result<(), DomainError> {
        self.case.link_refund(refund_case_id)
    }

    /// Attaches the full refund record. It must belong to this case and
    /// match any refund id already linked.
    pub fn attach_refund(&mut self, refund: RefundCase) -> Result<(), DomainError> {
        if refund.case_number != self.case.case_number {
            return Err(DomainError::invariant(format!(
                "refund case `{}` belongs to `{}`, not `{}`",
                refund.refund_case_id.0, refund.case_number.0, self.case.case_number.0
            )));
        }

        match &self.case.refund_request_id {
            Some(existing) if *existing != refund.refund_case_id => {
                return Err(DomainError::AlreadyLinked {
                    case_number: self.case.case_number.0.clone(),
                    existing: existing.0.clone(),
                });
            }
            Some(_) => {}
            None => self.case.link_refund(refund.refund_case_id.clone())?,
        }

        self.refund = Some(refund);
        Ok(())
    }

    pub fn append_comment(&mut self, entry: NewComment) -> Result<&Comment, DomainError> {
        self.case.append_comment(entry)
    }

    pub fn apply_transition(
        &mut self,
        next: SupportCaseStatus,
        actor: ActorRole,
    ) -> Result<&Self, DomainError> {
        self.case.transition_to(next, actor)?;
        Ok(self)
    }

    pub fn apply_transition_with_audit<S>(
        &mut self,
        next: SupportCaseStatus,
        actor: ActorRole,
        sink: &S,
        audit: &AuditContext,
    ) -> Result<&Self, DomainError>
    where
        S: AuditSink + ?Sized,
    {
        let from = self.case.status;
        match self.case.transition_to(next, actor) {
            Ok(()) => {
                sink.emit(
                    audit
                        .event("case.transition_applied", AuditCategory::Lifecycle, AuditOutcome::Success)
                        .with_metadata("from", from.as_str())
                        .with_metadata("to", next.as_str())
                        .with_metadata("actor_role", actor.as_str()),
                );
                Ok(self)
            }
            Err(error) => {
                sink.emit(
                    audit
                        .event("case.transition_rejected", AuditCategory::Lifecycle, AuditOutcome::Rejected)
                        .with_metadata("from", from.as_str())
                        .with_metadata("to", next.as_str())
                        .with_metadata("actor_role", actor.as_str())
                        .with_metadata("error", error.to_string()),
                );
                Err(error)
            }
        }
    }

    pub fn apply_refund_transition(
        &mut self,
        next: RefundStatus,
        actor: ActorRole,
        decision_reason: Option<&str>,
    ) -> Result<&Self, DomainError> {
        self.refund_mut()?.transition_to(next, actor, decision_reason)?;
        Ok(self)
    }

    pub fn apply_refund_decision(
        &mut self,
        input: DecisionInput,
        actor: ActorRole,
    ) -> Result<&RefundDecision, DomainError> {
        self.refund_mut()?.apply_decision(input, actor)
    }

    pub fn customer_visible_comments(&self) -> impl Iterator<Item = &Comment> {
        self.case.customer_visible_comments()
    }

    fn refund_mut(&mut self) -> Result<&mut RefundCase, DomainError> {
        let case_number = &self.case.case_number;
        self.refund.as_mut().ok_or_else(|| {
            DomainError::invariant(format!("support case `{}` has no refund attached", case_number.0))
        })
    }
}
