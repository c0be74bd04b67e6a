use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::comment::{Comment, NewComment};
use crate::domain::refund_case::RefundCaseId;
use crate::domain::request::CaseRequest;
use crate::domain::status::{ActorRole, AuthorType, CaseType, SupportCaseStatus};
use crate::domain::{prefixed_id, CustomerId, OrderId};
use crate::errors::DomainError;
use crate::lifecycle::rules::support_transition;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CaseNumber(pub String);

impl CaseNumber {
    pub fn generate() -> Self {
        Self(prefixed_id("SC"))
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupportCase {
    pub case_number: CaseNumber,
    pub customer_id: CustomerId,
    pub case_type: CaseType,
    pub subject: String,
    pub description: String,
    pub order_id: Option<OrderId>,
    pub status: SupportCaseStatus,
    pub refund_request_id: Option<RefundCaseId>,
    pub assigned_agent_id: Option<String>,
    pub comments: Vec<Comment>,
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SupportCase {
    /// Builds a new `Open` case from a validated creation request.
    pub fn open(case_number: CaseNumber, request: &CaseRequest) -> Result<Self, DomainError> {
        request.validate()?;
        let now = Utc::now();

        Ok(Self {
            case_number,
            customer_id: request.customer_id().clone(),
            case_type: request.case_type(),
            subject: request.subject().trim().to_owned(),
            description: request.description().trim().to_owned(),
            order_id: request.order_id().cloned(),
            status: SupportCaseStatus::Open,
            refund_request_id: None,
            assigned_agent_id: None,
            comments: Vec::new(),
            version: 1,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn can_transition_to(&self, next: SupportCaseStatus, actor: ActorRole) -> bool {
        support_transition(self.status, next, actor).is_allowed()
    }

    pub fn transition_to(
        &mut self,
        next: SupportCaseStatus,
        actor: ActorRole,
    ) -> Result<(), DomainError> {
        support_transition(self.status, next, actor).into_result(self.status, next)?;
        self.status = next;
        self.touch();
        Ok(())
    }

    /// Takes an open case into `InProgress` on behalf of `agent_id`.
    pub fn assign_agent(&mut self, agent_id: impl Into<String>) -> Result<(), DomainError> {
        let agent_id = agent_id.into();
        if agent_id.trim().is_empty() {
            return Err(DomainError::invariant("agent id is required for assignment"));
        }
        self.transition_to(SupportCaseStatus::InProgress, ActorRole::Agent)?;
        self.assigned_agent_id = Some(agent_id);
        Ok(())
    }

    pub fn link_refund(&mut self, refund_case_id: RefundCaseId) -> Result<(), DomainError> {
        if let Some(existing) = &self.refund_request_id {
            return Err(DomainError::AlreadyLinked {
                case_number: self.case_number.0.clone(),
                existing: existing.0.clone(),
            });
        }
        if refund_case_id.0.trim().is_empty() {
            return Err(DomainError::invariant("refund case id must not be empty"));
        }

        self.refund_request_id = Some(refund_case_id);
        self.case_type = CaseType::Refund;
        self.touch();
        Ok(())
    }

    pub fn append_comment(&mut self, entry: NewComment) -> Result<&Comment, DomainError> {
        entry.validate()?;
        if self.status == SupportCaseStatus::Closed && entry.author_type == AuthorType::Customer {
            return Err(DomainError::CaseClosed { case_number: self.case_number.0.clone() });
        }

        let now = Utc::now();
        self.comments.push(entry.into_comment(now));
        self.updated_at = now;
        self.comments.last().ok_or_else(|| DomainError::invariant("comment was not appended"))
    }

    pub fn customer_visible_comments(&self) -> impl Iterator<Item = &Comment> {
        self.comments.iter().filter(|comment| comment.visible_to_customer())
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
