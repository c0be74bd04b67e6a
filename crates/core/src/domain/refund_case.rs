use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::request::NewRefundRequest;
use crate::domain::status::{
    ActorRole, DecisionKind, EligibilityStatus, RefundMethod, RefundStatus,
};
use crate::domain::support_case::CaseNumber;
use crate::domain::{prefixed_id, CustomerId, OrderId, ProductId};
use crate::eligibility::{EligibilityAssessment, EligibilityLine};
use crate::errors::DomainError;
use crate::lifecycle::rules::{evidence_request, refund_transition};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RefundCaseId(pub String);

impl RefundCaseId {
    pub fn generate() -> Self {
        Self(prefixed_id("RC"))
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefundDecision {
    pub agent_id: String,
    pub kind: DecisionKind,
    pub content: String,
    pub refund_amount: Option<Decimal>,
    pub refund_method: Option<RefundMethod>,
    pub decided_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionInput {
    pub agent_id: String,
    pub kind: DecisionKind,
    pub content: String,
    pub refund_amount: Option<Decimal>,
    pub refund_method: Option<RefundMethod>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefundCase {
    pub refund_case_id: RefundCaseId,
    pub case_number: CaseNumber,
    pub customer_id: CustomerId,
    pub order_id: OrderId,
    pub product_ids: Vec<ProductId>,
    pub request_reason: String,
    pub evidence_photos: Vec<String>,
    pub status: RefundStatus,
    pub eligibility_status: EligibilityStatus,
    pub products: Vec<EligibilityLine>,
    pub total_refund_amount: Decimal,
    pub eligibility_evaluated_on: NaiveDate,
    pub decision_reason: Option<String>,
    pub decided_by: Option<String>,
    pub approved_amount: Option<Decimal>,
    pub refund_method: Option<RefundMethod>,
    pub decisions: Vec<RefundDecision>,
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RefundCase {
    /// Opens a `Pending` refund whose eligibility comes from `assessment`.
    ///
    /// The assessment must cover every requested product; the eligibility
    /// fields are never taken from the request itself.
    pub fn open(
        refund_case_id: RefundCaseId,
        request: NewRefundRequest,
        assessment: EligibilityAssessment,
    ) -> Result<Self, DomainError> {
        request.validate()?;
        ensure_assessment_covers(&request.product_ids, &assessment)?;
        let now = Utc::now();

        Ok(Self {
            refund_case_id,
            case_number: request.case_number,
            customer_id: request.customer_id,
            order_id: request.order_id,
            product_ids: request.product_ids,
            request_reason: request.request_reason.trim().to_owned(),
            evidence_photos: request.evidence_photos,
            status: RefundStatus::Pending,
            eligibility_status: assessment.status,
            products: assessment.lines,
            total_refund_amount: assessment.total_refund_amount,
            eligibility_evaluated_on: assessment.evaluated_on,
            decision_reason: None,
            decided_by: None,
            approved_amount: None,
            refund_method: None,
            decisions: Vec::new(),
            version: 1,
            created_at: now,
            updated_at: now,
        })
    }

    /// Replaces the product list of a pending refund and recomputes eligibility.
    pub fn reassess(
        &mut self,
        product_ids: Vec<ProductId>,
        assessment: EligibilityAssessment,
    ) -> Result<(), DomainError> {
        if self.status != RefundStatus::Pending {
            return Err(DomainError::invariant(format!(
                "refund case `{}` is `{}`; products can only change while pending",
                self.refund_case_id.0, self.status
            )));
        }
        if product_ids.is_empty() {
            return Err(DomainError::invariant("a refund needs at least one product"));
        }
        ensure_assessment_covers(&product_ids, &assessment)?;

        self.product_ids = product_ids;
        self.eligibility_status = assessment.status;
        self.products = assessment.lines;
        self.total_refund_amount = assessment.total_refund_amount;
        self.eligibility_evaluated_on = assessment.evaluated_on;
        self.touch();
        Ok(())
    }

    pub fn can_transition_to(
        &self,
        next: RefundStatus,
        actor: ActorRole,
        decision_reason: Option<&str>,
    ) -> bool {
        refund_transition(self.status, next, actor, decision_reason).is_allowed()
    }

    pub fn transition_to(
        &mut self,
        next: RefundStatus,
        actor: ActorRole,
        decision_reason: Option<&str>,
    ) -> Result<(), DomainError> {
        refund_transition(self.status, next, actor, decision_reason)
            .into_result(self.status, next)?;

        let reason = decision_reason.map(str::trim).filter(|reason| !reason.is_empty());
        match next {
            RefundStatus::Approved | RefundStatus::Rejected => {
                self.decision_reason = reason.map(str::to_owned);
            }
            RefundStatus::Pending | RefundStatus::Completed => {}
        }
        self.status = next;
        self.touch();
        Ok(())
    }

    /// Records an agent decision, moving the refund when the decision kind
    /// implies a status change.
    pub fn apply_decision(
        &mut self,
        input: DecisionInput,
        actor: ActorRole,
    ) -> Result<&RefundDecision, DomainError> {
        if input.agent_id.trim().is_empty() {
            return Err(DomainError::invariant("decision agent_id is required"));
        }

        let mut approved_amount = None;
        match input.kind.target_status() {
            Some(target) => {
                refund_transition(self.status, target, actor, Some(&input.content))
                    .into_result(self.status, target)?;
                if input.kind == DecisionKind::Approval {
                    approved_amount = Some(self.validate_refund_amount(input.refund_amount)?);
                }
                self.transition_to(target, actor, Some(&input.content))?;
            }
            None => {
                evidence_request(self.status, actor).into_result(self.status, self.status)?;
                if input.content.trim().is_empty() {
                    return Err(DomainError::invariant(
                        "an evidence request must say what is missing",
                    ));
                }
                self.touch();
            }
        }

        if input.kind == DecisionKind::Approval {
            self.approved_amount = approved_amount;
            self.refund_method = input.refund_method;
        }
        if input.kind.target_status().is_some() {
            self.decided_by = Some(input.agent_id.clone());
        }

        self.decisions.push(RefundDecision {
            agent_id: input.agent_id,
            kind: input.kind,
            content: input.content.trim().to_owned(),
            refund_amount: approved_amount,
            refund_method: input.refund_method,
            decided_at: self.updated_at,
        });
        self.decisions.last().ok_or_else(|| DomainError::invariant("decision was not recorded"))
    }

    /// Amount actually paid out: the approved amount, or the eligible total.
    pub fn payable_amount(&self) -> Decimal {
        self.approved_amount.unwrap_or(self.total_refund_amount)
    }

    fn validate_refund_amount(&self, requested: Option<Decimal>) -> Result<Decimal, DomainError> {
        let amount = requested.unwrap_or(self.total_refund_amount);
        if amount < Decimal::ZERO {
            return Err(DomainError::invariant("refund amount must not be negative"));
        }
        if amount > self.total_refund_amount {
            return Err(DomainError::invariant(format!(
                "refund amount {amount} exceeds the eligible total {}",
                self.total_refund_amount
            )));
        }
        Ok(amount)
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

fn ensure_assessment_covers(
    product_ids: &[ProductId],
    assessment: &EligibilityAssessment,
) -> Result<(), DomainError> {
    for product_id in product_ids {
        if !assessment.lines.iter().any(|line| &line.product_id == product_id) {
            return Err(DomainError::invariant(format!(
                "no delivery record for product `{}`",
                product_id.0
            )));
        }
    }
    Ok(())
}
