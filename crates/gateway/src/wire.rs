//! Request and response bodies that differ from the domain types.
//!
//! Where a domain type already has the wire shape (`CaseRequest`,
//! `NewComment`, `NewRefundRequest`, `SupportCase`, `RefundCase`) it is sent
//! as is.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use supportdesk_core::{
    CaseNumber, CaseType, DecisionInput, DecisionKind, ProductId, RefundCase, RefundCaseId,
    RefundMethod, SupportCase, SupportCaseStatus,
};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateCaseTypeRequest {
    pub case_type: CaseType,
    pub refund_request_id: RefundCaseId,
}

/// Body of `PUT /refund-cases/{id}/products`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateProductsRequest {
    pub product_ids: Vec<ProductId>,
}

/// Body of `POST /refund-cases/{id}/decisions`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionRequest {
    pub agent_id: String,
    pub response_type: DecisionKind,
    pub response_content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refund_amount: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refund_method: Option<RefundMethod>,
}

impl DecisionRequest {
    pub fn into_input(self) -> DecisionInput {
        DecisionInput {
            agent_id: self.agent_id,
            kind: self.response_type,
            content: self.response_content,
            refund_amount: self.refund_amount,
            refund_method: self.refund_method,
        }
    }
}

impl From<DecisionInput> for DecisionRequest {
    fn from(input: DecisionInput) -> Self {
        Self {
            agent_id: input.agent_id,
            response_type: input.kind,
            response_content: input.content,
            refund_amount: input.refund_amount,
            refund_method: input.refund_method,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupportCaseSummary {
    pub case_number: CaseNumber,
    pub subject: String,
    pub status: SupportCaseStatus,
    pub assigned_agent_id: Option<String>,
    pub version: u64,
}

impl From<&SupportCase> for SupportCaseSummary {
    fn from(case: &SupportCase) -> Self {
        Self {
            case_number: case.case_number.clone(),
            subject: case.subject.clone(),
            status: case.status,
            assigned_agent_id: case.assigned_agent_id.clone(),
            version: case.version,
        }
    }
}

/// Body of `GET /refund-cases/{id}/detailed`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefundCaseDetail {
    pub refund_case: RefundCase,
    pub support_case: Option<SupportCaseSummary>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub detail: String,
    pub error_class: String,
}
