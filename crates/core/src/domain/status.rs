use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SupportCaseStatus {
    Open,
    InProgress,
    Closed,
}

impl SupportCaseStatus {
    pub const ALL: [Self; 3] = [Self::Open, Self::InProgress, Self::Closed];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::InProgress => "in_progress",
            Self::Closed => "closed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Closed)
    }
}

impl FromStr for SupportCaseStatus {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match normalize(value).as_str() {
            "open" => Ok(Self::Open),
            "inprogress" => Ok(Self::InProgress),
            "closed" => Ok(Self::Closed),
            _ => Err(DomainError::invalid_status("support case status", value)),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefundStatus {
    Pending,
    Approved,
    Rejected,
    Completed,
}

impl RefundStatus {
    pub const ALL: [Self; 4] = [Self::Pending, Self::Approved, Self::Rejected, Self::Completed];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Completed => "completed",
        }
    }

    /// `Rejected` and `Completed` refunds never change again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Rejected | Self::Completed)
    }
}

impl FromStr for RefundStatus {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match normalize(value).as_str() {
            "pending" => Ok(Self::Pending),
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            "completed" => Ok(Self::Completed),
            _ => Err(DomainError::invalid_status("refund status", value)),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EligibilityStatus {
    Eligible,
    PartiallyEligible,
    Ineligible,
}

impl EligibilityStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Eligible => "eligible",
            Self::PartiallyEligible => "partially_eligible",
            Self::Ineligible => "ineligible",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Eligible => "Eligible",
            Self::PartiallyEligible => "Partially Eligible",
            Self::Ineligible => "Ineligible",
        }
    }
}

impl FromStr for EligibilityStatus {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match normalize(value).as_str() {
            "eligible" => Ok(Self::Eligible),
            "partiallyeligible" => Ok(Self::PartiallyEligible),
            "ineligible" => Ok(Self::Ineligible),
            _ => Err(DomainError::invalid_status("eligibility status", value)),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseType {
    Question,
    Refund,
}

impl CaseType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Question => "question",
            Self::Refund => "refund",
        }
    }
}

impl FromStr for CaseType {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match normalize(value).as_str() {
            "question" => Ok(Self::Question),
            "refund" => Ok(Self::Refund),
            _ => Err(DomainError::invalid_status("case type", value)),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorRole {
    Customer,
    Agent,
}

impl ActorRole {
    pub const ALL: [Self; 2] = [Self::Customer, Self::Agent];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Customer => "customer",
            Self::Agent => "agent",
        }
    }

    pub fn is_agent(&self) -> bool {
        matches!(self, Self::Agent)
    }
}

impl FromStr for ActorRole {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match normalize(value).as_str() {
            "customer" => Ok(Self::Customer),
            "agent" => Ok(Self::Agent),
            _ => Err(DomainError::invalid_status("actor role", value)),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthorType {
    Customer,
    Agent,
}

impl AuthorType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Customer => "customer",
            Self::Agent => "agent",
        }
    }
}

impl From<ActorRole> for AuthorType {
    fn from(role: ActorRole) -> Self {
        match role {
            ActorRole::Customer => Self::Customer,
            ActorRole::Agent => Self::Agent,
        }
    }
}

impl FromStr for AuthorType {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match normalize(value).as_str() {
            "customer" => Ok(Self::Customer),
            "agent" => Ok(Self::Agent),
            _ => Err(DomainError::invalid_status("author type", value)),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefundMethod {
    Money,
    Voucher,
    Replacement,
}

impl RefundMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Money => "money",
            Self::Voucher => "voucher",
            Self::Replacement => "replacement",
        }
    }
}

impl FromStr for RefundMethod {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match normalize(value).as_str() {
            "money" => Ok(Self::Money),
            "voucher" => Ok(Self::Voucher),
            "replacement" => Ok(Self::Replacement),
            _ => Err(DomainError::invalid_status("refund method", value)),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionKind {
    Approval,
    Rejection,
    RequestAdditionalEvidence,
}

impl DecisionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Approval => "approval",
            Self::Rejection => "rejection",
            Self::RequestAdditionalEvidence => "request_additional_evidence",
        }
    }

    /// Status a pending refund moves to, if this decision moves it at all.
    pub fn target_status(&self) -> Option<RefundStatus> {
        match self {
            Self::Approval => Some(RefundStatus::Approved),
            Self::Rejection => Some(RefundStatus::Rejected),
            Self::RequestAdditionalEvidence => None,
        }
    }
}

impl FromStr for DecisionKind {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match normalize(value).as_str() {
            "approval" => Ok(Self::Approval),
            "rejection" => Ok(Self::Rejection),
            "requestadditionalevidence" => Ok(Self::RequestAdditionalEvidence),
            _ => Err(DomainError::invalid_status("decision kind", value)),
        }
    }
}

macro_rules! display_as_str {
    ($($ty:ty),* $(,)?) => {
        $(
            impl fmt::Display for $ty {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    f.write_str(self.as_str())
                }
            }
        )*
    };
}

display_as_str!(
    SupportCaseStatus,
    RefundStatus,
    EligibilityStatus,
    CaseType,
    ActorRole,
    AuthorType,
    RefundMethod,
    DecisionKind,
);

fn normalize(value: &str) -> String {
    value
        .trim()
        .chars()
        .filter(|ch| !matches!(ch, '_' | '-' | ' '))
        .flat_map(char::to_lowercase)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{
        ActorRole, CaseType, DecisionKind, EligibilityStatus, RefundStatus, SupportCaseStatus,
    };
    use crate::errors::DomainError;

    #[test]
    fn support_status_accepts_canonical_and_storage_spellings() {
        assert_eq!("Open".parse::<SupportCaseStatus>(), Ok(SupportCaseStatus::Open));
        assert_eq!("InProgress".parse::<SupportCaseStatus>(), Ok(SupportCaseStatus::InProgress));
        assert_eq!("in_progress".parse::<SupportCaseStatus>(), Ok(SupportCaseStatus::InProgress));
        assert_eq!(" closed ".parse::<SupportCaseStatus>(), Ok(SupportCaseStatus::Closed));
    }

    #[test]
    fn values_outside_the_closed_set_are_construction_errors() {
        let error = "resolved".parse::<SupportCaseStatus>().expect_err("resolved is not canonical");
        assert!(matches!(
            error,
            DomainError::InvalidStatus { kind: "support case status", ref value } if value == "resolved"
        ));

        assert!("executed".parse::<RefundStatus>().is_err());
        assert!("".parse::<CaseType>().is_err());
        assert!("admin".parse::<ActorRole>().is_err());
    }

    #[test]
    fn storage_encoding_round_trips() {
        for status in SupportCaseStatus::ALL {
            assert_eq!(status.as_str().parse::<SupportCaseStatus>(), Ok(status));
        }
        for status in RefundStatus::ALL {
            assert_eq!(status.as_str().parse::<RefundStatus>(), Ok(status));
        }
        assert_eq!(
            "Partially Eligible".parse::<EligibilityStatus>(),
            Ok(EligibilityStatus::PartiallyEligible)
        );
        assert_eq!(
            DecisionKind::RequestAdditionalEvidence.as_str().parse::<DecisionKind>(),
            Ok(DecisionKind::RequestAdditionalEvidence)
        );
    }

    #[test]
    fn only_rejected_and_completed_refunds_are_terminal() {
        let terminal: Vec<_> = RefundStatus::ALL.into_iter().filter(|s| s.is_terminal()).collect();
        assert_eq!(terminal, vec![RefundStatus::Rejected, RefundStatus::Completed]);
    }

    #[test]
    fn serde_uses_snake_case_wire_names() {
        let encoded = serde_json::to_string(&SupportCaseStatus::InProgress).expect("serialize");
        assert_eq!(encoded, "\"in_progress\"");
        let decoded: EligibilityStatus =
            serde_json::from_str("\"partially_eligible\"").expect("deserialize");
        assert_eq!(decoded, EligibilityStatus::PartiallyEligible);
    }
}
