pub mod audit;
pub mod config;
pub mod domain;
pub mod eligibility;
pub mod errors;
pub mod lifecycle;
pub mod vocabulary;

pub use domain::comment::{Comment, CommentId, NewComment};
pub use domain::order::{deliveries_for, OrderLine};
pub use domain::refund_case::{DecisionInput, RefundCase, RefundCaseId, RefundDecision};
pub use domain::request::{CaseRequest, NewRefundRequest};
pub use domain::status::{
    ActorRole, AuthorType, CaseType, DecisionKind, EligibilityStatus, RefundMethod, RefundStatus,
    SupportCaseStatus,
};
pub use domain::support_case::{CaseNumber, SupportCase};
pub use domain::{CustomerId, OrderId, ProductId};
pub use eligibility::{
    evaluate, DeliveryWindowPolicy, EligibilityAssessment, EligibilityLine, EligibilityPolicy,
    ProductDelivery, ELIGIBILITY_WINDOW_DAYS,
};
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use lifecycle::{CaseAggregate, DenialReason, TransitionDecision};
pub use vocabulary::{translate_legacy_case_status, translate_legacy_refund_status};
