use async_trait::async_trait;
use thiserror::Error;

use supportdesk_core::domain::order::OrderLine;
use supportdesk_core::domain::refund_case::{RefundCase, RefundCaseId};
use supportdesk_core::domain::status::RefundStatus;
use supportdesk_core::domain::support_case::{CaseNumber, SupportCase};
use supportdesk_core::domain::{CustomerId, OrderId};

pub mod order_line;
pub mod refund_case;
pub mod support_case;

mod codec;

pub use order_line::SqlOrderLineRepository;
pub use refund_case::SqlRefundCaseRepository;
pub use support_case::SqlSupportCaseRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("`{resource}` was modified concurrently: expected version {expected}, found {actual}")]
    VersionConflict { resource: String, expected: u64, actual: u64 },
    #[error("`{0}` already exists")]
    Duplicate(String),
    #[error("`{0}` does not exist")]
    NotFound(String),
}

/// Support case storage.
///
/// `insert` stores a new case at version 1. `update` writes the case only if
/// the stored version still equals `case.version` and returns the case with
/// its version bumped. Comments are append-only.
#[async_trait]
pub trait SupportCaseRepository: Send + Sync {
    async fn find_by_number(
        &self,
        case_number: &CaseNumber,
    ) -> Result<Option<SupportCase>, RepositoryError>;

    async fn list_for_customer(
        &self,
        customer_id: &CustomerId,
    ) -> Result<Vec<SupportCase>, RepositoryError>;

    async fn insert(&self, case: SupportCase) -> Result<SupportCase, RepositoryError>;

    async fn update(&self, case: SupportCase) -> Result<SupportCase, RepositoryError>;
}

/// How `RefundCaseRepository::insert_linked` writes the owning support case.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CaseWrite {
    /// The case is new and is inserted at version 1.
    Insert,
    /// The case exists and is updated only if still at `case.version`.
    Update,
}

#[async_trait]
pub trait RefundCaseRepository: Send + Sync {
    async fn find_by_id(&self, id: &RefundCaseId) -> Result<Option<RefundCase>, RepositoryError>;

    async fn find_by_case_number(
        &self,
        case_number: &CaseNumber,
    ) -> Result<Option<RefundCase>, RepositoryError>;

    async fn list_for_customer(
        &self,
        customer_id: &CustomerId,
    ) -> Result<Vec<RefundCase>, RepositoryError>;

    /// All refunds, newest first, optionally narrowed to one status.
    async fn list(&self, status: Option<RefundStatus>) -> Result<Vec<RefundCase>, RepositoryError>;

    async fn insert(&self, refund: RefundCase) -> Result<RefundCase, RepositoryError>;

    /// Inserts `refund` and writes the support case that links it in one
    /// transaction. When either write fails neither row changes.
    async fn insert_linked(
        &self,
        refund: RefundCase,
        case: SupportCase,
        write: CaseWrite,
    ) -> Result<(SupportCase, RefundCase), RepositoryError>;

    async fn update(&self, refund: RefundCase) -> Result<RefundCase, RepositoryError>;
}

#[async_trait]
pub trait OrderLineRepository: Send + Sync {
    async fn find_for_order(&self, order_id: &OrderId) -> Result<Vec<OrderLine>, RepositoryError>;

    async fn save(&self, line: OrderLine) -> Result<(), RepositoryError>;
}
