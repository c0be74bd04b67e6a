use std::sync::Arc;

use axum::Router;
use chrono::{NaiveDate, Utc};
use supportdesk_core::audit::{AuditSink, TracingAuditSink};
use supportdesk_core::eligibility::{DeliveryWindowPolicy, EligibilityPolicy};
use supportdesk_db::repositories::{
    OrderLineRepository, RefundCaseRepository, SqlOrderLineRepository, SqlRefundCaseRepository,
    SqlSupportCaseRepository, SupportCaseRepository,
};
use supportdesk_db::DbPool;

use crate::{health, refund, support};

/// Source of "today" for eligibility windows.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Clock {
    System,
    Fixed(NaiveDate),
}

impl Clock {
    pub fn today(&self) -> NaiveDate {
        match self {
            Self::System => Utc::now().date_naive(),
            Self::Fixed(date) => *date,
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub cases: Arc<dyn SupportCaseRepository>,
    pub refunds: Arc<dyn RefundCaseRepository>,
    pub order_lines: Arc<dyn OrderLineRepository>,
    pub audit: Arc<dyn AuditSink>,
    pub policy: Arc<dyn EligibilityPolicy>,
    pub clock: Clock,
}

impl AppState {
    pub fn from_pool(pool: DbPool) -> Self {
        Self {
            cases: Arc::new(SqlSupportCaseRepository::new(pool.clone())),
            refunds: Arc::new(SqlRefundCaseRepository::new(pool.clone())),
            order_lines: Arc::new(SqlOrderLineRepository::new(pool)),
            audit: Arc::new(TracingAuditSink),
            policy: Arc::new(DeliveryWindowPolicy),
            clock: Clock::System,
        }
    }

    pub fn with_audit(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = audit;
        self
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_policy(mut self, policy: Arc<dyn EligibilityPolicy>) -> Self {
        self.policy = policy;
        self
    }
}

/// Support, refund, and health routes on one router.
pub fn app(state: AppState, db_pool: DbPool) -> Router {
    Router::new()
        .merge(support::router(state.clone()))
        .merge(refund::router(state))
        .merge(health::router(db_pool))
}
