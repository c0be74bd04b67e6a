use std::collections::HashSet;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::status::CaseType;
use crate::domain::support_case::CaseNumber;
use crate::domain::{CustomerId, OrderId, ProductId};
use crate::errors::DomainError;

/// Case creation payload. The variant decides which fields are required.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "case_type", rename_all = "snake_case")]
pub enum CaseRequest {
    Question {
        customer_id: CustomerId,
        subject: String,
        description: String,
    },
    Refund {
        customer_id: CustomerId,
        subject: String,
        description: String,
        order_id: OrderId,
        #[serde(default)]
        product_ids: Vec<ProductId>,
        #[serde(default)]
        delivery_date: Option<NaiveDate>,
        #[serde(default)]
        refund_reason: Option<String>,
    },
}

impl CaseRequest {
    pub fn case_type(&self) -> CaseType {
        match self {
            Self::Question { .. } => CaseType::Question,
            Self::Refund { .. } => CaseType::Refund,
        }
    }

    pub fn customer_id(&self) -> &CustomerId {
        match self {
            Self::Question { customer_id, .. } | Self::Refund { customer_id, .. } => customer_id,
        }
    }

    pub fn subject(&self) -> &str {
        match self {
            Self::Question { subject, .. } | Self::Refund { subject, .. } => subject,
        }
    }

    pub fn description(&self) -> &str {
        match self {
            Self::Question { description, .. } | Self::Refund { description, .. } => description,
        }
    }

    pub fn order_id(&self) -> Option<&OrderId> {
        match self {
            Self::Question { .. } => None,
            Self::Refund { order_id, .. } => Some(order_id),
        }
    }

    pub fn product_ids(&self) -> &[ProductId] {
        match self {
            Self::Question { .. } => &[],
            Self::Refund { product_ids, .. } => product_ids,
        }
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        require_text("customer_id", &self.customer_id().0)?;
        require_text("subject", self.subject())?;
        require_text("description", self.description())?;

        if let Self::Refund { order_id, product_ids, refund_reason, .. } = self {
            require_text("order_id", &order_id.0)?;
            require_products(product_ids)?;
            if let Some(reason) = refund_reason {
                require_text("refund_reason", reason)?;
            }
        }
        Ok(())
    }

    /// Refund request implied by a `Refund` case once its number is known.
    pub fn to_refund_request(&self, case_number: &CaseNumber) -> Option<NewRefundRequest> {
        match self {
            Self::Question { .. } => None,
            Self::Refund { customer_id, order_id, product_ids, refund_reason, description, .. } => {
                Some(NewRefundRequest {
                    case_number: case_number.clone(),
                    customer_id: customer_id.clone(),
                    order_id: order_id.clone(),
                    product_ids: product_ids.clone(),
                    request_reason: refund_reason.clone().unwrap_or_else(|| description.clone()),
                    evidence_photos: Vec::new(),
                })
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewRefundRequest {
    pub case_number: CaseNumber,
    pub customer_id: CustomerId,
    pub order_id: OrderId,
    pub product_ids: Vec<ProductId>,
    pub request_reason: String,
    #[serde(default)]
    pub evidence_photos: Vec<String>,
}

impl NewRefundRequest {
    pub fn validate(&self) -> Result<(), DomainError> {
        require_text("case_number", &self.case_number.0)?;
        require_text("customer_id", &self.customer_id.0)?;
        require_text("order_id", &self.order_id.0)?;
        require_text("request_reason", &self.request_reason)?;
        require_products(&self.product_ids)
    }
}

fn require_text(field: &str, value: &str) -> Result<(), DomainError> {
    if value.trim().is_empty() {
        return Err(DomainError::invariant(format!("{field} must not be empty")));
    }
    Ok(())
}

fn require_products(product_ids: &[ProductId]) -> Result<(), DomainError> {
    if product_ids.is_empty() {
        return Err(DomainError::invariant("a refund needs at least one product"));
    }
    let mut seen = HashSet::new();
    for product_id in product_ids {
        require_text("product_id", &product_id.0)?;
        if !seen.insert(product_id) {
            return Err(DomainError::invariant(format!(
                "product `{}` is listed more than once",
                product_id.0
            )));
        }
    }
    Ok(())
}
