use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::{OrderId, ProductId};
use crate::eligibility::ProductDelivery;
use crate::errors::DomainError;

/// One delivered product of an order; the source of refund eligibility.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub price: Decimal,
    pub delivery_date: NaiveDate,
}

impl OrderLine {
    pub fn to_delivery(&self) -> Result<ProductDelivery, DomainError> {
        ProductDelivery::new(self.product_id.clone(), self.delivery_date, self.price)
    }
}

/// Picks the order lines for `product_ids`, failing on any product the order
/// does not contain.
pub fn deliveries_for(
    lines: &[OrderLine],
    product_ids: &[ProductId],
) -> Result<Vec<ProductDelivery>, DomainError> {
    product_ids
        .iter()
        .map(|product_id| {
            lines
                .iter()
                .find(|line| &line.product_id == product_id)
                .ok_or_else(|| {
                    DomainError::invariant(format!(
                        "product `{}` is not part of the order",
                        product_id.0
                    ))
                })
                .and_then(OrderLine::to_delivery)
        })
        .collect()
}
