use chrono::{DateTime, Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::status::EligibilityStatus;
use crate::domain::ProductId;
use crate::errors::DomainError;

/// Days after delivery during which a product can still be refunded.
pub const ELIGIBILITY_WINDOW_DAYS: i64 = 14;

const SECONDS_PER_DAY: i64 = 86_400;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductDelivery {
    product_id: ProductId,
    delivery_date: NaiveDate,
    price: Decimal,
}

impl ProductDelivery {
    pub fn new(
        product_id: ProductId,
        delivery_date: NaiveDate,
        price: Decimal,
    ) -> Result<Self, DomainError> {
        if price < Decimal::ZERO {
            return Err(DomainError::invariant(format!(
                "price of product `{}` must not be negative",
                product_id.0
            )));
        }
        Ok(Self { product_id, delivery_date, price })
    }

    pub fn product_id(&self) -> &ProductId {
        &self.product_id
    }

    pub fn delivery_date(&self) -> NaiveDate {
        self.delivery_date
    }

    pub fn price(&self) -> Decimal {
        self.price
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EligibilityLine {
    pub product_id: ProductId,
    pub price: Decimal,
    pub delivery_date: NaiveDate,
    pub days_since_delivery: i64,
    pub eligible: bool,
    pub refund_amount: Decimal,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EligibilityAssessment {
    pub status: EligibilityStatus,
    pub total_refund_amount: Decimal,
    pub lines: Vec<EligibilityLine>,
    pub evaluated_on: NaiveDate,
}

impl EligibilityAssessment {
    pub fn eligible_count(&self) -> usize {
        self.lines.iter().filter(|line| line.eligible).count()
    }
}

pub fn days_since_delivery(today: NaiveDate, delivery_date: NaiveDate) -> i64 {
    (today - delivery_date).num_days()
}

/// Whole days between two instants, counting a partial day as a full one.
pub fn days_since_delivered_at(now: DateTime<Utc>, delivered_at: DateTime<Utc>) -> i64 {
    let seconds = (now - delivered_at).num_seconds();
    let days = seconds.div_euclid(SECONDS_PER_DAY);
    if seconds.rem_euclid(SECONDS_PER_DAY) == 0 {
        days
    } else {
        days + 1
    }
}

/// Calendar delivery date for a timestamped delivery, as seen from `now`.
pub fn delivery_day(now: DateTime<Utc>, delivered_at: DateTime<Utc>) -> NaiveDate {
    now.date_naive() - Duration::days(days_since_delivered_at(now, delivered_at))
}

pub fn is_within_window(days_since_delivery: i64) -> bool {
    (0..=ELIGIBILITY_WINDOW_DAYS).contains(&days_since_delivery)
}

/// Computes refund eligibility for `products` as of `today`.
///
/// An empty list is `Ineligible` with a zero total; callers are expected to
/// reject empty refund requests before getting here.
pub fn evaluate(today: NaiveDate, products: &[ProductDelivery]) -> EligibilityAssessment {
    let lines: Vec<EligibilityLine> = products
        .iter()
        .map(|product| {
            let days = days_since_delivery(today, product.delivery_date);
            let eligible = is_within_window(days);
            EligibilityLine {
                product_id: product.product_id.clone(),
                price: product.price,
                delivery_date: product.delivery_date,
                days_since_delivery: days,
                eligible,
                refund_amount: if eligible { product.price } else { Decimal::ZERO },
            }
        })
        .collect();

    let eligible = lines.iter().filter(|line| line.eligible).count();
    let status = if eligible == 0 {
        EligibilityStatus::Ineligible
    } else if eligible == lines.len() {
        EligibilityStatus::Eligible
    } else {
        EligibilityStatus::PartiallyEligible
    };
    let total_refund_amount = lines.iter().map(|line| line.refund_amount).sum();

    EligibilityAssessment { status, total_refund_amount, lines, evaluated_on: today }
}

pub trait EligibilityPolicy: Send + Sync {
    fn assess(&self, today: NaiveDate, products: &[ProductDelivery]) -> EligibilityAssessment;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct DeliveryWindowPolicy;

impl EligibilityPolicy for DeliveryWindowPolicy {
    fn assess(&self, today: NaiveDate, products: &[ProductDelivery]) -> EligibilityAssessment {
        evaluate(today, products)
    }
}
