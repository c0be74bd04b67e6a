use std::fs;
use std::path::Path;

use anyhow::{bail, Context};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use supportdesk_core::eligibility::{delivery_day, evaluate, EligibilityAssessment, ProductDelivery};
use supportdesk_core::ProductId;

use crate::commands::{CommandResult, EXIT_INPUT, EXIT_RUNTIME};

/// One product line. Either a calendar `delivery_date` or a timestamped
/// `delivered_at`, where a partial day counts as a full one.
#[derive(Debug, Deserialize)]
struct ProductInput {
    product_id: ProductId,
    #[serde(default)]
    delivery_date: Option<NaiveDate>,
    #[serde(default)]
    delivered_at: Option<DateTime<Utc>>,
    price: Decimal,
}

impl ProductInput {
    fn into_delivery(self, now: DateTime<Utc>) -> anyhow::Result<ProductDelivery> {
        let delivered_on = match (self.delivery_date, self.delivered_at) {
            (Some(date), None) => date,
            (None, Some(at)) => delivery_day(now, at),
            _ => bail!(
                "product `{}` needs exactly one of `delivery_date` or `delivered_at`",
                self.product_id.0
            ),
        };
        Ok(ProductDelivery::new(self.product_id, delivered_on, self.price)?)
    }
}

pub fn run(file: &Path, today: Option<&str>) -> CommandResult {
    let assessment = match assess(file, today) {
        Ok(assessment) => assessment,
        Err(error) => {
            return CommandResult::failure(
                "eligibility",
                "invalid_input",
                format!("{error:#}"),
                EXIT_INPUT,
            );
        }
    };

    let message = format!(
        "{}: {} of {} products eligible on {}; refundable total {}",
        assessment.status.label(),
        assessment.eligible_count(),
        assessment.lines.len(),
        assessment.evaluated_on,
        assessment.total_refund_amount
    );
    match serde_json::to_value(&assessment) {
        Ok(data) => CommandResult::success_with_data("eligibility", message, data),
        Err(error) => CommandResult::failure(
            "eligibility",
            "serialization",
            format!("could not encode assessment: {error}"),
            EXIT_RUNTIME,
        ),
    }
}

fn assess(file: &Path, today: Option<&str>) -> anyhow::Result<EligibilityAssessment> {
    let now = match today {
        Some(raw) => NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
            .with_context(|| format!("--today `{raw}` is not a YYYY-MM-DD date"))?
            .and_time(NaiveTime::MIN)
            .and_utc(),
        None => Utc::now(),
    };

    let raw = fs::read_to_string(file)
        .with_context(|| format!("could not read `{}`", file.display()))?;
    let products: Vec<ProductInput> = serde_json::from_str(&raw)
        .with_context(|| format!("`{}` is not a JSON array of products", file.display()))?;

    let deliveries = products
        .into_iter()
        .map(|product| product.into_delivery(now))
        .collect::<anyhow::Result<Vec<_>>>()?;

    Ok(evaluate(now.date_naive(), &deliveries))
}
