use sqlx::sqlite::SqliteRow;
use sqlx::{Row, Sqlite, Transaction};

use supportdesk_core::domain::refund_case::{RefundCase, RefundCaseId, RefundDecision};
use supportdesk_core::domain::status::RefundStatus;
use supportdesk_core::domain::support_case::{CaseNumber, SupportCase};
use supportdesk_core::domain::{CustomerId, OrderId};

use super::codec::{
    decode_json, encode_json, parse_date, parse_decimal, parse_enum, parse_optional_decimal,
    parse_optional_enum, parse_timestamp, parse_version, version_param,
};
use super::support_case::{insert_case, update_case};
use super::{CaseWrite, RefundCaseRepository, RepositoryError};
use crate::DbPool;

const REFUND_COLUMNS: &str = "refund_case_id, case_number, customer_id, order_id, product_ids_json,
                              request_reason, evidence_photos_json, status, eligibility_status,
                              products_json, total_refund_amount, eligibility_evaluated_on,
                              decision_reason, decided_by, approved_amount, refund_method,
                              version, created_at, updated_at";

pub struct SqlRefundCaseRepository {
    pool: DbPool,
}

impl SqlRefundCaseRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn hydrate(&self, row: SqliteRow) -> Result<RefundCase, RepositoryError> {
        let mut refund = refund_from_row(row)?;
        let rows = sqlx::query(
            "SELECT agent_id, kind, content, refund_amount, refund_method, decided_at
             FROM refund_decision WHERE refund_case_id = ? ORDER BY position ASC",
        )
        .bind(&refund.refund_case_id.0)
        .fetch_all(&self.pool)
        .await?;
        refund.decisions = rows.into_iter().map(decision_from_row).collect::<Result<_, _>>()?;
        Ok(refund)
    }

    async fn find_one(
        &self,
        column: &str,
        value: &str,
    ) -> Result<Option<RefundCase>, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {REFUND_COLUMNS} FROM refund_case WHERE {column} = ?"))
            .bind(value)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(Some(self.hydrate(row).await?)),
            None => Ok(None),
        }
    }

    async fn hydrate_all(&self, rows: Vec<SqliteRow>) -> Result<Vec<RefundCase>, RepositoryError> {
        let mut refunds = Vec::with_capacity(rows.len());
        for row in rows {
            refunds.push(self.hydrate(row).await?);
        }
        Ok(refunds)
    }
}

#[async_trait::async_trait]
impl RefundCaseRepository for SqlRefundCaseRepository {
    async fn find_by_id(&self, id: &RefundCaseId) -> Result<Option<RefundCase>, RepositoryError> {
        self.find_one("refund_case_id", &id.0).await
    }

    async fn find_by_case_number(
        &self,
        case_number: &CaseNumber,
    ) -> Result<Option<RefundCase>, RepositoryError> {
        self.find_one("case_number", &case_number.0).await
    }

    async fn list_for_customer(
        &self,
        customer_id: &CustomerId,
    ) -> Result<Vec<RefundCase>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {REFUND_COLUMNS} FROM refund_case WHERE customer_id = ?
             ORDER BY created_at DESC, refund_case_id ASC"
        ))
        .bind(&customer_id.0)
        .fetch_all(&self.pool)
        .await?;

        self.hydrate_all(rows).await
    }

    async fn list(&self, status: Option<RefundStatus>) -> Result<Vec<RefundCase>, RepositoryError> {
        let filter = if status.is_some() { "WHERE status = ?" } else { "" };
        let sql = format!(
            "SELECT {REFUND_COLUMNS} FROM refund_case {filter}
             ORDER BY created_at DESC, refund_case_id ASC"
        );
        let mut query = sqlx::query(&sql);
        if let Some(status) = status {
            query = query.bind(status.as_str());
        }
        let rows = query.fetch_all(&self.pool).await?;

        self.hydrate_all(rows).await
    }

    async fn insert(&self, refund: RefundCase) -> Result<RefundCase, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        insert_refund(&mut tx, &refund).await?;
        tx.commit().await?;

        tracing::debug!(
            event_name = "persistence.refund_case.inserted",
            refund_case_id = %refund.refund_case_id.0,
            case_number = %refund.case_number.0,
            "refund case inserted"
        );
        Ok(refund)
    }

    async fn insert_linked(
        &self,
        refund: RefundCase,
        mut case: SupportCase,
        write: CaseWrite,
    ) -> Result<(SupportCase, RefundCase), RepositoryError> {
        let mut tx = self.pool.begin().await?;
        match write {
            CaseWrite::Insert => insert_case(&mut tx, &case).await?,
            CaseWrite::Update => update_case(&mut tx, &case).await?,
        }
        insert_refund(&mut tx, &refund).await?;
        tx.commit().await?;

        if write == CaseWrite::Update {
            case.version += 1;
        }
        tracing::debug!(
            event_name = "persistence.refund_case.linked",
            refund_case_id = %refund.refund_case_id.0,
            case_number = %case.case_number.0,
            case_version = case.version,
            "refund case inserted with its support case"
        );
        Ok((case, refund))
    }

    async fn update(&self, mut refund: RefundCase) -> Result<RefundCase, RepositoryError> {
        let expected = refund.version;
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            "UPDATE refund_case SET
                product_ids_json = ?,
                evidence_photos_json = ?,
                status = ?,
                eligibility_status = ?,
                products_json = ?,
                total_refund_amount = ?,
                eligibility_evaluated_on = ?,
                decision_reason = ?,
                decided_by = ?,
                approved_amount = ?,
                refund_method = ?,
                version = version + 1,
                updated_at = ?
             WHERE refund_case_id = ? AND version = ?",
        )
        .bind(encode_json("product_ids_json", &refund.product_ids)?)
        .bind(encode_json("evidence_photos_json", &refund.evidence_photos)?)
        .bind(refund.status.as_str())
        .bind(refund.eligibility_status.as_str())
        .bind(encode_json("products_json", &refund.products)?)
        .bind(refund.total_refund_amount.to_string())
        .bind(refund.eligibility_evaluated_on.to_string())
        .bind(refund.decision_reason.as_deref())
        .bind(refund.decided_by.as_deref())
        .bind(refund.approved_amount.map(|amount| amount.to_string()))
        .bind(refund.refund_method.map(|method| method.as_str()))
        .bind(refund.updated_at.to_rfc3339())
        .bind(&refund.refund_case_id.0)
        .bind(version_param(expected)?)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            let current = sqlx::query("SELECT version FROM refund_case WHERE refund_case_id = ?")
                .bind(&refund.refund_case_id.0)
                .fetch_optional(&mut *tx)
                .await?;
            return Err(match current {
                Some(row) => RepositoryError::VersionConflict {
                    resource: refund.refund_case_id.0.clone(),
                    expected,
                    actual: parse_version(row.try_get("version")?)?,
                },
                None => RepositoryError::NotFound(refund.refund_case_id.0.clone()),
            });
        }

        append_decisions(&mut tx, &refund).await?;
        tx.commit().await?;

        refund.version = expected + 1;
        Ok(refund)
    }
}

async fn insert_refund(
    tx: &mut Transaction<'_, Sqlite>,
    refund: &RefundCase,
) -> Result<(), RepositoryError> {
    let inserted = sqlx::query(&format!(
        "INSERT INTO refund_case ({REFUND_COLUMNS})
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
    ))
    .bind(&refund.refund_case_id.0)
    .bind(&refund.case_number.0)
    .bind(&refund.customer_id.0)
    .bind(&refund.order_id.0)
    .bind(encode_json("product_ids_json", &refund.product_ids)?)
    .bind(&refund.request_reason)
    .bind(encode_json("evidence_photos_json", &refund.evidence_photos)?)
    .bind(refund.status.as_str())
    .bind(refund.eligibility_status.as_str())
    .bind(encode_json("products_json", &refund.products)?)
    .bind(refund.total_refund_amount.to_string())
    .bind(refund.eligibility_evaluated_on.to_string())
    .bind(refund.decision_reason.as_deref())
    .bind(refund.decided_by.as_deref())
    .bind(refund.approved_amount.map(|amount| amount.to_string()))
    .bind(refund.refund_method.map(|method| method.as_str()))
    .bind(version_param(refund.version)?)
    .bind(refund.created_at.to_rfc3339())
    .bind(refund.updated_at.to_rfc3339())
    .execute(&mut **tx)
    .await;

    if let Err(error) = inserted {
        return Err(match &error {
            sqlx::Error::Database(db) if db.is_unique_violation() => RepositoryError::Duplicate(
                format!("refund for support case {}", refund.case_number.0),
            ),
            _ => RepositoryError::Database(error),
        });
    }
    append_decisions(tx, refund).await
}

async fn append_decisions(
    tx: &mut Transaction<'_, Sqlite>,
    refund: &RefundCase,
) -> Result<(), RepositoryError> {
    for (position, decision) in refund.decisions.iter().enumerate() {
        let position = i64::try_from(position)
            .map_err(|_| RepositoryError::Decode("decision position overflow".to_string()))?;
        sqlx::query(
            "INSERT OR IGNORE INTO refund_decision
                (refund_case_id, position, agent_id, kind, content, refund_amount, refund_method,
                 decided_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&refund.refund_case_id.0)
        .bind(position)
        .bind(&decision.agent_id)
        .bind(decision.kind.as_str())
        .bind(&decision.content)
        .bind(decision.refund_amount.map(|amount| amount.to_string()))
        .bind(decision.refund_method.map(|method| method.as_str()))
        .bind(decision.decided_at.to_rfc3339())
        .execute(&mut **tx)
        .await?;
    }
    Ok(())
}

fn refund_from_row(row: SqliteRow) -> Result<RefundCase, RepositoryError> {
    Ok(RefundCase {
        refund_case_id: RefundCaseId(row.try_get("refund_case_id")?),
        case_number: CaseNumber(row.try_get("case_number")?),
        customer_id: CustomerId(row.try_get("customer_id")?),
        order_id: OrderId(row.try_get("order_id")?),
        product_ids: decode_json("product_ids_json", row.try_get("product_ids_json")?)?,
        request_reason: row.try_get("request_reason")?,
        evidence_photos: decode_json("evidence_photos_json", row.try_get("evidence_photos_json")?)?,
        status: parse_enum("status", row.try_get("status")?)?,
        eligibility_status: parse_enum("eligibility_status", row.try_get("eligibility_status")?)?,
        products: decode_json("products_json", row.try_get("products_json")?)?,
        total_refund_amount: parse_decimal(
            "total_refund_amount",
            row.try_get("total_refund_amount")?,
        )?,
        eligibility_evaluated_on: parse_date(
            "eligibility_evaluated_on",
            row.try_get("eligibility_evaluated_on")?,
        )?,
        decision_reason: row.try_get("decision_reason")?,
        decided_by: row.try_get("decided_by")?,
        approved_amount: parse_optional_decimal("approved_amount", row.try_get("approved_amount")?)?,
        refund_method: parse_optional_enum("refund_method", row.try_get("refund_method")?)?,
        decisions: Vec::new(),
        version: parse_version(row.try_get("version")?)?,
        created_at: parse_timestamp("created_at", row.try_get("created_at")?)?,
        updated_at: parse_timestamp("updated_at", row.try_get("updated_at")?)?,
    })
}

fn decision_from_row(row: SqliteRow) -> Result<RefundDecision, RepositoryError> {
    Ok(RefundDecision {
        agent_id: row.try_get("agent_id")?,
        kind: parse_enum("kind", row.try_get("kind")?)?,
        content: row.try_get("content")?,
        refund_amount: parse_optional_decimal("refund_amount", row.try_get("refund_amount")?)?,
        refund_method: parse_optional_enum("refund_method", row.try_get("refund_method")?)?,
        decided_at: parse_timestamp("decided_at", row.try_get("decided_at")?)?,
    })
}
