use crate::connection::DbPool;
use crate::repositories::RepositoryError;
use sqlx::Executor;

/// Seeded cases and the state each one must be in after loading.
const SEED_CASES: &[SeedCaseContract] = &[
    SeedCaseContract {
        case_number: "SC-DEMO0001",
        customer_id: "cust-demo-1",
        case_type: "question",
        status: "open",
        comment_count: 0,
        refund: None,
        description: "Open question without a refund",
    },
    SeedCaseContract {
        case_number: "SC-DEMO0002",
        customer_id: "cust-demo-1",
        case_type: "refund",
        status: "in_progress",
        comment_count: 2,
        refund: Some(SeedRefundContract {
            refund_case_id: "RC-DEMO0002",
            status: "pending",
            eligibility_status: "partially_eligible",
            total_refund_amount: "129.50",
            decision_count: 0,
        }),
        description: "Refund awaiting an agent decision, one product out of window",
    },
    SeedCaseContract {
        case_number: "SC-DEMO0003",
        customer_id: "cust-demo-2",
        case_type: "refund",
        status: "closed",
        comment_count: 1,
        refund: Some(SeedRefundContract {
            refund_case_id: "RC-DEMO0003",
            status: "rejected",
            eligibility_status: "ineligible",
            total_refund_amount: "0",
            decision_count: 1,
        }),
        description: "Closed case with a rejected refund",
    },
];

const SEED_ORDER_IDS: &[&str] = &["ORD-DEMO-1", "ORD-DEMO-2"];

/// Demo dataset covering the three lifecycle shapes a support desk sees:
/// 1. An open question
/// 2. An in-progress case with a pending, partially eligible refund
/// 3. A closed case whose refund was rejected
pub struct DemoDataset;

impl DemoDataset {
    pub const SQL: &str = include_str!("../../../config/fixtures/demo_seed.sql");

    pub async fn load(pool: &DbPool) -> Result<SeedResult, RepositoryError> {
        let mut tx = pool.begin().await?;

        tx.execute(sqlx::query(Self::SQL)).await?;
        tx.commit().await?;

        let cases_seeded = SEED_CASES
            .iter()
            .map(|case| CaseSeedInfo {
                case_number: case.case_number,
                refund_case_id: case.refund.map(|refund| refund.refund_case_id),
                description: case.description,
            })
            .collect::<Vec<_>>();

        tracing::info!(
            event_name = "persistence.seed.loaded",
            cases = cases_seeded.len(),
            "demo dataset loaded"
        );
        Ok(SeedResult { cases_seeded })
    }

    /// Checks every seeded row against the contract.
    pub async fn verify(pool: &DbPool) -> Result<VerificationResult, RepositoryError> {
        let mut checks = Vec::new();

        for order_id in SEED_ORDER_IDS {
            let lines: i64 =
                sqlx::query_scalar("SELECT COUNT(1) FROM order_line WHERE order_id = ?1")
                    .bind(*order_id)
                    .fetch_one(pool)
                    .await?;
            checks.push((*order_id, lines > 0));
        }

        for case in SEED_CASES {
            let case_ok: i64 = sqlx::query_scalar(
                "SELECT EXISTS(SELECT 1 FROM support_case
                               WHERE case_number = ?1 AND customer_id = ?2
                                 AND case_type = ?3 AND status = ?4)",
            )
            .bind(case.case_number)
            .bind(case.customer_id)
            .bind(case.case_type)
            .bind(case.status)
            .fetch_one(pool)
            .await?;
            checks.push((case.case_number, case_ok == 1));

            let comments: i64 =
                sqlx::query_scalar("SELECT COUNT(1) FROM case_comment WHERE case_number = ?1")
                    .bind(case.case_number)
                    .fetch_one(pool)
                    .await?;
            checks.push((case.comments_label(), comments == case.comment_count));

            let linked = sqlx::query_scalar::<_, Option<String>>(
                "SELECT refund_request_id FROM support_case WHERE case_number = ?1",
            )
            .bind(case.case_number)
            .fetch_optional(pool)
            .await?
            .flatten();
            checks.push((
                case.link_label(),
                linked.as_deref() == case.refund.map(|refund| refund.refund_case_id),
            ));

            if let Some(refund) = case.refund {
                checks.push((case.refund_label(), Self::verify_refund(pool, case, refund).await?));
            }
        }

        let all_present = checks.iter().all(|(_, ok)| *ok);
        Ok(VerificationResult { all_present, checks })
    }

    async fn verify_refund(
        pool: &DbPool,
        case: &SeedCaseContract,
        refund: SeedRefundContract,
    ) -> Result<bool, RepositoryError> {
        let row = sqlx::query_as::<_, (String, String, String, String)>(
            "SELECT case_number, status, eligibility_status, total_refund_amount
             FROM refund_case WHERE refund_case_id = ?1",
        )
        .bind(refund.refund_case_id)
        .fetch_optional(pool)
        .await?;
        let Some((case_number, status, eligibility_status, total)) = row else {
            return Ok(false);
        };
        if case_number != case.case_number
            || status != refund.status
            || eligibility_status != refund.eligibility_status
            || total != refund.total_refund_amount
        {
            return Ok(false);
        }

        let decisions: i64 =
            sqlx::query_scalar("SELECT COUNT(1) FROM refund_decision WHERE refund_case_id = ?1")
                .bind(refund.refund_case_id)
                .fetch_one(pool)
                .await?;
        Ok(decisions == refund.decision_count)
    }

    /// Removes the seeded rows from a test database.
    pub async fn clean(pool: &DbPool) -> Result<(), RepositoryError> {
        let mut tx = pool.begin().await?;

        let quoted_cases = sql_array_from_ids(SEED_CASES.iter().map(|case| case.case_number));
        let quoted_refunds = sql_array_from_ids(
            SEED_CASES.iter().filter_map(|case| case.refund.map(|refund| refund.refund_case_id)),
        );
        let quoted_orders = sql_array_from_ids(SEED_ORDER_IDS.iter().copied());

        sqlx::query(&format!("DELETE FROM refund_decision WHERE refund_case_id IN {quoted_refunds}"))
            .execute(&mut *tx)
            .await?;
        sqlx::query(&format!("DELETE FROM refund_case WHERE refund_case_id IN {quoted_refunds}"))
            .execute(&mut *tx)
            .await?;
        sqlx::query(&format!("DELETE FROM case_comment WHERE case_number IN {quoted_cases}"))
            .execute(&mut *tx)
            .await?;
        sqlx::query(&format!("DELETE FROM support_case WHERE case_number IN {quoted_cases}"))
            .execute(&mut *tx)
            .await?;
        sqlx::query(&format!("DELETE FROM order_line WHERE order_id IN {quoted_orders}"))
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
struct SeedCaseContract {
    case_number: &'static str,
    customer_id: &'static str,
    case_type: &'static str,
    status: &'static str,
    comment_count: i64,
    refund: Option<SeedRefundContract>,
    description: &'static str,
}

#[derive(Debug, Clone, Copy)]
struct SeedRefundContract {
    refund_case_id: &'static str,
    status: &'static str,
    eligibility_status: &'static str,
    total_refund_amount: &'static str,
    decision_count: i64,
}

impl SeedCaseContract {
    fn comments_label(&self) -> &'static str {
        match self.case_number {
            "SC-DEMO0001" => "case-question-comments",
            "SC-DEMO0002" => "case-pending-refund-comments",
            _ => "case-rejected-refund-comments",
        }
    }

    fn link_label(&self) -> &'static str {
        match self.case_number {
            "SC-DEMO0001" => "case-question-unlinked",
            "SC-DEMO0002" => "case-pending-refund-link",
            _ => "case-rejected-refund-link",
        }
    }

    fn refund_label(&self) -> &'static str {
        match self.case_number {
            "SC-DEMO0002" => "refund-pending-state",
            _ => "refund-rejected-state",
        }
    }
}

fn sql_array_from_ids<'a>(ids: impl Iterator<Item = &'a str>) -> String {
    let quoted = ids.map(|id| format!("'{id}'")).collect::<Vec<_>>().join(",");
    format!("({quoted})")
}

#[derive(Debug)]
pub struct SeedResult {
    pub cases_seeded: Vec<CaseSeedInfo>,
}

#[derive(Debug)]
pub struct CaseSeedInfo {
    pub case_number: &'static str,
    pub refund_case_id: Option<&'static str>,
    pub description: &'static str,
}

#[derive(Debug)]
pub struct VerificationResult {
    pub all_present: bool,
    pub checks: Vec<(&'static str, bool)>,
}
