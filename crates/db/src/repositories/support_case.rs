use sqlx::sqlite::SqliteRow;
use sqlx::{Row, Sqlite, Transaction};

use supportdesk_core::domain::comment::{Comment, CommentId};
use supportdesk_core::domain::refund_case::RefundCaseId;
use supportdesk_core::domain::support_case::{CaseNumber, SupportCase};
use supportdesk_core::domain::{CustomerId, OrderId};

use super::codec::{parse_enum, parse_timestamp, parse_version, version_param};
use super::{RepositoryError, SupportCaseRepository};
use crate::DbPool;

const CASE_COLUMNS: &str = "case_number, customer_id, case_type, subject, description, order_id,
                            status, refund_request_id, assigned_agent_id, version, created_at,
                            updated_at";

pub struct SqlSupportCaseRepository {
    pool: DbPool,
}

impl SqlSupportCaseRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn load_comments(&self, case_number: &CaseNumber) -> Result<Vec<Comment>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, author_id, author_type, content, is_internal, created_at
             FROM case_comment WHERE case_number = ? ORDER BY position ASC",
        )
        .bind(&case_number.0)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(comment_from_row).collect()
    }
}

#[async_trait::async_trait]
impl SupportCaseRepository for SqlSupportCaseRepository {
    async fn find_by_number(
        &self,
        case_number: &CaseNumber,
    ) -> Result<Option<SupportCase>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {CASE_COLUMNS} FROM support_case WHERE case_number = ?"
        ))
        .bind(&case_number.0)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let mut case = case_from_row(row)?;
        case.comments = self.load_comments(case_number).await?;
        Ok(Some(case))
    }

    async fn list_for_customer(
        &self,
        customer_id: &CustomerId,
    ) -> Result<Vec<SupportCase>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {CASE_COLUMNS} FROM support_case WHERE customer_id = ?
             ORDER BY created_at DESC, case_number ASC"
        ))
        .bind(&customer_id.0)
        .fetch_all(&self.pool)
        .await?;

        let mut cases = Vec::with_capacity(rows.len());
        for row in rows {
            let mut case = case_from_row(row)?;
            case.comments = self.load_comments(&case.case_number).await?;
            cases.push(case);
        }
        Ok(cases)
    }

    async fn insert(&self, case: SupportCase) -> Result<SupportCase, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        insert_case(&mut tx, &case).await?;
        tx.commit().await?;

        tracing::debug!(
            event_name = "persistence.support_case.inserted",
            case_number = %case.case_number.0,
            "support case inserted"
        );
        Ok(case)
    }

    async fn update(&self, mut case: SupportCase) -> Result<SupportCase, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        update_case(&mut tx, &case).await?;
        tx.commit().await?;

        case.version += 1;
        Ok(case)
    }
}

pub(super) async fn insert_case(
    tx: &mut Transaction<'_, Sqlite>,
    case: &SupportCase,
) -> Result<(), RepositoryError> {
    let inserted = sqlx::query(&format!(
        "INSERT INTO support_case ({CASE_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
    ))
    .bind(&case.case_number.0)
    .bind(&case.customer_id.0)
    .bind(case.case_type.as_str())
    .bind(&case.subject)
    .bind(&case.description)
    .bind(case.order_id.as_ref().map(|id| id.0.as_str()))
    .bind(case.status.as_str())
    .bind(case.refund_request_id.as_ref().map(|id| id.0.as_str()))
    .bind(case.assigned_agent_id.as_deref())
    .bind(version_param(case.version)?)
    .bind(case.created_at.to_rfc3339())
    .bind(case.updated_at.to_rfc3339())
    .execute(&mut **tx)
    .await;

    if let Err(error) = inserted {
        return Err(duplicate_or_database(error, &case.case_number.0));
    }
    append_comments(tx, case).await
}

/// Writes `case` only if the stored row is still at `case.version`; the
/// stored version becomes `case.version + 1`.
pub(super) async fn update_case(
    tx: &mut Transaction<'_, Sqlite>,
    case: &SupportCase,
) -> Result<(), RepositoryError> {
    let expected = case.version;
    let result = sqlx::query(
        "UPDATE support_case SET
            case_type = ?,
            subject = ?,
            description = ?,
            order_id = ?,
            status = ?,
            refund_request_id = ?,
            assigned_agent_id = ?,
            version = version + 1,
            updated_at = ?
         WHERE case_number = ? AND version = ?",
    )
    .bind(case.case_type.as_str())
    .bind(&case.subject)
    .bind(&case.description)
    .bind(case.order_id.as_ref().map(|id| id.0.as_str()))
    .bind(case.status.as_str())
    .bind(case.refund_request_id.as_ref().map(|id| id.0.as_str()))
    .bind(case.assigned_agent_id.as_deref())
    .bind(case.updated_at.to_rfc3339())
    .bind(&case.case_number.0)
    .bind(version_param(expected)?)
    .execute(&mut **tx)
    .await;

    let result = match result {
        Ok(result) => result,
        Err(error) => return Err(duplicate_or_database(error, &case.case_number.0)),
    };

    if result.rows_affected() == 0 {
        let current = sqlx::query("SELECT version FROM support_case WHERE case_number = ?")
            .bind(&case.case_number.0)
            .fetch_optional(&mut **tx)
            .await?;
        return Err(match current {
            Some(row) => RepositoryError::VersionConflict {
                resource: case.case_number.0.clone(),
                expected,
                actual: parse_version(row.try_get("version")?)?,
            },
            None => RepositoryError::NotFound(case.case_number.0.clone()),
        });
    }

    append_comments(tx, case).await
}

async fn append_comments(
    tx: &mut Transaction<'_, Sqlite>,
    case: &SupportCase,
) -> Result<(), RepositoryError> {
    for (position, comment) in case.comments.iter().enumerate() {
        let position = i64::try_from(position)
            .map_err(|_| RepositoryError::Decode("comment position overflow".to_string()))?;
        sqlx::query(
            "INSERT OR IGNORE INTO case_comment
                (id, case_number, position, author_id, author_type, content, is_internal, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&comment.id.0)
        .bind(&case.case_number.0)
        .bind(position)
        .bind(&comment.author_id)
        .bind(comment.author_type.as_str())
        .bind(&comment.content)
        .bind(comment.is_internal)
        .bind(comment.created_at.to_rfc3339())
        .execute(&mut **tx)
        .await?;
    }
    Ok(())
}

fn duplicate_or_database(error: sqlx::Error, resource: &str) -> RepositoryError {
    match &error {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            RepositoryError::Duplicate(resource.to_string())
        }
        _ => RepositoryError::Database(error),
    }
}

fn case_from_row(row: SqliteRow) -> Result<SupportCase, RepositoryError> {
    Ok(SupportCase {
        case_number: CaseNumber(row.try_get("case_number")?),
        customer_id: CustomerId(row.try_get("customer_id")?),
        case_type: parse_enum("case_type", row.try_get("case_type")?)?,
        subject: row.try_get("subject")?,
        description: row.try_get("description")?,
        order_id: row.try_get::<Option<String>, _>("order_id")?.map(OrderId),
        status: parse_enum("status", row.try_get("status")?)?,
        refund_request_id: row
            .try_get::<Option<String>, _>("refund_request_id")?
            .map(RefundCaseId),
        assigned_agent_id: row.try_get("assigned_agent_id")?,
        comments: Vec::new(),
        version: parse_version(row.try_get("version")?)?,
        created_at: parse_timestamp("created_at", row.try_get("created_at")?)?,
        updated_at: parse_timestamp("updated_at", row.try_get("updated_at")?)?,
    })
}

fn comment_from_row(row: SqliteRow) -> Result<Comment, RepositoryError> {
    Ok(Comment {
        id: CommentId(row.try_get("id")?),
        author_id: row.try_get("author_id")?,
        author_type: parse_enum("author_type", row.try_get("author_type")?)?,
        content: row.try_get("content")?,
        is_internal: row.try_get("is_internal")?,
        created_at: parse_timestamp("created_at", row.try_get("created_at")?)?,
    })
}

#[cfg(test)]
mod tests {
    use supportdesk_core::domain::comment::NewComment;
    use supportdesk_core::domain::refund_case::RefundCaseId;
    use supportdesk_core::domain::request::CaseRequest;
    use supportdesk_core::domain::status::{ActorRole, CaseType, SupportCaseStatus};
    use supportdesk_core::domain::support_case::{CaseNumber, SupportCase};
    use supportdesk_core::domain::CustomerId;

    use super::SqlSupportCaseRepository;
    use crate::repositories::{RepositoryError, SupportCaseRepository};
    use crate::{connect_with_settings, migrations, DbPool};

    async fn setup_pool() -> DbPool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        pool
    }

    fn question(number: &str) -> SupportCase {
        SupportCase::open(
            CaseNumber(number.to_owned()),
            &CaseRequest::Question {
                customer_id: CustomerId("cust-1".to_owned()),
                subject: "Sizing".to_owned(),
                description: "Does the jacket run small?".to_owned(),
            },
        )
        .expect("valid case")
    }

    #[tokio::test]
    async fn sql_support_case_round_trip_with_comments() {
        let repo = SqlSupportCaseRepository::new(setup_pool().await);
        let mut case = question("SC-00000001");
        case.append_comment(NewComment::customer("cust-1", "hello")).expect("comment");
        repo.insert(case.clone()).await.expect("insert");

        let found = repo.find_by_number(&case.case_number).await.expect("find");
        assert_eq!(found, Some(case));
    }

    #[tokio::test]
    async fn update_bumps_version_and_appends_comments() {
        let repo = SqlSupportCaseRepository::new(setup_pool().await);
        let mut case = repo.insert(question("SC-00000001")).await.expect("insert");

        case.assign_agent("agent-7").expect("assign");
        case.append_comment(NewComment::agent("agent-7", "looking into it", true))
            .expect("note");
        case.link_refund(RefundCaseId("RC-00000001".to_owned())).expect("link");
        let saved = repo.update(case).await.expect("update");
        assert_eq!(saved.version, 2);

        let found = repo
            .find_by_number(&saved.case_number)
            .await
            .expect("find")
            .expect("case exists");
        assert_eq!(found.version, 2);
        assert_eq!(found.status, SupportCaseStatus::InProgress);
        assert_eq!(found.case_type, CaseType::Refund);
        assert_eq!(found.comments.len(), 1);
        assert!(found.comments[0].is_internal);
    }

    #[tokio::test]
    async fn stale_update_reports_version_conflict() {
        let repo = SqlSupportCaseRepository::new(setup_pool().await);
        let stored = repo.insert(question("SC-00000001")).await.expect("insert");

        let mut first = stored.clone();
        first.transition_to(SupportCaseStatus::Closed, ActorRole::Customer).expect("close");
        repo.update(first).await.expect("first writer wins");

        let mut second = stored;
        second.assign_agent("agent-7").expect("assign");
        let error = repo.update(second).await.expect_err("second writer is stale");
        assert!(matches!(
            error,
            RepositoryError::VersionConflict { expected: 1, actual: 2, .. }
        ));
    }

    #[tokio::test]
    async fn duplicate_case_numbers_are_rejected() {
        let repo = SqlSupportCaseRepository::new(setup_pool().await);
        repo.insert(question("SC-00000001")).await.expect("insert");
        let error = repo.insert(question("SC-00000001")).await.expect_err("duplicate");
        assert!(matches!(error, RepositoryError::Duplicate(_)));
    }

    #[tokio::test]
    async fn listing_is_scoped_to_the_customer() {
        let repo = SqlSupportCaseRepository::new(setup_pool().await);
        repo.insert(question("SC-00000001")).await.expect("insert");
        repo.insert(question("SC-00000002")).await.expect("insert");

        let mine = repo.list_for_customer(&CustomerId("cust-1".to_owned())).await.expect("list");
        let theirs = repo.list_for_customer(&CustomerId("cust-2".to_owned())).await.expect("list");
        assert_eq!(mine.len(), 2);
        assert!(theirs.is_empty());
    }
}
