use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Response;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use supportdesk_core::audit::{AuditCategory, AuditOutcome};
use supportdesk_core::{
    ActorRole, AuthorType, CaseAggregate, CaseNumber, CaseRequest, CaseType,
    CustomerId, DenialReason, DomainError, NewComment, RefundCaseId, SupportCase,
    SupportCaseStatus,
};
use supportdesk_db::repositories::CaseWrite;
use supportdesk_gateway::UpdateCaseTypeRequest;
use tracing::info;

use crate::api_error::{json_body, ApiError, ApiResultExt};
use crate::context::{versioned, RequestContext};
use crate::refund::open_refund;
use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/support-cases", post(create_case))
        .route("/support-cases/customer/{customer_id}", get(list_for_customer))
        .route("/support-cases/{case_number}", get(get_case))
        .route("/support-cases/{case_number}/close", put(close_case))
        .route("/support-cases/{case_number}/reopen", put(reopen_case))
        .route("/support-cases/{case_number}/assign/{agent_id}", put(assign_agent))
        .route("/support-cases/{case_number}/type", put(update_case_type))
        .route("/support-cases/{case_number}/comments", post(add_comment))
        .with_state(state)
}

/// Opens a case. A refund case also opens its refund case, and both rows are
/// written together, so the response already carries `refund_request_id`.
async fn create_case(
    State(state): State<AppState>,
    ctx: RequestContext,
    payload: Result<Json<CaseRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let request = json_body(payload, &ctx)?;
    let case = SupportCase::open(CaseNumber::generate(), &request).for_request(&ctx)?;
    let case = match request.to_refund_request(&case.case_number) {
        Some(refund_request) => {
            open_refund(&state, &ctx, case, refund_request, CaseWrite::Insert).await?.0
        }
        None => state.cases.insert(case).await.for_request(&ctx)?,
    };

    info!(
        event_name = "support.case.created",
        correlation_id = %ctx.correlation_id,
        case_number = %case.case_number.0,
        case_type = %case.case_type,
        "support case opened"
    );

    Ok(versioned(StatusCode::CREATED, case.version, view_for(case, ctx.role)))
}

async fn get_case(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(case_number): Path<String>,
) -> Result<Response, ApiError> {
    let case = load_case(&state, &ctx, &CaseNumber(case_number)).await?;
    Ok(versioned(StatusCode::OK, case.version, view_for(case, ctx.role)))
}

async fn list_for_customer(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(customer_id): Path<String>,
) -> Result<Json<Vec<SupportCase>>, ApiError> {
    let cases =
        state.cases.list_for_customer(&CustomerId(customer_id)).await.for_request(&ctx)?;
    Ok(Json(cases.into_iter().map(|case| view_for(case, ctx.role)).collect()))
}

async fn close_case(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(case_number): Path<String>,
) -> Result<Response, ApiError> {
    transition(&state, &ctx, CaseNumber(case_number), SupportCaseStatus::Closed).await
}

async fn reopen_case(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(case_number): Path<String>,
) -> Result<Response, ApiError> {
    transition(&state, &ctx, CaseNumber(case_number), SupportCaseStatus::Open).await
}

async fn assign_agent(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path((case_number, agent_id)): Path<(String, String)>,
) -> Result<Response, ApiError> {
    let mut case = load_current(&state, &ctx, &CaseNumber(case_number)).await?;
    if !ctx.role.is_agent() {
        return Err(ApiError::domain(
            DomainError::IllegalTransition {
                from: case.status.to_string(),
                to: SupportCaseStatus::InProgress.to_string(),
                reason: DenialReason::AgentOnly {
                    from: case.status.to_string(),
                    to: SupportCaseStatus::InProgress.to_string(),
                },
            },
            &ctx.correlation_id,
        ));
    }

    let audit = ctx.audit(Some(case.case_number.clone()), None);
    case.assign_agent(agent_id.as_str()).for_request(&ctx)?;
    state.audit.emit(
        audit
            .event("case.agent_assigned", AuditCategory::Lifecycle, AuditOutcome::Success)
            .with_metadata("agent_id", agent_id),
    );
    save(&state, &ctx, case).await
}

async fn update_case_type(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(case_number): Path<String>,
    payload: Result<Json<UpdateCaseTypeRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let request = json_body(payload, &ctx)?;
    if request.case_type != CaseType::Refund {
        return Err(ApiError::domain(
            DomainError::invariant("a case can only be converted to `refund`"),
            &ctx.correlation_id,
        ));
    }

    let case = load_current(&state, &ctx, &CaseNumber(case_number)).await?;
    ensure_refund_belongs(&state, &ctx, &case, &request.refund_request_id).await?;

    let mut aggregate = CaseAggregate::new(case);
    aggregate.link_refund(request.refund_request_id).for_request(&ctx)?;
    let (case, _) = aggregate.into_parts();
    save(&state, &ctx, case).await
}

async fn add_comment(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(case_number): Path<String>,
    payload: Result<Json<NewComment>, JsonRejection>,
) -> Result<Response, ApiError> {
    let comment = json_body(payload, &ctx)?;
    if comment.author_type == AuthorType::Agent && !ctx.role.is_agent() {
        return Err(ApiError::domain(
            DomainError::invariant("only agents can post agent comments"),
            &ctx.correlation_id,
        ));
    }
    if comment.author_id != ctx.actor_id {
        return Err(ApiError::domain(
            DomainError::invariant(format!(
                "comment author `{}` does not match the caller `{}`",
                comment.author_id, ctx.actor_id
            )),
            &ctx.correlation_id,
        ));
    }

    let case = load_current(&state, &ctx, &CaseNumber(case_number)).await?;
    let audit = ctx.audit(Some(case.case_number.clone()), None);
    let internal = comment.is_internal;

    let mut aggregate = CaseAggregate::new(case);
    if let Err(error) = aggregate.append_comment(comment) {
        state.audit.emit(
            audit
                .event("case.comment_rejected", AuditCategory::Lifecycle, AuditOutcome::Rejected)
                .with_metadata("error", error.to_string()),
        );
        return Err(ApiError::domain(error, &ctx.correlation_id));
    }
    state.audit.emit(
        audit
            .event("case.comment_added", AuditCategory::Lifecycle, AuditOutcome::Success)
            .with_metadata("internal", internal.to_string()),
    );

    let (case, _) = aggregate.into_parts();
    let case = state.cases.update(case).await.for_request(&ctx)?;
    Ok(versioned(StatusCode::CREATED, case.version, view_for(case, ctx.role)))
}

async fn transition(
    state: &AppState,
    ctx: &RequestContext,
    case_number: CaseNumber,
    next: SupportCaseStatus,
) -> Result<Response, ApiError> {
    let case = load_current(state, ctx, &case_number).await?;
    let audit = ctx.audit(Some(case_number), None);

    let mut aggregate = CaseAggregate::new(case);
    aggregate
        .apply_transition_with_audit(next, ctx.role, state.audit.as_ref(), &audit)
        .for_request(ctx)?;
    let (case, _) = aggregate.into_parts();
    save(state, ctx, case).await
}

pub(crate) async fn load_case(
    state: &AppState,
    ctx: &RequestContext,
    case_number: &CaseNumber,
) -> Result<SupportCase, ApiError> {
    state
        .cases
        .find_by_number(case_number)
        .await
        .for_request(ctx)?
        .ok_or_else(|| {
            ApiError::not_found(
                format!("support case `{}` does not exist", case_number.0),
                &ctx.correlation_id,
            )
        })
}

/// Loads a case for mutation and checks the caller's `If-Match`.
async fn load_current(
    state: &AppState,
    ctx: &RequestContext,
    case_number: &CaseNumber,
) -> Result<SupportCase, ApiError> {
    let case = load_case(state, ctx, case_number).await?;
    ctx.ensure_version(&case.case_number.0, case.version).for_request(ctx)?;
    Ok(case)
}

async fn ensure_refund_belongs(
    state: &AppState,
    ctx: &RequestContext,
    case: &SupportCase,
    refund_case_id: &RefundCaseId,
) -> Result<(), ApiError> {
    let refund = state.refunds.find_by_id(refund_case_id).await.for_request(ctx)?.ok_or_else(
        || {
            ApiError::not_found(
                format!("refund case `{}` does not exist", refund_case_id.0),
                &ctx.correlation_id,
            )
        },
    )?;
    if refund.case_number != case.case_number {
        return Err(ApiError::domain(
            DomainError::invariant(format!(
                "refund case `{}` belongs to `{}`",
                refund_case_id.0, refund.case_number.0
            )),
            &ctx.correlation_id,
        ));
    }
    Ok(())
}

async fn save(
    state: &AppState,
    ctx: &RequestContext,
    case: SupportCase,
) -> Result<Response, ApiError> {
    let case = state.cases.update(case).await.for_request(ctx)?;
    info!(
        event_name = "support.case.updated",
        correlation_id = %ctx.correlation_id,
        case_number = %case.case_number.0,
        status = %case.status,
        version = case.version,
        "support case saved"
    );
    Ok(versioned(StatusCode::OK, case.version, view_for(case, ctx.role)))
}

/// Customers never see internal notes.
fn view_for(mut case: SupportCase, role: ActorRole) -> SupportCase {
    if !role.is_agent() {
        case.comments.retain(|comment| comment.visible_to_customer());
    }
    case
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::{json, Value};

    use crate::state::testing::{harness, Harness};

    fn question() -> Value {
        json!({
            "customer_id": "cust-1",
            "case_type": "question",
            "subject": "Sizing",
            "description": "Does the jacket run small?"
        })
    }

    #[tokio::test]
    async fn created_case_is_open_at_version_one() {
        let harness = harness().await;

        let reply = harness.send("POST", "/support-cases", "customer", None, Some(question())).await;

        assert_eq!(reply.status, StatusCode::CREATED);
        assert_eq!(reply.etag.as_deref(), Some("\"1\""));
        assert_eq!(reply.body["status"], "open");
        assert!(reply.body["case_number"].as_str().unwrap_or_default().starts_with("SC-"));
    }

    #[tokio::test]
    async fn invalid_case_request_is_a_bad_request() {
        let harness = harness().await;
        let mut body = question();
        body["subject"] = json!("  ");

        let reply = harness.send("POST", "/support-cases", "customer", None, Some(body)).await;

        assert_eq!(reply.status, StatusCode::BAD_REQUEST);
        assert_eq!(reply.body["error_class"], "bad_request");
        assert!(reply.body["detail"].as_str().unwrap_or_default().contains("subject"));
    }

    #[tokio::test]
    async fn customer_close_then_agent_close_again_is_denied() {
        let harness = harness().await;
        let created =
            harness.send("POST", "/support-cases", "customer", None, Some(question())).await;
        let number = created.body["case_number"].as_str().expect("case number").to_owned();

        let closed =
            harness.send("PUT", &format!("/support-cases/{number}/close"), "customer", None, None).await;
        assert_eq!(closed.status, StatusCode::OK);
        assert_eq!(closed.body["status"], "closed");
        assert_eq!(closed.etag.as_deref(), Some("\"2\""));

        let again =
            harness.send("PUT", &format!("/support-cases/{number}/close"), "agent", None, None).await;
        assert_eq!(again.status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(again.body["error_class"], "unprocessable");

        let events = harness.audit.events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event_type, "case.transition_applied");
        assert_eq!(events[1].event_type, "case.transition_rejected");
    }

    #[tokio::test]
    async fn only_agents_reopen_closed_cases() {
        let harness = harness().await;
        let created =
            harness.send("POST", "/support-cases", "customer", None, Some(question())).await;
        let number = created.body["case_number"].as_str().expect("case number").to_owned();
        harness.send("PUT", &format!("/support-cases/{number}/close"), "customer", None, None).await;

        let denied = harness
            .send("PUT", &format!("/support-cases/{number}/reopen"), "customer", None, None)
            .await;
        assert_eq!(denied.status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(denied.body["detail"]
            .as_str()
            .unwrap_or_default()
            .contains("only an agent can reopen a closed case"));

        let reopened =
            harness.send("PUT", &format!("/support-cases/{number}/reopen"), "agent", None, None).await;
        assert_eq!(reopened.status, StatusCode::OK);
        assert_eq!(reopened.body["status"], "open");
    }

    #[tokio::test]
    async fn stale_if_match_is_a_conflict() {
        let harness = harness().await;
        let created =
            harness.send("POST", "/support-cases", "customer", None, Some(question())).await;
        let number = created.body["case_number"].as_str().expect("case number").to_owned();
        harness
            .send("PUT", &format!("/support-cases/{number}/assign/agent-7"), "agent", None, None)
            .await;

        let stale = harness
            .send("PUT", &format!("/support-cases/{number}/close"), "agent", Some("\"1\""), None)
            .await;

        assert_eq!(stale.status, StatusCode::CONFLICT);
        assert_eq!(stale.body["error_class"], "conflict");

        let fresh = harness
            .send("PUT", &format!("/support-cases/{number}/close"), "agent", Some("\"2\""), None)
            .await;
        assert_eq!(fresh.status, StatusCode::OK);
    }

    #[tokio::test]
    async fn assignment_requires_an_agent() {
        let harness = harness().await;
        let created =
            harness.send("POST", "/support-cases", "customer", None, Some(question())).await;
        let number = created.body["case_number"].as_str().expect("case number").to_owned();
        let uri = format!("/support-cases/{number}/assign/agent-7");

        let denied = harness.send("PUT", &uri, "customer", None, None).await;
        assert_eq!(denied.status, StatusCode::UNPROCESSABLE_ENTITY);

        let assigned = harness.send("PUT", &uri, "agent", None, None).await;
        assert_eq!(assigned.status, StatusCode::OK);
        assert_eq!(assigned.body["status"], "in_progress");
        assert_eq!(assigned.body["assigned_agent_id"], "agent-7");
    }

    #[tokio::test]
    async fn internal_notes_are_hidden_from_customers() {
        let harness = harness().await;
        let created =
            harness.send("POST", "/support-cases", "customer", None, Some(question())).await;
        let number = created.body["case_number"].as_str().expect("case number").to_owned();
        let comments = format!("/support-cases/{number}/comments");

        let note = json!({
            "author_id": "agent-7",
            "author_type": "agent",
            "content": "Customer ordered size M",
            "is_internal": true
        });
        let reply = harness.send("POST", &comments, "agent", None, Some(note)).await;
        assert_eq!(reply.status, StatusCode::CREATED);

        let reply = harness
            .send(
                "POST",
                &comments,
                "customer",
                None,
                Some(json!({
                    "author_id": "cust-1",
                    "author_type": "customer",
                    "content": "Any update?"
                })),
            )
            .await;
        assert_eq!(reply.body["comments"].as_array().map(Vec::len), Some(1));

        let as_customer =
            harness.send("GET", &format!("/support-cases/{number}"), "customer", None, None).await;
        let as_agent =
            harness.send("GET", &format!("/support-cases/{number}"), "agent", None, None).await;
        assert_eq!(as_customer.body["comments"].as_array().map(Vec::len), Some(1));
        assert_eq!(as_agent.body["comments"].as_array().map(Vec::len), Some(2));
        assert_eq!(as_agent.etag.as_deref(), Some("\"3\""));
    }

    #[tokio::test]
    async fn customers_cannot_comment_on_closed_cases() {
        let harness = harness().await;
        let created =
            harness.send("POST", "/support-cases", "customer", None, Some(question())).await;
        let number = created.body["case_number"].as_str().expect("case number").to_owned();
        harness.send("PUT", &format!("/support-cases/{number}/close"), "customer", None, None).await;
        let comments = format!("/support-cases/{number}/comments");

        let denied = harness
            .send(
                "POST",
                &comments,
                "customer",
                None,
                Some(json!({
                    "author_id": "cust-1",
                    "author_type": "customer",
                    "content": "Reopen please"
                })),
            )
            .await;
        assert_eq!(denied.status, StatusCode::UNPROCESSABLE_ENTITY);

        let agent_note = harness
            .send(
                "POST",
                &comments,
                "agent",
                None,
                Some(json!({
                    "author_id": "agent-7",
                    "author_type": "agent",
                    "content": "Closed after callback"
                })),
            )
            .await;
        assert_eq!(agent_note.status, StatusCode::CREATED);
    }

    #[tokio::test]
    async fn unknown_case_is_not_found() {
        let harness = harness().await;

        let reply = harness.send("GET", "/support-cases/SC-MISSING", "agent", None, None).await;

        assert_eq!(reply.status, StatusCode::NOT_FOUND);
        assert_eq!(reply.body["error_class"], "not_found");
    }

    #[tokio::test]
    async fn customer_listing_returns_their_cases() {
        let harness = harness().await;
        harness.send("POST", "/support-cases", "customer", None, Some(question())).await;
        harness.send("POST", "/support-cases", "customer", None, Some(question())).await;

        let reply = harness.send("GET", "/support-cases/customer/cust-1", "customer", None, None).await;
        let other = harness.send("GET", "/support-cases/customer/cust-2", "customer", None, None).await;

        assert_eq!(reply.status, StatusCode::OK);
        assert_eq!(reply.body.as_array().map(Vec::len), Some(2));
        assert_eq!(other.body.as_array().map(Vec::len), Some(0));
    }

    async fn open_question(harness: &Harness) -> String {
        let created =
            harness.send("POST", "/support-cases", "customer", None, Some(question())).await;
        created.body["case_number"].as_str().expect("case number").to_owned()
    }

    fn to_refund(refund_id: &str) -> Value {
        json!({ "case_type": "refund", "refund_request_id": refund_id })
    }

    #[tokio::test]
    async fn question_case_converts_to_refund() {
        let harness = harness().await;
        let number = open_question(&harness).await;
        let refund_id = harness.unlinked_refund(&number).await;

        let reply = harness
            .send("PUT", &format!("/support-cases/{number}/type"), "agent", None, Some(to_refund(&refund_id)))
            .await;

        assert_eq!(reply.status, StatusCode::OK, "{}", reply.body);
        assert_eq!(reply.body["case_type"], "refund");
        assert_eq!(reply.body["refund_request_id"], refund_id.as_str());
        assert_eq!(reply.etag.as_deref(), Some("\"2\""));
    }

    #[tokio::test]
    async fn conversion_rejects_a_refund_from_another_case() {
        let harness = harness().await;
        let number = open_question(&harness).await;
        let other = open_question(&harness).await;
        let foreign_refund = harness.unlinked_refund(&other).await;

        let reply = harness
            .send(
                "PUT",
                &format!("/support-cases/{number}/type"),
                "agent",
                None,
                Some(to_refund(&foreign_refund)),
            )
            .await;

        assert_eq!(reply.status, StatusCode::BAD_REQUEST);
        assert!(reply.body["detail"].as_str().unwrap_or_default().contains("belongs to"));
        let stored =
            harness.send("GET", &format!("/support-cases/{number}"), "agent", None, None).await;
        assert_eq!(stored.body["case_type"], "question");
        assert_eq!(stored.body["refund_request_id"], Value::Null);
    }

    #[tokio::test]
    async fn relinking_a_linked_case_is_already_linked() {
        let harness = harness().await;
        let number = open_question(&harness).await;
        let refund_id = harness.unlinked_refund(&number).await;
        let uri = format!("/support-cases/{number}/type");
        let linked = harness.send("PUT", &uri, "agent", None, Some(to_refund(&refund_id))).await;
        assert_eq!(linked.status, StatusCode::OK);

        let again = harness.send("PUT", &uri, "agent", None, Some(to_refund(&refund_id))).await;

        assert_eq!(again.status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(again.body["detail"].as_str().unwrap_or_default().contains("already linked"));
        let stored =
            harness.send("GET", &format!("/support-cases/{number}"), "agent", None, None).await;
        assert_eq!(stored.etag.as_deref(), Some("\"2\""));
        assert_eq!(stored.body["refund_request_id"], refund_id.as_str());
    }

    #[tokio::test]
    async fn conversion_only_targets_refund() {
        let harness = harness().await;
        let number = open_question(&harness).await;
        let refund_id = harness.unlinked_refund(&number).await;

        let reply = harness
            .send(
                "PUT",
                &format!("/support-cases/{number}/type"),
                "agent",
                None,
                Some(json!({ "case_type": "question", "refund_request_id": refund_id })),
            )
            .await;

        assert_eq!(reply.status, StatusCode::BAD_REQUEST);
        assert!(reply.body["detail"].as_str().unwrap_or_default().contains("only be converted"));
    }

    #[tokio::test]
    async fn comment_author_must_be_the_caller() {
        let harness = harness().await;
        let number = open_question(&harness).await;

        let reply = harness
            .send(
                "POST",
                &format!("/support-cases/{number}/comments"),
                "customer",
                None,
                Some(json!({
                    "author_id": "cust-2",
                    "author_type": "customer",
                    "content": "Posting as someone else"
                })),
            )
            .await;

        assert_eq!(reply.status, StatusCode::BAD_REQUEST);
        assert!(reply.body["detail"].as_str().unwrap_or_default().contains("cust-2"));
        let stored =
            harness.send("GET", &format!("/support-cases/{number}"), "agent", None, None).await;
        assert_eq!(stored.body["comments"].as_array().map(Vec::len), Some(0));
        assert_eq!(stored.etag.as_deref(), Some("\"1\""));
    }

    #[tokio::test]
    async fn refund_case_with_unknown_product_stores_nothing() {
        let harness = harness().await;

        let reply = harness
            .send(
                "POST",
                "/support-cases",
                "customer",
                None,
                Some(json!({
                    "customer_id": "cust-1",
                    "case_type": "refund",
                    "subject": "Return",
                    "description": "Wrong colour",
                    "order_id": "ORD-1",
                    "product_ids": ["sku-hat"]
                })),
            )
            .await;

        assert_eq!(reply.status, StatusCode::BAD_REQUEST);
        let listed =
            harness.send("GET", "/support-cases/customer/cust-1", "customer", None, None).await;
        assert_eq!(listed.body.as_array().map(Vec::len), Some(0));
    }
}
