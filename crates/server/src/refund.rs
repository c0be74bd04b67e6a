use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Response;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde::Deserialize;
use supportdesk_core::audit::{AuditCategory, AuditOutcome};
use supportdesk_core::{
    deliveries_for, CaseAggregate, CustomerId, DomainError, InterfaceError, NewRefundRequest,
    RefundCase, RefundCaseId, RefundStatus, SupportCase,
};
use supportdesk_db::repositories::CaseWrite;
use supportdesk_gateway::{
    DecisionRequest, RefundCaseDetail, SupportCaseSummary, UpdateProductsRequest,
};
use tracing::info;

use crate::api_error::{json_body, ApiError, ApiResultExt};
use crate::context::{versioned, RequestContext};
use crate::state::AppState;
use crate::support::load_case;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/refund-cases", get(list_refunds).post(create_refund))
        .route("/refund-cases/customer/{customer_id}", get(list_for_customer))
        .route("/refund-cases/{id}", get(get_refund))
        .route("/refund-cases/{id}/detailed", get(get_detailed))
        .route("/refund-cases/{id}/products", put(update_products))
        .route("/refund-cases/{id}/decisions", post(submit_decision))
        .route("/refund-cases/{id}/complete", put(complete_refund))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct ListFilter {
    status: Option<String>,
}

async fn create_refund(
    State(state): State<AppState>,
    ctx: RequestContext,
    payload: Result<Json<NewRefundRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let request = json_body(payload, &ctx)?;
    let case = load_case(&state, &ctx, &request.case_number).await?;
    let (_, refund) = open_refund(&state, &ctx, case, request, CaseWrite::Update).await?;
    Ok(versioned(StatusCode::CREATED, refund.version, refund))
}

/// Evaluates eligibility from the stored order lines, opens the refund, and
/// links it to `case`. Both rows are written in one transaction; `write`
/// says whether `case` is new or already stored.
pub(crate) async fn open_refund(
    state: &AppState,
    ctx: &RequestContext,
    case: SupportCase,
    request: NewRefundRequest,
    write: CaseWrite,
) -> Result<(SupportCase, RefundCase), ApiError> {
    if case.customer_id != request.customer_id {
        return Err(ApiError::domain(
            DomainError::invariant(format!(
                "support case `{}` belongs to another customer",
                case.case_number.0
            )),
            &ctx.correlation_id,
        ));
    }
    ctx.ensure_version(&case.case_number.0, case.version).for_request(ctx)?;
    let audit = ctx.audit(Some(case.case_number.clone()), None);

    let lines = state.order_lines.find_for_order(&request.order_id).await.for_request(ctx)?;
    let deliveries = deliveries_for(&lines, &request.product_ids).for_request(ctx)?;
    let assessment = state.policy.assess(state.clock.today(), &deliveries);

    let refund = RefundCase::open(RefundCaseId::generate(), request, assessment).for_request(ctx)?;
    let aggregate = match CaseAggregate::with_refund(case, refund) {
        Ok(aggregate) => aggregate,
        Err(error) => {
            state.audit.emit(
                audit
                    .event("refund.link_rejected", AuditCategory::Lifecycle, AuditOutcome::Rejected)
                    .with_metadata("error", error.to_string()),
            );
            return Err(ApiError::domain(error, &ctx.correlation_id));
        }
    };

    let (case, refund) = split(aggregate, ctx)?;
    let (case, refund) = state.refunds.insert_linked(refund, case, write).await.for_request(ctx)?;

    state.audit.emit(
        ctx.audit(Some(case.case_number.clone()), Some(refund.refund_case_id.clone()))
            .event("refund.created", AuditCategory::Eligibility, AuditOutcome::Success)
            .with_metadata("eligibility_status", refund.eligibility_status.as_str())
            .with_metadata("total_refund_amount", refund.total_refund_amount.to_string()),
    );
    info!(
        event_name = "refund.case.created",
        correlation_id = %ctx.correlation_id,
        case_number = %case.case_number.0,
        refund_case_id = %refund.refund_case_id.0,
        eligibility_status = %refund.eligibility_status,
        "refund case opened"
    );

    Ok((case, refund))
}

/// Every refund case, optionally narrowed to one status. Agents only.
async fn list_refunds(
    State(state): State<AppState>,
    ctx: RequestContext,
    Query(filter): Query<ListFilter>,
) -> Result<Json<Vec<RefundCase>>, ApiError> {
    if !ctx.role.is_agent() {
        return Err(ApiError(InterfaceError::Unprocessable {
            message: "only agents can list every refund case".to_owned(),
            correlation_id: ctx.correlation_id.clone(),
        }));
    }
    let status =
        filter.status.as_deref().map(str::parse::<RefundStatus>).transpose().for_request(&ctx)?;
    let refunds = state.refunds.list(status).await.for_request(&ctx)?;
    Ok(Json(refunds))
}

async fn get_refund(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let refund = load_refund(&state, &ctx, &RefundCaseId(id)).await?;
    Ok(versioned(StatusCode::OK, refund.version, refund))
}

async fn get_detailed(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let refund = load_refund(&state, &ctx, &RefundCaseId(id)).await?;
    let support_case = state
        .cases
        .find_by_number(&refund.case_number)
        .await
        .for_request(&ctx)?
        .as_ref()
        .map(SupportCaseSummary::from);

    let version = refund.version;
    Ok(versioned(StatusCode::OK, version, RefundCaseDetail { refund_case: refund, support_case }))
}

async fn list_for_customer(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(customer_id): Path<String>,
) -> Result<Json<Vec<RefundCase>>, ApiError> {
    let refunds =
        state.refunds.list_for_customer(&CustomerId(customer_id)).await.for_request(&ctx)?;
    Ok(Json(refunds))
}

/// Replaces the product list of a pending refund and re-runs eligibility
/// against the order's delivery records.
async fn update_products(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<String>,
    payload: Result<Json<UpdateProductsRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let request = json_body(payload, &ctx)?;
    let mut refund = load_current(&state, &ctx, &RefundCaseId(id)).await?;
    let audit = ctx.audit(Some(refund.case_number.clone()), Some(refund.refund_case_id.clone()));

    let lines = state.order_lines.find_for_order(&refund.order_id).await.for_request(&ctx)?;
    let deliveries = deliveries_for(&lines, &request.product_ids).for_request(&ctx)?;
    let assessment = state.policy.assess(state.clock.today(), &deliveries);

    if let Err(error) = refund.reassess(request.product_ids, assessment) {
        state.audit.emit(
            audit
                .event("refund.reassessment_rejected", AuditCategory::Eligibility, AuditOutcome::Rejected)
                .with_metadata("error", error.to_string()),
        );
        return Err(ApiError::domain(error, &ctx.correlation_id));
    }
    state.audit.emit(
        audit
            .event("refund.reassessed", AuditCategory::Eligibility, AuditOutcome::Success)
            .with_metadata("eligibility_status", refund.eligibility_status.as_str())
            .with_metadata("total_refund_amount", refund.total_refund_amount.to_string()),
    );

    save(&state, &ctx, refund).await
}

async fn submit_decision(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<String>,
    payload: Result<Json<DecisionRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let decision = json_body(payload, &ctx)?;
    let refund = load_current(&state, &ctx, &RefundCaseId(id)).await?;
    let audit = ctx.audit(Some(refund.case_number.clone()), Some(refund.refund_case_id.clone()));
    let from = refund.status;
    let kind = decision.response_type;

    let mut aggregate = with_case(&state, &ctx, refund).await?;
    if let Err(error) = aggregate.apply_refund_decision(decision.into_input(), ctx.role) {
        state.audit.emit(
            audit
                .event("refund.decision_rejected", AuditCategory::Decision, AuditOutcome::Rejected)
                .with_metadata("decision", kind.as_str())
                .with_metadata("error", error.to_string()),
        );
        return Err(ApiError::domain(error, &ctx.correlation_id));
    }
    let (_, refund) = split(aggregate, &ctx)?;
    state.audit.emit(
        audit
            .event("refund.decision_recorded", AuditCategory::Decision, AuditOutcome::Success)
            .with_metadata("decision", kind.as_str())
            .with_metadata("from", from.as_str())
            .with_metadata("to", refund.status.as_str()),
    );

    save(&state, &ctx, refund).await
}

async fn complete_refund(
    State(state): State<AppState>,
    ctx: RequestContext,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let refund = load_current(&state, &ctx, &RefundCaseId(id)).await?;
    let audit = ctx.audit(Some(refund.case_number.clone()), Some(refund.refund_case_id.clone()));

    let mut aggregate = with_case(&state, &ctx, refund).await?;
    if let Err(error) = aggregate.apply_refund_transition(RefundStatus::Completed, ctx.role, None) {
        state.audit.emit(
            audit
                .event("refund.completion_rejected", AuditCategory::Decision, AuditOutcome::Rejected)
                .with_metadata("error", error.to_string()),
        );
        return Err(ApiError::domain(error, &ctx.correlation_id));
    }
    let (_, refund) = split(aggregate, &ctx)?;
    state.audit.emit(
        audit
            .event("refund.completed", AuditCategory::Decision, AuditOutcome::Success)
            .with_metadata("payable_amount", refund.payable_amount().to_string()),
    );

    save(&state, &ctx, refund).await
}

async fn load_refund(
    state: &AppState,
    ctx: &RequestContext,
    id: &RefundCaseId,
) -> Result<RefundCase, ApiError> {
    state.refunds.find_by_id(id).await.for_request(ctx)?.ok_or_else(|| {
        ApiError::not_found(format!("refund case `{}` does not exist", id.0), &ctx.correlation_id)
    })
}

async fn load_current(
    state: &AppState,
    ctx: &RequestContext,
    id: &RefundCaseId,
) -> Result<RefundCase, ApiError> {
    let refund = load_refund(state, ctx, id).await?;
    ctx.ensure_version(&refund.refund_case_id.0, refund.version).for_request(ctx)?;
    Ok(refund)
}

/// Pairs `refund` with its owning support case so decisions run through
/// the aggregate.
async fn with_case(
    state: &AppState,
    ctx: &RequestContext,
    refund: RefundCase,
) -> Result<CaseAggregate, ApiError> {
    let case = load_case(state, ctx, &refund.case_number).await?;
    CaseAggregate::with_refund(case, refund).for_request(ctx)
}

fn split(
    aggregate: CaseAggregate,
    ctx: &RequestContext,
) -> Result<(SupportCase, RefundCase), ApiError> {
    match aggregate.into_parts() {
        (case, Some(refund)) => Ok((case, refund)),
        (_, None) => Err(ApiError::domain(
            DomainError::invariant("refund was not attached"),
            &ctx.correlation_id,
        )),
    }
}

async fn save(
    state: &AppState,
    ctx: &RequestContext,
    refund: RefundCase,
) -> Result<Response, ApiError> {
    let refund = state.refunds.update(refund).await.for_request(ctx)?;
    info!(
        event_name = "refund.case.updated",
        correlation_id = %ctx.correlation_id,
        refund_case_id = %refund.refund_case_id.0,
        status = %refund.status,
        version = refund.version,
        "refund case saved"
    );
    Ok(versioned(StatusCode::OK, refund.version, refund))
}
