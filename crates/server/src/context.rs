use axum::extract::FromRequestParts;
use axum::http::header::{ETAG, IF_MATCH};
use axum::http::request::Parts;
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use supportdesk_core::audit::AuditContext;
use supportdesk_core::{ActorRole, CaseNumber, DomainError, RefundCaseId};
use supportdesk_gateway::auth::{ACTOR_ID_HEADER, ACTOR_ROLE_HEADER};
use uuid::Uuid;

use crate::api_error::ApiError;

pub const CORRELATION_ID_HEADER: &str = "x-correlation-id";

const ANONYMOUS_ACTOR: &str = "anonymous";

/// Who is calling, under which correlation id, and which version they last saw.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequestContext {
    pub actor_id: String,
    pub role: ActorRole,
    pub correlation_id: String,
    pub expected_version: Option<u64>,
}

impl RequestContext {
    pub fn from_headers(headers: &HeaderMap) -> Result<Self, ApiError> {
        let correlation_id = header_text(headers, CORRELATION_ID_HEADER)
            .map(str::to_owned)
            .unwrap_or_else(|| format!("req-{}", Uuid::new_v4()));

        let role = match header_text(headers, ACTOR_ROLE_HEADER) {
            Some(raw) => raw
                .parse::<ActorRole>()
                .map_err(|error| ApiError::domain(error, &correlation_id))?,
            None => ActorRole::Customer,
        };
        let actor_id =
            header_text(headers, ACTOR_ID_HEADER).unwrap_or(ANONYMOUS_ACTOR).to_owned();

        let expected_version = match header_text(headers, IF_MATCH.as_str()) {
            Some(raw) => parse_if_match(raw)
                .map_err(|error| ApiError::domain(error, &correlation_id))?,
            None => None,
        };

        Ok(Self { actor_id, role, correlation_id, expected_version })
    }

    pub fn audit(
        &self,
        case_number: Option<CaseNumber>,
        refund_case_id: Option<RefundCaseId>,
    ) -> AuditContext {
        AuditContext::new(
            case_number,
            refund_case_id,
            self.correlation_id.clone(),
            format!("{}:{}", self.role, self.actor_id),
        )
    }

    /// Fails with a conflict when the caller's `If-Match` is behind `actual`.
    pub fn ensure_version(&self, resource: &str, actual: u64) -> Result<(), DomainError> {
        match self.expected_version {
            Some(expected) if expected != actual => Err(DomainError::Conflict {
                resource: resource.to_owned(),
                expected,
                actual,
            }),
            _ => Ok(()),
        }
    }
}

impl<S> FromRequestParts<S> for RequestContext
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Self::from_headers(&parts.headers)
    }
}

fn header_text<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

/// Accepts `"3"`, `W/"3"`, and a bare `3`; `*` means no precondition.
pub fn parse_if_match(raw: &str) -> Result<Option<u64>, DomainError> {
    let raw = raw.trim();
    if raw == "*" {
        return Ok(None);
    }
    let tag = raw.strip_prefix("W/").unwrap_or(raw).trim_matches('"');
    tag.parse::<u64>()
        .map(Some)
        .map_err(|_| DomainError::invariant(format!("If-Match `{raw}` is not a version tag")))
}

/// JSON body plus an `ETag` carrying the resource version.
pub fn versioned<T: Serialize>(status: StatusCode, version: u64, body: T) -> Response {
    let mut response = (status, Json(body)).into_response();
    if let Ok(value) = HeaderValue::from_str(&format!("\"{version}\"")) {
        response.headers_mut().insert(ETAG, value);
    }
    response
}
