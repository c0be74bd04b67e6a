//! Maps lifecycle and storage failures onto HTTP responses.
//!
//! Every error body is `{"detail": ..., "error_class": ...}` and the
//! response echoes the request's correlation id.

use axum::extract::rejection::JsonRejection;
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use supportdesk_core::{ApplicationError, DomainError, InterfaceError};
use supportdesk_db::repositories::RepositoryError;
use supportdesk_gateway::wire::ErrorBody;
use tracing::{error, warn};

use crate::context::{RequestContext, CORRELATION_ID_HEADER};

#[derive(Debug)]
pub struct ApiError(pub InterfaceError);

impl ApiError {
    pub fn application(error: ApplicationError, correlation_id: &str) -> Self {
        Self(error.into_interface(correlation_id))
    }

    pub fn domain(error: DomainError, correlation_id: &str) -> Self {
        Self::application(ApplicationError::Domain(error), correlation_id)
    }

    pub fn not_found(message: impl Into<String>, correlation_id: &str) -> Self {
        Self::application(ApplicationError::NotFound(message.into()), correlation_id)
    }

    pub fn repository(error: RepositoryError, correlation_id: &str) -> Self {
        let application = match error {
            RepositoryError::VersionConflict { resource, expected, actual } => {
                ApplicationError::Domain(DomainError::Conflict { resource, expected, actual })
            }
            RepositoryError::NotFound(resource) => {
                ApplicationError::NotFound(format!("`{resource}` does not exist"))
            }
            RepositoryError::Duplicate(resource) => {
                return Self(InterfaceError::Conflict {
                    message: format!("`{resource}` already exists"),
                    correlation_id: correlation_id.to_owned(),
                });
            }
            error @ (RepositoryError::Database(_) | RepositoryError::Decode(_)) => {
                ApplicationError::Persistence(error.to_string())
            }
        };
        Self::application(application, correlation_id)
    }

    pub fn status(&self) -> StatusCode {
        match &self.0 {
            InterfaceError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            InterfaceError::NotFound { .. } => StatusCode::NOT_FOUND,
            InterfaceError::Conflict { .. } => StatusCode::CONFLICT,
            InterfaceError::Unprocessable { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            InterfaceError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            InterfaceError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let error = self.0;

        if status.is_server_error() {
            error!(
                event_name = "server.request.failed",
                correlation_id = %error.correlation_id(),
                error_class = error.error_class(),
                detail = %error.message(),
                "request failed"
            );
        } else {
            warn!(
                event_name = "server.request.rejected",
                correlation_id = %error.correlation_id(),
                error_class = error.error_class(),
                detail = %error.message(),
                "request rejected"
            );
        }

        let detail = match &error {
            InterfaceError::Internal { .. } => error.user_message().to_owned(),
            other => other.message().to_owned(),
        };
        let body = ErrorBody { detail, error_class: error.error_class().to_owned() };

        let mut response = (status, Json(body)).into_response();
        if let Ok(value) = HeaderValue::from_str(error.correlation_id()) {
            response.headers_mut().insert(CORRELATION_ID_HEADER, value);
        }
        response
    }
}

/// Attaches the request's correlation id while converting a failure.
pub trait ApiResultExt<T> {
    fn for_request(self, ctx: &RequestContext) -> Result<T, ApiError>;
}

impl<T> ApiResultExt<T> for Result<T, DomainError> {
    fn for_request(self, ctx: &RequestContext) -> Result<T, ApiError> {
        self.map_err(|error| ApiError::domain(error, &ctx.correlation_id))
    }
}

impl<T> ApiResultExt<T> for Result<T, RepositoryError> {
    fn for_request(self, ctx: &RequestContext) -> Result<T, ApiError> {
        self.map_err(|error| ApiError::repository(error, &ctx.correlation_id))
    }
}

/// Unwraps a JSON body, turning axum's rejection into a `bad_request` body.
pub fn json_body<T>(
    payload: Result<Json<T>, JsonRejection>,
    ctx: &RequestContext,
) -> Result<T, ApiError> {
    payload.map(|Json(value)| value).map_err(|rejection| {
        ApiError(InterfaceError::BadRequest {
            message: rejection.body_text(),
            correlation_id: ctx.correlation_id.clone(),
        })
    })
}
