use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// Domain errors surfaced at the flow boundary. Everything a handler can
/// fail with maps onto exactly one status code here; unexpected errors
/// collapse into `Internal` and never leak detail to the client.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Auth(&'static str),
    #[error("{0}")]
    Forbidden(&'static str),
    #[error("{0}")]
    NotFound(&'static str),
    #[error("{0}")]
    Dependency(&'static str),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<sqlx::Error> for ApiError {
    fn from(e: sqlx::Error) -> Self {
        if let Some(db_err) = e.as_database_error() {
            if db_err.is_unique_violation() {
                return ApiError::Validation("email already registered".into());
            }
        }
        ApiError::Internal(e.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Validation(m) => (StatusCode::BAD_REQUEST, m),
            ApiError::Auth(m) => (StatusCode::UNAUTHORIZED, m.to_string()),
            ApiError::Forbidden(m) => (StatusCode::FORBIDDEN, m.to_string()),
            ApiError::NotFound(m) => (StatusCode::NOT_FOUND, m.to_string()),
            ApiError::Dependency(m) => (StatusCode::BAD_GATEWAY, m.to_string()),
            ApiError::Internal(e) => {
                error!(error = %e, "internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error".to_string(),
                )
            }
        };
        (status, Json(json!({ "message": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_of(err: ApiError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn domain_errors_map_to_expected_statuses() {
        assert_eq!(
            status_of(ApiError::Validation("bad".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(ApiError::Auth("invalid credentials")),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            status_of(ApiError::Forbidden("not the owner")),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            status_of(ApiError::NotFound("post not found")),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(ApiError::Dependency("mail provider unavailable")),
            StatusCode::BAD_GATEWAY
        );
    }

    #[test]
    fn internal_error_hides_detail() {
        let resp = ApiError::Internal(anyhow::anyhow!("connection refused to 10.0.0.3"))
            .into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
