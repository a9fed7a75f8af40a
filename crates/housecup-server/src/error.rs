//! Error type for the command surface.
//!
//! [`ApiError`] maps core failures and rejected requests onto HTTP
//! statuses and renders them in the same JSON envelope as successful
//! responses, with `success: false`.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use housecup_core::LedgerError;
use housecup_types::UnknownHouse;

/// Errors returned by API handlers.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The request was malformed or failed validation.
    #[error("{0}")]
    InvalidArgument(String),

    /// The requested resource has no data.
    #[error("{0}")]
    NotFound(String),

    /// The ledger store could not be reached.
    #[error("{0}")]
    Unavailable(String),

    /// The client exceeded its request budget.
    #[error("{0}")]
    TooManyRequests(String),
}

impl ApiError {
    /// HTTP status for this error.
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::TooManyRequests(_) => StatusCode::TOO_MANY_REQUESTS,
        }
    }
}

impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::InvalidArgument(msg) => Self::InvalidArgument(msg),
            LedgerError::NotFound(msg) => Self::NotFound(msg),
            LedgerError::StoreUnavailable(e) => {
                tracing::error!(error = %e, "Ledger store failure");
                Self::Unavailable(String::from("ledger store unavailable"))
            }
        }
    }
}

impl From<UnknownHouse> for ApiError {
    fn from(err: UnknownHouse) -> Self {
        Self::InvalidArgument(err.to_string())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::InvalidArgument(rejection.body_text())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::InvalidArgument(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = serde_json::json!({
            "success": false,
            "error": self.to_string(),
            "timestamp": Utc::now(),
        });

        (status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use housecup_db::DbError;

    use super::*;

    #[test]
    fn ledger_errors_map_to_statuses() {
        let cases = [
            (
                LedgerError::InvalidArgument(String::from("bad")),
                StatusCode::BAD_REQUEST,
            ),
            (
                LedgerError::NotFound(String::from("gone")),
                StatusCode::NOT_FOUND,
            ),
            (
                LedgerError::StoreUnavailable(DbError::Unavailable(String::from("down"))),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status(), status);
        }
    }

    #[test]
    fn store_details_are_not_leaked() {
        let err = ApiError::from(LedgerError::StoreUnavailable(DbError::Unavailable(
            String::from("password=hunter2"),
        )));
        assert!(!err.to_string().contains("hunter2"));
    }
}
