use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::{error, warn};

use tally_db::LedgerError;
use tally_types::api::ErrorBody;

/// Request failure, rendered as `{"error": "..."}`.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<LedgerError> for ApiError {
    fn from(e: LedgerError) -> Self {
        match e {
            LedgerError::ZeroAmount | LedgerError::AmountOutOfRange(_) | LedgerError::EmptyReason => {
                Self::BadRequest(e.to_string())
            }
            LedgerError::EntryNotFound(_) | LedgerError::DisputeNotFound(_) => {
                Self::NotFound(e.to_string())
            }
            LedgerError::AlreadyDisputed(_) | LedgerError::AlreadyResolved(..) => {
                Self::Conflict(e.to_string())
            }
            LedgerError::Store(inner) => Self::Internal(inner),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            Self::Internal(e) => {
                // Store details stay in the log
                error!("Request failed: {:#}", e);
                "Internal server error".to_string()
            }
            other => {
                warn!("Request rejected ({}): {}", status, other);
                other.to_string()
            }
        };
        (status, Json(ErrorBody { error: message })).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ledger_error_status() {
        assert_eq!(ApiError::from(LedgerError::EmptyReason).status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::from(LedgerError::AmountOutOfRange(500)).status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::from(LedgerError::EntryNotFound(1)).status(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError::from(LedgerError::AlreadyDisputed(1)).status(), StatusCode::CONFLICT);
        assert_eq!(
            ApiError::from(LedgerError::AlreadyResolved(1, "approved")).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError::from(LedgerError::Store(anyhow::anyhow!("disk full"))).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
