//! Error handling for the POS inventory engine
//!
//! Every failure leaves the service layer as an [`AppError`] and is rendered
//! as `{ "error": { "code", "message", "field"?, "entity"? } }`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use rust_decimal::Decimal;
use serde::Serialize;
use shared::{LedgerError, LedgerKey, LineValidationError, ReportWindowError, TransitionError};
use thiserror::Error;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Authentication errors
    #[error("Token expired")]
    TokenExpired,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Insufficient permissions")]
    InsufficientPermissions,

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    // Validation errors
    #[error("Validation error: {message}")]
    Validation { field: String, message: String },

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Product {name} ({product_id}) is not tracked through goods receipts")]
    ProductNotGrnEligible { product_id: String, name: String },

    #[error("Conflict: {message}")]
    Conflict { resource: String, message: String },

    #[error("Resource not found: {0}")]
    NotFound(String),

    // Business logic errors
    #[error("Invalid state transition: {0}")]
    InvalidStateTransition(String),

    #[error("Insufficient stock for {product_id}: {available} available, {requested} requested")]
    InsufficientStock {
        product_id: String,
        available: Decimal,
        requested: Decimal,
    },

    // Database errors
    #[error("Database error: {0}")]
    DatabaseError(sqlx::Error),

    // Internal errors
    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Internal server error")]
    InternalError(#[from] anyhow::Error),
}

impl AppError {
    /// Attach the ledger entry a failed stock calculation was applied to
    pub fn from_ledger(err: LedgerError, key: &LedgerKey) -> Self {
        match err {
            LedgerError::InsufficientStock {
                available,
                requested,
            } => AppError::InsufficientStock {
                product_id: key.product_id.clone(),
                available,
                requested,
            },
            LedgerError::NonPositiveQuantity(_) => AppError::Validation {
                field: "quantity".to_string(),
                message: err.to_string(),
            },
            LedgerError::NegativeCost(_) => AppError::Validation {
                field: "unit_cost".to_string(),
                message: err.to_string(),
            },
            LedgerError::NegativeQuantity(_) => AppError::Conflict {
                resource: key.to_string(),
                message: err.to_string(),
            },
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::TokenExpired | AppError::InvalidToken | AppError::Unauthorized(_) => {
                StatusCode::UNAUTHORIZED
            }
            AppError::InsufficientPermissions => StatusCode::FORBIDDEN,
            AppError::Validation { .. }
            | AppError::ValidationError(_)
            | AppError::ProductNotGrnEligible { .. } => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict { .. }
            | AppError::InvalidStateTransition(_)
            | AppError::InsufficientStock { .. } => StatusCode::CONFLICT,
            AppError::DatabaseError(_) | AppError::Internal(_) | AppError::InternalError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<TransitionError> for AppError {
    fn from(err: TransitionError) -> Self {
        AppError::InvalidStateTransition(err.to_string())
    }
}

/// Deadlock detected and serialization failure. Postgres aborts one of the
/// competing transactions, which the client may retry.
const TRANSACTION_CONFLICT_CODES: [&str; 2] = ["40P01", "40001"];

fn is_transaction_conflict(code: &str) -> bool {
    TRANSACTION_CONFLICT_CODES.contains(&code)
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        let conflict = err
            .as_database_error()
            .and_then(|db| db.code())
            .is_some_and(|code| is_transaction_conflict(&code));
        if conflict {
            return AppError::Conflict {
                resource: "transaction".to_string(),
                message: "Concurrent update to the same stock, please retry".to_string(),
            };
        }
        AppError::DatabaseError(err)
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Internal(format!("Failed to encode payload: {}", err))
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::ValidationError(err.to_string())
    }
}

impl From<LineValidationError> for AppError {
    fn from(err: LineValidationError) -> Self {
        AppError::Validation {
            field: match err.index {
                Some(index) => format!("lines[{}].{}", index, err.field),
                None => err.field.to_string(),
            },
            message: err.to_string(),
        }
    }
}

impl From<ReportWindowError> for AppError {
    fn from(err: ReportWindowError) -> Self {
        let field = match err {
            ReportWindowError::InvalidMonth(_) => "month",
            ReportWindowError::StartAfterEnd { .. } | ReportWindowError::InvalidDate(_) => "date",
        };
        AppError::Validation {
            field: field.to_string(),
            message: err.to_string(),
        }
    }
}

/// Error response structure
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity: Option<String>,
}

impl ErrorDetail {
    fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
            field: None,
            entity: None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let error_detail = match &self {
            AppError::TokenExpired => ErrorDetail::new("TOKEN_EXPIRED", "Token has expired"),
            AppError::InvalidToken => ErrorDetail::new("INVALID_TOKEN", "Invalid token"),
            AppError::InsufficientPermissions => ErrorDetail::new(
                "INSUFFICIENT_PERMISSIONS",
                "You do not have permission to perform this action",
            ),
            AppError::Unauthorized(message) => ErrorDetail::new("UNAUTHORIZED", message.clone()),
            AppError::Validation { field, message } => ErrorDetail {
                field: Some(field.clone()),
                ..ErrorDetail::new("VALIDATION_ERROR", message.clone())
            },
            AppError::ValidationError(msg) => ErrorDetail::new("VALIDATION_ERROR", msg.clone()),
            AppError::ProductNotGrnEligible { product_id, .. } => ErrorDetail {
                entity: Some(product_id.clone()),
                ..ErrorDetail::new("PRODUCT_NOT_GRN_ELIGIBLE", self.to_string())
            },
            AppError::Conflict { resource, message } => ErrorDetail {
                entity: Some(resource.clone()),
                ..ErrorDetail::new("CONFLICT", message.clone())
            },
            AppError::NotFound(resource) => {
                ErrorDetail::new("NOT_FOUND", format!("{} not found", resource))
            }
            AppError::InvalidStateTransition(msg) => {
                ErrorDetail::new("INVALID_STATE_TRANSITION", msg.clone())
            }
            AppError::InsufficientStock { product_id, .. } => ErrorDetail {
                entity: Some(product_id.clone()),
                ..ErrorDetail::new("INSUFFICIENT_STOCK", self.to_string())
            },
            AppError::DatabaseError(_) => {
                ErrorDetail::new("DATABASE_ERROR", "A database error occurred")
            }
            AppError::Internal(msg) => ErrorDetail::new("INTERNAL_ERROR", msg.clone()),
            AppError::InternalError(_) => {
                ErrorDetail::new("INTERNAL_ERROR", "An internal server error occurred")
            }
        };

        if status.is_server_error() {
            tracing::error!("Error: {:?}", self);
        } else {
            tracing::warn!("Request rejected: {}", self);
        }

        (status, Json(ErrorResponse { error: error_detail })).into_response()
    }
}

/// Result type alias for handlers
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::borrow::Cow;
    use std::fmt;

    #[derive(Debug)]
    struct PgError(&'static str);

    impl fmt::Display for PgError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "error with SQLSTATE {}", self.0)
        }
    }

    impl std::error::Error for PgError {}

    impl sqlx::error::DatabaseError for PgError {
        fn message(&self) -> &str {
            "transaction aborted"
        }

        fn code(&self) -> Option<Cow<'_, str>> {
            Some(Cow::Borrowed(self.0))
        }

        fn as_error(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
            self
        }

        fn as_error_mut(&mut self) -> &mut (dyn std::error::Error + Send + Sync + 'static) {
            self
        }

        fn into_error(self: Box<Self>) -> Box<dyn std::error::Error + Send + Sync + 'static> {
            self
        }

        fn kind(&self) -> sqlx::error::ErrorKind {
            sqlx::error::ErrorKind::Other
        }
    }

    fn from_sqlstate(code: &'static str) -> AppError {
        AppError::from(sqlx::Error::Database(Box::new(PgError(code))))
    }

    #[test]
    fn test_deadlock_maps_to_conflict() {
        for code in ["40P01", "40001"] {
            let err = from_sqlstate(code);
            assert!(matches!(err, AppError::Conflict { .. }), "{}", code);
            assert_eq!(err.status(), StatusCode::CONFLICT);
        }
    }

    #[test]
    fn test_other_database_errors_stay_internal() {
        let err = from_sqlstate("23505");
        assert!(matches!(err, AppError::DatabaseError(_)));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let err = AppError::from(sqlx::Error::RowNotFound);
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
