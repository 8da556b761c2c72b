use crate::application::{
    catalog::CatalogApplicationError, loan::LoanApplicationError, user::UserApplicationError,
};
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};

use super::types::ErrorResponse;

/// API層のエラー型
///
/// アプリケーション層のエラーをラップし、HTTPレスポンスへのマッピングを提供する。
#[derive(Debug)]
pub enum ApiError {
    Loan(LoanApplicationError),
    Catalog(CatalogApplicationError),
    User(UserApplicationError),
    /// リクエストパラメータが不正
    BadRequest(String),
}

impl From<LoanApplicationError> for ApiError {
    fn from(err: LoanApplicationError) -> Self {
        ApiError::Loan(err)
    }
}

impl From<CatalogApplicationError> for ApiError {
    fn from(err: CatalogApplicationError) -> Self {
        ApiError::Catalog(err)
    }
}

impl From<UserApplicationError> for ApiError {
    fn from(err: UserApplicationError) -> Self {
        ApiError::User(err)
    }
}

/// 500 Internal Server Error
///
/// 内部エラーの詳細はログに記録し、クライアントには一般的なメッセージのみを返す
fn internal_error(
    error_type: &'static str,
    err: &(dyn std::error::Error + 'static),
) -> (StatusCode, &'static str, String) {
    match std::error::Error::source(err) {
        Some(source) => tracing::error!("{}: {}: {}", error_type, err, source),
        None => tracing::error!("{}: {}", error_type, err),
    }
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        error_type,
        "An unexpected error occurred".to_string(),
    )
}

fn loan_error(err: LoanApplicationError) -> (StatusCode, &'static str, String) {
    let message = err.to_string();
    match err {
        // 404 Not Found - リクエストされたリソースが存在しない
        LoanApplicationError::LoanNotFound => (StatusCode::NOT_FOUND, "LOAN_NOT_FOUND", message),
        LoanApplicationError::BookNotFound => (StatusCode::NOT_FOUND, "BOOK_NOT_FOUND", message),
        LoanApplicationError::UserNotFound => (StatusCode::NOT_FOUND, "USER_NOT_FOUND", message),

        // 409 Conflict - 現在の状態と衝突
        LoanApplicationError::BookUnavailable => {
            (StatusCode::CONFLICT, "BOOK_UNAVAILABLE", message)
        }
        LoanApplicationError::LoanAlreadyTerminal(_) => {
            (StatusCode::CONFLICT, "LOAN_ALREADY_TERMINAL", message)
        }
        LoanApplicationError::ConcurrentUpdate => {
            (StatusCode::CONFLICT, "CONCURRENT_UPDATE", message)
        }

        // 422 Unprocessable Entity - ビジネスルール違反
        LoanApplicationError::UserInactive => {
            (StatusCode::UNPROCESSABLE_ENTITY, "USER_INACTIVE", message)
        }
        LoanApplicationError::LoanLimitExceeded { .. } => {
            (StatusCode::UNPROCESSABLE_ENTITY, "LOAN_LIMIT_EXCEEDED", message)
        }
        LoanApplicationError::ExtensionNotAllowed(_) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            "EXTENSION_NOT_ALLOWED",
            message,
        ),

        // 500 Internal Server Error - システム障害
        LoanApplicationError::LoanRepositoryError(_) => {
            internal_error("LOAN_REPOSITORY_ERROR", &err)
        }
        LoanApplicationError::InventoryLedgerError(_) => {
            internal_error("INVENTORY_LEDGER_ERROR", &err)
        }
        LoanApplicationError::UserDirectoryError(_) => {
            internal_error("USER_DIRECTORY_ERROR", &err)
        }
        LoanApplicationError::EventLogError(_) => internal_error("EVENT_LOG_ERROR", &err),
    }
}

fn catalog_error(err: CatalogApplicationError) -> (StatusCode, &'static str, String) {
    let message = err.to_string();
    match err {
        CatalogApplicationError::Validation(_) => {
            (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", message)
        }
        CatalogApplicationError::BookNotFound => {
            (StatusCode::NOT_FOUND, "BOOK_NOT_FOUND", message)
        }
        CatalogApplicationError::DuplicateIsbn(_) => {
            (StatusCode::CONFLICT, "DUPLICATE_ISBN", message)
        }
        CatalogApplicationError::QuantityBelowOutstanding { .. } => (
            StatusCode::UNPROCESSABLE_ENTITY,
            "QUANTITY_BELOW_OUTSTANDING",
            message,
        ),
        CatalogApplicationError::BookCatalogError(_) => {
            internal_error("BOOK_CATALOG_ERROR", &err)
        }
        CatalogApplicationError::InventoryLedgerError(_) => {
            internal_error("INVENTORY_LEDGER_ERROR", &err)
        }
    }
}

fn user_error(err: UserApplicationError) -> (StatusCode, &'static str, String) {
    let message = err.to_string();
    match err {
        UserApplicationError::Validation(_) => {
            (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", message)
        }
        UserApplicationError::UserNotFound => (StatusCode::NOT_FOUND, "USER_NOT_FOUND", message),
        UserApplicationError::DuplicateUser => (StatusCode::CONFLICT, "DUPLICATE_USER", message),
        UserApplicationError::UserDirectoryError(_) => {
            internal_error("USER_DIRECTORY_ERROR", &err)
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match self {
            ApiError::Loan(err) => loan_error(err),
            ApiError::Catalog(err) => catalog_error(err),
            ApiError::User(err) => user_error(err),
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", message),
        };

        let body = Json(ErrorResponse::new(error_type, message));
        (status, body).into_response()
    }
}
