use crate::domain::user::UserValidationError;
use thiserror::Error;

/// 利用者管理のアプリケーション層エラー
#[derive(Debug, Error)]
pub enum UserApplicationError {
    #[error("Invalid user: {0}")]
    Validation(UserValidationError),

    #[error("Username or email is already registered")]
    DuplicateUser,

    #[error("User not found")]
    UserNotFound,

    #[error("User directory error")]
    UserDirectoryError(#[source] Box<dyn std::error::Error + Send + Sync>),
}

pub type Result<T> = std::result::Result<T, UserApplicationError>;
