use crate::domain::{CloseLoanError, ExtendLoanError, LoanStatus};
use thiserror::Error;

/// 貸出ライフサイクルのアプリケーション層エラー
///
/// ビジネスルール違反はすべて回復可能な型付きの失敗として呼び出し側に返す。
#[derive(Debug, Error)]
pub enum LoanApplicationError {
    /// 利用者が存在しない
    #[error("User not found")]
    UserNotFound,

    /// 書籍が存在しない
    #[error("Book not found")]
    BookNotFound,

    /// 貸出が存在しない
    #[error("Loan not found")]
    LoanNotFound,

    /// 利用者が無効化されている
    #[error("User is inactive")]
    UserInactive,

    /// 貸出可能な在庫がない
    #[error("Book is not available for loan")]
    BookUnavailable,

    /// 役割ごとの貸出上限に達している
    #[error("Loan limit exceeded (max {limit} books)")]
    LoanLimitExceeded { limit: usize },

    /// 既に返却済みまたは紛失済み
    #[error("Loan is already {}", .0.as_str())]
    LoanAlreadyTerminal(LoanStatus),

    /// 延長不可（延滞中、または延長回数の上限）
    #[error("Extension not allowed: {0}")]
    ExtensionNotAllowed(String),

    /// 並行更新が続き、遷移を確定できなかった
    #[error("Loan was modified concurrently")]
    ConcurrentUpdate,

    /// LoanRepositoryのエラー
    #[error("Loan repository error")]
    LoanRepositoryError(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// InventoryLedgerのエラー
    #[error("Inventory ledger error")]
    InventoryLedgerError(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// UserDirectoryのエラー
    #[error("User directory error")]
    UserDirectoryError(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// LoanEventLogのエラー
    #[error("Loan event log error")]
    EventLogError(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl From<CloseLoanError> for LoanApplicationError {
    fn from(err: CloseLoanError) -> Self {
        match err {
            CloseLoanError::AlreadyTerminal(status) => {
                LoanApplicationError::LoanAlreadyTerminal(status)
            }
        }
    }
}

impl From<ExtendLoanError> for LoanApplicationError {
    fn from(err: ExtendLoanError) -> Self {
        match err {
            ExtendLoanError::AlreadyTerminal(status) => {
                LoanApplicationError::LoanAlreadyTerminal(status)
            }
            ExtendLoanError::CannotExtendOverdue => {
                LoanApplicationError::ExtensionNotAllowed("loan is overdue".to_string())
            }
            ExtendLoanError::ExtensionLimitExceeded => LoanApplicationError::ExtensionNotAllowed(
                "extension limit reached".to_string(),
            ),
        }
    }
}

/// アプリケーション層の Result型
pub type Result<T> = std::result::Result<T, LoanApplicationError>;
