use super::{ExtensionError, LoanStatus};

/// 延長のエラー
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtendLoanError {
    /// 既に返却済みまたは紛失済み
    AlreadyTerminal(LoanStatus),
    /// 延滞中のため延長不可
    CannotExtendOverdue,
    /// 延長回数の上限を超えた
    ExtensionLimitExceeded,
}

impl From<ExtensionError> for ExtendLoanError {
    fn from(err: ExtensionError) -> Self {
        match err {
            ExtensionError::LimitExceeded => ExtendLoanError::ExtensionLimitExceeded,
        }
    }
}

/// 返却・紛失処理のエラー
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseLoanError {
    /// 既に返却済みまたは紛失済み
    AlreadyTerminal(LoanStatus),
}
