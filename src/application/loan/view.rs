use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::{
    Loan, LoanPolicy, LoanStatus,
    loan::refresh_status,
    value_objects::{BookId, LoanId, UserId},
};

/// 貸出ビュー
///
/// 呼び出し側に返す貸出の読み取り表現。
/// ステータスは常に読み出し時刻で再計算され、保存済みの延滞フラグには依存しない。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoanView {
    pub loan_id: LoanId,
    pub book_id: BookId,
    pub user_id: UserId,
    pub loaned_at: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
    pub returned_at: Option<DateTime<Utc>>,
    pub lost_at: Option<DateTime<Utc>>,
    pub extension_count: u8,
    pub status: LoanStatus,
    pub can_extend: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl LoanView {
    /// 貸出集約から`now`時点のビューを構築する
    pub fn at(loan: Loan, now: DateTime<Utc>, policy: &LoanPolicy) -> Self {
        let loan = refresh_status(loan, now);
        let core = loan.core();

        Self {
            loan_id: core.loan_id,
            book_id: core.book_id,
            user_id: core.user_id,
            loaned_at: core.loaned_at,
            due_date: core.due_date,
            returned_at: loan.returned_at(),
            lost_at: loan.lost_at(),
            extension_count: core.extension_count.value(),
            status: loan.status(),
            can_extend: policy.can_extend(&loan),
            created_at: core.created_at,
            updated_at: core.updated_at,
        }
    }
}
