use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{
    BookId, BookLoaned, BookLost, BookReturned, CloseLoanError, ExtendLoanError, ExtensionCount,
    LoanBecameOverdue, LoanExtended, LoanId, LoanPolicy, Role, UserId,
};

/// 貸出ステータス
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoanStatus {
    /// 貸出中
    Active,
    /// 延滞中
    Overdue,
    /// 返却済み
    Returned,
    /// 紛失
    Lost,
}

impl LoanStatus {
    /// 文字列表現を取得する
    pub fn as_str(&self) -> &'static str {
        match self {
            LoanStatus::Active => "active",
            LoanStatus::Overdue => "overdue",
            LoanStatus::Returned => "returned",
            LoanStatus::Lost => "lost",
        }
    }

    /// 終端状態（返却済み・紛失）か
    pub fn is_terminal(&self) -> bool {
        matches!(self, LoanStatus::Returned | LoanStatus::Lost)
    }
}

impl std::str::FromStr for LoanStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(LoanStatus::Active),
            "overdue" => Ok(LoanStatus::Overdue),
            "returned" => Ok(LoanStatus::Returned),
            "lost" => Ok(LoanStatus::Lost),
            _ => Err(format!("Invalid loan status: {}", s)),
        }
    }
}

// ============================================================================
// 型安全な状態パターン
// ============================================================================

/// Loan集約の共通フィールド
///
/// すべての貸出状態で共有されるコアデータ。
/// 書籍・利用者への参照はIDのみで持つ。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoanCore {
    pub loan_id: LoanId,

    pub book_id: BookId,
    pub user_id: UserId,

    pub loaned_at: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
    pub extension_count: ExtensionCount,

    // 楽観的排他制御用。状態遷移ごとに1増える
    pub revision: u32,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 貸出中状態
///
/// ビジネスルール：
/// - 返却期限内
/// - ポリシーの上限まで延長可能
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveLoan {
    #[serde(flatten)]
    pub core: LoanCore,
}

impl std::ops::Deref for ActiveLoan {
    type Target = LoanCore;

    fn deref(&self) -> &Self::Target {
        &self.core
    }
}

/// 延滞中状態
///
/// ビジネスルール：
/// - 返却期限を過ぎている
/// - 延長不可、返却・紛失は可能
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverdueLoan {
    #[serde(flatten)]
    pub core: LoanCore,
}

impl std::ops::Deref for OverdueLoan {
    type Target = LoanCore;

    fn deref(&self) -> &Self::Target {
        &self.core
    }
}

/// 返却済み状態（終端）
///
/// returned_atが必須（型で保証）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReturnedLoan {
    #[serde(flatten)]
    pub core: LoanCore,
    pub returned_at: DateTime<Utc>,
}

impl std::ops::Deref for ReturnedLoan {
    type Target = LoanCore;

    fn deref(&self) -> &Self::Target {
        &self.core
    }
}

/// 紛失状態（終端）
///
/// 返却日は持たない。紛失を記録した時刻のみ保持する。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LostLoan {
    #[serde(flatten)]
    pub core: LoanCore,
    pub lost_at: DateTime<Utc>,
}

impl std::ops::Deref for LostLoan {
    type Target = LoanCore;

    fn deref(&self) -> &Self::Target {
        &self.core
    }
}

/// Loan集約の統合型
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Loan {
    Active(ActiveLoan),
    Overdue(OverdueLoan),
    Returned(ReturnedLoan),
    Lost(LostLoan),
}

impl Loan {
    pub fn core(&self) -> &LoanCore {
        match self {
            Loan::Active(loan) => &loan.core,
            Loan::Overdue(loan) => &loan.core,
            Loan::Returned(loan) => &loan.core,
            Loan::Lost(loan) => &loan.core,
        }
    }

    pub fn status(&self) -> LoanStatus {
        match self {
            Loan::Active(_) => LoanStatus::Active,
            Loan::Overdue(_) => LoanStatus::Overdue,
            Loan::Returned(_) => LoanStatus::Returned,
            Loan::Lost(_) => LoanStatus::Lost,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status().is_terminal()
    }

    pub fn returned_at(&self) -> Option<DateTime<Utc>> {
        match self {
            Loan::Returned(loan) => Some(loan.returned_at),
            _ => None,
        }
    }

    pub fn lost_at(&self) -> Option<DateTime<Utc>> {
        match self {
            Loan::Lost(loan) => Some(loan.lost_at),
            _ => None,
        }
    }
}

/// 純粋関数：書籍を貸し出す
///
/// ビジネスルール：
/// - 返却期限は利用者の役割に応じたポリシーの標準期限
/// - 状態はActive、延長回数は0
///
/// 在庫確保と貸出上限の確認はアプリケーション層で行う。
pub fn checkout_loan(
    book_id: BookId,
    user_id: UserId,
    role: Role,
    loaned_at: DateTime<Utc>,
    policy: &LoanPolicy,
) -> (ActiveLoan, BookLoaned) {
    let loan_id = LoanId::new();
    let due_date = policy.default_due_date(role, loaned_at);

    let loan = ActiveLoan {
        core: LoanCore {
            loan_id,
            book_id,
            user_id,
            loaned_at,
            due_date,
            extension_count: ExtensionCount::new(),
            revision: 1,
            created_at: loaned_at,
            updated_at: loaned_at,
        },
    };

    let event = BookLoaned {
        loan_id,
        book_id,
        user_id,
        loaned_at,
        due_date,
    };

    (loan, event)
}

/// 純粋関数：延滞判定
///
/// 終端状態でなく、返却期限を過ぎていれば延滞。
pub fn is_overdue(loan: &Loan, now: DateTime<Utc>) -> bool {
    match loan {
        Loan::Overdue(_) => true,
        Loan::Active(active) => now > active.due_date,
        Loan::Returned(_) | Loan::Lost(_) => false,
    }
}

/// 純粋関数：現在時刻で状態を再計算する
///
/// 保存されたステータスがActiveでも、返却期限を過ぎていればOverdueとして扱う。
/// 読み出し時には必ずこの関数を通す。
pub fn refresh_status(loan: Loan, now: DateTime<Utc>) -> Loan {
    match loan {
        Loan::Active(active) if now > active.due_date => {
            Loan::Overdue(OverdueLoan { core: active.core })
        }
        other => other,
    }
}

/// 純粋関数：延滞を確定する
///
/// 延滞検出バッチが保存済みステータスを更新するときに使う。
pub fn mark_overdue(
    loan: ActiveLoan,
    detected_at: DateTime<Utc>,
) -> (OverdueLoan, LoanBecameOverdue) {
    let event = LoanBecameOverdue {
        loan_id: loan.loan_id,
        book_id: loan.book_id,
        user_id: loan.user_id,
        due_date: loan.due_date,
        detected_at,
    };

    let overdue = OverdueLoan {
        core: LoanCore {
            revision: loan.revision + 1,
            updated_at: detected_at,
            ..loan.core
        },
    };

    (overdue, event)
}

/// 純粋関数：貸出を延長する
///
/// ビジネスルール：
/// - 終端状態は延長不可
/// - 延滞中（期限超過を含む）は延長不可
/// - 延長回数はポリシーの上限まで
/// - 新しい期限：現在の返却期限 + 延長日数
pub fn extend_loan(
    loan: Loan,
    extended_at: DateTime<Utc>,
    policy: &LoanPolicy,
) -> Result<(ActiveLoan, LoanExtended), ExtendLoanError> {
    let loan = refresh_status(loan, extended_at);

    let active = match loan {
        Loan::Active(active) => active,
        Loan::Overdue(_) => return Err(ExtendLoanError::CannotExtendOverdue),
        terminal @ (Loan::Returned(_) | Loan::Lost(_)) => {
            return Err(ExtendLoanError::AlreadyTerminal(terminal.status()));
        }
    };

    let old_due_date = active.due_date;
    let new_due_date = policy.extended_due_date(&Loan::Active(active.clone()));
    let new_extension_count = active.extension_count.increment(policy.max_extensions())?;
    let loan_id = active.loan_id;

    let extended = ActiveLoan {
        core: LoanCore {
            due_date: new_due_date,
            extension_count: new_extension_count,
            revision: active.revision + 1,
            updated_at: extended_at,
            ..active.core
        },
    };

    let event = LoanExtended {
        loan_id,
        old_due_date,
        new_due_date,
        extended_at,
        extension_count: new_extension_count.value(),
    };

    Ok((extended, event))
}

/// 純粋関数：書籍を返却する
///
/// ビジネスルール：
/// - ActiveまたはOverdueを受け付ける
/// - 延滞していても返却は受け付ける
pub fn return_loan(
    loan: Loan,
    returned_at: DateTime<Utc>,
) -> Result<(ReturnedLoan, BookReturned), CloseLoanError> {
    let was_overdue = is_overdue(&loan, returned_at);

    let core = match loan {
        Loan::Active(active) => active.core,
        Loan::Overdue(overdue) => overdue.core,
        terminal @ (Loan::Returned(_) | Loan::Lost(_)) => {
            return Err(CloseLoanError::AlreadyTerminal(terminal.status()));
        }
    };

    let event = BookReturned {
        loan_id: core.loan_id,
        book_id: core.book_id,
        user_id: core.user_id,
        returned_at,
        was_overdue,
    };

    let returned = ReturnedLoan {
        core: LoanCore {
            revision: core.revision + 1,
            updated_at: returned_at,
            ..core
        },
        returned_at,
    };

    Ok((returned, event))
}

/// 純粋関数：貸出中の書籍を紛失扱いにする
///
/// ActiveまたはOverdueを受け付ける。蔵書数の減算はアプリケーション層が台帳に依頼する。
pub fn mark_lost(
    loan: Loan,
    lost_at: DateTime<Utc>,
) -> Result<(LostLoan, BookLost), CloseLoanError> {
    let core = match loan {
        Loan::Active(active) => active.core,
        Loan::Overdue(overdue) => overdue.core,
        terminal @ (Loan::Returned(_) | Loan::Lost(_)) => {
            return Err(CloseLoanError::AlreadyTerminal(terminal.status()));
        }
    };

    let event = BookLost {
        loan_id: core.loan_id,
        book_id: core.book_id,
        user_id: core.user_id,
        lost_at,
    };

    let lost = LostLoan {
        core: LoanCore {
            revision: core.revision + 1,
            updated_at: lost_at,
            ..core
        },
        lost_at,
    };

    Ok((lost, event))
}

/// 純粋関数：確定済みの遷移を取り消し、遷移前の状態に戻す
///
/// 戻した貸出は確定済みのリビジョンの次のリビジョンを持つ。
/// リビジョンは後戻りしないため、取り消しの前後で比較交換とイベントの版が衝突しない。
pub fn restore(previous: Loan, committed_revision: u32, restored_at: DateTime<Utc>) -> Loan {
    let rewind = |core: LoanCore| LoanCore {
        revision: committed_revision + 1,
        updated_at: restored_at,
        ..core
    };

    match previous {
        Loan::Active(loan) => Loan::Active(ActiveLoan {
            core: rewind(loan.core),
        }),
        Loan::Overdue(loan) => Loan::Overdue(OverdueLoan {
            core: rewind(loan.core),
        }),
        Loan::Returned(loan) => Loan::Returned(ReturnedLoan {
            core: rewind(loan.core),
            ..loan
        }),
        Loan::Lost(loan) => Loan::Lost(LostLoan {
            core: rewind(loan.core),
            ..loan
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn new_active_loan(loaned_at: DateTime<Utc>) -> ActiveLoan {
        let (loan, _) = checkout_loan(
            BookId::new(),
            UserId::new(),
            Role::Student,
            loaned_at,
            &LoanPolicy::default(),
        );
        loan
    }

    #[test]
    fn test_checkout_loan_creates_active_loan_with_default_due_date() {
        let book_id = BookId::new();
        let user_id = UserId::new();
        let loaned_at = Utc::now();

        let (loan, event) = checkout_loan(
            book_id,
            user_id,
            Role::Student,
            loaned_at,
            &LoanPolicy::default(),
        );

        assert_eq!(loan.due_date, loaned_at + Duration::days(14));
        assert!(loan.due_date > loan.loaned_at);
        assert_eq!(loan.extension_count.value(), 0);
        assert_eq!(loan.book_id, book_id);
        assert_eq!(loan.user_id, user_id);

        assert_eq!(event.loan_id, loan.loan_id);
        assert_eq!(event.due_date, loan.due_date);
        assert_eq!(event.loaned_at, loaned_at);
    }

    #[test]
    fn test_checkout_loan_due_date_follows_role() {
        let loaned_at = Utc::now();
        let policy = LoanPolicy::default();

        let (teacher_loan, _) =
            checkout_loan(BookId::new(), UserId::new(), Role::Teacher, loaned_at, &policy);
        let (librarian_loan, _) =
            checkout_loan(BookId::new(), UserId::new(), Role::Librarian, loaned_at, &policy);

        assert_eq!(teacher_loan.due_date, loaned_at + Duration::days(30));
        assert_eq!(librarian_loan.due_date, loaned_at + Duration::days(60));
    }

    #[test]
    fn test_is_overdue_false_before_due_date() {
        let loaned_at = Utc::now();
        let loan = Loan::Active(new_active_loan(loaned_at));
        assert!(!is_overdue(&loan, loaned_at + Duration::days(14)));
    }

    #[test]
    fn test_is_overdue_true_after_due_date() {
        let loaned_at = Utc::now();
        let loan = Loan::Active(new_active_loan(loaned_at));
        assert!(is_overdue(&loan, loaned_at + Duration::days(15)));
    }

    #[test]
    fn test_refresh_status_reports_overdue_without_sweep() {
        let loaned_at = Utc::now();
        let loan = Loan::Active(new_active_loan(loaned_at));

        let refreshed = refresh_status(loan.clone(), loaned_at + Duration::days(15));
        assert_eq!(refreshed.status(), LoanStatus::Overdue);
        assert_eq!(refreshed.core(), loan.core());

        let refreshed = refresh_status(loan, loaned_at + Duration::days(1));
        assert_eq!(refreshed.status(), LoanStatus::Active);
    }

    #[test]
    fn test_refresh_status_leaves_terminal_loans() {
        let loaned_at = Utc::now();
        let (returned, _) = return_loan(
            Loan::Active(new_active_loan(loaned_at)),
            loaned_at + Duration::days(3),
        )
        .unwrap();

        let refreshed = refresh_status(Loan::Returned(returned), loaned_at + Duration::days(30));
        assert_eq!(refreshed.status(), LoanStatus::Returned);
    }

    #[test]
    fn test_mark_overdue() {
        let loaned_at = Utc::now();
        let active = new_active_loan(loaned_at);
        let detected_at = loaned_at + Duration::days(15);

        let (overdue, event) = mark_overdue(active.clone(), detected_at);
        assert_eq!(overdue.loan_id, active.loan_id);
        assert_eq!(overdue.updated_at, detected_at);
        assert_eq!(event.due_date, active.due_date);
        assert_eq!(event.detected_at, detected_at);
    }

    #[test]
    fn test_extend_loan_success() {
        let loaned_at = Utc::now();
        let active = new_active_loan(loaned_at);
        let extended_at = loaned_at + Duration::days(5);

        let (extended, event) = extend_loan(
            Loan::Active(active.clone()),
            extended_at,
            &LoanPolicy::default(),
        )
        .unwrap();

        assert_eq!(extended.due_date, active.due_date + Duration::days(7));
        assert_eq!(extended.extension_count.value(), 1);
        assert_eq!(extended.updated_at, extended_at);
        assert_eq!(extended.revision, active.revision + 1);
        assert_eq!(event.old_due_date, active.due_date);
        assert_eq!(event.new_due_date, extended.due_date);
        assert_eq!(event.extension_count, 1);
    }

    #[test]
    fn test_extend_loan_fails_after_max_extensions() {
        let policy = LoanPolicy::default();
        let loaned_at = Utc::now();
        let at = loaned_at + Duration::days(1);

        let (loan, _) = extend_loan(Loan::Active(new_active_loan(loaned_at)), at, &policy).unwrap();
        let (loan, _) = extend_loan(Loan::Active(loan), at, &policy).unwrap();

        let result = extend_loan(Loan::Active(loan), at, &policy);
        assert_eq!(
            result.unwrap_err(),
            ExtendLoanError::ExtensionLimitExceeded
        );
    }

    #[test]
    fn test_extend_loan_fails_when_past_due_even_if_stored_active() {
        let loaned_at = Utc::now();
        let loan = Loan::Active(new_active_loan(loaned_at));

        let result = extend_loan(loan, loaned_at + Duration::days(20), &LoanPolicy::default());
        assert_eq!(result.unwrap_err(), ExtendLoanError::CannotExtendOverdue);
    }

    #[test]
    fn test_extend_loan_fails_when_returned() {
        let loaned_at = Utc::now();
        let (returned, _) = return_loan(
            Loan::Active(new_active_loan(loaned_at)),
            loaned_at + Duration::days(2),
        )
        .unwrap();

        let result = extend_loan(
            Loan::Returned(returned),
            loaned_at + Duration::days(3),
            &LoanPolicy::default(),
        );
        assert_eq!(
            result.unwrap_err(),
            ExtendLoanError::AlreadyTerminal(LoanStatus::Returned)
        );
    }

    #[test]
    fn test_return_loan_from_active() {
        let loaned_at = Utc::now();
        let returned_at = loaned_at + Duration::days(7);

        let (returned, event) =
            return_loan(Loan::Active(new_active_loan(loaned_at)), returned_at).unwrap();

        assert_eq!(returned.returned_at, returned_at);
        assert_eq!(
            Loan::Returned(returned.clone()).returned_at(),
            Some(returned_at)
        );
        assert!(!event.was_overdue);
    }

    #[test]
    fn test_return_loan_detects_overdue() {
        let loaned_at = Utc::now();
        let (_, event) = return_loan(
            Loan::Active(new_active_loan(loaned_at)),
            loaned_at + Duration::days(20),
        )
        .unwrap();
        assert!(event.was_overdue);
    }

    #[test]
    fn test_return_loan_from_overdue() {
        let loaned_at = Utc::now();
        let (overdue, _) = mark_overdue(new_active_loan(loaned_at), loaned_at + Duration::days(15));

        let (_, event) =
            return_loan(Loan::Overdue(overdue), loaned_at + Duration::days(16)).unwrap();
        assert!(event.was_overdue);
    }

    #[test]
    fn test_return_loan_fails_when_already_returned() {
        let loaned_at = Utc::now();
        let (returned, _) = return_loan(
            Loan::Active(new_active_loan(loaned_at)),
            loaned_at + Duration::days(1),
        )
        .unwrap();

        let result = return_loan(Loan::Returned(returned), loaned_at + Duration::days(2));
        assert_eq!(
            result.unwrap_err(),
            CloseLoanError::AlreadyTerminal(LoanStatus::Returned)
        );
    }

    #[test]
    fn test_mark_lost_from_active_and_overdue() {
        let loaned_at = Utc::now();
        let lost_at = loaned_at + Duration::days(3);

        let (lost, event) = mark_lost(Loan::Active(new_active_loan(loaned_at)), lost_at).unwrap();
        assert_eq!(lost.lost_at, lost_at);
        assert_eq!(event.loan_id, lost.loan_id);
        assert_eq!(Loan::Lost(lost).returned_at(), None);

        let (overdue, _) = mark_overdue(new_active_loan(loaned_at), loaned_at + Duration::days(15));
        assert!(mark_lost(Loan::Overdue(overdue), loaned_at + Duration::days(16)).is_ok());
    }

    #[test]
    fn test_mark_lost_fails_when_terminal() {
        let loaned_at = Utc::now();
        let (lost, _) = mark_lost(
            Loan::Active(new_active_loan(loaned_at)),
            loaned_at + Duration::days(1),
        )
        .unwrap();

        let result = mark_lost(Loan::Lost(lost), loaned_at + Duration::days(2));
        assert_eq!(
            result.unwrap_err(),
            CloseLoanError::AlreadyTerminal(LoanStatus::Lost)
        );
    }

    #[test]
    fn test_loan_status_terminal_states() {
        assert!(!LoanStatus::Active.is_terminal());
        assert!(!LoanStatus::Overdue.is_terminal());
        assert!(LoanStatus::Returned.is_terminal());
        assert!(LoanStatus::Lost.is_terminal());
    }

    #[test]
    fn test_loan_serializes_with_status_tag() {
        let loan = Loan::Active(new_active_loan(Utc::now()));
        let json = serde_json::to_value(&loan).unwrap();
        assert_eq!(json["status"], "active");
        assert_eq!(json["extension_count"], 0);
    }

    #[test]
    fn test_restore_rewinds_state_with_next_revision() {
        let loaned_at = Utc::now();
        let previous = Loan::Active(new_active_loan(loaned_at));
        let (returned, _) = return_loan(previous.clone(), loaned_at + Duration::days(3)).unwrap();
        assert_eq!(returned.revision, 2);

        let restored_at = loaned_at + Duration::days(3);
        let restored = restore(previous.clone(), returned.revision, restored_at);

        assert_eq!(restored.status(), LoanStatus::Active);
        assert_eq!(restored.core().revision, 3);
        assert_eq!(restored.core().updated_at, restored_at);
        assert_eq!(restored.core().due_date, previous.core().due_date);
        assert_eq!(restored.core().loan_id, previous.core().loan_id);
    }
}
