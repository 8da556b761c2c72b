use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::{Role, loan::Loan};

/// 役割ごとの同時貸出上限
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoanLimits {
    pub student: usize,
    pub teacher: usize,
    pub librarian: usize,
}

impl Default for LoanLimits {
    fn default() -> Self {
        Self {
            student: 3,
            teacher: 5,
            librarian: 10,
        }
    }
}

/// 役割ごとの貸出期間（日数）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoanDurations {
    pub student: i64,
    pub teacher: i64,
    pub librarian: i64,
}

impl LoanDurations {
    fn for_role(&self, role: Role) -> i64 {
        match role {
            Role::Student => self.student,
            Role::Teacher => self.teacher,
            Role::Librarian => self.librarian,
        }
    }
}

impl Default for LoanDurations {
    fn default() -> Self {
        Self {
            student: 14,
            teacher: 30,
            librarian: 60,
        }
    }
}

/// ポリシー構築時のエラー
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicyError {
    /// 貸出期間は1日以上
    InvalidLoanDuration { role: Role, days: i64 },
    /// 延長日数は1日以上
    InvalidExtensionDuration(i64),
}

impl std::fmt::Display for PolicyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PolicyError::InvalidLoanDuration { role, days } => write!(
                f,
                "loan duration for {} must be at least 1 day, got {}",
                role.as_str(),
                days
            ),
            PolicyError::InvalidExtensionDuration(days) => {
                write!(f, "extension duration must be at least 1 day, got {}", days)
            }
        }
    }
}

/// 貸出ポリシー
///
/// 副作用のない規則の集まり。値は設定から与えられ、コード中に定数として持たない。
/// 同時貸出数と貸出期間は役割ごと、延長の規則は全役割共通。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoanPolicy {
    limits: LoanLimits,
    durations: LoanDurations,
    extension_days: i64,
    max_extensions: u8,
}

impl LoanPolicy {
    pub fn new(
        limits: LoanLimits,
        durations: LoanDurations,
        extension_days: i64,
        max_extensions: u8,
    ) -> Result<Self, PolicyError> {
        for role in [Role::Student, Role::Teacher, Role::Librarian] {
            let days = durations.for_role(role);
            if days < 1 {
                return Err(PolicyError::InvalidLoanDuration { role, days });
            }
        }
        if extension_days < 1 {
            return Err(PolicyError::InvalidExtensionDuration(extension_days));
        }

        Ok(Self {
            limits,
            durations,
            extension_days,
            max_extensions,
        })
    }

    /// 役割ごとの同時貸出上限
    pub fn max_active_loans(&self, role: Role) -> usize {
        match role {
            Role::Student => self.limits.student,
            Role::Teacher => self.limits.teacher,
            Role::Librarian => self.limits.librarian,
        }
    }

    /// 貸出日からの標準返却期限（役割ごとの貸出期間）
    pub fn default_due_date(&self, role: Role, loaned_at: DateTime<Utc>) -> DateTime<Utc> {
        loaned_at + Duration::days(self.durations.for_role(role))
    }

    /// 延長可能か
    ///
    /// Active状態かつ延長回数が上限未満の場合のみ true。
    /// 延滞は読み出し時に導出されるため、呼び出し側は`refresh_status`済みの貸出を渡すこと。
    pub fn can_extend(&self, loan: &Loan) -> bool {
        match loan {
            Loan::Active(active) => active.extension_count.can_extend(self.max_extensions),
            _ => false,
        }
    }

    /// 延長後の返却期限
    pub fn extended_due_date(&self, loan: &Loan) -> DateTime<Utc> {
        loan.core().due_date + Duration::days(self.extension_days)
    }

    pub fn max_extensions(&self) -> u8 {
        self.max_extensions
    }

    pub fn limits(&self) -> LoanLimits {
        self.limits
    }

    pub fn durations(&self) -> LoanDurations {
        self.durations
    }
}

impl Default for LoanPolicy {
    fn default() -> Self {
        Self {
            limits: LoanLimits::default(),
            durations: LoanDurations::default(),
            extension_days: 7,
            max_extensions: 2,
        }
    }
}
