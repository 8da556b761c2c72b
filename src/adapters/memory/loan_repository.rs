use crate::domain::{
    Loan,
    value_objects::{LoanId, UserId},
};
use crate::ports::loan_repository::{LoanRepository as LoanRepositoryTrait, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Mutex;

use super::poisoned;

/// LoanRepositoryのインメモリ実装
///
/// マップ全体を1つの`Mutex`で守るため、`replace`のリビジョン確認と書き込み、
/// `insert`の件数確認と保存はそれぞれ不可分になる。
pub struct LoanRepository {
    loans: Mutex<HashMap<LoanId, Loan>>,
}

impl LoanRepository {
    pub fn new() -> Self {
        Self {
            loans: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for LoanRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LoanRepositoryTrait for LoanRepository {
    async fn insert(&self, loan: &Loan, open_loan_limit: usize) -> Result<bool> {
        let mut loans = self.loans.lock().map_err(poisoned)?;
        let core = loan.core();
        if loans.contains_key(&core.loan_id) {
            return Err(format!("loan {} already exists", core.loan_id.value()).into());
        }

        let open_loans = loans
            .values()
            .filter(|stored| stored.core().user_id == core.user_id && !stored.is_terminal())
            .count();
        if open_loans >= open_loan_limit {
            return Ok(false);
        }

        loans.insert(core.loan_id, loan.clone());
        Ok(true)
    }

    async fn replace(&self, loan: &Loan, expected_revision: u32) -> Result<bool> {
        let mut loans = self.loans.lock().map_err(poisoned)?;
        match loans.get_mut(&loan.core().loan_id) {
            Some(stored) if stored.core().revision == expected_revision => {
                *stored = loan.clone();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn get_by_id(&self, loan_id: LoanId) -> Result<Option<Loan>> {
        let loans = self.loans.lock().map_err(poisoned)?;
        Ok(loans.get(&loan_id).cloned())
    }

    async fn count_open_for_user(&self, user_id: UserId) -> Result<usize> {
        let loans = self.loans.lock().map_err(poisoned)?;
        Ok(loans
            .values()
            .filter(|loan| loan.core().user_id == user_id && !loan.is_terminal())
            .count())
    }

    async fn find_by_user_id(&self, user_id: UserId) -> Result<Vec<Loan>> {
        let loans = self.loans.lock().map_err(poisoned)?;
        let mut found: Vec<Loan> = loans
            .values()
            .filter(|loan| loan.core().user_id == user_id)
            .cloned()
            .collect();
        found.sort_by(|a, b| b.core().loaned_at.cmp(&a.core().loaned_at));
        Ok(found)
    }

    async fn find_overdue_candidates(&self, cutoff: DateTime<Utc>) -> Result<Vec<Loan>> {
        let loans = self.loans.lock().map_err(poisoned)?;
        let mut found: Vec<Loan> = loans
            .values()
            .filter(|loan| matches!(loan, Loan::Active(active) if active.due_date < cutoff))
            .cloned()
            .collect();
        found.sort_by(|a, b| a.core().due_date.cmp(&b.core().due_date));
        Ok(found)
    }

    async fn find_overdue(&self, now: DateTime<Utc>) -> Result<Vec<Loan>> {
        let loans = self.loans.lock().map_err(poisoned)?;
        let mut found: Vec<Loan> = loans
            .values()
            .filter(|loan| match loan {
                Loan::Overdue(_) => true,
                Loan::Active(active) => active.due_date < now,
                Loan::Returned(_) | Loan::Lost(_) => false,
            })
            .cloned()
            .collect();
        found.sort_by(|a, b| a.core().due_date.cmp(&b.core().due_date));
        Ok(found)
    }
}
