use crate::domain::{
    Loan, LoanStatus,
    loan::{ActiveLoan, LoanCore, LostLoan, OverdueLoan, ReturnedLoan},
    value_objects::{BookId, ExtensionCount, LoanId, UserId},
};
use crate::ports::loan_repository::{LoanRepository as LoanRepositoryTrait, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row, postgres::PgRow};
use std::str::FromStr;

use super::{invalid_data, to_unsigned};

const LOAN_COLUMNS: &str = r#"
    loan_id,
    book_id,
    user_id,
    loaned_at,
    due_date,
    returned_at,
    lost_at,
    extension_count,
    status,
    revision,
    created_at,
    updated_at
"#;

/// PostgreSQLの行データをLoanに変換する
///
/// statusカラムから型付きの状態を選び、終端状態に必要な時刻が欠けていればエラーとする。
fn map_row_to_loan(row: &PgRow) -> Result<Loan> {
    let extension_count: i16 = row.get("extension_count");
    let revision: i32 = row.get("revision");

    let status_str: &str = row.get("status");
    let status = LoanStatus::from_str(status_str).map_err(invalid_data)?;

    let core = LoanCore {
        loan_id: LoanId::from_uuid(row.get("loan_id")),
        book_id: BookId::from_uuid(row.get("book_id")),
        user_id: UserId::from_uuid(row.get("user_id")),
        loaned_at: row.get("loaned_at"),
        due_date: row.get("due_date"),
        extension_count: ExtensionCount::from_value(to_unsigned(
            "extension_count",
            extension_count,
        )?),
        revision: to_unsigned("revision", revision)?,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    };

    let returned_at: Option<DateTime<Utc>> = row.get("returned_at");
    let lost_at: Option<DateTime<Utc>> = row.get("lost_at");

    match status {
        LoanStatus::Active => Ok(Loan::Active(ActiveLoan { core })),
        LoanStatus::Overdue => Ok(Loan::Overdue(OverdueLoan { core })),
        LoanStatus::Returned => {
            let returned_at = returned_at.ok_or_else(|| {
                invalid_data(format!(
                    "returned loan {} has no returned_at",
                    core.loan_id.value()
                ))
            })?;
            Ok(Loan::Returned(ReturnedLoan { core, returned_at }))
        }
        LoanStatus::Lost => {
            let lost_at = lost_at.ok_or_else(|| {
                invalid_data(format!("lost loan {} has no lost_at", core.loan_id.value()))
            })?;
            Ok(Loan::Lost(LostLoan { core, lost_at }))
        }
    }
}

fn revision_column(revision: u32) -> Result<i32> {
    i32::try_from(revision)
        .map_err(|_| invalid_data(format!("revision out of range: {}", revision)))
}

/// LoanRepositoryのPostgreSQL実装
///
/// 状態遷移は`WHERE revision = $expected`付きのUPDATEで比較交換する。
/// 新規貸出の保存は利用者の行を`FOR UPDATE`でロックしてから件数を数えるため、
/// 同じ利用者への並行保存は直列化される。
pub struct LoanRepository {
    pool: PgPool,
}

impl LoanRepository {
    /// PostgreSQLコネクションプールから新しいLoanRepositoryを作成
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LoanRepositoryTrait for LoanRepository {
    async fn insert(&self, loan: &Loan, open_loan_limit: usize) -> Result<bool> {
        let core = loan.core();
        let mut tx = self.pool.begin().await?;

        sqlx::query("SELECT user_id FROM users WHERE user_id = $1 FOR UPDATE")
            .bind(core.user_id.value())
            .fetch_optional(&mut *tx)
            .await?;

        let open_loans: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM loans
            WHERE user_id = $1 AND status IN ('active', 'overdue')
            "#,
        )
        .bind(core.user_id.value())
        .fetch_one(&mut *tx)
        .await?;

        if to_unsigned::<i64, usize>("count", open_loans)? >= open_loan_limit {
            return Ok(false);
        }

        sqlx::query(
            r#"
            INSERT INTO loans (
                loan_id,
                book_id,
                user_id,
                loaned_at,
                due_date,
                returned_at,
                lost_at,
                extension_count,
                status,
                revision,
                created_at,
                updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(core.loan_id.value())
        .bind(core.book_id.value())
        .bind(core.user_id.value())
        .bind(core.loaned_at)
        .bind(core.due_date)
        .bind(loan.returned_at())
        .bind(loan.lost_at())
        .bind(i16::from(core.extension_count.value()))
        .bind(loan.status().as_str())
        .bind(revision_column(core.revision)?)
        .bind(core.created_at)
        .bind(core.updated_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(true)
    }

    /// 保存済みのリビジョンが一致する場合のみ置き換える
    ///
    /// 更新行数が0なら他の遷移に先を越されている。
    async fn replace(&self, loan: &Loan, expected_revision: u32) -> Result<bool> {
        let core = loan.core();

        let result = sqlx::query(
            r#"
            UPDATE loans
            SET due_date = $3,
                returned_at = $4,
                lost_at = $5,
                extension_count = $6,
                status = $7,
                revision = $8,
                updated_at = $9
            WHERE loan_id = $1 AND revision = $2
            "#,
        )
        .bind(core.loan_id.value())
        .bind(revision_column(expected_revision)?)
        .bind(core.due_date)
        .bind(loan.returned_at())
        .bind(loan.lost_at())
        .bind(i16::from(core.extension_count.value()))
        .bind(loan.status().as_str())
        .bind(revision_column(core.revision)?)
        .bind(core.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn get_by_id(&self, loan_id: LoanId) -> Result<Option<Loan>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM loans WHERE loan_id = $1",
            LOAN_COLUMNS
        ))
        .bind(loan_id.value())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(map_row_to_loan).transpose()
    }

    /// 利用者の未終了の貸出件数
    ///
    /// (user_id) WHERE status IN ('active', 'overdue') の部分インデックスを使用する。
    async fn count_open_for_user(&self, user_id: UserId) -> Result<usize> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM loans
            WHERE user_id = $1 AND status IN ('active', 'overdue')
            "#,
        )
        .bind(user_id.value())
        .fetch_one(&self.pool)
        .await?;

        to_unsigned("count", count)
    }

    async fn find_by_user_id(&self, user_id: UserId) -> Result<Vec<Loan>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {}
            FROM loans
            WHERE user_id = $1
            ORDER BY loaned_at DESC
            "#,
            LOAN_COLUMNS
        ))
        .bind(user_id.value())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(map_row_to_loan).collect()
    }

    /// 延滞候補を検索（バッチ延滞検知用）
    ///
    /// (due_date) WHERE status = 'active' の部分インデックスを使用する。
    async fn find_overdue_candidates(&self, cutoff: DateTime<Utc>) -> Result<Vec<Loan>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {}
            FROM loans
            WHERE status = 'active' AND due_date < $1
            ORDER BY due_date ASC
            "#,
            LOAN_COLUMNS
        ))
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(map_row_to_loan).collect()
    }

    /// 延滞中の貸出を検索（全利用者）
    ///
    /// 延滞検出バッチの実行前後どちらでも同じ結果になるよう、保存済みのOverdueと
    /// 期限を過ぎたActiveの両方を対象とする。
    async fn find_overdue(&self, now: DateTime<Utc>) -> Result<Vec<Loan>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {}
            FROM loans
            WHERE status = 'overdue'
               OR (status = 'active' AND due_date < $1)
            ORDER BY due_date ASC
            "#,
            LOAN_COLUMNS
        ))
        .bind(now)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(map_row_to_loan).collect()
    }
}
