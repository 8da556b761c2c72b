use crate::domain::{
    Loan,
    value_objects::{LoanId, UserId},
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// 貸出リポジトリポート
///
/// 貸出集約の現在の状態を保存する。
/// 状態遷移は`replace`によるリビジョンの比較交換（compare-and-set）で永続化し、
/// 同じ貸出への並行遷移が二重に適用されないようにする。
#[async_trait]
pub trait LoanRepository: Send + Sync {
    /// 新しい貸出を保存する
    ///
    /// 利用者の未終了の貸出が既に`open_loan_limit`件ある場合は保存せず`false`を返す。
    /// 件数の確認と保存は同じ利用者への並行保存に対して不可分に行う。
    async fn insert(&self, loan: &Loan, open_loan_limit: usize) -> Result<bool>;

    /// 保存済みのリビジョンが`expected_revision`と一致する場合のみ貸出を置き換える
    ///
    /// 置き換えた場合は`true`、他の遷移に先を越された場合は`false`。
    async fn replace(&self, loan: &Loan, expected_revision: u32) -> Result<bool>;

    /// IDで貸出を取得する（保存済みステータスのまま）
    async fn get_by_id(&self, loan_id: LoanId) -> Result<Option<Loan>>;

    /// 利用者の未終了（Active・Overdue）の貸出件数
    ///
    /// 貸出上限の確認に使用される。
    async fn count_open_for_user(&self, user_id: UserId) -> Result<usize>;

    /// 利用者の全貸出を貸出日の新しい順に取得する
    async fn find_by_user_id(&self, user_id: UserId) -> Result<Vec<Loan>>;

    /// 延滞候補の貸出を検索する
    ///
    /// 保存済みステータスが Active かつ due_date < cutoff の貸出を返す。
    async fn find_overdue_candidates(&self, cutoff: DateTime<Utc>) -> Result<Vec<Loan>>;

    /// 延滞中の貸出を全利用者分、返却期限の古い順に取得する
    ///
    /// 保存済みステータスがOverdueの貸出と、Activeのまま due_date < now の貸出の両方を返す。
    async fn find_overdue(&self, now: DateTime<Utc>) -> Result<Vec<Loan>>;
}
