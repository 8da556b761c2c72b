use crate::domain::{events::DomainEvent, value_objects::LoanId};
use async_trait::async_trait;

pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// 貸出イベントログポート
///
/// 貸出の状態遷移を追記専用ログとして記録する監査用の履歴。
/// 貸出の現在状態の情報源は`LoanRepository`であり、このログから復元はしない。
#[async_trait]
pub trait LoanEventLog: Send + Sync {
    /// 貸出のイベントを追加する
    ///
    /// `revision`はイベントを生んだ状態遷移の確定後のリビジョン。
    /// 貸出ごとに一意なので、同じ貸出への並行追記でも番号は衝突しない。
    async fn append(&self, loan_id: LoanId, revision: u32, event: DomainEvent) -> Result<()>;

    /// 貸出のすべてのイベントをリビジョン順に読み込む
    async fn load(&self, loan_id: LoanId) -> Result<Vec<DomainEvent>>;
}
