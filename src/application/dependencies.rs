use crate::domain::LoanPolicy;
use crate::ports::*;
use std::sync::Arc;

/// サービスの依存関係
///
/// 関数型DDDの原則に従い、データ構造として定義する。
/// ユースケース関数はこの構造体を引数で受け取り、グローバルな状態を持たない。
#[derive(Clone)]
pub struct ServiceDependencies {
    pub user_directory: Arc<dyn UserDirectory>,
    pub book_catalog: Arc<dyn BookCatalog>,
    pub inventory_ledger: Arc<dyn InventoryLedger>,
    pub loan_repository: Arc<dyn LoanRepository>,
    pub loan_event_log: Arc<dyn LoanEventLog>,
    pub clock: Arc<dyn Clock>,
    pub policy: LoanPolicy,
}
