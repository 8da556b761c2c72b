use crate::domain::book::BookValidationError;
use thiserror::Error;

/// 蔵書カタログのアプリケーション層エラー
#[derive(Debug, Error)]
pub enum CatalogApplicationError {
    /// 入力が不正
    #[error("Invalid book: {0}")]
    Validation(BookValidationError),

    /// ISBNが登録済み
    #[error("A book with ISBN {0} already exists")]
    DuplicateIsbn(String),

    /// 書籍が存在しない
    #[error("Book not found")]
    BookNotFound,

    /// 貸出中の冊数を下回る総数
    #[error("Quantity cannot be less than the {outstanding} copies on loan")]
    QuantityBelowOutstanding { outstanding: u32 },

    /// BookCatalogのエラー
    #[error("Book catalog error")]
    BookCatalogError(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// InventoryLedgerのエラー
    #[error("Inventory ledger error")]
    InventoryLedgerError(#[source] Box<dyn std::error::Error + Send + Sync>),
}

pub type Result<T> = std::result::Result<T, CatalogApplicationError>;
