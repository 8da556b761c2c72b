use crate::domain::{Book, value_objects::BookId};
use async_trait::async_trait;

pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// 蔵書カタログポート
///
/// 書籍の登録と検索を扱う。数量の変更は`InventoryLedger`の責務。
#[async_trait]
pub trait BookCatalog: Send + Sync {
    /// 書籍を登録する
    ///
    /// ISBNが既に登録済みの場合は`false`を返し、何も保存しない。
    async fn insert(&self, book: Book) -> Result<bool>;

    /// IDで書籍を取得する
    async fn get_by_id(&self, book_id: BookId) -> Result<Option<Book>>;

    /// タイトル・著者・ISBN・分類の部分一致で検索する
    ///
    /// 大文字小文字を区別せず、タイトル順に返す。
    async fn search(&self, query: &str) -> Result<Vec<Book>>;
}
