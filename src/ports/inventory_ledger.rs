use crate::domain::{Book, value_objects::BookId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// 1冊の確保結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CopyReservation {
    /// 確保成功（更新後の書籍）
    Reserved(Book),
    /// 在庫なし
    Unavailable,
    /// 書籍が存在しない
    BookNotFound,
}

/// 総数変更の結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuantityAdjustment {
    Adjusted(Book),
    /// 貸出中の冊数を下回る総数は設定できない
    BelowOutstanding { outstanding: u32 },
    BookNotFound,
}

/// 在庫台帳ポート
///
/// 1冊の書籍に対する数量変更を直列化する。
/// すべての操作は同じ書籍への並行操作に対してアトミックでなければならない。
///
/// 不変条件：`0 <= available_quantity <= total_quantity`
#[async_trait]
pub trait InventoryLedger: Send + Sync {
    /// 貸出用に1冊確保する
    ///
    /// `available_quantity == 0`のときは`Unavailable`を返し、何も変更しない。
    async fn checkout_copy(&self, book_id: BookId, at: DateTime<Utc>) -> Result<CopyReservation>;

    /// 返却された1冊を戻す（総数で頭打ち）
    ///
    /// 書籍が存在しない場合は`None`。
    async fn release_copy(&self, book_id: BookId, at: DateTime<Utc>) -> Result<Option<Book>>;

    /// 紛失した1冊を蔵書から除く
    ///
    /// 書籍が存在しない場合は`None`。
    async fn write_off_copy(&self, book_id: BookId, at: DateTime<Utc>) -> Result<Option<Book>>;

    /// 蔵書の総数を変更する（貸出中の冊数は維持）
    async fn adjust_total_quantity(
        &self,
        book_id: BookId,
        new_total: u32,
        at: DateTime<Utc>,
    ) -> Result<QuantityAdjustment>;
}
