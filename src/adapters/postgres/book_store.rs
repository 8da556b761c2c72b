use crate::domain::{self, Book, BookStatus, book::QuantityBelowOutstanding, value_objects::BookId};
use crate::ports::book_catalog::{BookCatalog, Result};
use crate::ports::inventory_ledger::{CopyReservation, InventoryLedger, QuantityAdjustment};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Row, Transaction, postgres::PgRow};
use std::str::FromStr;

use super::{invalid_data, to_unsigned};

const BOOK_COLUMNS: &str = r#"
    book_id,
    title,
    author,
    isbn,
    category,
    publisher,
    publication_year,
    total_quantity,
    available_quantity,
    status,
    created_at,
    updated_at
"#;

/// PostgreSQLの行データをBookに変換する
fn map_row_to_book(row: &PgRow) -> Result<Book> {
    let total_quantity: i32 = row.get("total_quantity");
    let available_quantity: i32 = row.get("available_quantity");

    let status_str: &str = row.get("status");
    let status = BookStatus::from_str(status_str).map_err(invalid_data)?;

    Ok(Book {
        book_id: BookId::from_uuid(row.get("book_id")),
        title: row.get("title"),
        author: row.get("author"),
        isbn: row.get("isbn"),
        category: row.get("category"),
        publisher: row.get("publisher"),
        publication_year: row.get("publication_year"),
        total_quantity: to_unsigned("total_quantity", total_quantity)?,
        available_quantity: to_unsigned("available_quantity", available_quantity)?,
        status,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

fn to_column(column: &str, value: u32) -> Result<i32> {
    i32::try_from(value).map_err(|_| invalid_data(format!("{} out of range: {}", column, value)))
}

/// LIKE検索用にワイルドカードをエスケープする
fn like_pattern(query: &str) -> String {
    let escaped = query
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

/// BookCatalogとInventoryLedgerのPostgreSQL実装
///
/// 貸出時の在庫確保は`available_quantity > 0`を条件とする単一のUPDATEで行う。
/// それ以外の数量変更は`SELECT ... FOR UPDATE`で行ロックを取ってから
/// ドメインの純粋関数で新しい数量を計算する。
pub struct BookStore {
    pool: PgPool,
}

impl BookStore {
    /// PostgreSQLコネクションプールから新しいBookStoreを作成
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn lock_book(
        tx: &mut Transaction<'_, Postgres>,
        book_id: BookId,
    ) -> Result<Option<Book>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM books WHERE book_id = $1 FOR UPDATE",
            BOOK_COLUMNS
        ))
        .bind(book_id.value())
        .fetch_optional(&mut **tx)
        .await?;

        row.as_ref().map(map_row_to_book).transpose()
    }

    async fn store_quantities(tx: &mut Transaction<'_, Postgres>, book: &Book) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE books
            SET total_quantity = $2,
                available_quantity = $3,
                status = $4,
                updated_at = $5
            WHERE book_id = $1
            "#,
        )
        .bind(book.book_id.value())
        .bind(to_column("total_quantity", book.total_quantity)?)
        .bind(to_column("available_quantity", book.available_quantity)?)
        .bind(book.status.as_str())
        .bind(book.updated_at)
        .execute(&mut **tx)
        .await?;

        Ok(())
    }

    /// 行ロックを取って`update`を適用し、確定する
    async fn update_locked<T>(
        &self,
        book_id: BookId,
        update: impl FnOnce(&Book) -> (Option<Book>, T) + Send,
    ) -> Result<Option<T>>
    where
        T: Send,
    {
        let mut tx = self.pool.begin().await?;

        let Some(book) = Self::lock_book(&mut tx, book_id).await? else {
            return Ok(None);
        };

        let (updated, outcome) = update(&book);
        if let Some(updated) = updated {
            Self::store_quantities(&mut tx, &updated).await?;
        }

        tx.commit().await?;
        Ok(Some(outcome))
    }

    async fn exists(&self, book_id: BookId) -> Result<bool> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM books WHERE book_id = $1)")
                .bind(book_id.value())
                .fetch_one(&self.pool)
                .await?;
        Ok(exists)
    }
}

#[async_trait]
impl BookCatalog for BookStore {
    /// 書籍を登録する
    ///
    /// ISBNが重複した場合は`ON CONFLICT DO NOTHING`で挿入されず`false`を返す。
    async fn insert(&self, book: Book) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO books (
                book_id,
                title,
                author,
                isbn,
                category,
                publisher,
                publication_year,
                total_quantity,
                available_quantity,
                status,
                created_at,
                updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            ON CONFLICT (isbn) DO NOTHING
            "#,
        )
        .bind(book.book_id.value())
        .bind(&book.title)
        .bind(&book.author)
        .bind(&book.isbn)
        .bind(&book.category)
        .bind(&book.publisher)
        .bind(book.publication_year)
        .bind(to_column("total_quantity", book.total_quantity)?)
        .bind(to_column("available_quantity", book.available_quantity)?)
        .bind(book.status.as_str())
        .bind(book.created_at)
        .bind(book.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn get_by_id(&self, book_id: BookId) -> Result<Option<Book>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM books WHERE book_id = $1",
            BOOK_COLUMNS
        ))
        .bind(book_id.value())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(map_row_to_book).transpose()
    }

    async fn search(&self, query: &str) -> Result<Vec<Book>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {}
            FROM books
            WHERE title ILIKE $1
               OR author ILIKE $1
               OR isbn ILIKE $1
               OR category ILIKE $1
            ORDER BY title ASC
            "#,
            BOOK_COLUMNS
        ))
        .bind(like_pattern(query))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(map_row_to_book).collect()
    }
}

#[async_trait]
impl InventoryLedger for BookStore {
    /// 1冊を確保する
    ///
    /// 在庫の確認と減算を1文で行うため、同じ書籍への並行確保でも在庫を超えない。
    async fn checkout_copy(&self, book_id: BookId, at: DateTime<Utc>) -> Result<CopyReservation> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE books
            SET available_quantity = available_quantity - 1,
                status = CASE WHEN available_quantity - 1 > 0 THEN 'available' ELSE 'unavailable' END,
                updated_at = $2
            WHERE book_id = $1 AND available_quantity > 0
            RETURNING {}
            "#,
            BOOK_COLUMNS
        ))
        .bind(book_id.value())
        .bind(at)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(CopyReservation::Reserved(map_row_to_book(&row)?)),
            None if self.exists(book_id).await? => Ok(CopyReservation::Unavailable),
            None => Ok(CopyReservation::BookNotFound),
        }
    }

    async fn release_copy(&self, book_id: BookId, at: DateTime<Utc>) -> Result<Option<Book>> {
        self.update_locked(book_id, |book| {
            let updated = domain::book::release_copy(book, at);
            (Some(updated.clone()), updated)
        })
        .await
    }

    async fn write_off_copy(&self, book_id: BookId, at: DateTime<Utc>) -> Result<Option<Book>> {
        self.update_locked(book_id, |book| {
            let updated = domain::book::write_off_copy(book, at);
            (Some(updated.clone()), updated)
        })
        .await
    }

    async fn adjust_total_quantity(
        &self,
        book_id: BookId,
        new_total: u32,
        at: DateTime<Utc>,
    ) -> Result<QuantityAdjustment> {
        let outcome = self
            .update_locked(book_id, |book| {
                match domain::book::adjust_total_quantity(book, new_total, at) {
                    Ok(updated) => (Some(updated.clone()), QuantityAdjustment::Adjusted(updated)),
                    Err(QuantityBelowOutstanding { outstanding }) => {
                        (None, QuantityAdjustment::BelowOutstanding { outstanding })
                    }
                }
            })
            .await?;

        Ok(outcome.unwrap_or(QuantityAdjustment::BookNotFound))
    }
}
