use crate::domain::{self, Book, NewBook, value_objects::BookId};
use crate::ports::QuantityAdjustment;

use super::errors::{CatalogApplicationError, Result};
use crate::application::ServiceDependencies;

/// 書籍を登録する
///
/// ビジネスルール：
/// - 入力はドメイン層でバリデーションする
/// - ISBNは一意
pub async fn register_book(deps: &ServiceDependencies, new_book: NewBook) -> Result<Book> {
    let book = domain::book::register_book(new_book, deps.clock.now())
        .map_err(CatalogApplicationError::Validation)?;

    let inserted = deps
        .book_catalog
        .insert(book.clone())
        .await
        .map_err(CatalogApplicationError::BookCatalogError)?;

    if !inserted {
        return Err(CatalogApplicationError::DuplicateIsbn(book.isbn));
    }

    tracing::info!(
        book_id = %book.book_id.value(),
        isbn = %book.isbn,
        quantity = book.total_quantity,
        "Book registered"
    );

    Ok(book)
}

/// IDで書籍を取得する
pub async fn get_book(deps: &ServiceDependencies, book_id: BookId) -> Result<Book> {
    deps.book_catalog
        .get_by_id(book_id)
        .await
        .map_err(CatalogApplicationError::BookCatalogError)?
        .ok_or(CatalogApplicationError::BookNotFound)
}

/// 書籍を検索する
///
/// 空のクエリは全件を返す。
pub async fn search_books(deps: &ServiceDependencies, query: &str) -> Result<Vec<Book>> {
    deps.book_catalog
        .search(query.trim())
        .await
        .map_err(CatalogApplicationError::BookCatalogError)
}

/// 蔵書の総数を変更する
///
/// 貸出中の冊数は維持され、残りが貸出可能数になる。
/// 新しい総数は登録時と同じ上限で検証する。
pub async fn adjust_book_quantity(
    deps: &ServiceDependencies,
    book_id: BookId,
    new_total: u32,
) -> Result<Book> {
    let new_total =
        domain::book::validate_quantity(new_total).map_err(CatalogApplicationError::Validation)?;

    let adjustment = deps
        .inventory_ledger
        .adjust_total_quantity(book_id, new_total, deps.clock.now())
        .await
        .map_err(CatalogApplicationError::InventoryLedgerError)?;

    match adjustment {
        QuantityAdjustment::Adjusted(book) => {
            tracing::info!(
                book_id = %book_id.value(),
                total_quantity = book.total_quantity,
                available_quantity = book.available_quantity,
                "Book quantity adjusted"
            );
            Ok(book)
        }
        QuantityAdjustment::BelowOutstanding { outstanding } => {
            Err(CatalogApplicationError::QuantityBelowOutstanding { outstanding })
        }
        QuantityAdjustment::BookNotFound => Err(CatalogApplicationError::BookNotFound),
    }
}
