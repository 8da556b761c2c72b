use crate::domain::{self, Book, book::QuantityBelowOutstanding, value_objects::BookId};
use crate::ports::book_catalog::{BookCatalog, Result};
use crate::ports::inventory_ledger::{CopyReservation, InventoryLedger, QuantityAdjustment};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use super::poisoned;

/// BookCatalogとInventoryLedgerのインメモリ実装
///
/// 書籍ごとに`Mutex`を持ち、同じ書籍への数量変更を直列化する。
/// 書籍マップ全体のロックは対象書籍の`Mutex`を取り出す間だけ保持するため、
/// 異なる書籍への操作は互いに待たない。
pub struct BookStore {
    books: RwLock<HashMap<BookId, Arc<Mutex<Book>>>>,
}

impl BookStore {
    pub fn new() -> Self {
        Self {
            books: RwLock::new(HashMap::new()),
        }
    }

    fn entry(&self, book_id: BookId) -> Result<Option<Arc<Mutex<Book>>>> {
        let books = self.books.read().map_err(poisoned)?;
        Ok(books.get(&book_id).cloned())
    }

    /// 書籍のロックを取って`update`を適用する
    ///
    /// `update`が`Some`を返した場合のみ書き戻す。
    fn update_book<T>(
        &self,
        book_id: BookId,
        update: impl FnOnce(&Book) -> (Option<Book>, T),
    ) -> Result<Option<T>> {
        let Some(entry) = self.entry(book_id)? else {
            return Ok(None);
        };

        let mut book = entry.lock().map_err(poisoned)?;
        let (updated, outcome) = update(&*book);
        if let Some(updated) = updated {
            *book = updated;
        }
        Ok(Some(outcome))
    }
}

impl Default for BookStore {
    fn default() -> Self {
        Self::new()
    }
}

fn matches_query(book: &Book, query: &str) -> bool {
    [&book.title, &book.author, &book.isbn, &book.category]
        .iter()
        .any(|field| field.to_lowercase().contains(query))
}

#[async_trait]
impl BookCatalog for BookStore {
    async fn insert(&self, book: Book) -> Result<bool> {
        let mut books = self.books.write().map_err(poisoned)?;

        for entry in books.values() {
            if entry.lock().map_err(poisoned)?.isbn == book.isbn {
                return Ok(false);
            }
        }

        books.insert(book.book_id, Arc::new(Mutex::new(book)));
        Ok(true)
    }

    async fn get_by_id(&self, book_id: BookId) -> Result<Option<Book>> {
        match self.entry(book_id)? {
            Some(entry) => Ok(Some(entry.lock().map_err(poisoned)?.clone())),
            None => Ok(None),
        }
    }

    async fn search(&self, query: &str) -> Result<Vec<Book>> {
        let query = query.to_lowercase();
        let books = self.books.read().map_err(poisoned)?;

        let mut found = Vec::new();
        for entry in books.values() {
            let book = entry.lock().map_err(poisoned)?;
            if matches_query(&book, &query) {
                found.push(book.clone());
            }
        }

        found.sort_by(|a, b| a.title.cmp(&b.title));
        Ok(found)
    }
}

#[async_trait]
impl InventoryLedger for BookStore {
    async fn checkout_copy(
        &self,
        book_id: BookId,
        at: DateTime<Utc>,
    ) -> Result<CopyReservation> {
        let outcome = self.update_book(book_id, |book| {
            match domain::book::checkout_copy(book, at) {
                Ok(updated) => (Some(updated.clone()), CopyReservation::Reserved(updated)),
                Err(_) => (None, CopyReservation::Unavailable),
            }
        })?;

        Ok(outcome.unwrap_or(CopyReservation::BookNotFound))
    }

    async fn release_copy(&self, book_id: BookId, at: DateTime<Utc>) -> Result<Option<Book>> {
        self.update_book(book_id, |book| {
            let updated = domain::book::release_copy(book, at);
            (Some(updated.clone()), updated)
        })
    }

    async fn write_off_copy(&self, book_id: BookId, at: DateTime<Utc>) -> Result<Option<Book>> {
        self.update_book(book_id, |book| {
            let updated = domain::book::write_off_copy(book, at);
            (Some(updated.clone()), updated)
        })
    }

    async fn adjust_total_quantity(
        &self,
        book_id: BookId,
        new_total: u32,
        at: DateTime<Utc>,
    ) -> Result<QuantityAdjustment> {
        let outcome = self.update_book(book_id, |book| {
            match domain::book::adjust_total_quantity(book, new_total, at) {
                Ok(updated) => (Some(updated.clone()), QuantityAdjustment::Adjusted(updated)),
                Err(QuantityBelowOutstanding { outstanding }) => {
                    (None, QuantityAdjustment::BelowOutstanding { outstanding })
                }
            }
        })?;

        Ok(outcome.unwrap_or(QuantityAdjustment::BookNotFound))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::NewBook;

    fn book(isbn: &str, title: &str, quantity: u32) -> Book {
        domain::book::register_book(
            NewBook {
                title: title.to_string(),
                author: "Isabel Allende".to_string(),
                isbn: isbn.to_string(),
                category: "Novela".to_string(),
                publisher: None,
                publication_year: None,
                quantity,
            },
            Utc::now(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_insert_rejects_duplicate_isbn() {
        let store = BookStore::new();
        assert!(store.insert(book("9780553383805", "Paula", 1)).await.unwrap());
        assert!(!store.insert(book("9780553383805", "Eva Luna", 1)).await.unwrap());
    }

    #[tokio::test]
    async fn test_search_is_case_insensitive_and_sorted() {
        let store = BookStore::new();
        store.insert(book("9780553383805", "Paula", 1)).await.unwrap();
        store.insert(book("9780553280586", "Eva Luna", 1)).await.unwrap();

        let found = store.search("allende").await.unwrap();
        let titles: Vec<_> = found.iter().map(|b| b.title.as_str()).collect();
        assert_eq!(titles, vec!["Eva Luna", "Paula"]);

        assert_eq!(store.search("paula").await.unwrap().len(), 1);
        assert!(store.search("borges").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_checkout_copy_until_unavailable() {
        let store = BookStore::new();
        let book = book("9780553383805", "Paula", 1);
        let book_id = book.book_id;
        store.insert(book).await.unwrap();

        let now = Utc::now();
        assert!(matches!(
            store.checkout_copy(book_id, now).await.unwrap(),
            CopyReservation::Reserved(_)
        ));
        assert_eq!(
            store.checkout_copy(book_id, now).await.unwrap(),
            CopyReservation::Unavailable
        );
        assert_eq!(
            store.checkout_copy(BookId::new(), now).await.unwrap(),
            CopyReservation::BookNotFound
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_checkouts_never_oversell() {
        let store = Arc::new(BookStore::new());
        let book = book("9780553383805", "Paula", 5);
        let book_id = book.book_id;
        store.insert(book).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..20 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.checkout_copy(book_id, Utc::now()).await.unwrap()
            }));
        }

        let mut reserved = 0;
        for handle in handles {
            if let CopyReservation::Reserved(_) = handle.await.unwrap() {
                reserved += 1;
            }
        }

        assert_eq!(reserved, 5);
        let book = store.get_by_id(book_id).await.unwrap().unwrap();
        assert_eq!(book.available_quantity, 0);
    }

    #[tokio::test]
    async fn test_adjust_total_quantity_below_outstanding() {
        let store = BookStore::new();
        let book = book("9780553383805", "Paula", 2);
        let book_id = book.book_id;
        store.insert(book).await.unwrap();

        let now = Utc::now();
        store.checkout_copy(book_id, now).await.unwrap();
        store.checkout_copy(book_id, now).await.unwrap();

        assert_eq!(
            store.adjust_total_quantity(book_id, 1, now).await.unwrap(),
            QuantityAdjustment::BelowOutstanding { outstanding: 2 }
        );

        let book = store.get_by_id(book_id).await.unwrap().unwrap();
        assert_eq!(book.total_quantity, 2);
    }
}
