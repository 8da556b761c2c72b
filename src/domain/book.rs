use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};

use super::BookId;

/// 書籍ステータス
///
/// 不変条件：`Available` ⇔ `available_quantity > 0`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookStatus {
    Available,
    Unavailable,
}

impl BookStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookStatus::Available => "available",
            BookStatus::Unavailable => "unavailable",
        }
    }

    fn for_available_quantity(available_quantity: u32) -> Self {
        if available_quantity > 0 {
            BookStatus::Available
        } else {
            BookStatus::Unavailable
        }
    }
}

impl std::str::FromStr for BookStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "available" => Ok(BookStatus::Available),
            "unavailable" => Ok(BookStatus::Unavailable),
            _ => Err(format!("Invalid book status: {}", s)),
        }
    }
}

/// 書籍 - 蔵書台帳の1タイトル
///
/// 不変条件：
/// - `0 <= available_quantity <= total_quantity`
/// - `status`は`available_quantity`から導出される
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Book {
    pub book_id: BookId,
    pub title: String,
    pub author: String,
    pub isbn: String,
    pub category: String,
    pub publisher: Option<String>,
    pub publication_year: Option<i32>,
    pub total_quantity: u32,
    pub available_quantity: u32,
    pub status: BookStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Book {
    /// 貸出中の冊数
    pub fn outstanding(&self) -> u32 {
        self.total_quantity - self.available_quantity
    }

    pub fn is_available(&self) -> bool {
        self.available_quantity > 0
    }
}

/// 書籍登録の入力
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewBook {
    pub title: String,
    pub author: String,
    pub isbn: String,
    pub category: String,
    pub publisher: Option<String>,
    pub publication_year: Option<i32>,
    pub quantity: u32,
}

/// 在庫確保のエラー
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InventoryError {
    /// 貸出可能な在庫がない
    Unavailable,
}

/// 貸出中の冊数より少ない総数は設定できない
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuantityBelowOutstanding {
    pub outstanding: u32,
}

/// 書籍バリデーションのエラー
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BookValidationError {
    EmptyTitle,
    TitleTooLong,
    EmptyAuthor,
    AuthorTooLong,
    InvalidIsbn,
    EmptyCategory,
    CategoryTooLong,
    PublisherTooLong,
    InvalidPublicationYear(i32),
    QuantityTooLarge(u32),
}

impl std::fmt::Display for BookValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BookValidationError::EmptyTitle => write!(f, "title must not be empty"),
            BookValidationError::TitleTooLong => write!(f, "title must be at most 255 characters"),
            BookValidationError::EmptyAuthor => write!(f, "author must not be empty"),
            BookValidationError::AuthorTooLong => {
                write!(f, "author must be at most 255 characters")
            }
            BookValidationError::InvalidIsbn => write!(f, "isbn must be 10 to 13 characters"),
            BookValidationError::EmptyCategory => write!(f, "category must not be empty"),
            BookValidationError::CategoryTooLong => {
                write!(f, "category must be at most 100 characters")
            }
            BookValidationError::PublisherTooLong => {
                write!(f, "publisher must be at most 255 characters")
            }
            BookValidationError::InvalidPublicationYear(year) => {
                write!(f, "publication year {} is out of range", year)
            }
            BookValidationError::QuantityTooLarge(quantity) => {
                write!(f, "quantity {} exceeds {}", quantity, MAX_QUANTITY)
            }
        }
    }
}

const MAX_TEXT_LENGTH: usize = 255;
const MAX_CATEGORY_LENGTH: usize = 100;
const MIN_PUBLICATION_YEAR: i32 = 1000;

/// 蔵書数の上限（PostgreSQLのINTEGERに収まる範囲）
pub const MAX_QUANTITY: u32 = i32::MAX as u32;

/// 純粋関数：蔵書数が上限内か検証する
pub fn validate_quantity(quantity: u32) -> Result<u32, BookValidationError> {
    if quantity > MAX_QUANTITY {
        return Err(BookValidationError::QuantityTooLarge(quantity));
    }
    Ok(quantity)
}

/// 純粋関数：書籍を登録する
///
/// ビジネスルール：
/// - タイトル・著者は空でなく255文字以内
/// - ISBNは10〜13文字
/// - 分類は空でなく100文字以内、出版社は255文字以内
/// - 出版年は1000年から登録年まで
/// - 冊数は`MAX_QUANTITY`以下
/// - 登録時点では全冊貸出可能
pub fn register_book(
    new_book: NewBook,
    registered_at: DateTime<Utc>,
) -> Result<Book, BookValidationError> {
    let title = new_book.title.trim().to_string();
    let author = new_book.author.trim().to_string();
    let isbn = new_book.isbn.trim().to_string();
    let category = new_book.category.trim().to_string();

    if title.is_empty() {
        return Err(BookValidationError::EmptyTitle);
    }
    if title.chars().count() > MAX_TEXT_LENGTH {
        return Err(BookValidationError::TitleTooLong);
    }
    if author.is_empty() {
        return Err(BookValidationError::EmptyAuthor);
    }
    if author.chars().count() > MAX_TEXT_LENGTH {
        return Err(BookValidationError::AuthorTooLong);
    }
    if !(10..=13).contains(&isbn.chars().count()) {
        return Err(BookValidationError::InvalidIsbn);
    }
    if category.is_empty() {
        return Err(BookValidationError::EmptyCategory);
    }
    if category.chars().count() > MAX_CATEGORY_LENGTH {
        return Err(BookValidationError::CategoryTooLong);
    }
    if new_book
        .publisher
        .as_ref()
        .is_some_and(|publisher| publisher.chars().count() > MAX_TEXT_LENGTH)
    {
        return Err(BookValidationError::PublisherTooLong);
    }
    if let Some(year) = new_book.publication_year {
        if !(MIN_PUBLICATION_YEAR..=registered_at.year()).contains(&year) {
            return Err(BookValidationError::InvalidPublicationYear(year));
        }
    }
    let quantity = validate_quantity(new_book.quantity)?;

    Ok(Book {
        book_id: BookId::new(),
        title,
        author,
        isbn,
        category,
        publisher: new_book.publisher,
        publication_year: new_book.publication_year,
        total_quantity: quantity,
        available_quantity: quantity,
        status: BookStatus::for_available_quantity(quantity),
        created_at: registered_at,
        updated_at: registered_at,
    })
}

/// 純粋関数：1冊を貸出用に確保する
///
/// 在庫が0の場合は`InventoryError::Unavailable`。
pub fn checkout_copy(book: &Book, at: DateTime<Utc>) -> Result<Book, InventoryError> {
    if book.available_quantity == 0 {
        return Err(InventoryError::Unavailable);
    }

    let available_quantity = book.available_quantity - 1;
    Ok(Book {
        available_quantity,
        status: BookStatus::for_available_quantity(available_quantity),
        updated_at: at,
        ..book.clone()
    })
}

/// 純粋関数：返却された1冊を在庫に戻す
///
/// 総数を超えて増えることはない。
pub fn release_copy(book: &Book, at: DateTime<Utc>) -> Book {
    let available_quantity = (book.available_quantity + 1).min(book.total_quantity);
    Book {
        available_quantity,
        status: BookStatus::for_available_quantity(available_quantity),
        updated_at: at,
        ..book.clone()
    }
}

/// 純粋関数：紛失した1冊を蔵書から除く
///
/// 総数を1減らし、貸出可能数は新しい総数で頭打ちにする。
pub fn write_off_copy(book: &Book, at: DateTime<Utc>) -> Book {
    let total_quantity = book.total_quantity.saturating_sub(1);
    let available_quantity = book.available_quantity.min(total_quantity);
    Book {
        total_quantity,
        available_quantity,
        status: BookStatus::for_available_quantity(available_quantity),
        updated_at: at,
        ..book.clone()
    }
}

/// 純粋関数：蔵書の総数を変更する
///
/// 貸出中の冊数は変えずに、残りを貸出可能数とする。
pub fn adjust_total_quantity(
    book: &Book,
    new_total: u32,
    at: DateTime<Utc>,
) -> Result<Book, QuantityBelowOutstanding> {
    let outstanding = book.outstanding();
    if new_total < outstanding {
        return Err(QuantityBelowOutstanding { outstanding });
    }

    let available_quantity = new_total - outstanding;
    Ok(Book {
        total_quantity: new_total,
        available_quantity,
        status: BookStatus::for_available_quantity(available_quantity),
        updated_at: at,
        ..book.clone()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_book(quantity: u32) -> NewBook {
        NewBook {
            title: "Cien años de soledad".to_string(),
            author: "Gabriel García Márquez".to_string(),
            isbn: "9780307474728".to_string(),
            category: "Novela".to_string(),
            publisher: None,
            publication_year: Some(1967),
            quantity,
        }
    }

    fn assert_invariants(book: &Book) {
        assert!(book.available_quantity <= book.total_quantity);
        assert_eq!(book.status == BookStatus::Available, book.available_quantity > 0);
    }

    #[test]
    fn test_register_book_all_copies_available() {
        let book = register_book(new_book(3), Utc::now()).unwrap();
        assert_eq!(book.total_quantity, 3);
        assert_eq!(book.available_quantity, 3);
        assert_eq!(book.status, BookStatus::Available);
    }

    #[test]
    fn test_register_book_with_zero_copies_is_unavailable() {
        let book = register_book(new_book(0), Utc::now()).unwrap();
        assert_eq!(book.status, BookStatus::Unavailable);
    }

    #[test]
    fn test_register_book_rejects_short_isbn() {
        let input = NewBook {
            isbn: "12345".to_string(),
            ..new_book(1)
        };
        assert_eq!(
            register_book(input, Utc::now()).unwrap_err(),
            BookValidationError::InvalidIsbn
        );
    }

    #[test]
    fn test_register_book_rejects_long_category_and_publisher() {
        let input = NewBook {
            category: "c".repeat(101),
            ..new_book(1)
        };
        assert_eq!(
            register_book(input, Utc::now()).unwrap_err(),
            BookValidationError::CategoryTooLong
        );

        let input = NewBook {
            category: "c".repeat(100),
            publisher: Some("p".repeat(256)),
            ..new_book(1)
        };
        assert_eq!(
            register_book(input, Utc::now()).unwrap_err(),
            BookValidationError::PublisherTooLong
        );
    }

    #[test]
    fn test_register_book_rejects_quantity_beyond_integer_column() {
        assert_eq!(
            register_book(new_book(3_000_000_000), Utc::now()).unwrap_err(),
            BookValidationError::QuantityTooLarge(3_000_000_000)
        );
        assert!(register_book(new_book(MAX_QUANTITY), Utc::now()).is_ok());
    }

    #[test]
    fn test_register_book_rejects_future_publication_year() {
        let now = Utc::now();
        let input = NewBook {
            publication_year: Some(now.year() + 1),
            ..new_book(1)
        };
        assert!(matches!(
            register_book(input, now).unwrap_err(),
            BookValidationError::InvalidPublicationYear(_)
        ));
    }

    #[test]
    fn test_register_book_rejects_empty_title() {
        let input = NewBook {
            title: " ".to_string(),
            ..new_book(1)
        };
        assert_eq!(
            register_book(input, Utc::now()).unwrap_err(),
            BookValidationError::EmptyTitle
        );
    }

    #[test]
    fn test_checkout_copy_flips_status_at_zero() {
        let now = Utc::now();
        let book = register_book(new_book(1), now).unwrap();

        let book = checkout_copy(&book, now).unwrap();
        assert_eq!(book.available_quantity, 0);
        assert_eq!(book.status, BookStatus::Unavailable);

        assert_eq!(
            checkout_copy(&book, now).unwrap_err(),
            InventoryError::Unavailable
        );
    }

    #[test]
    fn test_release_copy_is_capped_at_total() {
        let now = Utc::now();
        let book = register_book(new_book(2), now).unwrap();

        let book = release_copy(&book, now);
        assert_eq!(book.available_quantity, 2);
        assert_invariants(&book);
    }

    #[test]
    fn test_release_copy_restores_availability() {
        let now = Utc::now();
        let book = register_book(new_book(1), now).unwrap();
        let book = checkout_copy(&book, now).unwrap();

        let book = release_copy(&book, now);
        assert_eq!(book.available_quantity, 1);
        assert_eq!(book.status, BookStatus::Available);
    }

    #[test]
    fn test_write_off_copy_of_loaned_copy_keeps_available() {
        let now = Utc::now();
        let book = register_book(new_book(3), now).unwrap();
        let book = checkout_copy(&book, now).unwrap();

        let book = write_off_copy(&book, now);
        assert_eq!(book.total_quantity, 2);
        assert_eq!(book.available_quantity, 2);
        assert_eq!(book.outstanding(), 0);
        assert_invariants(&book);
    }

    #[test]
    fn test_write_off_copy_clamps_available() {
        let now = Utc::now();
        let book = register_book(new_book(1), now).unwrap();

        let book = write_off_copy(&book, now);
        assert_eq!(book.total_quantity, 0);
        assert_eq!(book.available_quantity, 0);
        assert_eq!(book.status, BookStatus::Unavailable);

        let book = write_off_copy(&book, now);
        assert_eq!(book.total_quantity, 0);
    }

    #[test]
    fn test_adjust_total_quantity_keeps_outstanding() {
        let now = Utc::now();
        let book = register_book(new_book(3), now).unwrap();
        let book = checkout_copy(&book, now).unwrap();
        let book = checkout_copy(&book, now).unwrap();

        let book = adjust_total_quantity(&book, 5, now).unwrap();
        assert_eq!(book.total_quantity, 5);
        assert_eq!(book.available_quantity, 3);
        assert_eq!(book.outstanding(), 2);
    }

    #[test]
    fn test_adjust_total_quantity_below_outstanding_fails() {
        let now = Utc::now();
        let book = register_book(new_book(2), now).unwrap();
        let book = checkout_copy(&book, now).unwrap();
        let book = checkout_copy(&book, now).unwrap();

        assert_eq!(
            adjust_total_quantity(&book, 1, now).unwrap_err(),
            QuantityBelowOutstanding { outstanding: 2 }
        );
    }

    #[test]
    fn test_quantity_invariants_hold_over_mixed_sequence() {
        let now = Utc::now();
        let mut book = register_book(new_book(2), now).unwrap();

        for step in 0..20 {
            book = match step % 4 {
                0 | 1 => checkout_copy(&book, now).unwrap_or(book),
                2 => release_copy(&book, now),
                _ => write_off_copy(&book, now),
            };
            assert_invariants(&book);
        }
    }
}
