use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::application::loan::LoanView;
use crate::domain::{
    Book, DomainEvent, LoanStatus, NewBook, NewUser, Role, User,
    commands::CheckoutBook,
    value_objects::{BookId, UserId},
};

// ============================================================================
// 書籍
// ============================================================================

/// 書籍登録リクエスト（POST /books）
#[derive(Debug, Deserialize)]
pub struct RegisterBookRequest {
    pub title: String,
    pub author: String,
    pub isbn: String,
    pub category: String,
    pub publisher: Option<String>,
    pub publication_year: Option<i32>,
    pub quantity: u32,
}

impl RegisterBookRequest {
    pub fn into_new_book(self) -> NewBook {
        NewBook {
            title: self.title,
            author: self.author,
            isbn: self.isbn,
            category: self.category,
            publisher: self.publisher,
            publication_year: self.publication_year,
            quantity: self.quantity,
        }
    }
}

/// 蔵書数変更リクエスト（PUT /books/:id/quantity）
#[derive(Debug, Deserialize)]
pub struct AdjustQuantityRequest {
    pub total_quantity: u32,
}

/// 書籍検索のクエリパラメータ
#[derive(Debug, Deserialize)]
pub struct SearchBooksQuery {
    pub q: Option<String>,
}

/// 書籍レスポンス
#[derive(Debug, Serialize)]
pub struct BookResponse {
    pub book_id: Uuid,
    pub title: String,
    pub author: String,
    pub isbn: String,
    pub category: String,
    pub publisher: Option<String>,
    pub publication_year: Option<i32>,
    pub total_quantity: u32,
    pub available_quantity: u32,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Book> for BookResponse {
    fn from(book: Book) -> Self {
        Self {
            book_id: book.book_id.value(),
            title: book.title,
            author: book.author,
            isbn: book.isbn,
            category: book.category,
            publisher: book.publisher,
            publication_year: book.publication_year,
            total_quantity: book.total_quantity,
            available_quantity: book.available_quantity,
            status: book.status.as_str().to_string(),
            created_at: book.created_at,
            updated_at: book.updated_at,
        }
    }
}

// ============================================================================
// 利用者
// ============================================================================

/// 利用者登録リクエスト（POST /users）
#[derive(Debug, Deserialize)]
pub struct RegisterUserRequest {
    pub username: String,
    pub full_name: String,
    pub email: String,
    pub role: Role,
}

impl RegisterUserRequest {
    pub fn into_new_user(self) -> NewUser {
        NewUser {
            username: self.username,
            full_name: self.full_name,
            email: self.email,
            role: self.role,
        }
    }
}

/// 利用者レスポンス
#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub user_id: Uuid,
    pub username: String,
    pub full_name: String,
    pub email: String,
    pub role: Role,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            user_id: user.user_id.value(),
            username: user.username,
            full_name: user.full_name,
            email: user.email,
            role: user.role,
            active: user.active,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

// ============================================================================
// 貸出
// ============================================================================

/// 貸出リクエスト（POST /loans）
#[derive(Debug, Deserialize)]
pub struct CheckoutRequest {
    pub user_id: Uuid,
    pub book_id: Uuid,
}

impl CheckoutRequest {
    pub fn to_command(&self) -> CheckoutBook {
        CheckoutBook {
            user_id: UserId::from_uuid(self.user_id),
            book_id: BookId::from_uuid(self.book_id),
        }
    }
}

/// 貸出一覧取得のクエリパラメータ
#[derive(Debug, Deserialize)]
pub struct ListLoansQuery {
    /// 利用者IDでフィルタリング
    pub user_id: Option<Uuid>,
    /// ステータスでフィルタリング
    pub status: Option<String>,
}

/// 貸出レスポンス
#[derive(Debug, Serialize)]
pub struct LoanResponse {
    pub loan_id: Uuid,
    pub book_id: Uuid,
    pub user_id: Uuid,
    pub loaned_at: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
    pub returned_at: Option<DateTime<Utc>>,
    pub lost_at: Option<DateTime<Utc>>,
    pub extension_count: u8,
    pub status: String,
    pub can_extend: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<LoanView> for LoanResponse {
    fn from(view: LoanView) -> Self {
        Self {
            loan_id: view.loan_id.value(),
            book_id: view.book_id.value(),
            user_id: view.user_id.value(),
            loaned_at: view.loaned_at,
            due_date: view.due_date,
            returned_at: view.returned_at,
            lost_at: view.lost_at,
            extension_count: view.extension_count,
            status: view.status.as_str().to_string(),
            can_extend: view.can_extend,
            created_at: view.created_at,
            updated_at: view.updated_at,
        }
    }
}

/// 貸出履歴の1件
#[derive(Debug, Serialize)]
pub struct LoanEventResponse {
    pub event_type: String,
    pub occurred_at: DateTime<Utc>,
    pub event: DomainEvent,
}

impl From<DomainEvent> for LoanEventResponse {
    fn from(event: DomainEvent) -> Self {
        Self {
            event_type: event.event_type().to_string(),
            occurred_at: event.occurred_at(),
            event,
        }
    }
}

// ============================================================================
// 共通
// ============================================================================

/// エラーレスポンス
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
        }
    }
}

/// ステータスクエリパラメータのパースとバリデーション
pub fn parse_status_filter(status: &str) -> Result<LoanStatus, String> {
    status.parse::<LoanStatus>()
}
