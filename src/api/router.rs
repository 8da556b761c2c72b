use axum::{
    Router,
    routing::{get, post, put},
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use super::handlers::{
    AppState, adjust_book_quantity, checkout_book, deactivate_user, extend_loan, get_book,
    get_loan, get_user, list_loans, list_overdue_loans, loan_history, mark_loan_lost,
    register_book, register_user, return_loan, search_books,
};

/// APIルーターを作成する
///
/// 書籍:
/// - POST /books, GET /books?q=, GET /books/:id, PUT /books/:id/quantity
///
/// 利用者:
/// - POST /users, GET /users/:id, POST /users/:id/deactivate
///
/// 貸出:
/// - POST /loans, GET /loans?user_id=&status=, GET /loans/overdue
/// - GET /loans/:id, GET /loans/:id/history
/// - POST /loans/:id/return, POST /loans/:id/extend, POST /loans/:id/lost
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/books", post(register_book).get(search_books))
        .route("/books/:id", get(get_book))
        .route("/books/:id/quantity", put(adjust_book_quantity))
        .route("/users", post(register_user))
        .route("/users/:id", get(get_user))
        .route("/users/:id/deactivate", post(deactivate_user))
        .route("/loans", post(checkout_book).get(list_loans))
        .route("/loans/overdue", get(list_overdue_loans))
        .route("/loans/:id", get(get_loan))
        .route("/loans/:id/history", get(loan_history))
        .route("/loans/:id/return", post(return_loan))
        .route("/loans/:id/extend", post(extend_loan))
        .route("/loans/:id/lost", post(mark_loan_lost))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}
