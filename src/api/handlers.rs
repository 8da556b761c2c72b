use crate::application::{ServiceDependencies, catalog, loan, user};
use crate::domain::{
    commands::{ExtendLoan, MarkLoanLost, ReturnLoan},
    value_objects::{BookId, LoanId, UserId},
};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use std::sync::Arc;
use uuid::Uuid;

use super::{
    error::ApiError,
    types::{
        AdjustQuantityRequest, BookResponse, CheckoutRequest, ListLoansQuery, LoanEventResponse,
        LoanResponse, RegisterBookRequest, RegisterUserRequest, SearchBooksQuery, UserResponse,
        parse_status_filter,
    },
};

// ============================================================================
// State
// ============================================================================

/// ハンドラー間で共有されるアプリケーション状態
#[derive(Clone)]
pub struct AppState {
    pub service_deps: ServiceDependencies,
}

// ============================================================================
// 書籍
// ============================================================================

/// POST /books - 書籍を登録
pub async fn register_book(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterBookRequest>,
) -> Result<(StatusCode, Json<BookResponse>), ApiError> {
    let book = catalog::register_book(&state.service_deps, req.into_new_book()).await?;
    Ok((StatusCode::CREATED, Json(BookResponse::from(book))))
}

/// GET /books?q= - 書籍を検索
///
/// タイトル・著者・ISBN・分類の部分一致（大文字小文字を区別しない）。
pub async fn search_books(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SearchBooksQuery>,
) -> Result<Json<Vec<BookResponse>>, ApiError> {
    let books =
        catalog::search_books(&state.service_deps, query.q.as_deref().unwrap_or("")).await?;
    Ok(Json(books.into_iter().map(BookResponse::from).collect()))
}

/// GET /books/:id - 書籍をIDで取得
pub async fn get_book(
    State(state): State<Arc<AppState>>,
    Path(book_id): Path<Uuid>,
) -> Result<Json<BookResponse>, ApiError> {
    let book = catalog::get_book(&state.service_deps, BookId::from_uuid(book_id)).await?;
    Ok(Json(BookResponse::from(book)))
}

/// PUT /books/:id/quantity - 蔵書の総数を変更
///
/// 貸出中の冊数を下回る値は422。
pub async fn adjust_book_quantity(
    State(state): State<Arc<AppState>>,
    Path(book_id): Path<Uuid>,
    Json(req): Json<AdjustQuantityRequest>,
) -> Result<Json<BookResponse>, ApiError> {
    let book = catalog::adjust_book_quantity(
        &state.service_deps,
        BookId::from_uuid(book_id),
        req.total_quantity,
    )
    .await?;
    Ok(Json(BookResponse::from(book)))
}

// ============================================================================
// 利用者
// ============================================================================

/// POST /users - 利用者を登録
pub async fn register_user(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterUserRequest>,
) -> Result<(StatusCode, Json<UserResponse>), ApiError> {
    let user = user::register_user(&state.service_deps, req.into_new_user()).await?;
    Ok((StatusCode::CREATED, Json(UserResponse::from(user))))
}

/// GET /users/:id - 利用者をIDで取得
pub async fn get_user(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<UserResponse>, ApiError> {
    let user = user::get_user(&state.service_deps, UserId::from_uuid(user_id)).await?;
    Ok(Json(UserResponse::from(user)))
}

/// POST /users/:id/deactivate - 利用者を無効化
pub async fn deactivate_user(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<UserResponse>, ApiError> {
    let user = user::deactivate_user(&state.service_deps, UserId::from_uuid(user_id)).await?;
    Ok(Json(UserResponse::from(user)))
}

// ============================================================================
// 貸出（コマンド）
// ============================================================================

/// POST /loans - 新しい貸出を作成
///
/// 強制されるビジネスルール:
/// - 利用者が存在し、有効であること
/// - 利用者の未終了の貸出数が役割ごとの上限未満であること
/// - 書籍の貸出可能数が1以上であること
pub async fn checkout_book(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CheckoutRequest>,
) -> Result<(StatusCode, Json<LoanResponse>), ApiError> {
    let view = loan::checkout_book(&state.service_deps, req.to_command()).await?;
    Ok((StatusCode::CREATED, Json(LoanResponse::from(view))))
}

/// POST /loans/:id/return - 書籍を返却
///
/// 延滞中の貸出も返却可能。返却済み・紛失済みは409。
pub async fn return_loan(
    State(state): State<Arc<AppState>>,
    Path(loan_id): Path<Uuid>,
) -> Result<Json<LoanResponse>, ApiError> {
    let cmd = ReturnLoan {
        loan_id: LoanId::from_uuid(loan_id),
    };
    let view = loan::return_loan(&state.service_deps, cmd).await?;
    Ok(Json(LoanResponse::from(view)))
}

/// POST /loans/:id/extend - 貸出を延長
///
/// 強制されるビジネスルール:
/// - 貸出がActive状態であること（延滞中は延長不可）
/// - 延長回数がポリシーの上限未満であること
pub async fn extend_loan(
    State(state): State<Arc<AppState>>,
    Path(loan_id): Path<Uuid>,
) -> Result<Json<LoanResponse>, ApiError> {
    let cmd = ExtendLoan {
        loan_id: LoanId::from_uuid(loan_id),
    };
    let view = loan::extend_loan(&state.service_deps, cmd).await?;
    Ok(Json(LoanResponse::from(view)))
}

/// POST /loans/:id/lost - 紛失として記録
pub async fn mark_loan_lost(
    State(state): State<Arc<AppState>>,
    Path(loan_id): Path<Uuid>,
) -> Result<Json<LoanResponse>, ApiError> {
    let cmd = MarkLoanLost {
        loan_id: LoanId::from_uuid(loan_id),
    };
    let view = loan::mark_loan_lost(&state.service_deps, cmd).await?;
    Ok(Json(LoanResponse::from(view)))
}

// ============================================================================
// 貸出（クエリ）
// ============================================================================

/// GET /loans/:id - 貸出詳細をIDで取得
///
/// ステータスは取得時刻で再計算される。
pub async fn get_loan(
    State(state): State<Arc<AppState>>,
    Path(loan_id): Path<Uuid>,
) -> Result<Json<LoanResponse>, ApiError> {
    let view = loan::get_loan_status(&state.service_deps, LoanId::from_uuid(loan_id)).await?;
    Ok(Json(LoanResponse::from(view)))
}

/// GET /loans - 利用者の貸出一覧取得
///
/// クエリパラメータ:
/// - user_id: 利用者IDでフィルタリング（必須）
/// - status: ステータスでフィルタリング（active, overdue, returned, lost）（オプション）
pub async fn list_loans(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListLoansQuery>,
) -> Result<Json<Vec<LoanResponse>>, ApiError> {
    let user_id = query
        .user_id
        .ok_or_else(|| ApiError::BadRequest("user_id query parameter is required".to_string()))?;

    let status = query
        .status
        .as_deref()
        .map(parse_status_filter)
        .transpose()
        .map_err(ApiError::BadRequest)?;

    let views =
        loan::list_loans_for_user(&state.service_deps, UserId::from_uuid(user_id), status)
            .await?;

    Ok(Json(views.into_iter().map(LoanResponse::from).collect()))
}

/// GET /loans/overdue - 延滞中の貸出一覧取得
pub async fn list_overdue_loans(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<LoanResponse>>, ApiError> {
    let views = loan::list_overdue_loans(&state.service_deps).await?;
    Ok(Json(views.into_iter().map(LoanResponse::from).collect()))
}

/// GET /loans/:id/history - 貸出の履歴を取得
pub async fn loan_history(
    State(state): State<Arc<AppState>>,
    Path(loan_id): Path<Uuid>,
) -> Result<Json<Vec<LoanEventResponse>>, ApiError> {
    let events = loan::loan_history(&state.service_deps, LoanId::from_uuid(loan_id)).await?;
    Ok(Json(events.into_iter().map(LoanEventResponse::from).collect()))
}
