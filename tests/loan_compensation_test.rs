//! 在庫台帳・貸出リポジトリの障害時に、貸出と在庫が食い違わないことのテスト
//!
//! 失敗を注入するアダプターでインメモリ実装を包み、補償処理を確認する。

mod common;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use library_catalog::adapters::memory::{
    InMemoryBookStore, InMemoryLoanEventLog, InMemoryLoanRepository, InMemoryUserDirectory,
    ManualClock,
};
use library_catalog::application::{
    ServiceDependencies,
    loan::{
        LoanApplicationError, checkout_book, detect_overdue_loans, get_loan_status,
        list_loans_for_user, loan_history, mark_loan_lost, return_loan,
    },
};
use library_catalog::domain::{
    Book, DomainEvent, Loan, LoanPolicy, LoanStatus, Role,
    commands::{CheckoutBook, MarkLoanLost, ReturnLoan},
    value_objects::{BookId, LoanId, UserId},
};
use library_catalog::ports::{
    BookCatalog, CopyReservation, InventoryLedger, LoanRepository, QuantityAdjustment,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

type PortResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// 保存が常に失敗する貸出リポジトリ
struct UnwritableLoanRepository {
    inner: InMemoryLoanRepository,
}

#[async_trait]
impl LoanRepository for UnwritableLoanRepository {
    async fn insert(&self, _loan: &Loan, _open_loan_limit: usize) -> PortResult<bool> {
        Err("loan storage unavailable".into())
    }

    async fn replace(&self, loan: &Loan, expected_revision: u32) -> PortResult<bool> {
        self.inner.replace(loan, expected_revision).await
    }

    async fn get_by_id(&self, loan_id: LoanId) -> PortResult<Option<Loan>> {
        self.inner.get_by_id(loan_id).await
    }

    async fn count_open_for_user(&self, user_id: UserId) -> PortResult<usize> {
        self.inner.count_open_for_user(user_id).await
    }

    async fn find_by_user_id(&self, user_id: UserId) -> PortResult<Vec<Loan>> {
        self.inner.find_by_user_id(user_id).await
    }

    async fn find_overdue_candidates(&self, cutoff: DateTime<Utc>) -> PortResult<Vec<Loan>> {
        self.inner.find_overdue_candidates(cutoff).await
    }

    async fn find_overdue(&self, now: DateTime<Utc>) -> PortResult<Vec<Loan>> {
        self.inner.find_overdue(now).await
    }
}

/// 次の返却・除籍を1回だけ失敗させる在庫台帳
struct FlakyLedger {
    inner: Arc<InMemoryBookStore>,
    fail_next: AtomicBool,
}

impl FlakyLedger {
    fn fail_once(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }

    fn should_fail(&self) -> bool {
        self.fail_next.swap(false, Ordering::SeqCst)
    }
}

#[async_trait]
impl InventoryLedger for FlakyLedger {
    async fn checkout_copy(&self, book_id: BookId, at: DateTime<Utc>) -> PortResult<CopyReservation> {
        self.inner.checkout_copy(book_id, at).await
    }

    async fn release_copy(&self, book_id: BookId, at: DateTime<Utc>) -> PortResult<Option<Book>> {
        if self.should_fail() {
            return Err("ledger unavailable".into());
        }
        self.inner.release_copy(book_id, at).await
    }

    async fn write_off_copy(&self, book_id: BookId, at: DateTime<Utc>) -> PortResult<Option<Book>> {
        if self.should_fail() {
            return Err("ledger unavailable".into());
        }
        self.inner.write_off_copy(book_id, at).await
    }

    async fn adjust_total_quantity(
        &self,
        book_id: BookId,
        new_total: u32,
        at: DateTime<Utc>,
    ) -> PortResult<QuantityAdjustment> {
        self.inner.adjust_total_quantity(book_id, new_total, at).await
    }
}

struct FaultyContext {
    deps: ServiceDependencies,
    clock: Arc<ManualClock>,
    ledger: Arc<FlakyLedger>,
}

fn faulty_context(loan_repository: Arc<dyn LoanRepository>) -> FaultyContext {
    let clock = Arc::new(ManualClock::new(common::day_zero()));
    let book_store = Arc::new(InMemoryBookStore::new());
    let ledger = Arc::new(FlakyLedger {
        inner: book_store.clone(),
        fail_next: AtomicBool::new(false),
    });

    let deps = ServiceDependencies {
        user_directory: Arc::new(InMemoryUserDirectory::new()),
        book_catalog: book_store,
        inventory_ledger: ledger.clone(),
        loan_repository,
        loan_event_log: Arc::new(InMemoryLoanEventLog::new()),
        clock: clock.clone(),
        policy: LoanPolicy::default(),
    };

    FaultyContext { deps, clock, ledger }
}

fn flaky_ledger_context() -> FaultyContext {
    faulty_context(Arc::new(InMemoryLoanRepository::new()))
}

async fn quantities(deps: &ServiceDependencies, book_id: BookId) -> (u32, u32) {
    let book = deps.book_catalog.get_by_id(book_id).await.unwrap().unwrap();
    (book.available_quantity, book.total_quantity)
}

async fn checkout(deps: &ServiceDependencies, user_id: UserId, book_id: BookId) -> LoanId {
    checkout_book(deps, CheckoutBook { user_id, book_id })
        .await
        .unwrap()
        .loan_id
}

#[tokio::test]
async fn test_checkout_releases_copy_when_loan_cannot_be_saved() {
    let ctx = faulty_context(Arc::new(UnwritableLoanRepository {
        inner: InMemoryLoanRepository::new(),
    }));
    let reader = common::register_user(&ctx.deps, "reader", Role::Student).await;
    let book = common::register_book(&ctx.deps, "9780307474728", 1).await;

    let result = checkout_book(
        &ctx.deps,
        CheckoutBook {
            user_id: reader.user_id,
            book_id: book.book_id,
        },
    )
    .await;

    assert!(matches!(
        result,
        Err(LoanApplicationError::LoanRepositoryError(_))
    ));
    assert_eq!(quantities(&ctx.deps, book.book_id).await, (1, 1));

    let loans = list_loans_for_user(&ctx.deps, reader.user_id, None)
        .await
        .unwrap();
    assert!(loans.is_empty());
}

#[tokio::test]
async fn test_return_can_be_retried_after_release_fails() {
    let ctx = flaky_ledger_context();
    let reader = common::register_user(&ctx.deps, "reader", Role::Student).await;
    let book = common::register_book(&ctx.deps, "9780307474728", 1).await;
    let loan_id = checkout(&ctx.deps, reader.user_id, book.book_id).await;
    assert_eq!(quantities(&ctx.deps, book.book_id).await, (0, 1));

    ctx.ledger.fail_once();
    let result = return_loan(&ctx.deps, ReturnLoan { loan_id }).await;
    assert!(matches!(
        result,
        Err(LoanApplicationError::InventoryLedgerError(_))
    ));

    // 在庫が戻っていないので、貸出もActiveのまま
    let view = get_loan_status(&ctx.deps, loan_id).await.unwrap();
    assert_eq!(view.status, LoanStatus::Active);
    assert_eq!(quantities(&ctx.deps, book.book_id).await, (0, 1));

    let view = return_loan(&ctx.deps, ReturnLoan { loan_id }).await.unwrap();
    assert_eq!(view.status, LoanStatus::Returned);
    assert_eq!(quantities(&ctx.deps, book.book_id).await, (1, 1));

    let history = loan_history(&ctx.deps, loan_id).await.unwrap();
    assert_eq!(history.len(), 2);
    assert!(matches!(history[0], DomainEvent::BookLoaned(_)));
    assert!(matches!(history[1], DomainEvent::BookReturned(_)));
}

#[tokio::test]
async fn test_mark_lost_can_be_retried_after_write_off_fails() {
    let ctx = flaky_ledger_context();
    let reader = common::register_user(&ctx.deps, "reader", Role::Student).await;
    let book = common::register_book(&ctx.deps, "9780307474728", 2).await;
    let loan_id = checkout(&ctx.deps, reader.user_id, book.book_id).await;

    ctx.ledger.fail_once();
    let result = mark_loan_lost(&ctx.deps, MarkLoanLost { loan_id }).await;
    assert!(matches!(
        result,
        Err(LoanApplicationError::InventoryLedgerError(_))
    ));

    let view = get_loan_status(&ctx.deps, loan_id).await.unwrap();
    assert_eq!(view.status, LoanStatus::Active);
    assert_eq!(quantities(&ctx.deps, book.book_id).await, (1, 2));

    let view = mark_loan_lost(&ctx.deps, MarkLoanLost { loan_id })
        .await
        .unwrap();
    assert_eq!(view.status, LoanStatus::Lost);
    assert_eq!(quantities(&ctx.deps, book.book_id).await, (1, 1));
}

#[tokio::test]
async fn test_failed_return_keeps_stored_overdue_status() {
    let ctx = flaky_ledger_context();
    let reader = common::register_user(&ctx.deps, "reader", Role::Student).await;
    let book = common::register_book(&ctx.deps, "9780307474728", 1).await;
    let loan_id = checkout(&ctx.deps, reader.user_id, book.book_id).await;

    ctx.clock.advance(Duration::days(15));
    assert_eq!(detect_overdue_loans(&ctx.deps).await.unwrap(), 1);

    ctx.ledger.fail_once();
    assert!(return_loan(&ctx.deps, ReturnLoan { loan_id }).await.is_err());

    let stored = ctx
        .deps
        .loan_repository
        .get_by_id(loan_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.status(), LoanStatus::Overdue);

    // 取り消し後に再度バッチを流しても重複して延滞にはならない
    assert_eq!(detect_overdue_loans(&ctx.deps).await.unwrap(), 0);

    return_loan(&ctx.deps, ReturnLoan { loan_id }).await.unwrap();
    assert_eq!(quantities(&ctx.deps, book.book_id).await, (1, 1));
}
