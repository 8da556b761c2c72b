pub mod book_store;
pub mod clock;
pub mod loan_event_log;
pub mod loan_repository;
pub mod user_directory;

// パブリックに型を再エクスポート
pub use book_store::BookStore as InMemoryBookStore;
pub use clock::ManualClock;
pub use loan_event_log::LoanEventLog as InMemoryLoanEventLog;
pub use loan_repository::LoanRepository as InMemoryLoanRepository;
pub use user_directory::UserDirectory as InMemoryUserDirectory;

/// ロックのポイズニングをポートのエラー型に変換する
pub(crate) fn poisoned<T>(_: std::sync::PoisonError<T>) -> Box<dyn std::error::Error + Send + Sync> {
    "in-memory store lock poisoned".into()
}
