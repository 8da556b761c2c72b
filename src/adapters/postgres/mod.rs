pub mod book_store;
pub mod loan_event_log;
pub mod loan_repository;
pub mod user_directory;

// パブリックに型を再エクスポート
pub use book_store::BookStore as PostgresBookStore;
pub use loan_event_log::LoanEventLog as PostgresLoanEventLog;
pub use loan_repository::LoanRepository as PostgresLoanRepository;
pub use user_directory::UserDirectory as PostgresUserDirectory;

/// マイグレーションを適用する
pub async fn run_migrations(pool: &sqlx::PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}

/// 行データの変換エラー
pub(crate) fn invalid_data(message: String) -> Box<dyn std::error::Error + Send + Sync> {
    Box::new(std::io::Error::new(std::io::ErrorKind::InvalidData, message))
}

/// 数量・回数のカラム値を符号なし整数に変換する
pub(crate) fn to_unsigned<S, U>(
    column: &str,
    value: S,
) -> Result<U, Box<dyn std::error::Error + Send + Sync>>
where
    S: Copy + std::fmt::Display,
    U: TryFrom<S>,
{
    U::try_from(value).map_err(|_| invalid_data(format!("{} out of range: {}", column, value)))
}
