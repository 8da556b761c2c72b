use library_catalog::{
    adapters::{
        SystemClock,
        memory::{
            InMemoryBookStore, InMemoryLoanEventLog, InMemoryLoanRepository, InMemoryUserDirectory,
        },
        postgres::{
            PostgresBookStore, PostgresLoanEventLog, PostgresLoanRepository, PostgresUserDirectory,
            run_migrations,
        },
    },
    api::{AppState, create_router},
    application::{ServiceDependencies, loan::detect_overdue_loans},
    config::AppConfig,
};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// 設定に応じてアダプターを組み立てる
async fn build_dependencies(
    config: &AppConfig,
) -> Result<ServiceDependencies, Box<dyn std::error::Error>> {
    let clock = Arc::new(SystemClock);

    let Some(database_url) = &config.database_url else {
        tracing::warn!("DATABASE_URL is not set, using in-memory storage");
        let book_store = Arc::new(InMemoryBookStore::new());
        return Ok(ServiceDependencies {
            user_directory: Arc::new(InMemoryUserDirectory::new()),
            book_catalog: book_store.clone(),
            inventory_ledger: book_store,
            loan_repository: Arc::new(InMemoryLoanRepository::new()),
            loan_event_log: Arc::new(InMemoryLoanEventLog::new()),
            clock,
            policy: config.policy,
        });
    };

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .connect(database_url)
        .await?;

    run_migrations(&pool).await?;
    tracing::info!("Database migrations applied");

    let book_store = Arc::new(PostgresBookStore::new(pool.clone()));
    Ok(ServiceDependencies {
        user_directory: Arc::new(PostgresUserDirectory::new(pool.clone())),
        book_catalog: book_store.clone(),
        inventory_ledger: book_store,
        loan_repository: Arc::new(PostgresLoanRepository::new(pool.clone())),
        loan_event_log: Arc::new(PostgresLoanEventLog::new(pool)),
        clock,
        policy: config.policy,
    })
}

/// 延滞検出バッチを一定間隔で実行する
fn spawn_overdue_sweep(deps: ServiceDependencies, period: Duration) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        loop {
            interval.tick().await;
            if let Err(e) = detect_overdue_loans(&deps).await {
                tracing::error!("Overdue sweep failed: {}", e);
            }
        }
    });
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "library_catalog=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env()?;
    let service_deps = build_dependencies(&config).await?;

    spawn_overdue_sweep(service_deps.clone(), config.overdue_sweep_interval);

    let app_state = Arc::new(AppState { service_deps });
    let app = create_router(app_state);

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;
    Ok(())
}
