use crate::domain::{events::DomainEvent, value_objects::LoanId};
use crate::ports::loan_event_log::{LoanEventLog as LoanEventLogTrait, Result};
use async_trait::async_trait;
use sqlx::{PgPool, Row};

use super::invalid_data;

/// LoanEventLogのPostgreSQL実装
///
/// ドメインイベントをJSONBとして追記専用テーブルに保存する。
pub struct LoanEventLog {
    pool: PgPool,
}

impl LoanEventLog {
    /// PostgreSQLコネクションプールから新しいLoanEventLogを作成
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LoanEventLogTrait for LoanEventLog {
    /// イベントを追記する
    ///
    /// event_versionには状態遷移の確定後のリビジョンを使う。
    /// リビジョンは比較交換で貸出ごとに一意に決まるため、並行追記でも
    /// (loan_id, event_version)の一意制約には衝突しない。
    async fn append(&self, loan_id: LoanId, revision: u32, event: DomainEvent) -> Result<()> {
        let event_version = i32::try_from(revision)
            .map_err(|_| invalid_data(format!("revision out of range: {}", revision)))?;

        sqlx::query(
            r#"
            INSERT INTO loan_events (
                loan_id,
                event_version,
                event_type,
                event_data,
                occurred_at
            )
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(loan_id.value())
        .bind(event_version)
        .bind(event.event_type())
        .bind(serde_json::to_value(&event)?)
        .bind(event.occurred_at())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn load(&self, loan_id: LoanId) -> Result<Vec<DomainEvent>> {
        let rows = sqlx::query(
            r#"
            SELECT event_data
            FROM loan_events
            WHERE loan_id = $1
            ORDER BY event_version ASC
            "#,
        )
        .bind(loan_id.value())
        .fetch_all(&self.pool)
        .await?;

        let mut events = Vec::with_capacity(rows.len());
        for row in rows {
            let event_data: serde_json::Value = row.get("event_data");
            events.push(serde_json::from_value(event_data)?);
        }

        Ok(events)
    }
}
