use chrono::{DateTime, Utc};

/// 時刻ソースポート
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}
