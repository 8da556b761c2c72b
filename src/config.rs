use crate::domain::{LoanDurations, LoanLimits, LoanPolicy, policy::PolicyError};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// 設定読み込みのエラー
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 環境変数の値を解釈できない
    #[error("{name} has an invalid value: {value:?}")]
    InvalidValue { name: &'static str, value: String },

    /// 貸出ポリシーとして不正な組み合わせ
    #[error("invalid loan policy: {0}")]
    InvalidPolicy(PolicyError),
}

/// アプリケーション設定
///
/// 環境変数から読み込む。未設定の項目は既定値を使う。
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// 未設定の場合はインメモリのアダプターで起動する
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub port: u16,
    pub overdue_sweep_interval: Duration,
    pub policy: LoanPolicy,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// 任意の参照関数から設定を組み立てる
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = LoanLimits::default();
        let limits = LoanLimits {
            student: parse_or(&lookup, "LOAN_LIMIT_STUDENT", defaults.student)?,
            teacher: parse_or(&lookup, "LOAN_LIMIT_TEACHER", defaults.teacher)?,
            librarian: parse_or(&lookup, "LOAN_LIMIT_LIBRARIAN", defaults.librarian)?,
        };

        let defaults = LoanDurations::default();
        let durations = LoanDurations {
            student: parse_or(&lookup, "LOAN_DURATION_DAYS_STUDENT", defaults.student)?,
            teacher: parse_or(&lookup, "LOAN_DURATION_DAYS_TEACHER", defaults.teacher)?,
            librarian: parse_or(&lookup, "LOAN_DURATION_DAYS_LIBRARIAN", defaults.librarian)?,
        };

        let policy = LoanPolicy::new(
            limits,
            durations,
            parse_or(&lookup, "LOAN_EXTENSION_DAYS", 7)?,
            parse_or(&lookup, "LOAN_MAX_EXTENSIONS", 2)?,
        )
        .map_err(ConfigError::InvalidPolicy)?;

        let sweep_secs: u64 = parse_or(&lookup, "OVERDUE_SWEEP_INTERVAL_SECS", 3600)?;
        if sweep_secs == 0 {
            return Err(ConfigError::InvalidValue {
                name: "OVERDUE_SWEEP_INTERVAL_SECS",
                value: sweep_secs.to_string(),
            });
        }

        Ok(Self {
            database_url: lookup("DATABASE_URL").filter(|url| !url.trim().is_empty()),
            database_max_connections: parse_or(&lookup, "DATABASE_MAX_CONNECTIONS", 5)?,
            port: parse_or(&lookup, "PORT", 3000)?,
            overdue_sweep_interval: Duration::from_secs(sweep_secs),
            policy,
        })
    }
}

fn parse_or<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(name) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue { name, value }),
        None => Ok(default),
    }
}
