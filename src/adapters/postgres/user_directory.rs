use crate::domain::{Role, User, value_objects::UserId};
use crate::ports::user_directory::{Result, UserDirectory as UserDirectoryTrait};
use async_trait::async_trait;
use sqlx::{PgPool, Row, postgres::PgRow};
use std::str::FromStr;

use super::invalid_data;

fn map_row_to_user(row: &PgRow) -> Result<User> {
    let role_str: &str = row.get("role");
    let role = Role::from_str(role_str).map_err(invalid_data)?;

    Ok(User {
        user_id: UserId::from_uuid(row.get("user_id")),
        username: row.get("username"),
        full_name: row.get("full_name"),
        email: row.get("email"),
        role,
        active: row.get("active"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

/// UserDirectoryのPostgreSQL実装
pub struct UserDirectory {
    pool: PgPool,
}

impl UserDirectory {
    /// PostgreSQLコネクションプールから新しいUserDirectoryを作成
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserDirectoryTrait for UserDirectory {
    async fn get_user(&self, user_id: UserId) -> Result<Option<User>> {
        let row = sqlx::query(
            r#"
            SELECT
                user_id,
                username,
                full_name,
                email,
                role,
                active,
                created_at,
                updated_at
            FROM users
            WHERE user_id = $1
            "#,
        )
        .bind(user_id.value())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(map_row_to_user).transpose()
    }

    /// 利用者を保存（upsert）
    ///
    /// ユーザー名・メールアドレスの一意制約違反は`false`として返す。
    async fn save(&self, user: &User) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO users (
                user_id,
                username,
                full_name,
                email,
                role,
                active,
                created_at,
                updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (user_id)
            DO UPDATE SET
                username = EXCLUDED.username,
                full_name = EXCLUDED.full_name,
                email = EXCLUDED.email,
                role = EXCLUDED.role,
                active = EXCLUDED.active,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(user.user_id.value())
        .bind(&user.username)
        .bind(&user.full_name)
        .bind(&user.email)
        .bind(user.role.as_str())
        .bind(user.active)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(true),
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}
