use crate::domain::{User, value_objects::UserId};
use async_trait::async_trait;

pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// 利用者ディレクトリポート
///
/// 貸出ライフサイクルはUserIDから役割と有効フラグだけを参照する。
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// IDで利用者を取得する
    async fn get_user(&self, user_id: UserId) -> Result<Option<User>>;

    /// 利用者を保存する（upsert）
    ///
    /// 別の利用者が同じユーザー名またはメールアドレスを使っている場合は`false`。
    async fn save(&self, user: &User) -> Result<bool>;
}
