use crate::domain::{self, NewUser, User, value_objects::UserId};

use super::errors::{Result, UserApplicationError};
use crate::application::ServiceDependencies;

/// 利用者を登録する
pub async fn register_user(deps: &ServiceDependencies, new_user: NewUser) -> Result<User> {
    let user = domain::user::register_user(new_user, deps.clock.now())
        .map_err(UserApplicationError::Validation)?;

    let saved = deps
        .user_directory
        .save(&user)
        .await
        .map_err(UserApplicationError::UserDirectoryError)?;

    if !saved {
        return Err(UserApplicationError::DuplicateUser);
    }

    tracing::info!(
        user_id = %user.user_id.value(),
        role = user.role.as_str(),
        "User registered"
    );

    Ok(user)
}

/// IDで利用者を取得する
pub async fn get_user(deps: &ServiceDependencies, user_id: UserId) -> Result<User> {
    deps.user_directory
        .get_user(user_id)
        .await
        .map_err(UserApplicationError::UserDirectoryError)?
        .ok_or(UserApplicationError::UserNotFound)
}

/// 利用者を無効化する
///
/// 既存の貸出はそのまま残り、新しい貸出だけが拒否される。
pub async fn deactivate_user(deps: &ServiceDependencies, user_id: UserId) -> Result<User> {
    let user = get_user(deps, user_id).await?;
    if !user.active {
        return Ok(user);
    }

    let user = domain::user::deactivate_user(user, deps.clock.now());
    deps.user_directory
        .save(&user)
        .await
        .map_err(UserApplicationError::UserDirectoryError)?;

    tracing::info!(user_id = %user_id.value(), "User deactivated");

    Ok(user)
}
