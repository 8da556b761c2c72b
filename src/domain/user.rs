use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::UserId;

/// 利用者の役割
///
/// 貸出上限などのポリシーは役割ごとに決まる。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Librarian,
    Teacher,
    Student,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Librarian => "librarian",
            Role::Teacher => "teacher",
            Role::Student => "student",
        }
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "librarian" => Ok(Role::Librarian),
            "teacher" => Ok(Role::Teacher),
            "student" => Ok(Role::Student),
            _ => Err(format!("Invalid role: {}", s)),
        }
    }
}

/// 利用者
///
/// 貸出ライフサイクルから見ると読み取り専用。役割と有効フラグのみを参照する。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub user_id: UserId,
    pub username: String,
    pub full_name: String,
    pub email: String,
    pub role: Role,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 利用者登録の入力
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewUser {
    pub username: String,
    pub full_name: String,
    pub email: String,
    pub role: Role,
}

/// 利用者バリデーションのエラー
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserValidationError {
    EmptyUsername,
    UsernameTooLong,
    EmptyFullName,
    FullNameTooLong,
    InvalidEmail,
    EmailTooLong,
}

impl std::fmt::Display for UserValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UserValidationError::EmptyUsername => write!(f, "username must not be empty"),
            UserValidationError::UsernameTooLong => {
                write!(f, "username must be at most 255 characters")
            }
            UserValidationError::EmptyFullName => write!(f, "full name must not be empty"),
            UserValidationError::FullNameTooLong => {
                write!(f, "full name must be at most 255 characters")
            }
            UserValidationError::InvalidEmail => write!(f, "email is not valid"),
            UserValidationError::EmailTooLong => {
                write!(f, "email must be at most 255 characters")
            }
        }
    }
}

const MAX_TEXT_LENGTH: usize = 255;

/// 純粋関数：利用者を登録する
///
/// ユーザー名・氏名・メールアドレスは255文字以内。
/// 新規利用者は常に有効状態で作成される。
pub fn register_user(
    new_user: NewUser,
    registered_at: DateTime<Utc>,
) -> Result<User, UserValidationError> {
    let username = new_user.username.trim().to_string();
    let full_name = new_user.full_name.trim().to_string();
    let email = new_user.email.trim().to_string();

    if username.is_empty() {
        return Err(UserValidationError::EmptyUsername);
    }
    if username.chars().count() > MAX_TEXT_LENGTH {
        return Err(UserValidationError::UsernameTooLong);
    }
    if full_name.is_empty() {
        return Err(UserValidationError::EmptyFullName);
    }
    if full_name.chars().count() > MAX_TEXT_LENGTH {
        return Err(UserValidationError::FullNameTooLong);
    }
    if !email.contains('@') || email.starts_with('@') || email.ends_with('@') {
        return Err(UserValidationError::InvalidEmail);
    }
    if email.chars().count() > MAX_TEXT_LENGTH {
        return Err(UserValidationError::EmailTooLong);
    }

    Ok(User {
        user_id: UserId::new(),
        username,
        full_name,
        email,
        role: new_user.role,
        active: true,
        created_at: registered_at,
        updated_at: registered_at,
    })
}

/// 純粋関数：利用者を無効化する
pub fn deactivate_user(user: User, deactivated_at: DateTime<Utc>) -> User {
    User {
        active: false,
        updated_at: deactivated_at,
        ..user
    }
}
