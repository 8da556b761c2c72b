use crate::domain::{User, value_objects::UserId};
use crate::ports::user_directory::{Result, UserDirectory as UserDirectoryTrait};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

use super::poisoned;

/// UserDirectoryのインメモリ実装
pub struct UserDirectory {
    users: Mutex<HashMap<UserId, User>>,
}

impl UserDirectory {
    pub fn new() -> Self {
        Self {
            users: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for UserDirectory {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl UserDirectoryTrait for UserDirectory {
    async fn get_user(&self, user_id: UserId) -> Result<Option<User>> {
        let users = self.users.lock().map_err(poisoned)?;
        Ok(users.get(&user_id).cloned())
    }

    async fn save(&self, user: &User) -> Result<bool> {
        let mut users = self.users.lock().map_err(poisoned)?;

        let conflict = users.values().any(|other| {
            other.user_id != user.user_id
                && (other.username == user.username || other.email == user.email)
        });
        if conflict {
            return Ok(false);
        }

        users.insert(user.user_id, user.clone());
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{NewUser, Role, user};
    use chrono::Utc;

    fn new_user(username: &str, email: &str) -> User {
        user::register_user(
            NewUser {
                username: username.to_string(),
                full_name: "Test User".to_string(),
                email: email.to_string(),
                role: Role::Student,
            },
            Utc::now(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_save_and_get_user() {
        let directory = UserDirectory::new();
        let user = new_user("alice", "alice@example.com");

        assert!(directory.save(&user).await.unwrap());
        assert_eq!(directory.get_user(user.user_id).await.unwrap(), Some(user));
        assert_eq!(directory.get_user(UserId::new()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_save_rejects_conflicting_username_or_email() {
        let directory = UserDirectory::new();
        directory
            .save(&new_user("alice", "alice@example.com"))
            .await
            .unwrap();

        assert!(
            !directory
                .save(&new_user("alice", "other@example.com"))
                .await
                .unwrap()
        );
        assert!(
            !directory
                .save(&new_user("bob", "alice@example.com"))
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn test_save_updates_existing_user() {
        let directory = UserDirectory::new();
        let user = new_user("alice", "alice@example.com");
        directory.save(&user).await.unwrap();

        let deactivated = user::deactivate_user(user.clone(), Utc::now());
        assert!(directory.save(&deactivated).await.unwrap());

        let stored = directory.get_user(user.user_id).await.unwrap().unwrap();
        assert!(!stored.active);
    }
}
