use std::collections::HashMap;

use anyhow::Context;
use async_trait::async_trait;
use sqlx::PgPool;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::auth::repo_types::{NewUser, User};
use crate::error::AppError;

pub const EMAIL_TAKEN: &str = "Email already registered";
pub const USERNAME_TAKEN: &str = "Username already taken";
pub const HANDLE_TAKEN: &str = "Handle already taken";

#[async_trait]
pub trait UserRepo: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>>;
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>>;
    async fn find_by_username(&self, username: &str) -> anyhow::Result<Option<User>>;
    async fn find_by_handle(&self, handle: &str) -> anyhow::Result<Option<User>>;
    async fn find_by_verification_token(&self, token: &str) -> anyhow::Result<Option<User>>;
    /// Every user, ordered by username.
    async fn list_all(&self) -> anyhow::Result<Vec<User>>;

    /// Insert a user. A duplicate email, username or handle is a
    /// `Conflict`, whatever the caller checked beforehand.
    async fn create(&self, new: NewUser) -> Result<User, AppError>;

    /// Set `verified` and clear the verification token.
    async fn mark_verified(&self, id: Uuid) -> anyhow::Result<()>;
    async fn update_password(&self, id: Uuid, password_hash: &str) -> anyhow::Result<()>;
}

const USER_COLUMNS: &str = "id, username, email, handle, password_hash, verified, \
                            verification_token, avatar, created_at";

#[derive(Clone)]
pub struct PgUserRepo {
    db: PgPool,
}

impl PgUserRepo {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    async fn find_by(&self, column: &str, value: &str) -> anyhow::Result<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE {column} = $1");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(value)
            .fetch_optional(&self.db)
            .await
            .with_context(|| format!("find user by {column}"))?;
        Ok(user)
    }
}

#[async_trait]
impl UserRepo for PgUserRepo {
    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(&self.db)
            .await
            .context("find user by id")?;
        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        self.find_by("email", email).await
    }

    async fn find_by_username(&self, username: &str) -> anyhow::Result<Option<User>> {
        self.find_by("username", username).await
    }

    async fn find_by_handle(&self, handle: &str) -> anyhow::Result<Option<User>> {
        self.find_by("handle", handle).await
    }

    async fn find_by_verification_token(&self, token: &str) -> anyhow::Result<Option<User>> {
        self.find_by("verification_token", token).await
    }

    async fn list_all(&self) -> anyhow::Result<Vec<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users ORDER BY username");
        let users = sqlx::query_as::<_, User>(&sql)
            .fetch_all(&self.db)
            .await
            .context("list users")?;
        Ok(users)
    }

    async fn create(&self, new: NewUser) -> Result<User, AppError> {
        let sql = format!(
            r#"
            INSERT INTO users (username, email, handle, password_hash, verification_token)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {USER_COLUMNS}
            "#
        );
        let res = sqlx::query_as::<_, User>(&sql)
            .bind(&new.username)
            .bind(&new.email)
            .bind(&new.handle)
            .bind(&new.password_hash)
            .bind(&new.verification_token)
            .fetch_one(&self.db)
            .await;

        match res {
            Ok(user) => Ok(user),
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                let message = match db_err.constraint() {
                    Some(c) if c.contains("username") => USERNAME_TAKEN,
                    Some(c) if c.contains("handle") => HANDLE_TAKEN,
                    _ => EMAIL_TAKEN,
                };
                Err(AppError::Conflict(message.into()))
            }
            Err(e) => Err(anyhow::Error::new(e).context("insert user").into()),
        }
    }

    async fn mark_verified(&self, id: Uuid) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            UPDATE users
               SET verified = TRUE, verification_token = NULL
             WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(&self.db)
        .await
        .context("mark user verified")?;
        Ok(())
    }

    async fn update_password(&self, id: Uuid, password_hash: &str) -> anyhow::Result<()> {
        sqlx::query("UPDATE users SET password_hash = $2 WHERE id = $1")
            .bind(id)
            .bind(password_hash)
            .execute(&self.db)
            .await
            .context("update user password")?;
        Ok(())
    }
}

/// Process-local user store for running without a database.
#[derive(Default)]
pub struct MemoryUserRepo {
    users: RwLock<HashMap<Uuid, User>>,
}

impl MemoryUserRepo {
    pub fn new() -> Self {
        Self::default()
    }

    async fn find_where<F>(&self, pred: F) -> Option<User>
    where
        F: Fn(&User) -> bool,
    {
        self.users.read().await.values().find(|u| pred(*u)).cloned()
    }
}

#[async_trait]
impl UserRepo for MemoryUserRepo {
    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        Ok(self.users.read().await.get(&id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        Ok(self.find_where(|u| u.email == email).await)
    }

    async fn find_by_username(&self, username: &str) -> anyhow::Result<Option<User>> {
        Ok(self.find_where(|u| u.username == username).await)
    }

    async fn find_by_handle(&self, handle: &str) -> anyhow::Result<Option<User>> {
        Ok(self.find_where(|u| u.handle == handle).await)
    }

    async fn find_by_verification_token(&self, token: &str) -> anyhow::Result<Option<User>> {
        Ok(self
            .find_where(|u| u.verification_token.as_deref() == Some(token))
            .await)
    }

    async fn list_all(&self) -> anyhow::Result<Vec<User>> {
        let mut users: Vec<User> = self.users.read().await.values().cloned().collect();
        users.sort_by(|a, b| a.username.cmp(&b.username));
        Ok(users)
    }

    async fn create(&self, new: NewUser) -> Result<User, AppError> {
        let mut users = self.users.write().await;
        if users.values().any(|u| u.email == new.email) {
            return Err(AppError::Conflict(EMAIL_TAKEN.into()));
        }
        if users.values().any(|u| u.username == new.username) {
            return Err(AppError::Conflict(USERNAME_TAKEN.into()));
        }
        if users.values().any(|u| u.handle == new.handle) {
            return Err(AppError::Conflict(HANDLE_TAKEN.into()));
        }

        let user = User {
            id: Uuid::new_v4(),
            username: new.username,
            email: new.email,
            handle: new.handle,
            password_hash: new.password_hash,
            verified: false,
            verification_token: Some(new.verification_token),
            avatar: None,
            created_at: OffsetDateTime::now_utc(),
        };
        users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn mark_verified(&self, id: Uuid) -> anyhow::Result<()> {
        if let Some(user) = self.users.write().await.get_mut(&id) {
            user.verified = true;
            user.verification_token = None;
        }
        Ok(())
    }

    async fn update_password(&self, id: Uuid, password_hash: &str) -> anyhow::Result<()> {
        if let Some(user) = self.users.write().await.get_mut(&id) {
            user.password_hash = password_hash.to_string();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_user(username: &str, email: &str, handle: &str) -> NewUser {
        NewUser {
            username: username.into(),
            email: email.into(),
            handle: handle.into(),
            password_hash: "hash".into(),
            verification_token: format!("token-{username}"),
        }
    }

    #[tokio::test]
    async fn memory_repo_enforces_uniqueness_in_order() {
        let repo = MemoryUserRepo::new();
        repo.create(new_user("ann", "ann@example.com", "ann"))
            .await
            .expect("first insert");

        let err = repo
            .create(new_user("ann", "ann@example.com", "ann"))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), EMAIL_TAKEN);

        let err = repo
            .create(new_user("ann", "other@example.com", "other"))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), USERNAME_TAKEN);

        let err = repo
            .create(new_user("bob", "bob@example.com", "ann"))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), HANDLE_TAKEN);
    }

    #[tokio::test]
    async fn list_all_is_ordered_by_username() {
        let repo = MemoryUserRepo::new();
        for name in ["cat", "ann", "bob"] {
            repo.create(new_user(name, &format!("{name}@example.com"), name))
                .await
                .unwrap();
        }
        let names: Vec<String> = repo
            .list_all()
            .await
            .unwrap()
            .into_iter()
            .map(|u| u.username)
            .collect();
        assert_eq!(names, vec!["ann", "bob", "cat"]);
    }

    #[tokio::test]
    async fn mark_verified_clears_token() {
        let repo = MemoryUserRepo::new();
        let user = repo
            .create(new_user("cat", "cat@example.com", "cat"))
            .await
            .unwrap();
        assert!(!user.verified);

        let found = repo
            .find_by_verification_token("token-cat")
            .await
            .unwrap()
            .expect("token lookup");
        assert_eq!(found.id, user.id);

        repo.mark_verified(user.id).await.unwrap();
        let user = repo.find_by_id(user.id).await.unwrap().unwrap();
        assert!(user.verified);
        assert!(user.verification_token.is_none());
        assert!(repo
            .find_by_verification_token("token-cat")
            .await
            .unwrap()
            .is_none());
    }
}
