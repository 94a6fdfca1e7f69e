//! Repository layer for user identity rows.
//!
//! Credential storage (password hashes, sessions) is deliberately absent:
//! authentication happens via signed tokens, and this table only carries the
//! display data an identity resolves to.

use anyhow::{Context, Result};
use sqlx::Row;

use super::CollabRepository;
use crate::models::{User, UserId};

impl CollabRepository {
    pub async fn create_user(&self, username: &str, email: &str) -> Result<User> {
        let row = sqlx::query(
            r#"
            INSERT INTO users (username, email)
            VALUES (?, ?)
            RETURNING id, username, email, created_at
            "#,
        )
        .bind(username)
        .bind(email)
        .fetch_one(&self.pool)
        .await
        .context("Failed to create user")?;

        Ok(row_to_user(row))
    }

    pub async fn get_user(&self, id: UserId) -> Result<Option<User>> {
        let row = sqlx::query("SELECT id, username, email, created_at FROM users WHERE id = ?")
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to look up user")?;

        Ok(row.map(row_to_user))
    }

    pub async fn get_username(&self, id: UserId) -> Result<Option<String>> {
        let row = sqlx::query("SELECT username FROM users WHERE id = ?")
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to look up username")?;

        Ok(row.map(|r| r.get("username")))
    }
}

fn row_to_user(r: sqlx::sqlite::SqliteRow) -> User {
    User {
        id: UserId(r.get("id")),
        username: r.get("username"),
        email: r.get("email"),
        created_at: r.get("created_at"),
    }
}
