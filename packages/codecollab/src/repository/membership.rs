use anyhow::{Context, Result};
use sqlx::Row;

use super::CollabRepository;
use crate::models::{RoomId, RoomUser, UserId};

impl CollabRepository {
    /// Enroll a user in a room. Idempotent: joining a room you already belong
    /// to leaves the original joined_at untouched.
    pub async fn ensure_member(&self, room_id: RoomId, user_id: UserId) -> Result<()> {
        sqlx::query("INSERT OR IGNORE INTO room_members (room_id, user_id) VALUES (?, ?)")
            .bind(room_id.0)
            .bind(user_id.0)
            .execute(&self.pool)
            .await
            .context("Failed to record room membership")?;

        Ok(())
    }

    pub async fn is_member(&self, room_id: RoomId, user_id: UserId) -> Result<bool> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM room_members WHERE room_id = ? AND user_id = ?",
        )
        .bind(room_id.0)
        .bind(user_id.0)
        .fetch_one(&self.pool)
        .await
        .context("Failed to check room membership")?;

        Ok(count > 0)
    }

    /// Returns false if the user was not a member.
    pub async fn remove_member(&self, room_id: RoomId, user_id: UserId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM room_members WHERE room_id = ? AND user_id = ?")
            .bind(room_id.0)
            .bind(user_id.0)
            .execute(&self.pool)
            .await
            .context("Failed to remove room membership")?;

        Ok(result.rows_affected() > 0)
    }

    /// Members of a room in join order (ties broken by user id).
    pub async fn list_members(&self, room_id: RoomId) -> Result<Vec<RoomUser>> {
        let rows = sqlx::query(
            r#"
            SELECT u.id, u.username
            FROM room_members rm
            JOIN users u ON u.id = rm.user_id
            WHERE rm.room_id = ?
            ORDER BY rm.joined_at ASC, rm.user_id ASC
            "#,
        )
        .bind(room_id.0)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list room members")?;

        Ok(rows
            .into_iter()
            .map(|r| RoomUser {
                id: UserId(r.get("id")),
                username: r.get("username"),
            })
            .collect())
    }
}
