use anyhow::{Context, Result};
use sqlx::Row;

use super::CollabRepository;
use crate::models::{Room, RoomId, UserId};

impl CollabRepository {
    /// Create a room and enroll the owner as its first member, atomically.
    pub async fn create_room(
        &self,
        name: &str,
        owner_id: UserId,
        language: Option<&str>,
    ) -> Result<Room> {
        let mut tx = self
            .pool
            .begin()
            .await
            .context("Failed to begin transaction")?;

        let row = sqlx::query(
            r#"
            INSERT INTO rooms (name, owner_id, language)
            VALUES (?, ?, COALESCE(?, 'javascript'))
            RETURNING id, name, owner_id, language, code, video_enabled, created_at
            "#,
        )
        .bind(name)
        .bind(owner_id.0)
        .bind(language)
        .fetch_one(&mut *tx)
        .await
        .context("Failed to create room")?;

        let room = row_to_room(row);

        sqlx::query("INSERT INTO room_members (room_id, user_id) VALUES (?, ?)")
            .bind(room.id.0)
            .bind(owner_id.0)
            .execute(&mut *tx)
            .await
            .context("Failed to add owner membership")?;

        tx.commit().await.context("Failed to commit room creation")?;

        Ok(room)
    }

    pub async fn get_room(&self, id: RoomId) -> Result<Option<Room>> {
        let row = sqlx::query(
            "SELECT id, name, owner_id, language, code, video_enabled, created_at FROM rooms WHERE id = ?",
        )
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to look up room")?;

        Ok(row.map(row_to_room))
    }

    pub async fn room_name_exists(&self, name: &str) -> Result<bool> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM rooms WHERE name = ?")
            .bind(name)
            .fetch_one(&self.pool)
            .await
            .context("Failed to check room name")?;

        Ok(count > 0)
    }

    pub async fn list_rooms(&self) -> Result<Vec<Room>> {
        let rows = sqlx::query(
            "SELECT id, name, owner_id, language, code, video_enabled, created_at FROM rooms ORDER BY created_at DESC, id DESC",
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to list rooms")?;

        Ok(rows.into_iter().map(row_to_room).collect())
    }

    /// Rooms the given user is enrolled in, newest first.
    pub async fn list_member_rooms(&self, user_id: UserId) -> Result<Vec<Room>> {
        let rows = sqlx::query(
            r#"
            SELECT r.id, r.name, r.owner_id, r.language, r.code, r.video_enabled, r.created_at
            FROM rooms r
            JOIN room_members rm ON rm.room_id = r.id
            WHERE rm.user_id = ?
            ORDER BY r.created_at DESC, r.id DESC
            "#,
        )
        .bind(user_id.0)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list member rooms")?;

        Ok(rows.into_iter().map(row_to_room).collect())
    }

    /// Returns false if the room did not exist.
    pub async fn delete_room(&self, id: RoomId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM rooms WHERE id = ?")
            .bind(id.0)
            .execute(&self.pool)
            .await
            .context("Failed to delete room")?;

        Ok(result.rows_affected() > 0)
    }

    /// Replace the room's code buffer. Last write wins; returns false if the
    /// room does not exist.
    pub async fn set_code(&self, id: RoomId, code: &str) -> Result<bool> {
        let result = sqlx::query("UPDATE rooms SET code = ? WHERE id = ?")
            .bind(code)
            .bind(id.0)
            .execute(&self.pool)
            .await
            .context("Failed to update room code")?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn set_language(&self, id: RoomId, language: &str) -> Result<bool> {
        let result = sqlx::query("UPDATE rooms SET language = ? WHERE id = ?")
            .bind(language)
            .bind(id.0)
            .execute(&self.pool)
            .await
            .context("Failed to update room language")?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn set_video_enabled(&self, id: RoomId, enabled: bool) -> Result<bool> {
        let result = sqlx::query("UPDATE rooms SET video_enabled = ? WHERE id = ?")
            .bind(enabled as i64)
            .bind(id.0)
            .execute(&self.pool)
            .await
            .context("Failed to update room video flag")?;

        Ok(result.rows_affected() > 0)
    }
}

fn row_to_room(r: sqlx::sqlite::SqliteRow) -> Room {
    Room {
        id: RoomId(r.get("id")),
        name: r.get("name"),
        owner_id: UserId(r.get("owner_id")),
        language: r.get("language"),
        code: r.get("code"),
        video_enabled: r.get::<i64, _>("video_enabled") != 0,
        created_at: r.get("created_at"),
    }
}

#[cfg(test)]
mod tests {
    use crate::models::RoomId;
    use crate::repository::test_helpers;

    #[tokio::test]
    async fn create_room_enrolls_owner() {
        let repo = test_helpers::test_repository().await;
        let owner = repo.create_user("alice", "alice@example.com").await.unwrap();

        let room = repo.create_room("rust-study", owner.id, None).await.unwrap();
        assert_eq!(room.name, "rust-study");
        assert_eq!(room.language, "javascript");
        assert_eq!(room.code, "");
        assert!(!room.video_enabled);

        assert!(repo.is_member(room.id, owner.id).await.unwrap());
    }

    #[tokio::test]
    async fn create_room_with_language() {
        let repo = test_helpers::test_repository().await;
        let owner = repo.create_user("alice", "alice@example.com").await.unwrap();

        let room = repo
            .create_room("py-room", owner.id, Some("python"))
            .await
            .unwrap();
        assert_eq!(room.language, "python");
    }

    #[tokio::test]
    async fn duplicate_room_name_rejected() {
        let repo = test_helpers::test_repository().await;
        let owner = repo.create_user("alice", "alice@example.com").await.unwrap();

        repo.create_room("shared", owner.id, None).await.unwrap();
        assert!(repo.room_name_exists("shared").await.unwrap());
        assert!(repo.create_room("shared", owner.id, None).await.is_err());
    }

    #[tokio::test]
    async fn update_code_and_language() {
        let repo = test_helpers::test_repository().await;
        let owner = repo.create_user("alice", "alice@example.com").await.unwrap();
        let room = repo.create_room("room", owner.id, None).await.unwrap();

        assert!(repo.set_code(room.id, "fn main() {}").await.unwrap());
        assert!(repo.set_language(room.id, "rust").await.unwrap());
        assert!(repo.set_video_enabled(room.id, true).await.unwrap());

        let found = repo.get_room(room.id).await.unwrap().unwrap();
        assert_eq!(found.code, "fn main() {}");
        assert_eq!(found.language, "rust");
        assert!(found.video_enabled);
    }

    #[tokio::test]
    async fn updates_to_missing_room_report_absence() {
        let repo = test_helpers::test_repository().await;

        assert!(!repo.set_code(RoomId(404), "x").await.unwrap());
        assert!(!repo.set_language(RoomId(404), "rust").await.unwrap());
        assert!(!repo.delete_room(RoomId(404)).await.unwrap());
    }

    #[tokio::test]
    async fn delete_room_cascades_membership() {
        let repo = test_helpers::test_repository().await;
        let owner = repo.create_user("alice", "alice@example.com").await.unwrap();
        let room = repo.create_room("room", owner.id, None).await.unwrap();

        assert!(repo.delete_room(room.id).await.unwrap());
        assert!(repo.get_room(room.id).await.unwrap().is_none());
        assert!(!repo.is_member(room.id, owner.id).await.unwrap());
    }

    #[tokio::test]
    async fn member_room_listing() {
        let repo = test_helpers::test_repository().await;
        let alice = repo.create_user("alice", "alice@example.com").await.unwrap();
        let bob = repo.create_user("bob", "bob@example.com").await.unwrap();

        let a = repo.create_room("alpha", alice.id, None).await.unwrap();
        repo.create_room("beta", bob.id, None).await.unwrap();
        repo.ensure_member(a.id, bob.id).await.unwrap();

        let all = repo.list_rooms().await.unwrap();
        assert_eq!(all.len(), 2);

        let bobs = repo.list_member_rooms(bob.id).await.unwrap();
        let names: Vec<_> = bobs.iter().map(|r| r.name.as_str()).collect();
        assert!(names.contains(&"alpha"));
        assert!(names.contains(&"beta"));

        let alices = repo.list_member_rooms(alice.id).await.unwrap();
        assert_eq!(alices.len(), 1);
        assert_eq!(alices[0].name, "alpha");
    }
}
