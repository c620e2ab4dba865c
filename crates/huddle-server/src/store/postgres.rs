use super::{RoomRecord, RoomStore, StoreResult};
use async_trait::async_trait;
use huddle_protocol::RoomCode;
use sqlx::PgPool;

#[derive(Clone)]
pub struct PgRoomStore {
    db: PgPool,
}

impl PgRoomStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl RoomStore for PgRoomStore {
    async fn exists(&self, code: &RoomCode) -> StoreResult<bool> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM rooms WHERE room_code = $1)")
                .bind(code.as_str())
                .fetch_one(&self.db)
                .await?;

        Ok(exists)
    }

    async fn get(&self, code: &RoomCode) -> StoreResult<Option<RoomRecord>> {
        let record = sqlx::query_as::<_, RoomRecord>(
            r#"
            SELECT id, room_code, created_by, created_at
            FROM rooms WHERE room_code = $1
            "#,
        )
        .bind(code.as_str())
        .fetch_optional(&self.db)
        .await?;

        Ok(record)
    }

    async fn insert(&self, record: &RoomRecord) -> StoreResult<bool> {
        // The unique index on room_code arbitrates between concurrent creators
        let result = sqlx::query(
            r#"
            INSERT INTO rooms (id, room_code, created_by, created_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (room_code) DO NOTHING
            "#,
        )
        .bind(record.id)
        .bind(&record.room_code)
        .bind(&record.created_by)
        .bind(record.created_at)
        .execute(&self.db)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn delete(&self, code: &RoomCode) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM rooms WHERE room_code = $1")
            .bind(code.as_str())
            .execute(&self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
