use super::{RoomRecord, RoomStore, StoreResult};
use async_trait::async_trait;
use huddle_protocol::RoomCode;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Process-local room store, used when no database is configured
#[derive(Default)]
pub struct MemoryRoomStore {
    rooms: RwLock<HashMap<String, RoomRecord>>,
}

impl MemoryRoomStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RoomStore for MemoryRoomStore {
    async fn exists(&self, code: &RoomCode) -> StoreResult<bool> {
        Ok(self.rooms.read().await.contains_key(code.as_str()))
    }

    async fn get(&self, code: &RoomCode) -> StoreResult<Option<RoomRecord>> {
        Ok(self.rooms.read().await.get(code.as_str()).cloned())
    }

    async fn insert(&self, record: &RoomRecord) -> StoreResult<bool> {
        let mut rooms = self.rooms.write().await;
        if rooms.contains_key(&record.room_code) {
            return Ok(false);
        }
        rooms.insert(record.room_code.clone(), record.clone());
        Ok(true)
    }

    async fn delete(&self, code: &RoomCode) -> StoreResult<bool> {
        Ok(self.rooms.write().await.remove(code.as_str()).is_some())
    }
}
