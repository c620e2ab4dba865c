use crate::error::{AppError, Result};
use crate::rooms::RoomManager;
use crate::store::{RoomRecord, RoomStore};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use huddle_protocol::RoomCode;
use rand::Rng;
use std::sync::Arc;
use uuid::Uuid;

/// Attempts before code generation gives up
const MAX_ATTEMPTS: usize = 1000;

/// A freshly generated code, held back from other generators until dropped
pub struct CodeReservation {
    code: RoomCode,
    reserved: Arc<DashMap<RoomCode, ()>>,
}

impl CodeReservation {
    pub fn code(&self) -> &RoomCode {
        &self.code
    }
}

impl Drop for CodeReservation {
    fn drop(&mut self) {
        self.reserved.remove(&self.code);
    }
}

#[derive(Clone)]
pub struct RoomService {
    store: Arc<dyn RoomStore>,
    rooms: Arc<RoomManager>,
    reserved: Arc<DashMap<RoomCode, ()>>,
}

impl RoomService {
    pub fn new(store: Arc<dyn RoomStore>, rooms: Arc<RoomManager>) -> Self {
        Self {
            store,
            rooms,
            reserved: Arc::new(DashMap::new()),
        }
    }

    /// Pick a code no stored room, closed room or in-flight create is using.
    ///
    /// The code stays reserved in this process for as long as the returned
    /// reservation lives, so parallel callers never receive the same one.
    pub async fn generate_unique_code(&self, length: usize) -> Result<CodeReservation> {
        for _ in 0..MAX_ATTEMPTS {
            let code = RoomCode::parse(&random_code(length))
                .map_err(|e| AppError::BadRequest(e.to_string()))?;

            if self.rooms.is_closed(&code) {
                continue;
            }

            match self.reserved.entry(code.clone()) {
                Entry::Occupied(_) => continue,
                Entry::Vacant(slot) => {
                    slot.insert(());
                }
            }
            let reservation = CodeReservation {
                code,
                reserved: self.reserved.clone(),
            };

            if self.store.exists(&reservation.code).await? {
                continue;
            }
            return Ok(reservation);
        }

        Err(AppError::Internal(anyhow::anyhow!(
            "No free room code of length {} after {} attempts",
            length,
            MAX_ATTEMPTS
        )))
    }

    /// Allocate a new room for `creator`
    pub async fn create(&self, creator: Uuid) -> Result<RoomRecord> {
        for _ in 0..MAX_ATTEMPTS {
            let reservation = self.generate_unique_code(RoomCode::DEFAULT_LENGTH).await?;
            let record = RoomRecord::new(reservation.code(), creator.to_string());

            if self.store.insert(&record).await? {
                tracing::info!(room_code = %record.room_code, %creator, "Room created");
                return Ok(record);
            }

            // Another server instance inserted the same code first
            tracing::warn!(room_code = %record.room_code, "Room code taken on insert, retrying");
        }

        Err(AppError::Conflict("Could not allocate a room code".to_string()))
    }

    /// Whether `raw_code` names a room that can still be joined
    pub async fn verify(&self, raw_code: &str) -> Result<bool> {
        let code = RoomCode::parse(raw_code).map_err(|e| AppError::BadRequest(e.to_string()))?;

        if self.rooms.is_closed(&code) {
            return Ok(false);
        }
        Ok(self.store.exists(&code).await?)
    }
}

fn random_code(length: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..length)
        .map(|_| RoomCode::ALPHABET[rng.gen_range(0..RoomCode::ALPHABET.len())] as char)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{DiskFileStore, MemoryRoomStore};
    use crate::ws::connections::ConnectionManager;
    use huddle_protocol::ConnectionId;
    use std::collections::HashSet;

    fn service() -> (RoomService, Arc<RoomManager>, Arc<MemoryRoomStore>, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(MemoryRoomStore::new());
        let manager = Arc::new(RoomManager::new(
            Arc::new(ConnectionManager::new()),
            store.clone(),
            Arc::new(DiskFileStore::new(dir.path())),
        ));
        (RoomService::new(store.clone(), manager.clone()), manager, store, dir)
    }

    #[test]
    fn generated_codes_use_alphabet() {
        let code = random_code(RoomCode::DEFAULT_LENGTH);
        assert_eq!(code.len(), 6);
        assert!(code.bytes().all(|b| RoomCode::ALPHABET.contains(&b)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn parallel_generation_never_collides() {
        let (service, _, _, _dir) = service();

        // Single-character codes leave 36 possibilities, so collisions are
        // near certain without reservations
        let handles: Vec<_> = (0..36)
            .map(|_| {
                let service = service.clone();
                tokio::spawn(async move { service.generate_unique_code(1).await.unwrap() })
            })
            .collect();

        let mut reservations = Vec::new();
        for handle in handles {
            reservations.push(handle.await.unwrap());
        }

        let unique: HashSet<_> = reservations.iter().map(|r| r.code().clone()).collect();
        assert_eq!(unique.len(), 36);
    }

    #[tokio::test]
    async fn generation_skips_stored_codes() {
        let (service, _, store, _dir) = service();
        for c in RoomCode::ALPHABET.iter().skip(1) {
            let code = RoomCode::parse(&(*c as char).to_string()).unwrap();
            store.insert(&RoomRecord::new(&code, "x")).await.unwrap();
        }

        let reservation = service.generate_unique_code(1).await.unwrap();
        assert_eq!(reservation.code().as_str(), "A");
    }

    #[tokio::test]
    async fn zero_length_is_rejected() {
        let (service, _, _, _dir) = service();
        assert!(matches!(
            service.generate_unique_code(0).await,
            Err(AppError::BadRequest(_))
        ));
    }

    #[tokio::test]
    async fn created_room_verifies_until_closed() {
        let (service, manager, _, _dir) = service();
        let creator = Uuid::new_v4();

        let record = service.create(creator).await.unwrap();
        assert_eq!(record.created_by, creator.to_string());
        assert!(service.verify(&record.room_code).await.unwrap());
        assert!(!service.verify("ZZZZZZ0").await.unwrap());

        let conn = ConnectionId::new();
        manager.join(conn, &record.room_code).await.unwrap();
        manager.leave(conn, &record.room_code).await;

        assert!(!service.verify(&record.room_code).await.unwrap());
    }
}
