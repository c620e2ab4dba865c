use super::{
    LeaveOutcome, RoomError, RoomLifecycle, RoomPhase, RoomTable, SignalingEnvelope,
    SignalingRelay,
};
use crate::store::{FileStore, RoomStore, StoredFile};
use crate::ws::connections::ConnectionManager;
use chrono::Utc;
use huddle_protocol::{CanvasPoint, ConnectionId, RoomCode, ServerMessage};
use std::sync::Arc;
use uuid::Uuid;

/// Entry point for everything a connection does with rooms.
///
/// Membership changes happen inside the table's critical section; every
/// notification and teardown side effect runs after it has been released.
pub struct RoomManager {
    table: RoomTable,
    relay: SignalingRelay,
    lifecycle: RoomLifecycle,
    connections: Arc<ConnectionManager>,
    room_store: Arc<dyn RoomStore>,
}

impl RoomManager {
    pub fn new(
        connections: Arc<ConnectionManager>,
        room_store: Arc<dyn RoomStore>,
        file_store: Arc<dyn FileStore>,
    ) -> Self {
        Self {
            table: RoomTable::new(),
            relay: SignalingRelay::new(connections.clone()),
            lifecycle: RoomLifecycle::new(room_store.clone(), file_store),
            connections,
            room_store,
        }
    }

    /// Join `raw_code`, answer the caller with the other members and tell them
    /// about the newcomer.
    ///
    /// A code that is not open yet may only be joined when the room store has
    /// a record for it. Closed codes are refused for good.
    pub async fn join(
        &self,
        conn: ConnectionId,
        raw_code: &str,
    ) -> Result<Vec<ConnectionId>, RoomError> {
        let code = RoomCode::parse(raw_code)?;

        match self.table.phase(&code) {
            RoomPhase::Open => {}
            RoomPhase::Closed => return Err(RoomError::Closed(code)),
            RoomPhase::Unborn => {
                if !self.room_store.exists(&code).await? {
                    return Err(RoomError::NotFound(code));
                }
            }
        }

        let outcome = self.table.join(&code, conn)?;

        if outcome.opened {
            self.lifecycle.room_opened(&code);
        }
        if let Some(previous) = &outcome.previous_room {
            self.leave_room(conn, previous).await;
        }

        self.connections
            .send_to_connection(
                conn,
                &ServerMessage::AllUsers {
                    users: outcome.others.clone(),
                },
            )
            .await;
        self.connections
            .send_to_many(
                &outcome.others,
                &ServerMessage::UserJoined {
                    connection_id: conn,
                },
            )
            .await;

        tracing::info!(room_code = %code, connection_id = %conn, members = outcome.others.len() + 1, "Joined room");

        Ok(outcome.others)
    }

    /// Leave `raw_code`. Unknown rooms, non-members and malformed codes are
    /// ignored.
    pub async fn leave(&self, conn: ConnectionId, raw_code: &str) -> LeaveOutcome {
        match RoomCode::parse(raw_code) {
            Ok(code) => self.leave_room(conn, &code).await,
            Err(e) => {
                tracing::debug!(connection_id = %conn, "Ignoring leave: {}", e);
                LeaveOutcome::NotMember
            }
        }
    }

    /// Leave whatever room the connection is in. Called on every disconnect.
    pub async fn disconnect(&self, conn: ConnectionId) {
        while let Some(code) = self.table.current_room(conn) {
            self.leave_room(conn, &code).await;
        }
    }

    pub async fn relay(&self, envelope: SignalingEnvelope) {
        self.relay.relay(envelope).await;
    }

    /// Post a chat line to everyone in the room, the sender included
    pub async fn broadcast_chat(
        &self,
        conn: ConnectionId,
        sender_id: Uuid,
        raw_code: &str,
        message: String,
    ) -> Result<(), RoomError> {
        let (code, members) = self.members_seen_by(conn, raw_code)?;
        self.connections
            .send_to_many(
                &members,
                &ServerMessage::RoomChat {
                    room_code: code,
                    sender_id,
                    message,
                    sent_at: Utc::now(),
                },
            )
            .await;

        Ok(())
    }

    /// Share a whiteboard point with everyone in the room, the sender included
    pub async fn broadcast_canvas(
        &self,
        conn: ConnectionId,
        raw_code: &str,
        point: CanvasPoint,
    ) -> Result<(), RoomError> {
        let (code, members) = self.members_seen_by(conn, raw_code)?;
        self.connections
            .send_to_many(
                &members,
                &ServerMessage::CanvasData {
                    room_code: code,
                    from: conn,
                    point,
                },
            )
            .await;

        Ok(())
    }

    /// Members of `raw_code`, provided `conn` is one of them
    fn members_seen_by(
        &self,
        conn: ConnectionId,
        raw_code: &str,
    ) -> Result<(RoomCode, Vec<ConnectionId>), RoomError> {
        let code = RoomCode::parse(raw_code)?;
        if !self.table.is_member(&code, conn) {
            return Err(RoomError::NotMember(code));
        }
        let members = self.table.members(&code);
        Ok((code, members))
    }

    pub fn phase(&self, code: &RoomCode) -> RoomPhase {
        self.table.phase(code)
    }

    pub fn ensure_open(&self, code: &RoomCode) -> Result<(), RoomError> {
        match self.phase(code) {
            RoomPhase::Open => Ok(()),
            RoomPhase::Closed => Err(RoomError::Closed(code.clone())),
            RoomPhase::Unborn => Err(RoomError::NotFound(code.clone())),
        }
    }

    /// Store a file shared in an open room.
    ///
    /// The room may close while the upload is in flight, after its teardown
    /// already purged the prefix. The phase is checked again once the file is
    /// on disk and the prefix purged a second time if the room is gone.
    pub async fn save_file(
        &self,
        files: &dyn FileStore,
        code: &RoomCode,
        original_name: &str,
        data: &[u8],
    ) -> Result<StoredFile, RoomError> {
        self.ensure_open(code)?;

        let stored = files.save(code, original_name, data).await?;

        if let Err(e) = self.ensure_open(code) {
            match files.delete_all_with_prefix(&code.file_prefix()).await {
                Ok(purge) => tracing::info!(
                    room_code = %code,
                    deleted = purge.deleted.len(),
                    "Room closed during upload, removed late files"
                ),
                Err(err) => tracing::error!(
                    room_code = %code,
                    error = %err,
                    "Failed to remove files uploaded after close"
                ),
            }
            return Err(e);
        }

        Ok(stored)
    }

    pub fn is_closed(&self, code: &RoomCode) -> bool {
        self.table.is_closed(code)
    }

    pub fn members(&self, code: &RoomCode) -> Vec<ConnectionId> {
        self.table.members(code)
    }

    pub fn current_room(&self, conn: ConnectionId) -> Option<RoomCode> {
        self.table.current_room(conn)
    }

    async fn leave_room(&self, conn: ConnectionId, code: &RoomCode) -> LeaveOutcome {
        let outcome = self.table.leave(code, conn);

        match &outcome {
            LeaveOutcome::NotMember => {}
            LeaveOutcome::Left { remaining } => {
                self.connections
                    .send_to_many(
                        remaining,
                        &ServerMessage::UserLeft {
                            connection_id: conn,
                        },
                    )
                    .await;
                tracing::info!(room_code = %code, connection_id = %conn, remaining = remaining.len(), "Left room");
            }
            LeaveOutcome::Closed { open_for } => {
                tracing::info!(
                    room_code = %code,
                    connection_id = %conn,
                    open_secs = open_for.num_seconds(),
                    "Last member left, tearing room down"
                );
                // Detached: the leave never waits on store or disk
                let _ = self.lifecycle.room_closed(code.clone());
            }
        }

        outcome
    }
}
