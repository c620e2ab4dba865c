//! Call rooms: who is in which room, how signaling reaches a peer, and what
//! happens when a room opens or empties.

pub mod lifecycle;
pub mod manager;
pub mod relay;
pub mod table;

pub use lifecycle::{RoomLifecycle, TeardownReport};
pub use manager::RoomManager;
pub use relay::{SignalingEnvelope, SignalingRelay};
pub use table::{JoinOutcome, LeaveOutcome, RoomPhase, RoomTable};

use crate::store::StoreError;
use huddle_protocol::{ProtocolError, RoomCode};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RoomError {
    #[error(transparent)]
    InvalidCode(#[from] ProtocolError),

    #[error("Room {0} not found")]
    NotFound(RoomCode),

    #[error("Room {0} is closed")]
    Closed(RoomCode),

    #[error("Not a member of room {0}")]
    NotMember(RoomCode),

    #[error("Room store unavailable: {0}")]
    Store(#[from] StoreError),
}
