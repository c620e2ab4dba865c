//! Wire protocol shared by the Huddle server and its clients.

pub mod messages;
pub mod types;

pub use messages::{ClientMessage, ServerMessage};
pub use types::{
    CanvasPoint, ConnectionId, IceServer, ProtocolError, RoomCode, SignalKind, StrokePhase,
};
