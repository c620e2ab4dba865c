use super::RoomError;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use huddle_protocol::{ConnectionId, RoomCode};
use std::collections::HashSet;

/// Where a room code is in its life
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomPhase {
    Unborn,
    Open,
    Closed,
}

struct Room {
    members: HashSet<ConnectionId>,
    opened_at: DateTime<Utc>,
}

impl Room {
    fn new() -> Self {
        Self {
            members: HashSet::new(),
            opened_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinOutcome {
    /// Members other than the joiner at the moment of joining
    pub others: Vec<ConnectionId>,
    /// The join moved the room from unborn to open
    pub opened: bool,
    /// Room the connection was recorded in before, if different
    pub previous_room: Option<RoomCode>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LeaveOutcome {
    /// The room or the connection was not there
    NotMember,
    /// Removed; the room is still open
    Left { remaining: Vec<ConnectionId> },
    /// Removed the last member; the room is closed for good
    Closed { open_for: chrono::Duration },
}

/// Authoritative map from room code to its members.
///
/// Each room's member set is only mutated under its shard's entry lock, and the
/// connection → room index and the closed-code tombstones are updated inside
/// that same section. Lock order: rooms, then tombstones, then index.
pub struct RoomTable {
    rooms: DashMap<RoomCode, Room>,
    connection_rooms: DashMap<ConnectionId, RoomCode>,
    /// Never pruned. Bounded by the 36^6 generated code space, one short
    /// string and a timestamp per closed room.
    closed: DashMap<RoomCode, DateTime<Utc>>,
}

impl RoomTable {
    pub fn new() -> Self {
        Self {
            rooms: DashMap::new(),
            connection_rooms: DashMap::new(),
            closed: DashMap::new(),
        }
    }

    pub fn join(&self, code: &RoomCode, conn: ConnectionId) -> Result<JoinOutcome, RoomError> {
        let entry = self.rooms.entry(code.clone());

        if self.closed.contains_key(code) {
            return Err(RoomError::Closed(code.clone()));
        }

        let opened = matches!(entry, Entry::Vacant(_));
        let mut room = entry.or_insert_with(Room::new);
        room.members.insert(conn);

        let others = room
            .members
            .iter()
            .filter(|member| **member != conn)
            .copied()
            .collect();

        let previous_room = self
            .connection_rooms
            .insert(conn, code.clone())
            .filter(|previous| previous != code);

        Ok(JoinOutcome {
            others,
            opened,
            previous_room,
        })
    }

    pub fn leave(&self, code: &RoomCode, conn: ConnectionId) -> LeaveOutcome {
        let entry = self.rooms.entry(code.clone());

        self.connection_rooms
            .remove_if(&conn, |_, current| current == code);

        let Entry::Occupied(mut occupied) = entry else {
            return LeaveOutcome::NotMember;
        };

        if !occupied.get_mut().members.remove(&conn) {
            return LeaveOutcome::NotMember;
        }

        if occupied.get().members.is_empty() {
            // Tombstone while the entry is still held; remove() releases it
            let now = Utc::now();
            self.closed.insert(code.clone(), now);
            let room = occupied.remove();
            return LeaveOutcome::Closed {
                open_for: now - room.opened_at,
            };
        }

        LeaveOutcome::Left {
            remaining: occupied.get().members.iter().copied().collect(),
        }
    }

    /// The room a connection currently belongs to
    pub fn current_room(&self, conn: ConnectionId) -> Option<RoomCode> {
        self.connection_rooms.get(&conn).map(|code| code.clone())
    }

    pub fn members(&self, code: &RoomCode) -> Vec<ConnectionId> {
        self.rooms
            .get(code)
            .map(|room| room.members.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn is_member(&self, code: &RoomCode, conn: ConnectionId) -> bool {
        self.rooms
            .get(code)
            .map(|room| room.members.contains(&conn))
            .unwrap_or(false)
    }

    pub fn phase(&self, code: &RoomCode) -> RoomPhase {
        if self.rooms.contains_key(code) {
            RoomPhase::Open
        } else if self.closed.contains_key(code) {
            RoomPhase::Closed
        } else {
            RoomPhase::Unborn
        }
    }

    pub fn is_closed(&self, code: &RoomCode) -> bool {
        self.closed.contains_key(code)
    }

    pub fn open_room_count(&self) -> usize {
        self.rooms.len()
    }
}

impl Default for RoomTable {
    fn default() -> Self {
        Self::new()
    }
}
