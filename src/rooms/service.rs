//! Relay service - owns rooms and routes messages between their members

use dashmap::DashMap;
use parking_lot::Mutex;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::game::snapshot::{SnapshotError, SnapshotStats};
use crate::game::{GameSnapshot, Player};
use crate::ws::protocol::{ClientMsg, RoomMember, ServerMsg};

use super::room::{Room, RoomId};

/// Outbound queue depth per connection
pub const OUTBOUND_CAPACITY: usize = 64;

/// Relay errors, reported to the offending client only
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum RelayError {
    #[error("Invalid room id: {0:?}")]
    InvalidRoomId(String),

    #[error("Room not found")]
    RoomNotFound(RoomId),

    #[error("Room is full")]
    RoomFull,

    #[error("Room limit reached")]
    RoomLimit,

    #[error("Not a member of this room")]
    NotInRoom,

    #[error("Waiting for an opponent to join")]
    NeedsOpponent,

    #[error("Game has not started")]
    NotStarted,

    #[error("It is {0}'s turn")]
    NotYourTurn(Player),

    #[error("Update {seq} is not newer than {last}")]
    StaleUpdate { seq: u64, last: u64 },

    #[error("Invalid snapshot: {0}")]
    InvalidSnapshot(#[from] SnapshotError),
}

impl RelayError {
    /// Machine readable code sent in `error` messages
    pub fn code(&self) -> &'static str {
        match self {
            RelayError::InvalidRoomId(_) => "invalid_room_id",
            RelayError::RoomNotFound(_) => "room_not_found",
            RelayError::RoomFull => "room_full",
            RelayError::RoomLimit => "room_limit",
            RelayError::NotInRoom => "not_in_room",
            RelayError::NeedsOpponent => "needs_opponent",
            RelayError::NotStarted => "not_started",
            RelayError::NotYourTurn(_) => "not_your_turn",
            RelayError::StaleUpdate { .. } => "stale_update",
            RelayError::InvalidSnapshot(_) => "invalid_snapshot",
        }
    }

    fn to_msg(&self) -> ServerMsg {
        ServerMsg::Error {
            code: self.code().to_string(),
            message: self.to_string(),
        }
    }
}

/// Per-connection routing entry
struct Connection {
    tx: mpsc::Sender<ServerMsg>,
    room: Option<RoomId>,
}

/// Room info for the HTTP API
#[derive(Debug, Clone, serde::Serialize)]
pub struct RoomInfo {
    pub room_id: RoomId,
    pub players: Vec<RoomMember>,
    pub started: bool,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// Relay service
pub struct RelayService {
    rooms: DashMap<RoomId, Room>,
    connections: DashMap<Uuid, Connection>,
    max_rooms: usize,
    rng: Mutex<ChaCha8Rng>,
    stats: Mutex<SnapshotStats>,
}

impl RelayService {
    pub fn new(max_rooms: usize) -> Self {
        Self {
            rooms: DashMap::new(),
            connections: DashMap::new(),
            max_rooms,
            rng: Mutex::new(ChaCha8Rng::from_entropy()),
            stats: Mutex::new(SnapshotStats::default()),
        }
    }

    /// Register a connection (called when the WebSocket connects).
    /// Returns the receiving end of its outbound queue.
    pub fn register(&self, connection_id: Uuid) -> mpsc::Receiver<ServerMsg> {
        let (tx, rx) = mpsc::channel(OUTBOUND_CAPACITY);
        self.connections
            .insert(connection_id, Connection { tx, room: None });
        debug!(connection_id = %connection_id, "Connection registered");
        rx
    }

    /// Unregister a connection (called when the WebSocket closes)
    pub fn unregister(&self, connection_id: Uuid) {
        self.leave_current_room(connection_id);
        self.connections.remove(&connection_id);
        debug!(connection_id = %connection_id, "Connection unregistered");
    }

    /// Process one client message. Failures are answered with an `error`.
    pub fn handle(&self, connection_id: Uuid, msg: ClientMsg) {
        let result = match msg {
            ClientMsg::CreateRoom => self.create_room(connection_id),
            ClientMsg::JoinRoom { room_id } => self.join_room(connection_id, &room_id),
            ClientMsg::StartGame { room_id } => self.start_game(connection_id, &room_id),
            ClientMsg::GameUpdate {
                room_id,
                seq,
                snapshot,
            } => self.game_update(connection_id, &room_id, seq, snapshot),
            ClientMsg::LeaveRoom => {
                self.leave_current_room(connection_id);
                Ok(())
            }
            ClientMsg::Ping { t } => {
                self.send(connection_id, ServerMsg::Pong { t });
                Ok(())
            }
        };

        if let Err(e) = result {
            debug!(connection_id = %connection_id, code = e.code(), error = %e, "Relay request rejected");
            self.send(connection_id, e.to_msg());
        }
    }

    fn create_room(&self, connection_id: Uuid) -> Result<(), RelayError> {
        if self.rooms.len() >= self.max_rooms {
            warn!(max_rooms = self.max_rooms, "Room limit reached");
            return Err(RelayError::RoomLimit);
        }
        self.leave_current_room(connection_id);

        let room_id = loop {
            let candidate = RoomId::generate(&mut *self.rng.lock());
            if let dashmap::mapref::entry::Entry::Vacant(slot) = self.rooms.entry(candidate.clone()) {
                slot.insert(Room::new(candidate.clone(), connection_id));
                break candidate;
            }
        };
        self.set_room(connection_id, Some(room_id.clone()));

        info!(room_id = %room_id, connection_id = %connection_id, "Room created");
        self.send(
            connection_id,
            ServerMsg::RoomCreated {
                room_id: room_id.to_string(),
            },
        );
        Ok(())
    }

    fn join_room(&self, connection_id: Uuid, raw_id: &str) -> Result<(), RelayError> {
        let room_id = RoomId::parse(raw_id)?;
        if self.current_room(connection_id).as_ref() != Some(&room_id) {
            if !self.rooms.contains_key(&room_id) {
                return Err(RelayError::RoomNotFound(room_id));
            }
            self.leave_current_room(connection_id);
        }

        let (role, members, resume) = {
            let mut room = self
                .rooms
                .get_mut(&room_id)
                .ok_or_else(|| RelayError::RoomNotFound(room_id.clone()))?;
            let role = room.join(connection_id)?;
            let resume = room
                .is_started()
                .then(|| room.last_snapshot().cloned())
                .flatten();
            (role, room.members().to_vec(), resume)
        };
        self.set_room(connection_id, Some(room_id.clone()));

        info!(room_id = %room_id, connection_id = %connection_id, role = role.number(), "Player joined room");
        let joined = ServerMsg::RoomJoined {
            room_id: room_id.to_string(),
            players: members.clone(),
        };
        for member in &members {
            self.send(member.connection_id, joined.clone());
        }
        if let Some(snapshot) = resume {
            self.send(connection_id, ServerMsg::GameStarted { snapshot });
        }
        Ok(())
    }

    fn start_game(&self, connection_id: Uuid, raw_id: &str) -> Result<(), RelayError> {
        let room_id = RoomId::parse(raw_id)?;
        let (snapshot, members) = {
            let mut room = self
                .rooms
                .get_mut(&room_id)
                .ok_or_else(|| RelayError::RoomNotFound(room_id.clone()))?;
            let snapshot = room.start(connection_id)?;
            (snapshot, room.members().to_vec())
        };

        info!(room_id = %room_id, "Game started");
        for member in members {
            self.send(
                member.connection_id,
                ServerMsg::GameStarted {
                    snapshot: snapshot.clone(),
                },
            );
        }
        Ok(())
    }

    fn game_update(
        &self,
        connection_id: Uuid,
        raw_id: &str,
        seq: u64,
        snapshot: GameSnapshot,
    ) -> Result<(), RelayError> {
        let room_id = RoomId::parse(raw_id)?;
        let (forward, recipients): (GameSnapshot, Vec<Uuid>) = {
            let mut room = self
                .rooms
                .get_mut(&room_id)
                .ok_or_else(|| RelayError::RoomNotFound(room_id.clone()))?;
            let forward = room.accept_update(connection_id, seq, &snapshot)?;
            (forward, room.others(connection_id).collect())
        };

        self.stats
            .lock()
            .record(snapshot.coins.len() + snapshot.striker.iter().count());

        for peer in recipients {
            self.send(
                peer,
                ServerMsg::GameUpdate {
                    snapshot: forward.clone(),
                },
            );
        }
        Ok(())
    }

    /// Remove the connection from its room, notify whoever is left and drop
    /// the room once it is empty
    fn leave_current_room(&self, connection_id: Uuid) {
        let Some(room_id) = self.current_room(connection_id) else {
            return;
        };
        self.set_room(connection_id, None);

        let remaining: Vec<Uuid> = {
            let Some(mut room) = self.rooms.get_mut(&room_id) else {
                return;
            };
            room.leave(connection_id);
            room.members().iter().map(|m| m.connection_id).collect()
        };

        if remaining.is_empty() {
            self.rooms.remove_if(&room_id, |_, room| room.is_empty());
            info!(room_id = %room_id, "Room closed");
            return;
        }

        info!(room_id = %room_id, connection_id = %connection_id, "Player left room");
        for peer in remaining {
            self.send(peer, ServerMsg::PlayerDisconnected { connection_id });
        }
    }

    fn current_room(&self, connection_id: Uuid) -> Option<RoomId> {
        self.connections
            .get(&connection_id)
            .and_then(|c| c.room.clone())
    }

    fn set_room(&self, connection_id: Uuid, room: Option<RoomId>) {
        if let Some(mut conn) = self.connections.get_mut(&connection_id) {
            conn.room = room;
        }
    }

    /// Fire-and-forget send; a full or closed queue drops the message
    fn send(&self, connection_id: Uuid, msg: ServerMsg) {
        let Some(conn) = self.connections.get(&connection_id) else {
            return;
        };
        if let Err(e) = conn.tx.try_send(msg) {
            warn!(connection_id = %connection_id, error = %e, "Dropping outbound message");
        }
    }

    pub fn room_info(&self, room_id: &RoomId) -> Option<RoomInfo> {
        self.rooms.get(room_id).map(|room| RoomInfo {
            room_id: room.id.clone(),
            players: room.members().to_vec(),
            started: room.is_started(),
            created_at: room.created_at,
        })
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    pub fn stats(&self) -> SnapshotStats {
        *self.stats.lock()
    }
}
