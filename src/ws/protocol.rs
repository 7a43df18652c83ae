//! WebSocket protocol message definitions
//! These are the wire types between a carrom client and the relay

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::game::{GameSnapshot, Player};

/// Messages sent from client to server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMsg {
    /// Open a new room; the sender becomes player one
    CreateRoom,

    /// Join an existing room by its 6 character code
    JoinRoom { room_id: String },

    /// Start (or restart) the game in a full room
    StartGame { room_id: String },

    /// Full table state from the peer whose turn it is
    GameUpdate {
        room_id: String,
        /// Strictly increasing per sender
        seq: u64,
        snapshot: GameSnapshot,
    },

    /// Leave the current room without closing the socket
    LeaveRoom,

    /// Ping for latency measurement
    Ping {
        /// Client timestamp
        t: u64,
    },
}

/// Messages sent from server to client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMsg {
    /// Welcome message after connection
    Welcome {
        connection_id: Uuid,
        server_time: u64,
    },

    /// Room opened, sender holds player one
    RoomCreated { room_id: String },

    /// Membership changed; sent to every member
    RoomJoined {
        room_id: String,
        players: Vec<RoomMember>,
    },

    /// Game (re)started. A summary snapshot on a fresh start, the last
    /// relayed table when joining a game in progress.
    GameStarted { snapshot: GameSnapshot },

    /// Table state relayed from the other member
    GameUpdate { snapshot: GameSnapshot },

    /// The other member left or dropped
    PlayerDisconnected { connection_id: Uuid },

    /// Error message
    Error { code: String, message: String },

    /// Pong response
    Pong {
        /// Echo back client timestamp
        t: u64,
    },
}

/// A seat in a room
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomMember {
    pub connection_id: Uuid,
    pub role: Player,
}
