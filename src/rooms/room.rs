//! Two-seat rooms and the update authority rules

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::Serialize;
use uuid::Uuid;

use crate::game::{GameSnapshot, Player};
use crate::ws::protocol::RoomMember;

use super::service::RelayError;

const ROOM_ID_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Six character room code
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct RoomId(String);

impl RoomId {
    pub const LEN: usize = 6;

    pub fn generate<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let code = (0..Self::LEN)
            .map(|_| ROOM_ID_ALPHABET[rng.gen_range(0..ROOM_ID_ALPHABET.len())] as char)
            .collect();
        Self(code)
    }

    /// Normalize user input (trim, uppercase) and check the format
    pub fn parse(raw: &str) -> Result<Self, RelayError> {
        let code = raw.trim().to_ascii_uppercase();
        let valid = code.len() == Self::LEN
            && code.bytes().all(|b| ROOM_ID_ALPHABET.contains(&b));
        if valid {
            Ok(Self(code))
        } else {
            Err(RelayError::InvalidRoomId(raw.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RoomId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Room state held by the relay
#[derive(Debug)]
pub struct Room {
    pub id: RoomId,
    members: Vec<RoomMember>,
    started: bool,
    /// Player allowed to publish the next update
    authority: Player,
    /// Last sequence number accepted per seat
    last_seq: [Option<u64>; 2],
    /// Seat that handed the turn over, until the new holder publishes
    handed_over_by: Option<Player>,
    last_snapshot: Option<GameSnapshot>,
    pub created_at: DateTime<Utc>,
}

impl Room {
    pub fn new(id: RoomId, creator: Uuid) -> Self {
        Self {
            id,
            members: vec![RoomMember {
                connection_id: creator,
                role: Player::One,
            }],
            started: false,
            authority: Player::One,
            last_seq: [None, None],
            handed_over_by: None,
            last_snapshot: None,
            created_at: Utc::now(),
        }
    }

    pub fn members(&self) -> &[RoomMember] {
        &self.members
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn last_snapshot(&self) -> Option<&GameSnapshot> {
        self.last_snapshot.as_ref()
    }

    pub fn role_of(&self, connection_id: Uuid) -> Option<Player> {
        self.members
            .iter()
            .find(|m| m.connection_id == connection_id)
            .map(|m| m.role)
    }

    /// Seat a new member in the free role
    pub fn join(&mut self, connection_id: Uuid) -> Result<Player, RelayError> {
        if let Some(role) = self.role_of(connection_id) {
            return Ok(role);
        }
        if self.members.len() >= 2 {
            return Err(RelayError::RoomFull);
        }
        let role = match self.members.first() {
            Some(m) => m.role.other(),
            None => Player::One,
        };
        self.members.push(RoomMember {
            connection_id,
            role,
        });
        Ok(role)
    }

    /// Remove a member. Their sequence counter is forgotten so whoever takes
    /// the seat next can start from scratch.
    pub fn leave(&mut self, connection_id: Uuid) -> Option<Player> {
        let idx = self
            .members
            .iter()
            .position(|m| m.connection_id == connection_id)?;
        let member = self.members.remove(idx);
        self.last_seq[seat(member.role)] = None;
        if self.handed_over_by == Some(member.role) {
            self.handed_over_by = None;
        }
        Some(member.role)
    }

    /// Start or restart the game. Returns the summary to broadcast.
    pub fn start(&mut self, connection_id: Uuid) -> Result<GameSnapshot, RelayError> {
        if self.role_of(connection_id).is_none() {
            return Err(RelayError::NotInRoom);
        }
        if self.members.len() < 2 {
            return Err(RelayError::NeedsOpponent);
        }
        let summary = GameSnapshot::initial();
        self.started = true;
        self.authority = summary.current_player;
        self.last_seq = [None, None];
        self.handed_over_by = None;
        self.last_snapshot = Some(summary.clone());
        Ok(summary)
    }

    /// Accept an update if it comes from the seat holding the turn with a
    /// fresh sequence number. The snapshot's current player becomes the next
    /// authority. Returns the snapshot to forward.
    ///
    /// Until the new holder publishes, the seat that handed the turn over may
    /// repeat the handoff; the stored handoff is forwarded again and
    /// authority stays where it is.
    pub fn accept_update(
        &mut self,
        connection_id: Uuid,
        seq: u64,
        snapshot: &GameSnapshot,
    ) -> Result<GameSnapshot, RelayError> {
        let role = self.role_of(connection_id).ok_or(RelayError::NotInRoom)?;
        if !self.started {
            return Err(RelayError::NotStarted);
        }
        let repeat = role != self.authority
            && self.handed_over_by == Some(role)
            && snapshot.current_player == self.authority;
        if role != self.authority && !repeat {
            return Err(RelayError::NotYourTurn(self.authority));
        }
        let last = &mut self.last_seq[seat(role)];
        if let Some(prev) = *last {
            if seq <= prev {
                return Err(RelayError::StaleUpdate { seq, last: prev });
            }
        }
        snapshot.validate()?;
        *last = Some(seq);

        if repeat {
            if let Some(handoff) = &self.last_snapshot {
                return Ok(handoff.clone());
            }
        }

        self.handed_over_by = (snapshot.current_player != role).then_some(role);
        self.authority = snapshot.current_player;
        self.last_snapshot = Some(snapshot.clone());
        Ok(snapshot.clone())
    }

    /// Members other than `connection_id`
    pub fn others(&self, connection_id: Uuid) -> impl Iterator<Item = Uuid> + '_ {
        self.members
            .iter()
            .map(|m| m.connection_id)
            .filter(move |id| *id != connection_id)
    }
}

fn seat(role: Player) -> usize {
    match role {
        Player::One => 0,
        Player::Two => 1,
    }
}
