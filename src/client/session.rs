//! One player's view of a game: local table, aim controller and room state

use std::time::Duration;

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::game::snapshot::SnapshotCadence;
use crate::game::{
    AimController, AimRejection, GameSnapshot, Outcome, Player, ShotOutcome, Table, TickReport,
    TurnPhase, Viewport,
};
use crate::util::geometry::Vec2;
use crate::util::time::frame_factor;
use crate::ws::protocol::{ClientMsg, ServerMsg};

/// Frames during which a table we gave away keeps being republished
pub const HANDOFF_WINDOW_FRAMES: u32 = 600;

/// Republish every this many frames inside the window
pub const HANDOFF_RESEND_EVERY: u32 = 10;

/// Hot-seat on one device, or one seat of a relayed game
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Local,
    Networked,
}

/// What the session knows about its room
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MultiplayerState {
    pub is_connected: bool,
    pub connection_id: Option<Uuid>,
    pub room_id: Option<String>,
    pub role: Option<Player>,
    pub opponent_present: bool,
    pub started: bool,
}

pub struct Session {
    table: Table,
    aim: AimController,
    viewport: Viewport,
    mode: Mode,
    multiplayer: MultiplayerState,
    /// Sequence number of the last update sent
    seq: u64,
    cadence: SnapshotCadence,
    last_report: TickReport,
    /// Frames left to republish a handed over or finished table
    handoff_frames: u32,
}

impl Session {
    /// Both players share this device
    pub fn local(seed: u64) -> Self {
        Self::new(seed, Mode::Local)
    }

    /// One seat of a relayed game
    pub fn networked(seed: u64) -> Self {
        Self::new(seed, Mode::Networked)
    }

    fn new(seed: u64, mode: Mode) -> Self {
        Self {
            table: Table::new(seed),
            aim: AimController::default(),
            viewport: Viewport::default(),
            mode,
            multiplayer: MultiplayerState::default(),
            seq: 0,
            cadence: SnapshotCadence::new(1),
            last_report: TickReport::default(),
            handoff_frames: 0,
        }
    }

    pub fn with_substeps(mut self, substeps: u32) -> Self {
        self.table = self.table.with_substeps(substeps);
        self
    }

    /// Publish a snapshot every `interval` frames while authoritative.
    /// Captures and turn changes always publish.
    pub fn with_snapshot_interval(mut self, interval: u32) -> Self {
        self.cadence = SnapshotCadence::new(interval);
        self
    }

    pub fn table(&self) -> &Table {
        &self.table
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn multiplayer(&self) -> &MultiplayerState {
        &self.multiplayer
    }

    pub fn phase(&self) -> TurnPhase {
        self.aim.phase(&self.table)
    }

    pub fn aim_line(&self) -> Option<(Vec2, Vec2)> {
        self.aim.aim_line()
    }

    pub fn last_report(&self) -> &TickReport {
        &self.last_report
    }

    pub fn set_viewport(&mut self, width: f32, height: f32) {
        self.viewport = Viewport::fit(width, height);
    }

    /// Whether this session simulates and publishes the table right now
    pub fn is_authoritative(&self) -> bool {
        match self.mode {
            Mode::Local => true,
            Mode::Networked => {
                self.multiplayer.started
                    && self.multiplayer.role == Some(self.table.current_player())
            }
        }
    }

    pub fn handle_server_msg(&mut self, msg: ServerMsg) {
        match msg {
            ServerMsg::Welcome { connection_id, .. } => {
                self.multiplayer.is_connected = true;
                self.multiplayer.connection_id = Some(connection_id);
            }
            ServerMsg::RoomCreated { room_id } => {
                info!(room_id = %room_id, "Room created, waiting for opponent");
                self.multiplayer.room_id = Some(room_id);
                self.multiplayer.role = Some(Player::One);
                self.multiplayer.opponent_present = false;
                self.multiplayer.started = false;
            }
            ServerMsg::RoomJoined { room_id, players } => {
                let own = self
                    .multiplayer
                    .connection_id
                    .and_then(|id| players.iter().find(|p| p.connection_id == id));
                if let Some(member) = own {
                    self.multiplayer.role = Some(member.role);
                }
                self.multiplayer.opponent_present = players.len() == 2;
                self.multiplayer.room_id = Some(room_id);
            }
            ServerMsg::GameStarted { snapshot } => {
                self.multiplayer.started = true;
                self.handoff_frames = 0;
                self.aim.cancel();
                if snapshot.is_summary() && self.multiplayer.role == Some(Player::One) {
                    // Player one racks the table and publishes it
                    self.table.reset_table();
                    self.table.set_message(snapshot.message);
                    self.cadence.force_next();
                } else {
                    self.apply(snapshot);
                }
            }
            ServerMsg::GameUpdate { snapshot } => {
                if self.is_authoritative() {
                    debug!("Ignoring update while holding the turn");
                } else {
                    // The new holder is publishing, so the handoff arrived
                    self.handoff_frames = 0;
                    self.apply(snapshot);
                }
            }
            ServerMsg::PlayerDisconnected { .. } => {
                self.multiplayer.opponent_present = false;
                self.table.set_message("Opponent disconnected. Waiting for a new player.");
            }
            ServerMsg::Error { code, .. }
                if code == "not_your_turn" && self.handoff_frames > 0 =>
            {
                debug!("Handoff already taken over, stopping resend");
                self.handoff_frames = 0;
            }
            ServerMsg::Error { code, message } => {
                warn!(code = %code, message = %message, "Relay error");
                self.table.set_message(message);
            }
            ServerMsg::Pong { .. } => {}
        }
    }

    /// Our own connection to the relay dropped. Room state is forgotten;
    /// the table stays as it was.
    pub fn connection_lost(&mut self) {
        if self.mode == Mode::Local {
            return;
        }
        info!(room_id = ?self.multiplayer.room_id, "Connection to relay lost");
        self.multiplayer = MultiplayerState::default();
        self.handoff_frames = 0;
        self.aim.cancel();
        self.table.set_message("Disconnected from server.");
    }

    fn apply(&mut self, snapshot: GameSnapshot) {
        if let Err(e) = self.table.apply_snapshot(snapshot) {
            warn!(error = %e, "Rejected snapshot");
        }
    }

    fn local_player(&self) -> Result<Option<Player>, AimRejection> {
        match self.mode {
            Mode::Local => Ok(None),
            Mode::Networked if self.multiplayer.started => {
                self.multiplayer.role.map(Some).ok_or(AimRejection::NotSeated)
            }
            Mode::Networked => Err(AimRejection::NotSeated),
        }
    }

    /// Pointer pressed at client coordinates
    pub fn pointer_down(&mut self, cx: f32, cy: f32) -> Result<(), AimRejection> {
        let local = self.local_player()?;
        let p = self.viewport.to_logical(cx, cy);
        self.aim.pointer_down(&mut self.table, p, local)
    }

    pub fn pointer_move(&mut self, cx: f32, cy: f32) {
        let p = self.viewport.to_logical(cx, cy);
        self.aim.pointer_move(&mut self.table, p);
    }

    pub fn pointer_up(&mut self) -> ShotOutcome {
        let outcome = self.aim.pointer_up(&mut self.table);
        if matches!(outcome, ShotOutcome::Fired { .. }) {
            self.cadence.force_next();
        }
        outcome
    }

    /// Run one frame. Returns the update to publish, if any.
    pub fn frame(&mut self, elapsed: Duration) -> Option<ClientMsg> {
        if !self.is_authoritative() || self.table.is_game_over() {
            return self.resend_handoff();
        }

        let report = self.table.tick(frame_factor(elapsed));
        let force = !report.captures.is_empty() || report.turn_switched;
        self.last_report = report;

        if self.gave_up_table() {
            return self.resend_handoff();
        }
        if force {
            self.cadence.force_next();
        }
        self.publish()
    }

    /// Start republishing if the table just left our hands, either to the
    /// other seat or by the game ending.
    fn gave_up_table(&mut self) -> bool {
        let gave_up = !self.is_authoritative() || self.table.is_game_over();
        self.handoff_frames = if gave_up && self.mode == Mode::Networked {
            HANDOFF_WINDOW_FRAMES
        } else {
            0
        };
        gave_up
    }

    fn resend_handoff(&mut self) -> Option<ClientMsg> {
        if self.handoff_frames == 0 {
            return None;
        }
        let due = self.handoff_frames % HANDOFF_RESEND_EVERY == 0;
        self.handoff_frames -= 1;
        if due {
            self.update()
        } else {
            None
        }
    }

    fn publish(&mut self) -> Option<ClientMsg> {
        if !self.cadence.should_send() {
            return None;
        }
        self.update()
    }

    fn update(&mut self) -> Option<ClientMsg> {
        if self.mode == Mode::Local {
            return None;
        }
        let room_id = self.multiplayer.room_id.clone()?;
        self.seq += 1;
        Some(ClientMsg::GameUpdate {
            room_id,
            seq: self.seq,
            snapshot: self.table.snapshot(),
        })
    }

    /// Periodic counter refresh, independent of the frame loop
    pub fn refresh_counts(&mut self) {
        self.table.update_pocket_counts();
    }

    /// Re-rack the table. Networked sessions may only do this on their turn.
    pub fn reset(&mut self) -> bool {
        if !self.is_authoritative() {
            return false;
        }
        self.aim.cancel();
        self.table.reset_table();
        self.table.set_message("Table reset. Player 1 to play.");
        if !self.gave_up_table() {
            self.cadence.force_next();
        }
        true
    }

    pub fn pass(&mut self) -> bool {
        if !self.is_authoritative() || !self.table.pass_turn() {
            return false;
        }
        self.aim.cancel();
        self.gave_up_table();
        true
    }

    pub fn end_game(&mut self) -> Option<Outcome> {
        if !self.is_authoritative() {
            return None;
        }
        self.aim.cancel();
        let outcome = self.table.end_game();
        self.gave_up_table();
        Some(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ws::protocol::RoomMember;

    const FRAME: Duration = Duration::from_micros(16_670);

    /// A networked session seated as `role` in a started room
    fn seated(role: Player) -> (Session, Uuid) {
        let me = Uuid::new_v4();
        let other = Uuid::new_v4();
        let mut session = Session::networked(77);
        session.handle_server_msg(ServerMsg::Welcome {
            connection_id: me,
            server_time: 0,
        });
        let (first, second) = match role {
            Player::One => (me, other),
            Player::Two => (other, me),
        };
        session.handle_server_msg(ServerMsg::RoomJoined {
            room_id: "ROOM42".to_string(),
            players: vec![
                RoomMember {
                    connection_id: first,
                    role: Player::One,
                },
                RoomMember {
                    connection_id: second,
                    role: Player::Two,
                },
            ],
        });
        session.handle_server_msg(ServerMsg::GameStarted {
            snapshot: GameSnapshot::initial(),
        });
        (session, me)
    }

    fn fire_straight_up(session: &mut Session) {
        let s = session.table().striker().position();
        session.pointer_down(s.x, s.y).unwrap();
        session.pointer_move(s.x, s.y + 60.0);
        assert!(matches!(session.pointer_up(), ShotOutcome::Fired { .. }));
    }

    #[test]
    fn local_session_is_always_authoritative_and_silent() {
        let mut session = Session::local(1);
        assert!(session.is_authoritative());
        fire_straight_up(&mut session);
        let y = session.table().striker().y;
        assert!(session.frame(FRAME).is_none());
        assert!(session.table().striker().y < y);
    }

    #[test]
    fn player_one_publishes_increasing_updates() {
        let (mut session, _) = seated(Player::One);
        assert_eq!(session.multiplayer().role, Some(Player::One));
        assert!(session.multiplayer().opponent_present);
        assert!(session.is_authoritative());

        let seqs: Vec<u64> = (0..3)
            .filter_map(|_| match session.frame(FRAME) {
                Some(ClientMsg::GameUpdate { seq, room_id, snapshot }) => {
                    assert_eq!(room_id, "ROOM42");
                    assert_eq!(snapshot.coins.len(), 19);
                    Some(seq)
                }
                _ => None,
            })
            .collect();
        assert_eq!(seqs, vec![1, 2, 3]);
    }

    #[test]
    fn unstarted_networked_session_is_inert() {
        let mut session = Session::networked(5);
        assert!(!session.is_authoritative());
        assert!(session.frame(FRAME).is_none());
        let s = session.table().striker().position();
        assert_eq!(session.pointer_down(s.x, s.y), Err(AimRejection::NotSeated));
        assert!(!session.reset());
    }

    #[test]
    fn player_two_mirrors_until_handed_the_turn() {
        let (mut session, _) = seated(Player::Two);
        assert!(!session.is_authoritative());

        let s = session.table().striker().position();
        assert_eq!(
            session.pointer_down(s.x, s.y),
            Err(AimRejection::NotYourTurn(Player::One))
        );
        assert_eq!(session.table().state().message, "Waiting for Player 1");

        // Player one's racked table arrives
        let mut source = Table::new(123);
        session.handle_server_msg(ServerMsg::GameUpdate {
            snapshot: source.snapshot(),
        });
        assert_eq!(session.table().bodies(), source.bodies());
        assert!(session.frame(FRAME).is_none());

        // Shot settled on the other side, turn handed over
        source.switch_player();
        session.handle_server_msg(ServerMsg::GameUpdate {
            snapshot: source.snapshot(),
        });
        assert!(session.is_authoritative());

        // Late updates from the previous turn holder are ignored
        let mut stale = source.snapshot();
        stale.current_player = Player::One;
        session.handle_server_msg(ServerMsg::GameUpdate { snapshot: stale });
        assert_eq!(session.table().current_player(), Player::Two);
        assert!(matches!(session.frame(FRAME), Some(ClientMsg::GameUpdate { seq: 1, .. })));
    }

    #[test]
    fn player_one_racks_on_start() {
        let mut session = Session::networked(9);
        session.handle_server_msg(ServerMsg::RoomCreated {
            room_id: "ABCDEF".to_string(),
        });
        let gen = session.table().generation();
        session.handle_server_msg(ServerMsg::GameStarted {
            snapshot: GameSnapshot::initial(),
        });
        assert_eq!(session.table().generation(), gen + 1);
        assert_eq!(session.table().state().message, "Player 1 to play.");
    }

    #[test]
    fn disconnect_keeps_table() {
        let (mut session, _) = seated(Player::One);
        fire_straight_up(&mut session);
        session.frame(FRAME);
        let bodies = session.table().bodies().to_vec();
        session.handle_server_msg(ServerMsg::PlayerDisconnected {
            connection_id: Uuid::new_v4(),
        });
        assert!(!session.multiplayer().opponent_present);
        assert_eq!(session.table().bodies(), &bodies[..]);
    }

    #[test]
    fn relay_errors_become_the_status_message() {
        let mut session = Session::networked(1);
        session.handle_server_msg(ServerMsg::Error {
            code: "room_full".to_string(),
            message: "Room is full".to_string(),
        });
        assert_eq!(session.table().state().message, "Room is full");
    }

    #[test]
    fn end_game_is_published() {
        let (mut session, _) = seated(Player::One);
        session.frame(FRAME);
        assert_eq!(session.end_game(), Some(Outcome::Tie));
        match session.frame(FRAME) {
            Some(ClientMsg::GameUpdate { snapshot, .. }) => assert!(snapshot.game_over),
            other => panic!("expected update, got {other:?}"),
        }
    }

    fn update_snapshot(msg: Option<ClientMsg>) -> Option<GameSnapshot> {
        match msg {
            Some(ClientMsg::GameUpdate { snapshot, .. }) => Some(snapshot),
            _ => None,
        }
    }

    #[test]
    fn lost_handoff_is_sent_again() {
        let (mut p1, _) = seated(Player::One);
        let (mut p2, _) = seated(Player::Two);
        fire_straight_up(&mut p1);

        let mut frames = 0;
        loop {
            frames += 1;
            assert!(frames < 5000, "shot never settled");
            let sent = update_snapshot(p1.frame(FRAME));
            if sent.is_some_and(|s| s.current_player == Player::Two) {
                break;
            }
        }

        // That first handoff never reached player two
        assert!(!p2.is_authoritative());
        let resent: Vec<GameSnapshot> = (0..HANDOFF_WINDOW_FRAMES)
            .filter_map(|_| update_snapshot(p1.frame(FRAME)))
            .collect();
        assert_eq!(
            resent.len() as u32,
            HANDOFF_WINDOW_FRAMES / HANDOFF_RESEND_EVERY - 1
        );
        assert!(resent.iter().all(|s| s.current_player == Player::Two));
        assert!(p1.frame(FRAME).is_none());

        p2.handle_server_msg(ServerMsg::GameUpdate {
            snapshot: resent[0].clone(),
        });
        assert!(p2.is_authoritative());
        assert_eq!(p2.table().bodies(), p1.table().bodies());
    }

    #[test]
    fn handoff_resend_stops_once_answered() {
        let (mut session, _) = seated(Player::One);
        session.frame(FRAME);
        assert!(session.pass());
        assert!(update_snapshot(session.frame(FRAME)).is_some());

        // Player two picked it up and is publishing
        session.handle_server_msg(ServerMsg::GameUpdate {
            snapshot: session.table().snapshot(),
        });
        assert!((0..HANDOFF_WINDOW_FRAMES).all(|_| session.frame(FRAME).is_none()));
    }

    #[test]
    fn turn_rejection_during_resend_is_quiet() {
        let (mut session, _) = seated(Player::One);
        assert!(session.pass());
        let message = session.table().state().message.clone();
        assert!(session.frame(FRAME).is_some());

        session.handle_server_msg(ServerMsg::Error {
            code: "not_your_turn".to_string(),
            message: "It is Player 2's turn".to_string(),
        });
        assert_eq!(session.table().state().message, message);
        assert!((0..HANDOFF_WINDOW_FRAMES).all(|_| session.frame(FRAME).is_none()));
    }

    #[test]
    fn finished_game_is_published_a_bounded_number_of_times() {
        let (mut session, _) = seated(Player::One);
        session.end_game();
        let sent = (0..HANDOFF_WINDOW_FRAMES * 2)
            .filter_map(|_| update_snapshot(session.frame(FRAME)))
            .inspect(|s| assert!(s.game_over))
            .count();
        assert_eq!(sent as u32, HANDOFF_WINDOW_FRAMES / HANDOFF_RESEND_EVERY);
    }

    #[test]
    fn connection_loss_clears_room_state() {
        let (mut session, me) = seated(Player::One);
        assert!(session.multiplayer().is_connected);
        assert_eq!(session.multiplayer().connection_id, Some(me));
        assert!(session.pass());
        let bodies = session.table().bodies().to_vec();

        session.connection_lost();
        assert_eq!(session.multiplayer(), &MultiplayerState::default());
        assert!(!session.is_authoritative());
        assert!(session.frame(FRAME).is_none());
        assert_eq!(session.table().state().message, "Disconnected from server.");
        assert_eq!(session.table().bodies(), &bodies[..]);
        let s = session.table().striker().position();
        assert_eq!(session.pointer_down(s.x, s.y), Err(AimRejection::NotSeated));

        session.handle_server_msg(ServerMsg::Welcome {
            connection_id: Uuid::new_v4(),
            server_time: 0,
        });
        assert!(session.multiplayer().is_connected);
    }

    #[test]
    fn controls_only_on_own_turn() {
        let (mut session, _) = seated(Player::Two);
        assert!(!session.pass());
        assert!(session.end_game().is_none());

        let mut local = Session::local(3);
        assert!(local.pass());
        assert_eq!(local.table().current_player(), Player::Two);
        assert!(local.reset());
        assert_eq!(local.table().current_player(), Player::One);
    }
}
