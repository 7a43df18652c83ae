//! Frame loop driving a [`Session`]

use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::util::time::{frame_duration, POCKET_REFRESH_MS};
use crate::ws::protocol::{ClientMsg, ServerMsg};

use super::session::Session;

/// Input fed to the loop between frames
#[derive(Debug, Clone)]
pub enum LoopCommand {
    PointerDown { x: f32, y: f32 },
    PointerMove { x: f32, y: f32 },
    PointerUp,
    Resize { width: f32, height: f32 },
    Server(ServerMsg),
    /// The socket to the relay closed
    Disconnected,
    Reset,
    Pass,
    EndGame,
}

pub struct GameLoop {
    session: Session,
    commands: mpsc::Receiver<LoopCommand>,
    outbound: Option<mpsc::Sender<ClientMsg>>,
    shutdown: watch::Receiver<bool>,
}

impl GameLoop {
    pub fn new(
        session: Session,
        commands: mpsc::Receiver<LoopCommand>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            session,
            commands,
            outbound: None,
            shutdown,
        }
    }

    /// Where published updates go in networked play
    pub fn with_outbound(mut self, outbound: mpsc::Sender<ClientMsg>) -> Self {
        self.outbound = Some(outbound);
        self
    }

    /// Run until the shutdown signal flips or every command sender is gone.
    /// Hands the session back for inspection.
    pub async fn run(mut self) -> Session {
        let mut frames = interval(frame_duration());
        frames.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut refresh = interval(Duration::from_millis(POCKET_REFRESH_MS));
        refresh.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut last_frame = Instant::now();

        info!(mode = ?self.session.mode(), "Game loop started");

        loop {
            if *self.shutdown.borrow() {
                break;
            }

            tokio::select! {
                changed = self.shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                _ = frames.tick() => {
                    let now = Instant::now();
                    let elapsed = now - last_frame;
                    last_frame = now;
                    if let Some(msg) = self.session.frame(elapsed) {
                        self.send(msg);
                    }
                }
                _ = refresh.tick() => {
                    self.session.refresh_counts();
                }
                cmd = self.commands.recv() => match cmd {
                    Some(cmd) => self.apply(cmd),
                    None => {
                        debug!("Command channel closed");
                        break;
                    }
                },
            }
        }

        info!("Game loop stopped");
        self.session
    }

    fn apply(&mut self, cmd: LoopCommand) {
        match cmd {
            LoopCommand::PointerDown { x, y } => {
                if let Err(reason) = self.session.pointer_down(x, y) {
                    debug!(%reason, "Pointer down ignored");
                }
            }
            LoopCommand::PointerMove { x, y } => self.session.pointer_move(x, y),
            LoopCommand::PointerUp => {
                let outcome = self.session.pointer_up();
                debug!(?outcome, "Pointer released");
            }
            LoopCommand::Resize { width, height } => self.session.set_viewport(width, height),
            LoopCommand::Server(msg) => self.session.handle_server_msg(msg),
            LoopCommand::Disconnected => self.session.connection_lost(),
            LoopCommand::Reset => {
                self.session.reset();
            }
            LoopCommand::Pass => {
                self.session.pass();
            }
            LoopCommand::EndGame => {
                if let Some(outcome) = self.session.end_game() {
                    info!(?outcome, "Game ended");
                }
            }
        }
    }

    /// Fire-and-forget; a full queue drops the update
    fn send(&self, msg: ClientMsg) {
        let Some(outbound) = &self.outbound else {
            return;
        };
        if let Err(e) = outbound.try_send(msg) {
            warn!(error = %e, "Dropping outbound update");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::{GameSnapshot, Player};
    use crate::ws::protocol::RoomMember;
    use uuid::Uuid;

    #[tokio::test]
    async fn local_shot_runs_until_shutdown() {
        let (cmd_tx, cmd_rx) = mpsc::channel(16);
        let (stop_tx, stop_rx) = watch::channel(false);
        let session = Session::local(11);
        let start = session.table().striker().position();
        let handle = tokio::spawn(GameLoop::new(session, cmd_rx, stop_rx).run());

        cmd_tx
            .send(LoopCommand::PointerDown { x: start.x, y: start.y })
            .await
            .unwrap();
        cmd_tx
            .send(LoopCommand::PointerMove { x: start.x, y: start.y + 40.0 })
            .await
            .unwrap();
        cmd_tx.send(LoopCommand::PointerUp).await.unwrap();

        tokio::time::sleep(Duration::from_millis(150)).await;
        stop_tx.send(true).unwrap();
        let session = handle.await.unwrap();

        assert!(session.table().striker().y < start.y);
        assert_eq!(session.table().current_player(), Player::One);
    }

    #[tokio::test]
    async fn networked_player_one_streams_updates() {
        let (cmd_tx, cmd_rx) = mpsc::channel(16);
        let (out_tx, mut out_rx) = mpsc::channel(256);
        let (stop_tx, stop_rx) = watch::channel(false);
        let handle = tokio::spawn(
            GameLoop::new(Session::networked(3), cmd_rx, stop_rx)
                .with_outbound(out_tx)
                .run(),
        );

        let me = Uuid::new_v4();
        let messages = [
            ServerMsg::Welcome {
                connection_id: me,
                server_time: 0,
            },
            ServerMsg::RoomJoined {
                room_id: "LOOP01".to_string(),
                players: vec![
                    RoomMember {
                        connection_id: me,
                        role: Player::One,
                    },
                    RoomMember {
                        connection_id: Uuid::new_v4(),
                        role: Player::Two,
                    },
                ],
            },
            ServerMsg::GameStarted {
                snapshot: GameSnapshot::initial(),
            },
        ];
        for msg in messages {
            cmd_tx.send(LoopCommand::Server(msg)).await.unwrap();
        }

        let first = tokio::time::timeout(Duration::from_secs(2), out_rx.recv())
            .await
            .unwrap()
            .unwrap();
        let second = tokio::time::timeout(Duration::from_secs(2), out_rx.recv())
            .await
            .unwrap()
            .unwrap();
        match (first, second) {
            (
                ClientMsg::GameUpdate { seq: a, room_id, .. },
                ClientMsg::GameUpdate { seq: b, .. },
            ) => {
                assert_eq!(room_id, "LOOP01");
                assert!(b > a);
            }
            other => panic!("expected two updates, got {other:?}"),
        }

        stop_tx.send(true).unwrap();
        let session = handle.await.unwrap();
        assert!(session.is_authoritative());
    }

    #[tokio::test]
    async fn disconnect_stops_publishing() {
        let (cmd_tx, cmd_rx) = mpsc::channel(16);
        let (out_tx, mut out_rx) = mpsc::channel(1024);
        let (stop_tx, stop_rx) = watch::channel(false);
        let handle = tokio::spawn(
            GameLoop::new(Session::networked(8), cmd_rx, stop_rx)
                .with_outbound(out_tx)
                .run(),
        );

        let me = Uuid::new_v4();
        let messages = [
            ServerMsg::Welcome {
                connection_id: me,
                server_time: 0,
            },
            ServerMsg::RoomCreated {
                room_id: "LOOP02".to_string(),
            },
            ServerMsg::GameStarted {
                snapshot: GameSnapshot::initial(),
            },
        ];
        for msg in messages {
            cmd_tx.send(LoopCommand::Server(msg)).await.unwrap();
        }
        let first = tokio::time::timeout(Duration::from_secs(2), out_rx.recv()).await;
        assert!(matches!(first, Ok(Some(ClientMsg::GameUpdate { .. }))));

        cmd_tx.send(LoopCommand::Disconnected).await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        while out_rx.try_recv().is_ok() {}
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(out_rx.try_recv().is_err());

        stop_tx.send(true).unwrap();
        let session = handle.await.unwrap();
        assert!(!session.multiplayer().is_connected);
        assert!(session.multiplayer().room_id.is_none());
    }

    #[tokio::test]
    async fn dropping_commands_stops_the_loop() {
        let (cmd_tx, cmd_rx) = mpsc::channel(1);
        let (_stop_tx, stop_rx) = watch::channel(false);
        drop(cmd_tx);
        let session = tokio::time::timeout(
            Duration::from_secs(2),
            GameLoop::new(Session::local(1), cmd_rx, stop_rx).run(),
        )
        .await
        .unwrap();
        assert_eq!(session.table().current_player(), Player::One);
    }
}
