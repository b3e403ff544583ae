//! A room pairs two players with one simulation.
//!
//! `Room` is plain state driven by `handle` and `tick`; `run_room` owns it on
//! its own task, drains the command queue at the start of every tick and
//! publishes whatever the room queued for its peers.

use crate::error::GameError;
use crate::protocol::{game_state_msg, player_wire};
use crate::registry::SessionRegistry;
use crate::simulation::Simulation;
use crate::ticker::Ticker;
use pong_shared::config::PhysicsConfig;
use pong_shared::protocol::{
    Direction, PlayersUpdatedMsg, PointScoredMsg, RoomClosedMsg, ScoreWire, ServerMsg, Side,
};
use std::time::Duration;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::{broadcast, mpsc, oneshot};

pub type PlayerId = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomStatus {
    Waiting,
    Playing,
    Finished,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Player {
    pub id: PlayerId,
    pub side: Side,
    pub ready: bool,
}

/// Commands from client connections to a room's loop
#[derive(Debug)]
pub enum RoomCommand {
    Join {
        player_id: PlayerId,
        response: oneshot::Sender<Result<Side, GameError>>,
    },
    Ready {
        player_id: PlayerId,
    },
    PaddleMove {
        player_id: PlayerId,
        side: Side,
        direction: Direction,
    },
    StartGame {
        player_id: PlayerId,
    },
    ResetGame {
        player_id: PlayerId,
    },
    Leave {
        player_id: PlayerId,
    },
}

/// Frames published by a room. Connections drop `To` frames meant for
/// someone else.
#[derive(Debug, Clone)]
pub enum Outbound {
    All(ServerMsg),
    To(PlayerId, ServerMsg),
}

pub struct Room {
    code: String,
    players: Vec<Player>,
    status: RoomStatus,
    sim: Simulation,
    tick: u64,
    outbox: Vec<Outbound>,
}

impl Room {
    pub fn new(code: String, physics: PhysicsConfig, seed: u64) -> Self {
        Self {
            code,
            players: Vec::with_capacity(2),
            status: RoomStatus::Waiting,
            sim: Simulation::new(physics, seed),
            tick: 0,
            outbox: Vec::new(),
        }
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn status(&self) -> RoomStatus {
        self.status
    }

    pub fn players(&self) -> &[Player] {
        &self.players
    }

    pub fn simulation(&self) -> &Simulation {
        &self.sim
    }

    pub fn is_closed(&self) -> bool {
        self.status == RoomStatus::Finished
    }

    /// Frames queued since the last call.
    pub fn take_outbox(&mut self) -> Vec<Outbound> {
        std::mem::take(&mut self.outbox)
    }

    pub fn handle(&mut self, cmd: RoomCommand) {
        match cmd {
            RoomCommand::Join {
                player_id,
                response,
            } => {
                let result = self.join(player_id);
                let joined = result.is_ok();
                if response.send(result).is_err() && joined {
                    // The connection went away while waiting for the answer.
                    self.leave(player_id);
                }
            }
            RoomCommand::Ready { player_id } => {
                let result = self.ready(player_id);
                self.report(player_id, result);
            }
            RoomCommand::PaddleMove {
                player_id,
                side,
                direction,
            } => {
                let result = self.move_paddle(player_id, side, direction);
                self.report(player_id, result);
            }
            RoomCommand::StartGame { player_id } => {
                let result = self.start_game(player_id);
                self.report(player_id, result);
            }
            RoomCommand::ResetGame { player_id } => {
                let result = self.reset_game(player_id);
                self.report(player_id, result);
            }
            RoomCommand::Leave { player_id } => self.leave(player_id),
        }
    }

    /// First joiner defends the left, second the right.
    pub fn join(&mut self, player_id: PlayerId) -> Result<Side, GameError> {
        if self.is_closed() {
            return Err(GameError::RoomNotFound(self.code.clone()));
        }
        if self.player(player_id).is_some() {
            return Err(GameError::InvalidState("already in this room".to_string()));
        }
        let side = Side::ALL
            .into_iter()
            .find(|side| self.players.iter().all(|p| p.side != *side))
            .ok_or(GameError::RoomFull)?;

        let player = Player {
            id: player_id,
            side,
            ready: false,
        };
        for other in &self.players {
            self.outbox
                .push(Outbound::To(other.id, ServerMsg::PlayerJoined(player_wire(&player))));
        }
        self.players.push(player);
        self.players.sort_by_key(|p| p.side == Side::Right);
        self.push_roster();

        tracing::info!("Player {} joined room {} on the {}", player_id, self.code, side);
        Ok(side)
    }

    /// Mark a player ready; the match starts once both sides are ready.
    pub fn ready(&mut self, player_id: PlayerId) -> Result<(), GameError> {
        let player = self
            .players
            .iter_mut()
            .find(|p| p.id == player_id)
            .ok_or_else(|| not_a_member(player_id))?;
        if player.ready {
            return Ok(());
        }
        player.ready = true;
        self.push_roster();

        let all_ready = self.players.len() == 2 && self.players.iter().all(|p| p.ready);
        if self.status == RoomStatus::Waiting && all_ready {
            self.sim.initialize()?;
            self.status = RoomStatus::Playing;
            self.outbox.push(Outbound::All(ServerMsg::GameStarted));
            self.push_state();
            tracing::info!("Room {} started", self.code);
        }
        Ok(())
    }

    pub fn move_paddle(
        &mut self,
        player_id: PlayerId,
        side: Side,
        direction: Direction,
    ) -> Result<(), GameError> {
        let player = self.player(player_id).ok_or_else(|| not_a_member(player_id))?;
        if player.side != side {
            return Err(GameError::Unauthorized(format!(
                "player {} controls the {} paddle",
                player_id, player.side
            )));
        }
        self.require_playing()?;
        self.sim.move_paddle(side, direction)?;
        Ok(())
    }

    pub fn start_game(&mut self, player_id: PlayerId) -> Result<(), GameError> {
        self.player(player_id).ok_or_else(|| not_a_member(player_id))?;
        self.require_playing()?;
        self.sim.serve()?;
        tracing::debug!("Player {} served in room {}", player_id, self.code);
        Ok(())
    }

    pub fn reset_game(&mut self, player_id: PlayerId) -> Result<(), GameError> {
        self.player(player_id).ok_or_else(|| not_a_member(player_id))?;
        self.require_playing()?;
        self.sim.reset();
        self.sim.initialize()?;
        self.push_state();
        tracing::info!("Player {} reset room {}", player_id, self.code);
        Ok(())
    }

    /// A departure during a match finishes the room; an empty room finishes too.
    pub fn leave(&mut self, player_id: PlayerId) {
        let Some(index) = self.players.iter().position(|p| p.id == player_id) else {
            return;
        };
        let player = self.players.remove(index);
        tracing::info!("Player {} left room {}", player.id, self.code);

        match self.status {
            RoomStatus::Playing => {
                self.finish(format!("the {} player left", player.side));
            }
            RoomStatus::Waiting if self.players.is_empty() => {
                self.finish("room is empty".to_string());
            }
            RoomStatus::Waiting => self.push_roster(),
            RoomStatus::Finished => {}
        }
    }

    /// Advance the match by `dt` seconds and queue the resulting state.
    pub fn tick(&mut self, dt: f64) {
        if self.status != RoomStatus::Playing {
            return;
        }
        self.tick += 1;
        if let Some(scorer) = self.sim.tick(dt) {
            let score = self.sim.state().score;
            tracing::debug!(
                "Room {}: {} scores ({}-{})",
                self.code,
                scorer,
                score.left,
                score.right
            );
            self.outbox.push(Outbound::All(ServerMsg::PointScored(PointScoredMsg {
                scorer,
                score: ScoreWire {
                    left: score.left,
                    right: score.right,
                },
            })));
        }
        self.push_state();
    }

    fn finish(&mut self, reason: String) {
        self.status = RoomStatus::Finished;
        self.sim.finish();
        tracing::info!("Room {} finished: {}", self.code, reason);
        self.outbox
            .push(Outbound::All(ServerMsg::RoomClosed(RoomClosedMsg { reason })));
    }

    fn player(&self, player_id: PlayerId) -> Option<&Player> {
        self.players.iter().find(|p| p.id == player_id)
    }

    fn require_playing(&self) -> Result<(), GameError> {
        match self.status {
            RoomStatus::Playing => Ok(()),
            RoomStatus::Waiting => Err(GameError::InvalidState(
                "game has not started yet".to_string(),
            )),
            RoomStatus::Finished => Err(GameError::InvalidState("room is closed".to_string())),
        }
    }

    fn report(&mut self, player_id: PlayerId, result: Result<(), GameError>) {
        if let Err(err) = result {
            tracing::warn!("Room {}: rejected command from {}: {}", self.code, player_id, err);
            self.outbox.push(Outbound::To(player_id, err.to_msg()));
        }
    }

    fn push_roster(&mut self) {
        self.outbox
            .push(Outbound::All(ServerMsg::PlayersUpdated(PlayersUpdatedMsg {
                room_code: self.code.clone(),
                players: self.players.iter().map(player_wire).collect(),
            })));
    }

    fn push_state(&mut self) {
        let msg = game_state_msg(self.tick, self.sim.state());
        self.outbox.push(Outbound::All(ServerMsg::GameState(msg)));
    }

    #[cfg(test)]
    pub(crate) fn simulation_mut(&mut self) -> &mut Simulation {
        &mut self.sim
    }
}

fn not_a_member(player_id: PlayerId) -> GameError {
    GameError::Unauthorized(format!("player {} is not in this room", player_id))
}

/// Run one room until it closes, then drop it from the registry.
pub async fn run_room(
    mut room: Room,
    mut cmd_rx: mpsc::Receiver<RoomCommand>,
    broadcast_tx: broadcast::Sender<Outbound>,
    registry: SessionRegistry,
    tick_interval: Duration,
    max_dt: f64,
) {
    let mut ticker = Ticker::new(tick_interval, max_dt);

    loop {
        let dt = ticker.tick().await;

        loop {
            match cmd_rx.try_recv() {
                Ok(cmd) => room.handle(cmd),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    tracing::error!("Room {} lost its command queue", room.code());
                    room.finish("server is shutting down".to_string());
                    break;
                }
            }
        }

        if let Some(dt) = dt {
            room.tick(dt);
        }

        for out in room.take_outbox() {
            // No subscribers is fine: the frame is simply dropped.
            let _ = broadcast_tx.send(out);
        }

        if room.is_closed() {
            break;
        }
    }

    registry.remove_room(room.code());
    tracing::info!("Room {} loop ended", room.code());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::Phase;
    use pong_shared::protocol::ErrorCode;
    use pong_shared::vec2::Vec2;

    fn room() -> Room {
        Room::new("ABC234".to_string(), PhysicsConfig::default(), 1)
    }

    fn playing_room() -> Room {
        let mut r = room();
        r.join(1).unwrap();
        r.join(2).unwrap();
        r.ready(1).unwrap();
        r.ready(2).unwrap();
        r.take_outbox();
        r
    }

    fn errors_for(outbox: &[Outbound], player_id: PlayerId) -> Vec<ErrorCode> {
        outbox
            .iter()
            .filter_map(|o| match o {
                Outbound::To(id, ServerMsg::Error(e)) if *id == player_id => Some(e.code),
                _ => None,
            })
            .collect()
    }

    fn last_state(outbox: &[Outbound]) -> Option<pong_shared::protocol::GameStateMsg> {
        outbox.iter().rev().find_map(|o| match o {
            Outbound::All(ServerMsg::GameState(s)) => Some(s.clone()),
            _ => None,
        })
    }

    #[test]
    fn first_joiner_left_second_right() {
        let mut r = room();
        assert_eq!(r.join(10), Ok(Side::Left));
        assert_eq!(r.join(11), Ok(Side::Right));
        assert_eq!(r.players().len(), 2);
        assert_eq!(r.status(), RoomStatus::Waiting);
    }

    #[test]
    fn third_join_is_rejected_without_touching_roster() {
        let mut r = room();
        r.join(1).unwrap();
        r.join(2).unwrap();
        let roster = r.players().to_vec();
        r.take_outbox();
        assert_eq!(r.join(3), Err(GameError::RoomFull));
        assert_eq!(r.players(), roster.as_slice());
        assert!(r.take_outbox().is_empty());
    }

    #[test]
    fn joining_twice_is_rejected() {
        let mut r = room();
        r.join(1).unwrap();
        assert!(matches!(r.join(1), Err(GameError::InvalidState(_))));
        assert_eq!(r.players().len(), 1);
    }

    #[test]
    fn join_notifies_existing_player() {
        let mut r = room();
        r.join(1).unwrap();
        r.take_outbox();
        r.join(2).unwrap();
        let out = r.take_outbox();
        assert!(out.iter().any(|o| matches!(
            o,
            Outbound::To(1, ServerMsg::PlayerJoined(p)) if p.id == 2 && p.side == Side::Right
        )));
        assert!(out.iter().any(|o| matches!(
            o,
            Outbound::All(ServerMsg::PlayersUpdated(m)) if m.players.len() == 2
        )));
    }

    #[test]
    fn freed_side_goes_to_next_joiner() {
        let mut r = room();
        r.join(1).unwrap();
        r.join(2).unwrap();
        r.leave(1);
        assert_eq!(r.status(), RoomStatus::Waiting);
        assert_eq!(r.join(3), Ok(Side::Left));
        assert_eq!(r.players()[0].id, 3);
    }

    #[test]
    fn starts_only_when_both_ready() {
        let mut r = room();
        r.join(1).unwrap();
        r.ready(1).unwrap();
        assert_eq!(r.status(), RoomStatus::Waiting);
        r.join(2).unwrap();
        assert_eq!(r.status(), RoomStatus::Waiting);
        r.take_outbox();
        r.ready(2).unwrap();
        assert_eq!(r.status(), RoomStatus::Playing);
        assert_eq!(r.simulation().phase(), Phase::Serving);
        let out = r.take_outbox();
        assert!(out
            .iter()
            .any(|o| matches!(o, Outbound::All(ServerMsg::GameStarted))));
        let state = last_state(&out).unwrap();
        assert!(state.ball.is_none());
        assert!(state.paddles.left.is_some() && state.paddles.right.is_some());
    }

    #[test]
    fn ready_from_stranger_is_unauthorized() {
        let mut r = room();
        r.join(1).unwrap();
        assert!(matches!(r.ready(99), Err(GameError::Unauthorized(_))));
    }

    #[test]
    fn paddle_move_for_other_side_is_a_no_op() {
        let mut r = playing_room();
        let before = r.simulation().state().clone();
        r.handle(RoomCommand::PaddleMove {
            player_id: 2,
            side: Side::Left,
            direction: Direction::Up,
        });
        assert_eq!(r.simulation().state(), &before);
        assert_eq!(errors_for(&r.take_outbox(), 2), vec![ErrorCode::Unauthorized]);
    }

    #[test]
    fn paddle_move_for_own_side_applies() {
        let mut r = playing_room();
        r.handle(RoomCommand::PaddleMove {
            player_id: 2,
            side: Side::Right,
            direction: Direction::Down,
        });
        let paddles = r.simulation().state().paddles.unwrap();
        assert_eq!(paddles.right.velocity, Vec2::new(0.0, 300.0));
        assert!(r.take_outbox().is_empty());
    }

    #[test]
    fn commands_before_start_are_rejected() {
        let mut r = room();
        r.join(1).unwrap();
        r.take_outbox();
        r.handle(RoomCommand::StartGame { player_id: 1 });
        r.handle(RoomCommand::PaddleMove {
            player_id: 1,
            side: Side::Left,
            direction: Direction::Up,
        });
        assert_eq!(
            errors_for(&r.take_outbox(), 1),
            vec![ErrorCode::InvalidState, ErrorCode::InvalidState]
        );
    }

    #[test]
    fn serve_then_ticks_broadcast_moving_ball() {
        let mut r = playing_room();
        r.handle(RoomCommand::StartGame { player_id: 1 });
        r.tick(1.0 / 60.0);
        let state = last_state(&r.take_outbox()).unwrap();
        let ball = state.ball.unwrap();
        assert!(ball.velocity.x != 0.0);
        assert_eq!(state.tick, 1);
    }

    #[test]
    fn double_serve_is_reported() {
        let mut r = playing_room();
        r.handle(RoomCommand::StartGame { player_id: 1 });
        r.handle(RoomCommand::StartGame { player_id: 2 });
        assert_eq!(errors_for(&r.take_outbox(), 2), vec![ErrorCode::InvalidState]);
    }

    #[test]
    fn forced_exit_scores_and_recentres_ball() {
        let mut r = playing_room();
        r.start_game(1).unwrap();
        {
            let ball = r.simulation_mut().ball_mut().unwrap();
            ball.position.x = -1.0;
            ball.velocity = Vec2::new(-300.0, 0.0);
        }
        r.tick(1.0 / 60.0);
        let out = r.take_outbox();
        assert!(out.iter().any(|o| matches!(
            o,
            Outbound::All(ServerMsg::PointScored(p)) if p.scorer == Side::Right
        )));
        let state = last_state(&out).unwrap();
        assert_eq!(state.score.right, 1);
        assert_eq!(state.score.left, 0);
        let ball = state.ball.unwrap();
        assert_eq!(ball.position, Vec2::new(400.0, 300.0));
    }

    #[test]
    fn reset_game_clears_score_and_reinitializes() {
        let mut r = playing_room();
        r.start_game(1).unwrap();
        {
            let ball = r.simulation_mut().ball_mut().unwrap();
            ball.position.x = 801.0;
            ball.velocity = Vec2::new(300.0, 0.0);
        }
        r.tick(0.01);
        assert_eq!(r.simulation().state().score.left, 1);
        r.handle(RoomCommand::ResetGame { player_id: 2 });
        let state = r.simulation().state();
        assert_eq!(state.score.left, 0);
        assert!(state.ball.is_none());
        assert!(state.paddles.is_some());
        assert_eq!(r.simulation().phase(), Phase::Serving);
    }

    #[test]
    fn leaving_mid_match_finishes_room() {
        let mut r = playing_room();
        r.handle(RoomCommand::Leave { player_id: 1 });
        assert!(r.is_closed());
        assert_eq!(r.simulation().phase(), Phase::Finished);
        let out = r.take_outbox();
        assert!(out
            .iter()
            .any(|o| matches!(o, Outbound::All(ServerMsg::RoomClosed(_)))));
        // A finished room neither ticks nor accepts players.
        r.tick(0.01);
        assert!(r.take_outbox().is_empty());
        assert!(matches!(r.join(5), Err(GameError::RoomNotFound(_))));
    }

    #[test]
    fn last_player_leaving_waiting_room_closes_it() {
        let mut r = room();
        r.join(1).unwrap();
        r.leave(1);
        assert!(r.is_closed());
    }

    #[test]
    fn waiting_room_survives_one_departure() {
        let mut r = room();
        r.join(1).unwrap();
        r.join(2).unwrap();
        r.leave(2);
        assert!(!r.is_closed());
        assert_eq!(r.players().len(), 1);
    }

    #[test]
    fn join_reply_to_vanished_connection_is_undone() {
        let mut r = room();
        let (tx, rx) = oneshot::channel();
        drop(rx);
        r.handle(RoomCommand::Join {
            player_id: 1,
            response: tx,
        });
        assert!(r.players().is_empty());
    }

    #[test]
    fn waiting_room_does_not_tick() {
        let mut r = room();
        r.join(1).unwrap();
        r.take_outbox();
        r.tick(0.01);
        assert!(r.take_outbox().is_empty());
    }
}
