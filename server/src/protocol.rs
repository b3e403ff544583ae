//! Server side of the wire protocol: parsing inbound frames, checking them
//! against what the connection is bound to, and flattening match state into
//! snapshots.

use crate::error::GameError;
use crate::match_state::MatchState;
use crate::physics::{Ball, Paddle};
use crate::registry::normalize_room_code;
use crate::room::{Player, PlayerId, RoomCommand};
use pong_shared::protocol::{
    round_vec2, BallWire, ClientMsg, GameStateMsg, PaddleWire, PaddlesWire, PlayerWire,
    ScoreWire, ServerMsg, Side,
};

const MAX_ROOM_CODE_LEN: usize = 16;

pub fn parse_client_msg(text: &str) -> Result<ClientMsg, GameError> {
    serde_json::from_str(text).map_err(|e| GameError::Protocol(e.to_string()))
}

pub fn encode(msg: &ServerMsg) -> Result<String, serde_json::Error> {
    serde_json::to_string(msg)
}

pub fn player_wire(player: &Player) -> PlayerWire {
    PlayerWire {
        id: player.id,
        side: player.side,
        ready: player.ready,
    }
}

fn ball_wire(ball: &Ball) -> BallWire {
    BallWire {
        position: round_vec2(ball.position),
        velocity: round_vec2(ball.velocity),
        spin: round_vec2(ball.spin),
    }
}

fn paddle_wire(paddle: &Paddle) -> PaddleWire {
    PaddleWire {
        position: round_vec2(paddle.position),
        velocity: round_vec2(paddle.velocity),
    }
}

pub fn game_state_msg(tick: u64, state: &MatchState) -> GameStateMsg {
    GameStateMsg {
        tick,
        ball: state.ball.as_ref().map(ball_wire),
        paddles: match &state.paddles {
            Some(p) => PaddlesWire {
                left: Some(paddle_wire(&p.left)),
                right: Some(paddle_wire(&p.right)),
            },
            None => PaddlesWire::default(),
        },
        score: ScoreWire {
            left: state.score.left,
            right: state.score.right,
        },
    }
}

/// The room a connection sits in. Connections keep the code, never the room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    pub room_code: String,
    pub side: Side,
}

/// What a validated client message asks for.
#[derive(Debug)]
pub enum Action {
    CreateRoom,
    JoinRoom(String),
    Room(RoomCommand),
}

/// Per-connection identity and room binding.
#[derive(Debug)]
pub struct Peer {
    pub player_id: PlayerId,
    binding: Option<Binding>,
}

impl Peer {
    pub fn new(player_id: PlayerId) -> Self {
        Self {
            player_id,
            binding: None,
        }
    }

    pub fn bind(&mut self, room_code: String, side: Side) {
        self.binding = Some(Binding { room_code, side });
    }

    pub fn unbind(&mut self) {
        self.binding = None;
    }

    /// Check a message against this connection's identity and binding.
    pub fn route(&self, msg: ClientMsg) -> Result<Action, GameError> {
        match msg {
            ClientMsg::CreateRoom => {
                self.require_unbound()?;
                Ok(Action::CreateRoom)
            }
            ClientMsg::JoinRoom(m) => {
                self.require_unbound()?;
                let code = normalize_room_code(&m.room_code);
                if code.is_empty()
                    || code.len() > MAX_ROOM_CODE_LEN
                    || !code.chars().all(|c| c.is_ascii_alphanumeric())
                {
                    return Err(GameError::Protocol(format!(
                        "malformed room code: {:?}",
                        m.room_code
                    )));
                }
                Ok(Action::JoinRoom(code))
            }
            ClientMsg::PlayerReady(m) => {
                let binding = self.require_bound()?;
                if normalize_room_code(&m.room_code) != binding.room_code {
                    return Err(GameError::Unauthorized(format!(
                        "not a member of room {}",
                        m.room_code
                    )));
                }
                if m.player_id != self.player_id {
                    return Err(GameError::Unauthorized(format!(
                        "cannot ready up player {}",
                        m.player_id
                    )));
                }
                Ok(Action::Room(RoomCommand::Ready {
                    player_id: self.player_id,
                }))
            }
            ClientMsg::PaddleMove(m) => {
                let binding = self.require_bound()?;
                if m.side != binding.side {
                    return Err(GameError::Unauthorized(format!(
                        "you control the {} paddle",
                        binding.side
                    )));
                }
                Ok(Action::Room(RoomCommand::PaddleMove {
                    player_id: self.player_id,
                    side: m.side,
                    direction: m.direction,
                }))
            }
            ClientMsg::StartGame => {
                self.require_bound()?;
                Ok(Action::Room(RoomCommand::StartGame {
                    player_id: self.player_id,
                }))
            }
            ClientMsg::ResetGame => {
                self.require_bound()?;
                Ok(Action::Room(RoomCommand::ResetGame {
                    player_id: self.player_id,
                }))
            }
        }
    }

    fn require_bound(&self) -> Result<&Binding, GameError> {
        self.binding
            .as_ref()
            .ok_or_else(|| GameError::InvalidState("not in a room".to_string()))
    }

    fn require_unbound(&self) -> Result<(), GameError> {
        match &self.binding {
            Some(b) => Err(GameError::InvalidState(format!(
                "already in room {}",
                b.room_code
            ))),
            None => Ok(()),
        }
    }
}
