use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::config::PhysicsConfig;
use crate::vec2::Vec2;

/// Protocol version - increment when making breaking changes.
pub const PROTOCOL_VERSION: u32 = 1;

/// Which end of the table a player defends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../web-client/src/generated/")]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Left,
    Right,
}

impl Side {
    pub const ALL: [Side; 2] = [Side::Left, Side::Right];
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Left => f.write_str("left"),
            Side::Right => f.write_str("right"),
        }
    }
}

/// Paddle movement intent. `Up` is towards y = 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../web-client/src/generated/")]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
}

impl Direction {
    pub fn sign(self) -> f64 {
        match self {
            Direction::Up => -1.0,
            Direction::Down => 1.0,
        }
    }
}

// === Server -> Client ===

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../web-client/src/generated/")]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ServerMsg {
    Welcome(WelcomeMsg),
    RoomCreated(RoomAssignedMsg),
    RoomJoined(RoomAssignedMsg),
    PlayerJoined(PlayerWire),
    PlayersUpdated(PlayersUpdatedMsg),
    PlayerAssigned(PlayerAssignedMsg),
    GameStarted,
    GameState(GameStateMsg),
    PointScored(PointScoredMsg),
    RoomClosed(RoomClosedMsg),
    Error(ErrorMsg),
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../web-client/src/generated/")]
#[serde(rename_all = "camelCase")]
pub struct WelcomeMsg {
    pub protocol_version: u32,
    pub server_version: String,
    pub player_id: u32,
    pub config: PhysicsConfig,
}

/// Reply to `create_room` / `join_room`.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../web-client/src/generated/")]
#[serde(rename_all = "camelCase")]
pub struct RoomAssignedMsg {
    pub room_code: String,
    pub player_id: u32,
    pub side: Side,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../web-client/src/generated/")]
#[serde(rename_all = "camelCase")]
pub struct PlayerWire {
    pub id: u32,
    pub side: Side,
    #[serde(default)]
    pub ready: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../web-client/src/generated/")]
#[serde(rename_all = "camelCase")]
pub struct PlayersUpdatedMsg {
    pub room_code: String,
    pub players: Vec<PlayerWire>,
}

/// `side` is null when the room had no free side.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../web-client/src/generated/")]
pub struct PlayerAssignedMsg {
    pub side: Option<Side>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../web-client/src/generated/")]
pub struct BallWire {
    pub position: Vec2,
    pub velocity: Vec2,
    pub spin: Vec2,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../web-client/src/generated/")]
pub struct PaddleWire {
    pub position: Vec2,
    pub velocity: Vec2,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../web-client/src/generated/")]
pub struct PaddlesWire {
    pub left: Option<PaddleWire>,
    pub right: Option<PaddleWire>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../web-client/src/generated/")]
pub struct ScoreWire {
    pub left: u32,
    pub right: u32,
}

/// Authoritative match snapshot. Only plain numbers cross the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../web-client/src/generated/")]
pub struct GameStateMsg {
    pub tick: u64,
    pub ball: Option<BallWire>,
    pub paddles: PaddlesWire,
    pub score: ScoreWire,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../web-client/src/generated/")]
pub struct PointScoredMsg {
    pub scorer: Side,
    pub score: ScoreWire,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../web-client/src/generated/")]
pub struct RoomClosedMsg {
    pub reason: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../web-client/src/generated/")]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    Protocol,
    Unauthorized,
    RoomFull,
    RoomNotFound,
    ServerFull,
    InvalidState,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../web-client/src/generated/")]
pub struct ErrorMsg {
    pub code: ErrorCode,
    pub message: String,
}

// === Client -> Server ===

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../web-client/src/generated/")]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ClientMsg {
    CreateRoom,
    JoinRoom(JoinRoomMsg),
    PlayerReady(PlayerReadyMsg),
    PaddleMove(PaddleMoveMsg),
    StartGame,
    ResetGame,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../web-client/src/generated/")]
#[serde(rename_all = "camelCase")]
pub struct JoinRoomMsg {
    pub room_code: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../web-client/src/generated/")]
#[serde(rename_all = "camelCase")]
pub struct PlayerReadyMsg {
    pub room_code: String,
    pub player_id: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export, export_to = "../../web-client/src/generated/")]
pub struct PaddleMoveMsg {
    pub side: Side,
    pub direction: Direction,
}

// === Conversion helpers ===

/// Round to 4 decimal places (plenty for table coordinates, keeps frames small)
#[inline]
pub fn round4(v: f64) -> f64 {
    (v * 10000.0).round() / 10000.0
}

#[inline]
pub fn round_vec2(v: Vec2) -> Vec2 {
    Vec2::new(round4(v.x), round4(v.y))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_msg_welcome_shape() {
        let msg = ServerMsg::Welcome(WelcomeMsg {
            protocol_version: PROTOCOL_VERSION,
            server_version: "0.1.0".to_string(),
            player_id: 7,
            config: PhysicsConfig::default(),
        });
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"type\":\"welcome\""));
        assert!(json.contains("\"protocolVersion\":1"));
        assert!(json.contains("\"playerId\":7"));
        let parsed: ServerMsg = serde_json::from_str(&json).unwrap();
        match parsed {
            ServerMsg::Welcome(w) => {
                assert_eq!(w.player_id, 7);
                assert_eq!(w.config, PhysicsConfig::default());
            }
            _ => panic!("Expected Welcome"),
        }
    }

    #[test]
    fn game_state_serializes_null_ball_and_paddles() {
        let msg = ServerMsg::GameState(GameStateMsg {
            tick: 3,
            ball: None,
            paddles: PaddlesWire::default(),
            score: ScoreWire { left: 2, right: 1 },
        });
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"type\":\"game_state\""));
        assert!(json.contains("\"ball\":null"));
        assert!(json.contains("\"left\":null"));
        assert!(json.contains("\"score\":{\"left\":2,\"right\":1}"));
    }

    #[test]
    fn game_state_carries_plain_numbers() {
        let msg = GameStateMsg {
            tick: 10,
            ball: Some(BallWire {
                position: Vec2::new(400.0, 300.0),
                velocity: Vec2::new(250.5, -12.25),
                spin: Vec2::ZERO,
            }),
            paddles: PaddlesWire {
                left: Some(PaddleWire {
                    position: Vec2::new(50.0, 250.0),
                    velocity: Vec2::ZERO,
                }),
                right: None,
            },
            score: ScoreWire::default(),
        };
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["ball"]["position"]["x"], 400.0);
        assert_eq!(value["ball"]["velocity"]["y"], -12.25);
        assert_eq!(value["paddles"]["left"]["position"]["y"], 250.0);
        assert!(value["paddles"]["right"].is_null());
    }

    #[test]
    fn payload_less_messages_omit_data() {
        let json = serde_json::to_string(&ServerMsg::GameStarted).unwrap();
        assert_eq!(json, "{\"type\":\"game_started\"}");
        let json = serde_json::to_string(&ClientMsg::StartGame).unwrap();
        assert_eq!(json, "{\"type\":\"start_game\"}");
    }

    #[test]
    fn client_msg_paddle_move_parses_wire_shape() {
        let json = r#"{"type":"paddle_move","data":{"side":"left","direction":"up"}}"#;
        match serde_json::from_str::<ClientMsg>(json).unwrap() {
            ClientMsg::PaddleMove(m) => {
                assert_eq!(m.side, Side::Left);
                assert_eq!(m.direction, Direction::Up);
            }
            other => panic!("Expected PaddleMove, got {:?}", other),
        }
    }

    #[test]
    fn client_msg_player_ready_is_camel_case() {
        let json = r#"{"type":"player_ready","data":{"roomCode":"ABC234","playerId":4}}"#;
        match serde_json::from_str::<ClientMsg>(json).unwrap() {
            ClientMsg::PlayerReady(m) => {
                assert_eq!(m.room_code, "ABC234");
                assert_eq!(m.player_id, 4);
            }
            other => panic!("Expected PlayerReady, got {:?}", other),
        }
    }

    #[test]
    fn client_msg_rejects_unknown_type_and_bad_payload() {
        assert!(serde_json::from_str::<ClientMsg>(r#"{"type":"teleport"}"#).is_err());
        assert!(serde_json::from_str::<ClientMsg>(
            r#"{"type":"paddle_move","data":{"side":"middle","direction":"up"}}"#
        )
        .is_err());
        assert!(serde_json::from_str::<ClientMsg>(r#"{"type":"join_room"}"#).is_err());
    }

    #[test]
    fn player_assigned_null_side() {
        let json =
            serde_json::to_string(&ServerMsg::PlayerAssigned(PlayerAssignedMsg { side: None }))
                .unwrap();
        assert_eq!(json, "{\"type\":\"player_assigned\",\"data\":{\"side\":null}}");
    }

    #[test]
    fn error_codes_are_snake_case() {
        let msg = ServerMsg::Error(ErrorMsg {
            code: ErrorCode::RoomNotFound,
            message: "room ZZZZZZ not found".to_string(),
        });
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"code\":\"room_not_found\""));
    }

    #[test]
    fn direction_sign_points_up_towards_zero() {
        assert_eq!(Direction::Up.sign(), -1.0);
        assert_eq!(Direction::Down.sign(), 1.0);
    }

    #[test]
    fn round4_trims_noise() {
        assert_eq!(round4(1.234567), 1.2346);
        assert_eq!(round_vec2(Vec2::new(400.0, 299.99999)), Vec2::new(400.0, 300.0));
    }
}
