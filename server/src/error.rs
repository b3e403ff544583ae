use pong_shared::protocol::{ErrorCode, ErrorMsg, ServerMsg};

/// Every failure a peer can cause. All of them are answered on the
/// originating connection; none of them stop a room's loop.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GameError {
    #[error("invalid message: {0}")]
    Protocol(String),
    #[error("not allowed: {0}")]
    Unauthorized(String),
    #[error("room is full")]
    RoomFull,
    #[error("room {0} not found")]
    RoomNotFound(String),
    #[error("server cannot host more rooms")]
    RegistryFull,
    #[error("{0}")]
    InvalidState(String),
}

impl GameError {
    pub fn code(&self) -> ErrorCode {
        match self {
            GameError::Protocol(_) => ErrorCode::Protocol,
            GameError::Unauthorized(_) => ErrorCode::Unauthorized,
            GameError::RoomFull => ErrorCode::RoomFull,
            GameError::RoomNotFound(_) => ErrorCode::RoomNotFound,
            GameError::RegistryFull => ErrorCode::ServerFull,
            GameError::InvalidState(_) => ErrorCode::InvalidState,
        }
    }

    pub fn to_msg(&self) -> ServerMsg {
        ServerMsg::Error(ErrorMsg {
            code: self.code(),
            message: self.to_string(),
        })
    }
}

/// A simulation command arrived in a phase that does not accept it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum PhaseError {
    #[error("match is already initialized")]
    AlreadyInitialized,
    #[error("match has not been initialized")]
    NotInitialized,
    #[error("ball is already in play")]
    BallInPlay,
    #[error("match is finished")]
    Finished,
}

impl From<PhaseError> for GameError {
    fn from(err: PhaseError) -> Self {
        GameError::InvalidState(err.to_string())
    }
}
