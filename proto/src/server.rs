use serde::{Deserialize, Serialize};

use crate::types::{
    ColorPreference, GameOverPayload, GameStartPayload, GameStatePayload, MoveEntry, RosterEntry,
    TimeControl,
};
use chess::PieceColor;

/// Events pushed from the game server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ServerMessage {
    ConnectionAck,
    ConnectionError {
        reason: String,
    },
    Queued {
        #[serde(default)]
        info: Option<String>,
    },
    MatchFound {
        session_id: String,
        assigned_color: PieceColor,
    },
    MatchmakingCancelled,
    ChallengeReceived {
        challenger_id: String,
        challenger_name: String,
        mode: TimeControl,
        color_preference: ColorPreference,
    },
    ChallengeResponse {
        accepted: bool,
    },
    ChallengeError {
        reason: String,
    },
    GameStart(GameStartPayload),
    GameState(GameStatePayload),
    TimeUpdate {
        white_ms: u64,
        black_ms: u64,
    },
    GameOver(GameOverPayload),
    MoveHistoryBulk {
        moves: Vec<MoveEntry>,
    },
    OpponentDisconnected {
        message: String,
    },
    OpponentResumed {
        message: String,
    },
    InvalidMove {
        reason: String,
    },
    GenericError {
        message: String,
    },
    OnlineRoster {
        users: Vec<RosterEntry>,
    },
    RejoinFailed {
        session_id: String,
        reason: String,
    },
    /// Any event name this client does not know about.
    #[serde(other)]
    Unknown,
}

/// Discriminant of [`ServerMessage`], used to route events to subscribers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    ConnectionAck,
    ConnectionError,
    Queued,
    MatchFound,
    MatchmakingCancelled,
    ChallengeReceived,
    ChallengeResponse,
    ChallengeError,
    GameStart,
    GameState,
    TimeUpdate,
    GameOver,
    MoveHistoryBulk,
    OpponentDisconnected,
    OpponentResumed,
    InvalidMove,
    GenericError,
    OnlineRoster,
    RejoinFailed,
    Unknown,
}

impl ServerMessage {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::ConnectionAck => EventKind::ConnectionAck,
            Self::ConnectionError { .. } => EventKind::ConnectionError,
            Self::Queued { .. } => EventKind::Queued,
            Self::MatchFound { .. } => EventKind::MatchFound,
            Self::MatchmakingCancelled => EventKind::MatchmakingCancelled,
            Self::ChallengeReceived { .. } => EventKind::ChallengeReceived,
            Self::ChallengeResponse { .. } => EventKind::ChallengeResponse,
            Self::ChallengeError { .. } => EventKind::ChallengeError,
            Self::GameStart(_) => EventKind::GameStart,
            Self::GameState(_) => EventKind::GameState,
            Self::TimeUpdate { .. } => EventKind::TimeUpdate,
            Self::GameOver(_) => EventKind::GameOver,
            Self::MoveHistoryBulk { .. } => EventKind::MoveHistoryBulk,
            Self::OpponentDisconnected { .. } => EventKind::OpponentDisconnected,
            Self::OpponentResumed { .. } => EventKind::OpponentResumed,
            Self::InvalidMove { .. } => EventKind::InvalidMove,
            Self::GenericError { .. } => EventKind::GenericError,
            Self::OnlineRoster { .. } => EventKind::OnlineRoster,
            Self::RejoinFailed { .. } => EventKind::RejoinFailed,
            Self::Unknown => EventKind::Unknown,
        }
    }
}
