use serde::{Deserialize, Serialize};

use crate::types::{ColorPreference, TimeControl};

/// Intents sent from the client to the game server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ClientMessage {
    /// First frame on every connection.
    Identify { user_id: String, auth_token: String },
    RequestOnlineRoster,
    FindMatch {
        mode: TimeControl,
        color_preference: ColorPreference,
    },
    CancelMatchmaking,
    ChallengeUser {
        opponent_id: String,
        mode: TimeControl,
        color_preference: ColorPreference,
    },
    RespondToChallenge {
        accept: bool,
        challenger_id: String,
    },
    JoinGame { session_id: String, user_id: String },
    RejoinGame { session_id: String, user_id: String },
    SubmitMove {
        session_id: String,
        user_id: String,
        move_notation: String,
    },
    LeaveGame { session_id: String, user_id: String },
}

impl ClientMessage {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Identify { .. } => "identify",
            Self::RequestOnlineRoster => "requestOnlineRoster",
            Self::FindMatch { .. } => "findMatch",
            Self::CancelMatchmaking => "cancelMatchmaking",
            Self::ChallengeUser { .. } => "challengeUser",
            Self::RespondToChallenge { .. } => "respondToChallenge",
            Self::JoinGame { .. } => "joinGame",
            Self::RejoinGame { .. } => "rejoinGame",
            Self::SubmitMove { .. } => "submitMove",
            Self::LeaveGame { .. } => "leaveGame",
        }
    }
}
