use chess::PieceColor;
use serde::{Deserialize, Serialize};

/// Fixed time-control classes offered by matchmaking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeControl {
    Bullet,
    Blitz,
    Rapid,
    Classical,
}

impl TimeControl {
    /// Starting clock for each side, in milliseconds.
    pub fn initial_ms(self) -> u64 {
        match self {
            Self::Bullet => 60_000,
            Self::Blitz => 180_000,
            Self::Rapid => 600_000,
            Self::Classical => 1_800_000,
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "bullet" => Some(Self::Bullet),
            "blitz" => Some(Self::Blitz),
            "rapid" => Some(Self::Rapid),
            "classical" => Some(Self::Classical),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorPreference {
    White,
    Black,
    #[default]
    Random,
}

impl ColorPreference {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "random" => Some(Self::Random),
            other => PieceColor::parse(other).map(|c| match c {
                PieceColor::White => Self::White,
                PieceColor::Black => Self::Black,
            }),
        }
    }
}

/// One entry of a move history push.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveEntry {
    pub index: u32,
    pub notation: String,
    pub mover: PieceColor,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_timestamp_delta: Option<u64>,
    /// Position after the move, when the server includes it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resulting_position: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameStartPayload {
    pub session_id: String,
    pub initial_position: String,
    pub white_id: String,
    pub black_id: String,
    /// Zero when the server leaves clocks to the time control.
    #[serde(default)]
    pub white_ms: u64,
    #[serde(default)]
    pub black_ms: u64,
    #[serde(default)]
    pub is_resumed_game: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameStatePayload {
    pub move_index: u32,
    pub notation: String,
    pub mover: PieceColor,
    pub resulting_position: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_timestamp_delta: Option<u64>,
}

impl GameStatePayload {
    pub fn to_move_entry(&self) -> MoveEntry {
        MoveEntry {
            index: self.move_index,
            notation: self.notation.clone(),
            mover: self.mover,
            server_timestamp_delta: self.server_timestamp_delta,
            resulting_position: Some(self.resulting_position.clone()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ResultKind {
    Checkmate,
    Stalemate,
    Draw,
    Timeout,
    Resignation,
    Abandoned,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RatingDeltas {
    pub white: i32,
    pub black: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameOverPayload {
    pub result_kind: ResultKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub winner: Option<PieceColor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating_deltas: Option<RatingDeltas>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RosterEntry {
    pub user_id: String,
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<u32>,
}
