//! Move submission gate.
//!
//! Cheap local checks run before a move goes on the wire. The server still
//! decides; passing the gate only means the move is worth sending.

use std::sync::Arc;

use chess::{format_piece, format_square, parse_promotion, parse_square, Placement, RulesEngine};
use chess_proto::ClientMessage;
use thiserror::Error;
use tracing::debug;

use crate::channel::Outbound;
use crate::reconciler::GameSession;

/// Why the gate refused a move. Codes are stable across releases.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    #[error("not connected to the game server")]
    NotConnected,
    #[error("no active game")]
    NoActiveSession,
    #[error("the game is over")]
    SessionTerminal,
    #[error("you are not playing in this game")]
    NotAPlayer,
    #[error("it is not your turn")]
    NotYourTurn,
    #[error("not a square")]
    InvalidSquare,
    #[error("there is no piece on that square")]
    EmptySquare,
    #[error("that piece does not belong to you")]
    NotYourPiece,
    #[error("illegal move")]
    IllegalMove,
}

impl Rejection {
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotConnected => "not-connected",
            Self::NoActiveSession => "no-active-session",
            Self::SessionTerminal => "session-terminal",
            Self::NotAPlayer => "not-a-player",
            Self::NotYourTurn => "not-your-turn",
            Self::InvalidSquare => "invalid-square",
            Self::EmptySquare => "no-piece-on-square",
            Self::NotYourPiece => "piece-does-not-belong-to-you",
            Self::IllegalMove => "illegal-move",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveIntent {
    pub from: String,
    pub to: String,
    pub promotion: Option<String>,
}

impl MoveIntent {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            promotion: None,
        }
    }

    #[must_use]
    pub fn with_promotion(mut self, piece: impl Into<String>) -> Self {
        self.promotion = Some(piece.into());
        self
    }

    /// Parse `"e2e4"`, `"e7e8q"` or `"e7 e8 q"`.
    pub fn parse(input: &str) -> Option<Self> {
        let compact: String = input.split_whitespace().collect();
        if !compact.is_ascii() || !(4..=5).contains(&compact.len()) {
            return None;
        }
        Some(Self {
            from: compact[0..2].to_string(),
            to: compact[2..4].to_string(),
            promotion: compact.get(4..5).map(str::to_string),
        })
    }
}

pub struct MoveGate {
    rules: Arc<dyn RulesEngine>,
}

impl MoveGate {
    pub fn new(rules: Arc<dyn RulesEngine>) -> Self {
        Self { rules }
    }

    /// Check `intent` and send it. Returns the notation that was sent.
    ///
    /// Never touches the session; its state changes only when the server
    /// pushes the move back.
    pub fn submit(
        &self,
        intent: &MoveIntent,
        session: Option<&GameSession>,
        user_id: &str,
        out: &dyn Outbound,
    ) -> Result<String, Rejection> {
        let notation = self.check(intent, session, out)?;
        let session = session.ok_or(Rejection::NoActiveSession)?;
        out.send(ClientMessage::SubmitMove {
            session_id: session.session_id.clone(),
            user_id: user_id.to_string(),
            move_notation: notation.clone(),
        })
        .map_err(|_| Rejection::NotConnected)?;
        debug!(session_id = %session.session_id, %notation, "move submitted");
        Ok(notation)
    }

    fn check(
        &self,
        intent: &MoveIntent,
        session: Option<&GameSession>,
        out: &dyn Outbound,
    ) -> Result<String, Rejection> {
        if !out.is_connected() {
            return Err(Rejection::NotConnected);
        }
        let session = session.ok_or(Rejection::NoActiveSession)?;
        if session.is_terminal() {
            return Err(Rejection::SessionTerminal);
        }
        let color = session.local_color.ok_or(Rejection::NotAPlayer)?;
        if session.turn != color {
            return Err(Rejection::NotYourTurn);
        }

        let from = parse_square(&intent.from).ok_or(Rejection::InvalidSquare)?;
        let to = parse_square(&intent.to).ok_or(Rejection::InvalidSquare)?;
        let promotion = match intent.promotion.as_deref() {
            Some(p) => Some(parse_promotion(p).ok_or(Rejection::IllegalMove)?),
            None => None,
        };

        let placement =
            Placement::from_fen(&session.position).map_err(|_| Rejection::IllegalMove)?;
        let (_, owner) = placement.piece_on(from).ok_or(Rejection::EmptySquare)?;
        if owner != color {
            return Err(Rejection::NotYourPiece);
        }

        let (from, to) = (format_square(from), format_square(to));
        if !self.rules.is_legal(&session.position, &from, &to) {
            return Err(Rejection::IllegalMove);
        }

        let mut notation = format!("{from}{to}");
        if let Some(piece) = promotion {
            notation.push(format_piece(piece));
        }
        Ok(notation)
    }
}
