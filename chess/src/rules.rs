//! Advisory legality queries.
//!
//! The game server is authoritative; these checks only exist so the client
//! can refuse obviously wrong moves without a round trip.

use cozy_chess::{Board, Move};

use crate::converters::parse_square;
use crate::fen::{format_fen, parse_fen, FenError};
use crate::uci::convert_uci_castling_to_cozy;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RulesError {
    #[error("Invalid position: {0}")]
    InvalidPosition(#[from] FenError),
    #[error("Invalid square: {0}")]
    InvalidSquare(String),
    #[error("Invalid promotion piece: {0}")]
    InvalidPromotion(String),
    #[error("Illegal move {from}{to}")]
    IllegalMove { from: String, to: String },
}

/// The rules collaborator consumed by the move gate.
pub trait RulesEngine: Send + Sync {
    /// Whether any legal move goes from `from` to `to` in `position`.
    fn is_legal(&self, position: &str, from: &str, to: &str) -> bool;

    /// Play the move and return the resulting FEN.
    fn apply_move(
        &self,
        position: &str,
        from: &str,
        to: &str,
        promotion: Option<&str>,
    ) -> Result<String, RulesError>;
}

/// [`RulesEngine`] backed by cozy-chess move generation.
#[derive(Debug, Clone, Copy, Default)]
pub struct CozyRules;

impl CozyRules {
    fn legal_moves(board: &Board) -> Vec<Move> {
        let mut moves = Vec::new();
        board.generate_moves(|mvs| {
            moves.extend(mvs);
            false
        });
        moves
    }

    fn resolve(
        position: &str,
        from: &str,
        to: &str,
        promotion: Option<&str>,
    ) -> Result<(Board, Move, Vec<Move>), RulesError> {
        let board = parse_fen(position)?;
        let from_sq = parse_square(from).ok_or_else(|| RulesError::InvalidSquare(from.into()))?;
        let to_sq = parse_square(to).ok_or_else(|| RulesError::InvalidSquare(to.into()))?;
        let promotion = match promotion {
            Some(p) => Some(
                crate::converters::parse_promotion(p)
                    .ok_or_else(|| RulesError::InvalidPromotion(p.into()))?,
            ),
            None => None,
        };
        let legal = Self::legal_moves(&board);
        let mv = convert_uci_castling_to_cozy(
            Move {
                from: from_sq,
                to: to_sq,
                promotion,
            },
            &legal,
        );
        Ok((board, mv, legal))
    }
}

impl RulesEngine for CozyRules {
    fn is_legal(&self, position: &str, from: &str, to: &str) -> bool {
        match Self::resolve(position, from, to, None) {
            Ok((_, mv, legal)) => legal.iter().any(|m| m.from == mv.from && m.to == mv.to),
            Err(_) => false,
        }
    }

    fn apply_move(
        &self,
        position: &str,
        from: &str,
        to: &str,
        promotion: Option<&str>,
    ) -> Result<String, RulesError> {
        let (mut board, mv, legal) = Self::resolve(position, from, to, promotion)?;
        if !legal.contains(&mv) {
            return Err(RulesError::IllegalMove {
                from: from.into(),
                to: to.into(),
            });
        }
        board.play_unchecked(mv);
        Ok(format_fen(&board))
    }
}
