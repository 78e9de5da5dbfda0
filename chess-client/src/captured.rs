//! Captured material derived from a position.
//!
//! The sets are a pure function of the placement: whatever is missing from a
//! side's starting material was captured by the other side. A promoted piece
//! beyond the starting count is paid for by a missing pawn, so promotions do
//! not show up as pawn captures.

use chess::{FenError, PieceColor, PieceKind, Placement};
use smallvec::SmallVec;

pub type PieceList = SmallVec<[PieceKind; 16]>;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapturedSets {
    /// Black pieces taken by white.
    pub by_white: PieceList,
    /// White pieces taken by black.
    pub by_black: PieceList,
}

impl CapturedSets {
    pub fn from_position(position: &str) -> Result<Self, FenError> {
        let placement = Placement::from_fen(position)?;
        Ok(Self {
            by_white: missing_material(&placement, PieceColor::Black),
            by_black: missing_material(&placement, PieceColor::White),
        })
    }

    pub fn is_empty(&self) -> bool {
        self.by_white.is_empty() && self.by_black.is_empty()
    }

    pub fn captured_by(&self, side: PieceColor) -> &[PieceKind] {
        match side {
            PieceColor::White => &self.by_white,
            PieceColor::Black => &self.by_black,
        }
    }

    /// Material balance in pawn units, positive when white is ahead.
    pub fn material_balance(&self) -> i32 {
        let value = |list: &PieceList| list.iter().map(|k| k.material_value()).sum::<i32>();
        value(&self.by_white) - value(&self.by_black)
    }
}

fn missing_material(placement: &Placement, color: PieceColor) -> PieceList {
    let mut missing = PieceList::new();
    let mut promoted = 0u8;

    for kind in PieceKind::ALL {
        if kind == PieceKind::Pawn || kind == PieceKind::King {
            continue;
        }
        let on_board = placement.count(kind, color);
        let start = kind.starting_count();
        promoted += on_board.saturating_sub(start);
        for _ in 0..start.saturating_sub(on_board) {
            missing.push(kind);
        }
    }

    let pawns = placement.count(PieceKind::Pawn, color);
    let lost_pawns = PieceKind::Pawn
        .starting_count()
        .saturating_sub(pawns)
        .saturating_sub(promoted);
    missing.extend(std::iter::repeat(PieceKind::Pawn).take(lost_pawns as usize));
    missing.sort_unstable_by(|a, b| b.cmp(a));
    missing
}

#[cfg(test)]
mod tests {
    use super::*;
    use chess::STARTING_FEN;

    #[test]
    fn test_starting_position_has_no_captures() {
        let sets = CapturedSets::from_position(STARTING_FEN).unwrap();
        assert!(sets.is_empty());
        assert_eq!(sets.material_balance(), 0);
    }

    #[test]
    fn test_pawn_trade() {
        // 1. e4 d5 2. exd5
        let fen = "rnbqkbnr/ppp1pppp/8/3P4/8/8/PPPP1PPP/RNBQKBNR b KQkq - 0 2";
        let sets = CapturedSets::from_position(fen).unwrap();
        assert_eq!(sets.by_white.as_slice(), &[PieceKind::Pawn]);
        assert!(sets.by_black.is_empty());
        assert_eq!(sets.material_balance(), 1);
    }

    #[test]
    fn test_pieces_sorted_by_value() {
        // White is missing the queen and a knight; black a pawn.
        let fen = "rnbqkbnr/ppppppp1/8/8/8/8/PPPPPPPP/R1B1KBNR w KQkq - 0 1";
        let sets = CapturedSets::from_position(fen).unwrap();
        assert_eq!(
            sets.by_black.as_slice(),
            &[PieceKind::Queen, PieceKind::Knight]
        );
        assert_eq!(sets.captured_by(PieceColor::White), &[PieceKind::Pawn]);
        assert_eq!(sets.material_balance(), 1 - 12);
    }

    #[test]
    fn test_promotion_is_not_a_pawn_capture() {
        // White's a-pawn promoted to a second queen on a8.
        let fen = "Q3k3/1ppppppp/8/8/8/8/1PPPPPPP/RNBQKBNR b KQ - 0 1";
        let sets = CapturedSets::from_position(fen).unwrap();
        assert!(sets.by_black.is_empty());
        assert!(sets.by_white.contains(&PieceKind::Pawn));
        assert_eq!(
            sets.by_white.iter().filter(|&&k| k == PieceKind::Pawn).count(),
            1
        );
    }

    #[test]
    fn test_pure_and_idempotent() {
        let fen = "rnbqkbnr/ppp1pppp/8/3P4/8/8/PPPP1PPP/RNBQKBNR b KQkq - 0 2";
        let first = CapturedSets::from_position(fen).unwrap();
        let second = CapturedSets::from_position(fen).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_malformed_position() {
        assert!(CapturedSets::from_position("not a fen").is_err());
    }
}
