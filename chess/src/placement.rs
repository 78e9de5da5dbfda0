//! Board placement parsed straight from the first FEN field.
//!
//! Used where only "which piece stands where" matters (ownership checks,
//! material counting), so it tolerates positions that a full rules parser
//! would reject, such as boards without kings.

use cozy_chess::Square;

use crate::fen::FenError;
use crate::types::{PieceColor, PieceKind};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Placement {
    /// Indexed `[rank][file]`, rank 0 = first rank.
    squares: [[Option<(PieceKind, PieceColor)>; 8]; 8],
    side_to_move: Option<PieceColor>,
}

impl Placement {
    pub fn from_fen(fen: &str) -> Result<Self, FenError> {
        let mut fields = fen.split_whitespace();
        let placement = fields.next().ok_or(FenError::InvalidFormat)?;
        let side_to_move = fields.next().and_then(PieceColor::parse);

        let ranks: Vec<&str> = placement.split('/').collect();
        if ranks.len() != 8 {
            return Err(FenError::InvalidBoardLayout);
        }

        let mut squares = [[None; 8]; 8];
        for (rank_idx, rank_str) in ranks.iter().enumerate() {
            let rank = 7 - rank_idx;
            let mut file = 0usize;
            for c in rank_str.chars() {
                if let Some(skip) = c.to_digit(10) {
                    file += skip as usize;
                    if file > 8 {
                        return Err(FenError::InvalidBoardLayout);
                    }
                    continue;
                }
                if file > 7 {
                    return Err(FenError::InvalidBoardLayout);
                }
                let kind = PieceKind::from_char(c).ok_or(FenError::InvalidPiece(c))?;
                let color = if c.is_ascii_uppercase() {
                    PieceColor::White
                } else {
                    PieceColor::Black
                };
                squares[rank][file] = Some((kind, color));
                file += 1;
            }
            if file != 8 {
                return Err(FenError::InvalidBoardLayout);
            }
        }

        Ok(Self {
            squares,
            side_to_move,
        })
    }

    pub fn piece_on(&self, square: Square) -> Option<(PieceKind, PieceColor)> {
        self.squares[square.rank() as usize][square.file() as usize]
    }

    /// Side to move from the second FEN field, when present.
    pub fn side_to_move(&self) -> Option<PieceColor> {
        self.side_to_move
    }

    pub fn count(&self, kind: PieceKind, color: PieceColor) -> u8 {
        self.pieces()
            .filter(|&(k, c)| k == kind && c == color)
            .count() as u8
    }

    pub fn pieces(&self) -> impl Iterator<Item = (PieceKind, PieceColor)> + '_ {
        self.squares.iter().flatten().filter_map(|sq| *sq)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::converters::parse_square;
    use crate::fen::STARTING_FEN;

    #[test]
    fn test_starting_position() {
        let board = Placement::from_fen(STARTING_FEN).unwrap();
        assert_eq!(
            board.piece_on(parse_square("a1").unwrap()),
            Some((PieceKind::Rook, PieceColor::White))
        );
        assert_eq!(
            board.piece_on(parse_square("e1").unwrap()),
            Some((PieceKind::King, PieceColor::White))
        );
        assert_eq!(
            board.piece_on(parse_square("d8").unwrap()),
            Some((PieceKind::Queen, PieceColor::Black))
        );
        assert_eq!(board.piece_on(parse_square("e4").unwrap()), None);
        assert_eq!(board.side_to_move(), Some(PieceColor::White));
        assert_eq!(board.pieces().count(), 32);
    }

    #[test]
    fn test_empty_board() {
        let board = Placement::from_fen("8/8/8/8/8/8/8/8 w - - 0 1").unwrap();
        assert_eq!(board.pieces().count(), 0);
    }

    #[test]
    fn test_counts_after_capture() {
        // 1. e4 d5 2. exd5
        let board =
            Placement::from_fen("rnbqkbnr/ppp1pppp/8/3P4/8/8/PPPP1PPP/RNBQKBNR b KQkq - 0 2")
                .unwrap();
        assert_eq!(board.count(PieceKind::Pawn, PieceColor::White), 8);
        assert_eq!(board.count(PieceKind::Pawn, PieceColor::Black), 7);
        assert_eq!(board.side_to_move(), Some(PieceColor::Black));
    }

    #[test]
    fn test_rejects_malformed_placement() {
        assert_eq!(
            Placement::from_fen("8/8/8/8/8/8/8 w - - 0 1"),
            Err(FenError::InvalidBoardLayout)
        );
        assert_eq!(
            Placement::from_fen("9/8/8/8/8/8/8/8 w - - 0 1"),
            Err(FenError::InvalidBoardLayout)
        );
        assert_eq!(
            Placement::from_fen("7x/8/8/8/8/8/8/8 w - - 0 1"),
            Err(FenError::InvalidPiece('x'))
        );
        assert_eq!(Placement::from_fen(""), Err(FenError::InvalidFormat));
    }
}
