//! UCI long algebraic notation, the format moves are submitted in.

use cozy_chess::{File, Move, Rank, Square};

/// Convert UCI castling notation to cozy_chess notation
///
/// UCI uses standard notation (king moves 2 squares): e1g1, e1c1, e8g8, e8c8
/// cozy_chess uses king-to-rook notation: e1h1, e1a1, e8h8, e8a8
///
/// The conversion only happens when the king-to-rook move is actually in
/// `legal_moves`; otherwise the move is returned unchanged.
pub fn convert_uci_castling_to_cozy(mv: Move, legal_moves: &[Move]) -> Move {
    let is_back_rank = matches!(mv.from.rank(), Rank::First | Rank::Eighth);
    let is_e_file = matches!(mv.from.file(), File::E);
    let is_g_or_c_file = matches!(mv.to.file(), File::G | File::C);

    if !(is_back_rank && is_e_file && is_g_or_c_file && mv.promotion.is_none()) {
        return mv;
    }

    let rook_file = match mv.to.file() {
        File::G => File::H,
        _ => File::A,
    };
    let converted = Move {
        from: mv.from,
        to: Square::new(rook_file, mv.from.rank()),
        promotion: None,
    };

    if legal_moves.contains(&converted) {
        converted
    } else {
        mv
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fen::parse_fen;

    fn mv(from: Square, to: Square) -> Move {
        Move {
            from,
            to,
            promotion: None,
        }
    }

    fn legal(fen: &str) -> Vec<Move> {
        let board = parse_fen(fen).unwrap();
        let mut moves = Vec::new();
        board.generate_moves(|mvs| {
            moves.extend(mvs);
            false
        });
        moves
    }

    #[test]
    fn test_king_side_castle_converted_when_legal() {
        let moves = legal("r3k2r/8/8/8/8/8/8/R3K2R w KQkq - 0 1");
        let converted = convert_uci_castling_to_cozy(mv(Square::E1, Square::G1), &moves);
        assert_eq!(converted, mv(Square::E1, Square::H1));
    }

    #[test]
    fn test_castling_left_alone_when_not_legal() {
        let castle = mv(Square::E1, Square::G1);
        assert_eq!(convert_uci_castling_to_cozy(castle, &[]), castle);
    }

    #[test]
    fn test_ordinary_move_untouched() {
        let push = mv(Square::E2, Square::E4);
        assert_eq!(convert_uci_castling_to_cozy(push, &legal(crate::STARTING_FEN)), push);
    }
}
