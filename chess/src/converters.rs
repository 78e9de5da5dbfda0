//! String conversions between wire notation and cozy-chess types.

use cozy_chess::{File, Piece, Rank, Square};

/// Parse a square like `"e4"`. Returns `None` for anything else.
pub fn parse_square(s: &str) -> Option<Square> {
    let mut chars = s.chars();
    let file = chars.next()?;
    let rank = chars.next()?;
    if chars.next().is_some() {
        return None;
    }
    let file_idx = (file.to_ascii_lowercase() as u32).checked_sub('a' as u32)? as usize;
    let rank_idx = (rank as u32).checked_sub('1' as u32)? as usize;
    if file_idx >= 8 || rank_idx >= 8 {
        return None;
    }
    Some(Square::new(File::ALL[file_idx], Rank::ALL[rank_idx]))
}

pub fn format_square(sq: Square) -> String {
    let file = (b'a' + sq.file() as u8) as char;
    let rank = (b'1' + sq.rank() as u8) as char;
    format!("{}{}", file, rank)
}

/// Lowercase piece letter as used in UCI promotion suffixes.
pub fn format_piece(piece: Piece) -> char {
    match piece {
        Piece::Pawn => 'p',
        Piece::Knight => 'n',
        Piece::Bishop => 'b',
        Piece::Rook => 'r',
        Piece::Queen => 'q',
        Piece::King => 'k',
    }
}

/// Parse a promotion piece. Accepts a single letter (`"q"`, `"N"`) or a
/// full name (`"queen"`). Pawns and kings are never valid promotions.
pub fn parse_promotion(s: &str) -> Option<Piece> {
    let piece = match s.to_ascii_lowercase().as_str() {
        "q" | "queen" => Piece::Queen,
        "r" | "rook" => Piece::Rook,
        "b" | "bishop" => Piece::Bishop,
        "n" | "knight" => Piece::Knight,
        _ => return None,
    };
    Some(piece)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_format_square() {
        let sq = parse_square("e4").unwrap();
        assert_eq!(sq, Square::new(File::E, Rank::Fourth));
        assert_eq!(format_square(sq), "e4");
        assert_eq!(format_square(Square::new(File::H, Rank::Eighth)), "h8");
    }

    #[test]
    fn test_parse_square_rejects_garbage() {
        assert_eq!(parse_square(""), None);
        assert_eq!(parse_square("i1"), None);
        assert_eq!(parse_square("a9"), None);
        assert_eq!(parse_square("a0"), None);
        assert_eq!(parse_square("e44"), None);
    }

    #[test]
    fn test_parse_promotion() {
        assert_eq!(parse_promotion("q"), Some(Piece::Queen));
        assert_eq!(parse_promotion("Knight"), Some(Piece::Knight));
        assert_eq!(parse_promotion("k"), None);
        assert_eq!(parse_promotion("p"), None);
    }
}
