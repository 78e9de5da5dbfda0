//! Chess rules and notation helpers used by the session client.
//!
//! Nothing here is authoritative: the game server decides legality and
//! outcomes. The client uses these for advisory move checks and for
//! reading piece placement out of pushed positions.

pub mod converters;
pub mod fen;
pub mod placement;
pub mod rules;
pub mod types;
pub mod uci;

pub use converters::*;
pub use fen::{FenError, STARTING_FEN};
pub use placement::Placement;
pub use rules::{CozyRules, RulesEngine, RulesError};
pub use types::{PieceColor, PieceKind};
pub use uci::convert_uci_castling_to_cozy;
