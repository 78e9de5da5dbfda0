//! Wire protocol between the session client and the game server.
//!
//! Every frame is a single JSON object on its own line, tagged by an
//! `event` field carrying the camelCase event name:
//!
//! ```text
//! {"event":"findMatch","mode":"blitz","colorPreference":"random"}
//! {"event":"matchFound","sessionId":"g-42","assignedColor":"black"}
//! ```

mod client;
mod codec;
mod server;
mod types;

pub use client::ClientMessage;
pub use codec::{decode_frame, encode_frame, ProtocolError};
pub use server::{EventKind, ServerMessage};
pub use types::*;

pub use chess::PieceColor;
