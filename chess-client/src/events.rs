use chess_proto::RosterEntry;

use crate::captured::CapturedSets;
use crate::channel::ConnectionState;
use crate::clock::ClockSnapshot;
use crate::negotiator::{ChallengeOffer, MatchGrant, NegotiationState};
use crate::reconciler::{GameSession, Orientation, Terminal};

/// Read-only picture of the current game for presentation.
#[derive(Debug, Clone)]
pub struct GameView {
    pub session: Option<GameSession>,
    pub captured: CapturedSets,
    pub orientation: Orientation,
    pub clock: ClockSnapshot,
    pub connection: ConnectionState,
    pub negotiation: NegotiationState,
}

/// Events broadcast from the client actor to all subscribers.
#[derive(Debug, Clone)]
#[allow(clippy::large_enum_variant)]
pub enum ClientEvent {
    Connection(ConnectionState),
    ConnectionLost {
        reason: String,
    },
    /// Reconnection gave up. The session is kept for a manual rejoin.
    RetriesExhausted {
        attempts: u32,
    },
    AuthRejected {
        reason: String,
    },
    Negotiation(NegotiationState),
    MatchGranted(MatchGrant),
    ChallengeOffered(ChallengeOffer),
    /// An older offer was replaced by a newer one and declined.
    ChallengeSuperseded(ChallengeOffer),
    Roster(Vec<RosterEntry>),
    /// Full view after any session mutation.
    SessionUpdated(GameView),
    Clock(ClockSnapshot),
    /// The server refused a move that passed the local checks.
    MoveRejected {
        reason: String,
        resync: bool,
    },
    ResyncRequested {
        session_id: String,
    },
    SessionEnded {
        session_id: String,
        reason: String,
    },
    Resumed {
        session_id: String,
    },
    RejoinCancelled,
    GameOver(Terminal),
    OpponentDisconnected {
        message: String,
    },
    OpponentResumed {
        message: String,
    },
    ServerError {
        message: String,
    },
}
