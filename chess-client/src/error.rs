//! Error types for the chess client

use chess_proto::ProtocolError;
use thiserror::Error;

use crate::gate::Rejection;
use crate::resume_store::ResumeStoreError;

pub type ClientResult<T> = Result<T, ClientError>;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Identity with user id and auth token required")]
    AuthRequired,

    #[error("Not connected to the game server")]
    NotConnected,

    #[error("Invalid server address: {0}")]
    InvalidAddress(String),

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Owner {0} already has an event subscription")]
    AlreadySubscribed(String),

    #[error(transparent)]
    Negotiation(#[from] NegotiationError),

    #[error("Move rejected: {0}")]
    Rejected(#[from] Rejection),

    #[error("No session to rejoin")]
    NothingToRejoin,

    #[error("No active session")]
    NoActiveSession,

    #[error(transparent)]
    Store(#[from] ResumeStoreError),

    #[error("Client actor closed")]
    ActorClosed,
}

/// Failures of matchmaking and challenge operations. All are recoverable.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NegotiationError {
    #[error("Matchmaking or a challenge is already in progress")]
    AlreadyInProgress,

    #[error("Not queued for matchmaking")]
    NotQueued,

    #[error("No pending challenge to respond to")]
    NoPendingChallenge,

    #[error("Invalid opponent: {0}")]
    InvalidOpponent(String),
}

/// Reasons an inbound game event could not be reconciled.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReconcileError {
    #[error("No active session")]
    NoSession,

    #[error("Session is over")]
    SessionTerminal,

    #[error("Move {got} arrived out of order, expected {expected}")]
    OutOfOrder { expected: u32, got: u32 },
}
