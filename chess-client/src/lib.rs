//! Real-time chess session client.
//!
//! Keeps a local mirror of one networked game in step with the game server:
//! the connection and its reconnects, matchmaking and challenges, the move
//! log, both clocks, and resuming a game after a dropped connection. The
//! server is authoritative for all of it; this crate only reconciles.
//!
//! # Example
//!
//! ```no_run
//! use chess_client::{ClientConfig, GameClient, Identity, MatchRequest};
//! use chess_proto::{ColorPreference, TimeControl};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = GameClient::spawn_tcp(ClientConfig::from_env())?;
//!     let (_view, mut events) = client.subscribe().await?;
//!     client.connect(Identity::new("alice", "token")).await?;
//!     client
//!         .find_match(MatchRequest::queue(TimeControl::Blitz, ColorPreference::Random))
//!         .await?;
//!     while let Ok(event) = events.recv().await {
//!         println!("{event:?}");
//!     }
//!     Ok(())
//! }
//! ```

pub mod captured;
pub mod channel;
pub mod client;
pub mod clock;
pub mod config;
mod error;
pub mod events;
pub mod gate;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
pub mod negotiator;
pub mod reconciler;
pub mod resume;
pub mod resume_store;
pub mod session;
#[cfg(test)]
mod testing;
pub mod transport;

pub use captured::CapturedSets;
pub use channel::{ChannelEvent, ChannelManager, ConnectionState, Identity, Interest, Outbound};
pub use client::{GameClient, GameClientHandle};
pub use clock::{ClockSnapshot, ClockTracker};
pub use config::{Backoff, ClientConfig, RetryPolicy};
pub use error::{ClientError, ClientResult, NegotiationError, ReconcileError};
pub use events::{ClientEvent, GameView};
pub use gate::{MoveGate, MoveIntent, Rejection};
pub use negotiator::{ChallengeOffer, MatchGrant, MatchRequest, NegotiationState, Negotiator};
pub use reconciler::{GameSession, MoveRecord, Orientation, Reconciler, Terminal};
pub use resume::{RejoinStatus, ResumeTracker};
pub use resume_store::{ResumeHandle, ResumeStore, ResumeStoreError};
pub use session::ClientCore;
pub use transport::{Connector, TcpConnector, TcpTransport, Transport};
