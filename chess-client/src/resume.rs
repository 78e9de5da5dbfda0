//! Rejoin after an involuntary disconnect.
//!
//! The tracker remembers which session was live when the connection dropped
//! and asks for it back once the channel is up again. The session is only
//! forgotten after the server's history push has been merged, or when the
//! server refuses the rejoin.

use chess_proto::ClientMessage;
use tracing::{debug, info, warn};

use crate::channel::Outbound;
use crate::error::{ClientError, ClientResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejoinStatus {
    Sent,
    /// A rejoin for this session is already waiting on the server.
    AlreadyInFlight,
}

#[derive(Debug, Default)]
pub struct ResumeTracker {
    was_in_session: Option<String>,
    in_flight: bool,
}

impl ResumeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Session waiting to be resumed, if any.
    pub fn pending_session(&self) -> Option<&str> {
        self.was_in_session.as_deref()
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight
    }

    /// Remember the live session. A request in flight died with the
    /// connection and will be sent again.
    pub fn on_connection_lost(&mut self, live_session: Option<&str>) {
        if let Some(session_id) = live_session {
            info!(session_id, "connection lost mid-game, will rejoin");
            self.was_in_session = Some(session_id.to_string());
        }
        self.in_flight = false;
    }

    /// Seed from a persisted handle so the first connection rejoins.
    pub fn prime(&mut self, session_id: &str) {
        if self.was_in_session.is_none() {
            debug!(session_id, "rejoin primed from saved handle");
            self.was_in_session = Some(session_id.to_string());
        }
    }

    /// Called right after the channel reports `Connected`. Returns whether a
    /// rejoin request went out.
    pub fn on_connected(&mut self, user_id: &str, out: &dyn Outbound) -> ClientResult<bool> {
        if self.in_flight || self.was_in_session.is_none() {
            return Ok(false);
        }
        self.send(user_id, out)?;
        Ok(true)
    }

    /// Manual rejoin of the remembered session, or of `fallback` when
    /// nothing is remembered. Idempotent while a request is in flight.
    pub fn rejoin(
        &mut self,
        fallback: Option<&str>,
        user_id: &str,
        out: &dyn Outbound,
    ) -> ClientResult<RejoinStatus> {
        if self.in_flight {
            return Ok(RejoinStatus::AlreadyInFlight);
        }
        if self.was_in_session.is_none() {
            let session_id = fallback.ok_or(ClientError::NothingToRejoin)?;
            self.was_in_session = Some(session_id.to_string());
        }
        self.send(user_id, out)?;
        Ok(RejoinStatus::Sent)
    }

    /// Ask for the full state of a session that is still connected but has
    /// drifted from the server.
    pub fn request_resync(
        &mut self,
        session_id: &str,
        user_id: &str,
        out: &dyn Outbound,
    ) -> ClientResult<RejoinStatus> {
        if self.in_flight {
            return Ok(RejoinStatus::AlreadyInFlight);
        }
        warn!(session_id, "requesting full state resync");
        self.was_in_session = Some(session_id.to_string());
        self.send(user_id, out)?;
        Ok(RejoinStatus::Sent)
    }

    /// History has been merged. Returns the resumed session id if this
    /// completes a rejoin.
    pub fn on_history_applied(&mut self) -> Option<String> {
        if !self.in_flight {
            return None;
        }
        self.in_flight = false;
        let session_id = self.was_in_session.take();
        if let Some(id) = &session_id {
            info!(session_id = %id, "session resumed");
        }
        session_id
    }

    /// The server refused the rejoin. Returns the session that is gone.
    pub fn on_rejected(&mut self) -> Option<String> {
        if !self.in_flight {
            return None;
        }
        self.in_flight = false;
        self.was_in_session.take()
    }

    /// Give up on resuming. Returns whether there was anything to cancel.
    pub fn cancel(&mut self) -> bool {
        let had_work = self.in_flight || self.was_in_session.is_some();
        if had_work {
            info!("rejoin cancelled");
        }
        self.clear();
        had_work
    }

    pub fn clear(&mut self) {
        self.was_in_session = None;
        self.in_flight = false;
    }

    fn send(&mut self, user_id: &str, out: &dyn Outbound) -> ClientResult<()> {
        let session_id = self
            .was_in_session
            .clone()
            .ok_or(ClientError::NothingToRejoin)?;
        out.send(ClientMessage::RejoinGame {
            session_id: session_id.clone(),
            user_id: user_id.to_string(),
        })?;
        debug!(%session_id, "rejoin requested");
        self.in_flight = true;
        Ok(())
    }
}
