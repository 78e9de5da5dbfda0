//! The synchronous heart of the client.
//!
//! [`ClientCore`] holds every component and applies channel events and user
//! commands one at a time, in arrival order. It performs no I/O of its own:
//! outbound messages go through an [`Outbound`] and everything presentation
//! needs to know comes back as [`ClientEvent`]s.

use std::sync::Arc;

use chess::{PieceColor, RulesEngine};
use chess_proto::{ClientMessage, ColorPreference, GameStartPayload, ServerMessage, TimeControl};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::channel::{ChannelEvent, ConnectionState, Outbound};
use crate::clock::ClockTracker;
use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult, ReconcileError};
use crate::events::{ClientEvent, GameView};
use crate::gate::{MoveGate, MoveIntent, Rejection};
use crate::negotiator::{ChallengeOffer, MatchGrant, MatchRequest, NegotiationState, Negotiator};
use crate::reconciler::{GameStartOutcome, Reconciler, StateOutcome};
use crate::resume::{RejoinStatus, ResumeTracker};
use crate::resume_store::{ResumeHandle, ResumeStore};

pub struct ClientCore {
    user_id: Option<String>,
    connection: ConnectionState,
    negotiator: Negotiator,
    reconciler: Reconciler,
    clock: ClockTracker,
    gate: MoveGate,
    resume: ResumeTracker,
    store: Option<ResumeStore>,
    /// A move passed the gate and the server has not answered it yet.
    move_in_flight: bool,
}

impl ClientCore {
    pub fn new(
        config: &ClientConfig,
        rules: Arc<dyn RulesEngine>,
        store: Option<ResumeStore>,
        now: Instant,
    ) -> Self {
        let mut clock = ClockTracker::new(0, now);
        clock.freeze();
        Self {
            user_id: None,
            connection: ConnectionState::Disconnected,
            negotiator: Negotiator::new(config.challenge_timeout),
            reconciler: Reconciler::new(config.reorder_buffer, config.auto_rotate),
            clock,
            gate: MoveGate::new(rules),
            resume: ResumeTracker::new(),
            store,
            move_in_flight: false,
        }
    }

    /// Adopt the local identity and prime a rejoin from a saved handle.
    ///
    /// Switching from one identity to another drops everything the previous
    /// user had in progress. Their resume file is left alone.
    pub fn set_user(&mut self, user_id: &str) -> Vec<ClientEvent> {
        let mut events = Vec::new();
        if self.user_id.as_deref() == Some(user_id) {
            return events;
        }
        if let Some(previous) = self.user_id.take() {
            self.drop_previous_user(&previous, &mut events);
        }
        self.user_id = Some(user_id.to_string());
        self.reconciler.set_local_user(Some(user_id.to_string()));
        let Some(store) = &self.store else {
            return events;
        };
        match store.load_for(user_id) {
            Ok(Some(handle)) => {
                info!(session_id = %handle.session_id, "found saved session, will rejoin");
                self.resume.prime(&handle.session_id);
            }
            Ok(None) => {}
            Err(e) => {
                warn!("ignoring unreadable resume file: {e}");
                if let Err(e) = store.clear() {
                    warn!("could not remove resume file: {e}");
                }
            }
        }
        events
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    pub fn view(&self) -> GameView {
        GameView {
            session: self.reconciler.session().cloned(),
            captured: self.reconciler.captured().clone(),
            orientation: self.reconciler.orientation(),
            clock: self.clock.snapshot(),
            connection: self.connection,
            negotiation: self.negotiator.state().clone(),
        }
    }

    pub fn reconciler(&self) -> &Reconciler {
        &self.reconciler
    }

    pub fn negotiator(&self) -> &Negotiator {
        &self.negotiator
    }

    pub fn clock(&self) -> &ClockTracker {
        &self.clock
    }

    pub fn resume(&self) -> &ResumeTracker {
        &self.resume
    }

    // ── Channel events ──────────────────────────────────────────────

    pub fn handle_channel(
        &mut self,
        event: ChannelEvent,
        out: &dyn Outbound,
        now: Instant,
    ) -> Vec<ClientEvent> {
        let mut events = Vec::new();
        match event {
            ChannelEvent::State(state) => {
                self.connection = state;
                events.push(ClientEvent::Connection(state));
                if state == ConnectionState::Connected {
                    self.on_connected(out);
                }
            }
            ChannelEvent::ConnectionLost { reason } => {
                let live = self
                    .reconciler
                    .session()
                    .filter(|s| !s.is_terminal())
                    .map(|s| s.session_id.clone());
                self.resume.on_connection_lost(live.as_deref());
                self.move_in_flight = false;
                let before = self.negotiator.state().clone();
                self.negotiator.on_connection_lost();
                self.push_negotiation_change(&before, &mut events);
                events.push(ClientEvent::ConnectionLost { reason });
            }
            ChannelEvent::RetriesExhausted { attempts } => {
                events.push(ClientEvent::RetriesExhausted { attempts });
            }
            ChannelEvent::Message(message) => self.handle_server(message, out, now, &mut events),
        }
        events
    }

    fn on_connected(&mut self, out: &dyn Outbound) {
        let Some(user_id) = self.user_id.clone() else {
            return;
        };
        match self.resume.on_connected(&user_id, out) {
            Ok(true) => debug!("rejoin sent after reconnect"),
            Ok(false) => {}
            Err(e) => warn!("could not send rejoin: {e}"),
        }
    }

    fn handle_server(
        &mut self,
        message: ServerMessage,
        out: &dyn Outbound,
        now: Instant,
        events: &mut Vec<ClientEvent>,
    ) {
        let before = self.negotiator.state().clone();
        match message {
            ServerMessage::ConnectionAck => debug!("server acknowledged identity"),
            ServerMessage::ConnectionError { reason } => {
                events.push(ClientEvent::AuthRejected { reason });
            }
            ServerMessage::Queued { info } => self.negotiator.on_queued(info.as_deref()),
            ServerMessage::MatchFound {
                session_id,
                assigned_color,
            } => {
                if let Some(grant) = self
                    .negotiator
                    .on_match_found(&session_id, Some(assigned_color))
                {
                    if let Some(mode) = self.negotiator.take_agreed_mode() {
                        self.clock.reset(mode.initial_ms(), now);
                    }
                    self.on_grant(grant, out, events);
                }
            }
            ServerMessage::MatchmakingCancelled => self.negotiator.on_cancelled(),
            ServerMessage::ChallengeReceived {
                challenger_id,
                challenger_name,
                mode,
                color_preference,
            } => {
                let offer = ChallengeOffer {
                    challenger_id,
                    challenger_name,
                    mode,
                    color_preference,
                };
                if let Some(old) = self.negotiator.on_challenge_received(offer.clone(), out) {
                    events.push(ClientEvent::ChallengeSuperseded(old));
                }
                events.push(ClientEvent::ChallengeOffered(offer));
            }
            ServerMessage::ChallengeResponse { accepted } => {
                self.negotiator.on_challenge_response(accepted)
            }
            ServerMessage::ChallengeError { reason } => self.negotiator.on_challenge_error(&reason),
            ServerMessage::GameStart(payload) => self.on_game_start(&payload, now, events),
            ServerMessage::GameState(payload) => {
                if self.reconciler.session().and_then(|s| s.local_color) == Some(payload.mover) {
                    self.move_in_flight = false;
                }
                match self.reconciler.apply_state_event(&payload) {
                    Ok(StateOutcome::Applied { .. }) => {
                        self.sync_clock_turn(now);
                        events.push(ClientEvent::SessionUpdated(self.view()));
                    }
                    Ok(StateOutcome::Duplicate) | Ok(StateOutcome::Buffered { .. }) => {}
                    Err(ReconcileError::OutOfOrder { expected, got }) => {
                        warn!(expected, got, "move stream has a gap");
                        self.resync(out, events);
                    }
                    Err(e) => debug!("gameState ignored: {e}"),
                }
            }
            ServerMessage::TimeUpdate { white_ms, black_ms } => {
                if self.reconciler.apply_time_update(white_ms, black_ms) {
                    self.clock.on_authoritative_update(white_ms, black_ms, now);
                    events.push(ClientEvent::Clock(self.clock.snapshot()));
                }
            }
            ServerMessage::GameOver(payload) => {
                if self.reconciler.apply_game_over(&payload) {
                    self.clock.freeze();
                    self.move_in_flight = false;
                    self.resume.clear();
                    self.clear_store();
                    let terminal = self
                        .reconciler
                        .session()
                        .and_then(|s| s.terminal.clone());
                    if let Some(terminal) = terminal {
                        events.push(ClientEvent::GameOver(terminal));
                    }
                    events.push(ClientEvent::SessionUpdated(self.view()));
                }
            }
            ServerMessage::MoveHistoryBulk { moves } => {
                match self.reconciler.apply_move_history_bulk(&moves) {
                    Ok(_) => {
                        self.sync_clock_turn(now);
                        if let Some(session_id) = self.resume.on_history_applied() {
                            events.push(ClientEvent::Resumed { session_id });
                        }
                        events.push(ClientEvent::SessionUpdated(self.view()));
                    }
                    Err(e) => {
                        warn!("move history rejected: {e}");
                        events.push(ClientEvent::ServerError {
                            message: format!("move history rejected: {e}"),
                        });
                    }
                }
            }
            ServerMessage::OpponentDisconnected { message } => {
                events.push(ClientEvent::OpponentDisconnected { message });
            }
            ServerMessage::OpponentResumed { message } => {
                events.push(ClientEvent::OpponentResumed { message });
            }
            ServerMessage::InvalidMove { reason } => {
                let resync = std::mem::take(&mut self.move_in_flight) && self.resync(out, events);
                events.push(ClientEvent::MoveRejected { reason, resync });
            }
            ServerMessage::GenericError { message } => {
                if let Some(session_id) = self.resume.on_rejected() {
                    self.end_session(session_id, message, events);
                } else {
                    warn!(%message, "server error");
                    events.push(ClientEvent::ServerError { message });
                }
            }
            ServerMessage::OnlineRoster { users } => events.push(ClientEvent::Roster(users)),
            ServerMessage::RejoinFailed { session_id, reason } => {
                let ours = self
                    .reconciler
                    .session()
                    .is_some_and(|s| s.session_id == session_id);
                match self.resume.on_rejected() {
                    Some(pending) => self.end_session(pending, reason, events),
                    None if ours => self.end_session(session_id, reason, events),
                    None => debug!(%session_id, "rejoinFailed for unknown session"),
                }
            }
            ServerMessage::Unknown => debug!("unknown server event ignored"),
        }
        self.push_negotiation_change(&before, events);
    }

    fn on_grant(&mut self, grant: MatchGrant, out: &dyn Outbound, events: &mut Vec<ClientEvent>) {
        self.reconciler.begin(&grant);
        self.save_handle(&grant.session_id, grant.assigned_color);
        if let Some(user_id) = self.user_id.clone() {
            if let Err(e) = out.send(ClientMessage::JoinGame {
                session_id: grant.session_id.clone(),
                user_id,
            }) {
                warn!("could not join granted session: {e}");
            }
        }
        events.push(ClientEvent::MatchGranted(grant));
        events.push(ClientEvent::SessionUpdated(self.view()));
    }

    fn on_game_start(
        &mut self,
        payload: &GameStartPayload,
        now: Instant,
        events: &mut Vec<ClientEvent>,
    ) {
        if self.reconciler.apply_game_start(payload) == GameStartOutcome::Ignored {
            return;
        }
        let Some(session) = self.reconciler.session() else {
            return;
        };
        let (session_id, local_color) = (session.session_id.clone(), session.local_color);
        let (white_ms, black_ms, turn) =
            (session.white_clock_ms, session.black_clock_ms, session.turn);

        let mode = self.negotiator.take_agreed_mode();
        self.negotiator.on_session_started(&session_id, local_color);
        if white_ms == 0 && black_ms == 0 {
            // No clocks in the push: the time control decides, or the grant
            // already applied it.
            match mode {
                Some(mode) => self.clock.reset(mode.initial_ms(), now),
                None => {
                    let current = self.clock.snapshot();
                    self.clock.restart(current.white_ms, current.black_ms, now);
                }
            }
        } else {
            self.clock.restart(white_ms, black_ms, now);
        }
        self.clock.set_turn(turn, now);
        if local_color.is_some() {
            self.save_handle(&session_id, local_color);
        }
        events.push(ClientEvent::SessionUpdated(self.view()));
        events.push(ClientEvent::Clock(self.clock.snapshot()));
    }

    // ── Commands ────────────────────────────────────────────────────

    pub fn find_match(
        &mut self,
        request: MatchRequest,
        out: &dyn Outbound,
        now: Instant,
    ) -> ClientResult<Vec<ClientEvent>> {
        self.negotiator.find_match(request, out, now)?;
        Ok(vec![ClientEvent::Negotiation(self.negotiator.state().clone())])
    }

    pub fn cancel_matchmaking(&mut self, out: &dyn Outbound) -> ClientResult<Vec<ClientEvent>> {
        self.negotiator.cancel(out)?;
        Ok(vec![ClientEvent::Negotiation(self.negotiator.state().clone())])
    }

    pub fn challenge(
        &mut self,
        opponent_id: String,
        mode: TimeControl,
        color_preference: ColorPreference,
        out: &dyn Outbound,
        now: Instant,
    ) -> ClientResult<Vec<ClientEvent>> {
        self.negotiator
            .challenge(opponent_id, mode, color_preference, out, now)?;
        Ok(vec![ClientEvent::Negotiation(self.negotiator.state().clone())])
    }

    pub fn respond_to_challenge(
        &mut self,
        accept: bool,
        out: &dyn Outbound,
    ) -> ClientResult<Vec<ClientEvent>> {
        self.negotiator.respond_to_challenge(accept, out)?;
        Ok(vec![ClientEvent::Negotiation(self.negotiator.state().clone())])
    }

    pub fn request_roster(&self, out: &dyn Outbound) -> ClientResult<()> {
        self.negotiator.request_roster(out)
    }

    /// Run the gate and send. Returns the notation sent.
    pub fn submit_move(&mut self, intent: &MoveIntent, out: &dyn Outbound) -> Result<String, Rejection> {
        let user_id = self.user_id.as_deref().ok_or(Rejection::NotConnected)?;
        let notation = self
            .gate
            .submit(intent, self.reconciler.session(), user_id, out)?;
        self.move_in_flight = true;
        Ok(notation)
    }

    pub fn rejoin(&mut self, out: &dyn Outbound) -> ClientResult<RejoinStatus> {
        let user_id = self.user_id.clone().ok_or(ClientError::AuthRequired)?;
        let fallback = self
            .reconciler
            .session()
            .filter(|s| !s.is_terminal())
            .map(|s| s.session_id.clone());
        self.resume.rejoin(fallback.as_deref(), &user_id, out)
    }

    pub fn cancel_rejoin(&mut self) -> Vec<ClientEvent> {
        if self.resume.cancel() {
            vec![ClientEvent::RejoinCancelled]
        } else {
            Vec::new()
        }
    }

    /// Leave the current game. Local state is dropped even when the server
    /// cannot be told.
    pub fn leave(&mut self, out: &dyn Outbound) -> ClientResult<Vec<ClientEvent>> {
        let session_id = self
            .reconciler
            .session()
            .map(|s| s.session_id.clone())
            .ok_or(ClientError::NoActiveSession)?;
        if let Some(user_id) = self.user_id.clone() {
            if let Err(e) = out.send(ClientMessage::LeaveGame {
                session_id: session_id.clone(),
                user_id,
            }) {
                warn!("could not tell the server we left: {e}");
            }
        }
        let mut events = Vec::new();
        let before = self.negotiator.state().clone();
        self.negotiator.reset();
        self.end_session(session_id, "left the game".to_string(), &mut events);
        self.push_negotiation_change(&before, &mut events);
        Ok(events)
    }

    pub fn set_auto_rotate(&mut self, on: bool) -> Vec<ClientEvent> {
        self.reconciler.set_auto_rotate(on);
        vec![ClientEvent::SessionUpdated(self.view())]
    }

    pub fn pause_clock(&mut self, now: Instant) -> Vec<ClientEvent> {
        self.clock.pause(now);
        vec![ClientEvent::Clock(self.clock.snapshot())]
    }

    pub fn resume_clock(&mut self, now: Instant) -> Vec<ClientEvent> {
        self.clock.resume(now);
        vec![ClientEvent::Clock(self.clock.snapshot())]
    }

    /// Periodic housekeeping: local clock and challenge expiry.
    pub fn tick(&mut self, now: Instant) -> Vec<ClientEvent> {
        let mut events = Vec::new();
        if self.clock.tick(now) {
            events.push(ClientEvent::Clock(self.clock.snapshot()));
        }
        if self.negotiator.poll_timeout(now) {
            events.push(ClientEvent::Negotiation(self.negotiator.state().clone()));
        }
        events
    }

    // ── Helpers ─────────────────────────────────────────────────────

    /// Ask for the full state of the live session. Returns whether a request
    /// is now outstanding.
    fn resync(&mut self, out: &dyn Outbound, events: &mut Vec<ClientEvent>) -> bool {
        let (Some(user_id), Some(session_id)) = (
            self.user_id.clone(),
            self.reconciler.session().map(|s| s.session_id.clone()),
        ) else {
            return false;
        };
        match self.resume.request_resync(&session_id, &user_id, out) {
            Ok(RejoinStatus::Sent) => {
                events.push(ClientEvent::ResyncRequested { session_id });
                true
            }
            Ok(RejoinStatus::AlreadyInFlight) => true,
            Err(e) => {
                warn!("resync request failed: {e}");
                false
            }
        }
    }

    fn sync_clock_turn(&mut self, now: Instant) {
        if let Some(turn) = self.reconciler.session().map(|s| s.turn) {
            self.clock.set_turn(turn, now);
        }
    }

    fn end_session(&mut self, session_id: String, reason: String, events: &mut Vec<ClientEvent>) {
        info!(%session_id, %reason, "session ended");
        self.reconciler.clear();
        self.resume.clear();
        self.clock.freeze();
        self.move_in_flight = false;
        self.clear_store();
        events.push(ClientEvent::SessionEnded { session_id, reason });
        events.push(ClientEvent::SessionUpdated(self.view()));
    }

    fn drop_previous_user(&mut self, previous: &str, events: &mut Vec<ClientEvent>) {
        info!(previous, "identity changed, dropping local game state");
        let before = self.negotiator.state().clone();
        let session_id = self.reconciler.session().map(|s| s.session_id.clone());
        self.negotiator.reset();
        self.reconciler.clear();
        self.resume.clear();
        self.clock.freeze();
        self.move_in_flight = false;
        self.push_negotiation_change(&before, events);
        if let Some(session_id) = session_id {
            events.push(ClientEvent::SessionEnded {
                session_id,
                reason: "identity changed".to_string(),
            });
        }
        events.push(ClientEvent::SessionUpdated(self.view()));
    }

    fn push_negotiation_change(&self, before: &NegotiationState, events: &mut Vec<ClientEvent>) {
        if self.negotiator.state() != before {
            events.push(ClientEvent::Negotiation(self.negotiator.state().clone()));
        }
    }

    fn save_handle(&self, session_id: &str, color: Option<PieceColor>) {
        let (Some(store), Some(user_id)) = (&self.store, &self.user_id) else {
            return;
        };
        if let Err(e) = store.save(&ResumeHandle::new(session_id, user_id.as_str(), color)) {
            warn!("could not save resume handle: {e}");
        }
    }

    fn clear_store(&self) {
        if let Some(store) = &self.store {
            if let Err(e) = store.clear() {
                warn!("could not remove resume handle: {e}");
            }
        }
    }
}
