//! Matchmaking and challenge negotiation.
//!
//! Two handshakes share one admission rule: while queued or while an
//! outbound challenge is pending, no new request may start. Inbound offers are
//! tracked separately; only the newest is kept and an older one is declined
//! on the wire so its challenger is not left waiting.

use std::time::Duration;

use chess::PieceColor;
use chess_proto::{ClientMessage, ColorPreference, TimeControl};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::channel::Outbound;
use crate::error::{ClientResult, NegotiationError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchRequest {
    pub mode: TimeControl,
    pub color_preference: ColorPreference,
    /// Set for a direct challenge instead of the public queue.
    pub opponent_id: Option<String>,
}

impl MatchRequest {
    pub fn queue(mode: TimeControl, color_preference: ColorPreference) -> Self {
        Self {
            mode,
            color_preference,
            opponent_id: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChallengeOffer {
    pub challenger_id: String,
    pub challenger_name: String,
    pub mode: TimeControl,
    pub color_preference: ColorPreference,
}

/// Handle for a session granted by the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchGrant {
    pub session_id: String,
    pub assigned_color: Option<PieceColor>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NegotiationState {
    Idle,
    Queued {
        request: MatchRequest,
        cancel_requested: bool,
    },
    Matched(MatchGrant),
    Cancelled,
    ChallengeSent {
        opponent_id: String,
        mode: TimeControl,
        color_preference: ColorPreference,
        sent_at: Instant,
    },
    ChallengeAccepted {
        opponent_id: String,
    },
    ChallengeDeclined {
        opponent_id: String,
    },
    AcceptedByMe {
        challenger_id: String,
    },
    DeclinedByMe {
        challenger_id: String,
    },
    Errored {
        reason: String,
    },
}

impl NegotiationState {
    /// Whether a request is outstanding. Everything else admits a new one.
    pub fn is_busy(&self) -> bool {
        matches!(self, Self::Queued { .. } | Self::ChallengeSent { .. })
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Queued { .. } => "queued",
            Self::Matched(_) => "matched",
            Self::Cancelled => "cancelled",
            Self::ChallengeSent { .. } => "challenge sent",
            Self::ChallengeAccepted { .. } => "challenge accepted",
            Self::ChallengeDeclined { .. } => "challenge declined",
            Self::AcceptedByMe { .. } => "accepted challenge",
            Self::DeclinedByMe { .. } => "declined challenge",
            Self::Errored { .. } => "error",
        }
    }
}

pub struct Negotiator {
    state: NegotiationState,
    pending_offer: Option<ChallengeOffer>,
    /// Session id of the last grant handed out, to drop repeats.
    last_granted: Option<String>,
    /// Time control of the game being arranged, until a session starts.
    agreed_mode: Option<TimeControl>,
    challenge_timeout: Duration,
}

impl Negotiator {
    pub fn new(challenge_timeout: Duration) -> Self {
        Self {
            state: NegotiationState::Idle,
            pending_offer: None,
            last_granted: None,
            agreed_mode: None,
            challenge_timeout,
        }
    }

    pub fn state(&self) -> &NegotiationState {
        &self.state
    }

    pub fn pending_offer(&self) -> Option<&ChallengeOffer> {
        self.pending_offer.as_ref()
    }

    /// Time control of the game being arranged, queued, challenged or
    /// accepted either way. Taken once by whoever starts the session.
    pub fn take_agreed_mode(&mut self) -> Option<TimeControl> {
        self.agreed_mode.take()
    }

    /// Join the public queue, or challenge `request.opponent_id` directly.
    pub fn find_match(
        &mut self,
        request: MatchRequest,
        out: &dyn Outbound,
        now: Instant,
    ) -> ClientResult<()> {
        if let Some(opponent_id) = request.opponent_id.clone() {
            return self.challenge(
                opponent_id,
                request.mode,
                request.color_preference,
                out,
                now,
            );
        }
        self.admit()?;
        out.send(ClientMessage::FindMatch {
            mode: request.mode,
            color_preference: request.color_preference,
        })?;
        info!(mode = ?request.mode, "queued for matchmaking");
        self.agreed_mode = Some(request.mode);
        self.state = NegotiationState::Queued {
            request,
            cancel_requested: false,
        };
        Ok(())
    }

    /// Ask to leave the queue. The state becomes `Cancelled` only when the
    /// server confirms.
    pub fn cancel(&mut self, out: &dyn Outbound) -> ClientResult<()> {
        match &mut self.state {
            NegotiationState::Queued {
                cancel_requested: true,
                ..
            } => Ok(()),
            NegotiationState::Queued {
                cancel_requested, ..
            } => {
                out.send(ClientMessage::CancelMatchmaking)?;
                *cancel_requested = true;
                debug!("matchmaking cancel requested");
                Ok(())
            }
            _ => Err(NegotiationError::NotQueued.into()),
        }
    }

    pub fn challenge(
        &mut self,
        opponent_id: String,
        mode: TimeControl,
        color_preference: ColorPreference,
        out: &dyn Outbound,
        now: Instant,
    ) -> ClientResult<()> {
        self.admit()?;
        if opponent_id.trim().is_empty() {
            return Err(NegotiationError::InvalidOpponent(opponent_id).into());
        }
        out.send(ClientMessage::ChallengeUser {
            opponent_id: opponent_id.clone(),
            mode,
            color_preference,
        })?;
        info!(opponent = %opponent_id, ?mode, "challenge sent");
        self.agreed_mode = Some(mode);
        self.state = NegotiationState::ChallengeSent {
            opponent_id,
            mode,
            color_preference,
            sent_at: now,
        };
        Ok(())
    }

    /// Answer the pending inbound offer. The offer is kept if the answer
    /// could not be sent.
    pub fn respond_to_challenge(&mut self, accept: bool, out: &dyn Outbound) -> ClientResult<()> {
        let (challenger_id, mode) = self
            .pending_offer
            .as_ref()
            .map(|offer| (offer.challenger_id.clone(), offer.mode))
            .ok_or(NegotiationError::NoPendingChallenge)?;
        out.send(ClientMessage::RespondToChallenge {
            accept,
            challenger_id: challenger_id.clone(),
        })?;
        self.pending_offer = None;
        info!(challenger = %challenger_id, accept, "answered challenge");
        self.state = if accept {
            self.agreed_mode = Some(mode);
            NegotiationState::AcceptedByMe { challenger_id }
        } else {
            NegotiationState::DeclinedByMe { challenger_id }
        };
        Ok(())
    }

    pub fn request_roster(&self, out: &dyn Outbound) -> ClientResult<()> {
        out.send(ClientMessage::RequestOnlineRoster)
    }

    pub fn on_queued(&mut self, info: Option<&str>) {
        if !matches!(self.state, NegotiationState::Queued { .. }) {
            warn!(
                state = self.state.label(),
                "queued confirmation without a pending request"
            );
            return;
        }
        debug!(info = info.unwrap_or(""), "server confirmed queue entry");
    }

    /// Record a match. Returns the grant the first time a session id is seen.
    pub fn on_match_found(
        &mut self,
        session_id: &str,
        assigned_color: Option<PieceColor>,
    ) -> Option<MatchGrant> {
        if self.last_granted.as_deref() == Some(session_id) {
            debug!(session_id, "duplicate matchFound ignored");
            return None;
        }
        let grant = MatchGrant {
            session_id: session_id.to_string(),
            assigned_color,
        };
        info!(session_id, color = ?assigned_color, "match found");
        self.last_granted = Some(session_id.to_string());
        self.state = NegotiationState::Matched(grant.clone());
        Some(grant)
    }

    /// A game started without a preceding `matchFound` (challenge flow or
    /// resume). Later `matchFound` pushes for it are ignored.
    pub fn on_session_started(&mut self, session_id: &str, assigned_color: Option<PieceColor>) {
        if self.last_granted.as_deref() == Some(session_id) {
            return;
        }
        self.last_granted = Some(session_id.to_string());
        self.state = NegotiationState::Matched(MatchGrant {
            session_id: session_id.to_string(),
            assigned_color,
        });
    }

    pub fn on_cancelled(&mut self) {
        if matches!(self.state, NegotiationState::Queued { .. }) {
            info!("matchmaking cancelled");
            self.state = NegotiationState::Cancelled;
            self.agreed_mode = None;
        } else {
            debug!(state = self.state.label(), "stray matchmakingCancelled");
        }
    }

    /// Track a new inbound offer. Returns the offer it replaced, which has
    /// been declined on the wire.
    pub fn on_challenge_received(
        &mut self,
        offer: ChallengeOffer,
        out: &dyn Outbound,
    ) -> Option<ChallengeOffer> {
        info!(challenger = %offer.challenger_id, mode = ?offer.mode, "challenge received");
        let previous = self.pending_offer.replace(offer);
        let previous = previous?;
        let same_challenger = self
            .pending_offer
            .as_ref()
            .is_some_and(|o| o.challenger_id == previous.challenger_id);
        if same_challenger {
            // A renewed offer from the same player replaces the old one silently.
            return None;
        }
        if let Err(e) = out.send(ClientMessage::RespondToChallenge {
            accept: false,
            challenger_id: previous.challenger_id.clone(),
        }) {
            warn!(challenger = %previous.challenger_id, "could not decline superseded challenge: {e}");
        }
        Some(previous)
    }

    pub fn on_challenge_response(&mut self, accepted: bool) {
        let NegotiationState::ChallengeSent { opponent_id, .. } = &self.state else {
            debug!(state = self.state.label(), "stray challengeResponse");
            return;
        };
        let opponent_id = opponent_id.clone();
        info!(opponent = %opponent_id, accepted, "challenge answered");
        self.state = if accepted {
            NegotiationState::ChallengeAccepted { opponent_id }
        } else {
            self.agreed_mode = None;
            NegotiationState::ChallengeDeclined { opponent_id }
        };
    }

    pub fn on_challenge_error(&mut self, reason: &str) {
        warn!(reason, "challenge error");
        self.agreed_mode = None;
        self.state = NegotiationState::Errored {
            reason: reason.to_string(),
        };
    }

    /// The server forgets queue entries and offers of a dropped connection.
    pub fn on_connection_lost(&mut self) {
        if self.state.is_busy() {
            self.state = NegotiationState::Errored {
                reason: "connection lost".to_string(),
            };
            self.agreed_mode = None;
        }
        self.pending_offer = None;
    }

    /// Expire an unanswered outbound challenge. Returns whether it expired.
    pub fn poll_timeout(&mut self, now: Instant) -> bool {
        let NegotiationState::ChallengeSent { sent_at, .. } = &self.state else {
            return false;
        };
        if now.saturating_duration_since(*sent_at) < self.challenge_timeout {
            return false;
        }
        warn!("challenge timed out");
        self.agreed_mode = None;
        self.state = NegotiationState::Errored {
            reason: "challenge timed out".to_string(),
        };
        true
    }

    pub fn reset(&mut self) {
        self.state = NegotiationState::Idle;
        self.pending_offer = None;
        self.agreed_mode = None;
    }

    fn admit(&self) -> Result<(), NegotiationError> {
        if self.state.is_busy() {
            return Err(NegotiationError::AlreadyInProgress);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ClientError;
    use crate::testing::RecordingOutbound;

    fn negotiator() -> Negotiator {
        Negotiator::new(Duration::from_secs(30))
    }

    fn blitz() -> MatchRequest {
        MatchRequest::queue(TimeControl::Blitz, ColorPreference::Random)
    }

    fn offer(id: &str) -> ChallengeOffer {
        ChallengeOffer {
            challenger_id: id.to_string(),
            challenger_name: id.to_uppercase(),
            mode: TimeControl::Rapid,
            color_preference: ColorPreference::White,
        }
    }

    #[test]
    fn test_find_match_sends_and_queues() {
        let out = RecordingOutbound::connected();
        let mut neg = negotiator();
        neg.find_match(blitz(), &out, Instant::now()).unwrap();
        assert_eq!(
            out.take(),
            vec![ClientMessage::FindMatch {
                mode: TimeControl::Blitz,
                color_preference: ColorPreference::Random,
            }]
        );
        assert!(neg.state().is_busy());
    }

    #[test]
    fn test_second_request_while_busy_is_rejected() {
        let out = RecordingOutbound::connected();
        let mut neg = negotiator();
        let now = Instant::now();
        neg.find_match(blitz(), &out, now).unwrap();
        out.take();

        assert!(matches!(
            neg.find_match(blitz(), &out, now),
            Err(ClientError::Negotiation(NegotiationError::AlreadyInProgress))
        ));
        assert!(matches!(
            neg.challenge("bob".into(), TimeControl::Bullet, ColorPreference::Random, &out, now),
            Err(ClientError::Negotiation(NegotiationError::AlreadyInProgress))
        ));
        assert!(out.is_empty());
    }

    #[test]
    fn test_challenge_blocks_find_match() {
        let out = RecordingOutbound::connected();
        let mut neg = negotiator();
        let now = Instant::now();
        neg.challenge("bob".into(), TimeControl::Bullet, ColorPreference::Black, &out, now)
            .unwrap();
        assert!(matches!(
            neg.find_match(blitz(), &out, now),
            Err(ClientError::Negotiation(NegotiationError::AlreadyInProgress))
        ));
    }

    #[test]
    fn test_find_match_with_opponent_sends_challenge() {
        let out = RecordingOutbound::connected();
        let mut neg = negotiator();
        let request = MatchRequest {
            opponent_id: Some("bob".into()),
            ..blitz()
        };
        neg.find_match(request, &out, Instant::now()).unwrap();
        assert!(matches!(
            out.take().as_slice(),
            [ClientMessage::ChallengeUser { opponent_id, .. }] if opponent_id == "bob"
        ));
    }

    #[test]
    fn test_send_failure_leaves_state_idle() {
        let out = RecordingOutbound::disconnected();
        let mut neg = negotiator();
        assert!(matches!(
            neg.find_match(blitz(), &out, Instant::now()),
            Err(ClientError::NotConnected)
        ));
        assert_eq!(neg.state(), &NegotiationState::Idle);
    }

    #[test]
    fn test_cancel_waits_for_confirmation() {
        let out = RecordingOutbound::connected();
        let mut neg = negotiator();
        neg.find_match(blitz(), &out, Instant::now()).unwrap();
        out.take();

        neg.cancel(&out).unwrap();
        assert_eq!(out.take(), vec![ClientMessage::CancelMatchmaking]);
        assert!(matches!(
            neg.state(),
            NegotiationState::Queued {
                cancel_requested: true,
                ..
            }
        ));

        // Repeated cancel does not send again.
        neg.cancel(&out).unwrap();
        assert!(out.is_empty());

        neg.on_cancelled();
        assert_eq!(neg.state(), &NegotiationState::Cancelled);
        // Terminal outcomes admit new requests.
        neg.find_match(blitz(), &out, Instant::now()).unwrap();
    }

    #[test]
    fn test_cancel_when_not_queued() {
        let out = RecordingOutbound::connected();
        let mut neg = negotiator();
        assert!(matches!(
            neg.cancel(&out),
            Err(ClientError::Negotiation(NegotiationError::NotQueued))
        ));
    }

    #[test]
    fn test_grant_emitted_once_per_session() {
        let out = RecordingOutbound::connected();
        let mut neg = negotiator();
        neg.find_match(blitz(), &out, Instant::now()).unwrap();

        let grant = neg.on_match_found("s1", Some(PieceColor::White)).unwrap();
        assert_eq!(grant.session_id, "s1");
        assert!(neg.on_match_found("s1", Some(PieceColor::White)).is_none());
        assert!(!neg.state().is_busy());
        assert!(neg.on_match_found("s2", Some(PieceColor::Black)).is_some());
    }

    #[test]
    fn test_session_started_suppresses_late_match_found() {
        let mut neg = negotiator();
        neg.on_session_started("s9", Some(PieceColor::Black));
        assert!(neg.on_match_found("s9", Some(PieceColor::Black)).is_none());
    }

    #[test]
    fn test_decline_sends_response() {
        let out = RecordingOutbound::connected();
        let mut neg = negotiator();
        assert!(neg.on_challenge_received(offer("carol"), &out).is_none());

        neg.respond_to_challenge(false, &out).unwrap();
        assert_eq!(
            out.take(),
            vec![ClientMessage::RespondToChallenge {
                accept: false,
                challenger_id: "carol".into(),
            }]
        );
        assert!(neg.pending_offer().is_none());
        assert!(matches!(neg.state(), NegotiationState::DeclinedByMe { .. }));
    }

    #[test]
    fn test_respond_without_offer() {
        let out = RecordingOutbound::connected();
        let mut neg = negotiator();
        assert!(matches!(
            neg.respond_to_challenge(true, &out),
            Err(ClientError::Negotiation(NegotiationError::NoPendingChallenge))
        ));
    }

    #[test]
    fn test_respond_failure_keeps_offer() {
        let out = RecordingOutbound::disconnected();
        let mut neg = negotiator();
        neg.on_challenge_received(offer("carol"), &out);
        assert!(neg.respond_to_challenge(true, &out).is_err());
        assert!(neg.pending_offer().is_some());
    }

    #[test]
    fn test_newer_offer_supersedes_and_declines_older() {
        let out = RecordingOutbound::connected();
        let mut neg = negotiator();
        neg.on_challenge_received(offer("carol"), &out);
        let superseded = neg.on_challenge_received(offer("dave"), &out).unwrap();

        assert_eq!(superseded.challenger_id, "carol");
        assert_eq!(neg.pending_offer().unwrap().challenger_id, "dave");
        assert_eq!(
            out.take(),
            vec![ClientMessage::RespondToChallenge {
                accept: false,
                challenger_id: "carol".into(),
            }]
        );
    }

    #[test]
    fn test_renewed_offer_from_same_challenger_is_not_declined() {
        let out = RecordingOutbound::connected();
        let mut neg = negotiator();
        neg.on_challenge_received(offer("carol"), &out);
        assert!(neg.on_challenge_received(offer("carol"), &out).is_none());
        assert!(out.is_empty());
    }

    #[test]
    fn test_challenge_response_transitions() {
        let out = RecordingOutbound::connected();
        let mut neg = negotiator();
        let now = Instant::now();
        neg.challenge("bob".into(), TimeControl::Blitz, ColorPreference::Random, &out, now)
            .unwrap();
        neg.on_challenge_response(false);
        assert_eq!(
            neg.state(),
            &NegotiationState::ChallengeDeclined {
                opponent_id: "bob".into()
            }
        );

        neg.challenge("bob".into(), TimeControl::Blitz, ColorPreference::Random, &out, now)
            .unwrap();
        neg.on_challenge_response(true);
        assert!(matches!(
            neg.state(),
            NegotiationState::ChallengeAccepted { .. }
        ));
    }

    #[test]
    fn test_agreed_mode_survives_acceptance() {
        let out = RecordingOutbound::connected();
        let mut neg = negotiator();
        let now = Instant::now();
        neg.challenge("bob".into(), TimeControl::Bullet, ColorPreference::Random, &out, now)
            .unwrap();
        neg.on_challenge_response(true);
        assert_eq!(neg.take_agreed_mode(), Some(TimeControl::Bullet));
        assert_eq!(neg.take_agreed_mode(), None);

        neg.on_challenge_received(offer("carol"), &out);
        neg.respond_to_challenge(true, &out).unwrap();
        assert_eq!(neg.take_agreed_mode(), Some(TimeControl::Rapid));
    }

    #[test]
    fn test_declined_challenge_forgets_mode() {
        let out = RecordingOutbound::connected();
        let mut neg = negotiator();
        neg.challenge(
            "bob".into(),
            TimeControl::Blitz,
            ColorPreference::Random,
            &out,
            Instant::now(),
        )
        .unwrap();
        neg.on_challenge_response(false);
        assert_eq!(neg.take_agreed_mode(), None);
    }

    #[test]
    fn test_challenge_error_returns_to_admission() {
        let out = RecordingOutbound::connected();
        let mut neg = negotiator();
        let now = Instant::now();
        neg.challenge("ghost".into(), TimeControl::Blitz, ColorPreference::Random, &out, now)
            .unwrap();
        neg.on_challenge_error("user offline");
        assert_eq!(
            neg.state(),
            &NegotiationState::Errored {
                reason: "user offline".into()
            }
        );
        assert!(neg.find_match(blitz(), &out, now).is_ok());
    }

    #[test]
    fn test_challenge_times_out() {
        let out = RecordingOutbound::connected();
        let mut neg = negotiator();
        let now = Instant::now();
        neg.challenge("bob".into(), TimeControl::Blitz, ColorPreference::Random, &out, now)
            .unwrap();

        assert!(!neg.poll_timeout(now + Duration::from_secs(29)));
        assert!(neg.poll_timeout(now + Duration::from_secs(30)));
        assert_eq!(
            neg.state(),
            &NegotiationState::Errored {
                reason: "challenge timed out".into()
            }
        );
        assert!(!neg.poll_timeout(now + Duration::from_secs(60)));
    }

    #[test]
    fn test_empty_opponent_rejected() {
        let out = RecordingOutbound::connected();
        let mut neg = negotiator();
        assert!(matches!(
            neg.challenge(" ".into(), TimeControl::Blitz, ColorPreference::Random, &out, Instant::now()),
            Err(ClientError::Negotiation(NegotiationError::InvalidOpponent(_)))
        ));
    }

    #[test]
    fn test_connection_lost_drops_queue_and_offer() {
        let out = RecordingOutbound::connected();
        let mut neg = negotiator();
        neg.find_match(blitz(), &out, Instant::now()).unwrap();
        neg.on_challenge_received(offer("carol"), &out);
        neg.on_connection_lost();
        assert!(matches!(neg.state(), NegotiationState::Errored { .. }));
        assert!(neg.pending_offer().is_none());
    }
}
