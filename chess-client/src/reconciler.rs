//! Game state reconciler.
//!
//! Owns the one [`GameSession`] and folds server pushes into it. Moves are
//! keyed by index: a known index is a duplicate, an index past the next
//! expected one waits in a bounded reorder buffer. Positions are always taken
//! from the server, never computed here.

use std::collections::BTreeMap;

use chess::{PieceColor, STARTING_FEN};
use chess_proto::{
    GameOverPayload, GameStartPayload, GameStatePayload, MoveEntry, RatingDeltas, ResultKind,
};
use tracing::{debug, info, warn};

use crate::captured::CapturedSets;
use crate::error::ReconcileError;
use crate::negotiator::MatchGrant;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveRecord {
    pub index: u32,
    pub notation: String,
    pub mover: PieceColor,
    pub server_timestamp_delta: Option<u64>,
}

impl From<&MoveEntry> for MoveRecord {
    fn from(entry: &MoveEntry) -> Self {
        Self {
            index: entry.index,
            notation: entry.notation.clone(),
            mover: entry.mover,
            server_timestamp_delta: entry.server_timestamp_delta,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Terminal {
    pub kind: ResultKind,
    pub winner: Option<PieceColor>,
    pub rating_deltas: Option<RatingDeltas>,
}

/// Mirror of the server's view of one game.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameSession {
    pub session_id: String,
    /// `[white, black]`.
    pub players: [String; 2],
    pub position: String,
    pub turn: PieceColor,
    pub move_log: Vec<MoveRecord>,
    pub white_clock_ms: u64,
    pub black_clock_ms: u64,
    pub terminal: Option<Terminal>,
    /// Color this client plays, `None` when only watching.
    pub local_color: Option<PieceColor>,
    pub resumed: bool,
}

impl GameSession {
    fn placeholder(grant: &MatchGrant) -> Self {
        Self {
            session_id: grant.session_id.clone(),
            players: [String::new(), String::new()],
            position: STARTING_FEN.to_string(),
            turn: PieceColor::White,
            move_log: Vec::new(),
            white_clock_ms: 0,
            black_clock_ms: 0,
            terminal: None,
            local_color: grant.assigned_color,
            resumed: false,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.terminal.is_some()
    }

    /// Index the next move must carry.
    pub fn next_index(&self) -> u32 {
        self.move_log.last().map_or(0, |m| m.index + 1)
    }

    pub fn player(&self, color: PieceColor) -> &str {
        match color {
            PieceColor::White => &self.players[0],
            PieceColor::Black => &self.players[1],
        }
    }

    fn recompute_turn(&mut self) {
        self.turn = self
            .move_log
            .last()
            .map_or(PieceColor::White, |m| m.mover.opposite());
    }
}

/// Which side is drawn at the bottom of the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Orientation {
    pub bottom: PieceColor,
}

impl Default for Orientation {
    fn default() -> Self {
        Self {
            bottom: PieceColor::White,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameStartOutcome {
    /// A new session replaced whatever was there.
    Started,
    /// Same session again: details refreshed, move log kept.
    Refreshed,
    /// The session is over and stays that way.
    Ignored,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateOutcome {
    /// `applied` moves were appended, including any released from the buffer.
    Applied { applied: usize },
    Duplicate,
    Buffered { pending: usize },
}

pub struct Reconciler {
    session: Option<GameSession>,
    captured: CapturedSets,
    orientation: Orientation,
    auto_rotate: bool,
    local_user: Option<String>,
    pending: BTreeMap<u32, GameStatePayload>,
    reorder_capacity: usize,
}

impl Reconciler {
    pub fn new(reorder_capacity: usize, auto_rotate: bool) -> Self {
        Self {
            session: None,
            captured: CapturedSets::default(),
            orientation: Orientation::default(),
            auto_rotate,
            local_user: None,
            pending: BTreeMap::new(),
            reorder_capacity,
        }
    }

    pub fn set_local_user(&mut self, user_id: Option<String>) {
        self.local_user = user_id;
    }

    pub fn session(&self) -> Option<&GameSession> {
        self.session.as_ref()
    }

    pub fn captured(&self) -> &CapturedSets {
        &self.captured
    }

    pub fn orientation(&self) -> Orientation {
        self.orientation
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn set_auto_rotate(&mut self, on: bool) {
        self.auto_rotate = on;
        self.reorient();
    }

    /// Open a session from a match grant, ahead of its `gameStart`.
    pub fn begin(&mut self, grant: &MatchGrant) {
        if let Some(current) = &self.session {
            if current.session_id == grant.session_id {
                return;
            }
        }
        info!(session_id = %grant.session_id, "session granted");
        self.install(GameSession::placeholder(grant));
    }

    pub fn apply_game_start(&mut self, payload: &GameStartPayload) -> GameStartOutcome {
        let local_color = self.color_of_local_user(payload);

        if let Some(current) = self.session.as_mut() {
            if current.session_id == payload.session_id {
                if current.is_terminal() {
                    debug!(session_id = %payload.session_id, "gameStart for finished session ignored");
                    return GameStartOutcome::Ignored;
                }
                current.players = [payload.white_id.clone(), payload.black_id.clone()];
                current.local_color = local_color.or(current.local_color);
                current.resumed |= payload.is_resumed_game;
                // A repeated plain gameStart would rewind the board.
                if payload.is_resumed_game || current.move_log.is_empty() {
                    current.position = payload.initial_position.clone();
                    current.white_clock_ms = payload.white_ms;
                    current.black_clock_ms = payload.black_ms;
                }
                info!(
                    session_id = %payload.session_id,
                    resumed = payload.is_resumed_game,
                    moves = current.move_log.len(),
                    "session refreshed"
                );
                self.recompute_derived();
                return GameStartOutcome::Refreshed;
            }
        }

        info!(session_id = %payload.session_id, color = ?local_color, "session started");
        self.install(GameSession {
            session_id: payload.session_id.clone(),
            players: [payload.white_id.clone(), payload.black_id.clone()],
            position: payload.initial_position.clone(),
            turn: PieceColor::White,
            move_log: Vec::new(),
            white_clock_ms: payload.white_ms,
            black_clock_ms: payload.black_ms,
            terminal: None,
            local_color,
            resumed: payload.is_resumed_game,
        });
        GameStartOutcome::Started
    }

    pub fn apply_state_event(
        &mut self,
        payload: &GameStatePayload,
    ) -> Result<StateOutcome, ReconcileError> {
        let session = self.session.as_mut().ok_or(ReconcileError::NoSession)?;
        if session.is_terminal() {
            return Err(ReconcileError::SessionTerminal);
        }

        let expected = session.next_index();
        let index = payload.move_index;
        if index < expected || self.pending.contains_key(&index) {
            debug!(index, expected, "duplicate move dropped");
            return Ok(StateOutcome::Duplicate);
        }
        if index > expected {
            if self.pending.len() >= self.reorder_capacity {
                warn!(index, expected, "reorder buffer full");
                return Err(ReconcileError::OutOfOrder {
                    expected,
                    got: index,
                });
            }
            self.pending.insert(index, payload.clone());
            debug!(index, expected, pending = self.pending.len(), "move buffered");
            return Ok(StateOutcome::Buffered {
                pending: self.pending.len(),
            });
        }

        push_state(session, payload);
        let mut applied = 1;
        while let Some(next) = self.pending.remove(&session.next_index()) {
            push_state(session, &next);
            applied += 1;
        }
        session.recompute_turn();
        debug!(
            applied,
            next = session.next_index(),
            turn = %session.turn,
            "moves applied"
        );
        self.recompute_derived();
        Ok(StateOutcome::Applied { applied })
    }

    /// Returns whether the clocks changed.
    pub fn apply_time_update(&mut self, white_ms: u64, black_ms: u64) -> bool {
        match self.session.as_mut() {
            Some(session) if !session.is_terminal() => {
                session.white_clock_ms = white_ms;
                session.black_clock_ms = black_ms;
                true
            }
            _ => false,
        }
    }

    /// Mark the session over. Returns `true` only the first time.
    pub fn apply_game_over(&mut self, payload: &GameOverPayload) -> bool {
        let Some(session) = self.session.as_mut() else {
            warn!("gameOver without a session");
            return false;
        };
        if session.is_terminal() {
            return false;
        }
        info!(
            session_id = %session.session_id,
            result = ?payload.result_kind,
            winner = ?payload.winner,
            "game over"
        );
        session.terminal = Some(Terminal {
            kind: payload.result_kind,
            winner: payload.winner,
            rating_deltas: payload.rating_deltas,
        });
        self.pending.clear();
        true
    }

    /// Merge a full history push. Known moves are skipped; a gap rejects the
    /// whole batch without touching the session. Returns how many moves were
    /// appended.
    pub fn apply_move_history_bulk(&mut self, moves: &[MoveEntry]) -> Result<usize, ReconcileError> {
        let session = self.session.as_mut().ok_or(ReconcileError::NoSession)?;
        if session.is_terminal() {
            return Err(ReconcileError::SessionTerminal);
        }

        let mut sorted: Vec<&MoveEntry> = moves.iter().collect();
        sorted.sort_by_key(|m| m.index);

        let mut expected = session.next_index();
        let mut fresh = Vec::new();
        for entry in sorted {
            if entry.index < expected {
                continue;
            }
            if entry.index > expected {
                return Err(ReconcileError::OutOfOrder {
                    expected,
                    got: entry.index,
                });
            }
            fresh.push(entry);
            expected += 1;
        }

        for entry in &fresh {
            session.move_log.push(MoveRecord::from(*entry));
            if let Some(position) = &entry.resulting_position {
                session.position = position.clone();
            }
        }
        let mut applied = fresh.len();
        while let Some(next) = self.pending.remove(&session.next_index()) {
            push_state(session, &next);
            applied += 1;
        }
        let next = session.next_index();
        self.pending.retain(|&index, _| index > next);
        session.recompute_turn();
        info!(applied, total = session.move_log.len(), "move history merged");
        self.recompute_derived();
        Ok(applied)
    }

    /// Drop the session and everything derived from it.
    pub fn clear(&mut self) {
        if let Some(session) = self.session.take() {
            info!(session_id = %session.session_id, "session cleared");
        }
        self.pending.clear();
        self.captured = CapturedSets::default();
        self.orientation = Orientation::default();
    }

    fn install(&mut self, session: GameSession) {
        self.session = Some(session);
        self.pending.clear();
        self.recompute_derived();
    }

    fn color_of_local_user(&self, payload: &GameStartPayload) -> Option<PieceColor> {
        let user = self.local_user.as_deref()?;
        if payload.white_id == user {
            Some(PieceColor::White)
        } else if payload.black_id == user {
            Some(PieceColor::Black)
        } else {
            None
        }
    }

    fn recompute_derived(&mut self) {
        self.captured = match &self.session {
            Some(session) => CapturedSets::from_position(&session.position).unwrap_or_else(|e| {
                warn!(position = %session.position, "cannot read position: {e}");
                CapturedSets::default()
            }),
            None => CapturedSets::default(),
        };
        self.reorient();
    }

    fn reorient(&mut self) {
        let Some(session) = &self.session else {
            self.orientation = Orientation::default();
            return;
        };
        let bottom = if self.auto_rotate {
            session.turn
        } else {
            session.local_color.unwrap_or(PieceColor::White)
        };
        self.orientation = Orientation { bottom };
    }
}

fn push_state(session: &mut GameSession, payload: &GameStatePayload) {
    session.move_log.push(MoveRecord {
        index: payload.move_index,
        notation: payload.notation.clone(),
        mover: payload.mover,
        server_timestamp_delta: payload.server_timestamp_delta,
    });
    session.position = payload.resulting_position.clone();
}
