//! Game session state machine
//!
//! A [`GameSession`] owns the drawn rounds, the tally of the open round, the
//! running summary and the deadline timer. It is not synchronized itself;
//! the owning connection keeps it behind its session lock.

pub mod sampler;
pub mod score;
pub mod tally;
pub mod timer;

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::catalog::Catalog;
use crate::error::GameError;
use crate::types::{Round, RoundView, MAX_ANSWERS};
use sampler::DrawRequest;
use score::{GameSummary, RoundSummary};
use tally::{parse_vote, VoteTally};
use timer::{RoundTimer, RoundToken};

/// Receives the token of a round whose deadline passed
pub type DeadlineSink = Arc<dyn Fn(RoundToken) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    Idle,
    RoundOpen,
    RoundResolving,
    Completed,
}

/// Start-game request body
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct GameRequest {
    #[serde(flatten)]
    pub draw: DrawRequest,
    /// Seconds per round
    #[serde(default, alias = "round_duration_seconds")]
    pub round_duration: i64,
}

/// Result of resolving a round. `game` is set when it was the last one.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RoundOutcome {
    #[serde(flatten)]
    pub summary: RoundSummary,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub game: Option<GameSummary>,
}

impl RoundOutcome {
    pub fn is_final(&self) -> bool {
        self.game.is_some()
    }
}

pub struct GameSession {
    rounds: Vec<Round>,
    /// 1-based position of the open round
    current: usize,
    round_duration: Duration,
    phase: SessionPhase,
    token: RoundToken,
    timer: Option<RoundTimer>,
    tally: VoteTally,
    summary: GameSummary,
    on_deadline: DeadlineSink,
}

impl std::fmt::Debug for GameSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GameSession")
            .field("rounds", &self.rounds.len())
            .field("current", &self.current)
            .field("phase", &self.phase)
            .field("token", &self.token)
            .field("summary", &self.summary)
            .finish_non_exhaustive()
    }
}

impl GameSession {
    /// Draw the rounds and open the first one.
    ///
    /// Nothing is armed or allocated when validation fails. Must be called
    /// inside a tokio runtime since the first round's timer is spawned here.
    pub fn start<R: Rng + ?Sized>(
        catalog: &Catalog,
        request: &GameRequest,
        rng: &mut R,
        on_deadline: DeadlineSink,
    ) -> Result<Self, GameError> {
        if request.round_duration <= 0 {
            return Err(GameError::InvalidDuration(request.round_duration));
        }
        let round_duration = Duration::from_secs(request.round_duration.unsigned_abs());

        let rounds = sampler::draw(catalog, &request.draw, rng)?;

        let mut session = Self {
            rounds,
            current: 1,
            round_duration,
            phase: SessionPhase::Idle,
            token: RoundToken::default(),
            timer: None,
            tally: VoteTally::new(),
            summary: GameSummary::default(),
            on_deadline,
        };
        session.open_round();
        Ok(session)
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn token(&self) -> RoundToken {
        self.token
    }

    pub fn round_duration(&self) -> Duration {
        self.round_duration
    }

    pub fn round_count(&self) -> usize {
        self.rounds.len()
    }

    pub fn summary(&self) -> GameSummary {
        self.summary
    }

    pub fn chat_vote_count(&self) -> [u32; MAX_ANSWERS] {
        self.tally.chat_vote_count()
    }

    fn open(&self) -> Result<&Round, GameError> {
        match self.phase {
            SessionPhase::RoundOpen | SessionPhase::RoundResolving => self
                .rounds
                .get(self.current.saturating_sub(1))
                .ok_or(GameError::RoundNotOpen),
            SessionPhase::Completed => Err(GameError::GameCompleted),
            SessionPhase::Idle => Err(GameError::RoundNotOpen),
        }
    }

    /// The open round without its correct index
    pub fn current_round(&self) -> Result<RoundView, GameError> {
        self.open().map(Round::view)
    }

    /// Map a vote token to a position of the open round
    fn position(&self, token: &str) -> Result<usize, GameError> {
        let round = self.open()?;
        if self.phase != SessionPhase::RoundOpen {
            return Err(GameError::RoundNotOpen);
        }
        parse_vote(token)
            .filter(|pos| *pos <= round.answers.len())
            .ok_or_else(|| GameError::InvalidVote(token.to_string()))
    }

    pub fn cast_streamer_vote(&mut self, token: &str) -> Result<usize, GameError> {
        let position = self.position(token)?;
        self.tally.cast_streamer(position)?;
        Ok(position)
    }

    /// Count a chat message as a vote. Returns the position if it was
    /// accepted; anything else is silently ignored.
    pub fn cast_chat_vote(&mut self, voter: &str, text: &str) -> Option<usize> {
        let position = self.position(text).ok()?;
        self.tally.cast_chat(voter, position).then_some(position)
    }

    /// Resolve the open round on request, cancelling its timer
    pub fn advance(&mut self) -> Result<RoundOutcome, GameError> {
        let round = self.open()?.clone();
        if self.phase != SessionPhase::RoundOpen {
            return Err(GameError::RoundNotOpen);
        }

        if let Some(timer) = self.timer.take() {
            if timer.cancel() {
                tracing::debug!(
                    "Timer for round {} already fired, its deadline is stale now",
                    self.current
                );
            }
        }

        Ok(self.resolve(round))
    }

    /// Resolve the open round because its deadline passed. Returns `None`
    /// when `token` no longer names the open round.
    pub fn resolve_on_deadline(&mut self, token: RoundToken) -> Option<RoundOutcome> {
        if self.phase != SessionPhase::RoundOpen || token != self.token {
            tracing::debug!("Ignoring stale round deadline {:?}", token);
            return None;
        }
        let round = self.open().ok()?.clone();
        self.timer = None;
        Some(self.resolve(round))
    }

    /// Stop the game early. The summary is handed out only once.
    pub fn end_game(&mut self) -> Result<GameSummary, GameError> {
        if self.phase == SessionPhase::Completed {
            return Err(GameError::GameCompleted);
        }
        if let Some(timer) = self.timer.take() {
            timer.cancel();
        }
        self.rounds.clear();
        self.phase = SessionPhase::Completed;
        Ok(self.summary)
    }

    fn resolve(&mut self, round: Round) -> RoundOutcome {
        self.phase = SessionPhase::RoundResolving;

        let resolution = self.tally.resolve(round.correct);
        self.summary.record(&resolution);
        tracing::info!(
            "Round {}/{} resolved: correct {}, streamer {:?}, chat {:?} {:?}",
            round.current_round,
            round.max_round,
            resolution.correct,
            resolution.streamer_vote,
            resolution.chat_vote,
            resolution.chat_vote_count
        );
        let summary = RoundSummary::new(round, &resolution, &self.summary);

        if self.current >= self.rounds.len() {
            self.phase = SessionPhase::Completed;
            return RoundOutcome {
                summary,
                game: Some(self.summary),
            };
        }

        self.current += 1;
        self.open_round();
        RoundOutcome {
            summary,
            game: None,
        }
    }

    fn open_round(&mut self) {
        self.tally = VoteTally::new();
        self.token = self.token.next();
        self.phase = SessionPhase::RoundOpen;

        let sink = self.on_deadline.clone();
        self.timer = Some(RoundTimer::arm(
            self.token,
            self.round_duration,
            move |token| sink(token),
        ));
    }
}

impl Drop for GameSession {
    fn drop(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.cancel();
        }
    }
}
