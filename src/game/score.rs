use serde::{Deserialize, Serialize};

use super::tally::Resolution;
use crate::types::{Round, MAX_ANSWERS};

/// Points for a correct answer, for streamer and chat alike
pub const ROUND_POINTS: u32 = 5;

/// Running totals for the whole game
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct GameSummary {
    pub streamer_points: u32,
    pub streamer_won: u32,
    pub chat_points: u32,
    pub chat_won: u32,
}

impl GameSummary {
    /// Apply a resolved round
    pub fn record(&mut self, resolution: &Resolution) {
        if resolution.streamer_correct() {
            self.streamer_points += ROUND_POINTS;
            self.streamer_won += 1;
        }
        if resolution.chat_correct() {
            self.chat_points += ROUND_POINTS;
            self.chat_won += 1;
        }
    }
}

/// A closed round with its votes and the totals after scoring it.
/// Vote fields use 0 for "no vote".
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RoundSummary {
    #[serde(flatten)]
    pub round: Round,
    pub streamer_points: u32,
    pub streamer_vote: usize,
    pub chat_points: u32,
    pub chat_vote: usize,
    pub chat_vote_count: [u32; MAX_ANSWERS],
}

impl RoundSummary {
    pub fn new(round: Round, resolution: &Resolution, totals: &GameSummary) -> Self {
        Self {
            round,
            streamer_points: totals.streamer_points,
            streamer_vote: resolution.streamer_vote.unwrap_or(0),
            chat_points: totals.chat_points,
            chat_vote: resolution.chat_vote.unwrap_or(0),
            chat_vote_count: resolution.chat_vote_count,
        }
    }
}
