//! Vote collection for the open round
//!
//! Two channels: the streamer (one vote per round) and chat (one vote per
//! chat user per round, summed into a four-slot histogram).

use std::collections::HashSet;

use crate::error::GameError;
use crate::types::{VoterId, MAX_ANSWERS};

/// Map a raw chat token to an answer position (1-based).
///
/// Only the exact tokens `1`-`4`, `a`-`d` and `A`-`D` count as votes.
pub fn parse_vote(token: &str) -> Option<usize> {
    match token {
        "1" | "a" | "A" => Some(1),
        "2" | "b" | "B" => Some(2),
        "3" | "c" | "C" => Some(3),
        "4" | "d" | "D" => Some(4),
        _ => None,
    }
}

#[derive(Debug, Clone, Default)]
pub struct VoteTally {
    streamer_vote: Option<usize>,
    chat_vote_count: [u32; MAX_ANSWERS],
    voters: HashSet<VoterId>,
}

/// Outcome of closing a round
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub correct: usize,
    pub streamer_vote: Option<usize>,
    /// `None` when chat cast no votes at all
    pub chat_vote: Option<usize>,
    pub chat_vote_count: [u32; MAX_ANSWERS],
}

impl Resolution {
    pub fn streamer_correct(&self) -> bool {
        self.streamer_vote == Some(self.correct)
    }

    pub fn chat_correct(&self) -> bool {
        self.chat_vote == Some(self.correct)
    }
}

impl VoteTally {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn chat_vote_count(&self) -> [u32; MAX_ANSWERS] {
        self.chat_vote_count
    }

    pub fn total_chat_votes(&self) -> u32 {
        self.chat_vote_count.iter().sum()
    }

    /// Set the streamer's vote. Positions must already be validated.
    pub fn cast_streamer(&mut self, position: usize) -> Result<(), GameError> {
        if self.streamer_vote.is_some() {
            return Err(GameError::AlreadyVoted);
        }
        self.streamer_vote = Some(position);
        Ok(())
    }

    /// Count a chat vote. Returns false for repeat voters and positions
    /// outside the histogram.
    pub fn cast_chat(&mut self, voter: &str, position: usize) -> bool {
        let Some(slot) = position
            .checked_sub(1)
            .and_then(|i| self.chat_vote_count.get_mut(i))
        else {
            return false;
        };
        if !self.voters.insert(voter.to_string()) {
            return false;
        }
        *slot += 1;
        true
    }

    /// Work out the chat's answer for a round whose correct answer is at
    /// `correct`.
    ///
    /// The chat's pick starts at the correct answer. Scanning the positions
    /// in order, every position with strictly more votes than the correct
    /// answer overwrites the pick, so the last such position wins even if an
    /// earlier one had more votes.
    pub fn resolve(&self, correct: usize) -> Resolution {
        let correct_count = correct
            .checked_sub(1)
            .and_then(|i| self.chat_vote_count.get(i))
            .copied()
            .unwrap_or(0);

        let mut chat_vote = correct;
        for (i, &votes) in self.chat_vote_count.iter().enumerate() {
            if votes > correct_count {
                chat_vote = i + 1;
            }
        }

        Resolution {
            correct,
            streamer_vote: self.streamer_vote,
            chat_vote: (self.total_chat_votes() > 0).then_some(chat_vote),
            chat_vote_count: self.chat_vote_count,
        }
    }
}
