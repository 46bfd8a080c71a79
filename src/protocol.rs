use crate::game::score::GameSummary;
use crate::game::RoundOutcome;
use crate::types::*;
use serde::{Deserialize, Serialize};

/// Notifications pushed to a connection's websocket clients
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServerMessage {
    ChatVote {
        username: String,
        vote: usize,
        chat_vote_count: [u32; MAX_ANSWERS],
    },
    StreamerVote {
        username: String,
        vote: usize,
        chat_vote_count: [u32; MAX_ANSWERS],
    },
    RoundEnd(RoundOutcome),
    GameEnd(GameSummary),
}

/// POST /game/vote
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoteRequest {
    pub vote: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoteResponse {
    pub vote: usize,
}

/// POST /login
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub username: String,
    pub channel: ChannelName,
    pub token: String,
}

/// PUT /categories
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReloadRequest {
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReloadResponse {
    pub categories: usize,
    pub questions: usize,
    pub exported: usize,
}

/// GET /game
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameStatus {
    pub phase: crate::game::SessionPhase,
    pub current_round: usize,
    pub max_round: usize,
    #[serde(flatten)]
    pub summary: GameSummary,
}
