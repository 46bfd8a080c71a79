use serde::{Deserialize, Serialize};

use crate::types::ChannelName;

/// One message from a chat channel, as delivered by a chat bridge
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
    pub channel: ChannelName,
    pub username: String,
    pub text: String,
    /// Sent by the channel owner; counts as the streamer's vote
    #[serde(default)]
    pub is_broadcaster: bool,
}

/// Channel names are matched without a leading '#' and case-insensitively
pub fn normalize_channel(channel: &str) -> ChannelName {
    channel.trim().trim_start_matches('#').to_lowercase()
}
