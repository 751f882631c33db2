use serde::{Deserialize, Serialize};

pub const SESSION_PREFIX: &str = "discord-";

/// Conversation identity passed to the engine. Built per inbound event and never stored.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub session_id: String,
    pub speaker_name: Option<String>,
    pub user_id: Option<String>,
}

impl Session {
    pub fn for_channel(channel_id: &str) -> Self {
        Self { session_id: session_id_for(channel_id), speaker_name: None, user_id: None }
    }

    /// Uses the first non-blank name among `nick` and `username`.
    pub fn with_speaker(mut self, nick: Option<&str>, username: Option<&str>) -> Self {
        self.speaker_name = [nick, username]
            .into_iter()
            .flatten()
            .map(str::trim)
            .find(|name| !name.is_empty())
            .map(str::to_owned);
        self
    }

    pub fn with_user_id(mut self, user_id: Option<&str>) -> Self {
        self.user_id = user_id.map(str::to_owned);
        self
    }
}

pub fn session_id_for(channel_id: &str) -> String {
    format!("{SESSION_PREFIX}{channel_id}")
}
