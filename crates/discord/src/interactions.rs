use dabini_core::session::Session;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Message flag that hides a reply from everyone but the invoking user.
pub const EPHEMERAL_FLAG: u64 = 1 << 6;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InteractionKind {
    Ping,
    ApplicationCommand,
    MessageComponent,
    Autocomplete,
    ModalSubmit,
}

impl InteractionKind {
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(Self::Ping),
            2 => Some(Self::ApplicationCommand),
            3 => Some(Self::MessageComponent),
            4 => Some(Self::Autocomplete),
            5 => Some(Self::ModalSubmit),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct Interaction {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "type")]
    pub kind: u8,
    #[serde(default)]
    pub application_id: String,
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub data: Option<InteractionData>,
    #[serde(default)]
    pub guild_id: Option<String>,
    #[serde(default)]
    pub channel_id: Option<String>,
    #[serde(default)]
    pub channel: Option<PartialChannel>,
    #[serde(default)]
    pub member: Option<Member>,
    #[serde(default)]
    pub user: Option<User>,
    #[serde(default)]
    pub locale: Option<String>,
    #[serde(default)]
    pub guild_locale: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct InteractionData {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub options: Vec<CommandOptionValue>,
    #[serde(default)]
    pub custom_id: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct CommandOptionValue {
    pub name: String,
    #[serde(default)]
    pub value: Value,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct PartialChannel {
    pub id: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct Member {
    #[serde(default)]
    pub nick: Option<String>,
    #[serde(default)]
    pub user: Option<User>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub global_name: Option<String>,
    #[serde(default)]
    pub bot: bool,
}

impl Interaction {
    pub fn kind(&self) -> Option<InteractionKind> {
        InteractionKind::from_code(self.kind)
    }

    pub fn command_name(&self) -> Option<&str> {
        self.data.as_ref().and_then(|data| data.name.as_deref())
    }

    pub fn channel_id(&self) -> Option<&str> {
        self.channel_id.as_deref().or_else(|| self.channel.as_ref().map(|channel| channel.id.as_str()))
    }

    /// The invoking user: the guild member's user, or the top-level user in DMs.
    pub fn invoking_user(&self) -> Option<&User> {
        self.member.as_ref().and_then(|member| member.user.as_ref()).or(self.user.as_ref())
    }

    pub fn session(&self) -> Session {
        let nick = self.member.as_ref().and_then(|member| member.nick.as_deref());
        let user = self.invoking_user();
        Session::for_channel(self.channel_id().unwrap_or("unknown"))
            .with_speaker(nick, user.map(|user| user.username.as_str()))
            .with_user_id(user.map(|user| user.id.as_str()))
    }

    pub fn string_option(&self, names: &[&str]) -> Option<&str> {
        self.data
            .as_ref()?
            .options
            .iter()
            .filter(|option| names.contains(&option.name.as_str()))
            .find_map(|option| option.value.as_str())
            .filter(|value| !value.trim().is_empty())
    }
}

/// Immediate answer to a webhook interaction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct InteractionResponse {
    #[serde(rename = "type")]
    pub kind: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<InteractionCallbackData>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct InteractionCallbackData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flags: Option<u64>,
}

impl InteractionResponse {
    pub fn pong() -> Self {
        Self { kind: 1, data: None }
    }

    pub fn message(content: impl Into<String>) -> Self {
        Self {
            kind: 4,
            data: Some(InteractionCallbackData { content: Some(content.into()), flags: None }),
        }
    }

    pub fn deferred(ephemeral: bool) -> Self {
        let data = ephemeral
            .then(|| InteractionCallbackData { content: None, flags: Some(EPHEMERAL_FLAG) });
        Self { kind: 5, data }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{Interaction, InteractionKind, InteractionResponse};

    fn command(value: serde_json::Value) -> Interaction {
        match serde_json::from_value(value) {
            Ok(interaction) => interaction,
            Err(error) => panic!("interaction should decode: {error}"),
        }
    }

    #[test]
    fn guild_command_resolves_session_and_prompt() {
        let interaction = command(json!({
            "id": "1", "type": 2, "application_id": "app", "token": "tok",
            "channel_id": "chan-9",
            "member": { "nick": "Dabi", "user": { "id": "u1", "username": "dabi_user" } },
            "data": { "name": "chat", "options": [{ "name": "message", "type": 3, "value": "hi" }] },
            "locale": "ko"
        }));

        assert_eq!(interaction.kind(), Some(InteractionKind::ApplicationCommand));
        assert_eq!(interaction.command_name(), Some("chat"));
        assert_eq!(interaction.string_option(&["message", "prompt"]), Some("hi"));

        let session = interaction.session();
        assert_eq!(session.session_id, "discord-chan-9");
        assert_eq!(session.speaker_name.as_deref(), Some("Dabi"));
        assert_eq!(session.user_id.as_deref(), Some("u1"));
    }

    #[test]
    fn direct_message_uses_top_level_user_and_channel_object() {
        let interaction = command(json!({
            "type": 2, "channel": { "id": "dm-1" },
            "user": { "id": "u2", "username": "solo" },
            "data": { "name": "hello" }
        }));

        let session = interaction.session();
        assert_eq!(session.session_id, "discord-dm-1");
        assert_eq!(session.speaker_name.as_deref(), Some("solo"));
    }

    #[test]
    fn responses_serialize_to_callback_shapes() {
        let pong = serde_json::to_value(InteractionResponse::pong()).ok();
        let deferred = serde_json::to_value(InteractionResponse::deferred(false)).ok();
        let hidden = serde_json::to_value(InteractionResponse::deferred(true)).ok();
        let message = serde_json::to_value(InteractionResponse::message("hey")).ok();

        assert_eq!(pong, Some(json!({ "type": 1 })));
        assert_eq!(deferred, Some(json!({ "type": 5 })));
        assert_eq!(hidden, Some(json!({ "type": 5, "data": { "flags": 64 } })));
        assert_eq!(message, Some(json!({ "type": 4, "data": { "content": "hey" } })));
    }
}
