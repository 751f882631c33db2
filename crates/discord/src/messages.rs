use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use dabini_core::locale::Translations;
use dabini_core::session::Session;
use dabini_engine::types::EngineRequest;
use tracing::{info, warn};

use crate::commands::{registration_payload, CommandService};
use crate::delivery::{plan_channel_segments, send_to_channel, MessagePayload};
use crate::embeds::render_engine_response;
use crate::gateway::{BotUser, GatewayEventHandler};
use crate::interactions::User;
use crate::rest::PlatformApi;

/// Channel type code of a guild text channel.
pub const GUILD_TEXT_CHANNEL: u8 = 0;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GatewayMessage {
    pub id: String,
    pub channel_id: String,
    pub guild_id: Option<String>,
    pub guild_locale: Option<String>,
    pub author: User,
    pub member_nick: Option<String>,
    pub content: String,
    pub mentions: Vec<MentionedUser>,
    pub mention_roles: Vec<MentionedRole>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MentionedUser {
    pub id: String,
    pub username: String,
    /// Guild nickname or global name, when the platform resolved one.
    pub display_name: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MentionedRole {
    pub id: String,
    pub name: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GuildInfo {
    pub id: String,
    pub name: String,
    pub preferred_locale: Option<String>,
    pub system_channel_id: Option<String>,
    pub text_channels: Vec<GuildChannel>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GuildChannel {
    pub id: String,
    pub kind: u8,
    /// Whether the bot may post in the channel.
    pub can_send: bool,
}

impl GuildInfo {
    /// The system channel, or the first text channel the bot can post in.
    pub fn welcome_channel(&self) -> Option<&str> {
        self.system_channel_id.as_deref().or_else(|| {
            self.text_channels
                .iter()
                .find(|channel| channel.kind == GUILD_TEXT_CHANNEL && channel.can_send)
                .map(|channel| channel.id.as_str())
        })
    }
}

/// Rewrites mention markup into the plain words a language model can read.
pub fn clean_prompt(message: &GatewayMessage, translations: &Translations) -> String {
    let mut prompt = message.content.clone();
    for user in &message.mentions {
        let name = user.display_name.as_deref().unwrap_or(&user.username);
        prompt = prompt.replace(&format!("<@!{}>", user.id), name);
        prompt = prompt.replace(&format!("<@{}>", user.id), name);
    }
    for role in &message.mention_roles {
        prompt = prompt.replace(&format!("<@&{}>", role.id), &format!("@{}", role.name));
    }

    prompt
        .replace("@everyone", translations.everyone)
        .replace("@here", translations.here)
        .trim()
        .to_owned()
}

/// Handles the gateway side: command registration, mention replies and guild welcomes.
pub struct BotMessageHandler {
    commands: Arc<CommandService>,
    platform: Arc<dyn PlatformApi>,
    bot_user: RwLock<Option<BotUser>>,
}

impl BotMessageHandler {
    pub fn new(commands: Arc<CommandService>, platform: Arc<dyn PlatformApi>) -> Self {
        Self { commands, platform, bot_user: RwLock::new(None) }
    }

    fn bot_user(&self) -> Option<BotUser> {
        self.bot_user.read().ok().and_then(|user| user.clone())
    }

    async fn register_commands(&self) {
        let application_id = match self.platform.current_application_id().await {
            Ok(application_id) => application_id,
            Err(error) => {
                warn!(
                    event_name = "integration.discord.register_commands_failed",
                    error = %error,
                    "could not resolve application id for command registration"
                );
                return;
            }
        };

        let commands = registration_payload();
        match self.platform.register_commands(&application_id, &commands).await {
            Ok(()) => info!(
                event_name = "integration.discord.commands_registered",
                application_id = %application_id,
                count = commands.len(),
                "registered slash commands"
            ),
            Err(error) => warn!(
                event_name = "integration.discord.register_commands_failed",
                application_id = %application_id,
                error = %error,
                "slash command registration failed"
            ),
        }
    }

    async fn reply(&self, message: &GatewayMessage, prompt: String, translations: &Translations) {
        let speaker = message.member_nick.as_deref().or(message.author.global_name.as_deref());
        let session = Session::for_channel(&message.channel_id)
            .with_speaker(speaker, Some(&message.author.username))
            .with_user_id(Some(&message.author.id));

        let response =
            match self.commands.engine().send_messages(&EngineRequest::new(prompt, &session)).await {
                Ok(response) => response,
                Err(_) => {
                    self.send(message, vec![MessagePayload::content(translations.engine_unavailable)])
                        .await;
                    return;
                }
            };

        let time_zone = self.commands.timezones().get(message.guild_id.as_deref());
        let reply = render_engine_response(&response, translations, &time_zone);
        let payloads = plan_channel_segments(&reply);

        self.send(message, payloads).await;
    }

    async fn send(&self, message: &GatewayMessage, payloads: Vec<MessagePayload>) {
        let report = send_to_channel(self.platform.as_ref(), &message.channel_id, &payloads).await;
        if report.failed > 0 {
            warn!(
                event_name = "integration.discord.mention_reply_incomplete",
                correlation_id = %message.id,
                delivered = report.delivered,
                failed = report.failed,
                "mention reply was not fully delivered"
            );
        }
    }
}

#[async_trait]
impl GatewayEventHandler for BotMessageHandler {
    async fn on_ready(&self, bot_user: &BotUser) {
        if let Ok(mut current) = self.bot_user.write() {
            *current = Some(bot_user.clone());
        }
        self.register_commands().await;
    }

    async fn on_message(&self, message: &GatewayMessage) {
        if message.author.bot {
            return;
        }
        let Some(bot) = self.bot_user() else {
            return;
        };
        if !message.mentions.iter().any(|user| user.id == bot.id) {
            return;
        }

        let translations = self.commands.translations_for(message.guild_locale.as_deref());
        let prompt = clean_prompt(message, translations);
        if prompt.is_empty() {
            return;
        }

        info!(
            event_name = "ingress.discord.mention_received",
            correlation_id = %message.id,
            channel_id = %message.channel_id,
            "received mention"
        );
        if let Err(error) = self.platform.trigger_typing(&message.channel_id).await {
            warn!(
                event_name = "integration.discord.typing_failed",
                correlation_id = %message.id,
                error = %error,
                "failed to show typing indicator"
            );
        }

        self.reply(message, prompt, translations).await;
    }

    async fn on_guild_create(&self, guild: &GuildInfo) {
        info!(
            event_name = "ingress.discord.guild_joined",
            guild_id = %guild.id,
            guild_name = %guild.name,
            "bot added to guild"
        );
        let Some(channel_id) = guild.welcome_channel() else {
            info!(
                event_name = "ingress.discord.welcome_skipped",
                guild_id = %guild.id,
                "no channel available for welcome message"
            );
            return;
        };

        let bot_name = self.bot_user().map(|user| user.username);
        let session = Session::for_channel(channel_id).with_speaker(None, bot_name.as_deref());
        let content = self.commands.hello_content(&session, guild.preferred_locale.as_deref()).await;

        if let Err(error) =
            self.platform.send_channel_message(channel_id, &MessagePayload::content(content)).await
        {
            warn!(
                event_name = "integration.discord.welcome_failed",
                guild_id = %guild.id,
                error = %error,
                "failed to send welcome message"
            );
        }
    }
}
