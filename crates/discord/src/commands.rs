use std::collections::BTreeMap;
use std::sync::Arc;

use dabini_core::chunking::{truncate_with_ellipsis, utf16_len, DEFAULT_MAX_LEN};
use dabini_core::locale::{self, Translations};
use dabini_core::remote_config::{RemoteConfigCache, ACTIVATION_URL_KEY};
use dabini_core::session::Session;
use dabini_core::timezone::GuildTimezones;
use dabini_engine::client::EngineApi;
use dabini_engine::types::{EngineRequest, ImageRequest};
use serde::Serialize;
use tracing::warn;

use crate::embeds::{escape_markdown, image_card, render_engine_response, response_text, RenderedReply};
use crate::interactions::Interaction;

pub const CAPABILITIES_PROMPT: &str = "너 뭐 할 수 있어? 예시와 함께 보여줘.";
const STRING_OPTION_TYPE: u8 = 3;
const PROMPT_OPTION_NAMES: &[&str] = &["message", "prompt"];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SlashCommand {
    Hello,
    Chat,
    Activation,
    Deactivation,
    ImageGeneration,
    ImageEdit,
}

impl SlashCommand {
    pub const ALL: [SlashCommand; 6] = [
        Self::Hello,
        Self::Chat,
        Self::Activation,
        Self::Deactivation,
        Self::ImageGeneration,
        Self::ImageEdit,
    ];

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|command| command.name() == name)
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Hello => "hello",
            Self::Chat => "chat",
            Self::Activation => "activation",
            Self::Deactivation => "deactivation",
            Self::ImageGeneration => "image-generation",
            Self::ImageEdit => "image-edit",
        }
    }

    /// Account commands answer only the invoking user.
    pub fn is_ephemeral(self) -> bool {
        matches!(self, Self::Activation | Self::Deactivation)
    }

    pub fn definition(self) -> CommandDefinition {
        match self {
            Self::Hello => {
                CommandDefinition::new("hello", "간단한 인사 명령어", "Simple greeting command")
            }
            Self::Chat => CommandDefinition::new("chat", "AI와 대화하기", "Chat with AI").option(
                "message",
                "AI에게 보낼 메시지",
                "Message to send to AI",
            ),
            Self::Activation => CommandDefinition::new(
                "activation",
                "다빈이 계정 활성화",
                "Activation for Dabini account",
            ),
            Self::Deactivation => CommandDefinition::new(
                "deactivation",
                "다빈이 계정 비활성화",
                "Deactivation for Dabini account",
            ),
            Self::ImageGeneration => CommandDefinition::new(
                "image-generation",
                "이미지 생성",
                "Generate an image with AI",
            )
            .option(
                "prompt",
                "이미지 생성 프롬프트 (예: 고양이 그려줘)",
                "Image generation prompt (e.g., draw a cat)",
            ),
            Self::ImageEdit => {
                CommandDefinition::new("image-edit", "이미지 편집", "Edit an image with AI").option(
                    "prompt",
                    "이미지 편집 프롬프트 (예: 배경을 바다로 바꿔줘)",
                    "Image edit prompt (e.g., change the background to the sea)",
                )
            }
        }
    }
}

/// Global command registration payload entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CommandDefinition {
    pub name: &'static str,
    pub description: &'static str,
    pub description_localizations: BTreeMap<&'static str, &'static str>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<CommandOptionDefinition>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CommandOptionDefinition {
    pub name: &'static str,
    pub description: &'static str,
    pub description_localizations: BTreeMap<&'static str, &'static str>,
    #[serde(rename = "type")]
    pub kind: u8,
    pub required: bool,
}

fn localizations(ko: &'static str, en: &'static str) -> BTreeMap<&'static str, &'static str> {
    BTreeMap::from([("en-US", en), ("ko", ko)])
}

impl CommandDefinition {
    fn new(name: &'static str, ko: &'static str, en: &'static str) -> Self {
        Self { name, description: ko, description_localizations: localizations(ko, en), options: Vec::new() }
    }

    fn option(mut self, name: &'static str, ko: &'static str, en: &'static str) -> Self {
        self.options.push(CommandOptionDefinition {
            name,
            description: ko,
            description_localizations: localizations(ko, en),
            kind: STRING_OPTION_TYPE,
            required: true,
        });
        self
    }
}

pub fn registration_payload() -> Vec<CommandDefinition> {
    SlashCommand::ALL.into_iter().map(SlashCommand::definition).collect()
}

/// The `message`/`prompt` option, falling back to the command name.
pub fn extract_prompt(interaction: &Interaction) -> String {
    interaction
        .string_option(PROMPT_OPTION_NAMES)
        .or_else(|| interaction.command_name())
        .unwrap_or_default()
        .to_owned()
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BotSettings {
    pub default_locale: String,
    pub terms_url: String,
    pub privacy_url: String,
    pub activation_url: String,
}

/// Runs slash commands against the engine and renders their replies.
pub struct CommandService {
    engine: Arc<dyn EngineApi>,
    remote_config: Arc<RemoteConfigCache>,
    timezones: Arc<GuildTimezones>,
    settings: BotSettings,
}

impl CommandService {
    pub fn new(
        engine: Arc<dyn EngineApi>,
        remote_config: Arc<RemoteConfigCache>,
        timezones: Arc<GuildTimezones>,
        settings: BotSettings,
    ) -> Self {
        Self { engine, remote_config, timezones, settings }
    }

    pub fn engine(&self) -> &Arc<dyn EngineApi> {
        &self.engine
    }

    pub fn timezones(&self) -> &GuildTimezones {
        &self.timezones
    }

    pub fn translations_for(&self, locale: Option<&str>) -> &'static Translations {
        locale::resolve(locale, &self.settings.default_locale).translations()
    }

    pub async fn execute(&self, command: SlashCommand, interaction: &Interaction) -> RenderedReply {
        let translations = self.translations_for(interaction.locale.as_deref());
        let session = interaction.session();

        match command {
            SlashCommand::Hello => {
                RenderedReply::text(self.hello_content(&session, interaction.locale.as_deref()).await)
            }
            SlashCommand::Chat => self.chat(interaction, &session, translations).await,
            SlashCommand::Activation => self.activation(&session, translations).await,
            SlashCommand::Deactivation => self.deactivation(&session, translations).await,
            SlashCommand::ImageGeneration | SlashCommand::ImageEdit => {
                self.image(command, interaction, &session, translations).await
            }
        }
    }

    /// Greeting, policy links and the engine's own description of what it can do, sized for a
    /// single message. Engine failure keeps the greeting and links.
    pub async fn hello_content(&self, session: &Session, locale: Option<&str>) -> String {
        let translations = self.translations_for(locale);
        let header = format!(
            "{}\n\n**{}**: <{}>\n**{}**: <{}>\n\n",
            translations.greeting,
            translations.terms_label,
            self.settings.terms_url,
            translations.privacy_label,
            self.settings.privacy_url,
        );

        let request = EngineRequest::new(CAPABILITIES_PROMPT, session);
        let capabilities = match self.engine.send_messages(&request).await {
            Ok(response) => response_text(&response, translations),
            Err(error) => {
                warn!(
                    event_name = "integration.engine.capabilities_failed",
                    correlation_id = %session.session_id,
                    error = %error,
                    "hello capabilities unavailable"
                );
                translations.ai_unavailable.to_owned()
            }
        };

        let budget = DEFAULT_MAX_LEN.saturating_sub(utf16_len(&header));
        format!("{header}{}", truncate_with_ellipsis(&capabilities, budget))
    }

    async fn chat(
        &self,
        interaction: &Interaction,
        session: &Session,
        translations: &'static Translations,
    ) -> RenderedReply {
        let request = EngineRequest::new(extract_prompt(interaction), session);
        match self.engine.send_messages(&request).await {
            Ok(response) => {
                let time_zone = self.timezones.get(interaction.guild_id.as_deref());
                render_engine_response(&response, translations, &time_zone)
            }
            Err(_) => RenderedReply::text(translations.engine_unavailable),
        }
    }

    async fn activation(&self, session: &Session, translations: &'static Translations) -> RenderedReply {
        let Some(user_id) = session.user_id.as_deref() else {
            return RenderedReply::text(translations.engine_unavailable);
        };

        match self.engine.activate(user_id).await {
            Ok(response) => {
                let base = self
                    .remote_config
                    .get_value(ACTIVATION_URL_KEY, &self.settings.activation_url)
                    .await;
                let link = match response.activation_code.as_deref().filter(|code| !code.is_empty()) {
                    Some(code) => format!("{base}?code={code}"),
                    None => base,
                };
                let lead = response.message.as_deref().unwrap_or(translations.activation_prompt);
                RenderedReply::text(format!("{lead}\n<{link}>"))
            }
            Err(_) => RenderedReply::text(translations.engine_unavailable),
        }
    }

    async fn deactivation(
        &self,
        session: &Session,
        translations: &'static Translations,
    ) -> RenderedReply {
        let Some(user_id) = session.user_id.as_deref() else {
            return RenderedReply::text(translations.engine_unavailable);
        };

        match self.engine.deactivate(user_id).await {
            Ok(response) => RenderedReply::text(
                response.message.unwrap_or_else(|| translations.deactivation_done.to_owned()),
            ),
            Err(_) => RenderedReply::text(translations.engine_unavailable),
        }
    }

    async fn image(
        &self,
        command: SlashCommand,
        interaction: &Interaction,
        session: &Session,
        translations: &'static Translations,
    ) -> RenderedReply {
        let prompt = extract_prompt(interaction);
        let request = ImageRequest {
            prompt: prompt.clone(),
            user_id: session.user_id.clone(),
            session_id: session.session_id.clone(),
        };

        let result = if command == SlashCommand::ImageEdit {
            self.engine.edit_image(&request).await
        } else {
            self.engine.generate_image(&request).await
        };

        match result {
            Ok(response) => match response.image() {
                Some(url) => RenderedReply {
                    content: String::new(),
                    embeds: vec![image_card(url, Some(&escape_markdown(&prompt)))],
                },
                None => RenderedReply::text(
                    response
                        .response_message
                        .filter(|message| !message.trim().is_empty())
                        .unwrap_or_else(|| translations.image_failure.to_owned()),
                ),
            },
            Err(_) => RenderedReply::text(translations.engine_unavailable),
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::collections::{HashMap, VecDeque};
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use dabini_core::errors::EngineError;
    use dabini_core::remote_config::{RemoteConfigCache, StaticRemoteConfigSource};
    use dabini_core::timezone::GuildTimezones;
    use dabini_engine::client::EngineApi;
    use dabini_engine::types::{
        ActivationResponse, EngineRequest, EngineResponse, ImageRequest, ImageResponse,
    };
    use tokio::sync::Mutex;

    use super::{BotSettings, CommandService};

    #[derive(Default)]
    pub struct ScriptedEngine {
        pub state: Mutex<ScriptedEngineState>,
    }

    #[derive(Default)]
    pub struct ScriptedEngineState {
        pub messages: VecDeque<Result<EngineResponse, EngineError>>,
        pub images: VecDeque<Result<ImageResponse, EngineError>>,
        pub activations: VecDeque<Result<ActivationResponse, EngineError>>,
        pub requests: Vec<EngineRequest>,
        pub image_requests: Vec<(String, ImageRequest)>,
        pub activation_calls: Vec<(String, String)>,
    }

    pub fn engine_failure() -> EngineError {
        EngineError::Status {
            endpoint: "/messages".to_owned(),
            method: "POST".to_owned(),
            status: 500,
            body: "boom".to_owned(),
        }
    }

    impl ScriptedEngine {
        pub fn replying(messages: Vec<Result<EngineResponse, EngineError>>) -> Arc<Self> {
            Arc::new(Self {
                state: Mutex::new(ScriptedEngineState {
                    messages: messages.into(),
                    ..ScriptedEngineState::default()
                }),
            })
        }
    }

    #[async_trait]
    impl EngineApi for ScriptedEngine {
        async fn send_messages(
            &self,
            request: &EngineRequest,
        ) -> Result<EngineResponse, EngineError> {
            let mut state = self.state.lock().await;
            state.requests.push(request.clone());
            state.messages.pop_front().unwrap_or_else(|| Err(engine_failure()))
        }

        async fn activate(&self, discord_user_id: &str) -> Result<ActivationResponse, EngineError> {
            let mut state = self.state.lock().await;
            state.activation_calls.push(("POST".to_owned(), discord_user_id.to_owned()));
            state.activations.pop_front().unwrap_or_else(|| Ok(ActivationResponse::default()))
        }

        async fn deactivate(
            &self,
            discord_user_id: &str,
        ) -> Result<ActivationResponse, EngineError> {
            let mut state = self.state.lock().await;
            state.activation_calls.push(("DELETE".to_owned(), discord_user_id.to_owned()));
            state.activations.pop_front().unwrap_or_else(|| Ok(ActivationResponse::default()))
        }

        async fn generate_image(&self, request: &ImageRequest) -> Result<ImageResponse, EngineError> {
            let mut state = self.state.lock().await;
            state.image_requests.push(("/image".to_owned(), request.clone()));
            state.images.pop_front().unwrap_or_else(|| Err(engine_failure()))
        }

        async fn edit_image(&self, request: &ImageRequest) -> Result<ImageResponse, EngineError> {
            let mut state = self.state.lock().await;
            state.image_requests.push(("/image/edit".to_owned(), request.clone()));
            state.images.pop_front().unwrap_or_else(|| Err(engine_failure()))
        }
    }

    pub fn settings() -> BotSettings {
        BotSettings {
            default_locale: "en".to_owned(),
            terms_url: "https://dabinilab.com/terms/".to_owned(),
            privacy_url: "https://dabinilab.com/privacy/".to_owned(),
            activation_url: "https://dabinilab.com/activation".to_owned(),
        }
    }

    pub fn service(engine: Arc<ScriptedEngine>) -> CommandService {
        let remote_config = RemoteConfigCache::new(
            Arc::new(StaticRemoteConfigSource::default()),
            HashMap::new(),
            Duration::from_secs(300),
        );
        CommandService::new(
            engine,
            Arc::new(remote_config),
            Arc::new(GuildTimezones::new()),
            settings(),
        )
    }
}
