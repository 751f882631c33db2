use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};

use crate::commands::{CommandService, SlashCommand};
use crate::delivery::{deliver_deferred, plan_segments, DeferredTarget};
use crate::interactions::{Interaction, InteractionKind, InteractionResponse};
use crate::rest::PlatformApi;

/// Work that finishes a deferred interaction after the acknowledgement has been sent.
pub type DeferredTask = Pin<Box<dyn Future<Output = ()> + Send>>;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error("unsupported interaction type {0}")]
    UnknownInteractionType(u8),
    #[error("unknown command `{0}`")]
    UnknownCommand(String),
    #[error("application command is missing its data")]
    MissingCommandData,
}

pub struct Dispatch {
    pub ack: InteractionResponse,
    pub followup: Option<DeferredTask>,
}

impl std::fmt::Debug for Dispatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatch")
            .field("ack", &self.ack)
            .field("followup", &self.followup.is_some())
            .finish()
    }
}

/// Routes webhook interactions to an immediate acknowledgement plus optional deferred work.
///
/// Commands are always deferred: the platform expects an answer within three seconds, and the
/// engine is not bounded by that.
pub struct InteractionDispatcher {
    commands: Arc<CommandService>,
    platform: Arc<dyn PlatformApi>,
}

impl InteractionDispatcher {
    pub fn new(commands: Arc<CommandService>, platform: Arc<dyn PlatformApi>) -> Self {
        Self { commands, platform }
    }

    pub fn handle(&self, interaction: Interaction) -> Result<Dispatch, DispatchError> {
        let kind = interaction
            .kind()
            .ok_or(DispatchError::UnknownInteractionType(interaction.kind))?;

        match kind {
            InteractionKind::Ping => Ok(Dispatch { ack: InteractionResponse::pong(), followup: None }),
            InteractionKind::MessageComponent => {
                let translations = self.commands.translations_for(interaction.locale.as_deref());
                Ok(Dispatch {
                    ack: InteractionResponse::message(translations.component_ack),
                    followup: None,
                })
            }
            InteractionKind::ApplicationCommand => self.defer_command(interaction),
            InteractionKind::Autocomplete | InteractionKind::ModalSubmit => {
                Err(DispatchError::UnknownInteractionType(interaction.kind))
            }
        }
    }

    fn defer_command(&self, interaction: Interaction) -> Result<Dispatch, DispatchError> {
        let name = interaction.command_name().ok_or(DispatchError::MissingCommandData)?;
        let command =
            SlashCommand::from_name(name).ok_or_else(|| DispatchError::UnknownCommand(name.to_owned()))?;

        info!(
            event_name = "interaction.command.received",
            correlation_id = %interaction.id,
            command = command.name(),
            "deferring slash command"
        );

        let commands = Arc::clone(&self.commands);
        let platform = Arc::clone(&self.platform);
        let followup: DeferredTask = Box::pin(async move {
            let target = DeferredTarget {
                application_id: interaction.application_id.clone(),
                token: interaction.token.clone(),
            };
            let reply = commands.execute(command, &interaction).await;
            let report = deliver_deferred(platform.as_ref(), &target, &plan_segments(&reply)).await;
            if report.failed > 0 {
                warn!(
                    event_name = "interaction.command.partially_delivered",
                    correlation_id = %interaction.id,
                    command = command.name(),
                    delivered = report.delivered,
                    failed = report.failed,
                    "deferred reply was not fully delivered"
                );
            }
        });

        Ok(Dispatch { ack: InteractionResponse::deferred(command.is_ephemeral()), followup: Some(followup) })
    }
}
