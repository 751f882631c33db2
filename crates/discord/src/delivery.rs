//! Turning a [`RenderedReply`] into platform messages and sending them in order.

use dabini_core::chunking::{chunk_message, DEFAULT_MAX_LEN};
use serde::Serialize;
use tracing::{error, warn};

use crate::embeds::{Embed, RenderedReply};
use crate::rest::PlatformApi;

pub const MAX_EMBEDS_PER_MESSAGE: usize = 10;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct MessagePayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub embeds: Vec<Embed>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flags: Option<u64>,
}

impl MessagePayload {
    pub fn content(content: impl Into<String>) -> Self {
        Self { content: Some(content.into()), ..Self::default() }
    }

    pub fn embeds(embeds: Vec<Embed>) -> Self {
        Self { embeds, ..Self::default() }
    }
}

/// Identifies a deferred interaction whose placeholder can still be edited.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeferredTarget {
    pub application_id: String,
    pub token: String,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    pub delivered: usize,
    pub failed: usize,
}

/// Splits the reply text into platform-sized segments and attaches embeds after the last one.
///
/// Embeds beyond the per-message limit spill into extra embed-only messages.
pub fn plan_segments(reply: &RenderedReply) -> Vec<MessagePayload> {
    let mut segments: Vec<MessagePayload> =
        chunk_message(&reply.content, DEFAULT_MAX_LEN).into_iter().map(MessagePayload::content).collect();

    let mut batches = reply.embeds.chunks(MAX_EMBEDS_PER_MESSAGE);
    if let Some(first) = batches.next() {
        match segments.last_mut() {
            Some(last) => last.embeds = first.to_vec(),
            None => segments.push(MessagePayload::embeds(first.to_vec())),
        }
    }
    segments.extend(batches.map(|batch| MessagePayload::embeds(batch.to_vec())));

    segments
}

/// Text segments as separate messages, followed by one message per embed.
pub fn plan_channel_segments(reply: &RenderedReply) -> Vec<MessagePayload> {
    chunk_message(&reply.content, DEFAULT_MAX_LEN)
        .into_iter()
        .map(MessagePayload::content)
        .chain(reply.embeds.iter().map(|embed| MessagePayload::embeds(vec![embed.clone()])))
        .collect()
}

/// Replaces the deferred placeholder with the first segment and posts the rest as follow-ups.
///
/// A failed segment is logged and skipped; later segments are still attempted.
pub async fn deliver_deferred(
    platform: &dyn PlatformApi,
    target: &DeferredTarget,
    segments: &[MessagePayload],
) -> DeliveryReport {
    let mut report = DeliveryReport::default();
    for (index, segment) in segments.iter().enumerate() {
        let result = if index == 0 {
            platform.edit_original(target, segment).await
        } else {
            platform.create_followup(target, segment).await
        };

        match result {
            Ok(()) => report.delivered += 1,
            Err(failure) => {
                report.failed += 1;
                error!(
                    event_name = "integration.discord.deferred_delivery_failed",
                    segment = index,
                    error = %failure,
                    "failed to deliver deferred reply segment"
                );
            }
        }
    }
    report
}

pub async fn send_to_channel(
    platform: &dyn PlatformApi,
    channel_id: &str,
    segments: &[MessagePayload],
) -> DeliveryReport {
    let mut report = DeliveryReport::default();
    for (index, segment) in segments.iter().enumerate() {
        match platform.send_channel_message(channel_id, segment).await {
            Ok(()) => report.delivered += 1,
            Err(failure) => {
                report.failed += 1;
                warn!(
                    event_name = "integration.discord.channel_send_failed",
                    channel_id,
                    segment = index,
                    error = %failure,
                    "failed to send channel message"
                );
            }
        }
    }
    report
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::collections::HashSet;

    use async_trait::async_trait;
    use tokio::sync::Mutex;

    use super::{DeferredTarget, MessagePayload};
    use crate::commands::CommandDefinition;
    use crate::rest::{PlatformApi, PlatformError};

    #[derive(Clone, Debug, PartialEq, Eq)]
    pub enum PlatformCall {
        Edit(MessagePayload),
        Followup(MessagePayload),
        Channel(String, MessagePayload),
        Typing(String),
        Register(String, usize),
    }

    /// Records calls; call indexes listed in `failing` return an error.
    #[derive(Default)]
    pub struct RecordingPlatform {
        pub calls: Mutex<Vec<PlatformCall>>,
        pub failing: HashSet<usize>,
    }

    impl RecordingPlatform {
        pub fn failing_at(indexes: &[usize]) -> Self {
            Self { calls: Mutex::default(), failing: indexes.iter().copied().collect() }
        }

        async fn record(&self, call: PlatformCall) -> Result<(), PlatformError> {
            let mut calls = self.calls.lock().await;
            let index = calls.len();
            calls.push(call);
            if self.failing.contains(&index) {
                Err(PlatformError::Status { route: "test".to_owned(), status: 500, body: String::new() })
            } else {
                Ok(())
            }
        }

        pub async fn recorded(&self) -> Vec<PlatformCall> {
            self.calls.lock().await.clone()
        }
    }

    #[async_trait]
    impl PlatformApi for RecordingPlatform {
        async fn edit_original(
            &self,
            _target: &DeferredTarget,
            payload: &MessagePayload,
        ) -> Result<(), PlatformError> {
            self.record(PlatformCall::Edit(payload.clone())).await
        }

        async fn create_followup(
            &self,
            _target: &DeferredTarget,
            payload: &MessagePayload,
        ) -> Result<(), PlatformError> {
            self.record(PlatformCall::Followup(payload.clone())).await
        }

        async fn send_channel_message(
            &self,
            channel_id: &str,
            payload: &MessagePayload,
        ) -> Result<(), PlatformError> {
            self.record(PlatformCall::Channel(channel_id.to_owned(), payload.clone())).await
        }

        async fn trigger_typing(&self, channel_id: &str) -> Result<(), PlatformError> {
            self.record(PlatformCall::Typing(channel_id.to_owned())).await
        }

        async fn current_application_id(&self) -> Result<String, PlatformError> {
            Ok("app-1".to_owned())
        }

        async fn register_commands(
            &self,
            application_id: &str,
            commands: &[CommandDefinition],
        ) -> Result<(), PlatformError> {
            self.record(PlatformCall::Register(application_id.to_owned(), commands.len())).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::{PlatformCall, RecordingPlatform};
    use super::{deliver_deferred, plan_segments, DeferredTarget, MessagePayload};
    use crate::embeds::{Embed, RenderedReply};

    fn target() -> DeferredTarget {
        DeferredTarget { application_id: "app".to_owned(), token: "tok".to_owned() }
    }

    fn long_reply() -> RenderedReply {
        let line = "x".repeat(999);
        RenderedReply::text(vec![line.as_str(); 5].join("\n"))
    }

    #[test]
    fn long_text_splits_and_embeds_ride_on_last_segment() {
        let mut reply = long_reply();
        reply.embeds = vec![Embed::new().title("card")];

        let segments = plan_segments(&reply);

        assert_eq!(segments.len(), 3);
        assert!(segments[..2].iter().all(|segment| segment.embeds.is_empty()));
        assert_eq!(segments[2].embeds.len(), 1);
    }

    #[test]
    fn embeds_without_text_get_their_own_message() {
        let reply = RenderedReply { content: String::new(), embeds: vec![Embed::new(); 12] };
        let segments = plan_segments(&reply);

        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].content, None);
        assert_eq!(segments[0].embeds.len(), 10);
        assert_eq!(segments[1].embeds.len(), 2);
    }

    #[tokio::test]
    async fn first_segment_edits_and_rest_follow_up_in_order() {
        let platform = RecordingPlatform::default();
        let segments = plan_segments(&long_reply());

        let report = deliver_deferred(&platform, &target(), &segments).await;

        assert_eq!(report.delivered, 3);
        let calls = platform.recorded().await;
        assert!(matches!(calls[0], PlatformCall::Edit(_)));
        assert!(matches!(calls[1], PlatformCall::Followup(_)));
        assert!(matches!(calls[2], PlatformCall::Followup(_)));
    }

    #[tokio::test]
    async fn failed_follow_up_does_not_stop_later_segments() {
        let platform = RecordingPlatform::failing_at(&[1]);
        let segments = vec![
            MessagePayload::content("one"),
            MessagePayload::content("two"),
            MessagePayload::content("three"),
        ];

        let report = deliver_deferred(&platform, &target(), &segments).await;

        assert_eq!((report.delivered, report.failed), (2, 1));
        assert_eq!(
            platform.recorded().await.last(),
            Some(&PlatformCall::Followup(MessagePayload::content("three")))
        );
    }
}
