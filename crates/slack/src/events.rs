//! Inbound webhook payload model.
//!
//! The events endpoint receives a JSON body that is either a
//! `url_verification` handshake or an `event_callback` envelope. Only the
//! event kinds the pipeline cares about get their own variants; everything
//! else is preserved as `Unsupported` so callers can acknowledge and move on.

use serde::Deserialize;
use thiserror::Error;

use vibes_core::domain::ReactionEventKind;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WebhookPayload {
    UrlVerification { challenge: String },
    EventCallback(CallbackEvent),
    Unsupported { payload_type: String },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CallbackEvent {
    Reaction(ReactionEvent),
    ChannelCreated(ChannelCreatedEvent),
    Unsupported { event_type: String },
}

/// One reaction add/remove delivery, as handed to the ingestion pipeline.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReactionEvent {
    pub kind: ReactionEventKind,
    pub reaction: String,
    pub user_id: String,
    pub channel_id: String,
    pub message_ts: String,
    /// Thread hint: present and different from `message_ts` means the target
    /// is a thread reply.
    pub thread_ts: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChannelCreatedEvent {
    pub channel_id: String,
    pub channel_name: String,
    pub creator_id: String,
}

#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("payload is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("payload field missing: {field}")]
    MissingField { field: &'static str },
}

#[derive(Debug, Deserialize)]
struct RawPayload {
    #[serde(rename = "type")]
    payload_type: String,
    challenge: Option<String>,
    event: Option<RawEvent>,
}

#[derive(Debug, Deserialize)]
struct RawEvent {
    #[serde(rename = "type")]
    event_type: String,
    reaction: Option<String>,
    user: Option<String>,
    item: Option<RawItem>,
    channel: Option<RawChannel>,
}

#[derive(Debug, Deserialize)]
struct RawItem {
    channel: Option<String>,
    ts: Option<String>,
    thread_ts: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawChannel {
    id: String,
    name: Option<String>,
    creator: Option<String>,
}

pub fn parse_payload(body: &str) -> Result<WebhookPayload, PayloadError> {
    let raw: RawPayload = serde_json::from_str(body)?;

    match raw.payload_type.as_str() {
        "url_verification" => {
            let challenge =
                raw.challenge.ok_or(PayloadError::MissingField { field: "challenge" })?;
            Ok(WebhookPayload::UrlVerification { challenge })
        }
        "event_callback" => {
            let event = raw.event.ok_or(PayloadError::MissingField { field: "event" })?;
            Ok(WebhookPayload::EventCallback(convert_event(event)?))
        }
        other => Ok(WebhookPayload::Unsupported { payload_type: other.to_string() }),
    }
}

fn convert_event(event: RawEvent) -> Result<CallbackEvent, PayloadError> {
    let kind = match event.event_type.as_str() {
        "reaction_added" => Some(ReactionEventKind::Added),
        "reaction_removed" => Some(ReactionEventKind::Removed),
        _ => None,
    };

    if let Some(kind) = kind {
        let reaction = event.reaction.ok_or(PayloadError::MissingField { field: "reaction" })?;
        let user_id = event.user.ok_or(PayloadError::MissingField { field: "user" })?;
        let item = event.item.ok_or(PayloadError::MissingField { field: "item" })?;
        let channel_id =
            item.channel.ok_or(PayloadError::MissingField { field: "item.channel" })?;
        let message_ts = item.ts.ok_or(PayloadError::MissingField { field: "item.ts" })?;

        return Ok(CallbackEvent::Reaction(ReactionEvent {
            kind,
            reaction,
            user_id,
            channel_id,
            message_ts,
            thread_ts: item.thread_ts,
        }));
    }

    if event.event_type == "channel_created" {
        let channel = event.channel.ok_or(PayloadError::MissingField { field: "channel" })?;
        let creator_id =
            channel.creator.ok_or(PayloadError::MissingField { field: "channel.creator" })?;
        return Ok(CallbackEvent::ChannelCreated(ChannelCreatedEvent {
            channel_id: channel.id,
            channel_name: channel.name.unwrap_or_default(),
            creator_id,
        }));
    }

    Ok(CallbackEvent::Unsupported { event_type: event.event_type })
}
