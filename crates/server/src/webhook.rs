//! The inbound Slack events endpoint.
//!
//! Raw body first: the signature covers the exact bytes Slack sent, so the
//! body is read as a string and verified before any JSON parsing. The
//! handler acknowledges quickly; the only work detached from the response
//! path is the new-channel join-and-welcome task.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use secrecy::ExposeSecret;
use serde_json::json;
use tracing::{debug, error, warn};
use uuid::Uuid;

use vibes_core::signing;
use vibes_slack::events::{parse_payload, CallbackEvent, ChannelCreatedEvent, WebhookPayload};
use vibes_slack::gateway::SlackGateway;

use crate::state::AppState;

/// How long a fresh channel gets to settle before the bot joins it.
const CHANNEL_SETTLE_DELAY: Duration = Duration::from_secs(5);

pub async fn slack_events(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: String,
) -> Response {
    if !request_is_verified(&state, &headers, &body) {
        return (StatusCode::UNAUTHORIZED, Json(json!({"error": "invalid signature"})))
            .into_response();
    }

    match parse_payload(&body) {
        Ok(WebhookPayload::UrlVerification { challenge }) => {
            Json(json!({"challenge": challenge})).into_response()
        }
        Ok(WebhookPayload::EventCallback(event)) => {
            handle_event(&state, event).await;
            Json(json!({"ok": true})).into_response()
        }
        Ok(WebhookPayload::Unsupported { payload_type }) => {
            debug!(payload_type, "ignoring unsupported payload");
            Json(json!({"ok": true})).into_response()
        }
        Err(error) => {
            warn!(%error, "rejecting malformed webhook body");
            (StatusCode::BAD_REQUEST, Json(json!({"error": "invalid payload"}))).into_response()
        }
    }
}

pub(crate) fn request_is_verified(state: &AppState, headers: &HeaderMap, body: &str) -> bool {
    let signature = headers.get("x-slack-signature").and_then(|value| value.to_str().ok());
    let timestamp = headers
        .get("x-slack-request-timestamp")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<i64>().ok());

    match (signature, timestamp) {
        (Some(signature), Some(timestamp)) => {
            signing::verify(signature, timestamp, body, state.signing_secret.expose_secret())
        }
        _ => false,
    }
}

async fn handle_event(state: &AppState, event: CallbackEvent) {
    match event {
        CallbackEvent::Reaction(reaction) => {
            let correlation_id = Uuid::new_v4().to_string();
            if let Err(error) = state.pipeline.process(&reaction).await {
                error!(
                    correlation_id = %correlation_id,
                    message_ts = %reaction.message_ts,
                    channel = %reaction.channel_id,
                    %error,
                    "reaction pipeline run failed"
                );
            }
        }
        CallbackEvent::ChannelCreated(channel) => {
            spawn_channel_welcome(state.gateway.clone(), channel);
        }
        CallbackEvent::Unsupported { event_type } => {
            debug!(event_type, "ignoring unsupported event type");
        }
    }
}

/// Join a newly created channel and greet its creator. Detached from the
/// response path; failures are logged and nothing more.
fn spawn_channel_welcome(gateway: Arc<dyn SlackGateway>, channel: ChannelCreatedEvent) {
    tokio::spawn(async move {
        tokio::time::sleep(CHANNEL_SETTLE_DELAY).await;

        if let Err(error) = gateway.join_channel(&channel.channel_id).await {
            warn!(channel = %channel.channel_id, %error, "failed to join new channel");
            return;
        }

        let text = format!(
            "Hey <@{}>! I keep track of the vibes around here. Reactions like :upvote: and \
             :downvote: on messages get tallied up on the leaderboard, and this channel is now \
             part of the count.",
            channel.creator_id
        );
        if let Err(error) =
            gateway.post_ephemeral(&channel.channel_id, &channel.creator_id, &text).await
        {
            warn!(channel = %channel.channel_id, %error, "failed to post welcome message");
        }
    });
}
