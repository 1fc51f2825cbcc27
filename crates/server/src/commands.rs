//! Slash-command endpoints.
//!
//! Slack posts url-encoded forms here. The signature covers the raw body, so
//! the form is decoded only after verification. Responses use the ephemeral
//! response shape so only the invoking user sees them.

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use tracing::{error, info, warn};

use crate::state::AppState;
use crate::webhook::request_is_verified;

#[derive(Debug, Deserialize)]
struct SlashCommandForm {
    user_id: String,
    channel_id: String,
    #[serde(default)]
    channel_name: String,
}

fn ephemeral(text: &str) -> Response {
    Json(json!({"response_type": "ephemeral", "text": text})).into_response()
}

fn parse_form(body: &str) -> Option<SlashCommandForm> {
    serde_urlencoded::from_str(body).ok()
}

/// Toggle the caller's presence in the opt-out registry.
pub async fn opt_out_toggle(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: String,
) -> Response {
    if !request_is_verified(&state, &headers, &body) {
        return (StatusCode::UNAUTHORIZED, "invalid signature").into_response();
    }

    let Some(form) = parse_form(&body) else {
        warn!("slash command form could not be decoded");
        return (StatusCode::BAD_REQUEST, "missing form fields").into_response();
    };

    let opted_out = match state.opt_outs.contains(&form.user_id).await {
        Ok(opted_out) => opted_out,
        Err(err) => {
            error!(user = %form.user_id, error = %err, "opt-out lookup failed");
            return ephemeral("Something went wrong, please try again.");
        }
    };

    let result = if opted_out {
        state.opt_outs.remove(&form.user_id).await
    } else {
        state.opt_outs.insert(&form.user_id).await
    };

    if let Err(err) = result {
        error!(user = %form.user_id, error = %err, "opt-out toggle failed");
        return ephemeral("Something went wrong, please try again.");
    }

    info!(user = %form.user_id, opted_out = !opted_out, "opt-out toggled");
    if opted_out {
        ephemeral("Welcome back! Your messages count toward the leaderboard again.")
    } else {
        ephemeral("You are opted out. Your messages no longer appear on the leaderboard.")
    }
}

/// Register the invoking channel for the priority credential.
pub async fn register_priority_channel(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: String,
) -> Response {
    if !request_is_verified(&state, &headers, &body) {
        return (StatusCode::UNAUTHORIZED, "invalid signature").into_response();
    }

    let Some(form) = parse_form(&body) else {
        warn!("slash command form could not be decoded");
        return (StatusCode::BAD_REQUEST, "missing form fields").into_response();
    };

    let channel_name =
        if form.channel_name.is_empty() { form.channel_id.clone() } else { form.channel_name };

    match state.priority_channels.insert_if_absent(&form.channel_id, &channel_name).await {
        Ok(inserted) => {
            state.credential_pool.register_priority_channel(&form.channel_id);
            if inserted {
                info!(channel = %form.channel_id, "priority channel registered");
                ephemeral("This channel now uses the priority credential for history fetches.")
            } else {
                ephemeral("This channel was already registered as a priority channel.")
            }
        }
        Err(err) => {
            error!(channel = %form.channel_id, error = %err, "priority channel insert failed");
            ephemeral("Something went wrong, please try again.")
        }
    }
}
