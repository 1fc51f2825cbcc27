use axum::routing::{get, post};
use axum::Router;

use crate::state::AppState;
use crate::{commands, health, webhook};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route("/slack/events", post(webhook::slack_events))
        .route("/slack/commands/opt-out", post(commands::opt_out_toggle))
        .route("/slack/commands/priority-channel", post(commands::register_priority_channel))
        .with_state(state)
}
