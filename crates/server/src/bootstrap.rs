use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::info;

use vibes_core::config::{AppConfig, ConfigError, LoadOptions};
use vibes_db::repositories::{
    PriorityChannelRepository, RepositoryError, SqlMessageRepository, SqlOptOutRepository,
    SqlPriorityChannelRepository, SqlReactionEventRepository, SqlUserStatsRepository,
};
use vibes_db::{connect_with_settings, migrations};
use vibes_ingest::ReactionPipeline;
use vibes_slack::api::WebApiClient;
use vibes_slack::gateway::CyclingSlackGateway;
use vibes_slack::pool::{CredentialPool, RetryPolicy};

use crate::state::AppState;

pub struct Application {
    pub config: AppConfig,
    pub state: AppState,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("priority channel warm load failed: {0}")]
    PriorityChannels(#[source] RepositoryError),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(event_name = "system.bootstrap.start", "starting application bootstrap");

    let db_pool = connect_with_settings(
        &config.database.url,
        config.database.max_connections,
        config.database.timeout_secs,
    )
    .await
    .map_err(BootstrapError::DatabaseConnect)?;
    info!(event_name = "system.bootstrap.database_connected", "database connection established");

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(event_name = "system.bootstrap.migrations_applied", "database migrations applied");

    let credential_pool = Arc::new(build_credential_pool(&config));

    let priority_channels: Arc<dyn PriorityChannelRepository> =
        Arc::new(SqlPriorityChannelRepository::new(db_pool.clone()));
    for channel in &config.slack.priority_channels {
        credential_pool.register_priority_channel(channel);
    }
    for channel in
        priority_channels.list_ids().await.map_err(BootstrapError::PriorityChannels)?
    {
        credential_pool.register_priority_channel(&channel);
    }
    info!(
        event_name = "system.bootstrap.credential_pool_ready",
        priority_channels = credential_pool.priority_channel_count(),
        "credential pool initialized"
    );

    let bot = WebApiClient::new("bot", config.slack.bot_token.clone());
    let gateway = Arc::new(CyclingSlackGateway::new(credential_pool.clone(), bot));

    let messages = Arc::new(SqlMessageRepository::new(db_pool.clone()));
    let user_stats = Arc::new(SqlUserStatsRepository::new(db_pool.clone()));
    let events = Arc::new(SqlReactionEventRepository::new(db_pool.clone()));
    let opt_outs = Arc::new(SqlOptOutRepository::new(db_pool.clone()));

    let pipeline = Arc::new(ReactionPipeline::new(
        messages,
        user_stats,
        events,
        opt_outs.clone(),
        gateway.clone(),
    ));

    let state = AppState {
        signing_secret: config.slack.signing_secret.clone(),
        pipeline,
        gateway,
        opt_outs,
        priority_channels,
        credential_pool,
        db_pool,
    };

    Ok(Application { config, state })
}

/// One labeled client per pooled history token, plus the optional priority
/// credential. With no history tokens configured the bot token serves as the
/// single pooled credential.
fn build_credential_pool(config: &AppConfig) -> CredentialPool {
    let mut history_clients: Vec<WebApiClient> = config
        .slack
        .history_tokens
        .iter()
        .enumerate()
        .map(|(index, token)| WebApiClient::new(format!("history-{}", index + 1), token.clone()))
        .collect();

    if history_clients.is_empty() {
        history_clients.push(WebApiClient::new("bot", config.slack.bot_token.clone()));
    }

    let priority = config
        .slack
        .priority_token
        .as_ref()
        .map(|token| WebApiClient::new("priority", token.clone()));

    let policy = RetryPolicy {
        max_rounds: config.client.max_rounds,
        round_cooldown: Duration::from_secs(config.client.round_cooldown_secs),
        default_retry_after: Duration::from_millis(config.client.default_retry_after_ms),
    };

    CredentialPool::new(history_clients, priority, policy)
}
