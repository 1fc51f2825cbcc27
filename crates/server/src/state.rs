use std::sync::Arc;

use secrecy::SecretString;

use vibes_db::repositories::{OptOutRepository, PriorityChannelRepository};
use vibes_db::DbPool;
use vibes_ingest::ReactionPipeline;
use vibes_slack::gateway::SlackGateway;
use vibes_slack::pool::CredentialPool;

/// Everything the HTTP handlers need, shared across requests.
#[derive(Clone)]
pub struct AppState {
    pub signing_secret: SecretString,
    pub pipeline: Arc<ReactionPipeline>,
    pub gateway: Arc<dyn SlackGateway>,
    pub opt_outs: Arc<dyn OptOutRepository>,
    pub priority_channels: Arc<dyn PriorityChannelRepository>,
    pub credential_pool: Arc<CredentialPool>,
    pub db_pool: DbPool,
}
