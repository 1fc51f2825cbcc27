pub mod api;
pub mod events;
pub mod gateway;
pub mod pool;

pub use api::{
    ChannelInfo, MessageSnapshot, ReactionTally, SlackApiError, UserProfile, WebApiClient,
};
pub use events::{
    parse_payload, CallbackEvent, ChannelCreatedEvent, PayloadError, ReactionEvent,
    WebhookPayload,
};
pub use gateway::{CyclingSlackGateway, SlackGateway};
pub use pool::{CredentialPool, RetryPolicy};
