pub mod counts;
pub mod event;
pub mod message;
pub mod stats;

pub use counts::{CategoryTallies, ReactionCounts};
pub use event::{NewReactionEvent, ReactionEventKind, ReactionEventRecord};
pub use message::{
    MessageContext, PlaceholderMessage, TrackedMessage, PLACEHOLDER_CONTENT, UNKNOWN_AUTHOR_ID,
    UNKNOWN_AUTHOR_NAME, UNKNOWN_CHANNEL_NAME,
};
pub use stats::{GivenTarget, UserStats};
