pub mod counts;
pub mod pipeline;

pub use counts::derive_counts;
pub use pipeline::{PipelineError, ReactionPipeline};
