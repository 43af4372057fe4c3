//! Content synthesis: the generation capability behind a cached, retried,
//! failure-isolated interface.

pub mod adapter;
pub mod cache;
pub mod generator;
pub mod http;

pub use adapter::{GenerationFailure, SynthesisOutcome, SynthesizerAdapter};
pub use cache::BlockCache;
pub use generator::{
    ContentGenerator, EntitySummary, GenerationRequest, OutlineGenerator, RelationSummary,
    SharedGenerator, create_generator,
};
pub use http::HttpGenerator;
