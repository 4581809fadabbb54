//! Embedding Gateway
//!
//! Translates `(text, sector)` into vectors through an external model,
//! behind a bounded-concurrency pool with an LRU cache and retry/backoff.
//! The model itself is a black box reached through [`EmbeddingModel`].

mod gateway;
mod model;

pub use gateway::EmbeddingGateway;
pub use model::{EmbeddingModel, HashEmbedder, DEFAULT_DIMENSIONS};
