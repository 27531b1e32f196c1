//! # CosmoCat Core
//!
//! Domain types, traits, and error definitions for the CosmoCat conversation
//! pipeline. This crate has **no runtime or model dependencies**; it defines
//! the domain model that all other crates implement against.
//!
//! ## Design Philosophy
//!
//! The two collaborators of the pipeline are traits here:
//! - [`Generator`]: the text generation backend (Candle engine, mocks)
//! - [`ChatStore`]: persistence of chat histories
//!
//! Implementations live in their respective crates, which keeps the pipeline
//! testable with scripted stand-ins and the dependency graph pointing inward.

pub mod engine;
pub mod error;
pub mod store;
pub mod turn;

// Re-export key types at crate root for ergonomics
pub use engine::{Availability, GenerationConfig, Generator, Prompt, RawCompletion};
pub use error::{EngineError, Error, Result, StoreError};
pub use store::{ChatStore, ChatSummary, RetentionPolicy};
pub use turn::{ConversationId, Role, Turn, decode_history, encode_history};
