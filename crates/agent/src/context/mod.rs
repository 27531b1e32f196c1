//! Context for one generation call: which turns are shown, and how they are
//! rendered into a prompt.

pub mod prompt;
pub mod selector;

pub use prompt::{PromptBuilder, PromptMode};
pub use selector::{ContextLimits, ContextSelector};
