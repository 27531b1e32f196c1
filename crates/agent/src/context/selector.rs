//! Context selection: which turns of the history the model gets to see.
//!
//! The walk goes newest to oldest and admits turns greedily. A user turn is
//! admitted only while both the user turn count and the user character budget
//! allow it, so an oversized turn is skipped even when it is the newest one.
//! The picked turns come back oldest first.

use cosmocat_config::ContextConfig;
use cosmocat_core::turn::{Role, Turn};

/// Caps for one context window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextLimits {
    pub max_user_turns: usize,
    pub max_assistant_turns: usize,
    /// Budget over the characters (not bytes) of admitted user turns.
    pub max_user_chars: usize,
}

impl Default for ContextLimits {
    fn default() -> Self {
        Self {
            max_user_turns: 5,
            max_assistant_turns: 5,
            max_user_chars: 5000,
        }
    }
}

impl ContextLimits {
    pub fn from_config(config: &ContextConfig) -> Self {
        Self {
            max_user_turns: config.max_user_turns,
            max_assistant_turns: config.max_assistant_turns,
            max_user_chars: config.max_user_chars,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ContextSelector {
    limits: ContextLimits,
}

impl ContextSelector {
    pub fn new(limits: ContextLimits) -> Self {
        Self { limits }
    }

    pub fn limits(&self) -> ContextLimits {
        self.limits
    }

    /// Pick the context window for `history`. Never mutates the input.
    pub fn select(&self, history: &[Turn]) -> Vec<Turn> {
        let limits = self.limits;
        let mut picked: Vec<&Turn> = Vec::new();
        let mut user_count = 0;
        let mut assistant_count = 0;
        let mut user_chars = 0;

        for turn in history.iter().rev() {
            match turn.role {
                Role::User => {
                    let len = turn.char_len();
                    if user_count >= limits.max_user_turns
                        || user_chars + len > limits.max_user_chars
                    {
                        continue;
                    }
                    user_count += 1;
                    user_chars += len;
                    picked.push(turn);
                }
                Role::Assistant => {
                    if assistant_count >= limits.max_assistant_turns {
                        continue;
                    }
                    assistant_count += 1;
                    picked.push(turn);
                }
                Role::Other => continue,
            }

            if user_count >= limits.max_user_turns
                && assistant_count >= limits.max_assistant_turns
            {
                break;
            }
        }

        picked.into_iter().rev().cloned().collect()
    }
}
