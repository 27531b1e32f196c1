//! Fallback policy: canned answers whenever generation cannot be used.
//!
//! Every entry point of the pipeline resolves to text. When the engine is
//! unavailable, fails, runs past its deadline or produces something the
//! sanitizer throws away, the caller gets a line from a fixed set instead.
//! Each decision is logged with its class and counted in [`PipelineStats`].

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::warn;

use crate::sanitizer::{NOT_UNDERSTOOD, fit_with_marker};
use crate::stats::PipelineStats;

/// Reply fallbacks, used in rotation.
pub const REPLY_FALLBACKS: &[&str] = &[
    "у меня лапки, я не могу это сделать :( 🐾",
    "Мяу... Похоже, мои двигатели перегрелись. Попробуйте ещё раз.",
    "Мур... Связь с орбитой пропала, спроси меня чуть позже 🐾",
];

/// Title fallbacks, used in rotation.
pub const TITLE_FALLBACKS: &[&str] = &[
    "Космический чат 🐾",
    "Мурчательная беседа 😺",
    "Разговор у звёзд 🐱",
    "Кошачьи размышления 🐾",
];

/// Why a canned answer was used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FallbackReason {
    /// The engine never initialized (sticky).
    Unavailable,
    /// A single generation call failed.
    Failure,
    /// The caller's deadline passed first.
    Timeout,
    /// The sanitizer's quality gate discarded the output.
    LowQuality,
}

impl FallbackReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unavailable => "unavailable",
            Self::Failure => "failure",
            Self::Timeout => "timeout",
            Self::LowQuality => "low_quality",
        }
    }
}

impl std::fmt::Display for FallbackReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Text plus how it was produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineOutcome {
    pub text: String,
    /// `None` when the text came from the model.
    pub fallback: Option<FallbackReason>,
}

impl PipelineOutcome {
    pub fn generated(text: String) -> Self {
        Self {
            text,
            fallback: None,
        }
    }

    pub fn is_fallback(&self) -> bool {
        self.fallback.is_some()
    }
}

pub struct FallbackPolicy {
    reply_max_chars: usize,
    title_max_chars: usize,
    next_reply: AtomicUsize,
    next_title: AtomicUsize,
    stats: Arc<PipelineStats>,
}

impl FallbackPolicy {
    pub fn new(reply_max_chars: usize, title_max_chars: usize, stats: Arc<PipelineStats>) -> Self {
        Self {
            reply_max_chars,
            title_max_chars,
            next_reply: AtomicUsize::new(0),
            next_title: AtomicUsize::new(0),
            stats,
        }
    }

    /// A canned reply for `reason`.
    pub fn reply(&self, reason: FallbackReason) -> PipelineOutcome {
        self.stats.record_fallback(reason);
        let text = match reason {
            FallbackReason::LowQuality => NOT_UNDERSTOOD,
            _ => rotate(REPLY_FALLBACKS, &self.next_reply),
        };
        warn!(class = reason.as_str(), "Reply fallback used");
        PipelineOutcome {
            text: fit_with_marker(text, self.reply_max_chars, " Мяу!"),
            fallback: Some(reason),
        }
    }

    /// A canned title for `reason`.
    pub fn title(&self, reason: FallbackReason) -> PipelineOutcome {
        self.stats.record_fallback(reason);
        warn!(class = reason.as_str(), "Title fallback used");
        self.rotating_title(Some(reason))
    }

    /// A canned title for an empty first message. Not a failure, not counted.
    pub fn blank_title(&self) -> PipelineOutcome {
        self.rotating_title(None)
    }

    fn rotating_title(&self, reason: Option<FallbackReason>) -> PipelineOutcome {
        let text = rotate(TITLE_FALLBACKS, &self.next_title);
        PipelineOutcome {
            text: fit_with_marker(text, self.title_max_chars, " 🐾"),
            fallback: reason,
        }
    }
}

fn rotate(set: &'static [&'static str], cursor: &AtomicUsize) -> &'static str {
    let i = cursor.fetch_add(1, Ordering::Relaxed);
    set[i % set.len()]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sanitizer::has_persona_marker;

    fn policy() -> FallbackPolicy {
        FallbackPolicy::new(120, 50, Arc::new(PipelineStats::new()))
    }

    #[test]
    fn reply_fallbacks_rotate_through_the_set() {
        let policy = policy();
        let seen: Vec<String> = (0..REPLY_FALLBACKS.len() + 1)
            .map(|_| policy.reply(FallbackReason::Unavailable).text)
            .collect();
        assert_eq!(seen[0], REPLY_FALLBACKS[0]);
        assert_eq!(seen[1], REPLY_FALLBACKS[1]);
        assert_eq!(seen[REPLY_FALLBACKS.len()], REPLY_FALLBACKS[0]);
    }

    #[test]
    fn low_quality_says_not_understood() {
        let outcome = policy().reply(FallbackReason::LowQuality);
        assert_eq!(outcome.text, NOT_UNDERSTOOD);
        assert_eq!(outcome.fallback, Some(FallbackReason::LowQuality));
    }

    #[test]
    fn canned_texts_fit_caps_and_carry_markers() {
        for text in REPLY_FALLBACKS.iter().chain([&NOT_UNDERSTOOD]) {
            assert!(text.chars().count() <= 120);
            assert!(has_persona_marker(text), "{text}");
        }
        for text in TITLE_FALLBACKS {
            assert!(text.chars().count() <= 50);
            assert!(has_persona_marker(text), "{text}");
        }
    }

    #[test]
    fn tight_caps_still_keep_a_marker() {
        let policy = FallbackPolicy::new(20, 10, Arc::new(PipelineStats::new()));
        for _ in 0..REPLY_FALLBACKS.len() {
            let text = policy.reply(FallbackReason::Failure).text;
            assert!(text.chars().count() <= 20, "{text}");
            assert!(has_persona_marker(&text), "{text}");
        }
        let title = policy.title(FallbackReason::Timeout).text;
        assert!(title.chars().count() <= 10);
        assert!(has_persona_marker(&title));
    }

    #[test]
    fn fallbacks_are_counted_but_blank_titles_are_not() {
        let stats = Arc::new(PipelineStats::new());
        let policy = FallbackPolicy::new(120, 50, Arc::clone(&stats));
        policy.reply(FallbackReason::Unavailable);
        policy.title(FallbackReason::Failure);
        let blank = policy.blank_title();
        assert!(!blank.is_fallback());
        assert!(TITLE_FALLBACKS.contains(&blank.text.as_str()));

        let snap = stats.snapshot();
        assert_eq!(snap.fallback_unavailable, 1);
        assert_eq!(snap.fallback_failure, 1);
        assert_eq!(snap.fallbacks(), 2);
    }
}
