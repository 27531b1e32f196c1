//! Reply sanitizer: raw model text in, presentable reply out.
//!
//! Cleaning is an ordered list of named [`Stage`]s, each a pure string
//! transformation. One stage, [`Stage::QualityGate`], may reject the text;
//! the sanitizer then substitutes a fixed "didn't understand" line and keeps
//! running the remaining stages, so the marker and length guarantees hold for
//! the substitute as well.
//!
//! Guarantees of [`Sanitizer::clean`]: the output is non-empty, at most
//! `max_chars` characters, carries a persona marker and contains no role label.

use cosmocat_config::SanitizerConfig;
use tracing::debug;

use crate::context::prompt::{ASSISTANT_LABEL, ROLE_MARKERS, TITLE_LABEL};

/// Any one of these (case-insensitive) marks text as in character.
pub const PERSONA_MARKERS: &[&str] = &["мяу", "мур", "🐾", "🐱", "😺"];

/// Substitute for replies that fail the quality gate.
pub const NOT_UNDERSTOOD: &str = "Мяу? Кажется, я не понял, скажи по-другому, пожалуйста.";

/// Substitute for titles that fail the quality gate.
pub const TITLE_NOT_UNDERSTOOD: &str = "Кошачий чат 🐾";

const SENTENCE_TERMINATORS: &[char] = &['.', '!', '?', '…'];

// ── Types ─────────────────────────────────────────────────────────────────

/// Why the quality gate discarded a completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QualityIssue {
    Empty,
    OnlyPunctuation,
    TooShort,
    NoWordBoundary,
}

impl QualityIssue {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Empty => "empty",
            Self::OnlyPunctuation => "only_punctuation",
            Self::TooShort => "too_short",
            Self::NoWordBoundary => "no_word_boundary",
        }
    }
}

impl std::fmt::Display for QualityIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of cleaning. `rejected` is set when the text is a substitute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SanitizedReply {
    pub text: String,
    pub rejected: Option<QualityIssue>,
}

impl SanitizedReply {
    pub fn is_rejected(&self) -> bool {
        self.rejected.is_some()
    }
}

/// Thresholds for one sanitizer flavor.
#[derive(Debug, Clone, PartialEq)]
pub struct SanitizerRules {
    pub max_chars: usize,
    pub min_chars: usize,
    pub max_word_chars: usize,
    /// Share of non-alphanumeric chars above which a word (3+ chars) is noise.
    pub max_punctuation_ratio: f32,
    pub max_sentences: usize,
    pub require_word_boundary: bool,
    /// Labels stripped from the very start (the model echoing its own cue).
    pub leading_labels: &'static [&'static str],
    pub marker_suffix: &'static str,
    pub substitute: &'static str,
}

impl SanitizerRules {
    pub fn reply(config: &SanitizerConfig) -> Self {
        Self {
            max_chars: config.reply_max_chars,
            min_chars: config.min_reply_chars,
            max_word_chars: config.max_word_chars,
            max_punctuation_ratio: config.max_punctuation_ratio,
            max_sentences: config.max_sentences,
            require_word_boundary: true,
            leading_labels: &[ASSISTANT_LABEL, "Assistant:"],
            marker_suffix: " Мяу!",
            substitute: NOT_UNDERSTOOD,
        }
    }

    pub fn title(config: &SanitizerConfig) -> Self {
        Self {
            max_chars: config.title_max_chars,
            min_chars: 2,
            max_word_chars: config.max_word_chars,
            max_punctuation_ratio: config.max_punctuation_ratio,
            max_sentences: 1,
            require_word_boundary: false,
            leading_labels: &[TITLE_LABEL, "Title:"],
            marker_suffix: " 🐾",
            substitute: TITLE_NOT_UNDERSTOOD,
        }
    }
}

// ── Stages ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Keep the first non-blank line.
    FirstLine,
    CollapseWhitespace,
    /// Strip an echoed leading label, then cut at the first role label.
    CutAtRoleMarker,
    /// Drop overlong words and punctuation soup.
    DropNoiseWords,
    LimitSentences,
    /// Strip quotes and trailing periods around a title.
    TrimDecorations,
    QualityGate,
    EnsurePersonaMarker,
    HardCap,
}

const REPLY_STAGES: &[Stage] = &[
    Stage::CollapseWhitespace,
    Stage::CutAtRoleMarker,
    Stage::DropNoiseWords,
    Stage::LimitSentences,
    Stage::QualityGate,
    Stage::EnsurePersonaMarker,
    Stage::HardCap,
];

const TITLE_STAGES: &[Stage] = &[
    Stage::FirstLine,
    Stage::CollapseWhitespace,
    Stage::CutAtRoleMarker,
    Stage::DropNoiseWords,
    Stage::LimitSentences,
    Stage::TrimDecorations,
    Stage::QualityGate,
    Stage::EnsurePersonaMarker,
    Stage::HardCap,
];

impl Stage {
    pub fn name(self) -> &'static str {
        match self {
            Self::FirstLine => "first_line",
            Self::CollapseWhitespace => "collapse_whitespace",
            Self::CutAtRoleMarker => "cut_at_role_marker",
            Self::DropNoiseWords => "drop_noise_words",
            Self::LimitSentences => "limit_sentences",
            Self::TrimDecorations => "trim_decorations",
            Self::QualityGate => "quality_gate",
            Self::EnsurePersonaMarker => "ensure_persona_marker",
            Self::HardCap => "hard_cap",
        }
    }

    pub fn apply(self, text: String, rules: &SanitizerRules) -> Result<String, QualityIssue> {
        Ok(match self {
            Self::FirstLine => first_line(&text).to_string(),
            Self::CollapseWhitespace => collapse_whitespace(&text),
            Self::CutAtRoleMarker => cut_at_role_marker(&text, rules.leading_labels).to_string(),
            Self::DropNoiseWords => drop_noise_words(&text, rules),
            Self::LimitSentences => limit_sentences(&text, rules.max_sentences).to_string(),
            Self::TrimDecorations => trim_decorations(&text).to_string(),
            Self::QualityGate => return quality_gate(text, rules),
            Self::EnsurePersonaMarker => {
                ensure_persona_marker(text, rules.max_chars, rules.marker_suffix)
            }
            Self::HardCap => truncate_chars(&text, rules.max_chars).trim_end().to_string(),
        })
    }
}

// ── Sanitizer ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct Sanitizer {
    rules: SanitizerRules,
    stages: &'static [Stage],
}

impl Sanitizer {
    pub fn reply(config: &SanitizerConfig) -> Self {
        Self {
            rules: SanitizerRules::reply(config),
            stages: REPLY_STAGES,
        }
    }

    pub fn title(config: &SanitizerConfig) -> Self {
        Self {
            rules: SanitizerRules::title(config),
            stages: TITLE_STAGES,
        }
    }

    pub fn rules(&self) -> &SanitizerRules {
        &self.rules
    }

    pub fn stages(&self) -> &[Stage] {
        self.stages
    }

    pub fn clean(&self, raw: &str) -> SanitizedReply {
        let mut text = raw.to_string();
        let mut rejected = None;
        for &stage in self.stages {
            text = match stage.apply(text, &self.rules) {
                Ok(next) => next,
                Err(issue) => {
                    debug!(stage = stage.name(), %issue, "Completion rejected by quality gate");
                    rejected = Some(issue);
                    self.rules.substitute.to_string()
                }
            };
        }
        SanitizedReply { text, rejected }
    }
}

/// Cap `text` at `max_chars` while keeping a persona marker in it.
pub fn fit_with_marker(text: &str, max_chars: usize, marker_suffix: &str) -> String {
    let marked = ensure_persona_marker(text.to_string(), max_chars, marker_suffix);
    truncate_chars(&marked, max_chars).trim_end().to_string()
}

pub fn has_persona_marker(text: &str) -> bool {
    let lower = text.to_lowercase();
    PERSONA_MARKERS.iter().any(|m| lower.contains(m))
}

// ── Stage functions ───────────────────────────────────────────────────────

fn first_line(text: &str) -> &str {
    text.lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or("")
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn cut_at_role_marker<'a>(text: &'a str, leading_labels: &[&str]) -> &'a str {
    let mut rest = text.trim_start();
    while let Some(len) = leading_labels
        .iter()
        .find_map(|label| prefix_len_ignore_case(rest, label))
    {
        rest = rest[len..].trim_start();
    }
    let cut = ROLE_MARKERS
        .iter()
        .filter_map(|marker| find_ignore_case(rest, marker))
        .min()
        .unwrap_or(rest.len());
    rest[..cut].trim()
}

/// Byte length of the part of `text` matching `prefix` without regard to case.
///
/// Compares character by character so offsets stay on `text`'s own
/// boundaries even where lowercasing changes a character's width.
fn prefix_len_ignore_case(text: &str, prefix: &str) -> Option<usize> {
    let mut chars = text.chars();
    let mut len = 0;
    for expected in prefix.chars() {
        let actual = chars.next()?;
        if !actual.to_lowercase().eq(expected.to_lowercase()) {
            return None;
        }
        len += actual.len_utf8();
    }
    Some(len)
}

fn find_ignore_case(text: &str, needle: &str) -> Option<usize> {
    text.char_indices()
        .map(|(i, _)| i)
        .find(|&i| prefix_len_ignore_case(&text[i..], needle).is_some())
}

fn is_noise_word(word: &str, rules: &SanitizerRules) -> bool {
    let len = word.chars().count();
    if len > rules.max_word_chars {
        return true;
    }
    if len < 3 {
        return false;
    }
    let symbols = word.chars().filter(|c| !c.is_alphanumeric()).count();
    symbols as f32 / len as f32 > rules.max_punctuation_ratio
}

fn drop_noise_words(text: &str, rules: &SanitizerRules) -> String {
    text.split(' ')
        .filter(|word| !word.is_empty() && !is_noise_word(word, rules))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Keep at most `max` sentences; a sentence ends at a run of terminators.
fn limit_sentences(text: &str, max: usize) -> &str {
    let mut seen = 0;
    let mut in_run = false;
    for (i, c) in text.char_indices() {
        let terminator = SENTENCE_TERMINATORS.contains(&c);
        if in_run && !terminator {
            seen += 1;
            if seen >= max {
                return text[..i].trim_end();
            }
        }
        in_run = terminator;
    }
    text
}

fn trim_decorations(text: &str) -> &str {
    let decoration =
        |c: char| matches!(c, '"' | '\'' | '«' | '»' | '`' | '*') || c.is_whitespace();
    text.trim_start_matches(decoration)
        .trim_end_matches(|c: char| decoration(c) || c == '.')
}

fn quality_gate(text: String, rules: &SanitizerRules) -> Result<String, QualityIssue> {
    let text = text.trim();
    let len = text.chars().count();
    if len == 0 {
        return Err(QualityIssue::Empty);
    }
    if !text.chars().any(char::is_alphanumeric) {
        return Err(QualityIssue::OnlyPunctuation);
    }
    if len < rules.min_chars {
        return Err(QualityIssue::TooShort);
    }
    if rules.require_word_boundary && !text.contains(' ') {
        return Err(QualityIssue::NoWordBoundary);
    }
    Ok(text.to_string())
}

/// Make sure a marker survives a cap of `max_chars`, appending `suffix` if not.
fn ensure_persona_marker(text: String, max_chars: usize, suffix: &str) -> String {
    if has_persona_marker(truncate_chars(&text, max_chars)) {
        return text;
    }
    let room = max_chars.saturating_sub(suffix.chars().count());
    let mut kept = truncate_chars(&text, room);
    if kept.len() < text.len() {
        // Back off to a word boundary when one is available.
        if let Some((head, _)) = kept.rsplit_once(' ') {
            kept = head;
        }
    }
    format!("{}{}", kept.trim_end(), suffix)
        .trim_start()
        .to_string()
}

fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reply() -> Sanitizer {
        Sanitizer::reply(&SanitizerConfig::default())
    }

    fn title() -> Sanitizer {
        Sanitizer::title(&SanitizerConfig::default())
    }

    fn rules() -> SanitizerRules {
        SanitizerRules::reply(&SanitizerConfig::default())
    }

    // ── Individual stages ──────────────────────────────────────────────

    #[test]
    fn collapse_whitespace_stage() {
        assert_eq!(
            Stage::CollapseWhitespace
                .apply("  Мяу!\n\n  Привет \t друг ".into(), &rules())
                .unwrap(),
            "Мяу! Привет друг"
        );
    }

    #[test]
    fn role_marker_cut_stage() {
        let cut = Stage::CutAtRoleMarker
            .apply("Помощник: Мяу! Я кот. Пользователь: а ты кто?".into(), &rules())
            .unwrap();
        assert_eq!(cut, "Мяу! Я кот.");
    }

    #[test]
    fn english_role_markers_are_cut_too() {
        assert_eq!(cut_at_role_marker("Мур, привет User: hi", &[]), "Мур, привет");
    }

    #[test]
    fn role_markers_match_regardless_of_case() {
        assert_eq!(
            cut_at_role_marker("Мяу! Я кот. пользователь: а ты кто?", &[]),
            "Мяу! Я кот."
        );
        assert_eq!(cut_at_role_marker("Мур ASSISTANT: мяу", &[]), "Мур");
        assert_eq!(
            cut_at_role_marker("помощник: Мяу-мяу!", &[ASSISTANT_LABEL]),
            "Мяу-мяу!"
        );
    }

    #[test]
    fn case_insensitive_match_keeps_char_boundaries() {
        assert_eq!(find_ignore_case("İx user: y", "User:"), Some(4));
        assert_eq!(prefix_len_ignore_case("ПОМОЩНИК: да", "Помощник:"), Some(17));
        assert_eq!(prefix_len_ignore_case("Пом", "Помощник:"), None);
    }

    #[test]
    fn noise_words_stage() {
        let text = format!("Привет {} друг %%$$## мяу", "ы".repeat(31));
        assert_eq!(
            Stage::DropNoiseWords.apply(text, &rules()).unwrap(),
            "Привет друг мяу"
        );
        // Ellipsis-heavy but still mostly letters.
        assert!(!is_noise_word("Мяу...", &rules()));
        assert!(!is_noise_word(":(", &rules()));
    }

    #[test]
    fn sentence_limit_stage() {
        assert_eq!(limit_sentences("Мяу! Раз. Два. Три.", 2), "Мяу! Раз.");
        assert_eq!(limit_sentences("Мяу... Похоже?! Да. Нет", 2), "Мяу... Похоже?!");
        assert_eq!(limit_sentences("без точки", 2), "без точки");
    }

    #[test]
    fn quality_gate_stage() {
        let rules = rules();
        assert_eq!(quality_gate("".into(), &rules), Err(QualityIssue::Empty));
        assert_eq!(quality_gate("?!".into(), &rules), Err(QualityIssue::OnlyPunctuation));
        assert_eq!(quality_gate("да!".into(), &rules), Err(QualityIssue::TooShort));
        assert_eq!(
            quality_gate("Мяууууууу".into(), &rules),
            Err(QualityIssue::NoWordBoundary)
        );
        assert_eq!(quality_gate(" Мяу, друг ".into(), &rules).unwrap(), "Мяу, друг");
    }

    #[test]
    fn marker_stage_appends_when_missing() {
        assert_eq!(
            ensure_persona_marker("Привет, как дела?".into(), 120, " Мяу!"),
            "Привет, как дела? Мяу!"
        );
        assert_eq!(
            ensure_persona_marker("МУР, привет".into(), 120, " Мяу!"),
            "МУР, привет"
        );
    }

    // ── Whole pipeline ─────────────────────────────────────────────────

    #[test]
    fn embedded_role_marker_leaves_no_trace() {
        let cleaned = reply().clean("Мяу! Я люблю звёзды. Пользователь: а ещё что? Помощник: рыбу");
        assert_eq!(cleaned.text, "Мяу! Я люблю звёзды.");
        assert!(!cleaned.text.contains("Пользователь"));
        assert!(!cleaned.is_rejected());
    }

    #[test]
    fn garbage_is_replaced_with_not_understood() {
        for raw in ["", "   ", "?! ...", "ok", "аааааааааааааааааааааааааааааааааааа"] {
            let cleaned = reply().clean(raw);
            assert_eq!(cleaned.text, NOT_UNDERSTOOD, "raw = {raw:?}");
            assert!(cleaned.is_rejected());
        }
    }

    #[test]
    fn long_reply_keeps_marker_within_cap() {
        let raw = "слово ".repeat(60);
        let cleaned = reply().clean(&raw);
        assert!(cleaned.text.chars().count() <= 120);
        assert!(cleaned.text.ends_with("Мяу!"));
        assert!(has_persona_marker(&cleaned.text));
    }

    #[test]
    fn marker_past_the_cap_does_not_count() {
        let raw = format!("{} мяу", "кот ".repeat(40));
        let cleaned = reply().clean(&raw);
        assert!(cleaned.text.chars().count() <= 120);
        assert!(cleaned.text.ends_with(" Мяу!"));
    }

    #[test]
    fn output_is_never_empty_and_capped() {
        let samples = [
            "",
            "Мяу",
            "Помощник:",
            "Пользователь: привет",
            "🐾🐾🐾",
            "Отличный вопрос! Космос огромен. И полон рыбы. И молока.",
            &"длинноеслово ".repeat(30),
        ];
        for raw in samples {
            let text = reply().clean(raw).text;
            assert!(!text.is_empty(), "raw = {raw:?}");
            assert!(text.chars().count() <= 120, "raw = {raw:?}");
            assert!(has_persona_marker(&text), "raw = {raw:?}");
        }
    }

    #[test]
    fn cleaning_is_idempotent_on_its_output() {
        for raw in [
            "Помощник: Привет, друг! Как настроение? Я тут гоняю кометы.",
            "Мяу... Похоже, мои двигатели перегрелись. Попробуйте ещё раз.",
            "",
        ] {
            let once = reply().clean(raw).text;
            assert_eq!(reply().clean(&once).text, once, "raw = {raw:?}");
        }
    }

    #[test]
    fn title_cleaning() {
        let t = title();
        assert_eq!(t.clean("Космические приключения\nСообщение: ещё").text, "Космические приключения 🐾");
        assert_eq!(t.clean("  «Кошачий чат».").text, "Кошачий чат 🐾");
        assert_eq!(t.clean("Название: Мурлыкающий вечер").text, "Мурлыкающий вечер");
        let long = t.clean(&"Очень длинное название ".repeat(10));
        assert!(long.text.chars().count() <= 50);
        assert!(long.text.ends_with("🐾"));
    }

    #[test]
    fn rejected_title_uses_title_substitute() {
        let cleaned = title().clean("\n\n...");
        assert_eq!(cleaned.text, TITLE_NOT_UNDERSTOOD);
        assert!(cleaned.is_rejected());
    }

    #[test]
    fn fit_with_marker_respects_tiny_caps() {
        let fitted = fit_with_marker(TITLE_NOT_UNDERSTOOD, 10, " 🐾");
        assert!(fitted.chars().count() <= 10);
        assert!(has_persona_marker(&fitted));
    }

    #[test]
    fn stage_names_are_unique() {
        let mut names: Vec<_> = TITLE_STAGES.iter().map(|s| s.name()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), TITLE_STAGES.len());
    }
}
