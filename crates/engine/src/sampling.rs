//! Token-level helpers shared by the sampler.
//!
//! Kept free of tensor types so they can be checked without a model.

/// How many trailing context tokens the repetition penalty looks at.
pub const REPEAT_LAST_N: usize = 64;

/// Fit a prompt into `max` tokens.
///
/// The first `head` tokens (special tokens such as BOS added by the
/// tokenizer) are always kept. The rest is cut from the front, which
/// sacrifices the oldest context and keeps the trailing response cue that
/// generation continues from.
pub fn truncate_prompt_tokens(tokens: &[u32], max: usize, head: usize) -> Vec<u32> {
    if tokens.len() <= max {
        return tokens.to_vec();
    }
    let head = head.min(max.saturating_sub(1));
    let tail_start = tokens.len() - (max - head);
    let mut kept = Vec::with_capacity(max);
    kept.extend_from_slice(&tokens[..head]);
    kept.extend_from_slice(&tokens[tail_start..]);
    kept
}

/// The tail of the context the repetition penalty applies to.
pub fn repeat_window(tokens: &[u32], last_n: usize) -> &[u32] {
    let start = tokens.len().saturating_sub(last_n);
    &tokens[start..]
}

/// Tokens that would complete an `n`-gram already present in `tokens`.
///
/// `n == 0` disables the check. With `n == 1` every seen token is banned.
/// The result is sorted and deduplicated.
pub fn banned_ngram_tokens(tokens: &[u32], n: usize) -> Vec<u32> {
    if n == 0 || tokens.len() < n {
        return Vec::new();
    }
    let prefix = &tokens[tokens.len() - (n - 1)..];
    let mut banned: Vec<u32> = tokens
        .windows(n)
        .filter(|window| &window[..n - 1] == prefix)
        .map(|window| window[n - 1])
        .collect();
    banned.sort_unstable();
    banned.dedup();
    banned
}

/// Overwrite the logits of `banned` tokens with negative infinity.
pub fn mask_logits(logits: &mut [f32], banned: &[u32]) {
    for &token in banned {
        if let Some(logit) = logits.get_mut(token as usize) {
            *logit = f32::NEG_INFINITY;
        }
    }
}
