//! Stop-word-filtered lexical tokenizer used for capability ranking.

use std::collections::BTreeSet;

/// Articles, pronouns, and prepositions that carry no routing signal.
const STOP_WORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "for", "from", "how", "i", "in", "is", "it", "me", "my",
    "of", "on", "the", "to", "with", "you", "your",
];

const MIN_TOKEN_LEN: usize = 3;

/// Normalize text into a token set: lowercase, maximal `[a-z0-9]` runs,
/// tokens shorter than three characters and stop words dropped.
///
/// Empty input yields an empty set, which short-circuits all downstream
/// matching — an empty token set can never score above zero.
#[must_use]
pub fn tokenize(text: &str) -> BTreeSet<String> {
    let mut tokens = BTreeSet::new();
    let mut current = String::new();

    for ch in text.chars() {
        if ch.is_ascii_alphanumeric() {
            current.push(ch.to_ascii_lowercase());
        } else if !current.is_empty() {
            push_token(&mut tokens, std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        push_token(&mut tokens, current);
    }

    tokens
}

fn push_token(tokens: &mut BTreeSet<String>, token: String) {
    if token.len() >= MIN_TOKEN_LEN && !STOP_WORDS.contains(&token.as_str()) {
        tokens.insert(token);
    }
}
