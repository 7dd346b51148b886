//! Memory scoring: persistent base score, live importance used for ranking,
//! keyword extraction for the text index, and the token-cost estimate used by
//! budget math.

use crate::config::ContextConfig;
use crate::types::Memory;
use chrono::{DateTime, Utc};

/// Half-life of the recency factor, in days.
const RECENCY_HALF_LIFE_DAYS: f64 = 7.0;

/// Base score for a fresh memory: category weight plus a small length bonus.
/// Content length contributes at most 0.1; the result never exceeds 1.0.
pub fn score_memory(config: &ContextConfig, category: &str, content: &str) -> f64 {
    let weight = config.category_weight(category);
    #[allow(clippy::cast_precision_loss)]
    let length_bonus = (content.chars().count() as f64 / 500.0).min(0.1);
    (weight + length_bonus).min(1.0)
}

/// Live importance: `base · recency · frequency`.
///
/// Recency halves every seven days of inactivity; frequency grows
/// logarithmically with the touch count. An unparseable timestamp returns the
/// base unchanged so a corrupt row can never rank as NaN.
pub fn compute_importance(memory: &Memory, now: DateTime<Utc>) -> f64 {
    let base = memory.score;
    let Ok(last_accessed) = DateTime::parse_from_rfc3339(&memory.last_accessed) else {
        return base;
    };
    #[allow(clippy::cast_precision_loss)]
    let elapsed_days =
        (now - last_accessed.with_timezone(&Utc)).num_milliseconds() as f64 / 86_400_000.0;
    let freshness_days = elapsed_days.max(0.01);
    if !freshness_days.is_finite() {
        return base;
    }
    let recency = (-std::f64::consts::LN_2 * freshness_days / RECENCY_HALF_LIFE_DAYS).exp();
    #[allow(clippy::cast_precision_loss)]
    let frequency = (memory.access_count.max(0) as f64 + 1.0).log2() + 1.0;
    base * recency * frequency
}

fn keep_keyword_char(c: char) -> bool {
    c.is_ascii_lowercase()
        || c.is_ascii_digit()
        || ('а'..='я').contains(&c)
        || c == 'ё'
        || c == '_'
        || c == '-'
        || c == '.'
        || c == '/'
}

/// Normalize text into the space-separated keyword list stored beside each
/// memory. Tokens of one or two characters and stopwords are dropped;
/// duplicates collapse preserving first occurrence; at most 30 survive.
/// Cyrillic is intentionally preserved.
pub fn extract_keywords(config: &ContextConfig, text: &str) -> String {
    let lowered = text.to_lowercase();
    let cleaned: String = lowered
        .chars()
        .map(|c| if keep_keyword_char(c) { c } else { ' ' })
        .collect();

    let mut keywords: Vec<&str> = Vec::new();
    for token in cleaned.split_whitespace() {
        if token.chars().count() <= 2 {
            continue;
        }
        if config.stopwords.contains(token) {
            continue;
        }
        if keywords.contains(&token) {
            continue;
        }
        keywords.push(token);
        if keywords.len() == 30 {
            break;
        }
    }
    keywords.join(" ")
}

/// Rough token cost of a text: `ceil(chars / 3.5)`.
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn estimate_tokens(text: &str) -> usize {
    (text.chars().count() as f64 / 3.5).ceil() as usize
}
