//! String similarity scoring for fuzzy command and name matching.
//!
//! All scores are integers in `0..=100`. The full ratio is `2·M / (|a| + |b|)`
//! where `M` is the number of characters kept by a minimal insert/delete edit
//! script between the two strings (computed with [`similar`]'s Myers diff).
//!
//! | Metric | Use |
//! |--------|-----|
//! | [`Metric::Full`] | command triggers, note and file names |
//! | [`Metric::Partial`] | one string is a fragment of the other (wake phrase inside a sentence) |
//! | [`Metric::TokenSort`] | same words in a different order |
//!
//! Full and token-sort scores are symmetric. Partial scores are not
//! guaranteed to be: callers must not swap arguments and expect the same value.

use similar::TextDiff;

/// Similarity metric selector for [`score`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    /// Whole-string edit similarity.
    Full,
    /// Best window of the longer string against the shorter one.
    Partial,
    /// Full similarity after normalizing and sorting word tokens.
    TokenSort,
}

/// A candidate accepted by [`best_match`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Match<'a> {
    /// The matching candidate.
    pub candidate: &'a str,
    /// Position of the candidate in the input sequence.
    pub index: usize,
    /// Full-ratio score against the query.
    pub score: u8,
}

/// Score two strings under the given metric.
#[must_use]
pub fn score(a: &str, b: &str, metric: Metric) -> u8 {
    match metric {
        Metric::Full => ratio(a, b),
        Metric::Partial => partial_ratio(a, b),
        Metric::TokenSort => token_sort_ratio(a, b),
    }
}

/// Maximum of all three metrics.
///
/// Used where any single strong signal should count (wake phrase detection).
#[must_use]
pub fn best_score(a: &str, b: &str) -> u8 {
    ratio(a, b)
        .max(partial_ratio(a, b))
        .max(token_sort_ratio(a, b))
}

/// Whole-string similarity.
#[must_use]
pub fn ratio(a: &str, b: &str) -> u8 {
    if let Some(s) = degenerate(a, b) {
        return s;
    }
    to_score(raw_ratio(a, b))
}

/// Best similarity between the shorter string and any same-length window of
/// the longer one.
#[must_use]
pub fn partial_ratio(a: &str, b: &str) -> u8 {
    if let Some(s) = degenerate(a, b) {
        return s;
    }

    let a_len = a.chars().count();
    let b_len = b.chars().count();
    let (shorter, longer, n) = if a_len <= b_len {
        (a, b, a_len)
    } else {
        (b, a, b_len)
    };

    let long_chars: Vec<char> = longer.chars().collect();
    let mut best = 0.0f32;
    for start in 0..=(long_chars.len() - n) {
        let window: String = long_chars[start..start + n].iter().collect();
        let r = raw_ratio(shorter, &window);
        if r > best {
            best = r;
            if best >= 0.995 {
                break;
            }
        }
    }
    to_score(best)
}

/// Similarity after lowercasing, stripping punctuation, and sorting tokens.
#[must_use]
pub fn token_sort_ratio(a: &str, b: &str) -> u8 {
    if let Some(s) = degenerate(a, b) {
        return s;
    }
    let sa = sorted_tokens(a);
    let sb = sorted_tokens(b);
    if sa.is_empty() || sb.is_empty() {
        // Nothing but punctuation on at least one side.
        return if a == b { 100 } else { 0 };
    }
    to_score(raw_ratio(&sa, &sb))
}

/// Find the best candidate scoring at least `cutoff` under the full metric.
///
/// Ties keep the earlier candidate.
pub fn best_match<'a, I>(query: &str, candidates: I, cutoff: u8) -> Option<Match<'a>>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut best: Option<Match<'a>> = None;
    for (index, candidate) in candidates.into_iter().enumerate() {
        let score = ratio(query, candidate);
        if score < cutoff {
            continue;
        }
        if best.is_none_or(|b| score > b.score) {
            best = Some(Match {
                candidate,
                index,
                score,
            });
        }
    }
    best
}

/// Empty-string rules shared by every metric.
fn degenerate(a: &str, b: &str) -> Option<u8> {
    match (a.is_empty(), b.is_empty()) {
        (true, true) => Some(100),
        (true, false) | (false, true) => Some(0),
        (false, false) if a == b => Some(100),
        _ => None,
    }
}

fn raw_ratio(a: &str, b: &str) -> f32 {
    TextDiff::from_chars(a, b).ratio()
}

fn to_score(r: f32) -> u8 {
    (r.clamp(0.0, 1.0) * 100.0).round() as u8
}

fn sorted_tokens(s: &str) -> String {
    let cleaned: String = s
        .chars()
        .map(|c| {
            if c.is_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                ' '
            }
        })
        .collect();
    let mut tokens: Vec<&str> = cleaned.split_whitespace().collect();
    tokens.sort_unstable();
    tokens.join(" ")
}
