//! Multi-metric product-name similarity.
//!
//! Every metric runs on the canonical (normalized + singularized) form of both
//! inputs and the best one wins. A single strong signal is enough to surface a
//! match even when the other metrics disagree.

use std::collections::HashSet;

use strsim::normalized_levenshtein;

use crate::normalize::canonical;

pub const CONTAINMENT_BONUS: f64 = 0.8;
pub const SUBSET_BONUS: f64 = 0.9;
pub const CATEGORY_BONUS: f64 = 0.7;

// (category, keywords)
pub const CATEGORY_KEYWORDS: [(&str, &[&str]); 7] = [
    ("chairs", &["chair", "seating", "seat"]),
    ("tables", &["table", "desk", "surface"]),
    ("linens", &["linen", "tablecloth", "napkin", "runner"]),
    ("lighting", &["light", "lamp", "chandelier", "fixture"]),
    ("decor", &["decoration", "centerpiece", "vase", "candle"]),
    ("tents", &["tent", "canopy", "shelter"]),
    ("audio", &["speaker", "microphone", "sound", "audio"]),
];

/// Similarity in `[0, 1]` between a requested product and a catalog name.
pub fn score(a: &str, b: &str) -> f64 {
    let a = canonical(a);
    let b = canonical(b);
    score_canonical(&a, &b)
}

/// Same as [`score`] for inputs that are already canonical.
pub fn score_canonical(a: &str, b: &str) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }

    let words_a = token_set(a);
    let words_b = token_set(b);

    let mut candidates = vec![
        sequence_ratio(a, b),
        fuzzy_ratio(a, b),
        partial_ratio(a, b),
        token_sort_ratio(a, b),
        jaccard(&words_a, &words_b),
    ];

    if a.contains(b) || b.contains(a) {
        candidates.push(CONTAINMENT_BONUS);
    }
    if is_token_subset(&words_a, &words_b) {
        candidates.push(SUBSET_BONUS);
    }
    candidates.push(category_similarity(a, b));

    candidates
        .into_iter()
        .fold(0.0_f64, f64::max)
        .clamp(0.0, 1.0)
}

/// `2 * LCS / (len(a) + len(b))` over characters; 0 when either side is empty.
pub fn sequence_ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }

    let mut prev = vec![0usize; b.len() + 1];
    let mut curr = vec![0usize; b.len() + 1];
    for ca in &a {
        for (j, cb) in b.iter().enumerate() {
            curr[j + 1] = if ca == cb {
                prev[j] + 1
            } else {
                prev[j + 1].max(curr[j])
            };
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    let lcs = prev[b.len()];

    (2 * lcs) as f64 / (a.len() + b.len()) as f64
}

/// Typo-tolerant edit-distance ratio.
pub fn fuzzy_ratio(a: &str, b: &str) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    normalized_levenshtein(a, b)
}

/// Best [`fuzzy_ratio`] of the shorter string against every same-length window of the longer.
pub fn partial_ratio(a: &str, b: &str) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let (short, long) = if a.chars().count() <= b.chars().count() {
        (a, b)
    } else {
        (b, a)
    };

    let long: Vec<char> = long.chars().collect();
    let width = short.chars().count();

    long.windows(width)
        .map(|window| normalized_levenshtein(short, &window.iter().collect::<String>()))
        .fold(0.0_f64, f64::max)
}

/// [`fuzzy_ratio`] after sorting the tokens of both sides.
pub fn token_sort_ratio(a: &str, b: &str) -> f64 {
    fuzzy_ratio(&sorted_tokens(a), &sorted_tokens(b))
}

/// Intersection over union of two token sets; 0 when either is empty.
pub fn jaccard(a: &HashSet<&str>, b: &HashSet<&str>) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let common = a.intersection(b).count();
    let union = a.union(b).count();
    common as f64 / union as f64
}

/// `CATEGORY_BONUS` when both strings mention a keyword of the same category.
pub fn category_similarity(a: &str, b: &str) -> f64 {
    let in_category = |text: &str, keywords: &[&str]| keywords.iter().any(|k| text.contains(k));

    let shared = CATEGORY_KEYWORDS
        .iter()
        .any(|(_, keywords)| in_category(a, keywords) && in_category(b, keywords));

    if shared {
        CATEGORY_BONUS
    } else {
        0.0
    }
}

pub fn token_set(text: &str) -> HashSet<&str> {
    text.split_whitespace().collect()
}

fn is_token_subset(a: &HashSet<&str>, b: &HashSet<&str>) -> bool {
    if a.is_empty() || b.is_empty() {
        return false;
    }
    if a.len() <= b.len() {
        a.is_subset(b)
    } else {
        b.is_subset(a)
    }
}

fn sorted_tokens(text: &str) -> String {
    let mut tokens: Vec<&str> = text.split_whitespace().collect();
    tokens.sort_unstable();
    tokens.join(" ")
}
