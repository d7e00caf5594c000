//! Product-name normalization shared by the scorer and the duplicate detector.

use std::borrow::Cow;
use std::collections::{HashMap, HashSet};

use lazy_static::lazy_static;
use once_cell::sync::Lazy;
use regex::Regex;

lazy_static! {
    static ref RE_WHITESPACE: Regex = Regex::new(r"\s+").unwrap();
    static ref RE_PUNCTUATION: Regex = Regex::new(r"[^\w\s]").unwrap();
}

const NAME_STOPWORDS: [&str; 14] = [
    "the", "a", "an", "and", "or", "but", "in", "on", "at", "to", "for", "of", "with", "by",
];

static STOPWORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    NAME_STOPWORDS
        .into_iter()
        .chain(["some", "any"])
        .collect()
});

static IRREGULAR_PLURALS: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    [
        ("children", "child"),
        ("people", "person"),
        ("men", "man"),
        ("women", "woman"),
        ("feet", "foot"),
        ("teeth", "tooth"),
        ("geese", "goose"),
        ("mice", "mouse"),
        ("dice", "die"),
        ("leaves", "leaf"),
        ("knives", "knife"),
        ("lives", "life"),
        ("wives", "wife"),
        ("shelves", "shelf"),
        ("halves", "half"),
        ("loaves", "loaf"),
        ("wolves", "wolf"),
        ("calves", "calf"),
        ("scarves", "scarf"),
        ("shoes", "shoe"),
        ("canoes", "canoe"),
        ("toes", "toe"),
    ]
    .into_iter()
    .collect()
});

static INVARIANT_NOUNS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "series", "species", "news", "sheep", "fish", "deer", "aircraft", "chassis", "means",
        "gas", "canvas", "atlas",
    ]
    .into_iter()
    .collect()
});

/// Lower-cases, strips punctuation, removes stopwords and single-character tokens.
pub fn normalize(name: &str) -> String {
    let lowered = name.trim().to_lowercase();
    let collapsed = RE_WHITESPACE.replace_all(&lowered, " ");
    let stripped = RE_PUNCTUATION.replace_all(&collapsed, "");

    stripped
        .split_whitespace()
        .filter(|word| !STOPWORDS.contains(word) && word.chars().count() > 1)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Reduces every whitespace-separated token to its singular form.
pub fn singularize(normalized: &str) -> String {
    normalized
        .split_whitespace()
        .map(singular_noun)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Returns the token unchanged if it is not a recognised plural.
pub fn singular_noun(word: &str) -> Cow<'_, str> {
    if let Some(singular) = IRREGULAR_PLURALS.get(word) {
        return Cow::Borrowed(*singular);
    }
    if INVARIANT_NOUNS.contains(word) || !word.is_ascii() {
        return Cow::Borrowed(word);
    }
    if word.ends_with("ss") || word.ends_with("us") || word.ends_with("is") {
        return Cow::Borrowed(word);
    }

    let len = word.len();
    if word.ends_with("ies") && len > 4 {
        return Cow::Owned(format!("{}y", &word[..len - 3]));
    }
    if ["ches", "shes", "sses", "xes", "zzes", "oes"]
        .iter()
        .any(|suffix| word.ends_with(suffix))
    {
        return Cow::Borrowed(&word[..len - 2]);
    }
    if word.ends_with('s') && len > 3 {
        return Cow::Borrowed(&word[..len - 1]);
    }

    Cow::Borrowed(word)
}

/// `normalize` followed by `singularize`; the form request matching runs on.
pub fn canonical(name: &str) -> String {
    singularize(&normalize(name))
}

/// Catalog-name form used for de-duplication. Keeps quantifiers and single-character
/// tokens, so "Tent B" and "Tent C" stay distinct products.
pub fn catalog_key(name: &str) -> String {
    let lowered = name.trim().to_lowercase();
    let collapsed = RE_WHITESPACE.replace_all(&lowered, " ");
    let stripped = RE_PUNCTUATION.replace_all(&collapsed, "");

    let kept = stripped
        .split_whitespace()
        .filter(|word| !NAME_STOPWORDS.contains(word))
        .collect::<Vec<_>>()
        .join(" ");
    singularize(&kept)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_strips_noise() {
        assert_eq!(normalize("  The Gold   Chiavari-Chairs! "), "gold chiavarichairs");
        assert_eq!(normalize("Table for a party of 8"), "table party");
        assert_eq!(normalize("a b c"), "");
        assert_eq!(normalize(""), "");
    }

    #[test]
    fn test_catalog_key_keeps_short_tokens() {
        assert_eq!(catalog_key("Tent B"), "tent b");
        assert_eq!(catalog_key("Some Chairs"), "some chair");
        assert_eq!(catalog_key("The Size 8 Shoes!"), "size 8 shoe");
        assert_eq!(canonical("The Size 8 Shoes!"), "size shoe");
    }

    #[test]
    fn test_singular_noun() {
        assert_eq!(singular_noun("chairs"), "chair");
        assert_eq!(singular_noun("tables"), "table");
        assert_eq!(singular_noun("supplies"), "supply");
        assert_eq!(singular_noun("boxes"), "box");
        assert_eq!(singular_noun("benches"), "bench");
        assert_eq!(singular_noun("glasses"), "glass");
        assert_eq!(singular_noun("knives"), "knife");
        assert_eq!(singular_noun("gloves"), "glove");
        assert_eq!(singular_noun("potatoes"), "potato");
        assert_eq!(singular_noun("people"), "person");
        assert_eq!(singular_noun("glass"), "glass");
        assert_eq!(singular_noun("cactus"), "cactus");
        assert_eq!(singular_noun("series"), "series");
        assert_eq!(singular_noun("chair"), "chair");
        assert_eq!(singular_noun("ties"), "tie");
    }

    #[test]
    fn test_singularize_phrase() {
        assert_eq!(singularize("gold chiavari chairs"), "gold chiavari chair");
        assert_eq!(singularize(""), "");
    }

    #[test]
    fn test_normalize_singularize_is_stable() {
        let once = normalize(&singularize(&normalize("Chairs")));
        assert_eq!(once, "chair");
        assert_eq!(normalize(&once), once);
        assert_eq!(singularize(&once), once);
    }
}
