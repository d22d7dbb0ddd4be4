//! Snippet-level biographical confidence.
//!
//! Confidence-in-this-hit, orthogonal to the source's reliability score:
//! a fixed increment per distinct biographical keyword family matched,
//! clamped to [0, 0.95]. One shared implementation for every source.

const INCREMENT_PER_FAMILY: f64 = 0.13;
const CONFIDENCE_CAP: f64 = 0.95;

/// Keyword families that signal genuinely biographical text.
const KEYWORD_FAMILIES: &[&[&str]] = &[
    // childhood
    &["childhood", "grew up", "was raised", "as a child"],
    // family
    &["mother", "father", "parents", "siblings", "family"],
    // education
    &["school", "college", "university", "studied", "graduated"],
    // early life
    &["early life", "was born", "born in", "birthplace", "native of"],
    // career
    &["career", "starred", "debut", "roles", "performance", "film", "television"],
    // marriage
    &["married", "marriage", "wife", "husband", "divorce", "widow"],
    // illness and death
    &["died", "death", "illness", "diagnosed", "cancer", "funeral", "buried", "survived by"],
];

pub fn biographical_confidence(text: &str) -> f64 {
    if text.is_empty() {
        return 0.0;
    }
    let haystack = text.to_lowercase();
    let matched = KEYWORD_FAMILIES
        .iter()
        .filter(|family| family.iter().any(|kw| haystack.contains(kw)))
        .count();
    (matched as f64 * INCREMENT_PER_FAMILY).min(CONFIDENCE_CAP)
}
