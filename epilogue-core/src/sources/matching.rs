//! Candidate disambiguation shared by every source.
//!
//! Policy: match on birth year when available; otherwise require a
//! case-insensitive full-name match; otherwise accept a last-name match.
//! Ambiguous candidate sets are rejected rather than guessed at.

use epilogue_model::Actor;

/// A person candidate as returned by an upstream (Wikidata row, search
/// result, book author line).
#[derive(Debug, Clone)]
pub struct PersonCandidate {
    pub name: String,
    pub birth_year: Option<i32>,
}

/// Loose name agreement used for page-level relevance: exact match,
/// query-tokens-subset (middle initials etc.), or last-name match.
pub fn name_matches(query: &str, candidate: &str) -> bool {
    let query_norm = normalize(query);
    let candidate_norm = normalize(candidate);
    if query_norm.is_empty() || candidate_norm.is_empty() {
        return false;
    }
    if query_norm == candidate_norm {
        return true;
    }

    let query_tokens: Vec<&str> = query_norm.split_whitespace().collect();
    let candidate_tokens: Vec<&str> = candidate_norm.split_whitespace().collect();

    // "John Wayne" vs "John M. Wayne": every query token appears.
    if query_tokens
        .iter()
        .all(|token| candidate_tokens.contains(token))
    {
        return true;
    }

    // Last-name agreement is enough for obituary indexes.
    match (query_tokens.last(), candidate_tokens.last()) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

/// Pick the one candidate that is plausibly the actor. `None` when nothing
/// matches or the match is ambiguous.
pub fn match_candidate<'a>(
    actor: &Actor,
    candidates: &'a [PersonCandidate],
) -> Option<&'a PersonCandidate> {
    if candidates.is_empty() {
        return None;
    }

    if let Some(target_year) = actor.birth_year() {
        let by_year: Vec<&PersonCandidate> = candidates
            .iter()
            .filter(|c| c.birth_year == Some(target_year) && name_matches(&actor.name, &c.name))
            .collect();
        if by_year.len() == 1 {
            return Some(by_year[0]);
        }
        if by_year.len() > 1 {
            return None;
        }
    }

    let by_full_name: Vec<&PersonCandidate> = candidates
        .iter()
        .filter(|c| normalize(&c.name) == normalize(&actor.name))
        .collect();
    if by_full_name.len() == 1 {
        return Some(by_full_name[0]);
    }
    if by_full_name.len() > 1 {
        return None;
    }

    let by_last_name: Vec<&PersonCandidate> = candidates
        .iter()
        .filter(|c| name_matches(&actor.name, &c.name))
        .collect();
    if by_last_name.len() == 1 {
        return Some(by_last_name[0]);
    }
    None
}

/// True when cleaned page text plausibly discusses the actor: the full
/// name appears, or both first and last name appear somewhere.
pub fn page_mentions(actor: &Actor, text: &str) -> bool {
    let haystack = text.to_lowercase();
    let name = normalize(&actor.name);
    if name.is_empty() {
        return false;
    }
    if haystack.contains(&name) {
        return true;
    }
    let mut tokens = name.split_whitespace();
    let first = tokens.next();
    let last = name.split_whitespace().last();
    match (first, last) {
        (Some(first), Some(last)) if first != last => {
            haystack.contains(first) && haystack.contains(last)
        }
        (Some(only), _) => haystack.contains(only),
        _ => false,
    }
}

fn normalize(raw: &str) -> String {
    raw.trim().to_lowercase()
}
