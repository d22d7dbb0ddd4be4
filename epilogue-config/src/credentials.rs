//! Environment credential names, centralized so sources and docs agree.

pub const GOOGLE_CSE_KEY: &str = "GOOGLE_CSE_KEY";
pub const GOOGLE_CSE_CX: &str = "GOOGLE_CSE_CX";
pub const BING_SEARCH_KEY: &str = "BING_SEARCH_KEY";
pub const BRAVE_SEARCH_KEY: &str = "BRAVE_SEARCH_KEY";
pub const NYT_API_KEY: &str = "NYT_API_KEY";
pub const GUARDIAN_API_KEY: &str = "GUARDIAN_API_KEY";
pub const TROVE_API_KEY: &str = "TROVE_API_KEY";
pub const EUROPEANA_API_KEY: &str = "EUROPEANA_API_KEY";
pub const GOOGLE_BOOKS_KEY: &str = "GOOGLE_BOOKS_KEY";
pub const GEMINI_API_KEY: &str = "GEMINI_API_KEY";
pub const ANTHROPIC_API_KEY: &str = "ANTHROPIC_API_KEY";
pub const DATABASE_URL: &str = "DATABASE_URL";
pub const REDIS_URL: &str = "REDIS_URL";

/// A credential counts as configured only when the variable holds
/// something other than whitespace; an exported-but-empty key must not
/// make a source advertise itself as available.
pub fn env_present(name: &str) -> bool {
    std::env::var(name).is_ok_and(|value| !value.trim().is_empty())
}

/// True iff every named variable is configured.
pub fn all_present(names: &[&str]) -> bool {
    names.iter().all(|name| env_present(name))
}
