//! Mechanical HTML → plain-text extraction plus metadata.
//!
//! The mechanical pass is dependency-light and idempotent; the optional
//! LLM narrowing pass lives in [`relevance`].

pub mod confidence;
pub mod relevance;

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};

pub use confidence::biographical_confidence;
pub use relevance::{BiographicalExtract, Relevance, extract_biographical};

static WHITESPACE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[ \t\r\f]+").expect("whitespace regex should compile"));
static BLANK_LINES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\n{3,}").expect("blank-line regex should compile"));

/// Elements whose subtree is never article content.
const SKIP_ANCESTORS: &[&str] = &[
    "script", "style", "nav", "footer", "header", "aside", "form", "noscript",
];

#[derive(Debug, Clone, Default)]
pub struct CleanedPage {
    pub text: String,
    pub title: Option<String>,
    pub publication: Option<String>,
}

/// Strip chrome, collapse whitespace, and pull the article title and
/// publication name out of standard meta tags.
pub fn mechanical_pre_clean(html: &str) -> CleanedPage {
    let document = Html::parse_document(html);

    let title = meta_content(&document, "meta[property=\"og:title\"]")
        .or_else(|| select_text(&document, "title"));
    let publication = meta_content(&document, "meta[property=\"og:site_name\"]");

    let content_selector =
        Selector::parse("p, h1, h2, h3, li, blockquote").expect("content selector");
    let mut paragraphs: Vec<String> = Vec::new();
    for element in document.select(&content_selector) {
        if has_skipped_ancestor(element) {
            continue;
        }
        let text = normalize_inline(&element.text().collect::<String>());
        if !text.is_empty() {
            paragraphs.push(text);
        }
    }

    // Plain-text input (or already-cleaned text) has no content elements;
    // fall back to the whole document so cleaning stays idempotent.
    let text = if paragraphs.is_empty() {
        normalize_block(&document.root_element().text().collect::<String>())
    } else {
        normalize_block(&paragraphs.join("\n\n"))
    };

    CleanedPage {
        text,
        title: title.filter(|t| !t.is_empty()),
        publication: publication.filter(|p| !p.is_empty()),
    }
}

fn has_skipped_ancestor(element: scraper::ElementRef<'_>) -> bool {
    element.ancestors().any(|node| {
        node.value()
            .as_element()
            .is_some_and(|el| SKIP_ANCESTORS.contains(&el.name()))
    })
}

fn meta_content(document: &Html, selector: &str) -> Option<String> {
    let selector = Selector::parse(selector).ok()?;
    document
        .select(&selector)
        .next()
        .and_then(|el| el.value().attr("content"))
        .map(|c| normalize_inline(c))
}

fn select_text(document: &Html, selector: &str) -> Option<String> {
    let selector = Selector::parse(selector).ok()?;
    document
        .select(&selector)
        .next()
        .map(|el| normalize_inline(&el.text().collect::<String>()))
}

fn normalize_inline(raw: &str) -> String {
    WHITESPACE.replace_all(raw, " ").trim().to_string()
}

fn normalize_block(raw: &str) -> String {
    let collapsed = WHITESPACE.replace_all(raw, " ");
    let lines: Vec<String> = collapsed
        .lines()
        .map(|line| line.trim().to_string())
        .collect();
    BLANK_LINES
        .replace_all(lines.join("\n").trim(), "\n\n")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<html><head>
        <title>Fallback Title</title>
        <meta property="og:title" content="John Wayne Dead of Cancer">
        <meta property="og:site_name" content="Example Tribune">
        <style>p { color: red }</style>
      </head><body>
        <nav><li>Home</li><li>Obituaries</li></nav>
        <p>John   Wayne, the  actor, died on June 11, 1979.</p>
        <aside><p>Related stories</p></aside>
        <p>He was 72 years old.</p>
        <footer><p>Copyright</p></footer>
      </body></html>"#;

    #[test]
    fn strips_chrome_and_collapses_whitespace() {
        let cleaned = mechanical_pre_clean(PAGE);
        assert!(cleaned.text.contains("John Wayne, the actor, died"));
        assert!(cleaned.text.contains("He was 72 years old."));
        assert!(!cleaned.text.contains("Home"));
        assert!(!cleaned.text.contains("Related stories"));
        assert!(!cleaned.text.contains("Copyright"));
        assert!(!cleaned.text.contains("color: red"));
    }

    #[test]
    fn prefers_og_metadata() {
        let cleaned = mechanical_pre_clean(PAGE);
        assert_eq!(cleaned.title.as_deref(), Some("John Wayne Dead of Cancer"));
        assert_eq!(cleaned.publication.as_deref(), Some("Example Tribune"));
    }

    #[test]
    fn falls_back_to_title_element() {
        let cleaned = mechanical_pre_clean("<html><head><title>Only Title</title></head><body><p>x</p></body></html>");
        assert_eq!(cleaned.title.as_deref(), Some("Only Title"));
    }

    #[test]
    fn cleaning_is_idempotent() {
        let once = mechanical_pre_clean(PAGE);
        let twice = mechanical_pre_clean(&once.text);
        assert_eq!(once.text, twice.text);
    }
}
