//! Thin HTTP layer: timeout-bounded GET with a per-source user agent,
//! block-response detection, and archive fallback for scraping sources.
//!
//! Rate limiting is not handled here; it lives at the source instance.

use std::time::Duration;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;
use tracing::{debug, warn};

use epilogue_model::LookupErrorKind;

const DEFAULT_USER_AGENT: &str =
    "EpilogueBot/0.1 (+https://github.com/epilogue-project/epilogue)";

/// Best-known-snapshot redirect endpoint of the Wayback Machine.
const ARCHIVE_MIRROR_PREFIX: &str = "https://web.archive.org/web/2/";

/// Archive snapshots are slow; give them a bigger budget than live fetches.
const ARCHIVE_TIMEOUT: Duration = Duration::from_secs(30);

static TITLE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)<title[^>]*>(.*?)</title>").expect("title regex should compile")
});

/// Lowercased markers that indicate a bot wall served with HTTP 200.
const BLOCK_SENTINELS: &[&str] = &[
    "captcha",
    "are you a robot",
    "unusual traffic",
    "attention required",
    "access denied",
    "verify you are human",
];

#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
    pub final_url: String,
    pub content_type: Option<String>,
}

/// The one seam the fetch layer needs for tests: a GET that follows
/// redirects and reports the final URL. `headers` always carries the
/// user agent; API-key sources add their auth headers.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn get(
        &self,
        url: &str,
        headers: &[(String, String)],
        timeout: Duration,
    ) -> std::result::Result<TransportResponse, FetchError>;
}

/// Production transport over a shared `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .unwrap_or_default();
        Self { client }
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl Default for ReqwestTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn get(
        &self,
        url: &str,
        headers: &[(String, String)],
        timeout: Duration,
    ) -> std::result::Result<TransportResponse, FetchError> {
        let mut request = self.client.get(url).timeout(timeout);
        for (name, value) in headers {
            request = request.header(name.as_str(), value.as_str());
        }
        let response = request
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    FetchError::Timeout
                } else {
                    FetchError::Network(e.to_string())
                }
            })?;

        let status = response.status().as_u16();
        let final_url = response.url().to_string();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_string());
        let body = response.text().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout
            } else {
                FetchError::Network(e.to_string())
            }
        })?;

        Ok(TransportResponse {
            status,
            body,
            final_url,
            content_type,
        })
    }
}

#[derive(Debug, Clone, Error)]
pub enum FetchError {
    #[error("blocked by upstream (status {status})")]
    Blocked { status: u16 },

    #[error("rate limited by upstream")]
    RateLimited,

    #[error("not found")]
    NotFound,

    #[error("upstream error (status {status})")]
    Upstream { status: u16 },

    #[error("request timed out")]
    Timeout,

    #[error("network error: {0}")]
    Network(String),
}

impl FetchError {
    /// Uniform mapping into the source error taxonomy.
    pub fn lookup_kind(&self) -> LookupErrorKind {
        match self {
            FetchError::Blocked { .. } => LookupErrorKind::Blocked,
            FetchError::RateLimited => LookupErrorKind::RateLimited,
            FetchError::NotFound => LookupErrorKind::NotFound,
            FetchError::Upstream { .. } | FetchError::Network(_) => LookupErrorKind::UpstreamError,
            FetchError::Timeout => LookupErrorKind::Timeout,
        }
    }

    fn is_block(&self) -> bool {
        matches!(self, FetchError::Blocked { .. } | FetchError::RateLimited)
    }
}

#[derive(Debug, Clone)]
pub struct FetchOutcome {
    pub content: String,
    pub title: Option<String>,
    pub final_url: String,
    /// True when the content came from the archival mirror.
    pub via_archive: bool,
}

/// Per-call knobs; sources derive these from their descriptor.
#[derive(Debug, Clone)]
pub struct FetchSpec {
    pub timeout: Duration,
    pub user_agent: String,
    pub extra_headers: Vec<(String, String)>,
}

impl Default for FetchSpec {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(15),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            extra_headers: Vec::new(),
        }
    }
}

impl FetchSpec {
    pub fn with_timeout_ms(ms: u64) -> Self {
        Self {
            timeout: Duration::from_millis(ms),
            ..Self::default()
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra_headers.push((name.into(), value.into()));
        self
    }

    fn headers(&self) -> Vec<(String, String)> {
        let mut headers = vec![("user-agent".to_string(), self.user_agent.clone())];
        headers.extend(self.extra_headers.iter().cloned());
        headers
    }
}

/// HTTP GET with block classification and optional archive fallback.
pub struct HttpFetcher {
    transport: std::sync::Arc<dyn HttpTransport>,
}

impl std::fmt::Debug for HttpFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpFetcher").finish_non_exhaustive()
    }
}

impl HttpFetcher {
    pub fn new(transport: std::sync::Arc<dyn HttpTransport>) -> Self {
        Self { transport }
    }

    pub fn with_default_transport() -> Self {
        Self::new(std::sync::Arc::new(ReqwestTransport::new()))
    }

    /// Fetch one page. Blocked responses (403/429 or a CAPTCHA wall served
    /// as 200) surface as [`FetchError`]; callers that declared the archive
    /// capability use [`Self::fetch_with_archive_fallback`] instead.
    pub async fn fetch_page(
        &self,
        url: &str,
        spec: &FetchSpec,
    ) -> std::result::Result<FetchOutcome, FetchError> {
        let response = self
            .transport
            .get(url, &spec.headers(), spec.timeout)
            .await?;
        Self::classify(&response, true)?;

        Ok(FetchOutcome {
            title: extract_title(&response.body),
            content: response.body,
            final_url: response.final_url,
            via_archive: false,
        })
    }

    /// Fetch a JSON API endpoint. Status classification applies but the
    /// CAPTCHA sentinel scan does not; APIs signal blocks via status.
    pub async fn fetch_api(
        &self,
        url: &str,
        spec: &FetchSpec,
    ) -> std::result::Result<String, FetchError> {
        let response = self
            .transport
            .get(url, &spec.headers(), spec.timeout)
            .await?;
        Self::classify(&response, false)?;
        Ok(response.body)
    }

    /// On a detected block, retry the same target through the public
    /// archival mirror with a longer budget.
    pub async fn fetch_with_archive_fallback(
        &self,
        url: &str,
        spec: &FetchSpec,
    ) -> std::result::Result<FetchOutcome, FetchError> {
        match self.fetch_page(url, spec).await {
            Ok(outcome) => Ok(outcome),
            Err(err) if err.is_block() => {
                warn!(url, error = %err, "blocked, retrying via archive mirror");
                let archive_url = format!("{ARCHIVE_MIRROR_PREFIX}{url}");
                let archive_spec = FetchSpec {
                    timeout: ARCHIVE_TIMEOUT,
                    user_agent: spec.user_agent.clone(),
                    extra_headers: spec.extra_headers.clone(),
                };
                let mut outcome = self.fetch_page(&archive_url, &archive_spec).await?;
                outcome.via_archive = true;
                debug!(url, "archive fallback succeeded");
                Ok(outcome)
            }
            Err(err) => Err(err),
        }
    }

    fn classify(
        response: &TransportResponse,
        scan_sentinels: bool,
    ) -> std::result::Result<(), FetchError> {
        match response.status {
            200..=299 => {
                if scan_sentinels && body_looks_blocked(&response.body) {
                    return Err(FetchError::Blocked {
                        status: response.status,
                    });
                }
                Ok(())
            }
            403 => Err(FetchError::Blocked { status: 403 }),
            429 => Err(FetchError::RateLimited),
            404 | 410 => Err(FetchError::NotFound),
            status if status >= 500 => Err(FetchError::Upstream { status }),
            status => Err(FetchError::Upstream { status }),
        }
    }
}

/// Sentinel scan for bot walls served with a success status. Only the head
/// of the document is scanned; article bodies legitimately mention these
/// words.
fn body_looks_blocked(body: &str) -> bool {
    let head: String = body.chars().take(2_000).collect::<String>().to_lowercase();
    BLOCK_SENTINELS.iter().any(|marker| head.contains(marker))
}

fn extract_title(body: &str) -> Option<String> {
    TITLE_PATTERN.captures(body).map(|caps| {
        caps[1]
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .trim()
            .to_string()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Scripted transport: pops one canned response per call and records
    /// the requested URLs.
    struct ScriptedTransport {
        responses: Mutex<Vec<std::result::Result<TransportResponse, FetchError>>>,
        requested: Mutex<Vec<String>>,
    }

    impl ScriptedTransport {
        fn new(responses: Vec<std::result::Result<TransportResponse, FetchError>>) -> Self {
            Self {
                responses: Mutex::new(responses),
                requested: Mutex::new(Vec::new()),
            }
        }

        fn urls(&self) -> Vec<String> {
            self.requested.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl HttpTransport for ScriptedTransport {
        async fn get(
            &self,
            url: &str,
            _headers: &[(String, String)],
            _timeout: Duration,
        ) -> std::result::Result<TransportResponse, FetchError> {
            self.requested.lock().unwrap().push(url.to_string());
            self.responses.lock().unwrap().remove(0)
        }
    }

    fn ok_response(body: &str) -> TransportResponse {
        TransportResponse {
            status: 200,
            body: body.to_string(),
            final_url: "https://example.com/page".to_string(),
            content_type: Some("text/html".to_string()),
        }
    }

    fn status_response(status: u16) -> TransportResponse {
        TransportResponse {
            status,
            body: String::new(),
            final_url: "https://example.com/page".to_string(),
            content_type: None,
        }
    }

    #[tokio::test]
    async fn block_triggers_archive_fallback() {
        let transport = std::sync::Arc::new(ScriptedTransport::new(vec![
            Ok(status_response(403)),
            Ok(ok_response("<title>Archived</title><p>content</p>")),
        ]));
        let fetcher = HttpFetcher::new(transport.clone());

        let outcome = fetcher
            .fetch_with_archive_fallback("https://example.com/page", &FetchSpec::default())
            .await
            .unwrap();

        assert!(outcome.via_archive);
        let urls = transport.urls();
        assert_eq!(urls.len(), 2);
        assert!(urls[1].starts_with("https://web.archive.org/web/2/"));
        assert!(urls[1].ends_with("https://example.com/page"));
    }

    #[tokio::test]
    async fn block_without_fallback_surfaces_blocked() {
        let transport = std::sync::Arc::new(ScriptedTransport::new(vec![Ok(status_response(403))]));
        let fetcher = HttpFetcher::new(transport);

        let err = fetcher
            .fetch_page("https://example.com/page", &FetchSpec::default())
            .await
            .unwrap_err();
        assert_eq!(err.lookup_kind(), LookupErrorKind::Blocked);
    }

    #[tokio::test]
    async fn captcha_wall_with_success_status_is_blocked() {
        let transport = std::sync::Arc::new(ScriptedTransport::new(vec![Ok(ok_response(
            "<html><title>Attention Required</title><p>complete the CAPTCHA to continue</p>",
        ))]));
        let fetcher = HttpFetcher::new(transport);

        let err = fetcher
            .fetch_page("https://example.com/page", &FetchSpec::default())
            .await
            .unwrap_err();
        assert_eq!(err.lookup_kind(), LookupErrorKind::Blocked);
    }

    #[tokio::test]
    async fn status_classification_matches_policy() {
        for (status, kind) in [
            (429u16, LookupErrorKind::RateLimited),
            (404, LookupErrorKind::NotFound),
            (410, LookupErrorKind::NotFound),
            (500, LookupErrorKind::UpstreamError),
            (418, LookupErrorKind::UpstreamError),
        ] {
            let mut mock = MockHttpTransport::new();
            mock.expect_get()
                .returning(move |_, _, _| Ok(status_response(status)));
            let fetcher = HttpFetcher::new(std::sync::Arc::new(mock));
            let err = fetcher
                .fetch_page("https://example.com", &FetchSpec::default())
                .await
                .unwrap_err();
            assert_eq!(err.lookup_kind(), kind, "status {status}");
        }
    }

    #[test]
    fn title_extraction_collapses_whitespace() {
        let body = "<html><head><title>\n  John Wayne\n  Obituary </title></head></html>";
        assert_eq!(extract_title(body).as_deref(), Some("John Wayne Obituary"));
    }
}
