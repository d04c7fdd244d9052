//! arXiv identifiers, URLs and the production [`PaperSource`].

use async_trait::async_trait;
use regex::Regex;
use scraper::{Html, Selector};
use std::sync::LazyLock;

use crate::config::Config;
use crate::models::{Candidate, PaperRecord, PaperRecordBuilder};
use crate::sources::content::{ContentExtractor, ExtractedContent};
use crate::sources::{listing, PaperSource, SourceError};
use crate::utils::{collapse_whitespace, source_retry_config, with_retry, HttpClient};

/// Canonical arXiv host; cache keys and record URLs always use it
pub const ARXIV_BASE_URL: &str = "https://arxiv.org";

/// Route prefixes a paper URL must contain to be recognized
const ROUTES: [&str; 3] = ["/abs/", "/pdf/", "/html/"];

/// `2503.01078`, `2503.01078v2`, `1412.6980`
static BARE_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{4}\.\d{4,5})(?:v\d+)?$").expect("identifier pattern is valid")
});

/// Normalize a paper reference into its canonical unversioned identifier.
///
/// Accepts bare identifiers (optionally versioned or `arXiv:`-prefixed) and
/// abstract, PDF or HTML-rendering URLs. Returns `None` for anything else.
///
/// ```
/// use robodaily::sources::normalize_identifier;
///
/// assert_eq!(
///     normalize_identifier("https://arxiv.org/pdf/2503.01078v2.pdf").as_deref(),
///     Some("2503.01078")
/// );
/// assert_eq!(normalize_identifier("not a paper"), None);
/// ```
pub fn normalize_identifier(input: &str) -> Option<String> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return None;
    }

    let bare = strip_prefix_ignore_case(trimmed, "arxiv:").unwrap_or(trimmed);
    if let Some(id) = match_bare(bare) {
        return Some(id);
    }

    let url = if trimmed.contains("://") {
        url::Url::parse(trimmed).ok()?
    } else if trimmed.contains('/') {
        url::Url::parse(&format!("https://{}", trimmed)).ok()?
    } else {
        return None;
    };

    let path = url.path();
    if !ROUTES.iter().any(|route| path.contains(route)) {
        return None;
    }

    let segment = path.trim_end_matches('/').rsplit('/').next()?;
    let decoded = urlencoding::decode(segment).ok()?;
    let decoded = decoded.trim();
    let without_ext = strip_suffix_ignore_case(decoded, ".pdf").unwrap_or(decoded);
    match_bare(without_ext.trim_end_matches('/'))
}

fn match_bare(candidate: &str) -> Option<String> {
    BARE_ID
        .captures(candidate)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

fn strip_prefix_ignore_case<'a>(s: &'a str, prefix: &str) -> Option<&'a str> {
    let head = s.get(..prefix.len())?;
    head.eq_ignore_ascii_case(prefix).then(|| &s[prefix.len()..])
}

fn strip_suffix_ignore_case<'a>(s: &'a str, suffix: &str) -> Option<&'a str> {
    let split = s.len().checked_sub(suffix.len())?;
    let tail = s.get(split..)?;
    tail.eq_ignore_ascii_case(suffix).then(|| &s[..split])
}

/// Canonical abstract page URL
pub fn abs_url(id: &str) -> String {
    format!("{}/abs/{}", ARXIV_BASE_URL, id)
}

/// Canonical PDF URL
pub fn pdf_url(id: &str) -> String {
    format!("{}/pdf/{}", ARXIV_BASE_URL, id)
}

/// Canonical HTML rendering URL
pub fn html_url(id: &str) -> String {
    format!("{}/html/{}", ARXIV_BASE_URL, id)
}

/// Canonical reference (abstract URL) for any recognized input
pub fn canonical_reference(input: &str) -> Option<String> {
    normalize_identifier(input).map(|id| abs_url(&id))
}

/// Fetch endpoints, overridable so tests can point at a local server
#[derive(Debug, Clone)]
pub struct ArxivEndpoints {
    base: String,
}

impl ArxivEndpoints {
    pub fn new(base: impl Into<String>) -> Self {
        Self {
            base: base.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn abs(&self, id: &str) -> String {
        format!("{}/abs/{}", self.base, id)
    }

    pub fn pdf(&self, id: &str) -> String {
        format!("{}/pdf/{}", self.base, id)
    }
}

impl Default for ArxivEndpoints {
    fn default() -> Self {
        Self::new(ARXIV_BASE_URL)
    }
}

/// Read `citation_*` meta tags from an abstract page.
pub fn parse_abstract_metadata(html: &str, id: &str) -> Result<PaperRecord, SourceError> {
    let document = Html::parse_document(html);
    let meta = |name: &str| -> Vec<String> {
        let selector = match Selector::parse(&format!("meta[name=\"{}\"]", name)) {
            Ok(selector) => selector,
            Err(_) => return Vec::new(),
        };
        document
            .select(&selector)
            .filter_map(|el| el.value().attr("content"))
            .map(collapse_whitespace)
            .filter(|s| !s.is_empty())
            .collect()
    };

    let title = meta("citation_title")
        .into_iter()
        .next()
        .ok_or_else(|| SourceError::Parse(format!("No citation_title on abstract page for {}", id)))?;

    let date = meta("citation_date")
        .into_iter()
        .next()
        .or_else(|| meta("citation_online_date").into_iter().next())
        .unwrap_or_default();

    let category = Selector::parse("span.primary-subject")
        .ok()
        .and_then(|s| document.select(&s).next().map(|el| el.text().collect::<String>()))
        .map(|s| collapse_whitespace(&s))
        .unwrap_or_default();

    Ok(PaperRecordBuilder::new(id)
        .title(title)
        .authors(meta("citation_author").join(", "))
        .publication_date(date)
        .category(category)
        .build())
}

/// arXiv-backed [`PaperSource`]: listing scraper, metadata lookup, content extractor.
#[derive(Debug, Clone)]
pub struct ArxivSource {
    client: HttpClient,
    endpoints: ArxivEndpoints,
    listing_url: Option<String>,
    extractor: ContentExtractor,
}

impl ArxivSource {
    /// Create a new source from configuration
    pub fn new(config: &Config) -> Result<Self, SourceError> {
        let client = HttpClient::new(&config.http)?;
        Ok(Self::with_client(
            client,
            ArxivEndpoints::new(&config.arxiv.base_url),
            config.listing.url.clone(),
        ))
    }

    /// Create with a custom HTTP client (for testing)
    pub fn with_client(
        client: HttpClient,
        endpoints: ArxivEndpoints,
        listing_url: Option<String>,
    ) -> Self {
        let extractor = ContentExtractor::new(client.clone(), endpoints.clone());
        Self {
            client,
            endpoints,
            listing_url,
            extractor,
        }
    }

    async fn fetch(&self, url: &str) -> Result<String, SourceError> {
        with_retry(source_retry_config(), || self.client.get_text(url)).await
    }
}

#[async_trait]
impl PaperSource for ArxivSource {
    fn name(&self) -> &str {
        self.listing_url.as_deref().unwrap_or("arXiv")
    }

    async fn listing(&self, limit: usize) -> Result<Vec<Candidate>, SourceError> {
        let url = self.listing_url.as_deref().ok_or_else(|| {
            SourceError::InvalidRequest("No listing URL configured".to_string())
        })?;

        let html = self.fetch(url).await?;
        let candidates = listing::parse_listing(&html, limit);
        tracing::info!("Listing yielded {} candidates from {}", candidates.len(), url);
        Ok(candidates)
    }

    async fn metadata(&self, identifier: &str) -> Result<PaperRecord, SourceError> {
        let html = self.fetch(&self.endpoints.abs(identifier)).await?;
        parse_abstract_metadata(&html, identifier)
    }

    async fn content(&self, identifier: &str) -> ExtractedContent {
        self.extractor.extract(identifier).await
    }
}
