//! Full-text content extraction.
//!
//! Preference order: the HTML rendering linked from the abstract page, then the
//! PDF. Extraction never fails outward; a paper with no retrievable content
//! yields [`ExtractedContent::empty`].

use scraper::node::Node;
use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::sources::arxiv::ArxivEndpoints;
use crate::sources::SourceError;
use crate::utils::{collapse_whitespace, extract_text_async, source_retry_config, with_retry, HttpClient};

/// Subtrees dropped before text extraction
const SKIPPED_TAGS: [&str; 5] = ["script", "style", "nav", "header", "footer"];

/// Where extracted text came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentOrigin {
    Html,
    Pdf,
    None,
}

/// Extracted full text and figure URLs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedContent {
    pub text: String,
    pub images: Vec<String>,
    pub origin: ContentOrigin,
}

impl ExtractedContent {
    /// The "nothing retrievable" value
    pub fn empty() -> Self {
        Self {
            text: String::new(),
            images: Vec::new(),
            origin: ContentOrigin::None,
        }
    }

    pub fn html(text: impl Into<String>, images: Vec<String>) -> Self {
        Self {
            text: text.into(),
            images,
            origin: ContentOrigin::Html,
        }
    }

    pub fn has_text(&self) -> bool {
        !self.text.trim().is_empty()
    }
}

/// Fetches abstract pages, HTML renderings and PDFs for one paper at a time.
#[derive(Debug, Clone)]
pub struct ContentExtractor {
    client: HttpClient,
    endpoints: ArxivEndpoints,
}

impl ContentExtractor {
    pub fn new(client: HttpClient, endpoints: ArxivEndpoints) -> Self {
        Self { client, endpoints }
    }

    /// Best-effort extraction; see the module docs for the fallback order.
    pub async fn extract(&self, id: &str) -> ExtractedContent {
        match self.from_html_rendering(id).await {
            Ok(Some(content)) if content.has_text() => {
                tracing::debug!("{}: {} chars from HTML rendering", id, content.text.len());
                return content;
            }
            Ok(_) => tracing::debug!("{}: no HTML rendering, trying PDF", id),
            Err(e) => tracing::warn!("{}: HTML rendering failed ({}), trying PDF", id, e),
        }

        match self.from_pdf(id).await {
            Ok(text) if !text.is_empty() => {
                tracing::debug!("{}: {} chars from PDF", id, text.len());
                ExtractedContent {
                    text,
                    images: Vec::new(),
                    origin: ContentOrigin::Pdf,
                }
            }
            Ok(_) => {
                tracing::warn!("{}: PDF contained no text", id);
                ExtractedContent::empty()
            }
            Err(e) => {
                tracing::warn!("{}: no content available ({})", id, e);
                ExtractedContent::empty()
            }
        }
    }

    async fn from_html_rendering(&self, id: &str) -> Result<Option<ExtractedContent>, SourceError> {
        let abs_url = self.endpoints.abs(id);
        let abs_page = self.fetch_text(&abs_url).await?;
        let Some(rendering_url) = find_html_rendering_link(&abs_page, &abs_url) else {
            return Ok(None);
        };

        let page = self.fetch_text(&rendering_url).await?;
        let (text, images) = extract_article(&page, &rendering_url);
        Ok(Some(ExtractedContent::html(text, images)))
    }

    async fn from_pdf(&self, id: &str) -> Result<String, SourceError> {
        let url = self.endpoints.pdf(id);
        let bytes = with_retry(source_retry_config(), || self.client.get_bytes(&url)).await?;
        let text = extract_text_async(bytes)
            .await
            .map_err(|e| SourceError::Parse(e.to_string()))?;
        Ok(collapse_whitespace(&text))
    }

    async fn fetch_text(&self, url: &str) -> Result<String, SourceError> {
        with_retry(source_retry_config(), || self.client.get_text(url)).await
    }
}

/// Find the HTML full-text link on an abstract page, resolved to an absolute URL.
pub fn find_html_rendering_link(abs_page: &str, page_url: &str) -> Option<String> {
    let document = Html::parse_document(abs_page);
    let selector = Selector::parse("a[href]").ok()?;
    let base = Url::parse(page_url).ok()?;

    document
        .select(&selector)
        .filter_map(|a| a.value().attr("href"))
        .filter(|href| href.contains("/html/"))
        .find_map(|href| base.join(href).ok())
        .map(String::from)
}

/// Visible article text and absolute image URLs from an HTML rendering.
pub fn extract_article(html: &str, page_url: &str) -> (String, Vec<String>) {
    let document = Html::parse_document(html);
    let base = document_base(&document, page_url);

    let root = Selector::parse("body")
        .ok()
        .and_then(|s| document.select(&s).next())
        .unwrap_or_else(|| document.root_element());

    let mut pieces = Vec::new();
    collect_text(root, &mut pieces);
    let text = collapse_whitespace(&pieces.join(" "));

    let mut images: Vec<String> = Vec::new();
    if let (Ok(img), Some(base)) = (Selector::parse("img[src]"), base.as_ref()) {
        for src in document.select(&img).filter_map(|el| el.value().attr("src")) {
            let Ok(resolved) = base.join(src.trim()) else {
                continue;
            };
            if !matches!(resolved.scheme(), "http" | "https") {
                continue;
            }
            let resolved = String::from(resolved);
            if !images.contains(&resolved) {
                images.push(resolved);
            }
        }
    }

    (text, images)
}

/// `<base href>` if present, otherwise the page URL treated as a directory.
fn document_base(document: &Html, page_url: &str) -> Option<Url> {
    let page = Url::parse(page_url).ok()?;

    let declared = Selector::parse("base[href]")
        .ok()
        .and_then(|s| document.select(&s).next())
        .and_then(|el| el.value().attr("href"))
        .and_then(|href| page.join(href).ok());
    if declared.is_some() {
        return declared;
    }

    if page.path().ends_with('/') {
        return Some(page);
    }
    // renderings are served as `/html/<id>v<n>` with figures underneath
    let mut directory = page;
    directory.set_query(None);
    directory.set_fragment(None);
    let path = format!("{}/", directory.path());
    directory.set_path(&path);
    Some(directory)
}

fn collect_text(element: ElementRef, pieces: &mut Vec<String>) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => pieces.push(text.to_string()),
            Node::Element(el) if SKIPPED_TAGS.contains(&el.name()) => {}
            Node::Element(_) => {
                if let Some(child_el) = ElementRef::wrap(child) {
                    collect_text(child_el, pieces);
                }
            }
            _ => {}
        }
    }
}
