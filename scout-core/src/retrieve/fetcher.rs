//! Page fetching and text extraction.
//!
//! Turns a search hit's URL into a `SourceDocument` with readable text
//! content. HTML is reduced to plain text without browser automation.

use crate::error::RetrievalError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use std::collections::HashMap;
use std::time::Duration;

/// Maximum characters of extracted content kept per document.
const MAX_CONTENT_CHARS: usize = 12_000;

/// A fetched source with its extracted content. Immutable after fetch.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    pub url: String,
    pub title: Option<String>,
    pub content: String,
    pub fetched_at: DateTime<Utc>,
}

/// Trait for document fetching, so the collector can be tested without I/O.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<SourceDocument, RetrievalError>;
}

/// HTTP fetcher with timeout, redirect cap, and HTML-to-text extraction.
pub struct PageFetcher {
    client: Client,
    timeout_secs: u64,
}

impl PageFetcher {
    pub fn new(timeout_secs: u64) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .redirect(reqwest::redirect::Policy::limited(5))
            .user_agent("scout/0.3")
            .build()
            .unwrap_or_default();
        Self {
            client,
            timeout_secs,
        }
    }
}

#[async_trait]
impl Fetcher for PageFetcher {
    async fn fetch(&self, url: &str) -> Result<SourceDocument, RetrievalError> {
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(RetrievalError::FetchFailed {
                url: url.to_string(),
                message: "URL must start with http:// or https://".into(),
            });
        }

        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                RetrievalError::FetchTimeout {
                    url: url.to_string(),
                    timeout_secs: self.timeout_secs,
                }
            } else {
                RetrievalError::FetchFailed {
                    url: url.to_string(),
                    message: e.to_string(),
                }
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(RetrievalError::FetchFailed {
                url: url.to_string(),
                message: format!("HTTP {status}"),
            });
        }

        let content_type = response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();

        let body = response
            .text()
            .await
            .map_err(|e| RetrievalError::FetchFailed {
                url: url.to_string(),
                message: format!("body read: {e}"),
            })?;

        let is_html =
            content_type.contains("text/html") || content_type.contains("application/xhtml");
        let title = if is_html { extract_title(&body) } else { None };
        let mut content = if is_html { html_to_text(&body) } else { body };

        if content.trim().is_empty() {
            return Err(RetrievalError::UnusableContent {
                url: url.to_string(),
                reason: "no extractable text".into(),
            });
        }
        if content.len() > MAX_CONTENT_CHARS {
            content.truncate(truncation_boundary(&content, MAX_CONTENT_CHARS));
        }

        Ok(SourceDocument {
            url: url.to_string(),
            title,
            content,
            fetched_at: Utc::now(),
        })
    }
}

/// Largest index <= `limit` that falls on a char boundary.
fn truncation_boundary(text: &str, limit: usize) -> usize {
    let mut idx = limit.min(text.len());
    while idx > 0 && !text.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}

/// Pull the `<title>` text out of an HTML document, if any.
fn extract_title(html: &str) -> Option<String> {
    let lower = html.to_lowercase();
    let start = lower.find("<title")?;
    let open_end = lower[start..].find('>')? + start + 1;
    let close = lower[open_end..].find("</title>")? + open_end;
    let title = decode_entities(html[open_end..close].trim());
    if title.is_empty() {
        None
    } else {
        Some(title)
    }
}

enum ScanMode {
    Text,
    Tag,
    Skipping(&'static str),
}

/// Reduce an HTML document to readable plain text.
///
/// Script and style bodies are dropped, block-level tags become newlines,
/// entities are decoded, and blank lines are collapsed.
pub fn html_to_text(html: &str) -> String {
    let mut out = String::with_capacity(html.len() / 2);
    let mut mode = ScanMode::Text;
    let mut tag = String::new();

    for ch in html.chars() {
        match mode {
            ScanMode::Text => {
                if ch == '<' {
                    mode = ScanMode::Tag;
                    tag.clear();
                } else {
                    out.push(ch);
                }
            }
            ScanMode::Tag => {
                if ch == '>' {
                    let name = tag
                        .trim_start_matches('/')
                        .split(|c: char| c.is_whitespace() || c == '/')
                        .next()
                        .unwrap_or("")
                        .to_lowercase();
                    mode = match name.as_str() {
                        "script" if !tag.starts_with('/') => ScanMode::Skipping("script"),
                        "style" if !tag.starts_with('/') => ScanMode::Skipping("style"),
                        _ => ScanMode::Text,
                    };
                    if is_block_tag(&name) {
                        out.push('\n');
                    }
                } else {
                    tag.push(ch);
                }
            }
            ScanMode::Skipping(element) => {
                // Wait for the matching close tag
                if ch == '>' && tag.to_lowercase().ends_with(&format!("</{element}")) {
                    mode = ScanMode::Text;
                    tag.clear();
                } else {
                    tag.push(ch);
                }
            }
        }
    }

    let decoded = decode_entities(&out);
    let mut lines: Vec<&str> = decoded.lines().map(str::trim).collect();
    lines.retain(|l| !l.is_empty());
    lines.join("\n")
}

fn is_block_tag(name: &str) -> bool {
    matches!(
        name,
        "p" | "br"
            | "div"
            | "li"
            | "tr"
            | "section"
            | "article"
            | "h1"
            | "h2"
            | "h3"
            | "h4"
            | "h5"
            | "h6"
    )
}

fn decode_entities(text: &str) -> String {
    let mut replacements = HashMap::new();
    replacements.insert("&amp;", "&");
    replacements.insert("&lt;", "<");
    replacements.insert("&gt;", ">");
    replacements.insert("&quot;", "\"");
    replacements.insert("&#39;", "'");
    replacements.insert("&nbsp;", " ");

    let mut result = text.to_string();
    for (entity, replacement) in replacements {
        if result.contains(entity) {
            result = result.replace(entity, replacement);
        }
    }
    result
}

// ---------------------------------------------------------------------------
// Static fetcher
// ---------------------------------------------------------------------------

/// Fetcher serving canned pages from memory, for tests.
///
/// URLs without an entry fail with `FetchFailed`, which is how per-URL fetch
/// failures are simulated.
pub struct StaticFetcher {
    pages: HashMap<String, String>,
}

impl StaticFetcher {
    pub fn new() -> Self {
        Self {
            pages: HashMap::new(),
        }
    }

    pub fn with_page(mut self, url: &str, content: &str) -> Self {
        self.pages.insert(url.to_string(), content.to_string());
        self
    }
}

impl Default for StaticFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Fetcher for StaticFetcher {
    async fn fetch(&self, url: &str) -> Result<SourceDocument, RetrievalError> {
        match self.pages.get(url) {
            Some(content) => Ok(SourceDocument {
                url: url.to_string(),
                title: None,
                content: content.clone(),
                fetched_at: Utc::now(),
            }),
            None => Err(RetrievalError::FetchFailed {
                url: url.to_string(),
                message: "no such page".into(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_html_to_text_basic() {
        let html = r#"
        <html><head><title>Test</title></head>
        <body>
            <h1>Hello World</h1>
            <p>This is a <b>test</b> paragraph.</p>
            <script>var x = 1;</script>
            <style>.foo { color: red; }</style>
            <ul><li>Item 1</li><li>Item 2</li></ul>
        </body></html>"#;

        let text = html_to_text(html);
        assert!(text.contains("Hello World"));
        assert!(text.contains("This is a test paragraph."));
        assert!(text.contains("Item 1"));
        assert!(!text.contains("var x = 1"));
        assert!(!text.contains("color: red"));
    }

    #[test]
    fn test_html_to_text_entities() {
        let text = html_to_text("<p>A &amp; B &lt; C &gt; D &quot;E&quot;</p>");
        assert!(text.contains("A & B < C > D \"E\""));
    }

    #[test]
    fn test_html_to_text_collapses_blank_lines() {
        let text = html_to_text("<div>one</div>\n\n\n<div>two</div>");
        assert_eq!(text, "one\ntwo");
    }

    #[test]
    fn test_extract_title() {
        let html = "<html><head><title>  Page &amp; Title </title></head></html>";
        assert_eq!(extract_title(html).as_deref(), Some("Page & Title"));
        assert_eq!(extract_title("<html><body>no title</body></html>"), None);
    }

    #[test]
    fn test_truncation_boundary_respects_utf8() {
        let text = "héllo wörld";
        let idx = truncation_boundary(text, 2);
        assert!(text.is_char_boundary(idx));
    }

    #[tokio::test]
    async fn test_static_fetcher_hit_and_miss() {
        let fetcher = StaticFetcher::new().with_page("https://a.example/1", "content one");
        let doc = fetcher.fetch("https://a.example/1").await.unwrap();
        assert_eq!(doc.content, "content one");

        let err = fetcher.fetch("https://a.example/2").await.unwrap_err();
        assert!(matches!(err, RetrievalError::FetchFailed { .. }));
    }

    #[tokio::test]
    async fn test_page_fetcher_rejects_non_http() {
        let fetcher = PageFetcher::new(5);
        let err = fetcher.fetch("ftp://example.com/file").await.unwrap_err();
        assert!(matches!(err, RetrievalError::FetchFailed { .. }));
    }
}
