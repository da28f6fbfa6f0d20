//! Value types shared by the page record and its collaborators.
//!
//! ```text
//! PendingPage                         FetchedPage
//! └── url: WebUrl      ── load() ──▶  ├── url: WebUrl
//!                                     ├── status: Option<u16>
//!                                     ├── content_bytes: Bytes
//!                                     ├── content_type: Option<String>
//!                                     ├── content_encoding: Option<String>
//!                                     ├── content_charset: Option<Charset>
//!                                     ├── response_headers: ResponseHeaders
//!                                     └── parse_result: once-only ParseData
//! ```
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::PageError;

/// The identity of a page: the normalized request URL.
///
/// The crate treats it as an opaque string. The only guarantee is that it is
/// never empty and holds no control characters unless the caller explicitly
/// opted out of stripping them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct WebUrl(String);

impl WebUrl {
    /// Builds a URL, stripping control characters and surrounding whitespace.
    pub fn new(raw: impl Into<String>) -> Result<Self, PageError> {
        Self::sanitized(raw, true)
    }

    /// Builds a URL with explicit control-character handling.
    pub fn sanitized(raw: impl Into<String>, strip_control_chars: bool) -> Result<Self, PageError> {
        let raw = raw.into();
        let filtered = if strip_control_chars {
            raw.chars().filter(|c| !c.is_control()).collect::<String>()
        } else {
            raw
        };
        let trimmed = filtered.trim();
        if trimmed.is_empty() {
            return Err(PageError::EmptyUrl);
        }
        Ok(WebUrl(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    /// Deterministic UUIDv5 of this URL under `namespace`.
    ///
    /// The frontier and storage collaborators use this as a compact key; the
    /// same URL always maps to the same id for a given namespace.
    ///
    /// ```rust
    /// use page::WebUrl;
    /// use uuid::Uuid;
    ///
    /// let a = WebUrl::new("https://example.com/").unwrap();
    /// let b = WebUrl::new(" https://example.com/\n").unwrap();
    /// assert_eq!(a.page_id(&Uuid::NAMESPACE_URL), b.page_id(&Uuid::NAMESPACE_URL));
    /// ```
    pub fn page_id(&self, namespace: &Uuid) -> Uuid {
        Uuid::new_v5(namespace, self.0.as_bytes())
    }
}

impl fmt::Display for WebUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for WebUrl {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for WebUrl {
    type Error = PageError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        WebUrl::new(value)
    }
}

impl TryFrom<&str> for WebUrl {
    type Error = PageError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        WebUrl::new(value)
    }
}

impl FromStr for WebUrl {
    type Err = PageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        WebUrl::new(s)
    }
}

impl From<WebUrl> for String {
    fn from(url: WebUrl) -> Self {
        url.0
    }
}

/// Response headers in the order the transport delivered them.
///
/// HTTP allows a header name to repeat, and some consumers care about order
/// (e.g. multiple `Set-Cookie` or `Link` headers), so this is a list of pairs
/// rather than a map. Lookups match names case-insensitively.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResponseHeaders(Vec<(String, String)>);

impl ResponseHeaders {
    pub fn new(pairs: Vec<(String, String)>) -> Self {
        ResponseHeaders(pairs)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// All pairs, in received order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
        self.0
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }

    pub fn as_slice(&self) -> &[(String, String)] {
        &self.0
    }

    /// Value of the first header called `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Values of every header called `name`, in received order.
    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.0
            .iter()
            .filter(move |(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn into_vec(self) -> Vec<(String, String)> {
        self.0
    }
}

impl From<Vec<(String, String)>> for ResponseHeaders {
    fn from(pairs: Vec<(String, String)>) -> Self {
        ResponseHeaders(pairs)
    }
}

impl<N: Into<String>, V: Into<String>> FromIterator<(N, V)> for ResponseHeaders {
    fn from_iter<I: IntoIterator<Item = (N, V)>>(iter: I) -> Self {
        ResponseHeaders(
            iter.into_iter()
                .map(|(name, value)| (name.into(), value.into()))
                .collect(),
        )
    }
}

/// What a parser extracted from a page.
///
/// Attached once to a [`FetchedPage`](crate::FetchedPage) by the parse stage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParseData {
    pub title: Option<String>,

    /// Visible text, already decoded using the page's charset.
    pub text: Option<String>,

    /// Links found on the page, as written (not resolved or deduplicated).
    #[serde(default)]
    pub outgoing_urls: Vec<String>,

    /// Parser-specific extras.
    #[serde(default)]
    pub attributes: Option<serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_is_sanitized() {
        let url = WebUrl::new("  https://example.com/\u{0007}path\n").expect("valid");
        assert_eq!(url.as_str(), "https://example.com/path");
    }

    #[test]
    fn blank_url_rejected() {
        assert_eq!(WebUrl::new(" \t\r\n"), Err(PageError::EmptyUrl));
        assert_eq!(WebUrl::new("\u{0000}"), Err(PageError::EmptyUrl));
        assert_eq!("".parse::<WebUrl>(), Err(PageError::EmptyUrl));
    }

    #[test]
    fn control_chars_kept_when_requested() {
        let url = WebUrl::sanitized("a\u{0001}b", false).expect("valid");
        assert_eq!(url.as_str(), "a\u{0001}b");
    }

    #[test]
    fn page_id_depends_on_namespace() {
        let url = WebUrl::new("https://example.com/").expect("valid");
        let other_ns = Uuid::new_v5(&Uuid::NAMESPACE_DNS, b"crawler.example");
        assert_eq!(
            url.page_id(&Uuid::NAMESPACE_URL),
            url.page_id(&Uuid::NAMESPACE_URL)
        );
        assert_ne!(url.page_id(&Uuid::NAMESPACE_URL), url.page_id(&other_ns));
    }

    #[test]
    fn url_serde_rejects_blank() {
        let url: WebUrl = serde_json::from_str("\"https://example.com\"").expect("valid");
        assert_eq!(url.as_str(), "https://example.com");
        assert!(serde_json::from_str::<WebUrl>("\"   \"").is_err());
    }

    #[test]
    fn headers_keep_order_and_duplicates() {
        let headers: ResponseHeaders =
            [("X-A", "1"), ("Content-Type", "text/html"), ("x-a", "2")]
                .into_iter()
                .collect();

        assert_eq!(headers.len(), 3);
        assert_eq!(headers.get("X-A"), Some("1"));
        assert_eq!(headers.get_all("x-A").collect::<Vec<_>>(), vec!["1", "2"]);
        assert_eq!(headers.get("content-type"), Some("text/html"));
        assert_eq!(headers.get("missing"), None);
        assert_eq!(
            headers.iter().map(|(name, _)| name).collect::<Vec<_>>(),
            vec!["X-A", "Content-Type", "x-a"]
        );
    }

    #[test]
    fn parse_data_defaults_missing_fields() {
        let data: ParseData = serde_json::from_str(r#"{"title": "Home"}"#).expect("parses");
        assert_eq!(data.title.as_deref(), Some("Home"));
        assert!(data.outgoing_urls.is_empty());
        assert!(data.attributes.is_none());
    }
}
