//! The page record, before and after the fetch.
//!
//! A page starts as a [`PendingPage`], which is nothing but a URL. Loading a
//! transport response consumes it and yields a [`FetchedPage`], whose
//! transport fields are fixed from then on. Because `load` takes the pending
//! page by value and `FetchedPage` has no load operation, loading twice is
//! not something a caller can write.
//!
//! The one field that is filled later is the parse result. It lives in a
//! write-once slot, so a loaded page can be shared across threads and the
//! parse stage can still attach its output exactly once.
use std::sync::OnceLock;

use bytes::Bytes;

use crate::charset::Charset;
use crate::config::FetchConfig;
use crate::error::{LoadFailure, PageError};
use crate::transport::TransportResponse;
use crate::types::{ParseData, ResponseHeaders, WebUrl};

/// A page that has been scheduled but not fetched.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PendingPage {
    url: WebUrl,
}

impl PendingPage {
    pub fn new(url: WebUrl) -> Self {
        Self { url }
    }

    /// Sanitizes `raw` according to `cfg` and wraps it as a pending page.
    pub fn parse(raw: impl Into<String>, cfg: &FetchConfig) -> Result<Self, PageError> {
        WebUrl::sanitized(raw, cfg.strip_control_chars).map(Self::new)
    }

    pub fn url(&self) -> &WebUrl {
        &self.url
    }

    /// Points the page at a different URL before it is fetched, e.g. after
    /// the pipeline resolved a redirect itself.
    pub fn retarget(&mut self, url: WebUrl) {
        self.url = url;
    }

    /// Populates the page from `response`. See [`crate::load`].
    pub fn load<R: TransportResponse>(
        self,
        response: R,
        cfg: &FetchConfig,
    ) -> Result<FetchedPage, LoadFailure> {
        crate::load(self, response, cfg)
    }
}

/// A page whose response has been fully read.
///
/// Every accessor is a plain read. The record is `Send + Sync`; clones share
/// the body buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchedPage {
    pub(crate) url: WebUrl,
    pub(crate) status: Option<u16>,
    pub(crate) content_bytes: Bytes,
    pub(crate) content_type: Option<String>,
    pub(crate) content_encoding: Option<String>,
    pub(crate) content_charset: Option<Charset>,
    pub(crate) response_headers: ResponseHeaders,
    pub(crate) parse_result: OnceLock<ParseData>,
}

impl FetchedPage {
    pub fn url(&self) -> &WebUrl {
        &self.url
    }

    /// HTTP status reported by the transport, if it reported one.
    pub fn status(&self) -> Option<u16> {
        self.status
    }

    /// The body exactly as the transport delivered it.
    pub fn content_bytes(&self) -> &[u8] {
        &self.content_bytes
    }

    /// The body as a shared buffer; cloning it does not copy the bytes.
    pub fn content(&self) -> Bytes {
        self.content_bytes.clone()
    }

    /// Raw `Content-Type` header value, e.g. `"text/html; charset=UTF-8"`.
    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    /// Raw `Content-Encoding` header value, e.g. `"gzip"`.
    ///
    /// This is the transfer encoding, not the text charset. The body is not
    /// decompressed by this crate.
    pub fn content_encoding(&self) -> Option<&str> {
        self.content_encoding.as_deref()
    }

    /// Charset to decode [`content_bytes`](Self::content_bytes) with, when
    /// one could be determined.
    pub fn content_charset(&self) -> Option<Charset> {
        self.content_charset
    }

    pub fn response_headers(&self) -> &ResponseHeaders {
        &self.response_headers
    }

    pub fn parse_result(&self) -> Option<&ParseData> {
        self.parse_result.get()
    }

    pub fn is_parsed(&self) -> bool {
        self.parse_result.get().is_some()
    }

    /// Stores the parse stage's output.
    ///
    /// Only the first call succeeds; later calls return
    /// [`PageError::ParseResultAlreadyAttached`] and leave the stored result
    /// untouched.
    pub fn attach_parse_result(&self, data: ParseData) -> Result<(), PageError> {
        self.parse_result
            .set(data)
            .map_err(|_| PageError::ParseResultAlreadyAttached(self.url.to_string()))
    }

    /// Re-targets a loaded page at another URL, keeping everything else.
    pub fn retarget(mut self, url: WebUrl) -> Self {
        self.url = url;
        self
    }
}
