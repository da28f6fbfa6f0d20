//! The response shape consumed from the fetch transport.
//!
//! Any HTTP client can feed the normalizer by implementing
//! [`TransportResponse`]. The crate ships an in-memory [`BufferedResponse`],
//! a [`StreamingResponse`] over any [`Read`], and (with the `reqwest`
//! feature) an implementation for `reqwest::blocking::Response`.
use std::io::Read;

use bytes::{Buf, Bytes};

use crate::types::ResponseHeaders;

/// One HTTP response as handed over by a transport, before normalization.
///
/// The body is read exactly once, through [`into_body`](Self::into_body).
/// A read error from that reader is a transport failure; an immediate EOF is
/// a successful empty body.
pub trait TransportResponse {
    type Body: Read;

    /// Status code, if the transport exposes one.
    fn status_code(&self) -> Option<u16> {
        None
    }

    /// Every header pair, in received order, duplicates included.
    ///
    /// Called once per load; the result is passed back to
    /// [`content_type`](Self::content_type) and
    /// [`content_encoding`](Self::content_encoding).
    fn header_pairs(&self) -> ResponseHeaders;

    /// Raw `Content-Type` value.
    ///
    /// Defaults to the first `Content-Type` in `headers`. Transports that
    /// track the entity content type separately can override this.
    fn content_type(&self, headers: &ResponseHeaders) -> Option<String> {
        headers.get("content-type").map(str::to_owned)
    }

    /// Raw `Content-Encoding` value. Defaults to the first matching header.
    fn content_encoding(&self, headers: &ResponseHeaders) -> Option<String> {
        headers.get("content-encoding").map(str::to_owned)
    }

    fn into_body(self) -> Self::Body;
}

/// A response whose body is already in memory.
///
/// ```rust
/// use page::{BufferedResponse, TransportResponse};
///
/// let response = BufferedResponse::new()
///     .with_status(200)
///     .with_header("Content-Type", "text/plain")
///     .with_body("hello");
/// let headers = response.header_pairs();
/// assert_eq!(response.content_type(&headers).as_deref(), Some("text/plain"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BufferedResponse {
    status: Option<u16>,
    headers: Vec<(String, String)>,
    body: Bytes,
}

impl BufferedResponse {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    /// Appends a header; earlier headers with the same name are kept.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }
}

impl TransportResponse for BufferedResponse {
    type Body = bytes::buf::Reader<Bytes>;

    fn status_code(&self) -> Option<u16> {
        self.status
    }

    fn header_pairs(&self) -> ResponseHeaders {
        ResponseHeaders::new(self.headers.clone())
    }

    fn into_body(self) -> Self::Body {
        self.body.reader()
    }
}

/// A response whose body is pulled from an arbitrary reader.
///
/// Useful for adapting transports that expose the entity as a stream.
#[derive(Debug)]
pub struct StreamingResponse<R> {
    status: Option<u16>,
    headers: ResponseHeaders,
    body: R,
}

impl<R: Read> StreamingResponse<R> {
    pub fn new(headers: ResponseHeaders, body: R) -> Self {
        Self {
            status: None,
            headers,
            body,
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }
}

impl<R: Read> TransportResponse for StreamingResponse<R> {
    type Body = R;

    fn status_code(&self) -> Option<u16> {
        self.status
    }

    fn header_pairs(&self) -> ResponseHeaders {
        self.headers.clone()
    }

    fn into_body(self) -> R {
        self.body
    }
}

// reqwest's HeaderMap groups repeated names together and lowercases them, so
// order is preserved per name but not across names.
#[cfg(feature = "reqwest")]
impl TransportResponse for reqwest::blocking::Response {
    type Body = reqwest::blocking::Response;

    fn status_code(&self) -> Option<u16> {
        Some(reqwest::blocking::Response::status(self).as_u16())
    }

    fn header_pairs(&self) -> ResponseHeaders {
        reqwest::blocking::Response::headers(self)
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_owned(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect()
    }

    fn into_body(self) -> Self::Body {
        self
    }
}
