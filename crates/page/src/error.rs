//! Error types produced by the page crate.
//!
//! Loading a page can fail in exactly one place that matters to a crawl
//! orchestrator: while the body is being drained from the transport. Metadata
//! problems (a mangled `Content-Type`, an unknown charset label) normally
//! degrade a single field to "unset" instead of failing, unless
//! [`FetchConfig::strict_charset`](crate::FetchConfig::strict_charset) asks for
//! the stricter behavior.
//!
//! # Error Categories
//!
//! | Error | Category | Description |
//! |-------|----------|-------------|
//! | [`Transport`](LoadError::Transport) | I/O | Reading the body failed before end-of-stream |
//! | [`BodyTooLarge`](LoadError::BodyTooLarge) | Policy | Body exceeded `max_body_bytes` |
//! | [`MalformedContentType`](LoadError::MalformedContentType) | Metadata | Strict mode only |
//! | [`UnsupportedCharset`](LoadError::UnsupportedCharset) | Metadata | Strict mode only |
//! | [`InvalidConfig`](LoadError::InvalidConfig) | Configuration | `FetchConfig::validate` failed |
//! | [`EmptyUrl`](PageError::EmptyUrl) | Construction | URL was blank after sanitization |
//! | [`ParseResultAlreadyAttached`](PageError::ParseResultAlreadyAttached) | Misuse | Parse slot written twice |
//!
//! A failed load hands the untouched [`PendingPage`] back inside
//! [`LoadFailure`], so the caller can retry or drop it without rebuilding
//! anything.
//!
//! ```rust
//! use page::{BufferedResponse, FetchConfig, LoadError, PendingPage};
//!
//! let cfg = FetchConfig {
//!     max_body_bytes: Some(4),
//!     ..Default::default()
//! };
//! let pending = PendingPage::parse("https://example.com/big", &cfg).unwrap();
//! let response = BufferedResponse::new().with_body(&b"too many bytes"[..]);
//!
//! match pending.load(response, &cfg) {
//!     Ok(_) => unreachable!(),
//!     Err(failure) => {
//!         assert!(matches!(failure.error(), LoadError::BodyTooLarge { limit: 4 }));
//!         assert_eq!(failure.page().url().as_str(), "https://example.com/big");
//!     }
//! }
//! ```
use std::io;

use thiserror::Error;

use crate::charset::MediaTypeError;
use crate::config::ConfigError;
use crate::page::PendingPage;

/// Reasons a [`PendingPage`] could not be turned into a
/// [`FetchedPage`](crate::FetchedPage).
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum LoadError {
    /// The transport reported an I/O error while the body was being drained.
    ///
    /// The underlying error is kept intact so the orchestrator can inspect
    /// its kind (timeouts, resets) when deciding on a retry.
    #[error("transport failure while reading response body: {0}")]
    Transport(#[from] io::Error),

    /// The body was longer than the configured limit.
    #[error("response body exceeds limit of {limit} bytes")]
    BodyTooLarge {
        /// The configured `max_body_bytes`.
        limit: usize,
    },

    /// The `Content-Type` value could not be parsed. Strict mode only.
    #[error("malformed content-type {value:?}: {reason}")]
    MalformedContentType {
        /// Raw header value as received.
        value: String,
        /// What the parser tripped over.
        #[source]
        reason: MediaTypeError,
    },

    /// The declared charset label is not one we recognize. Strict mode only.
    #[error("unsupported charset {0:?}")]
    UnsupportedCharset(String),

    /// The [`FetchConfig`](crate::FetchConfig) failed validation; nothing
    /// was read.
    #[error("invalid fetch config: {0}")]
    InvalidConfig(#[from] ConfigError),
}

impl LoadError {
    /// True when the failure came from the transport rather than from policy
    /// or metadata checks.
    pub fn is_transport(&self) -> bool {
        matches!(self, LoadError::Transport(_))
    }
}

/// Errors raised by page construction and the parse-result slot.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum PageError {
    /// The URL was empty once control characters and whitespace were removed.
    #[error("page url is empty")]
    EmptyUrl,

    /// A parse result was attached to a page that already had one.
    #[error("parse result already attached to {0}")]
    ParseResultAlreadyAttached(String),
}

/// A failed load, carrying the page back in its pre-fetch state.
#[derive(Error, Debug)]
#[error("failed to load {}: {}", .page.url(), .error)]
pub struct LoadFailure {
    pub(crate) page: PendingPage,
    #[source]
    pub(crate) error: LoadError,
}

impl LoadFailure {
    /// The page that was being loaded. It holds no content.
    pub fn page(&self) -> &PendingPage {
        &self.page
    }

    pub fn error(&self) -> &LoadError {
        &self.error
    }

    /// Splits the failure into the pending page and the cause.
    pub fn into_parts(self) -> (PendingPage, LoadError) {
        (self.page, self.error)
    }

    pub fn into_page(self) -> PendingPage {
        self.page
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::WebUrl;

    #[test]
    fn transport_errors_convert_from_io() {
        let err: LoadError = io::Error::new(io::ErrorKind::ConnectionReset, "reset").into();
        assert!(err.is_transport());
        assert!(err.to_string().contains("reset"));
        assert!(!LoadError::BodyTooLarge { limit: 1 }.is_transport());
    }

    #[test]
    fn load_failure_display_names_the_url() {
        let Ok(url) = WebUrl::new("https://example.com/a") else {
            panic!("valid url rejected");
        };
        let failure = LoadFailure {
            page: PendingPage::new(url),
            error: LoadError::UnsupportedCharset("x-klingon".into()),
        };
        let rendered = failure.to_string();
        assert!(rendered.contains("https://example.com/a"));
        assert!(rendered.contains("x-klingon"));

        let source = std::error::Error::source(&failure).map(ToString::to_string);
        assert_eq!(source.as_deref(), Some("unsupported charset \"x-klingon\""));
    }
}
