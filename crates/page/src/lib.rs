//! Fetched-page record and response normalizer.
//!
//! This is where a crawl's fetch stage hands off to its parse stage. A
//! transport response (headers plus a body stream) goes in; a
//! [`FetchedPage`] comes out whose metadata means the same thing no matter
//! which HTTP client produced it.
//!
//! ## What we do here
//!
//! - **Record the transport metadata verbatim** - `Content-Type`,
//!   `Content-Encoding`, status and the full ordered header list.
//! - **Resolve the charset** - explicit `charset` parameter first, then the
//!   configured default for `text/*`, otherwise nothing. Never a silent guess.
//! - **Drain the body** - all of it, into memory, or fail without keeping a
//!   partial read. No decompression.
//! - **Hold the parse result** - a write-once slot the parse stage fills.
//!
//! ## Main entry point
//!
//! Call [`load`] (or [`PendingPage::load`]) with a [`PendingPage`], anything
//! implementing [`TransportResponse`] and a [`FetchConfig`].
//!
//! ## Example
//!
//! ```
//! use page::{BufferedResponse, FetchConfig, PendingPage};
//!
//! let cfg = FetchConfig::default();
//! let pending = PendingPage::parse("https://example.com/", &cfg).unwrap();
//! let response = BufferedResponse::new()
//!     .with_status(200)
//!     .with_header("Content-Type", "text/html; charset=UTF-8")
//!     .with_body("<html></html>");
//!
//! let page = pending.load(response, &cfg).unwrap();
//!
//! assert_eq!(page.content_type(), Some("text/html; charset=UTF-8"));
//! assert_eq!(page.content_charset().map(|c| c.name()), Some("UTF-8"));
//! assert_eq!(page.content_bytes(), b"<html></html>");
//! assert_eq!(page.content_encoding(), None);
//! ```
use std::sync::OnceLock;
use std::time::Instant;

use tracing::{info, warn, Level};

mod body;
mod charset;
mod config;
mod error;
mod page;
mod transport;
mod types;

pub use crate::charset::{Charset, MediaType, MediaTypeError, UnknownCharset};
pub use crate::config::{ConfigError, FetchConfig, DEFAULT_TEXT_CHARSET};
pub use crate::error::{LoadError, LoadFailure, PageError};
pub use crate::page::{FetchedPage, PendingPage};
pub use crate::transport::{BufferedResponse, StreamingResponse, TransportResponse};
pub use crate::types::{ParseData, ResponseHeaders, WebUrl};
pub use encoding_rs;

/// Loads a transport response into a page.
///
/// On success every transport field of the returned page is set
/// consistently. On failure the [`LoadFailure`] returns `page` untouched; a
/// partially read body is discarded. Nothing is retried here.
pub fn load<R: TransportResponse>(
    page: PendingPage,
    response: R,
    cfg: &FetchConfig,
) -> Result<FetchedPage, LoadFailure> {
    let start = Instant::now();
    let span = tracing::span!(Level::INFO, "page.load", url = %page.url());
    let _guard = span.enter();

    match load_inner(page.url().clone(), response, cfg) {
        Ok(fetched) => {
            let elapsed_micros = start.elapsed().as_micros();
            info!(
                status = ?fetched.status(),
                content_type = ?fetched.content_type(),
                content_encoding = ?fetched.content_encoding(),
                charset = ?fetched.content_charset().map(|c| c.name()),
                body_len = fetched.content_bytes().len(),
                header_count = fetched.response_headers().len(),
                elapsed_micros,
                "load_success"
            );
            Ok(fetched)
        }
        Err(error) => {
            let elapsed_micros = start.elapsed().as_micros();
            warn!(error = %error, elapsed_micros, "load_failure");
            Err(LoadFailure { page, error })
        }
    }
}

/// Normalizer steps. Builds the page only after every fallible step passed.
fn load_inner<R: TransportResponse>(
    url: WebUrl,
    response: R,
    cfg: &FetchConfig,
) -> Result<FetchedPage, LoadError> {
    cfg.validate()?;

    let status = response.status_code();
    let response_headers = response.header_pairs();
    let content_type = response.content_type(&response_headers);
    let content_encoding = response.content_encoding(&response_headers);

    // Strict mode may reject the metadata; do that before touching the body.
    let content_charset = charset::resolve_charset(content_type.as_deref(), cfg)?;

    let size_hint = body::content_length_hint(response_headers.get("content-length"));
    let content_bytes = body::drain_body(response.into_body(), size_hint, cfg.max_body_bytes)?;

    Ok(FetchedPage {
        url,
        status,
        content_bytes,
        content_type,
        content_encoding,
        content_charset,
        response_headers,
        parse_result: OnceLock::new(),
    })
}
