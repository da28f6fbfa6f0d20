//! Configuration for the response normalizer.
//!
//! [`FetchConfig`] decides the few points where loading a page involves
//! policy rather than bookkeeping: which charset to assume for text bodies
//! that do not declare one, whether broken metadata is fatal, and how large a
//! body may grow before the load is refused. It is cheap to clone and
//! serializable so it can live inside larger configuration files.
//!
//! ```rust
//! use page::FetchConfig;
//!
//! let config = FetchConfig::default();
//! config.validate().expect("defaults are valid");
//! assert_eq!(config.default_text_charset.map(|c| c.name()), Some("ISO-8859-1"));
//! ```
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::charset::Charset;

/// Charset assumed for `text/*` bodies that carry no `charset` parameter.
///
/// This is the historical HTTP/1.1 default (RFC 2616 §3.7.1).
pub const DEFAULT_TEXT_CHARSET: Charset = Charset::ISO_8859_1;

/// Runtime configuration for [`load`](crate::load).
///
/// # Serialization
///
/// ```json
/// {
///   "version": 1,
///   "default_text_charset": "ISO-8859-1",
///   "strict_charset": false,
///   "max_body_bytes": 10485760,
///   "strip_control_chars": true,
///   "page_id_namespace": "6ba7b811-9dad-11d1-80b4-00c04fd430c8"
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Version of the normalizer configuration.
    ///
    /// Default: `1`
    pub version: u32,

    /// Charset applied to `text/*` responses without an explicit charset.
    ///
    /// `None` disables the fallback, so such pages end up with no charset.
    /// Deserializes from any label [`Charset::from_label`] accepts; unknown
    /// labels are rejected when the config is read.
    ///
    /// Default: `Some(ISO-8859-1)`
    pub default_text_charset: Option<Charset>,

    /// Fail the load on a malformed `Content-Type` or an unknown charset.
    ///
    /// When `false` these problems only leave
    /// [`FetchedPage::content_charset`](crate::FetchedPage::content_charset)
    /// unset, since the body itself is still usable.
    ///
    /// Default: `false`
    pub strict_charset: bool,

    /// Upper bound on the drained body, in bytes.
    ///
    /// Default: `None` (unlimited)
    pub max_body_bytes: Option<usize>,

    /// Strip ASCII control characters from URLs handed to
    /// [`PendingPage::parse`](crate::PendingPage::parse).
    ///
    /// Default: `true`
    pub strip_control_chars: bool,

    /// Namespace for [`WebUrl::page_id`](crate::WebUrl::page_id).
    ///
    /// Default: [`Uuid::NAMESPACE_URL`]
    pub page_id_namespace: Uuid,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            version: 1,
            default_text_charset: Some(DEFAULT_TEXT_CHARSET),
            strict_charset: false,
            max_body_bytes: None,
            strip_control_chars: true,
            page_id_namespace: Uuid::NAMESPACE_URL,
        }
    }
}

/// Problems found by [`FetchConfig::validate`].
///
/// These are start-up errors; a service should refuse to run with them.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("config version must be >= 1")]
    InvalidVersion,

    /// A zero limit would reject every non-empty body.
    #[error("max_body_bytes must be greater than zero")]
    ZeroBodyLimit,
}

impl FetchConfig {
    /// Checks the configuration for values that can never work.
    ///
    /// ```rust
    /// use page::{ConfigError, FetchConfig};
    ///
    /// let cfg = FetchConfig {
    ///     max_body_bytes: Some(0),
    ///     ..Default::default()
    /// };
    /// assert_eq!(cfg.validate(), Err(ConfigError::ZeroBodyLimit));
    /// ```
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version == 0 {
            return Err(ConfigError::InvalidVersion);
        }
        if self.max_body_bytes == Some(0) {
            return Err(ConfigError::ZeroBodyLimit);
        }
        Ok(())
    }
}
