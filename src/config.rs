//! YAML configuration file support.
//!
//! One file configures the normalizer and, when the `http-client` feature is
//! on, the HTTP fetcher. Environment variables prefixed with `PAGEFETCH_`
//! override file values so deployments can tweak limits without editing it.
//!
//! ## Example YAML Configuration
//!
//! ```yaml
//! version: "1.0"
//! name: "news-crawler"
//!
//! fetch:
//!   default_text_charset: "ISO-8859-1"
//!   strict_charset: false
//!   max_body_bytes: 10485760
//!   strip_control_chars: true
//!   page_id_namespace: "6ba7b811-9dad-11d1-80b4-00c04fd430c8"
//!
//! http:
//!   timeout_secs: 30
//!   user_agent: "pagefetch/0.1"
//!   max_redirects: 5
//!   retarget_on_redirect: true
//!   use_system_proxy: true
//! ```
//!
//! ## Environment overrides
//!
//! | Variable | Field |
//! |----------|-------|
//! | `PAGEFETCH_MAX_BODY_BYTES` | `fetch.max_body_bytes` |
//! | `PAGEFETCH_DEFAULT_TEXT_CHARSET` | `fetch.default_text_charset` (`none` disables) |
//! | `PAGEFETCH_STRICT_CHARSET` | `fetch.strict_charset` |
//! | `PAGEFETCH_TIMEOUT_SECS` | `http.timeout_secs` |
//! | `PAGEFETCH_USER_AGENT` | `http.user_agent` |

use std::fs;
use std::path::Path;

use page::{Charset, DEFAULT_TEXT_CHARSET, FetchConfig};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Errors that can occur when loading YAML configuration files
#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("unsupported config version: {0}")]
    UnsupportedVersion(String),

    #[error("invalid value for {var}: {value:?}")]
    InvalidOverride { var: String, value: String },
}

/// Top-level configuration file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct PagefetchConfig {
    /// Configuration format version
    pub version: String,

    #[serde(default)]
    pub name: Option<String>,

    /// Response normalizer settings
    #[serde(default)]
    pub fetch: FetchYamlConfig,

    /// HTTP fetcher settings; ignored without the `http-client` feature
    #[serde(default)]
    pub http: HttpYamlConfig,
}

impl PagefetchConfig {
    /// Load a YAML configuration file from the given path
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigLoadError> {
        let content = fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse YAML configuration from a string
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigLoadError> {
        let config: PagefetchConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `PAGEFETCH_*` overrides from the process environment.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigLoadError> {
        self.apply_overrides(|var| std::env::var(var).ok())
    }

    fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigLoadError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup("PAGEFETCH_MAX_BODY_BYTES") {
            self.fetch.max_body_bytes = Some(parse_override("PAGEFETCH_MAX_BODY_BYTES", &value)?);
        }
        if let Some(value) = lookup("PAGEFETCH_DEFAULT_TEXT_CHARSET") {
            self.fetch.default_text_charset = if value.trim().eq_ignore_ascii_case("none") {
                None
            } else {
                Some(parse_override("PAGEFETCH_DEFAULT_TEXT_CHARSET", &value)?)
            };
        }
        if let Some(value) = lookup("PAGEFETCH_STRICT_CHARSET") {
            self.fetch.strict_charset = parse_override("PAGEFETCH_STRICT_CHARSET", &value)?;
        }
        if let Some(value) = lookup("PAGEFETCH_TIMEOUT_SECS") {
            self.http.timeout_secs = parse_override("PAGEFETCH_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = lookup("PAGEFETCH_USER_AGENT") {
            self.http.user_agent = value;
        }
        self.validate()
    }

    /// Validate the configuration
    fn validate(&self) -> Result<(), ConfigLoadError> {
        match self.version.as_str() {
            "1.0" | "1" => Ok(()),
            v => Err(ConfigLoadError::UnsupportedVersion(v.to_string())),
        }?;

        self.fetch.validate()?;
        self.http.validate()?;
        Ok(())
    }

    /// Builds the normalizer configuration.
    pub fn fetch_config(&self) -> Result<FetchConfig, ConfigLoadError> {
        self.fetch.to_fetch_config()
    }
}

impl Default for PagefetchConfig {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            name: None,
            fetch: FetchYamlConfig::default(),
            http: HttpYamlConfig::default(),
        }
    }
}

/// Normalizer section of the YAML file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchYamlConfig {
    #[serde(default = "default_version")]
    pub version: u32,

    #[serde(default = "default_text_charset")]
    pub default_text_charset: Option<Charset>,

    #[serde(default)]
    pub strict_charset: bool,

    #[serde(default)]
    pub max_body_bytes: Option<usize>,

    #[serde(default = "true_value")]
    pub strip_control_chars: bool,

    #[serde(default = "default_page_id_namespace")]
    pub page_id_namespace: String,
}

impl FetchYamlConfig {
    fn validate(&self) -> Result<(), ConfigLoadError> {
        self.to_fetch_config().map(|_| ())
    }

    fn to_fetch_config(&self) -> Result<FetchConfig, ConfigLoadError> {
        let page_id_namespace = Uuid::parse_str(&self.page_id_namespace).map_err(|err| {
            ConfigLoadError::Validation(format!("fetch.page_id_namespace: {err}"))
        })?;
        let cfg = FetchConfig {
            version: self.version,
            default_text_charset: self.default_text_charset,
            strict_charset: self.strict_charset,
            max_body_bytes: self.max_body_bytes,
            strip_control_chars: self.strip_control_chars,
            page_id_namespace,
        };
        cfg.validate()
            .map_err(|err| ConfigLoadError::Validation(format!("fetch: {err}")))?;
        Ok(cfg)
    }
}

impl Default for FetchYamlConfig {
    fn default() -> Self {
        Self {
            version: 1,
            default_text_charset: default_text_charset(),
            strict_charset: false,
            max_body_bytes: Some(10 * 1024 * 1024), // 10MB
            strip_control_chars: true,
            page_id_namespace: default_page_id_namespace(),
        }
    }
}

/// HTTP fetcher section of the YAML file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpYamlConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,

    /// Point the page at the final URL when the client followed redirects.
    #[serde(default = "true_value")]
    pub retarget_on_redirect: bool,

    /// Honor `HTTP_PROXY`/`HTTPS_PROXY`/`NO_PROXY` from the environment.
    #[serde(default = "true_value")]
    pub use_system_proxy: bool,
}

impl HttpYamlConfig {
    fn validate(&self) -> Result<(), ConfigLoadError> {
        if self.timeout_secs == 0 {
            return Err(ConfigLoadError::Validation(
                "http.timeout_secs must be >= 1".to_string(),
            ));
        }
        if self.user_agent.trim().is_empty() {
            return Err(ConfigLoadError::Validation(
                "http.user_agent must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for HttpYamlConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            user_agent: default_user_agent(),
            max_redirects: default_max_redirects(),
            retarget_on_redirect: true,
            use_system_proxy: true,
        }
    }
}

fn parse_override<T: std::str::FromStr>(var: &str, value: &str) -> Result<T, ConfigLoadError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigLoadError::InvalidOverride {
            var: var.to_string(),
            value: value.to_string(),
        })
}

fn default_version() -> u32 {
    1
}
fn default_text_charset() -> Option<Charset> {
    Some(DEFAULT_TEXT_CHARSET)
}
fn default_page_id_namespace() -> String {
    Uuid::NAMESPACE_URL.to_string()
}
fn true_value() -> bool {
    true
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_user_agent() -> String {
    concat!("pagefetch/", env!("CARGO_PKG_VERSION")).to_string()
}
fn default_max_redirects() -> usize {
    5
}
