//! Blocking HTTP fetcher.
//!
//! Not a crawler, just the transport call for one page: send a GET, hand the
//! response to the normalizer. Timeouts and redirects are reqwest's job;
//! retries belong to whoever schedules the fetch.

use std::time::Duration;

use page::{FetchConfig, FetchedPage, LoadFailure, PendingPage, WebUrl};
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::HttpYamlConfig;

/// Errors from [`HttpFetcher::fetch`].
///
/// Both variants give the pending page back so the caller can requeue it.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The request never produced a response (DNS, connect, TLS, timeout).
    #[error("request to {} failed: {source}", .page.url())]
    Request {
        page: PendingPage,
        source: reqwest::Error,
    },

    /// A response arrived but could not be loaded.
    #[error(transparent)]
    Load(#[from] LoadFailure),
}

impl FetchError {
    pub fn into_page(self) -> PendingPage {
        match self {
            FetchError::Request { page, .. } => page,
            FetchError::Load(failure) => failure.into_page(),
        }
    }
}

/// A reqwest blocking client configured for page fetches.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::blocking::Client,
    retarget_on_redirect: bool,
}

impl HttpFetcher {
    pub fn new(cfg: &HttpYamlConfig) -> Result<Self, reqwest::Error> {
        let mut builder = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .redirect(reqwest::redirect::Policy::limited(cfg.max_redirects))
            .user_agent(cfg.user_agent.as_str());
        if !cfg.use_system_proxy {
            builder = builder.no_proxy();
        }
        let client = builder.build()?;
        Ok(Self {
            client,
            retarget_on_redirect: cfg.retarget_on_redirect,
        })
    }

    /// GET the page's URL and load the response.
    pub fn fetch(&self, page: PendingPage, cfg: &FetchConfig) -> Result<FetchedPage, FetchError> {
        let response = match self.client.get(page.url().as_str()).send() {
            Ok(response) => response,
            Err(source) => {
                warn!(url = %page.url(), error = %source, "request_failure");
                return Err(FetchError::Request { page, source });
            }
        };

        let mut page = page;
        if self.retarget_on_redirect {
            if let Some(final_url) = redirected_to(page.url(), response.url()) {
                debug!(from = %page.url(), to = %final_url, "retarget_after_redirect");
                page.retarget(final_url);
            }
        }

        Ok(page.load(response, cfg)?)
    }
}

/// The final URL, if the client ended up somewhere other than `requested`.
fn redirected_to(requested: &WebUrl, final_url: &reqwest::Url) -> Option<WebUrl> {
    // Compare parsed forms so "https://a.example" and "https://a.example/"
    // are not treated as a redirect.
    let same = reqwest::Url::parse(requested.as_str())
        .map(|parsed| &parsed == final_url)
        .unwrap_or(false);
    if same {
        None
    } else {
        WebUrl::new(final_url.as_str()).ok()
    }
}
