//! Umbrella crate for the crawl fetch-to-parse hand-off.
//!
//! Re-exports the page record and normalizer from the `page` crate and adds
//! the pieces a crawl worker wires around them: a [`PageParser`] seam for the
//! parse stage, pipeline helpers that run load and parse in order, a global
//! metrics observer, YAML configuration and (with `http-client`) a blocking
//! HTTP fetcher.

pub use page::{
    BufferedResponse, Charset, ConfigError, DEFAULT_TEXT_CHARSET, FetchConfig, FetchedPage,
    LoadError, LoadFailure, MediaType, MediaTypeError, PageError, ParseData, PendingPage,
    ResponseHeaders, StreamingResponse, TransportResponse, UnknownCharset, WebUrl, load,
};

pub mod config;
#[cfg(feature = "http-client")]
pub mod http;

pub use crate::config::{ConfigLoadError, FetchYamlConfig, HttpYamlConfig, PagefetchConfig};
#[cfg(feature = "http-client")]
pub use crate::http::{FetchError, HttpFetcher};

use std::error::Error as StdError;
use std::sync::{Arc, OnceLock, RwLock};
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::debug;

/// Error type parsers report through [`PageParser`].
pub type ParserError = Box<dyn StdError + Send + Sync + 'static>;

/// The parse stage, as seen from the pipeline.
///
/// Implementations read the page (bytes, content type, charset) and return
/// what they extracted. The pipeline attaches the result to the page.
/// Closures with the matching signature implement this trait.
pub trait PageParser: Send + Sync {
    fn parse(&self, page: &FetchedPage) -> Result<ParseData, ParserError>;
}

impl<F> PageParser for F
where
    F: Fn(&FetchedPage) -> Result<ParseData, ParserError> + Send + Sync,
{
    fn parse(&self, page: &FetchedPage) -> Result<ParseData, ParserError> {
        self(page)
    }
}

/// Errors that can occur while moving a page through the pipeline.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PipelineError {
    #[error("load failure: {0}")]
    Load(#[from] LoadFailure),

    #[error("parser failed on {url}: {source}")]
    Parse {
        url: String,
        #[source]
        source: ParserError,
    },

    #[error("page error: {0}")]
    Page(#[from] PageError),
}

/// Metrics observer for pipeline stages.
pub trait PipelineMetrics: Send + Sync {
    fn record_load(&self, latency: Duration, result: Result<(), &LoadError>);
    fn record_parse(&self, latency: Duration, result: Result<(), &PipelineError>);
}

/// Install or clear the global pipeline metrics recorder.
pub fn set_pipeline_metrics(recorder: Option<Arc<dyn PipelineMetrics>>) {
    let mut guard = metrics_lock()
        .write()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    *guard = recorder;
}

fn metrics_lock() -> &'static RwLock<Option<Arc<dyn PipelineMetrics>>> {
    static METRICS: OnceLock<RwLock<Option<Arc<dyn PipelineMetrics>>>> = OnceLock::new();
    METRICS.get_or_init(|| RwLock::new(None))
}

fn metrics_recorder() -> Option<Arc<dyn PipelineMetrics>> {
    let guard = metrics_lock()
        .read()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    guard.clone()
}

struct MetricsSpan {
    recorder: Arc<dyn PipelineMetrics>,
    start: Instant,
}

impl MetricsSpan {
    fn start() -> Option<Self> {
        metrics_recorder().map(|recorder| Self {
            recorder,
            start: Instant::now(),
        })
    }

    fn record_load(self, result: Result<(), &LoadError>) {
        self.recorder.record_load(self.start.elapsed(), result);
    }

    fn record_parse(self, result: Result<(), &PipelineError>) {
        self.recorder.record_parse(self.start.elapsed(), result);
    }
}

/// Load a response into a page, reporting to the metrics recorder.
pub fn load_page<R: TransportResponse>(
    pending: PendingPage,
    response: R,
    cfg: &FetchConfig,
) -> Result<FetchedPage, PipelineError> {
    let metrics = MetricsSpan::start();
    match load(pending, response, cfg) {
        Ok(page) => {
            if let Some(span) = metrics {
                span.record_load(Ok(()));
            }
            Ok(page)
        }
        Err(failure) => {
            if let Some(span) = metrics {
                span.record_load(Err(failure.error()));
            }
            Err(PipelineError::Load(failure))
        }
    }
}

/// Run `parser` over a loaded page and attach its output.
///
/// Fails with [`PipelineError::Page`] if the page already carries a parse
/// result; the parser is not invoked in that case.
pub fn parse_page(page: &FetchedPage, parser: &dyn PageParser) -> Result<(), PipelineError> {
    let metrics = MetricsSpan::start();
    let result = parse_inner(page, parser);
    if let Some(span) = metrics {
        span.record_parse(result.as_ref().map(|_| ()));
    }
    result
}

fn parse_inner(page: &FetchedPage, parser: &dyn PageParser) -> Result<(), PipelineError> {
    if page.is_parsed() {
        return Err(PageError::ParseResultAlreadyAttached(page.url().to_string()).into());
    }
    let data = parser.parse(page).map_err(|source| PipelineError::Parse {
        url: page.url().to_string(),
        source,
    })?;
    debug!(
        url = %page.url(),
        outgoing = data.outgoing_urls.len(),
        "parse_attached"
    );
    page.attach_parse_result(data)?;
    Ok(())
}

/// Load then parse: the full fetch-to-parse hand-off for one page.
pub fn process_page<R: TransportResponse>(
    pending: PendingPage,
    response: R,
    cfg: &FetchConfig,
    parser: &dyn PageParser,
) -> Result<FetchedPage, PipelineError> {
    let page = load_page(pending, response, cfg)?;
    parse_page(&page, parser)?;
    Ok(page)
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    #[derive(Default)]
    struct Recording {
        loads: Mutex<Vec<bool>>,
        parses: Mutex<Vec<bool>>,
    }

    impl PipelineMetrics for Recording {
        fn record_load(&self, _latency: Duration, result: Result<(), &LoadError>) {
            self.loads.lock().unwrap().push(result.is_ok());
        }

        fn record_parse(&self, _latency: Duration, result: Result<(), &PipelineError>) {
            self.parses.lock().unwrap().push(result.is_ok());
        }
    }

    fn title_parser(page: &FetchedPage) -> Result<ParseData, ParserError> {
        let text = std::str::from_utf8(page.content_bytes())?;
        Ok(ParseData {
            title: Some(text.to_string()),
            ..Default::default()
        })
    }

    // The recorder is process-global, so everything that inspects it runs in
    // this single test.
    #[test]
    fn metrics_see_load_and_parse_outcomes() {
        let recorder = Arc::new(Recording::default());
        set_pipeline_metrics(Some(recorder.clone()));

        let cfg = FetchConfig::default();
        let pending = PendingPage::parse("https://example.com/m", &cfg).unwrap();
        let response = BufferedResponse::new().with_body("Title");
        let page = process_page(pending, response, &cfg, &title_parser).unwrap();
        assert_eq!(
            page.parse_result().and_then(|d| d.title.as_deref()),
            Some("Title")
        );

        let second = parse_page(&page, &title_parser);
        assert!(matches!(
            second,
            Err(PipelineError::Page(PageError::ParseResultAlreadyAttached(_)))
        ));

        let pending = PendingPage::parse("https://example.com/bin", &cfg).unwrap();
        let response = BufferedResponse::new().with_body(vec![0xffu8, 0xfe]);
        let err = process_page(pending, response, &cfg, &title_parser).unwrap_err();
        assert!(matches!(err, PipelineError::Parse { ref url, .. } if url == "https://example.com/bin"));

        set_pipeline_metrics(None);

        assert_eq!(*recorder.loads.lock().unwrap(), vec![true, true]);
        assert_eq!(*recorder.parses.lock().unwrap(), vec![true, false, false]);
    }
}
