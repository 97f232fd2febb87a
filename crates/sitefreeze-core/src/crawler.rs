//! Bounded-concurrency page crawler.
//!
//! Fetches every sitemap URL from the preview server and writes each body
//! to its mapped file under the output root. A fixed pool of workers pulls
//! URLs from a shared atomic cursor, so no URL is fetched twice and the
//! number of in-flight requests never exceeds the pool size.
//!
//! Failure policy: recoverable failures (network errors, 5xx, 429) are
//! retried with capped exponential backoff; other client errors fail the
//! page immediately. A failed page never aborts the crawl; it is recorded
//! in the [`CrawlReport`] and the run degrades instead of dying.

use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use reqwest::{Client, StatusCode};
use tracing::{debug, instrument, warn};

use crate::error::{Error, Result};
use crate::sitemap::Sitemap;
use crate::urlpath::output_path;

/// Hard ceiling on the worker pool.
const MAX_POOL: usize = 8;

/// Floor on the worker pool.
const MIN_POOL: usize = 2;

/// First retry delay; doubles per attempt.
const BASE_BACKOFF: Duration = Duration::from_millis(250);

/// Ceiling on a single backoff delay.
const MAX_BACKOFF: Duration = Duration::from_secs(5);

/// Source of rendered page bodies, keyed by site-relative path.
///
/// The crawl logic is written against this trait so its scheduling
/// behavior can be tested without a server; [`HttpPageFetcher`] is the real
/// implementation.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetch the rendered body of one normalized URL path.
    async fn fetch(&self, path: &str) -> Result<Vec<u8>>;
}

/// Fetches pages from a preview server over HTTP.
pub struct HttpPageFetcher {
    client: Client,
    base_url: String,
}

impl HttpPageFetcher {
    /// Creates a fetcher for the server at `base_url`.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("sitefreeze/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(Error::Network)?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl PageFetcher for HttpPageFetcher {
    async fn fetch(&self, path: &str) -> Result<Vec<u8>> {
        let url = format!("{}{path}", self.base_url);
        let response = self.client.get(&url).send().await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(Error::NotFound(path.to_string()));
        }
        let response = response.error_for_status()?;
        Ok(response.bytes().await?.to_vec())
    }
}

/// Tuning knobs for one crawl.
#[derive(Debug, Clone)]
pub struct CrawlOptions {
    /// Requested worker count; `None` derives from available parallelism.
    /// The effective pool is always clamped to `2..=8`.
    pub concurrency: Option<usize>,
    /// Retry attempts after the first failure of each URL.
    pub retries: u32,
}

impl Default for CrawlOptions {
    fn default() -> Self {
        Self {
            concurrency: None,
            retries: 2,
        }
    }
}

impl CrawlOptions {
    /// The worker count actually used: the configured value (or available
    /// parallelism), clamped to `2..=8`.
    #[must_use]
    pub fn effective_pool_size(&self) -> usize {
        let requested = self.concurrency.unwrap_or_else(|| {
            std::thread::available_parallelism().map_or(MIN_POOL, usize::from)
        });
        requested.clamp(MIN_POOL, MAX_POOL)
    }
}

/// One page the crawl could not render.
#[derive(Debug, Clone)]
pub struct PageFailure {
    /// Normalized URL path of the failed page.
    pub path: String,
    /// Final error after retries were exhausted or skipped.
    pub error: String,
}

/// Outcome of a crawl over one sitemap.
#[derive(Debug, Default)]
pub struct CrawlReport {
    /// Pages fetched and written to the output tree.
    pub pages_written: usize,
    /// Pages that failed after their retry budget.
    pub failures: Vec<PageFailure>,
    /// Total fetch attempts across all pages and retries.
    pub attempts: usize,
}

impl CrawlReport {
    /// Whether every sitemap URL was rendered.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

struct CrawlState<'a> {
    urls: &'a [String],
    cursor: AtomicUsize,
    attempts: AtomicUsize,
    written: AtomicUsize,
    failures: Mutex<Vec<PageFailure>>,
}

/// Crawl every sitemap URL, writing bodies under `output_dir`.
///
/// `on_page` is invoked once per URL after its final outcome, with the path
/// and whether it succeeded; the CLI hangs its progress bar on it.
///
/// # Errors
///
/// Only output-tree I/O errors abort the crawl; fetch failures are
/// reported, not raised.
#[instrument(skip_all, fields(urls = sitemap.len()))]
pub async fn crawl<F>(
    fetcher: &dyn PageFetcher,
    sitemap: &Sitemap,
    output_dir: &Path,
    options: &CrawlOptions,
    on_page: F,
) -> Result<CrawlReport>
where
    F: Fn(&str, bool) + Sync,
{
    let pool = options.effective_pool_size();
    debug!(pool, retries = options.retries, "starting crawl");

    let state = CrawlState {
        urls: sitemap.urls(),
        cursor: AtomicUsize::new(0),
        attempts: AtomicUsize::new(0),
        written: AtomicUsize::new(0),
        failures: Mutex::new(Vec::new()),
    };

    let workers = (0..pool).map(|_| worker(fetcher, &state, output_dir, options, &on_page));
    for result in join_all(workers).await {
        result?;
    }

    let failures = state
        .failures
        .into_inner()
        .unwrap_or_else(std::sync::PoisonError::into_inner);
    Ok(CrawlReport {
        pages_written: state.written.into_inner(),
        failures,
        attempts: state.attempts.into_inner(),
    })
}

async fn worker<F>(
    fetcher: &dyn PageFetcher,
    state: &CrawlState<'_>,
    output_dir: &Path,
    options: &CrawlOptions,
    on_page: &F,
) -> Result<()>
where
    F: Fn(&str, bool) + Sync,
{
    loop {
        let index = state.cursor.fetch_add(1, Ordering::SeqCst);
        let Some(path) = state.urls.get(index) else {
            return Ok(());
        };

        match fetch_with_retry(fetcher, path, options.retries, &state.attempts).await {
            Ok(body) => {
                write_page(output_dir, path, &body).await?;
                state.written.fetch_add(1, Ordering::SeqCst);
                on_page(path, true);
            },
            Err(err) => {
                warn!(%path, error = %err, "page failed after retries");
                if let Ok(mut failures) = state.failures.lock() {
                    failures.push(PageFailure {
                        path: path.clone(),
                        error: err.to_string(),
                    });
                }
                on_page(path, false);
            },
        }
    }
}

async fn fetch_with_retry(
    fetcher: &dyn PageFetcher,
    path: &str,
    retries: u32,
    attempts: &AtomicUsize,
) -> Result<Vec<u8>> {
    let mut last_err = None;

    for attempt in 0..=retries {
        attempts.fetch_add(1, Ordering::SeqCst);
        match fetcher.fetch(path).await {
            Ok(body) => return Ok(body),
            Err(err) => {
                if !should_retry(&err) || attempt == retries {
                    return Err(err);
                }
                let delay = backoff_delay(attempt);
                debug!(%path, attempt, ?delay, error = %err, "retrying fetch");
                last_err = Some(err);
                tokio::time::sleep(delay).await;
            },
        }
    }
    // Loop always returns; kept for totality.
    Err(last_err.unwrap_or_else(|| Error::Timeout(format!("fetch of '{path}' never ran"))))
}

/// Retry transient failures only: network-level errors, 5xx, and 429.
/// Other client errors (404 above all) are definitive answers.
fn should_retry(err: &Error) -> bool {
    if err.is_recoverable() {
        return true;
    }
    match err {
        Error::Network(e) => e.status().is_some_and(|status| {
            status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS
        }),
        _ => false,
    }
}

fn backoff_delay(attempt: u32) -> Duration {
    let multiplier = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
    BASE_BACKOFF.saturating_mul(multiplier).min(MAX_BACKOFF)
}

async fn write_page(output_dir: &Path, path: &str, body: &[u8]) -> Result<()> {
    let file: PathBuf = output_dir.join(output_path(path));
    if let Some(parent) = file.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(&file, body).await?;
    Ok(())
}
