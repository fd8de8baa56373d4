use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use log::{debug, warn};
use serde::Serialize;
use tokio::sync::{Semaphore, mpsc};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::Instant;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::ReceiverStream;

use crate::error::ScrapeError;
use crate::extract::{ListingSnippet, PAGE_SIZE, parse_list_page};
use crate::models::{RawFragment, SearchUnit};
use crate::transport::Transport;

pub const SEARCH_URL: &str = "https://www.linkedin.com/jobs/search/";

/// Exponential backoff with jitter for transient failures. Attempt n waits
/// base * factor^(n-1), stretched by up to 25% so retries don't align.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base: Duration,
    pub factor: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_attempts: 3, base: Duration::from_secs(1), factor: 2 }
    }
}

impl RetryPolicy {
    fn delay(&self, attempt: u32) -> Duration {
        use rand::Rng;
        let exp = self
            .base
            .saturating_mul(self.factor.saturating_pow(attempt.saturating_sub(1)));
        exp.mul_f64(1.0 + rand::thread_rng().gen_range(0.0..0.25))
    }
}

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Units fetching list pages at once.
    pub unit_concurrency: usize,
    /// Detail-page fetches in flight across all units.
    pub detail_concurrency: usize,
    pub retry: RetryPolicy,
    /// Fragment channel depth. A slow consumer stalls fetching, not memory.
    pub channel_capacity: usize,
    /// Optional wall-clock budget per unit. A unit that runs past it stops
    /// with what it has.
    pub unit_deadline: Option<Duration>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            unit_concurrency: 6,
            detail_concurrency: 12,
            retry: RetryPolicy::default(),
            channel_capacity: 64,
            unit_deadline: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum UnitStatus {
    Success,
    /// Something went wrong after fragments had already been emitted.
    Partial,
    Failed,
}

/// Per-unit accounting, reported once the unit finishes.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitReport {
    pub title: String,
    pub location: String,
    pub geo_id: String,
    pub ambiguous_location: bool,
    pub status: UnitStatus,
    pub pages_fetched: u32,
    pub fragments_emitted: usize,
    pub listings_dropped: usize,
    pub error: Option<String>,
}

impl UnitReport {
    fn new(unit: &SearchUnit) -> Self {
        Self {
            title: unit.title.clone(),
            location: unit.location.text.clone(),
            geo_id: unit.location.geo_id.clone(),
            ambiguous_location: unit.location.ambiguous,
            status: UnitStatus::Success,
            pages_fetched: 0,
            fragments_emitted: 0,
            listings_dropped: 0,
            error: None,
        }
    }

    fn finish(&mut self, error: Option<String>) {
        self.status = match (&error, self.fragments_emitted) {
            (None, _) => UnitStatus::Success,
            (Some(_), 0) => UnitStatus::Failed,
            (Some(_), _) => UnitStatus::Partial,
        };
        self.error = error;
    }
}

/// Drives a plan's units against the transport: a bounded pool of units, each
/// paginating sequentially, fanning out detail fetches per page through a
/// second bounded pool. Fragments flow out through a backpressured channel
/// while units are still running.
pub struct FetchScheduler {
    transport: Arc<dyn Transport>,
    config: SchedulerConfig,
    cancel: Arc<AtomicBool>,
}

impl FetchScheduler {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self::with_config(transport, SchedulerConfig::default())
    }

    pub fn with_config(transport: Arc<dyn Transport>, config: SchedulerConfig) -> Self {
        Self { transport, config, cancel: Arc::new(AtomicBool::new(false)) }
    }

    /// Shared cancellation flag. Setting it lets in-flight fetches finish but
    /// starts nothing new; already-emitted fragments stay valid.
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        self.cancel.clone()
    }

    /// Starts all units and returns the fragment stream plus a handle that
    /// resolves to the per-unit reports once every unit has finished.
    pub fn stream(
        &self,
        units: Vec<SearchUnit>,
    ) -> (ReceiverStream<RawFragment>, JoinHandle<Vec<UnitReport>>) {
        let (tx, rx) = mpsc::channel(self.config.channel_capacity);
        let transport = self.transport.clone();
        let config = self.config.clone();
        let cancel = self.cancel.clone();

        let handle = tokio::spawn(async move {
            let unit_pool = Arc::new(Semaphore::new(config.unit_concurrency));
            let detail_pool = Arc::new(Semaphore::new(config.detail_concurrency));

            let mut tasks = JoinSet::new();
            for unit in units {
                let unit_pool = unit_pool.clone();
                let detail_pool = detail_pool.clone();
                let transport = transport.clone();
                let config = config.clone();
                let cancel = cancel.clone();
                let tx = tx.clone();
                tasks.spawn(async move {
                    let Ok(_permit) = unit_pool.acquire_owned().await else {
                        let mut report = UnitReport::new(&unit);
                        report.finish(Some(ScrapeError::Cancelled.to_string()));
                        return report;
                    };
                    run_unit(unit, transport, detail_pool, config, cancel, tx).await
                });
            }
            drop(tx);

            let mut reports = Vec::new();
            while let Some(joined) = tasks.join_next().await {
                match joined {
                    Ok(report) => reports.push(report),
                    Err(e) => warn!("unit task panicked: {e}"),
                }
            }
            reports
        });

        (ReceiverStream::new(rx), handle)
    }

    /// Buffered variant: drains the stream to completion.
    pub async fn run_all(
        &self,
        units: Vec<SearchUnit>,
    ) -> (Vec<RawFragment>, Vec<UnitReport>) {
        let (mut stream, handle) = self.stream(units);
        let mut fragments = Vec::new();
        while let Some(fragment) = stream.next().await {
            fragments.push(fragment);
        }
        let reports = handle.await.unwrap_or_default();
        (fragments, reports)
    }
}

fn search_params(unit: &SearchUnit, page: u32) -> Vec<(String, String)> {
    let mut params = vec![
        ("keywords".to_string(), unit.title.clone()),
        ("location".to_string(), unit.location.text.clone()),
        ("geoId".to_string(), unit.location.geo_id.clone()),
        ("start".to_string(), (page as usize * PAGE_SIZE).to_string()),
    ];
    params.extend(unit.filters.to_params());
    params
}

/// One unit, start to finish: sequential pages, each page's detail fetches
/// fanned out and joined before the next page begins.
async fn run_unit(
    unit: SearchUnit,
    transport: Arc<dyn Transport>,
    detail_pool: Arc<Semaphore>,
    config: SchedulerConfig,
    cancel: Arc<AtomicBool>,
    tx: mpsc::Sender<RawFragment>,
) -> UnitReport {
    let mut report = UnitReport::new(&unit);
    let deadline = config.unit_deadline.map(|d| Instant::now() + d);
    let mut seen: HashSet<String> = HashSet::new();
    let mut error: Option<String> = None;

    'pages: for page in 0..unit.page_cap {
        if cancel.load(Ordering::Relaxed) {
            error = Some(ScrapeError::Cancelled.to_string());
            break;
        }
        if deadline.is_some_and(|d| Instant::now() >= d) {
            error = Some(format!(
                "unit deadline of {:?} exceeded",
                config.unit_deadline.unwrap_or_default()
            ));
            break;
        }

        let params = search_params(&unit, page);
        let body = match fetch_with_retry(&*transport, SEARCH_URL, &params, &config.retry, &cancel)
            .await
        {
            Ok(resp) => resp.body,
            Err(e) => {
                let failure = ScrapeError::UnitFailed(format!(
                    "{:?} in {:?}, page {}: {}",
                    unit.title, unit.location.text, page, e
                ));
                warn!("{failure}");
                error = Some(failure.to_string());
                break;
            }
        };
        report.pages_fetched += 1;

        // End-of-results is judged on the raw page size; cross-page repeats
        // are filtered out afterwards and must not fake a short page.
        let page_listings = parse_list_page(&body);
        let short_page = page_listings.len() < PAGE_SIZE;
        let mut snippets: Vec<ListingSnippet> = page_listings
            .into_iter()
            .filter(|s| seen.insert(s.id.clone()))
            .collect();

        let mut hit_cap = false;
        if let Some(max) = unit.max_items {
            let remaining = max.saturating_sub(report.fragments_emitted);
            if snippets.len() >= remaining {
                snippets.truncate(remaining);
                hit_cap = true;
            }
        }
        debug!(
            "{:?} in {:?}: page {} carried {} new listings",
            unit.title,
            unit.location.text,
            page,
            snippets.len()
        );

        let mut details = JoinSet::new();
        for snippet in snippets {
            let detail_pool = detail_pool.clone();
            let transport = transport.clone();
            let retry = config.retry.clone();
            let cancel = cancel.clone();
            details.spawn(async move {
                fetch_detail(snippet, transport, detail_pool, retry, cancel).await
            });
        }
        while let Some(joined) = details.join_next().await {
            match joined {
                Ok(Some(fragment)) => {
                    if tx.send(fragment).await.is_err() {
                        // Consumer went away; nothing left to produce for.
                        error = Some(ScrapeError::Cancelled.to_string());
                        break 'pages;
                    }
                    report.fragments_emitted += 1;
                }
                Ok(None) => report.listings_dropped += 1,
                Err(e) => {
                    warn!("detail task panicked: {e}");
                    report.listings_dropped += 1;
                }
            }
        }

        if hit_cap || short_page {
            break;
        }
    }

    report.finish(error);
    report
}

/// Resolves one listing into a fragment. A permanently failing or cancelled
/// detail fetch degrades to a summary-only fragment; exhausting retries on
/// transient failures drops the listing instead, since the summary may be as
/// stale as the detail page was unreachable.
async fn fetch_detail(
    snippet: ListingSnippet,
    transport: Arc<dyn Transport>,
    detail_pool: Arc<Semaphore>,
    retry: RetryPolicy,
    cancel: Arc<AtomicBool>,
) -> Option<RawFragment> {
    let mut fragment = RawFragment {
        job_id: snippet.id,
        url: snippet.url,
        summary: snippet.summary,
        detail: None,
    };

    if cancel.load(Ordering::Relaxed) {
        return Some(fragment);
    }
    let Ok(_permit) = detail_pool.acquire_owned().await else {
        return Some(fragment);
    };
    if cancel.load(Ordering::Relaxed) {
        return Some(fragment);
    }

    match fetch_with_retry(&*transport, &fragment.url, &[], &retry, &cancel).await {
        Ok(resp) => {
            fragment.detail = Some(resp.body);
            Some(fragment)
        }
        Err(e) if e.is_transient() => {
            warn!("dropping listing {}: {}", fragment.job_id, e);
            None
        }
        Err(e) => {
            debug!("detail unavailable for {}, keeping summary: {}", fragment.job_id, e);
            Some(fragment)
        }
    }
}

async fn fetch_with_retry(
    transport: &dyn Transport,
    url: &str,
    params: &[(String, String)],
    retry: &RetryPolicy,
    cancel: &AtomicBool,
) -> Result<crate::transport::Response, ScrapeError> {
    let mut attempt = 1;
    loop {
        if cancel.load(Ordering::Relaxed) {
            return Err(ScrapeError::Cancelled);
        }
        match transport.fetch(url, params).await {
            Ok(resp) => return Ok(resp),
            Err(e) if e.is_transient() && attempt < retry.max_attempts => {
                let delay = retry.delay(attempt);
                warn!("attempt {attempt} for {url} failed ({e}), retrying in {delay:?}");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
