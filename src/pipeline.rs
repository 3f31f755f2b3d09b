//! One ingestion cycle: fetch → parse → detect → normalize → merge.
//!
//! Fetching and normalizing run concurrently per URL and touch no shared
//! state. Merging runs afterwards, sequentially, against the single
//! [`Store`]. Persisting the store is the caller's checkpoint
//! ([`save_store`]), so one cycle completes before the next begins.

use futures::stream::{self, StreamExt};
use std::path::Path;

use crate::feed::{normalize_document, FetchError, Fetcher, IngestError, XmlError};
use crate::storage::{Feed, Store};

/// What happened to one configured URL during phase one of a cycle.
#[derive(Debug)]
pub enum SourceOutcome {
    /// Fetched and normalized; ready to merge
    Normalized(Feed),
    /// The fetch collaborator failed
    FetchFailed(FetchError),
    /// The body was not well-formed XML
    ParseFailed(XmlError),
    /// Well-formed, but the root element is neither `rss` nor `feed`
    UnknownFormat(String),
}

/// Outcome for one URL, tagged with the URL it came from.
#[derive(Debug)]
pub struct SourceResult {
    pub url: String,
    pub outcome: SourceOutcome,
}

/// Counters for one completed cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// URLs attempted
    pub sources: usize,
    /// Normalized feeds merged into the store
    pub feeds_merged: usize,
    /// Feeds whose id was new to the store
    pub new_feeds: usize,
    pub articles_inserted: usize,
    pub articles_replaced: usize,
    pub fetch_failures: usize,
    pub parse_failures: usize,
    pub unknown_formats: usize,
}

impl CycleReport {
    /// URLs skipped this cycle for any reason.
    pub fn skipped(&self) -> usize {
        self.fetch_failures + self.parse_failures + self.unknown_formats
    }
}

/// Drives ingestion cycles over a [`Fetcher`].
pub struct Pipeline<F> {
    fetcher: F,
    concurrency: usize,
}

impl<F: Fetcher> Pipeline<F> {
    /// `concurrency` bounds simultaneous fetches; zero is treated as one.
    pub fn new(fetcher: F, concurrency: usize) -> Self {
        Self {
            fetcher,
            concurrency: concurrency.max(1),
        }
    }

    /// Run one full cycle over `urls`, merging results into `store`.
    ///
    /// Never fails as a whole: each URL's failure is logged, counted and
    /// isolated from every other URL.
    pub async fn run_cycle(&self, urls: &[String], store: &mut Store) -> CycleReport {
        let results = self.collect(urls).await;
        merge_results(results, store)
    }

    /// Phase one: fetch and normalize every URL, at most `concurrency` at a time.
    ///
    /// Results come back in `urls` order regardless of completion order.
    pub async fn collect(&self, urls: &[String]) -> Vec<SourceResult> {
        let mut results: Vec<(usize, SourceResult)> = stream::iter(urls.iter().enumerate())
            .map(|(index, url)| async move {
                let outcome = self.ingest_one(url).await;
                (
                    index,
                    SourceResult {
                        url: url.clone(),
                        outcome,
                    },
                )
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        results.sort_by_key(|(index, _)| *index);
        results.into_iter().map(|(_, result)| result).collect()
    }

    async fn ingest_one(&self, url: &str) -> SourceOutcome {
        tracing::debug!(url = %url, "Fetching feed");
        let body = match self.fetcher.fetch(url).await {
            Ok(body) => body,
            Err(e) => return SourceOutcome::FetchFailed(e),
        };

        ingest_document(&body, url)
    }
}

/// The pure part of phase one: parse, detect and normalize a fetched body.
pub fn ingest_document(bytes: &[u8], source_url: &str) -> SourceOutcome {
    match normalize_document(bytes, source_url) {
        Ok(feed) => SourceOutcome::Normalized(feed),
        Err(IngestError::Parse(e)) => SourceOutcome::ParseFailed(e),
        Err(IngestError::UnknownFormat(root)) => SourceOutcome::UnknownFormat(root),
    }
}

/// Phase two: merge every normalized feed into `store`, in order, and log skips.
pub fn merge_results(results: Vec<SourceResult>, store: &mut Store) -> CycleReport {
    let mut report = CycleReport {
        sources: results.len(),
        ..CycleReport::default()
    };

    for SourceResult { url, outcome } in results {
        match outcome {
            SourceOutcome::Normalized(feed) => {
                let feed_id = feed.id.clone();
                let merged = store.merge(feed);
                report.feeds_merged += 1;
                report.new_feeds += usize::from(merged.feed_inserted);
                report.articles_inserted += merged.inserted;
                report.articles_replaced += merged.replaced;
                tracing::debug!(
                    url = %url,
                    feed = %feed_id,
                    inserted = merged.inserted,
                    replaced = merged.replaced,
                    "Merged feed"
                );
            }
            SourceOutcome::FetchFailed(e) => {
                report.fetch_failures += 1;
                tracing::warn!(url = %url, error = %e, "Fetch failed, skipping feed this cycle");
            }
            SourceOutcome::ParseFailed(e) => {
                report.parse_failures += 1;
                tracing::warn!(url = %url, error = %e, "Malformed feed XML, skipping");
            }
            SourceOutcome::UnknownFormat(root) => {
                report.unknown_formats += 1;
                tracing::warn!(url = %url, root = %root, "Unknown feed type, skipping");
            }
        }
    }

    tracing::info!(
        sources = report.sources,
        merged = report.feeds_merged,
        new_feeds = report.new_feeds,
        inserted = report.articles_inserted,
        replaced = report.articles_replaced,
        skipped = report.skipped(),
        "Ingestion cycle complete"
    );
    report
}

/// Persist the store at the end of a cycle.
///
/// A failed save is logged and reported as `false` but never aborts the
/// process: the next cycle saves the full store again.
pub fn save_store(store: &Store, path: &Path) -> bool {
    match store.save(path) {
        Ok(()) => true,
        Err(e) => {
            tracing::error!(path = %path.display(), error = %e, "Failed to save store");
            false
        }
    }
}
