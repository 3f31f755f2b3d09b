//! Feed ingestion: fetching, XML parsing, format detection and normalization.
//!
//! - [`xml`] - quick-xml reader producing an owned element tree
//! - [`format`] - root-element classification into RSS / Atom / unknown
//! - [`date`] - RSS and Atom date resolution with fall-back to now
//! - [`rss`] / [`atom`] - format-specific normalizers into [`Feed`]
//! - [`fetcher`] - HTTP retrieval with retry and size limits
//!
//! # Example
//!
//! ```ignore
//! use feedfold::feed::normalize_document;
//!
//! let feed = normalize_document(bytes, "https://example.com/rss.xml")?;
//! store.merge(feed);
//! ```

mod atom;
mod date;
mod fetcher;
mod format;
mod rss;
mod xml;

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use thiserror::Error;
use url::Url;

use crate::storage::{Article, Feed};

pub use atom::normalize_atom;
pub use date::{parse_atom_date, parse_rss_date, resolve_atom_date, resolve_rss_date};
pub use fetcher::{FetchError, Fetcher, HttpFetcher, HttpFetcherConfig};
pub use format::FeedFormat;
pub use rss::normalize_rss;
pub use xml::{parse_document, Element, XmlError};

/// Why a fetched document produced no feed.
#[derive(Debug, Error)]
pub enum IngestError {
    /// Malformed XML
    #[error("Parse error: {0}")]
    Parse(#[from] XmlError),
    /// Well-formed XML whose root is neither `<rss>` nor `<feed>`
    #[error("Unknown feed type <{0}>")]
    UnknownFormat(String),
}

/// Parse, classify and normalize one raw document.
///
/// Pure transformation: no I/O, no shared state.
pub fn normalize_document(bytes: &[u8], source_url: &str) -> Result<Feed, IngestError> {
    let root = parse_document(bytes)?;
    let format = FeedFormat::detect(&root);
    tracing::debug!(url = %source_url, format = %format, "Detected feed format");
    match format {
        FeedFormat::Rss => Ok(normalize_rss(&root, source_url)),
        FeedFormat::Atom => Ok(normalize_atom(&root, source_url)),
        FeedFormat::Unknown(name) => Err(IngestError::UnknownFormat(name)),
    }
}

/// One step of a fallback chain: resolve a value from an element, or pass.
pub(crate) type Rule<T> = fn(&Element) -> Option<T>;

/// Run `rules` in order and return the first value resolved.
pub(crate) fn first_match<T>(rules: &[Rule<T>], element: &Element) -> Option<T> {
    rules.iter().find_map(|rule| rule(element))
}

/// Parse `raw` as an absolute URL, normalized to its serialized form.
pub(crate) fn absolute_url(raw: &str) -> Option<String> {
    Url::parse(raw.trim()).ok().map(|u| u.to_string())
}

/// Add a normalized article, keeping the newer copy when a document repeats an id.
pub(crate) fn insert_article(articles: &mut BTreeMap<String, Article>, article: Article) {
    match articles.entry(article.id.clone()) {
        Entry::Vacant(slot) => {
            slot.insert(article);
        }
        Entry::Occupied(mut slot) => {
            if article.updated > slot.get().updated {
                slot.insert(article);
            }
        }
    }
}
