use std::collections::btree_map::Entry;

use super::types::{Feed, Store};

/// What a single [`Store::merge`] call changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeOutcome {
    /// The feed id was not in the store and the whole feed was inserted
    pub feed_inserted: bool,
    /// Articles whose id was new to the feed
    pub inserted: usize,
    /// Existing articles replaced by a strictly newer version
    pub replaced: usize,
    /// Incoming articles ignored because the stored copy is as new or newer
    pub unchanged: usize,
}

impl MergeOutcome {
    /// True when the merge left the store exactly as it was.
    pub fn is_noop(&self) -> bool {
        !self.feed_inserted && self.inserted == 0 && self.replaced == 0
    }
}

impl Store {
    // ========================================================================
    // Merge Operations
    // ========================================================================

    /// Merge a freshly normalized feed into the store.
    ///
    /// - Unknown feed id: the feed is inserted verbatim.
    /// - Known feed id: the stored title, description, link and updated
    ///   timestamp are kept as first seen. Only the article set changes.
    /// - Each incoming article is inserted when its id is new, and replaces
    ///   the stored article only when its `updated` is strictly greater.
    ///
    /// Nothing is ever removed, and merging the same feed twice is a no-op
    /// the second time.
    pub fn merge(&mut self, incoming: Feed) -> MergeOutcome {
        let mut outcome = MergeOutcome::default();

        let existing = match self.feeds.entry(incoming.id.clone()) {
            Entry::Vacant(slot) => {
                outcome.feed_inserted = true;
                outcome.inserted = incoming.articles.len();
                tracing::debug!(
                    feed = %incoming.id,
                    articles = outcome.inserted,
                    "Inserted new feed"
                );
                slot.insert(incoming);
                return outcome;
            }
            Entry::Occupied(slot) => slot.into_mut(),
        };

        if metadata_differs(existing, &incoming) {
            tracing::debug!(
                feed = %existing.id,
                "Feed metadata differs from stored copy; keeping first-seen metadata"
            );
        }

        for (id, article) in incoming.articles {
            match existing.articles.entry(id) {
                Entry::Vacant(slot) => {
                    slot.insert(article);
                    outcome.inserted += 1;
                }
                Entry::Occupied(mut slot) => {
                    if article.updated > slot.get().updated {
                        slot.insert(article);
                        outcome.replaced += 1;
                    } else {
                        outcome.unchanged += 1;
                    }
                }
            }
        }

        outcome
    }
}

/// Whether the feed-level fields the store keeps as first seen disagree.
fn metadata_differs(stored: &Feed, incoming: &Feed) -> bool {
    stored.title != incoming.title
        || stored.description != incoming.description
        || stored.link != incoming.link
}
