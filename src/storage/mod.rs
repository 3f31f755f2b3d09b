//! Canonical feed model, merge engine and on-disk persistence.

mod merge;
mod persist;
mod types;

pub use merge::MergeOutcome;
pub use types::{Article, Feed, Store, StoreError};
