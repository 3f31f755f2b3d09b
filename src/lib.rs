//! feedfold: periodic RSS/Atom ingestion into one merged, persisted store.
//!
//! Each cycle fetches every configured URL, normalizes RSS and Atom
//! documents into a single [`storage::Feed`] model, merges them into the
//! [`storage::Store`] by id, and saves the store as JSON.

pub mod config;
pub mod feed;
pub mod pipeline;
pub mod shutdown;
pub mod storage;
pub mod util;
