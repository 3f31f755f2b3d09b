use std::io::Write;
use std::path::Path;

use super::types::{Feed, Store, StoreError};

impl Store {
    // ========================================================================
    // Persistence
    // ========================================================================

    /// Load the store from `path`, starting empty when it cannot be read.
    ///
    /// A missing file is the normal first-run case and is logged at debug.
    /// An unreadable or corrupt file is logged as a warning; the next save
    /// overwrites it.
    pub fn load(path: &Path) -> Store {
        match Self::try_load(path) {
            Ok(store) => {
                tracing::info!(
                    path = %path.display(),
                    feeds = store.len(),
                    articles = store.article_count(),
                    "Loaded store"
                );
                store
            }
            Err(StoreError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No store file found, starting empty");
                Store::new()
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "Failed to load store, starting empty"
                );
                Store::new()
            }
        }
    }

    /// Load the store from `path`, surfacing any error.
    ///
    /// The file holds a JSON array of feed records, each carrying its
    /// `articles` array.
    pub fn try_load(path: &Path) -> Result<Store, StoreError> {
        let content = std::fs::read_to_string(path)?;
        if content.trim().is_empty() {
            return Ok(Store::new());
        }
        let feeds: Vec<Feed> = serde_json::from_str(&content)?;
        Ok(feeds.into_iter().collect())
    }

    /// Write the full store to `path`.
    ///
    /// Uses write-to-temp-then-rename so the previous snapshot survives a
    /// crash or full disk mid-write.
    pub fn save(&self, path: &Path) -> Result<(), StoreError> {
        let feeds: Vec<&Feed> = self.feeds.values().collect();
        let json = serde_json::to_vec_pretty(&feeds)?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        atomic_write(path, &json)?;
        tracing::debug!(
            path = %path.display(),
            feeds = self.len(),
            bytes = json.len(),
            "Saved store"
        );
        Ok(())
    }
}

/// Write `content` to `dst` through a uniquely named sibling temp file.
fn atomic_write(dst: &Path, content: &[u8]) -> std::io::Result<()> {
    use std::time::{SystemTime, UNIX_EPOCH};

    // Unpredictable suffix so a stale or planted file at the temp path is never reused
    let random_suffix = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    let temp_path = dst.with_extension(format!("tmp.{:016x}", random_suffix));

    let result = (|| {
        let mut temp_file = std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&temp_path)?;
        temp_file.write_all(content)?;
        temp_file.sync_all()?;
        drop(temp_file);

        // On Windows, rename fails if destination exists
        #[cfg(windows)]
        if dst.exists() {
            std::fs::remove_file(dst)?;
        }

        std::fs::rename(&temp_path, dst)
    })();

    if result.is_err() {
        let _ = std::fs::remove_file(&temp_path);
    }
    result
}
