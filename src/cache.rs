use std::path::{Path, PathBuf};

use tokio::fs;

/// On-disk avatar cache. Existence of the file at an avatar's cache path
/// is the only state; entries are never invalidated or evicted here.
#[derive(Debug, Clone)]
pub struct CacheStore {
    root: PathBuf,
    enabled: bool,
}

impl CacheStore {
    pub fn new(root: impl Into<PathBuf>, enabled: bool) -> Self {
        Self {
            root: root.into(),
            enabled,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Make sure the cache root exists. Failure is only logged.
    pub async fn prepare(&self) {
        if let Err(e) = fs::create_dir_all(&self.root).await {
            log::debug!(
                "could not create cache root {}: {}",
                self.root.display(),
                e
            );
        }
    }

    /// Probe for an existing entry. A disabled cache never hits, and any
    /// probe failure counts as a miss.
    pub async fn lookup(&self, cache_path: &Path) -> Option<PathBuf> {
        if !self.enabled {
            return None;
        }
        match fs::metadata(cache_path).await {
            Ok(meta) if meta.is_file() => {
                log::debug!("cache hit {}", cache_path.display());
                Some(cache_path.to_path_buf())
            }
            Ok(_) => None,
            Err(e) => {
                log::trace!("cache miss {}: {}", cache_path.display(), e);
                None
            }
        }
    }
}
