use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::http::{self, Fetch};

#[derive(Debug, Clone, PartialEq)]
pub enum ImageOutcome {
    Downloaded(PathBuf),
    /// The file was already on disk; nothing was fetched.
    AlreadyPresent(PathBuf),
    Failed(String),
}

impl ImageOutcome {
    /// Local path for the record, when there is one.
    pub fn path(&self) -> Option<&Path> {
        match self {
            ImageOutcome::Downloaded(p) | ImageOutcome::AlreadyPresent(p) => Some(p),
            ImageOutcome::Failed(_) => None,
        }
    }
}

/// Fetch-or-skip store for variant images.
///
/// Shared by all page workers. The directory is created once, and callers
/// asking for the same file name are serialized so it is downloaded at most once.
pub struct ImageStore {
    dir: PathBuf,
    dir_ready: OnceCell<()>,
    in_flight: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl ImageStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        ImageStore {
            dir: dir.into(),
            dir_ready: OnceCell::new(),
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub async fn acquire<F: Fetch>(&self, fetcher: &F, file_name: &str, url: &str) -> ImageOutcome {
        let destination = self.dir.join(file_name);

        let slot = self.claim(file_name);
        let guard = slot.lock().await;

        let outcome = if destination.exists() {
            info!(url, path = %destination.display(), "image already present, skipping download");
            ImageOutcome::AlreadyPresent(destination)
        } else {
            match self.download(fetcher, url, &destination).await {
                Ok(()) => {
                    info!(url, path = %destination.display(), "image downloaded");
                    ImageOutcome::Downloaded(destination)
                }
                Err(e) => {
                    warn!(url, error = %e, "image download failed");
                    ImageOutcome::Failed(e.to_string())
                }
            }
        };

        drop(guard);
        self.release(file_name, &slot);
        outcome
    }

    fn claim(&self, file_name: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut in_flight = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
        Arc::clone(in_flight.entry(file_name.to_string()).or_default())
    }

    /// Forget the slot once nobody else is waiting on it.
    fn release(&self, file_name: &str, slot: &Arc<tokio::sync::Mutex<()>>) {
        let mut in_flight = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
        // One count held by the map, one by `slot`.
        if Arc::strong_count(slot) <= 2 {
            in_flight.remove(file_name);
        }
    }

    async fn download<F: Fetch>(&self, fetcher: &F, url: &str, destination: &Path) -> Result<()> {
        self.dir_ready
            .get_or_try_init(|| async {
                debug!(dir = %self.dir.display(), "creating image directory");
                tokio::fs::create_dir_all(&self.dir).await
            })
            .await?;

        let bytes = http::get_ok(fetcher, url).await?;
        tokio::fs::write(destination, &bytes).await?;
        Ok(())
    }
}
