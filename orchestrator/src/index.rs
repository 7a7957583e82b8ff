//! Versioned handle over the externally owned document index.
//!
//! Queries take a [`Snapshot`] (an `Arc` clone) and search it without
//! holding any lock, so publishing version N+1 never disturbs a query that
//! is still running against version N.

use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::info;

use crate::clients::SearchIndex;

#[derive(Clone)]
pub struct Snapshot {
    pub version: u64,
    pub index: Arc<dyn SearchIndex>,
}

#[derive(Default)]
pub struct IndexHandle {
    current: RwLock<Option<Snapshot>>,
}

impl IndexHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// The snapshot new queries should read, or `None` before the first build.
    pub async fn snapshot(&self) -> Option<Snapshot> {
        self.current.read().await.clone()
    }

    pub async fn version(&self) -> u64 {
        self.current.read().await.as_ref().map_or(0, |s| s.version)
    }

    /// Makes `index` the current snapshot and returns its version.
    pub async fn publish(&self, index: Arc<dyn SearchIndex>) -> u64 {
        let mut current = self.current.write().await;
        let version = current.as_ref().map_or(1, |s| s.version + 1);
        *current = Some(Snapshot { version, index });
        info!(version, "index snapshot published");
        version
    }
}
