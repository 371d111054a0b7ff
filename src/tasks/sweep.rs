//! Expired-Entry Sweep Task
//!
//! Background task that periodically drops cache entries past their
//! domain's TTL, so keys nobody reads again do not pile up.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::cache::CacheRegistry;

/// Spawns a background task sweeping every domain of `registry` each
/// `interval_secs` seconds.
///
/// Returns `None` when `interval_secs` is 0 (sweeping disabled). Reads
/// evict expired entries on their own either way.
///
/// # Example
/// ```ignore
/// let registry = Arc::new(CacheRegistry::new(Clock::new_tokio()));
/// let sweep_handle = spawn_sweep_task(registry.clone(), 300);
/// // Later, during shutdown:
/// if let Some(handle) = sweep_handle { handle.abort(); }
/// ```
pub fn spawn_sweep_task(
    registry: Arc<CacheRegistry>,
    interval_secs: u64,
) -> Option<JoinHandle<()>> {
    if interval_secs == 0 {
        info!("Cache sweep disabled");
        return None;
    }
    let interval = Duration::from_secs(interval_secs);

    Some(tokio::spawn(async move {
        info!(interval_secs, "Starting cache sweep task");

        loop {
            tokio::time::sleep(interval).await;

            let removed = registry.sweep_expired();
            if removed > 0 {
                info!(removed, "Cache sweep removed expired entries");
            } else {
                debug!("Cache sweep: no expired entries found");
            }
        }
    }))
}
