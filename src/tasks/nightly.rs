//! Nightly Cache Clear Task
//!
//! Empties every domain cache once a day at local midnight, when menus,
//! polls and toggles roll over to the next day.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Local, TimeZone};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::cache::CacheRegistry;

const DAY: Duration = Duration::from_secs(24 * 60 * 60);

/// Time left from `now` until the next midnight in `now`'s timezone.
///
/// Falls back to a full day if that midnight does not exist locally.
pub fn until_next_midnight<Tz: TimeZone>(now: &DateTime<Tz>) -> Duration {
    let next = now
        .date_naive()
        .succ_opt()
        .and_then(|day| day.and_hms_opt(0, 0, 0))
        .and_then(|midnight| now.timezone().from_local_datetime(&midnight).earliest());

    match next {
        Some(next) => (next - now.clone()).to_std().unwrap_or(Duration::ZERO),
        None => DAY,
    }
}

/// Spawns a background task that clears every domain of `registry` at each
/// local midnight.
pub fn spawn_nightly_clear_task(registry: Arc<CacheRegistry>) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!("Starting nightly cache clear task");

        loop {
            let wait = until_next_midnight(&Local::now());
            debug!(wait_secs = wait.as_secs(), "Next nightly cache clear scheduled");
            tokio::time::sleep(wait).await;

            registry.clear_all();
            info!("Nightly cache clear complete");

            // Don't fire twice inside the same midnight second
            tokio::time::sleep(Duration::from_secs(1)).await;
        }
    })
}
