//! TTL Cleanup Task
//!
//! Background task that periodically sweeps expired entries out of the
//! in-process fallback tier. The remote tier expires keys on its own.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::cache::TieredCacheStore;

/// Spawns a background task that periodically purges expired fallback entries.
///
/// # Arguments
/// * `store` - Shared reference to the cache store
/// * `cleanup_interval_secs` - Interval in seconds between cleanup runs
///
/// # Returns
/// A JoinHandle for the spawned task, which can be used to abort the task
/// during graceful shutdown.
///
/// # Example
/// ```ignore
/// let store = Arc::new(TieredCacheStore::local(300, PayloadCodec::default()));
/// let cleanup_handle = spawn_cleanup_task(store.clone(), 60);
/// // Later, during shutdown:
/// cleanup_handle.abort();
/// ```
pub fn spawn_cleanup_task(
    store: Arc<TieredCacheStore>,
    cleanup_interval_secs: u64,
) -> JoinHandle<()> {
    let interval = Duration::from_secs(cleanup_interval_secs.max(1));

    tokio::spawn(async move {
        info!(
            interval_secs = interval.as_secs(),
            "Starting TTL cleanup task"
        );

        loop {
            tokio::time::sleep(interval).await;

            let removed = store.purge_expired();
            if removed > 0 {
                info!(removed, "TTL cleanup: removed expired entries");
            } else {
                debug!("TTL cleanup: no expired entries found");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::PayloadCodec;

    fn store() -> Arc<TieredCacheStore> {
        Arc::new(TieredCacheStore::local(300, PayloadCodec::default()))
    }

    #[tokio::test]
    async fn test_cleanup_task_removes_expired_entries() {
        let store = store();
        store.set("expire_soon", "value", Some(1)).await;
        assert_eq!(store.fallback_len(), 1);

        let handle = spawn_cleanup_task(store.clone(), 1);

        // Entry expires at 1s, the sweep runs at 1s and 2s.
        tokio::time::sleep(Duration::from_millis(2500)).await;

        assert_eq!(store.fallback_len(), 0, "Expired entry should have been swept");
        handle.abort();
    }

    #[tokio::test]
    async fn test_cleanup_task_preserves_valid_entries() {
        let store = store();
        store.set("long_lived", "value", Some(3600)).await;

        let handle = spawn_cleanup_task(store.clone(), 1);
        tokio::time::sleep(Duration::from_millis(1500)).await;

        assert_eq!(store.fallback_len(), 1);
        assert_eq!(
            store.get::<String>("long_lived").await,
            Some("value".to_string())
        );
        handle.abort();
    }

    #[tokio::test]
    async fn test_cleanup_task_can_be_aborted() {
        let handle = spawn_cleanup_task(store(), 1);

        handle.abort();

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(handle.is_finished(), "Task should be finished after abort");
    }
}
