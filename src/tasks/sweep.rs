//! Expiration Sweep Task
//!
//! Background task that periodically reclaims expired store entries through
//! each shard's ring buffer.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::store::MemoryStore;

/// Spawns a task that sweeps the store at the given interval.
///
/// The task runs until its handle is aborted; wrap the handle in a
/// [`SweepGuard`] to tie the sweep's lifetime to an owning value. The store
/// stays correct without the sweep (reads expire lazily); the sweep only
/// bounds the growth of expired keys nobody reads again.
///
/// # Arguments
/// * `store` - shared store to sweep
/// * `interval` - time between sweep passes, typically half the default TTL
pub fn spawn_sweep_task<V>(store: Arc<MemoryStore<V>>, interval: Duration) -> JoinHandle<()>
where
    V: Clone + Send + Sync + 'static,
{
    tokio::spawn(async move {
        info!(
            interval_ms = interval.as_millis() as u64,
            "Starting expiration sweep task"
        );

        loop {
            tokio::time::sleep(interval).await;

            let removed = store.sweep_expired();
            if removed > 0 {
                info!(removed, "Expiration sweep removed entries");
            } else {
                debug!("Expiration sweep found nothing to remove");
            }
        }
    })
}

// == Sweep Guard ==
/// Aborts the sweep task when dropped.
///
/// Holding the guard inside the cache state gives the sweep a structured
/// lifetime: it stops with the last clone of the cache instead of running to
/// process exit.
#[derive(Debug)]
pub struct SweepGuard {
    handle: JoinHandle<()>,
}

impl SweepGuard {
    pub fn new(handle: JoinHandle<()>) -> Self {
        Self { handle }
    }
}

impl Drop for SweepGuard {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
