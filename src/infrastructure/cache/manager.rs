//! Cache manager - owns the directory cache and its periodic cleanup

use super::lru::{CacheStats, LruTtlCache};
use crate::config::CacheConfig;
use crate::domain::extension::Extension;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info};

/// Wraps the extension cache with a cleanup task that sweeps expired
/// entries on an interval and stops on the shutdown signal.
pub struct CacheManager {
    cache: LruTtlCache<Extension>,
    cleanup_interval: Duration,
}

impl CacheManager {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            cache: LruTtlCache::new(config.max_entries),
            cleanup_interval: config.cleanup_interval(),
        }
    }

    pub fn get(&self, key: &str) -> Option<Extension> {
        self.cache.get(key)
    }

    pub fn set(&self, key: &str, value: Extension, ttl: Duration) {
        self.cache.set(key, value, ttl);
    }

    pub fn delete(&self, key: &str) {
        self.cache.delete(key);
    }

    pub fn clear(&self) {
        self.cache.clear();
    }

    pub fn stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Periodic expired-entry sweep; runs until shutdown is signalled.
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        info!(
            interval_secs = self.cleanup_interval.as_secs(),
            "cache cleanup worker started"
        );

        let mut ticker = tokio::time::interval(self.cleanup_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick of a tokio interval fires immediately
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let removed = self.cache.cleanup();
                    if removed > 0 {
                        debug!(removed, "swept expired cache entries");
                    }
                    let stats = self.cache.stats();
                    debug!(
                        hits = stats.hits,
                        misses = stats.misses,
                        hit_rate = stats.hit_rate,
                        size = stats.size,
                        capacity = stats.capacity,
                        "cache stats"
                    );
                }
                _ = shutdown.changed() => {
                    info!("cache cleanup worker shutting down");
                    return;
                }
            }
        }
    }
}
