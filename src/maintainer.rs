//! Background Maintainer (C9): one periodic task that keeps the pipeline
//! cache within its memory and idle budgets without a request in flight
//! (spec §4.9).

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

use crate::cache::PipelineCache;
use crate::config::Config;

pub struct Maintainer {
    shutdown_tx: watch::Sender<bool>,
    handle: tokio::task::JoinHandle<()>,
}

impl Maintainer {
    /// Spawns the tick loop. Each tick: idle eviction (skipped when the
    /// timeout is zero), then pressure eviction (skipped when memory
    /// monitoring is disabled) (spec §4.9).
    pub fn spawn(cache: Arc<PipelineCache>, cfg: Arc<Config>) -> Self {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(cfg.idle_check_interval.max(Duration::from_millis(1)));
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        run_tick(&cache, &cfg).await;
                    }
                    _ = shutdown_rx.changed() => {
                        break;
                    }
                }
            }
        });
        Maintainer { shutdown_tx, handle }
    }

    /// Cancels the loop and waits for the in-progress tick, if any, to
    /// finish (spec §4.9, "any in-progress eviction completes before
    /// exit").
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        let _ = self.handle.await;
    }
}

async fn run_tick(cache: &PipelineCache, cfg: &Config) {
    if !cfg.model_idle_timeout.is_zero() {
        let evicted = cache.evict_idle(cfg.model_idle_timeout).await;
        if !evicted.is_empty() {
            tracing::info!(count = evicted.len(), "maintainer evicted idle pipelines");
        }
    }
    if cfg.memory_monitoring_enabled {
        let evicted = cache.evict_under_pressure().await;
        if !evicted.is_empty() {
            tracing::warn!(count = evicted.len(), "maintainer evicted pipelines under memory pressure");
        }
    }
    // CUDA_CACHE_CLEAR_INTERVAL_SEC would trigger a device-level cache
    // clear here; no real device handle exists without the inference
    // runtime collaborator (spec §6.2), so this tick only logs its own
    // cadence when configured.
    if cfg.cuda_cache_clear_interval.is_some() {
        tracing::debug!("device cache-clear requested but no device handle is wired in");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DeviceKind;
    use crate::device::Device;
    use crate::lang::{CacheKey, Family, Pair};
    use crate::runtime::MockRuntime;
    use std::time::Duration as StdDuration;

    fn test_device() -> Device {
        Device {
            kind: DeviceKind::Cpu,
            index: 0,
        }
    }

    #[tokio::test]
    async fn tick_evicts_idle_entries() {
        let cfg = Arc::new(Config {
            idle_check_interval: StdDuration::from_millis(5),
            model_idle_timeout: StdDuration::from_nanos(1),
            memory_monitoring_enabled: false,
            ..Config::default()
        });
        let cache = Arc::new(PipelineCache::new(
            Arc::new(MockRuntime::new()),
            test_device(),
            &cfg,
        ));
        let key = CacheKey::new(&Pair::new("en", "de"), Family::OpusMt);
        cache.get_or_load(&key, "m1", Family::OpusMt).await.unwrap();
        assert_eq!(cache.len(), 1);

        let maintainer = Maintainer::spawn(cache.clone(), cfg);
        tokio::time::sleep(StdDuration::from_millis(50)).await;
        maintainer.shutdown().await;
        assert_eq!(cache.len(), 0);
    }

    #[tokio::test]
    async fn shutdown_stops_the_loop() {
        let cfg = Arc::new(Config {
            idle_check_interval: StdDuration::from_millis(5),
            ..Config::default()
        });
        let cache = Arc::new(PipelineCache::new(
            Arc::new(MockRuntime::new()),
            test_device(),
            &cfg,
        ));
        let maintainer = Maintainer::spawn(cache, cfg);
        maintainer.shutdown().await;
    }
}
