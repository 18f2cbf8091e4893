//! Process-scoped singletons wiring C2-C9 together, owned by the HTTP
//! server for the life of the process (spec §9, "Global mutable state").

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::cache::PipelineCache;
use crate::config::Config;
use crate::detect::LanguageDetector;
use crate::device::Device;
use crate::discovery::{Discovery, OpusRegistry};
use crate::maintainer::Maintainer;
use crate::orchestrator::Orchestrator;
use crate::queue::Queue;
use crate::runtime::InferenceRuntime;

pub struct AppState {
    pub cfg: Arc<Config>,
    pub device: Device,
    pub discovery: Arc<Discovery>,
    pub cache: Arc<PipelineCache>,
    pub queue: Arc<Queue>,
    pub orchestrator: Arc<Orchestrator>,
    pub detector: Arc<dyn LanguageDetector>,
    /// Flips to `true` once the startup discovery pass (spawned below)
    /// completes. `Device::resolve` is synchronous and has already run by
    /// the time `build` returns, so this flag alone gates `/readyz`
    /// (SPEC_FULL §1, "`/readyz` ... returns 503 until ready").
    ready: Arc<AtomicBool>,
}

impl AppState {
    pub fn build(
        cfg: Arc<Config>,
        runtime: Arc<dyn InferenceRuntime>,
        registry: Arc<dyn OpusRegistry>,
        detector: Arc<dyn LanguageDetector>,
    ) -> AppState {
        let device = Device::resolve(&cfg);
        let discovery = Arc::new(Discovery::new(registry, cfg.discovery_ttl));
        let cache = Arc::new(PipelineCache::new(runtime, device, &cfg));
        let max_inflight = cfg
            .max_inflight_translations
            .unwrap_or_else(|| device.default_max_inflight(&cfg));
        let queue = Arc::new(Queue::new(&cfg, max_inflight));
        let orchestrator = Arc::new(Orchestrator::new(
            cfg.clone(),
            cache.clone(),
            discovery.clone(),
            queue.clone(),
            detector.clone(),
        ));

        let ready = Arc::new(AtomicBool::new(false));
        let startup_discovery = discovery.clone();
        let startup_ready = ready.clone();
        tokio::spawn(async move {
            startup_discovery.discover_all().await;
            startup_ready.store(true, Ordering::SeqCst);
        });

        AppState {
            cfg,
            device,
            discovery,
            cache,
            queue,
            orchestrator,
            detector,
            ready,
        }
    }

    pub fn detect(&self, text: &str) -> crate::lang::Lang {
        self.detector.detect(text)
    }

    /// True once the Device Resolver and the first Model Discovery refresh
    /// have both completed (spec §4.2, §4.8; SPEC_FULL §1).
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    pub fn spawn_maintainer(&self) -> Maintainer {
        Maintainer::spawn(self.cache.clone(), self.cfg.clone())
    }

    /// Drains device memory on shutdown (spec §5, "Resource lifecycle").
    pub async fn shutdown(&self) {
        self.cache.purge_all().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::HeuristicDetector;
    use crate::discovery::StaticOpusRegistry;
    use crate::runtime::MockRuntime;

    fn build() -> AppState {
        AppState::build(
            Arc::new(Config::default()),
            Arc::new(MockRuntime::new()),
            Arc::new(StaticOpusRegistry::default_seed()),
            Arc::new(HeuristicDetector),
        )
    }

    #[tokio::test]
    async fn not_ready_until_the_startup_discovery_pass_completes() {
        let state = build();
        assert!(!state.is_ready());
        // Give the spawned startup task a turn to run to completion.
        tokio::task::yield_now().await;
        tokio::task::yield_now().await;
        assert!(state.is_ready());
    }
}
