//! Pipeline Cache (C3): a bounded ordered mapping from `CacheKey` to
//! loaded `Pipeline` with LRU, memory-pressure, and idle eviction
//! (spec §4.3).
//!
//! `get`'s fast path never blocks on I/O: a miss releases the lock,
//! performs the load, and re-acquires to insert, with per-key
//! single-flight coalescing of concurrent loads for the same key
//! (spec §9, "Shared cache with I/O under lock").

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use sysinfo::System;
use tokio::sync::OnceCell;

use crate::config::Config;
use crate::device::Device;
use crate::error::ModelLoadError;
use crate::lang::CacheKey;
use crate::runtime::{InferenceRuntime, Pipeline};

struct CacheEntry {
    pipeline: Arc<dyn Pipeline>,
    last_access: Instant,
}

#[derive(Default)]
struct Inner {
    /// Front = LRU, back = MRU.
    order: Vec<CacheKey>,
    entries: HashMap<CacheKey, CacheEntry>,
}

impl Inner {
    fn touch(&mut self, key: &CacheKey) -> Option<Arc<dyn Pipeline>> {
        let entry = self.entries.get_mut(key)?;
        entry.last_access = Instant::now();
        let pipeline = entry.pipeline.clone();
        self.order.retain(|k| k != key);
        self.order.push(key.clone());
        Some(pipeline)
    }

    fn evict_front(&mut self) -> Option<(CacheKey, Arc<dyn Pipeline>)> {
        if self.order.is_empty() {
            return None;
        }
        let key = self.order.remove(0);
        self.entries.remove(&key).map(|e| (key, e.pipeline))
    }

    fn remove(&mut self, key: &CacheKey) -> Option<Arc<dyn Pipeline>> {
        self.order.retain(|k| k != key);
        self.entries.remove(key).map(|e| e.pipeline)
    }
}

type LoadResult = Result<Arc<dyn Pipeline>, ModelLoadError>;

pub struct PipelineCache {
    inner: Mutex<Inner>,
    loading: Mutex<HashMap<CacheKey, Arc<OnceCell<LoadResult>>>>,
    runtime: Arc<dyn InferenceRuntime>,
    capacity: usize,
    device: Device,
    memory_critical_pct: f64,
    gpu_memory_critical_pct: f64,
    hysteresis_pct: f64,
}

impl PipelineCache {
    pub fn new(runtime: Arc<dyn InferenceRuntime>, device: Device, cfg: &Config) -> Self {
        PipelineCache {
            inner: Mutex::new(Inner::default()),
            loading: Mutex::new(HashMap::new()),
            runtime,
            capacity: cfg.max_cached_models.max(1),
            device,
            memory_critical_pct: cfg.memory_critical_threshold_pct,
            gpu_memory_critical_pct: cfg.gpu_memory_critical_threshold_pct,
            hysteresis_pct: cfg.memory_hysteresis_pct,
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn keys(&self) -> Vec<(CacheKey, Duration)> {
        let inner = self.inner.lock().unwrap();
        let now = Instant::now();
        inner
            .entries
            .iter()
            .map(|(k, e)| (k.clone(), now.duration_since(e.last_access)))
            .collect()
    }

    /// Returns a ready pipeline for `key`, loading it via `model_id`/`family`
    /// on a miss. Concurrent misses for the same key collapse into one load
    /// (spec §8, "Single-flight").
    pub async fn get_or_load(
        &self,
        key: &CacheKey,
        model_id: &str,
        family: crate::lang::Family,
    ) -> LoadResult {
        if let Some(pipeline) = self.inner.lock().unwrap().touch(key) {
            return Ok(pipeline);
        }

        let cell = {
            let mut loading = self.loading.lock().unwrap();
            loading
                .entry(key.clone())
                .or_insert_with(|| Arc::new(OnceCell::new()))
                .clone()
        };

        let result = cell
            .get_or_init(|| async {
                match self.runtime.load(model_id, family, self.device.index).await {
                    Ok(boxed) => Ok(Arc::<dyn Pipeline>::from(boxed)),
                    Err(e) => Err(e),
                }
            })
            .await
            .clone();

        // Single-flight entry is cleared either way: on success the pipeline
        // now lives in the cache itself; on failure a retry must be able to
        // attempt a fresh load (spec §4.3, "Failure semantics").
        self.loading.lock().unwrap().remove(key);

        match result {
            Ok(pipeline) => {
                self.put(key.clone(), pipeline.clone()).await;
                Ok(pipeline)
            }
            Err(e) => Err(e),
        }
    }

    async fn put(&self, key: CacheKey, pipeline: Arc<dyn Pipeline>) {
        let evicted = {
            let mut inner = self.inner.lock().unwrap();
            let mut evicted = None;
            if !inner.entries.contains_key(&key) && inner.entries.len() >= self.capacity {
                evicted = inner.evict_front();
            }
            inner.order.retain(|k| k != &key);
            inner.order.push(key.clone());
            inner.entries.insert(
                key,
                CacheEntry {
                    pipeline,
                    last_access: Instant::now(),
                },
            );
            evicted
        };

        if let Some((evicted_key, evicted_pipeline)) = evicted {
            tracing::info!(key = %evicted_key, "evicting LRU pipeline for capacity");
            evicted_pipeline.release().await;
        }
    }

    /// Removes every key whose last access is older than `timeout`
    /// (spec §4.3, `evict_idle`). `timeout == 0` is a no-op per spec §8.
    pub async fn evict_idle(&self, timeout: Duration) -> Vec<CacheKey> {
        if timeout.is_zero() {
            return Vec::new();
        }
        let now = Instant::now();
        let stale: Vec<(CacheKey, Arc<dyn Pipeline>)> = {
            let mut inner = self.inner.lock().unwrap();
            let stale_keys: Vec<CacheKey> = inner
                .entries
                .iter()
                .filter(|(_, e)| now.duration_since(e.last_access) > timeout)
                .map(|(k, _)| k.clone())
                .collect();
            stale_keys
                .into_iter()
                .filter_map(|k| inner.remove(&k).map(|p| (k, p)))
                .collect()
        };

        for (key, pipeline) in &stale {
            tracing::info!(key = %key, "evicting idle pipeline");
            pipeline.release().await;
        }
        stale.into_iter().map(|(k, _)| k).collect()
    }

    /// Evicts LRU entries while system RAM (or, when observable, GPU VRAM)
    /// usage exceeds its critical threshold, stopping once usage falls
    /// below `threshold - hysteresis` or the cache is empty (spec §4.3).
    pub async fn evict_under_pressure(&self) -> Vec<CacheKey> {
        let mut evicted_keys = Vec::new();
        loop {
            let ram_pct = current_ram_pct();
            // GPU VRAM usage is not observable without the real inference
            // runtime's device handle (spec §6.2 draws that boundary); this
            // gate only fires on RAM until a runtime reports GPU usage.
            let over_threshold = ram_pct > self.memory_critical_pct
                || ram_pct > self.gpu_memory_critical_pct;
            if !over_threshold {
                break;
            }
            let floor = (self.memory_critical_pct - self.hysteresis_pct).max(0.0);
            if ram_pct <= floor {
                break;
            }

            let evicted = {
                let mut inner = self.inner.lock().unwrap();
                inner.evict_front()
            };
            match evicted {
                Some((key, pipeline)) => {
                    tracing::warn!(key = %key, ram_pct, "evicting pipeline under memory pressure");
                    pipeline.release().await;
                    evicted_keys.push(key);
                }
                None => break,
            }
        }
        evicted_keys
    }

    /// Evicts everything (used on shutdown).
    pub async fn purge_all(&self) {
        let all: Vec<(CacheKey, Arc<dyn Pipeline>)> = {
            let mut inner = self.inner.lock().unwrap();
            let keys: Vec<CacheKey> = inner.order.clone();
            keys.into_iter()
                .filter_map(|k| inner.remove(&k).map(|p| (k, p)))
                .collect()
        };
        for (key, pipeline) in all {
            tracing::info!(key = %key, "purging pipeline on shutdown");
            pipeline.release().await;
        }
    }
}

fn current_ram_pct() -> f64 {
    let mut sys = System::new();
    sys.refresh_memory();
    let total = sys.total_memory();
    if total == 0 {
        return 0.0;
    }
    (sys.used_memory() as f64 / total as f64) * 100.0
}
