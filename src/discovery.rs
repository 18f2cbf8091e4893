//! Model Discovery (C8): per-family `AvailablePairs`, used by the Pivot
//! Planner (C5) and exposed read-only at the edge (spec §4.8).

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::lang::{Family, Lang, Pair, ALL_FAMILIES, M2M100_LANGS, MBART50_LANGS};

/// Opus-mt's pair list comes from an external model registry (spec §4.8);
/// this is that collaborator's contract. mbart50/m2m100 need no such
/// lookup — their sets are a fixed Cartesian square (spec §4.8).
#[async_trait]
pub trait OpusRegistry: Send + Sync {
    async fn fetch_pairs(&self) -> anyhow::Result<HashSet<Pair>>;
}

/// In-memory stand-in for the real Helsinki-NLP registry listing. Seeded
/// with enough pairs to exercise direct translation, family fallback, and
/// single-family pivoting in tests (spec §8 scenarios 1, 2, 5).
pub struct StaticOpusRegistry {
    pairs: HashSet<Pair>,
}

impl StaticOpusRegistry {
    pub fn new(pairs: impl IntoIterator<Item = Pair>) -> Self {
        StaticOpusRegistry {
            pairs: pairs.into_iter().collect(),
        }
    }

    pub fn default_seed() -> Self {
        let seeds = [
            ("en", "de"),
            ("de", "en"),
            ("en", "fr"),
            ("fr", "en"),
            ("en", "es"),
            ("es", "en"),
            ("en", "hi"),
            ("hi", "en"),
            ("ja", "hi"),
            ("hi", "ja"),
            ("hi", "de"),
            ("de", "hi"),
        ];
        Self::new(seeds.into_iter().map(|(s, t)| Pair::new(s, t)))
    }
}

#[async_trait]
impl OpusRegistry for StaticOpusRegistry {
    async fn fetch_pairs(&self) -> anyhow::Result<HashSet<Pair>> {
        Ok(self.pairs.clone())
    }
}

struct CachedEntry {
    pairs: Arc<HashSet<Pair>>,
    fetched_at: Instant,
}

pub struct Discovery {
    registry: Arc<dyn OpusRegistry>,
    ttl: Duration,
    opus_cache: RwLock<Option<CachedEntry>>,
    mbart50_pairs: Arc<HashSet<Pair>>,
    m2m100_pairs: Arc<HashSet<Pair>>,
}

fn cartesian_minus_identity(langs: &[&str]) -> HashSet<Pair> {
    let mut set = HashSet::new();
    for &a in langs {
        for &b in langs {
            if a != b {
                set.insert(Pair::new(a, b));
            }
        }
    }
    set
}

impl Discovery {
    pub fn new(registry: Arc<dyn OpusRegistry>, ttl: Duration) -> Self {
        Discovery {
            registry,
            ttl,
            opus_cache: RwLock::new(None),
            mbart50_pairs: Arc::new(cartesian_minus_identity(MBART50_LANGS)),
            m2m100_pairs: Arc::new(cartesian_minus_identity(M2M100_LANGS)),
        }
    }

    /// Returns the available pairs for `family`, refreshing opus-mt's
    /// cache if it's stale. On registry failure, serves the last-known
    /// value if one exists (spec §7, `DiscoveryFail`: "serves stale TTL
    /// value; logged; pivots degraded").
    pub async fn discover(&self, family: Family) -> Arc<HashSet<Pair>> {
        match family {
            Family::Mbart50 => self.mbart50_pairs.clone(),
            Family::M2m100 => self.m2m100_pairs.clone(),
            Family::OpusMt => self.discover_opus().await,
        }
    }

    async fn discover_opus(&self) -> Arc<HashSet<Pair>> {
        {
            let cache = self.opus_cache.read().await;
            if let Some(entry) = cache.as_ref() {
                if entry.fetched_at.elapsed() < self.ttl {
                    return entry.pairs.clone();
                }
            }
        }

        let mut cache = self.opus_cache.write().await;
        // Re-check under the write lock in case another caller refreshed
        // while we were waiting (idempotent discovery, spec §8).
        if let Some(entry) = cache.as_ref() {
            if entry.fetched_at.elapsed() < self.ttl {
                return entry.pairs.clone();
            }
        }

        match self.registry.fetch_pairs().await {
            Ok(pairs) => {
                let pairs = Arc::new(pairs);
                *cache = Some(CachedEntry {
                    pairs: pairs.clone(),
                    fetched_at: Instant::now(),
                });
                pairs
            }
            Err(err) => {
                tracing::warn!(error = %err, "opus-mt discovery refresh failed");
                match cache.as_ref() {
                    Some(entry) => entry.pairs.clone(),
                    None => Arc::new(HashSet::new()),
                }
            }
        }
    }

    pub async fn discover_all(&self) -> Vec<(Family, Arc<HashSet<Pair>>)> {
        let mut out = Vec::with_capacity(ALL_FAMILIES.len());
        for family in ALL_FAMILIES {
            out.push((family, self.discover(family).await));
        }
        out
    }

    /// Forces the next opus-mt `discover` call to refetch.
    pub async fn clear_cache(&self) {
        *self.opus_cache.write().await = None;
    }

    pub async fn get_languages(
        &self,
        source_filter: Option<&Lang>,
        target_filter: Option<&Lang>,
    ) -> Vec<Lang> {
        let mut langs: HashSet<Lang> = HashSet::new();
        for (_, pairs) in self.discover_all().await {
            for pair in pairs.iter() {
                if let Some(src) = source_filter {
                    if &pair.src != src {
                        continue;
                    }
                }
                if let Some(tgt) = target_filter {
                    if &pair.tgt != tgt {
                        continue;
                    }
                }
                langs.insert(pair.src.clone());
                langs.insert(pair.tgt.clone());
            }
        }
        let mut langs: Vec<Lang> = langs.into_iter().collect();
        langs.sort();
        langs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn discover_is_idempotent_within_ttl() {
        let discovery = Discovery::new(
            Arc::new(StaticOpusRegistry::default_seed()),
            Duration::from_secs(3600),
        );
        let a = discovery.discover(Family::OpusMt).await;
        let b = discovery.discover(Family::OpusMt).await;
        assert_eq!(*a, *b);
    }

    #[tokio::test]
    async fn mbart50_pairs_exclude_identities() {
        let discovery = Discovery::new(
            Arc::new(StaticOpusRegistry::default_seed()),
            Duration::from_secs(3600),
        );
        let pairs = discovery.discover(Family::Mbart50).await;
        assert!(!pairs.contains(&Pair::new("en", "en")));
        assert!(pairs.contains(&Pair::new("en", "de")));
    }

    #[tokio::test]
    async fn clear_cache_forces_refetch() {
        struct CountingRegistry(std::sync::atomic::AtomicUsize);
        #[async_trait]
        impl OpusRegistry for CountingRegistry {
            async fn fetch_pairs(&self) -> anyhow::Result<HashSet<Pair>> {
                self.0.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                Ok(HashSet::new())
            }
        }
        let registry = Arc::new(CountingRegistry(std::sync::atomic::AtomicUsize::new(0)));
        let discovery = Discovery::new(registry.clone(), Duration::from_secs(3600));
        discovery.discover(Family::OpusMt).await;
        discovery.discover(Family::OpusMt).await;
        assert_eq!(registry.0.load(std::sync::atomic::Ordering::SeqCst), 1);
        discovery.clear_cache().await;
        discovery.discover(Family::OpusMt).await;
        assert_eq!(registry.0.load(std::sync::atomic::Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn serves_stale_value_on_registry_failure() {
        struct FlakyRegistry(std::sync::atomic::AtomicUsize);
        #[async_trait]
        impl OpusRegistry for FlakyRegistry {
            async fn fetch_pairs(&self) -> anyhow::Result<HashSet<Pair>> {
                let n = self.0.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                if n == 0 {
                    Ok(HashSet::from([Pair::new("en", "de")]))
                } else {
                    Err(anyhow::anyhow!("registry unreachable"))
                }
            }
        }
        let registry = Arc::new(FlakyRegistry(std::sync::atomic::AtomicUsize::new(0)));
        let discovery = Discovery::new(registry, Duration::from_millis(1));
        let first = discovery.discover(Family::OpusMt).await;
        assert!(first.contains(&Pair::new("en", "de")));
        tokio::time::sleep(Duration::from_millis(5)).await;
        let second = discovery.discover(Family::OpusMt).await;
        assert_eq!(*second, *first);
    }
}
