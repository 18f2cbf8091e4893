//! Model Router (C4): given a pair and an optional caller-preferred family,
//! produces the ordered candidate list the orchestrator walks until one
//! loads and translates successfully (spec §4.4).

use crate::config::Config;
use crate::discovery::Discovery;
use crate::lang::{Family, Pair};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub family: Family,
    pub model_id: String,
    pub src_code: String,
    pub tgt_code: String,
}

/// Builds the ordered candidate list for `pair` (spec §4.4):
/// 1. Start from `MODEL_FALLBACK_ORDER`.
/// 2. If the caller passed a `preferred_family`, move it to the front.
/// 3. Drop opus-mt unless discovery confirms the pair is available; drop
///    mbart50/m2m100 unless both languages are in the family's fixed set.
/// 4. If `AUTO_MODEL_FALLBACK` is false, keep only the first surviving
///    entry (no fallback across families).
pub async fn route(
    cfg: &Config,
    discovery: &Discovery,
    pair: &Pair,
    preferred_family: Option<Family>,
) -> Vec<Candidate> {
    let mut order = cfg.model_fallback_order.clone();
    if let Some(preferred) = preferred_family {
        order.retain(|f| *f != preferred);
        order.insert(0, preferred);
    }

    let mut candidates = Vec::with_capacity(order.len());
    for family in order {
        if !family_supports_pair(family, discovery, pair).await {
            continue;
        }
        candidates.push(Candidate {
            family,
            model_id: family.model_id(pair),
            src_code: family.code_for(&pair.src),
            tgt_code: family.code_for(&pair.tgt),
        });
        if !cfg.auto_model_fallback {
            break;
        }
    }
    candidates
}

async fn family_supports_pair(family: Family, discovery: &Discovery, pair: &Pair) -> bool {
    match family {
        Family::OpusMt => discovery.discover(Family::OpusMt).await.contains(pair),
        Family::Mbart50 | Family::M2m100 => {
            family.supports_lang(&pair.src) && family.supports_lang(&pair.tgt)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::StaticOpusRegistry;
    use std::sync::Arc;
    use std::time::Duration;

    fn discovery_with(pairs: &[(&str, &str)]) -> Discovery {
        let registry = StaticOpusRegistry::new(pairs.iter().map(|(s, t)| Pair::new(*s, *t)));
        Discovery::new(Arc::new(registry), Duration::from_secs(3600))
    }

    #[tokio::test]
    async fn direct_opus_mt_pair_is_first_when_available() {
        let discovery = discovery_with(&[("en", "de")]);
        let cfg = Config::default();
        let candidates = route(&cfg, &discovery, &Pair::new("en", "de"), None).await;
        assert_eq!(candidates[0].family, Family::OpusMt);
        assert_eq!(candidates[0].model_id, "helsinki-nlp/opus-mt-en-de");
    }

    #[tokio::test]
    async fn falls_back_to_mbart50_when_opus_mt_missing_pair() {
        let discovery = discovery_with(&[]);
        let cfg = Config::default();
        let candidates = route(&cfg, &discovery, &Pair::new("en", "de"), None).await;
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].family, Family::Mbart50);
        assert_eq!(candidates[1].family, Family::M2m100);
    }

    #[tokio::test]
    async fn excludes_families_that_lack_the_language() {
        // "qq" is in none of the fixed sets and has no opus-mt pair either.
        let discovery = discovery_with(&[]);
        let cfg = Config::default();
        let candidates = route(&cfg, &discovery, &Pair::new("en", "qq"), None).await;
        assert!(candidates.is_empty());
    }

    #[tokio::test]
    async fn preferred_family_is_moved_to_front() {
        let discovery = discovery_with(&[("en", "de")]);
        let cfg = Config::default();
        let candidates = route(
            &cfg,
            &discovery,
            &Pair::new("en", "de"),
            Some(Family::M2m100),
        )
        .await;
        assert_eq!(candidates[0].family, Family::M2m100);
        assert_eq!(candidates[1].family, Family::OpusMt);
    }

    #[tokio::test]
    async fn disabling_auto_fallback_keeps_only_first_candidate() {
        let discovery = discovery_with(&[]);
        let cfg = Config {
            auto_model_fallback: false,
            ..Config::default()
        };
        let candidates = route(&cfg, &discovery, &Pair::new("en", "de"), None).await;
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].family, Family::Mbart50);
    }

    #[tokio::test]
    async fn mbart50_uses_region_tagged_codes() {
        let discovery = discovery_with(&[]);
        let cfg = Config::default();
        let candidates = route(&cfg, &discovery, &Pair::new("en", "hi"), None).await;
        let mbart = candidates
            .iter()
            .find(|c| c.family == Family::Mbart50)
            .unwrap();
        assert_eq!(mbart.src_code, "en_XX");
        assert_eq!(mbart.tgt_code, "hi_IN");
    }
}
