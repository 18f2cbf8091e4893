//! Pivot Planner (C5): picks a two-hop path via a bridging language when
//! no family supports the pair directly (spec §4.5). Deterministic and
//! pure over the `AvailablePairs` sets it's given.

use std::collections::HashSet;

use crate::discovery::Discovery;
use crate::lang::{Family, Lang, Pair};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PivotPlan {
    pub hops: [(Lang, Lang); 2],
    pub family_for_hop1: Family,
    pub family_for_hop2: Family,
}

impl PivotPlan {
    pub fn path_string(&self) -> String {
        format!(
            "{}->{}->{}",
            self.hops[0].0, self.hops[0].1, self.hops[1].1
        )
    }
}

const INDIC_TARGETS: &[&str] = &["hi", "bn", "ta", "te", "ml", "mr", "gu", "pa", "ne", "si"];
const INDIC_PRIORITY: &[&str] = &["hi", "bn", "ta"];

fn is_indic(lang: &str) -> bool {
    INDIC_TARGETS.contains(&lang)
}

/// Ranks pivot-language candidates: `pivot_lang` first if present, then a
/// static priority order for Indic-script targets, then alphabetical
/// (spec §4.5).
fn rank_candidates(mut candidates: Vec<Lang>, pivot_lang: &str, tgt: &str) -> Vec<Lang> {
    candidates.sort();
    fn priority_index<'a>(lang: &'a Lang, pivot_lang: &str, tgt: &str) -> (u8, u8, &'a str) {
        if lang.as_str() == pivot_lang {
            (0, 0, lang.as_str())
        } else if is_indic(tgt) {
            let rank = INDIC_PRIORITY
                .iter()
                .position(|p| *p == lang.as_str())
                .map(|i| i as u8)
                .unwrap_or(u8::MAX);
            (1, rank, lang.as_str())
        } else {
            (2, 0, lang.as_str())
        }
    }
    candidates.sort_by(|a, b| {
        priority_index(a, pivot_lang, tgt).cmp(&priority_index(b, pivot_lang, tgt))
    });
    candidates
}

/// Computes `R ∩ L` for one family: `R = {m : (src,m) ∈ pairs}`,
/// `L = {m : (m,tgt) ∈ pairs}` (spec §4.5).
fn bridge_candidates(pairs: &HashSet<Pair>, src: &Lang, tgt: &Lang) -> Vec<Lang> {
    let r: HashSet<&Lang> = pairs.iter().filter(|p| &p.src == src).map(|p| &p.tgt).collect();
    let l: HashSet<&Lang> = pairs.iter().filter(|p| &p.tgt == tgt).map(|p| &p.src).collect();
    r.intersection(&l).map(|&l| l.clone()).collect()
}

/// Finds the first family (in `family_order`) with a non-empty bridge
/// between `src` and `tgt`, and returns its best-ranked plan. Cross-family
/// pivots (hop1 in one family, hop2 in another) are a permitted
/// implementer choice the spec leaves open (§9 "Open questions"); this
/// planner keeps both hops in the same family, matching "cross-family
/// pivots are permitted by retrying with the next family" — the caller
/// (the orchestrator) is the one that retries across families, not this
/// function, keeping `plan` pure and single-family per call.
pub async fn plan(
    discovery: &Discovery,
    family_order: &[Family],
    src: &Lang,
    tgt: &Lang,
    pivot_lang: &str,
) -> Option<PivotPlan> {
    for &family in family_order {
        let pairs = discovery.discover(family).await;
        let candidates = bridge_candidates(&pairs, src, tgt);
        if candidates.is_empty() {
            continue;
        }
        let ranked = rank_candidates(candidates, pivot_lang, tgt.as_str());
        let mid = ranked.into_iter().next()?;
        return Some(PivotPlan {
            hops: [(src.clone(), mid.clone()), (mid, tgt.clone())],
            family_for_hop1: family,
            family_for_hop2: family,
        });
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::StaticOpusRegistry;
    use std::time::Duration;

    fn discovery_with(pairs: &[(&str, &str)]) -> Discovery {
        let registry = StaticOpusRegistry::new(pairs.iter().map(|(s, t)| Pair::new(*s, *t)));
        Discovery::new(std::sync::Arc::new(registry), Duration::from_secs(3600))
    }

    #[tokio::test]
    async fn finds_single_hop_bridge() {
        let discovery = discovery_with(&[("ja", "hi"), ("hi", "de")]);
        let plan = plan(
            &discovery,
            &[Family::OpusMt],
            &Lang::new("ja"),
            &Lang::new("de"),
            "en",
        )
        .await
        .unwrap();
        assert_eq!(plan.path_string(), "ja->hi->de");
        assert_eq!(plan.family_for_hop1, Family::OpusMt);
        assert_eq!(plan.family_for_hop2, Family::OpusMt);
    }

    #[tokio::test]
    async fn prefers_configured_pivot_lang() {
        let discovery = discovery_with(&[("ja", "en"), ("en", "de"), ("ja", "fr"), ("fr", "de")]);
        let plan = plan(
            &discovery,
            &[Family::OpusMt],
            &Lang::new("ja"),
            &Lang::new("de"),
            "en",
        )
        .await
        .unwrap();
        assert_eq!(plan.hops[0].1.as_str(), "en");
    }

    #[tokio::test]
    async fn prefers_indic_priority_for_indic_targets() {
        let discovery = discovery_with(&[
            ("ja", "bn"),
            ("bn", "ta"),
            ("ja", "hi"),
            ("hi", "ta"),
        ]);
        let plan = plan(
            &discovery,
            &[Family::OpusMt],
            &Lang::new("ja"),
            &Lang::new("ta"),
            "en",
        )
        .await
        .unwrap();
        // Neither bridge lang is the configured pivot, so Indic priority
        // (hi before bn) decides.
        assert_eq!(plan.hops[0].1.as_str(), "hi");
    }

    #[tokio::test]
    async fn returns_none_when_no_bridge_exists() {
        let discovery = discovery_with(&[("en", "fr")]);
        let result = plan(
            &discovery,
            &[Family::OpusMt],
            &Lang::new("ja"),
            &Lang::new("de"),
            "en",
        )
        .await;
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn pivot_validity_both_legs_present_in_same_family() {
        let discovery = discovery_with(&[("ja", "hi"), ("hi", "de")]);
        let pairs = discovery.discover(Family::OpusMt).await;
        let plan = plan(
            &discovery,
            &[Family::OpusMt],
            &Lang::new("ja"),
            &Lang::new("de"),
            "en",
        )
        .await
        .unwrap();
        assert!(pairs.contains(&Pair::new(plan.hops[0].0.clone(), plan.hops[0].1.clone())));
        assert!(pairs.contains(&Pair::new(plan.hops[1].0.clone(), plan.hops[1].1.clone())));
    }
}
