//! Translation Orchestrator (C7): the end-to-end request driver composing
//! C1 (preprocessing), C4 (routing), C5 (pivoting), C3 (the pipeline
//! cache), and C6 (the queue) into one request lifecycle (spec §4.7).

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::cache::PipelineCache;
use crate::config::Config;
use crate::detect::LanguageDetector;
use crate::discovery::Discovery;
use crate::error::ServeError;
use crate::lang::{Family, Lang, Pair};
use crate::preprocess;
use crate::queue::Queue;
use crate::pivot;
use crate::router::{self, Candidate};
use crate::runtime::TranslateOptions;

/// Per-request input, already normalized at the edge (spec §3,
/// "TranslationJob"; spec §9, "Dynamic-typed request body").
#[derive(Debug, Clone)]
pub struct TranslationJob {
    pub texts: Vec<String>,
    pub src: Option<Lang>,
    pub tgt: Lang,
    pub beam_size: u32,
    pub perform_sentence_splitting: bool,
    pub preferred_family: Option<Family>,
    pub include_metadata: bool,
}

#[derive(Debug, Clone, Default)]
pub struct Metadata {
    pub model_name: String,
    pub family: String,
    pub languages_used: Vec<String>,
    pub chunks_processed: usize,
    pub chunk_size: usize,
    pub auto_chunked: bool,
    pub pivot_path: Option<String>,
}

#[derive(Debug, Clone)]
pub struct TranslationResult {
    pub translated: Vec<String>,
    pub detected_langs: Option<Vec<Lang>>,
    pub pivot_path: Option<String>,
    pub metadata: Option<Metadata>,
    pub translation_time: f64,
}

struct ItemSuccess {
    text: String,
    family: Family,
    model_id: String,
    src_lang: Lang,
    tgt_lang: Lang,
    chunks: usize,
    auto_chunked: bool,
    pivot_path: Option<String>,
}

pub struct Orchestrator {
    cfg: Arc<Config>,
    cache: Arc<PipelineCache>,
    discovery: Arc<Discovery>,
    queue: Arc<Queue>,
    detector: Arc<dyn LanguageDetector>,
}

impl Orchestrator {
    pub fn new(
        cfg: Arc<Config>,
        cache: Arc<PipelineCache>,
        discovery: Arc<Discovery>,
        queue: Arc<Queue>,
        detector: Arc<dyn LanguageDetector>,
    ) -> Self {
        Orchestrator {
            cfg,
            cache,
            discovery,
            queue,
            detector,
        }
    }

    /// Runs the full lifecycle for `job` (spec §4.7 steps 1-5).
    pub async fn translate(&self, job: TranslationJob) -> Result<TranslationResult, ServeError> {
        if job.texts.is_empty() {
            return Ok(TranslationResult {
                translated: Vec::new(),
                detected_langs: None,
                pivot_path: None,
                metadata: None,
                translation_time: 0.0,
            });
        }

        let slot = self.acquire_slot().await?;
        let start = Instant::now();

        let detect_per_item = job.src.is_none();
        let mut detected_langs = Vec::with_capacity(job.texts.len());
        let mut translated = Vec::with_capacity(job.texts.len());
        let mut languages_used = std::collections::BTreeSet::new();
        let mut first_family: Option<Family> = None;
        let mut first_model_id: Option<String> = None;
        let mut pivot_path: Option<String> = None;
        let mut chunks_processed = 0usize;
        let mut auto_chunked = false;

        for text in &job.texts {
            if preprocess::is_noise(text, &self.cfg) {
                detected_langs.push(Lang::undetermined());
                translated.push(self.cfg.sanitize_placeholder.clone());
                continue;
            }

            let src_lang = if detect_per_item {
                self.detector.detect(text)
            } else {
                job.src.clone().unwrap()
            };
            detected_langs.push(src_lang.clone());

            let pair = Pair::new(src_lang, job.tgt.clone());
            match self.translate_item(&pair, text, &job).await {
                Ok(success) => {
                    languages_used.insert(success.src_lang.to_string());
                    languages_used.insert(success.tgt_lang.to_string());
                    if first_family.is_none() {
                        first_family = Some(success.family);
                        first_model_id = Some(success.model_id.clone());
                    }
                    if pivot_path.is_none() {
                        pivot_path = success.pivot_path.clone();
                    }
                    chunks_processed += success.chunks;
                    auto_chunked = auto_chunked || success.auto_chunked;
                    translated.push(success.text);
                }
                Err(err) => {
                    if self.cfg.align_responses {
                        translated.push(self.cfg.sanitize_placeholder.clone());
                    } else {
                        // A single unaligned failure fails the whole
                        // request rather than returning a response with
                        // some positions silently dropped.
                        slot.record_duration(start.elapsed());
                        return Err(err);
                    }
                }
            }
        }

        let duration = start.elapsed();
        slot.record_duration(duration);

        let metadata = job.include_metadata.then(|| Metadata {
            model_name: first_model_id.unwrap_or_default(),
            family: first_family.map(|f| f.as_str().to_string()).unwrap_or_default(),
            languages_used: languages_used.into_iter().collect(),
            chunks_processed,
            chunk_size: self.cfg.max_chunk_chars,
            auto_chunked,
            pivot_path: pivot_path.clone(),
        });

        Ok(TranslationResult {
            translated,
            detected_langs: detect_per_item.then_some(detected_langs),
            pivot_path,
            metadata,
            translation_time: duration.as_secs_f64(),
        })
    }

    async fn acquire_slot(&self) -> Result<crate::queue::Slot<'_>, ServeError> {
        if self.cfg.translate_timeout_sec == 0 {
            return self.queue.acquire().await;
        }
        let deadline = Duration::from_secs(self.cfg.translate_timeout_sec);
        match tokio::time::timeout(deadline, self.queue.acquire()).await {
            Ok(result) => result,
            Err(_) => Err(ServeError::TranslationTimeout),
        }
    }

    async fn translate_item(
        &self,
        pair: &Pair,
        text: &str,
        job: &TranslationJob,
    ) -> Result<ItemSuccess, ServeError> {
        let candidates = router::route(&self.cfg, &self.discovery, pair, job.preferred_family).await;

        for candidate in &candidates {
            if let Ok((joined, chunks, auto_chunked)) =
                self.translate_candidate(candidate, text, job).await
            {
                return Ok(ItemSuccess {
                    text: joined,
                    family: candidate.family,
                    model_id: candidate.model_id.clone(),
                    src_lang: pair.src.clone(),
                    tgt_lang: pair.tgt.clone(),
                    chunks,
                    auto_chunked,
                    pivot_path: None,
                });
            }
        }

        if let Some(plan) = pivot::plan(
            &self.discovery,
            &self.cfg.model_fallback_order,
            &pair.src,
            &pair.tgt,
            &self.cfg.pivot_lang,
        )
        .await
        {
            let hop1_pair = Pair::new(plan.hops[0].0.clone(), plan.hops[0].1.clone());
            let hop2_pair = Pair::new(plan.hops[1].0.clone(), plan.hops[1].1.clone());
            let hop1 = Candidate {
                family: plan.family_for_hop1,
                model_id: plan.family_for_hop1.model_id(&hop1_pair),
                src_code: plan.family_for_hop1.code_for(&hop1_pair.src),
                tgt_code: plan.family_for_hop1.code_for(&hop1_pair.tgt),
            };
            let hop2 = Candidate {
                family: plan.family_for_hop2,
                model_id: plan.family_for_hop2.model_id(&hop2_pair),
                src_code: plan.family_for_hop2.code_for(&hop2_pair.src),
                tgt_code: plan.family_for_hop2.code_for(&hop2_pair.tgt),
            };

            if let Ok((mid_text, c1, a1)) = self.translate_candidate(&hop1, text, job).await {
                if let Ok((final_text, c2, a2)) =
                    self.translate_candidate(&hop2, &mid_text, job).await
                {
                    return Ok(ItemSuccess {
                        text: final_text,
                        family: hop2.family,
                        model_id: hop2.model_id.clone(),
                        src_lang: pair.src.clone(),
                        tgt_lang: pair.tgt.clone(),
                        chunks: c1 + c2,
                        auto_chunked: a1 || a2,
                        pivot_path: Some(plan.path_string()),
                    });
                }
            }
        }

        if candidates.is_empty() {
            Err(ServeError::UnsupportedLanguagePair {
                src: pair.src.to_string(),
                tgt: pair.tgt.to_string(),
            })
        } else {
            Err(ServeError::ModelLoadFailed {
                src: pair.src.to_string(),
                tgt: pair.tgt.to_string(),
            })
        }
    }

    /// Runs one `(model_id, family)` candidate end-to-end over `text`:
    /// split/chunk, mask, batch-infer, unmask, rejoin (spec §4.7.1).
    async fn translate_candidate(
        &self,
        candidate: &Candidate,
        text: &str,
        job: &TranslationJob,
    ) -> Result<(String, usize, bool), ServeError> {
        let (chunk_texts, auto_chunked) = if job.perform_sentence_splitting {
            let sentences = preprocess::split_sentences(text, &self.cfg);
            let chunks = preprocess::chunk(&sentences, self.cfg.max_chunk_chars, 0);
            let texts = chunks
                .iter()
                .map(|c| c.text(&self.cfg.join_sentences_with))
                .collect::<Vec<_>>();
            (texts, false)
        } else {
            let pieces = preprocess::auto_chunk_if_enabled(text, &self.cfg);
            let auto_chunked = pieces.len() > 1;
            (pieces, auto_chunked)
        };

        if chunk_texts.is_empty() {
            return Ok((String::new(), 0, auto_chunked));
        }

        let masked: Vec<(String, Vec<String>)> = chunk_texts
            .iter()
            .map(|c| preprocess::mask(c, &self.cfg))
            .collect();

        let key = crate::lang::CacheKey::new(
            &Pair::new(candidate.src_code.as_str(), candidate.tgt_code.as_str()),
            candidate.family,
        );
        let pipeline = self
            .cache
            .get_or_load(&key, &candidate.model_id, candidate.family)
            .await
            .map_err(|_| ServeError::ModelLoadFailed {
                src: candidate.src_code.clone(),
                tgt: candidate.tgt_code.clone(),
            })?;

        let beam_size = job
            .beam_size
            .min(self.cfg.easynmt_max_beam_size.unwrap_or(u32::MAX));
        let opts = TranslateOptions {
            batch_size: self.cfg.easynmt_batch_size,
            beam_size,
            max_length: self.cfg.easynmt_max_text_len,
            src_code: candidate.src_code.clone(),
            tgt_code: candidate.tgt_code.clone(),
        };

        let mut outputs = Vec::with_capacity(masked.len());
        for batch in masked.chunks(self.cfg.easynmt_batch_size.max(1)) {
            let batch_texts: Vec<String> = batch.iter().map(|(m, _)| m.clone()).collect();
            let batch_outputs = pipeline
                .translate(&batch_texts, &opts)
                .await
                .map_err(|_| ServeError::ModelLoadFailed {
                    src: candidate.src_code.clone(),
                    tgt: candidate.tgt_code.clone(),
                })?;
            for (out, (_, originals)) in batch_outputs.into_iter().zip(batch.iter()) {
                outputs.push(preprocess::unmask(&out, originals));
            }
        }

        Ok((
            outputs.join(&self.cfg.join_sentences_with),
            chunk_texts.len(),
            auto_chunked,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::PipelineCache;
    use crate::config::DeviceKind;
    use crate::detect::HeuristicDetector;
    use crate::device::Device;
    use crate::discovery::StaticOpusRegistry;
    use crate::runtime::MockRuntime;
    use std::time::Duration as StdDuration;

    fn test_device() -> Device {
        Device {
            kind: DeviceKind::Cpu,
            index: 0,
        }
    }

    fn build(cfg: Config, pairs: &[(&str, &str)]) -> Orchestrator {
        let cfg = Arc::new(cfg);
        let cache = Arc::new(PipelineCache::new(
            Arc::new(MockRuntime::new()),
            test_device(),
            &cfg,
        ));
        let registry = StaticOpusRegistry::new(pairs.iter().map(|(s, t)| Pair::new(*s, *t)));
        let discovery = Arc::new(Discovery::new(Arc::new(registry), StdDuration::from_secs(3600)));
        let queue = Arc::new(Queue::new(&cfg, 4));
        Orchestrator::new(cfg, cache, discovery, queue, Arc::new(HeuristicDetector))
    }

    fn job(texts: &[&str], tgt: &str, src: Option<&str>) -> TranslationJob {
        TranslationJob {
            texts: texts.iter().map(|s| s.to_string()).collect(),
            src: src.map(Lang::new),
            tgt: Lang::new(tgt),
            beam_size: 5,
            perform_sentence_splitting: true,
            preferred_family: None,
            include_metadata: true,
        }
    }

    #[tokio::test]
    async fn direct_translation_uses_opus_mt_and_is_aligned() {
        let orchestrator = build(Config::default(), &[("en", "de")]);
        let result = orchestrator
            .translate(job(&["Hello world"], "de", Some("en")))
            .await
            .unwrap();
        assert_eq!(result.translated.len(), 1);
        assert!(!result.translated[0].is_empty());
        assert_eq!(result.metadata.unwrap().family, "opus-mt");
    }

    #[tokio::test]
    async fn falls_back_to_mbart50_when_opus_mt_lacks_the_pair() {
        let orchestrator = build(Config::default(), &[]);
        let result = orchestrator
            .translate(job(&["Hello world"], "bn", Some("en")))
            .await
            .unwrap();
        assert_eq!(result.metadata.unwrap().family, "mbart50");
    }

    #[tokio::test]
    async fn pivots_when_no_family_supports_the_pair_directly() {
        let orchestrator = build(Config::default(), &[("ja", "hi"), ("hi", "de")]);
        let result = orchestrator
            .translate(job(&["こんにちは"], "de", Some("ja")))
            .await
            .unwrap();
        assert_eq!(result.pivot_path.as_deref(), Some("ja->hi->de"));
    }

    #[tokio::test]
    async fn empty_text_list_returns_empty_aligned_response() {
        let orchestrator = build(Config::default(), &[("en", "de")]);
        let result = orchestrator
            .translate(job(&[], "de", Some("en")))
            .await
            .unwrap();
        assert!(result.translated.is_empty());
    }

    #[tokio::test]
    async fn detects_source_language_when_absent() {
        let orchestrator = build(Config::default(), &[("ja", "de")]);
        let result = orchestrator
            .translate(job(&["こんにちは"], "de", None))
            .await
            .unwrap();
        assert_eq!(result.detected_langs.unwrap()[0].as_str(), "ja");
    }

    #[tokio::test]
    async fn unsupported_pair_with_no_pivot_is_reported() {
        let orchestrator = build(Config::default(), &[]);
        let err = orchestrator
            .translate(job(&["hello"], "qq", Some("en")))
            .await
            .unwrap_err();
        assert!(matches!(err, ServeError::UnsupportedLanguagePair { .. }));
    }

    #[tokio::test]
    async fn masking_preserves_symbols_through_translation() {
        let mut cfg = Config::default();
        cfg.mask_digits = true;
        cfg.mask_punct = true;
        cfg.mask_emoji = true;
        let orchestrator = build(cfg, &[("en", "de")]);
        let result = orchestrator
            .translate(job(
                &["Price: $9.99 (20% off)! \u{1F389}"],
                "de",
                Some("en"),
            ))
            .await
            .unwrap();
        let out = &result.translated[0];
        for needle in ["$9.99", "20%", "!", "\u{1F389}"] {
            assert!(out.contains(needle), "expected {out:?} to contain {needle:?}");
        }
    }
}
