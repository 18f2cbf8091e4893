//! Inference runtime collaborator (spec §6.2, §9 "Duck-typed pipelines").
//!
//! The actual transformer inference is delegated to an external runtime —
//! out of scope per spec §1. This module defines the capability set the
//! Pipeline Cache (C3) depends on and a deterministic stand-in
//! implementation used by tests and by default when no real runtime is
//! wired in, so the rest of the service (routing, chunking, masking,
//! queueing, eviction) can be exercised end-to-end.

use async_trait::async_trait;

use crate::error::ModelLoadError;
use crate::lang::Family;

/// Per-call shaping knobs passed to `translate` (spec §6.2, §4.7.1).
#[derive(Debug, Clone)]
pub struct TranslateOptions {
    pub batch_size: usize,
    pub beam_size: u32,
    pub max_length: Option<usize>,
    pub src_code: String,
    pub tgt_code: String,
}

/// A loaded, ready-to-call inference handle (spec glossary, "Pipeline").
/// Ownership belongs exclusively to the Pipeline Cache; this trait is the
/// capability set external code is allowed to call on it.
#[async_trait]
pub trait Pipeline: Send + Sync {
    async fn translate(
        &self,
        texts: &[String],
        opts: &TranslateOptions,
    ) -> Result<Vec<String>, ModelLoadError>;

    /// Release device memory. Called exactly once, by the cache, when the
    /// pipeline is evicted or the process shuts down.
    async fn release(&self);

    /// Rough resident-size hint in megabytes, used by `put` to size the
    /// cache's memory-pressure bookkeeping (spec §3, "Pipeline.size_hint").
    fn size_hint_mb(&self) -> u64 {
        512
    }
}

/// Loads pipelines for a given `(model_id, family, device)`. The Pipeline
/// Cache calls this outside its lock on a cache miss (spec §4.3).
#[async_trait]
pub trait InferenceRuntime: Send + Sync {
    async fn load(
        &self,
        model_id: &str,
        family: Family,
        device_index: i32,
    ) -> Result<Box<dyn Pipeline>, ModelLoadError>;
}

/// Deterministic stand-in runtime: "translation" is the identity function
/// tagged with the target code, so tests can assert on family/pivot
/// selection and alignment without a real model. `NotAvailable` is
/// returned for model ids the caller marks as unsupported, which is how
/// tests exercise the family-fallback and pivot paths.
pub struct MockRuntime {
    pub unavailable_model_ids: Vec<String>,
}

impl MockRuntime {
    pub fn new() -> Self {
        MockRuntime {
            unavailable_model_ids: Vec::new(),
        }
    }

    pub fn with_unavailable(mut self, model_id: impl Into<String>) -> Self {
        self.unavailable_model_ids.push(model_id.into());
        self
    }
}

impl Default for MockRuntime {
    fn default() -> Self {
        Self::new()
    }
}

struct MockPipeline {
    tgt_code_default: String,
}

#[async_trait]
impl Pipeline for MockPipeline {
    async fn translate(
        &self,
        texts: &[String],
        opts: &TranslateOptions,
    ) -> Result<Vec<String>, ModelLoadError> {
        Ok(texts
            .iter()
            .map(|t| format!("[{}] {}", opts.tgt_code.clone(), t))
            .collect())
    }

    async fn release(&self) {
        let _ = &self.tgt_code_default;
    }
}

#[async_trait]
impl InferenceRuntime for MockRuntime {
    async fn load(
        &self,
        model_id: &str,
        _family: Family,
        _device_index: i32,
    ) -> Result<Box<dyn Pipeline>, ModelLoadError> {
        if self.unavailable_model_ids.iter().any(|m| m == model_id) {
            return Err(ModelLoadError::NotAvailable {
                model_id: model_id.to_string(),
            });
        }
        Ok(Box::new(MockPipeline {
            tgt_code_default: String::new(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_runtime_translates_as_identity_tagged_with_target() {
        let runtime = MockRuntime::new();
        let pipeline = runtime
            .load("helsinki-nlp/opus-mt-en-de", Family::OpusMt, 0)
            .await
            .unwrap();
        let opts = TranslateOptions {
            batch_size: 8,
            beam_size: 5,
            max_length: None,
            src_code: "en".to_string(),
            tgt_code: "de".to_string(),
        };
        let out = pipeline
            .translate(&["hello".to_string()], &opts)
            .await
            .unwrap();
        assert_eq!(out, vec!["[de] hello".to_string()]);
    }

    #[tokio::test]
    async fn mock_runtime_rejects_marked_unavailable_model() {
        let runtime = MockRuntime::new().with_unavailable("bad-model");
        let result = runtime.load("bad-model", Family::OpusMt, 0).await;
        assert!(matches!(result, Err(ModelLoadError::NotAvailable { .. })));
    }
}
