//! Typed configuration loaded once from the process environment at startup
//! (spec §6.3). Nothing in this crate re-reads `std::env` after `Config::from_env`
//! returns; every component receives its knobs through this struct.

use std::env;
use std::time::Duration;

use crate::lang::Family;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceKind {
    Cpu,
    Gpu,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Clone)]
pub struct Config {
    // --- device selection (C2) ---
    pub device: Option<DeviceKind>,
    pub device_index: i32,
    pub use_gpu: Option<bool>,
    pub max_workers_backend: usize,
    pub max_workers_frontend: usize,

    // --- model family / fallback (C4) ---
    pub model_fallback_order: Vec<Family>,
    pub auto_model_fallback: bool,

    // --- pipeline cache (C3) ---
    pub max_cached_models: usize,
    pub model_idle_timeout: Duration,
    pub idle_check_interval: Duration,
    pub cuda_cache_clear_interval: Option<Duration>,

    // --- memory thresholds (C3/C9) ---
    pub memory_monitoring_enabled: bool,
    pub memory_critical_threshold_pct: f64,
    pub gpu_memory_critical_threshold_pct: f64,
    pub memory_hysteresis_pct: f64,

    // --- queueing (C6) ---
    pub enable_queue: bool,
    /// `None` means unset: the Device Resolver's derived default (1 on GPU,
    /// `MAX_WORKERS_BACKEND` on CPU) applies. Deliberately not a `usize`
    /// with a concrete default — that would make the device-derived branch
    /// in `Device::default_max_inflight` unreachable in the common case of
    /// an operator who never sets this var (spec §5).
    pub max_inflight_translations: Option<usize>,
    pub max_queue_size: usize,
    pub translate_timeout_sec: u64,
    pub retry_after_alpha: f64,
    pub retry_after_min_sec: f64,
    pub retry_after_max_sec: f64,

    // --- input sanitization (C1) ---
    pub input_min_chars: usize,
    pub input_min_alnum_ratio: f64,
    pub sanitize_placeholder: String,

    // --- response alignment ---
    pub align_responses: bool,

    // --- sentence / chunk sizes (C1) ---
    pub max_sentence_chars: usize,
    pub max_chunk_chars: usize,
    pub join_sentences_with: String,
    pub auto_chunk: bool,
    pub auto_chunk_max_chars: usize,

    // --- symbol masking (C1) ---
    pub mask_digits: bool,
    pub mask_punct: bool,
    pub mask_emoji: bool,

    // --- pivot (C5) ---
    pub pivot_lang: String,

    // --- inference runtime shaping (C7.1) ---
    pub easynmt_batch_size: usize,
    pub easynmt_max_beam_size: Option<u32>,
    pub easynmt_max_text_len: Option<usize>,

    // --- discovery (C8) ---
    pub discovery_ttl: Duration,

    // --- logging ---
    pub log_level: String,
    pub log_format: LogFormat,

    // --- shutdown ---
    pub graceful_timeout: Duration,

    // --- server ---
    pub bind_addr: String,
}

fn env_str(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> anyhow::Result<T> {
    match env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|_| anyhow::anyhow!("{key}={raw:?} is not a valid value")),
        Err(_) => Ok(default),
    }
}

fn env_parse_opt<T: std::str::FromStr>(key: &str) -> anyhow::Result<Option<T>> {
    match env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .map(Some)
            .map_err(|_| anyhow::anyhow!("{key}={raw:?} is not a valid value")),
        Err(_) => Ok(None),
    }
}

fn env_bool(key: &str, default: bool) -> anyhow::Result<bool> {
    match env::var(key) {
        Ok(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(anyhow::anyhow!("{key}={raw:?} is not a valid boolean")),
        },
        Err(_) => Ok(default),
    }
}

fn env_bool_opt(key: &str) -> anyhow::Result<Option<bool>> {
    match env::var(key) {
        Ok(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(Some(true)),
            "0" | "false" | "no" | "off" => Ok(Some(false)),
            _ => Err(anyhow::anyhow!("{key}={raw:?} is not a valid boolean")),
        },
        Err(_) => Ok(None),
    }
}

impl Config {
    /// Parse configuration from the environment. Malformed values are
    /// fatal — the service never starts half-configured (SPEC_FULL §0.3).
    pub fn from_env() -> anyhow::Result<Self> {
        let device = match env::var("DEVICE") {
            Ok(v) if v.eq_ignore_ascii_case("cpu") => Some(DeviceKind::Cpu),
            Ok(v) if v.eq_ignore_ascii_case("gpu") => Some(DeviceKind::Gpu),
            Ok(v) if !v.is_empty() => {
                return Err(anyhow::anyhow!("DEVICE={v:?} must be \"cpu\" or \"gpu\""))
            }
            _ => None,
        };

        let enable_queue = env_bool("ENABLE_QUEUE", true)?;
        let mut max_queue_size = env_parse("MAX_QUEUE_SIZE", 50usize)?;
        if !enable_queue && max_queue_size != 0 {
            tracing::warn!(
                max_queue_size,
                "ENABLE_QUEUE=false with MAX_QUEUE_SIZE set; queue size ignored"
            );
            max_queue_size = 0;
        }

        let log_format = match env_str("LOG_FORMAT", "text").as_str() {
            "json" => LogFormat::Json,
            _ => LogFormat::Text,
        };

        Ok(Config {
            device,
            device_index: env_parse("GPU_INDEX", 0i32)?,
            use_gpu: env_bool_opt("USE_GPU")?,
            max_workers_backend: env_parse("MAX_WORKERS_BACKEND", 4usize)?,
            max_workers_frontend: env_parse("MAX_WORKERS_FRONTEND", 8usize)?,

            model_fallback_order: parse_family_order(&env_str(
                "MODEL_FALLBACK_ORDER",
                "opus-mt,mbart50,m2m100",
            ))?,
            auto_model_fallback: env_bool("AUTO_MODEL_FALLBACK", true)?,

            max_cached_models: env_parse("MAX_CACHED_MODELS", 3usize)?,
            model_idle_timeout: Duration::from_secs(env_parse("MODEL_IDLE_TIMEOUT", 600u64)?),
            idle_check_interval: Duration::from_secs(env_parse("IDLE_CHECK_INTERVAL", 60u64)?),
            cuda_cache_clear_interval: {
                let secs = env_parse("CUDA_CACHE_CLEAR_INTERVAL_SEC", 0u64)?;
                (secs > 0).then(|| Duration::from_secs(secs))
            },

            memory_monitoring_enabled: env_bool("MEMORY_MONITORING_ENABLED", true)?,
            memory_critical_threshold_pct: env_parse("MEMORY_CRITICAL_THRESHOLD", 90.0f64)?,
            gpu_memory_critical_threshold_pct: env_parse(
                "GPU_MEMORY_CRITICAL_THRESHOLD",
                90.0f64,
            )?,
            memory_hysteresis_pct: env_parse("MEMORY_HYSTERESIS", 10.0f64)?,

            enable_queue,
            max_inflight_translations: env_parse_opt("MAX_INFLIGHT_TRANSLATIONS")?,
            max_queue_size,
            translate_timeout_sec: env_parse("TRANSLATE_TIMEOUT_SEC", 30u64)?,
            retry_after_alpha: env_parse("RETRY_AFTER_EMA_ALPHA", 0.2f64)?,
            retry_after_min_sec: env_parse("RETRY_AFTER_MIN_SEC", 1.0f64)?,
            retry_after_max_sec: env_parse("RETRY_AFTER_MAX_SEC", 60.0f64)?,

            input_min_chars: env_parse("INPUT_MIN_CHARS", 2usize)?,
            input_min_alnum_ratio: env_parse("INPUT_MIN_ALNUM_RATIO", 0.3f64)?,
            sanitize_placeholder: env_str("SANITIZE_PLACEHOLDER", ""),

            align_responses: env_bool("ALIGN_RESPONSES", true)?,

            max_sentence_chars: env_parse("MAX_SENTENCE_CHARS", 512usize)?,
            max_chunk_chars: env_parse("MAX_CHUNK_CHARS", 1024usize)?,
            join_sentences_with: env_str("JOIN_SENTENCES_WITH", " "),
            auto_chunk: env_bool("AUTO_CHUNK", true)?,
            auto_chunk_max_chars: env_parse("AUTO_CHUNK_MAX_CHARS", 5000usize)?,

            mask_digits: env_bool("MASK_DIGITS", false)?,
            mask_punct: env_bool("MASK_PUNCT", false)?,
            mask_emoji: env_bool("MASK_EMOJI", false)?,

            pivot_lang: env_str("PIVOT_LANG", "en"),

            easynmt_batch_size: env_parse("EASYNMT_BATCH_SIZE", 16usize)?,
            easynmt_max_beam_size: {
                let v = env_parse("EASYNMT_MAX_BEAM_SIZE", 0u32)?;
                (v > 0).then_some(v)
            },
            easynmt_max_text_len: {
                let v = env_parse("EASYNMT_MAX_TEXT_LEN", 0usize)?;
                (v > 0).then_some(v)
            },

            discovery_ttl: Duration::from_secs(env_parse("DISCOVERY_TTL_SEC", 3600u64)?),

            log_level: env_str("LOG_LEVEL", "info"),
            log_format,

            graceful_timeout: Duration::from_secs(env_parse("GRACEFUL_TIMEOUT", 30u64)?),

            bind_addr: env_str("BIND_ADDR", "0.0.0.0:8080"),
        })
    }

    /// Derived default inflight capacity per spec §4.2: 1 on GPU, else
    /// `MAX_WORKERS_BACKEND`. Only used when `MAX_INFLIGHT_TRANSLATIONS`
    /// was not explicitly set; callers resolve via `crate::device`.
    pub fn default_max_inflight(&self, device: DeviceKind) -> usize {
        match device {
            DeviceKind::Gpu => 1,
            DeviceKind::Cpu => self.max_workers_backend,
        }
    }
}

impl Default for Config {
    /// Built-in defaults, matching `from_env`'s fallback values exactly.
    /// Used by tests across the crate so they don't depend on process
    /// environment state (and can run concurrently without racing on it).
    fn default() -> Self {
        Config {
            device: None,
            device_index: 0,
            use_gpu: None,
            max_workers_backend: 4,
            max_workers_frontend: 8,
            model_fallback_order: vec![Family::OpusMt, Family::Mbart50, Family::M2m100],
            auto_model_fallback: true,
            max_cached_models: 3,
            model_idle_timeout: Duration::from_secs(600),
            idle_check_interval: Duration::from_secs(60),
            cuda_cache_clear_interval: None,
            memory_monitoring_enabled: true,
            memory_critical_threshold_pct: 90.0,
            gpu_memory_critical_threshold_pct: 90.0,
            memory_hysteresis_pct: 10.0,
            enable_queue: true,
            max_inflight_translations: None,
            max_queue_size: 50,
            translate_timeout_sec: 30,
            retry_after_alpha: 0.2,
            retry_after_min_sec: 1.0,
            retry_after_max_sec: 60.0,
            input_min_chars: 2,
            input_min_alnum_ratio: 0.3,
            sanitize_placeholder: String::new(),
            align_responses: true,
            max_sentence_chars: 512,
            max_chunk_chars: 1024,
            join_sentences_with: " ".to_string(),
            auto_chunk: true,
            auto_chunk_max_chars: 5000,
            mask_digits: false,
            mask_punct: false,
            mask_emoji: false,
            pivot_lang: "en".to_string(),
            easynmt_batch_size: 16,
            easynmt_max_beam_size: None,
            easynmt_max_text_len: None,
            discovery_ttl: Duration::from_secs(3600),
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
            graceful_timeout: Duration::from_secs(30),
            bind_addr: "0.0.0.0:8080".to_string(),
        }
    }
}

fn parse_family_order(raw: &str) -> anyhow::Result<Vec<Family>> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(Family::parse)
        .collect::<Option<Vec<_>>>()
        .ok_or_else(|| anyhow::anyhow!("MODEL_FALLBACK_ORDER contains an unknown family: {raw:?}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_family_order() {
        let order = parse_family_order("opus-mt, mbart50,m2m100").unwrap();
        assert_eq!(
            order,
            vec![Family::OpusMt, Family::Mbart50, Family::M2m100]
        );
    }

    #[test]
    fn rejects_unknown_family() {
        assert!(parse_family_order("opus-mt,nope").is_err());
    }

    #[test]
    fn default_max_inflight_serializes_on_gpu() {
        let cfg = Config {
            max_workers_backend: 8,
            ..Config::default()
        };
        assert_eq!(cfg.default_max_inflight(DeviceKind::Gpu), 1);
        assert_eq!(cfg.default_max_inflight(DeviceKind::Cpu), 8);
    }
}
