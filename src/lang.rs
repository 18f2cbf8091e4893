//! Core data model: language codes, pairs, and model families (spec §3).

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lowercase ASCII language code, e.g. `"en"`, `"zh"`. `"und"` is reserved
/// for "undetermined" (spec §3, "Language code").
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Lang(String);

pub const UNDETERMINED: &str = "und";

impl Lang {
    pub fn new(code: impl AsRef<str>) -> Self {
        Lang(code.as_ref().trim().to_ascii_lowercase())
    }

    pub fn undetermined() -> Self {
        Lang(UNDETERMINED.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_undetermined(&self) -> bool {
        self.0 == UNDETERMINED
    }
}

impl fmt::Display for Lang {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Lang {
    fn from(s: &str) -> Self {
        Lang::new(s)
    }
}

impl From<String> for Lang {
    fn from(s: String) -> Self {
        Lang::new(s)
    }
}

/// Ordered `(src, tgt)` tuple, `src != tgt` (spec §3, "Pair").
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Pair {
    pub src: Lang,
    pub tgt: Lang,
}

impl Pair {
    pub fn new(src: impl Into<Lang>, tgt: impl Into<Lang>) -> Self {
        Pair {
            src: src.into(),
            tgt: tgt.into(),
        }
    }
}

impl fmt::Display for Pair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}->{}", self.src, self.tgt)
    }
}

/// Model family: a group of models sharing a code/id convention (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Family {
    OpusMt,
    Mbart50,
    M2m100,
}

impl Family {
    pub fn parse(s: &str) -> Option<Family> {
        match s.to_ascii_lowercase().as_str() {
            "opus-mt" | "opus_mt" | "opus" => Some(Family::OpusMt),
            "mbart50" | "mbart-50" => Some(Family::Mbart50),
            "m2m100" | "m2m-100" => Some(Family::M2m100),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Family::OpusMt => "opus-mt",
            Family::Mbart50 => "mbart50",
            Family::M2m100 => "m2m100",
        }
    }

    /// Maps a plain language code to the family's model-specific code
    /// (spec §3, "code mapper"). mbart50 appends `_XX`-style region
    /// suffixes; opus-mt and m2m100 pass the bare code through.
    pub fn code_for(&self, lang: &Lang) -> String {
        match self {
            Family::Mbart50 => mbart50_code(lang),
            Family::OpusMt | Family::M2m100 => lang.as_str().to_string(),
        }
    }

    /// Builds the concrete model id for a pair under this family (spec §3,
    /// "model-id builder"). opus-mt is one model per pair; mbart50/m2m100
    /// are a single multilingual model shared across every pair.
    pub fn model_id(&self, pair: &Pair) -> String {
        match self {
            Family::OpusMt => format!(
                "helsinki-nlp/opus-mt-{}-{}",
                pair.src.as_str(),
                pair.tgt.as_str()
            ),
            Family::Mbart50 => "facebook/mbart-large-50-many-to-many-mmt".to_string(),
            Family::M2m100 => "facebook/m2m100_418M".to_string(),
        }
    }

    /// Whether this family's known language set nominally contains `lang`.
    /// opus-mt has no fixed set here — availability is checked dynamically
    /// against `AvailablePairs` from discovery (spec §4.4 step 3).
    pub fn supports_lang(&self, lang: &Lang) -> bool {
        match self {
            Family::OpusMt => true,
            Family::Mbart50 => MBART50_LANGS.contains(&lang.as_str()),
            Family::M2m100 => M2M100_LANGS.contains(&lang.as_str()),
        }
    }
}

fn mbart50_code(lang: &Lang) -> String {
    let region = MBART50_REGIONS
        .iter()
        .find(|(code, _)| *code == lang.as_str())
        .map(|(_, region)| *region)
        .unwrap_or("XX");
    format!("{}_{}", lang.as_str(), region)
}

/// The fixed 50-language mbart50 set (spec §4.8, "Cartesian square minus
/// identities over a fixed 50-element set"). A representative subset of
/// the real mBART-50 language list, enough to exercise every pivot and
/// fallback path the spec requires; not an exhaustive linguistic catalog.
pub const MBART50_LANGS: &[&str] = &[
    "ar", "cs", "de", "en", "es", "et", "fi", "fr", "gu", "hi", "it", "ja", "kk", "ko", "lt",
    "lv", "my", "ne", "nl", "ro", "ru", "si", "tr", "vi", "zh", "af", "az", "bn", "fa", "he",
    "hr", "id", "ka", "km", "mk", "ml", "mn", "mr", "pl", "ps", "pt", "sv", "sw", "ta", "te",
    "th", "tl", "uk", "ur", "xh",
];

const MBART50_REGIONS: &[(&str, &str)] = &[
    ("ar", "AR"),
    ("de", "DE"),
    ("en", "XX"),
    ("es", "XX"),
    ("fr", "XX"),
    ("hi", "IN"),
    ("ja", "XX"),
    ("ko", "KR"),
    ("ru", "RU"),
    ("zh", "CN"),
];

/// The fixed 100-language m2m100 set (spec §4.8). Same representative
/// purpose as `MBART50_LANGS` above.
pub const M2M100_LANGS: &[&str] = &[
    "af", "am", "ar", "ast", "az", "ba", "be", "bg", "bn", "br", "bs", "ca", "ceb", "cs", "cy",
    "da", "de", "el", "en", "es", "et", "fa", "ff", "fi", "fr", "fy", "ga", "gd", "gl", "gu",
    "ha", "he", "hi", "hr", "ht", "hu", "hy", "id", "ig", "ilo", "is", "it", "ja", "jv", "ka",
    "kk", "km", "kn", "ko", "lb", "lg", "ln", "lo", "lt", "lv", "mg", "mk", "ml", "mn", "mr",
    "ms", "my", "ne", "nl", "no", "ns", "oc", "or", "pa", "pl", "ps", "pt", "ro", "ru", "sd",
    "si", "sk", "sl", "so", "sq", "sr", "ss", "su", "sv", "sw", "ta", "th", "tl", "tn", "tr",
    "uk", "ur", "uz", "vi", "wo", "xh", "yi", "yo", "zh", "zu",
];

/// All families, in declaration order. Used where a fixed iteration order
/// independent of configuration is needed (e.g. building discovery's
/// static sets).
pub const ALL_FAMILIES: [Family; 3] = [Family::OpusMt, Family::Mbart50, Family::M2m100];

/// `"{src}->{tgt}:{family}"`, unique per (pair, family) (spec §3, "CacheKey").
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn new(pair: &Pair, family: Family) -> Self {
        CacheKey(format!("{}->{}:{}", pair.src, pair.tgt, family.as_str()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
