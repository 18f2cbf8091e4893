//! Language detection collaborator, invoked by the Translation Orchestrator
//! (C7) step 2 when a request omits `source_lang` (spec §4.7). Real
//! statistical detection is an external concern the same way inference is
//! (spec §1); this defines the capability seam and a deterministic
//! script-range heuristic good enough to exercise routing and pivoting in
//! tests without a bundled model.

use crate::lang::Lang;

pub trait LanguageDetector: Send + Sync {
    /// Best-guess language for `text`, or `Lang::undetermined()` when no
    /// script-based signal is found.
    fn detect(&self, text: &str) -> Lang;
}

/// Scans for the first character outside the Latin block and maps its
/// Unicode range to a language. Falls back to `"en"` for Latin-script text
/// since most seed/demo corpora are English, and to `"und"` when the input
/// is empty or a script range isn't recognized.
pub struct HeuristicDetector;

impl LanguageDetector for HeuristicDetector {
    fn detect(&self, text: &str) -> Lang {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Lang::undetermined();
        }
        for c in trimmed.chars() {
            if let Some(lang) = lang_for_char(c) {
                return Lang::new(lang);
            }
        }
        Lang::new("en")
    }
}

fn lang_for_char(c: char) -> Option<&'static str> {
    let cp = c as u32;
    match cp {
        0x3040..=0x30FF => Some("ja"),
        0x4E00..=0x9FFF => Some("zh"),
        0xAC00..=0xD7A3 => Some("ko"),
        0x0400..=0x04FF => Some("ru"),
        0x0600..=0x06FF => Some("ar"),
        0x0900..=0x097F => Some("hi"),
        0x0980..=0x09FF => Some("bn"),
        0x0B80..=0x0BFF => Some("ta"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_japanese_script() {
        assert_eq!(HeuristicDetector.detect("こんにちは").as_str(), "ja");
    }

    #[test]
    fn detects_hindi_script() {
        assert_eq!(HeuristicDetector.detect("नमस्ते").as_str(), "hi");
    }

    #[test]
    fn falls_back_to_english_for_latin_text() {
        assert_eq!(HeuristicDetector.detect("Hello world").as_str(), "en");
    }

    #[test]
    fn empty_input_is_undetermined() {
        assert!(HeuristicDetector.detect("   ").is_undetermined());
    }
}
