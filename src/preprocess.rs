//! Text Preprocessor (C1): noise detection, sentence splitting, chunking,
//! and symbol masking/unmasking (spec §4.1).

use once_cell::sync::Lazy;
use regex::Regex;

use crate::config::Config;

/// A translation unit produced by `chunk` (spec §3, "Chunk").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub parent_index: usize,
    pub sentences: Vec<String>,
    pub char_total: usize,
}

impl Chunk {
    pub fn text(&self, join_with: &str) -> String {
        self.sentences.join(join_with)
    }
}

/// Strips control characters (everything `char::is_control` reports,
/// except the newline/tab family gets collapsed to nothing too — noise
/// detection cares about content, not formatting).
fn strip_control(s: &str) -> String {
    s.chars().filter(|c| !c.is_control()).collect()
}

fn alnum_ratio(s: &str) -> f64 {
    let total = s.chars().filter(|c| !c.is_whitespace()).count();
    if total == 0 {
        return 0.0;
    }
    let alnum = s.chars().filter(|c| c.is_alphanumeric()).count();
    alnum as f64 / total as f64
}

/// True iff, after stripping control characters, the result is shorter
/// than `INPUT_MIN_CHARS` or its alphanumeric ratio falls below
/// `INPUT_MIN_ALNUM_RATIO` (spec §4.1).
pub fn is_noise(s: &str, cfg: &Config) -> bool {
    let stripped = strip_control(s);
    let trimmed = stripped.trim();
    if trimmed.chars().count() < cfg.input_min_chars {
        return true;
    }
    alnum_ratio(trimmed) < cfg.input_min_alnum_ratio
}

static SENTENCE_BOUNDARY: Lazy<Regex> = Lazy::new(|| Regex::new(r"[.!?\x{2026}]+").unwrap());

/// Splits on `. ! ? …`, preserving the terminator with the sentence it
/// ends. Any resulting sentence longer than `MAX_SENTENCE_CHARS` is
/// further cut at the nearest whitespace within the window (spec §4.1).
pub fn split_sentences(s: &str, cfg: &Config) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut last_end = 0;
    for m in SENTENCE_BOUNDARY.find_iter(s) {
        let end = m.end();
        let piece = s[last_end..end].trim();
        if !piece.is_empty() {
            sentences.push(piece.to_string());
        }
        last_end = end;
    }
    let tail = s[last_end..].trim();
    if !tail.is_empty() {
        sentences.push(tail.to_string());
    }

    sentences
        .into_iter()
        .flat_map(|sentence| cut_to_window(&sentence, cfg.max_sentence_chars))
        .collect()
}

/// Cuts `sentence` into pieces no longer than `max_chars`, preferring to
/// break at whitespace nearest the window boundary; falls back to a hard
/// character cut when no whitespace exists in range.
fn cut_to_window(sentence: &str, max_chars: usize) -> Vec<String> {
    if max_chars == 0 || sentence.chars().count() <= max_chars {
        return vec![sentence.to_string()];
    }

    let chars: Vec<char> = sentence.chars().collect();
    let mut pieces = Vec::new();
    let mut start = 0;
    while start < chars.len() {
        let window_end = (start + max_chars).min(chars.len());
        let mut cut = window_end;
        if window_end < chars.len() {
            if let Some(ws) = (start..window_end).rev().find(|&i| chars[i].is_whitespace()) {
                if ws > start {
                    cut = ws;
                }
            }
        }
        let piece: String = chars[start..cut].iter().collect();
        let piece = piece.trim();
        if !piece.is_empty() {
            pieces.push(piece.to_string());
        }
        start = if cut > start { cut } else { window_end };
    }
    pieces
}

/// Greedily packs sentences in order, never crossing `max_chars`. A single
/// sentence larger than the limit becomes its own chunk (already cut by
/// `split_sentences` above, so this only happens for synthetic callers
/// that skip splitting) (spec §4.1).
pub fn chunk(sentences: &[String], max_chars: usize, parent_index: usize) -> Vec<Chunk> {
    let mut chunks = Vec::new();
    let mut current: Vec<String> = Vec::new();
    let mut current_len = 0usize;

    for sentence in sentences {
        let sentence_len = sentence.chars().count();
        let would_be = if current.is_empty() {
            sentence_len
        } else {
            current_len + 1 + sentence_len
        };

        if !current.is_empty() && would_be > max_chars {
            chunks.push(Chunk {
                parent_index,
                char_total: current_len,
                sentences: std::mem::take(&mut current),
            });
            current_len = 0;
        }

        if current.is_empty() {
            current_len = sentence_len;
        } else {
            current_len += 1 + sentence_len;
        }
        current.push(sentence.clone());
    }

    if !current.is_empty() {
        chunks.push(Chunk {
            parent_index,
            char_total: current_len,
            sentences: current,
        });
    }

    chunks
}

/// When enabled and `len(s) > AUTO_CHUNK_MAX_CHARS`, splits on sentence
/// boundaries (falling back to a hard boundary cut) (spec §4.1).
pub fn auto_chunk_if_enabled(s: &str, cfg: &Config) -> Vec<String> {
    if !cfg.auto_chunk || s.chars().count() <= cfg.auto_chunk_max_chars {
        return vec![s.to_string()];
    }
    let sentences = split_sentences(s, cfg);
    if sentences.is_empty() {
        cut_to_window(s, cfg.auto_chunk_max_chars)
    } else {
        sentences
    }
}

// --- symbol masking (spec §4.1) ---

const SENTINEL_PREFIX: &str = "\u{27ea}MSK";
const SENTINEL_SUFFIX: &str = "\u{27eb}";

fn sentinel(i: usize) -> String {
    format!("{SENTINEL_PREFIX}{i}{SENTINEL_SUFFIX}")
}

static SENTINEL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\u{27ea}MSK(\d+)\u{27eb}").unwrap());

fn is_emoji(c: char) -> bool {
    matches!(c as u32,
        0x1F300..=0x1FAFF | 0x2600..=0x27BF | 0x2190..=0x21FF | 0x2B00..=0x2BFF
            | 0x1F1E6..=0x1F1FF | 0xFE0F
    )
}

#[derive(PartialEq, Eq, Clone, Copy)]
enum CharClass {
    Alpha,
    Digit,
    Emoji,
    Punct,
    Space,
}

fn classify(c: char) -> CharClass {
    if c.is_whitespace() {
        CharClass::Space
    } else if is_emoji(c) {
        CharClass::Emoji
    } else if c.is_ascii_digit() || (c.is_numeric() && !c.is_alphabetic()) {
        CharClass::Digit
    } else if c.is_alphabetic() {
        CharClass::Alpha
    } else {
        CharClass::Punct
    }
}

/// Replaces digits (if `MASK_DIGITS`), punctuation-and-symbols (if
/// `MASK_PUNCT`), and emoji (if `MASK_EMOJI`) with sentinel tokens in
/// insertion order. Whitespace runs pass through untouched so that
/// `unmask(mask(s).0, ...)` reconstructs `s` exactly, not just up to
/// whitespace normalization (spec §4.1).
pub fn mask(s: &str, cfg: &Config) -> (String, Vec<String>) {
    let mut originals = Vec::new();
    let mut tokens: Vec<String> = Vec::new();
    let mut run = String::new();
    let mut run_class: Option<CharClass> = None;

    let flush = |run: &mut String,
                 run_class: &mut Option<CharClass>,
                 tokens: &mut Vec<String>,
                 originals: &mut Vec<String>| {
        let Some(class) = run_class.take() else {
            return;
        };
        if run.is_empty() {
            return;
        }
        let should_mask = match class {
            CharClass::Digit => cfg.mask_digits,
            CharClass::Punct => cfg.mask_punct,
            CharClass::Emoji => cfg.mask_emoji,
            CharClass::Alpha | CharClass::Space => false,
        };
        match class {
            CharClass::Space | CharClass::Alpha => tokens.push(std::mem::take(run)),
            _ if should_mask => {
                let idx = originals.len();
                originals.push(std::mem::take(run));
                tokens.push(sentinel(idx));
            }
            _ => tokens.push(std::mem::take(run)),
        }
        run.clear();
    };

    for c in s.chars() {
        let class = classify(c);
        if Some(class) != run_class {
            flush(&mut run, &mut run_class, &mut tokens, &mut originals);
            run_class = Some(class);
        }
        run.push(c);
    }
    flush(&mut run, &mut run_class, &mut tokens, &mut originals);

    (tokens.concat(), originals)
}

/// Substitutes each sentinel by its positional original. Unmatched
/// sentinels (index beyond `originals`) are removed. Degenerate repeated
/// sentinels (the same index emitted back-to-back, beyond the single
/// occurrence the mask pass ever produces) are collapsed first, so the
/// original arity is preserved (spec §4.1, `remove_repeating_new_symbols`).
pub fn unmask(s: &str, originals: &[String]) -> String {
    let collapsed = remove_repeating_new_symbols(s);
    SENTINEL_RE
        .replace_all(&collapsed, |caps: &regex::Captures| {
            let idx: usize = caps[1].parse().unwrap_or(usize::MAX);
            originals.get(idx).cloned().unwrap_or_default()
        })
        .into_owned()
}

fn remove_repeating_new_symbols(s: &str) -> String {
    let matches: Vec<regex::Match> = SENTINEL_RE.find_iter(s).collect();
    if matches.len() < 2 {
        return s.to_string();
    }

    let mut out = String::with_capacity(s.len());
    let mut cursor = 0;
    let mut prev_index: Option<&str> = None;
    for m in &matches {
        let between = &s[cursor..m.start()];
        let same_as_prev = prev_index == Some(&s[m.start()..m.end()])
            && between.chars().all(char::is_whitespace);
        if same_as_prev {
            cursor = m.end();
            continue;
        }
        out.push_str(between);
        out.push_str(m.as_str());
        cursor = m.end();
        prev_index = Some(&s[m.start()..m.end()]);
    }
    out.push_str(&s[cursor..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_cfg() -> Config {
        Config {
            max_sentence_chars: 40,
            max_chunk_chars: 80,
            ..Config::default()
        }
    }

    #[test]
    fn noise_detects_short_input() {
        let cfg = test_cfg();
        assert!(is_noise("a", &cfg));
        assert!(!is_noise("hello", &cfg));
    }

    #[test]
    fn noise_detects_low_alnum_ratio() {
        let cfg = test_cfg();
        assert!(is_noise("!!!!!!!!!!", &cfg));
        assert!(!is_noise("Hello, world!", &cfg));
    }

    #[test]
    fn noise_is_monotone_under_control_stripping() {
        let cfg = test_cfg();
        let with_controls = "Hi\u{0001}\u{0002}";
        assert_eq!(is_noise(with_controls, &cfg), is_noise("Hi", &cfg));
    }

    #[test]
    fn split_sentences_preserves_terminators() {
        let cfg = test_cfg();
        let out = split_sentences("Hello world. How are you? Fine!", &cfg);
        assert_eq!(out, vec!["Hello world.", "How are you?", "Fine!"]);
    }

    #[test]
    fn split_sentences_cuts_overlong_sentence_at_whitespace() {
        let mut cfg = test_cfg();
        cfg.max_sentence_chars = 10;
        let out = split_sentences("one two three four five.", &cfg);
        assert!(out.iter().all(|s| s.chars().count() <= 10));
        assert!(!out.is_empty());
    }

    #[test]
    fn chunk_packs_greedily_without_crossing_limit() {
        let sentences = vec!["aaaa".to_string(), "bbbb".to_string(), "cccc".to_string()];
        let chunks = chunk(&sentences, 9, 0);
        assert_eq!(chunks.len(), 2);
        assert!(chunks.iter().all(|c| c.char_total <= 9));
    }

    #[test]
    fn chunk_isolates_oversized_single_sentence() {
        let sentences = vec!["x".repeat(20)];
        let chunks = chunk(&sentences, 9, 0);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].sentences.len(), 1);
    }

    #[test]
    fn auto_chunk_noop_under_threshold() {
        let mut cfg = test_cfg();
        cfg.auto_chunk = true;
        cfg.auto_chunk_max_chars = 1000;
        let out = auto_chunk_if_enabled("short text", &cfg);
        assert_eq!(out, vec!["short text".to_string()]);
    }

    #[test]
    fn auto_chunk_splits_when_over_threshold() {
        let mut cfg = test_cfg();
        cfg.auto_chunk = true;
        cfg.auto_chunk_max_chars = 10;
        let out = auto_chunk_if_enabled("One. Two. Three. Four. Five.", &cfg);
        assert!(out.len() > 1);
        assert!(out.join("").chars().count() > 0);
    }

    #[test]
    fn mask_unmask_roundtrips_plain_text() {
        let mut cfg = test_cfg();
        cfg.mask_digits = true;
        cfg.mask_punct = true;
        cfg.mask_emoji = true;
        for input in [
            "Hello world",
            "Price: $9.99 (20% off)! \u{1F389}",
            "plain ascii text",
            "",
            "   ",
        ] {
            let (masked, originals) = mask(input, &cfg);
            let unmasked = unmask(&masked, &originals);
            assert_eq!(unmasked, input, "input={input:?} masked={masked:?}");
        }
    }

    #[test]
    fn mask_unmask_roundtrips_irregular_whitespace() {
        let mut cfg = test_cfg();
        cfg.mask_digits = true;
        cfg.mask_punct = true;
        for input in [
            "  leading and trailing  ",
            "tabs\tbetween\twords",
            "multiple   spaces   in   a   row",
            "a\nnewline\nin the middle",
            "\n\nleading newlines",
        ] {
            let (masked, originals) = mask(input, &cfg);
            let unmasked = unmask(&masked, &originals);
            assert_eq!(unmasked, input, "input={input:?} masked={masked:?}");
        }
    }

    #[test]
    fn mask_preserves_symbols_positionally() {
        let mut cfg = test_cfg();
        cfg.mask_digits = true;
        cfg.mask_punct = true;
        cfg.mask_emoji = true;
        let input = "Price: $9.99 (20% off)! \u{1F389}";
        let (masked, originals) = mask(input, &cfg);
        let unmasked = unmask(&masked, &originals);
        for needle in ["$9.99", "20%", "!", "\u{1F389}"] {
            assert!(
                unmasked.contains(needle),
                "expected {unmasked:?} to contain {needle:?}"
            );
        }
    }

    #[test]
    fn unmask_drops_unmatched_sentinels() {
        let out = unmask("hello \u{27ea}MSK7\u{27eb} world", &[]);
        assert_eq!(out, "hello  world");
    }

    #[test]
    fn unmask_collapses_repeated_sentinel() {
        let originals = vec!["$9.99".to_string()];
        let degenerate = "\u{27ea}MSK0\u{27eb} \u{27ea}MSK0\u{27eb} \u{27ea}MSK0\u{27eb} item";
        let out = unmask(degenerate, &originals);
        assert_eq!(out.matches("$9.99").count(), 1);
    }
}
