//! Heuristic source-language detection.
//!
//! Scores a short sample against a handful of Latin-script language profiles
//! using diacritics and common function words. Precedence:
//!
//! 1. No diacritics and enough baseline function words: baseline.
//! 2. Markers unique to another language, or a high enough density of its
//!    function words: that language (best score wins).
//! 3. Otherwise: baseline.
//!
//! This is a heuristic. Samples can look like two languages at once; the
//! precedence above decides. Anything implementing the same `detect`
//! signature can replace it.

use crate::config::Lang;
use crate::content::is_real_content;
use crate::util::truncate_chars;

/// Samples are cut to this many characters before scoring
pub const SAMPLE_MAX_CHARS: usize = 200;
/// Preferred minimum paragraph length for a sample
pub const SAMPLE_MIN_CHARS: usize = 30;

/// Baseline function words needed to short-circuit to the baseline
const BASELINE_MIN_HITS: usize = 2;
/// Function words needed (with density) for a non-baseline match
const WORD_MIN_HITS: usize = 2;
/// Minimum function-word share of all words, in percent
const WORD_MIN_DENSITY_PCT: usize = 15;

struct Profile {
    code: &'static str,
    /// Characters practically exclusive to this language among the profiles
    unique_marks: &'static [char],
    /// Accented letters the language uses but shares with others
    accents: &'static [char],
    function_words: &'static [&'static str],
}

const PROFILES: &[Profile] = &[
    Profile {
        code: "en",
        unique_marks: &[],
        accents: &[],
        function_words: &["the", "and", "of", "is", "to", "that", "it", "with", "was", "are"],
    },
    Profile {
        code: "es",
        unique_marks: &['ñ', '¿', '¡'],
        accents: &['á', 'é', 'í', 'ó', 'ú'],
        function_words: &[
            "el", "la", "los", "las", "de", "que", "y", "en", "con", "por", "una", "del", "para",
        ],
    },
    Profile {
        code: "fr",
        unique_marks: &['œ', 'ë', 'î', 'û', 'ù'],
        accents: &['é', 'è', 'à', 'â', 'ê', 'ç'],
        function_words: &[
            "le", "la", "les", "des", "est", "et", "une", "pour", "dans", "du", "qui", "sur",
        ],
    },
    Profile {
        code: "de",
        unique_marks: &['ß', 'ä', 'ö', 'ü'],
        accents: &[],
        function_words: &[
            "der", "die", "das", "und", "ist", "nicht", "ein", "eine", "mit", "zu", "den", "auf",
        ],
    },
    Profile {
        code: "pt",
        unique_marks: &['ã', 'õ'],
        accents: &['á', 'é', 'í', 'ó', 'ú', 'â', 'ê', 'ô', 'ç', 'à'],
        function_words: &["o", "os", "as", "de", "que", "não", "em", "com", "uma", "do", "da", "para"],
    },
    Profile {
        code: "it",
        unique_marks: &['ì', 'ò'],
        accents: &['à', 'è', 'é', 'ù'],
        function_words: &["il", "lo", "gli", "che", "di", "non", "una", "per", "con", "sono", "della"],
    },
];

/// Deterministic, synchronous language detector.
#[derive(Debug, Clone)]
pub struct LanguageDetector {
    baseline: Lang,
}

impl LanguageDetector {
    pub const fn new(baseline: Lang) -> Self {
        Self { baseline }
    }

    pub const fn baseline(&self) -> &Lang {
        &self.baseline
    }

    /// Best-guess language of `sample`. Never fails; falls back to the baseline.
    ///
    /// Callers must not pass placeholder text; use [`sample_for_detection`].
    pub fn detect(&self, sample: &str) -> Lang {
        let sample = truncate_chars(sample, SAMPLE_MAX_CHARS).to_lowercase();
        let words: Vec<&str> = sample
            .split(|c: char| !c.is_alphabetic())
            .filter(|w| !w.is_empty())
            .collect();

        if words.is_empty() {
            return self.baseline.clone();
        }

        let has_diacritics = sample
            .chars()
            .any(|c| (c.is_alphabetic() && !c.is_ascii()) || c == '¿' || c == '¡');

        if !has_diacritics
            && let Some(profile) = self.baseline_profile()
            && function_word_hits(profile, &words) >= BASELINE_MIN_HITS
        {
            return self.baseline.clone();
        }

        let best = PROFILES
            .iter()
            .filter(|p| p.code != self.baseline.as_str())
            .filter_map(|p| score(p, &sample, &words).map(|s| (s, p.code)))
            // max_by_key keeps the last maximum; reverse so table order breaks ties
            .rev()
            .max_by_key(|(s, _)| *s);

        match best {
            Some((_, code)) => Lang::new(code),
            None => self.baseline.clone(),
        }
    }

    fn baseline_profile(&self) -> Option<&'static Profile> {
        PROFILES.iter().find(|p| p.code == self.baseline.as_str())
    }
}

fn function_word_hits(profile: &Profile, words: &[&str]) -> usize {
    words
        .iter()
        .filter(|w| profile.function_words.contains(w))
        .count()
}

/// Score a profile; `None` when it does not qualify at all.
fn score(profile: &Profile, sample: &str, words: &[&str]) -> Option<usize> {
    let unique = sample.chars().filter(|c| profile.unique_marks.contains(c)).count();
    let accents = sample.chars().filter(|c| profile.accents.contains(c)).count();
    let hits = function_word_hits(profile, words);

    let dense = hits >= WORD_MIN_HITS && hits * 100 >= words.len() * WORD_MIN_DENSITY_PCT;
    if unique == 0 && !dense {
        return None;
    }

    Some(unique * 3 + accents + hits * 2)
}

/// Pick the detection sample from page text.
///
/// Returns the first paragraph of at least [`SAMPLE_MIN_CHARS`] characters
/// (or the whole trimmed text if none is that long), truncated to
/// [`SAMPLE_MAX_CHARS`]. Returns `None` for placeholder or too-short text.
pub fn sample_for_detection(text: &str) -> Option<&str> {
    if !is_real_content(text) {
        return None;
    }

    let sample = text
        .split("\n\n")
        .map(str::trim)
        .find(|p| p.chars().count() >= SAMPLE_MIN_CHARS)
        .unwrap_or_else(|| text.trim());

    Some(truncate_chars(sample, SAMPLE_MAX_CHARS))
}
