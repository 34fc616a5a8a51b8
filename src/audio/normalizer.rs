use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use tracing::warn;
use unicode_normalization::UnicodeNormalization;

use crate::errors::constants::EMPTY_TEXT_FALLBACK;

/// Punctuation the speech engine accepts.
pub const ALLOWED_PUNCTUATION: [char; 8] = ['?', '!', '.', '-', '\'', '"', ':', ','];

/// Punctuation that gets spacing fixes and repeat collapsing. The dash is
/// allowed but left where it is.
const SPACED_PUNCTUATION: [char; 5] = ['?', '!', '.', ',', ':'];

/// Characters that are trimmed from both ends of the cleaned text.
const EDGE_PUNCTUATION: [char; 6] = ['?', '!', '.', ',', ':', '-'];

static SPACE_BEFORE_PUNCTUATION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+([?!.,:])").expect("valid regex"));
static SPACE_AFTER_PUNCTUATION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([?!.,:])\s*").expect("valid regex"));

/// Is `c` a letter of the Mongolian Cyrillic alphabet?
///
/// | Range            | Letters        |
/// |------------------|----------------|
/// | U+0410..=U+042F  | А–Я            |
/// | U+0401           | Ё              |
/// | U+0430..=U+044F  | а–я            |
/// | U+0451           | ё              |
/// | U+04E8, U+04E9   | Ө ө            |
/// | U+04AE, U+04AF   | Ү ү            |
/// | U+04A2, U+04A3   | Ң ң            |
pub fn is_mongolian_letter(c: char) -> bool {
    matches!(
        c,
        '\u{0410}'..='\u{042F}'
            | '\u{0401}'
            | '\u{0430}'..='\u{044F}'
            | '\u{0451}'
            | '\u{04E8}'
            | '\u{04E9}'
            | '\u{04AE}'
            | '\u{04AF}'
            | '\u{04A2}'
            | '\u{04A3}'
    )
}

/// Whether the speech engine accepts `c`: Mongolian letters, whitespace
/// and [`ALLOWED_PUNCTUATION`].
pub fn is_allowed(c: char) -> bool {
    is_mongolian_letter(c) || c.is_whitespace() || ALLOWED_PUNCTUATION.contains(&c)
}

/// Every character of `text` the speech engine would reject, in order.
pub fn forbidden_chars(text: &str) -> Vec<char> {
    text.chars().filter(|c| !is_allowed(*c)).collect()
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn straighten_quotes(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            '«' | '»' | '\u{201C}' | '\u{201D}' | '\u{201E}' => '"',
            '\u{2018}' | '\u{2019}' | '\u{201A}' => '\'',
            other => other,
        })
        .collect()
}

fn collapse_repeated_punctuation(text: &str) -> String {
    let mut collapsed = String::with_capacity(text.len());
    let mut previous = None;

    for c in text.chars() {
        if SPACED_PUNCTUATION.contains(&c) && previous == Some(c) {
            continue;
        }
        collapsed.push(c);
        previous = Some(c);
    }

    collapsed
}

/// Cleans narration into text the speech engine will accept.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextNormalizer;

impl TextNormalizer {
    pub fn new() -> Self {
        Self
    }

    /// Run the cleaning steps in order. The output is a fixed point: cleaning
    /// it again changes nothing.
    pub fn normalize(&self, text: &str) -> String {
        let composed: String = text.nfc().collect();
        let collapsed = collapse_whitespace(&composed);
        let filtered: String = collapsed.chars().filter(|c| is_allowed(*c)).collect();
        let quoted = straighten_quotes(&filtered);
        let deduplicated = collapse_repeated_punctuation(&quoted);

        let tightened = SPACE_BEFORE_PUNCTUATION.replace_all(&deduplicated, "$1");
        let spaced = SPACE_AFTER_PUNCTUATION.replace_all(&tightened, "$1 ");

        let trimmed =
            spaced.trim_matches(|c: char| EDGE_PUNCTUATION.contains(&c) || c.is_whitespace());
        let cleaned = collapse_whitespace(trimmed);

        if cleaned.is_empty() {
            warn!(original = %text, "Text became empty after cleaning");
            return EMPTY_TEXT_FALLBACK.to_string();
        }

        cleaned
    }

    /// Character-by-character diagnostic for text that the engine rejects.
    pub fn inspect(&self, text: &str) -> CleaningReport {
        let cleaned = self.normalize(text);
        let characters = text
            .chars()
            .enumerate()
            .map(|(index, character)| CharacterReport {
                index,
                character,
                code_point: format!("U+{:04X}", character as u32),
                allowed: is_allowed(character),
            })
            .collect();
        let remaining_forbidden = forbidden_chars(&cleaned);

        CleaningReport {
            original: text.to_string(),
            has_latin: cleaned.chars().any(|c| c.is_ascii_alphabetic()),
            has_digits: cleaned.chars().any(|c| c.is_ascii_digit()),
            has_forbidden: !remaining_forbidden.is_empty(),
            cleaned,
            characters,
            remaining_forbidden,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CharacterReport {
    pub index: usize,
    pub character: char,
    pub code_point: String,
    pub allowed: bool,
}

/// Outcome of [`TextNormalizer::inspect`]. The flags describe the cleaned text.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CleaningReport {
    pub original: String,
    pub cleaned: String,
    pub characters: Vec<CharacterReport>,
    pub has_latin: bool,
    pub has_digits: bool,
    pub has_forbidden: bool,
    pub remaining_forbidden: Vec<char>,
}
