//! Text normalization and LIKE pattern construction for searches over the
//! derived text columns.

use icu::normalizer::DecomposingNormalizerBorrowed;
use icu::properties::CodePointMapData;
use icu::properties::props::GeneralCategory;

/// How a text value is matched against a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MatchType {
    Equals,
    #[default]
    Contains,
    StartsWith,
    EndsWith,
}

/// ## Summary
/// Folds text into the form stored in the searchable columns.
///
/// Each character is lowercased and reduced to the first code point of its
/// canonical decomposition, so `É` and `e` compare equal. Control, format,
/// unassigned and spacing-mark characters are dropped.
///
/// Returns `None` when nothing is left.
#[must_use]
pub fn decompose_text(text: &str) -> Option<String> {
    let nfd = DecomposingNormalizerBorrowed::new_nfd();
    let categories = CodePointMapData::<GeneralCategory>::new();

    let mut folded = String::with_capacity(text.len());
    let mut buf = [0u8; 4];

    for ch in text.chars() {
        if matches!(
            categories.get(ch),
            GeneralCategory::Control
                | GeneralCategory::Format
                | GeneralCategory::Unassigned
                | GeneralCategory::SpacingMark
        ) {
            continue;
        }

        let lower = ch.to_lowercase().next().unwrap_or(ch);
        if let Some(base) = nfd.normalize(lower.encode_utf8(&mut buf)).chars().next() {
            folded.push(base);
        }
    }

    (!folded.is_empty()).then_some(folded)
}

/// ## Summary
/// Escapes special SQL LIKE pattern characters.
///
/// Escapes `%`, `_`, and `\` so they match literally; use with
/// `ESCAPE '\'`.
#[must_use]
pub fn escape_like_pattern(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '%' | '_' | '\\' => {
                result.push('\\');
                result.push(c);
            }
            _ => result.push(c),
        }
    }
    result
}

/// ## Summary
/// Builds a SQL LIKE pattern based on match type.
#[must_use]
pub fn build_like_pattern(value: &str, match_type: MatchType) -> String {
    let escaped = escape_like_pattern(value);
    match match_type {
        MatchType::Contains => format!("%{escaped}%"),
        MatchType::Equals => escaped,
        MatchType::StartsWith => format!("{escaped}%"),
        MatchType::EndsWith => format!("%{escaped}"),
    }
}
