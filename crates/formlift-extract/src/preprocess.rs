//! Line preprocessor: OCR cleanup and soft-wrap joining.
//!
//! Reshapes raw document text into a clean [`Line`] sequence. Nothing is
//! dropped here; lines are only corrected and re-joined.

use crate::line::Line;
use formlift_core::{FormliftError, Result};
use regex::Regex;
use std::sync::LazyLock;

/// Runs of single letters separated by single spaces ("M E D I C A L"),
/// a frequent artifact of wide letter-spacing in scanned headings.
static RE_SPACED_LETTERS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:[A-Za-z] ){2,}[A-Za-z]\b").expect("regex is compile-time constant")
});

/// Terminal punctuation that ends a sentence or a completed label.
static RE_TERMINAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[.?!:;]\s*$").expect("regex is compile-time constant"));

/// A Yes/No checkbox pair at the end of a line.
static RE_YES_NO_TAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(?:(?:\[\s?[xX✓]?\s?\]|[☐☑])\s*yes\s*(?:\[\s?[xX✓]?\s?\]|[☐☑])\s*no|yes\s*(?:\[\s?[xX✓]?\s?\]|[☐☑])\s*no\s*(?:\[\s?[xX✓]?\s?\]|[☐☑])|yes\s*/\s*no)\s*$",
    )
    .expect("regex is compile-time constant")
});

/// Lowercase words that continue a sentence broken across lines.
const CONTINUATION_WORDS: &[&str] = &[
    "if", "and", "or", "please", "then", "that", "which", "explain", "describe", "list",
];

/// OCR letter-confusion corrections applied to whole words.
///
/// The table is generic and extensible rather than form-specific: callers
/// processing a new corpus can extend it with their own pairs instead of
/// patching code.
#[derive(Debug, Clone)]
pub struct OcrCorrections {
    table: Vec<(String, String)>,
}

impl Default for OcrCorrections {
    fn default() -> Self {
        // Seed with the confusions seen most often in scanned intake forms:
        // lowercase 'l'/'r' read in place of capital 'I', and '0' for 'O'.
        let table = [
            ("rregular", "Irregular"),
            ("lrregular", "Irregular"),
            ("lnitial", "Initial"),
            ("lnsurance", "Insurance"),
            ("lnformation", "Information"),
            ("Piease", "Please"),
            ("0ccupation", "Occupation"),
            ("0ther", "Other"),
        ]
        .iter()
        .map(|(from, to)| ((*from).to_string(), (*to).to_string()))
        .collect();
        Self { table }
    }
}

impl OcrCorrections {
    /// An empty table (no corrections applied).
    #[must_use]
    pub fn none() -> Self {
        Self { table: Vec::new() }
    }

    /// Extend the table with corpus-specific pairs.
    pub fn extend<I, S>(&mut self, pairs: I)
    where
        I: IntoIterator<Item = (S, S)>,
        S: Into<String>,
    {
        self.table
            .extend(pairs.into_iter().map(|(a, b)| (a.into(), b.into())));
    }

    /// Apply every correction to one line, on word boundaries.
    fn apply(&self, line: &str) -> String {
        let mut out = line.to_string();
        for (from, to) in &self.table {
            if !out.contains(from.as_str()) {
                continue;
            }
            // Rebuild word by word so substrings inside larger words are
            // left alone.
            out = out
                .split(' ')
                .map(|word| {
                    let core = word.trim_matches(|c: char| !c.is_alphanumeric());
                    if core == from {
                        word.replacen(from.as_str(), to.as_str(), 1)
                    } else {
                        word.to_string()
                    }
                })
                .collect::<Vec<_>>()
                .join(" ");
        }
        out
    }
}

/// Preprocess raw document text into a [`Line`] sequence.
///
/// Applies, in order: tab expansion, OCR corrections, spaced-letter
/// collapsing, and soft-wrap joining. The Yes/No-pair rule overrides the
/// default join: a line ending in a Yes/No checkbox pair is joined to the
/// next line only when that line starts with a lowercase continuation word
/// (usually the "if yes, please explain" clause).
///
/// # Errors
///
/// Returns [`FormliftError::MalformedInput`] when the text is empty or
/// contains no letters, signalling the caller to skip this document.
pub fn preprocess(text: &str) -> Result<Vec<Line>> {
    preprocess_with(text, &OcrCorrections::default())
}

/// [`preprocess`] with a caller-supplied correction table.
///
/// # Errors
///
/// Same conditions as [`preprocess`].
pub fn preprocess_with(text: &str, corrections: &OcrCorrections) -> Result<Vec<Line>> {
    if text.trim().is_empty() {
        return Err(FormliftError::MalformedInput(
            "document text is empty".to_string(),
        ));
    }
    if !text.chars().any(char::is_alphabetic) {
        return Err(FormliftError::MalformedInput(
            "document text contains no letters".to_string(),
        ));
    }

    let cleaned: Vec<String> = text
        .lines()
        .map(|line| {
            let expanded = line.replace('\t', "    ");
            let corrected = corrections.apply(&expanded);
            collapse_spaced_letters(&corrected)
        })
        .collect();

    let joined = join_soft_wraps(cleaned);

    Ok(joined
        .into_iter()
        .enumerate()
        .map(|(index, raw)| Line::new(index, raw))
        .collect())
}

/// Collapse "M E D I C A L" back into "MEDICAL".
fn collapse_spaced_letters(line: &str) -> String {
    RE_SPACED_LETTERS
        .replace_all(line, |caps: &regex::Captures<'_>| {
            caps[0].replace(' ', "")
        })
        .into_owned()
}

/// Join lines broken mid-sentence by the layout extractor.
fn join_soft_wraps(lines: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(lines.len());
    for line in lines {
        let Some(prev) = out.last() else {
            out.push(line);
            continue;
        };
        if should_join(prev, &line) {
            let prev = out.pop().unwrap_or_default();
            out.push(format!("{} {}", prev.trim_end(), line.trim_start()));
        } else {
            out.push(line);
        }
    }
    out
}

fn should_join(prev: &str, next: &str) -> bool {
    let prev_trimmed = prev.trim_end();
    let next_trimmed = next.trim_start();
    if prev_trimmed.is_empty() || next_trimmed.is_empty() {
        return false;
    }

    // A line ending in a Yes/No pair is complete unless the next line is a
    // lowercase continuation clause.
    if RE_YES_NO_TAIL.is_match(prev_trimmed) {
        if !next_trimmed.chars().next().is_some_and(char::is_lowercase) {
            return false;
        }
        let first_word = next_trimmed
            .split_whitespace()
            .next()
            .unwrap_or("")
            .trim_matches(|c: char| !c.is_alphanumeric());
        return CONTINUATION_WORDS.contains(&first_word);
    }

    // Checkbox rows are layout, not prose; never fold them together.
    if crate::line::has_marker(prev_trimmed) || crate::line::has_marker(next_trimmed) {
        return false;
    }

    // Default rule: mid-sentence break, continued in lowercase. A comma or
    // closing parenthesis is not terminal punctuation.
    !RE_TERMINAL.is_match(prev_trimmed)
        && prev_trimmed
            .chars()
            .last()
            .is_some_and(|c| c.is_alphabetic() || c == ',' || c == ')')
        && next_trimmed.chars().next().is_some_and(char::is_lowercase)
}
