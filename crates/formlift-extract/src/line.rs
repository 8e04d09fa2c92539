//! Per-line metadata used throughout the pipeline.
//!
//! A [`Line`] keeps two views of the same text: `raw` preserves layout
//! (checkbox offsets and column gaps are measured against it) and `text` is
//! the whitespace-collapsed form used for classification and titles. All
//! marker offsets are character offsets, not byte offsets, so they line up
//! with visual columns even when the OCR output contains Unicode glyphs.

use regex::Regex;
use std::sync::LazyLock;

/// Checkbox marker tokens: `[ ]`, `[x]`, `[_]`, `( )`, `(x)`, and the
/// common Unicode ballot-box glyphs OCR engines emit.
static RE_CHECKBOX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[\s?[xX✓_]?\s?\]|\(\s\)|\([xX✓]\)|[☐☑☒❑□■]")
        .expect("regex is compile-time constant")
});

static RE_WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("regex is compile-time constant"));

/// A checkbox marker located on a line. Offsets are in characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckboxMarker {
    /// Character offset of the first character of the marker.
    pub start: usize,
    /// Character offset just past the marker.
    pub end: usize,
    /// Whether the box is visibly marked (`[x]`, `☑`, ...).
    pub checked: bool,
}

/// One preprocessed line of document text.
#[derive(Debug, Clone, PartialEq)]
pub struct Line {
    /// Zero-based position in the preprocessed sequence.
    pub index: usize,
    /// Layout-preserving text (tabs expanded, OCR-corrected).
    pub raw: String,
    /// Whitespace-collapsed, trimmed text.
    pub text: String,
    /// Checkbox markers in left-to-right order.
    pub markers: Vec<CheckboxMarker>,
    pub has_colon: bool,
    /// Length of the longest run of consecutive underscores.
    pub underscore_run: usize,
    /// Leading whitespace width in characters.
    pub indent: usize,
}

impl Line {
    /// Build a line and compute its metadata from layout-preserving text.
    #[must_use]
    pub fn new(index: usize, raw: String) -> Self {
        let markers = scan_markers(&raw);
        let text = RE_WHITESPACE.replace_all(raw.trim(), " ").into_owned();
        let has_colon = text.contains(':');
        let underscore_run = longest_underscore_run(&raw);
        let indent = raw.chars().take_while(|c| c.is_whitespace()).count();
        Self {
            index,
            raw,
            text,
            markers,
            has_colon,
            underscore_run,
            indent,
        }
    }

    /// Character offsets of each marker start, left to right.
    #[must_use]
    pub fn checkbox_positions(&self) -> Vec<usize> {
        self.markers.iter().map(|m| m.start).collect()
    }

    /// True when the line contains nothing but markers and whitespace.
    #[must_use]
    pub fn is_marker_only(&self) -> bool {
        if self.markers.is_empty() {
            return false;
        }
        let mut stripped: Vec<char> = self.raw.chars().collect();
        for marker in &self.markers {
            for slot in stripped
                .iter_mut()
                .take(marker.end)
                .skip(marker.start)
            {
                *slot = ' ';
            }
        }
        stripped.iter().all(|c| c.is_whitespace())
    }

    /// The raw line as characters, for offset-based slicing.
    #[must_use]
    pub fn raw_chars(&self) -> Vec<char> {
        self.raw.chars().collect()
    }
}

/// Whether any checkbox marker token appears in `raw`.
#[must_use]
pub fn has_marker(raw: &str) -> bool {
    RE_CHECKBOX.is_match(raw)
}

/// Locate checkbox markers, converting byte offsets to character offsets.
fn scan_markers(raw: &str) -> Vec<CheckboxMarker> {
    let mut markers = Vec::new();
    for m in RE_CHECKBOX.find_iter(raw) {
        let start = raw[..m.start()].chars().count();
        let len = m.as_str().chars().count();
        let checked = m
            .as_str()
            .chars()
            .any(|c| matches!(c, 'x' | 'X' | '✓' | '☑' | '☒' | '■'));
        markers.push(CheckboxMarker {
            start,
            end: start + len,
            checked,
        });
    }
    markers
}

fn longest_underscore_run(raw: &str) -> usize {
    let mut longest = 0;
    let mut current = 0;
    for ch in raw.chars() {
        if ch == '_' {
            current += 1;
            longest = longest.max(current);
        } else {
            current = 0;
        }
    }
    longest
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_marker_positions_are_char_offsets() {
        let line = Line::new(0, "[ ] Diabetes   [ ] Asthma".to_string());
        assert_eq!(line.checkbox_positions(), vec![0, 15]);
        assert!(!line.markers[0].checked);
    }

    #[test]
    fn test_checked_marker_variants() {
        let line = Line::new(0, "[x] Smoker  ☑ Insured  [ ] Pregnant".to_string());
        assert_eq!(line.markers.len(), 3);
        assert!(line.markers[0].checked);
        assert!(line.markers[1].checked);
        assert!(!line.markers[2].checked);
    }

    #[test]
    fn test_unicode_before_marker() {
        // A multi-byte glyph before the marker must not skew the offset.
        let line = Line::new(0, "café [ ] Allergy".to_string());
        assert_eq!(line.checkbox_positions(), vec![5]);
    }

    #[test]
    fn test_marker_only_line() {
        assert!(Line::new(0, "[ ]      [ ]      [ ]".to_string()).is_marker_only());
        assert!(!Line::new(0, "[ ] Anemia".to_string()).is_marker_only());
        assert!(!Line::new(0, "Anemia".to_string()).is_marker_only());
    }

    #[test]
    fn test_underscore_run_and_colon() {
        let line = Line::new(0, "Name: ______________".to_string());
        assert!(line.has_colon);
        assert_eq!(line.underscore_run, 14);
    }

    #[test]
    fn test_parenthesized_s_is_not_a_marker() {
        let line = Line::new(0, "List medication(s) taken".to_string());
        assert!(line.markers.is_empty());
    }
}
