//! Line classifier.
//!
//! Tags every preprocessed [`Line`] with exactly one [`LineKind`]. The rules
//! run in a fixed order and the classification is pure and total: it reads
//! the line (and, for category headers, the following line) and never
//! mutates anything.

use crate::line::Line;
use formlift_core::slug::slugify;
use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

/// A Yes/No marker pair, anywhere in a line.
pub(crate) static RE_YES_NO_PAIR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(?:\[\s?[xX✓]?\s?\]|[☐☑])\s*yes\b[\s,]*(?:\[\s?[xX✓]?\s?\]|[☐☑])\s*no\b|\byes\s*(?:\[\s?[xX✓]?\s?\]|[☐☑])\s*no\s*(?:\[\s?[xX✓]?\s?\]|[☐☑])|\byes\s*/\s*no\b",
    )
    .expect("regex is compile-time constant")
});

/// "If yes, please explain" style cue.
pub(crate) static RE_EXPLAIN_CUE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bif\s+(?:yes|so)\b[,:]?\s*(?:please\s+)?(?:explain|describe|list|state|give|specify|why|what|when|how)?|\bplease\s+(?:explain|describe|list|specify)\b")
        .expect("regex is compile-time constant")
});

/// Single field labels that must not be mistaken for headings, and that the
/// grid assembler strips when column text bleeds into a neighbor.
static KNOWN_LABELS: LazyLock<HashSet<&'static str>> = LazyLock::new(|| {
    [
        "name",
        "first_name",
        "last_name",
        "middle_initial",
        "date",
        "date_of_birth",
        "birth_date",
        "birthdate",
        "age",
        "sex",
        "signature",
        "phone",
        "phone_number",
        "home_phone",
        "work_phone",
        "cell_phone",
        "mobile",
        "address",
        "street_address",
        "city",
        "state",
        "zip",
        "zip_code",
        "ssn",
        "social_security_number",
        "email",
        "e_mail",
        "employer",
        "occupation",
        "relationship",
        "comments",
        "frequency",
        "how_much",
        "how_long",
        "how_often",
        "insurance_company",
        "policy_number",
        "group_number",
        "subscriber_name",
        "referred_by",
    ]
    .into_iter()
    .collect()
});

/// The category assigned to each line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    Blank,
    /// Contains at least one checkbox marker.
    CheckboxRow,
    /// 1-3 word label immediately preceding a checkbox row.
    CategoryHeader,
    /// Section heading (ALL-CAPS, clean Title-Case, or short colon line).
    Heading,
    /// Underscore blank to be filled in.
    FillInBlank,
    /// Question ending in a Yes/No marker pair.
    CompoundYesNo,
    Paragraph,
}

/// True when the trimmed text (sans trailing colon) is a recognized single
/// field label such as "Comments" or "How long".
#[must_use]
pub fn is_known_label(text: &str) -> bool {
    let stripped = text.trim().trim_end_matches([':', '.', '_']).trim();
    KNOWN_LABELS.contains(slugify(stripped).as_str())
}

/// Classify every line. `kinds[i]` corresponds to `lines[i]`.
#[must_use]
pub fn classify_lines(lines: &[Line]) -> Vec<LineKind> {
    (0..lines.len())
        .map(|i| classify_one(&lines[i], lines.get(i + 1)))
        .collect()
}

fn classify_one(line: &Line, next: Option<&Line>) -> LineKind {
    if line.text.is_empty() {
        return LineKind::Blank;
    }
    if !line.markers.is_empty() {
        return LineKind::CheckboxRow;
    }
    if is_category_header(line, next) {
        return LineKind::CategoryHeader;
    }
    if is_heading(&line.text) {
        return LineKind::Heading;
    }
    if is_fill_in_blank(line) {
        return LineKind::FillInBlank;
    }
    if RE_YES_NO_PAIR.is_match(&line.text) {
        return LineKind::CompoundYesNo;
    }
    LineKind::Paragraph
}

/// Headers precede their grid. Pure label rows ("Frequency", "Comments")
/// match the same shape and are excluded from option extraction on the same
/// basis.
fn is_category_header(line: &Line, next: Option<&Line>) -> bool {
    let words = line.text.split_whitespace().count();
    if !(1..=3).contains(&words) {
        return false;
    }
    if line.underscore_run >= 5 {
        return false;
    }
    next.is_some_and(|n| !n.markers.is_empty())
}

fn is_heading(text: &str) -> bool {
    if is_all_caps(text) {
        return true;
    }
    if is_clean_title_case(text) {
        return true;
    }
    // Short colon line, unless the content is a single recognized field
    // label ("Comments:" is a field, not a heading).
    if text.chars().count() < 100 && text.ends_with(':') {
        let content = &text[..text.len() - 1];
        return !is_known_label(content) && content.split_whitespace().count() <= 8;
    }
    false
}

fn is_all_caps(text: &str) -> bool {
    let letters: Vec<char> = text.chars().filter(|c| c.is_alphabetic()).collect();
    letters.len() >= 4 && letters.iter().all(|c| c.is_uppercase())
}

fn is_clean_title_case(text: &str) -> bool {
    let words: Vec<&str> = text.split_whitespace().collect();
    if !(2..=6).contains(&words.len()) {
        return false;
    }
    // Column-gapped text is layout, not a heading.
    if text.contains("   ") {
        return false;
    }
    if text.chars().any(|c| c.is_ascii_digit()) || text.ends_with('?') {
        return false;
    }
    words.iter().all(|w| {
        let mut chars = w.chars();
        chars.next().is_some_and(char::is_uppercase)
            && w.chars().all(|c| c.is_alphabetic() || c == '-' || c == '\'')
    }) && !is_known_label(text)
}

fn is_fill_in_blank(line: &Line) -> bool {
    if line.underscore_run < 5 {
        return false;
    }
    let underscores = line.raw.chars().filter(|c| *c == '_').count();
    let text_chars = line
        .raw
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '_')
        .count();
    // Ratio guard keeps prose that merely mentions a blank from matching.
    text_chars == 0 || underscores >= 2 * text_chars
}
