//! The sequential field-extraction state machine.
//!
//! Walks the classified line sequence once, trying prioritized detectors at
//! each position; the first detector that recognizes the shape consumes one
//! or more lines and emits fields into the [`ParseContext`]. Detector
//! priority, in order: compound Yes/No question (with optional conditional
//! follow-up), multi-subfield colon pattern, fill-in-the-blank, known-label
//! split, checkbox-grid trigger, and finally paragraph accumulation into a
//! terms field.
//!
//! All parse state travels in the [`ParseContext`] passed through each
//! detector call, so documents can be processed concurrently without
//! interference.

use crate::classify::{is_known_label, LineKind, RE_EXPLAIN_CUE, RE_YES_NO_PAIR};
use crate::grid::{assemble_fallback, assemble_grid, detect_columns};
use crate::line::Line;
use crate::sections::score_heading;
use formlift_core::slug::slugify;
use formlift_core::{Field, FieldType};
use log::debug;
use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

/// "Label:   Sub1    Sub2    Sub3" — one label distributing over several
/// capitalized sub-labels.
static RE_LABEL_COLON: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*([A-Z][A-Za-z'()/ ]{0,40}?)\s*:\s*(.+)$").expect("regex is compile-time constant")
});

/// Gap of four or more spaces separating sub-labels.
static RE_WIDE_GAP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s{4,}").expect("regex is compile-time constant"));

/// Gap of three or more spaces separating known labels.
static RE_LABEL_GAP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s{3,}").expect("regex is compile-time constant"));

/// Trailing Yes/No pair stripped from look-back titles.
static RE_YES_NO_STRIP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\s*(?:\[\s?[xX✓]?\s?\]|[☐☑])?\s*yes\s*(?:\[\s?[xX✓]?\s?\]|[☐☑/])\s*no\s*(?:\[\s?[xX✓]?\s?\]|[☐☑])?\s*$")
        .expect("regex is compile-time constant")
});

/// Fallback title for a grid with no usable preceding line.
const GENERIC_GRID_TITLE: &str = "Checklist";

/// Mutable context threaded through one document's extraction.
#[derive(Debug, Default)]
pub struct ParseContext {
    section: String,
    fields: Vec<Field>,
    used_keys: HashSet<String>,
}

impl ParseContext {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current section name (empty until the first recognized heading).
    #[must_use]
    pub fn section(&self) -> &str {
        &self.section
    }

    /// Push a field, suffixing its key if it collides with an earlier one.
    fn push(&mut self, mut field: Field) {
        if !self.used_keys.insert(field.key.clone()) {
            let mut n = 2;
            loop {
                let candidate = format!("{}_{n}", field.key);
                if self.used_keys.insert(candidate.clone()) {
                    field.key = candidate;
                    break;
                }
                n += 1;
            }
        }
        self.fields.push(field);
    }

    fn last_key(&self) -> Option<&str> {
        self.fields.last().map(|f| f.key.as_str())
    }

    fn into_fields(self) -> Vec<Field> {
        self.fields
    }
}

/// Run the state machine over a classified line sequence.
#[must_use]
pub fn run_state_machine(lines: &[Line], kinds: &[LineKind]) -> Vec<Field> {
    let mut ctx = ParseContext::new();
    let mut pos = 0;

    while pos < lines.len() {
        if kinds[pos] == LineKind::Blank {
            pos += 1;
            continue;
        }

        if let Some(consumed) = detect_compound_yes_no(lines, kinds, pos, &mut ctx) {
            pos += consumed;
            continue;
        }

        if kinds[pos] == LineKind::Heading {
            if let Some(section) = score_heading(&lines[pos].text) {
                ctx.section = section.to_string();
            }
            pos += 1;
            continue;
        }

        if let Some(consumed) = detect_multi_subfield(lines, pos, &mut ctx) {
            pos += consumed;
            continue;
        }
        if let Some(consumed) = detect_fill_in_blank(lines, kinds, pos, &mut ctx) {
            pos += consumed;
            continue;
        }
        if let Some(consumed) = detect_known_label_split(lines, pos, &mut ctx) {
            pos += consumed;
            continue;
        }
        if let Some(consumed) = detect_grid(lines, kinds, pos, &mut ctx) {
            pos += consumed;
            continue;
        }

        if kinds[pos] == LineKind::CategoryHeader {
            // Column label with no field of its own.
            pos += 1;
            continue;
        }

        pos += accumulate_paragraphs(lines, kinds, pos, &mut ctx);
    }

    ctx.into_fields()
}

/// (a) Compound Yes/No question, optionally followed by an "if yes,
/// explain" clause that becomes a conditional input field.
fn detect_compound_yes_no(
    lines: &[Line],
    kinds: &[LineKind],
    pos: usize,
    ctx: &mut ParseContext,
) -> Option<usize> {
    let line = &lines[pos];
    let pair = RE_YES_NO_PAIR.find(&line.text)?;

    let question = line.text[..pair.start()].trim();
    if question.chars().filter(|c| c.is_alphabetic()).count() < 4 {
        return None;
    }
    let title = strip_instruction_suffix(question);
    if title.is_empty() {
        return None;
    }

    let tail = &line.text[pair.end()..];
    let mut consumed = 1;
    let mut has_follow_up = RE_EXPLAIN_CUE.is_match(tail) || RE_EXPLAIN_CUE.is_match(question);

    // The cue often lands on its own line right below the question.
    if !has_follow_up {
        if let Some(next) = lines.get(pos + 1) {
            if RE_EXPLAIN_CUE.is_match(&next.text)
                && matches!(kinds[pos + 1], LineKind::FillInBlank | LineKind::Paragraph)
            {
                has_follow_up = true;
                consumed = 2;
            }
        }
    }

    let mut radio = Field::yes_no(ctx.section.clone(), title.clone());
    // When the pair is the only marked pair on the line, carry the ticks.
    if line.markers.len() == 2 {
        radio.options[0].checked = Some(line.markers[0].checked);
        radio.options[1].checked = Some(line.markers[1].checked);
    }
    ctx.push(radio);
    let radio_key = ctx.last_key().unwrap_or_default().to_string();

    if has_follow_up {
        let follow_up = Field::input(ctx.section.clone(), format!("{title} Explanation"))
            .conditional_on(radio_key, "yes");
        ctx.push(follow_up);
    }

    Some(consumed)
}

/// (b) "Label:  Sub1   Sub2   Sub3" → one field per sub-label.
fn detect_multi_subfield(lines: &[Line], pos: usize, ctx: &mut ParseContext) -> Option<usize> {
    let line = &lines[pos];
    if !line.markers.is_empty() || line.underscore_run >= 5 {
        return None;
    }
    let caps = RE_LABEL_COLON.captures(&line.raw)?;
    let label = caps.get(1)?.as_str().trim();
    let rest = caps.get(2)?.as_str();
    if rest.contains(':') {
        return None;
    }

    let subs: Vec<&str> = RE_WIDE_GAP
        .split(rest.trim())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();
    if subs.len() < 2 || !subs.iter().all(|s| is_capitalized_sub_label(s)) {
        return None;
    }

    for sub in subs {
        let title = format!("{sub} {label}");
        let field_type = title_field_type(&title);
        ctx.push(Field::new(ctx.section.clone(), title, field_type));
    }
    Some(1)
}

/// (c) Fill-in-the-blank line → one input field.
fn detect_fill_in_blank(
    lines: &[Line],
    kinds: &[LineKind],
    pos: usize,
    ctx: &mut ParseContext,
) -> Option<usize> {
    if kinds[pos] != LineKind::FillInBlank {
        return None;
    }
    let line = &lines[pos];
    // Lines carrying several known labels belong to the label-split
    // detector; one field per label beats one mislabeled blank.
    if known_label_segments(line).map_or(0, |s| s.len()) >= 2 {
        return None;
    }

    let prefix: String = line
        .raw
        .chars()
        .take_while(|c| *c != '_')
        .collect::<String>()
        .trim()
        .trim_end_matches(':')
        .trim()
        .to_string();

    let title = if prefix.chars().any(char::is_alphabetic) {
        prefix
    } else {
        look_back_title(lines, kinds, pos).unwrap_or_default()
    };

    let field_type = title_field_type(&title);
    ctx.push(Field::new(ctx.section.clone(), title, field_type));
    Some(1)
}

/// (d) Two or more known labels on one line, split by wide gaps.
fn detect_known_label_split(lines: &[Line], pos: usize, ctx: &mut ParseContext) -> Option<usize> {
    let line = &lines[pos];
    if !line.markers.is_empty() {
        return None;
    }
    let segments = known_label_segments(line)?;
    if segments.len() < 2 {
        return None;
    }
    for segment in segments {
        let field_type = title_field_type(&segment);
        ctx.push(Field::new(ctx.section.clone(), segment, field_type));
    }
    Some(1)
}

/// Split a line on ≥3-space gaps and return the cleaned segments, provided
/// every segment is a recognized field label.
fn known_label_segments(line: &Line) -> Option<Vec<String>> {
    let segments: Vec<String> = RE_LABEL_GAP
        .split(line.raw.trim())
        .map(|s| {
            // Strip the blank first, then the label's own colon.
            s.trim()
                .trim_end_matches('_')
                .trim_end()
                .trim_end_matches([':', '.'])
                .trim_end()
                .to_string()
        })
        .filter(|s| !s.is_empty())
        .collect();
    if segments.is_empty() || !segments.iter().all(|s| is_known_label(s)) {
        return None;
    }
    Some(segments)
}

/// (e) Checkbox-grid trigger: collect the run, resolve columns, emit one
/// consolidated checkbox group.
fn detect_grid(
    lines: &[Line],
    kinds: &[LineKind],
    pos: usize,
    ctx: &mut ParseContext,
) -> Option<usize> {
    if kinds[pos] != LineKind::CheckboxRow {
        return None;
    }

    let run = collect_grid_run(lines, kinds, pos);
    let run_lines: Vec<&Line> = run.iter().map(|i| &lines[*i]).collect();
    let run_kinds: Vec<LineKind> = run.iter().map(|i| kinds[*i]).collect();

    let checkbox_rows: Vec<&Line> = run_lines
        .iter()
        .copied()
        .zip(run_kinds.iter())
        .filter(|(_, k)| **k == LineKind::CheckboxRow)
        .map(|(l, _)| l)
        .collect();

    let options = match detect_columns(&checkbox_rows) {
        Some(anchors) => assemble_grid(&anchors, &run_lines, &run_kinds),
        None => {
            debug!(
                "grid detection inconclusive at line {}; falling back to per-line options",
                lines[pos].index
            );
            assemble_fallback(&run_lines, &run_kinds)
        }
    };

    let consumed = run.len();
    if options.is_empty() {
        return Some(consumed);
    }

    let title = look_back_title(lines, kinds, pos).unwrap_or_else(|| GENERIC_GRID_TITLE.to_string());
    ctx.push(Field::checkbox_group(ctx.section.clone(), title, options));
    Some(consumed)
}

/// Indices of the contiguous grid run starting at `pos`.
fn collect_grid_run(lines: &[Line], kinds: &[LineKind], pos: usize) -> Vec<usize> {
    let mut run = vec![pos];
    let mut i = pos + 1;
    while i < lines.len() {
        let kind = kinds[i];
        let prev = *run.last().unwrap_or(&pos);
        let extend = match kind {
            LineKind::CheckboxRow => !RE_YES_NO_PAIR.is_match(&lines[i].text),
            LineKind::CategoryHeader => true,
            LineKind::Blank => lines
                .get(i + 1)
                .is_some_and(|next| !next.markers.is_empty()),
            // Orphan label line directly under a marker-only line.
            _ => lines[prev].is_marker_only() && lines[i].markers.is_empty(),
        };
        if !extend {
            break;
        }
        run.push(i);
        i += 1;
    }
    run
}

/// (f) Default: accumulate consecutive paragraph lines into a terms field,
/// stopping early at a compound Yes/No pattern.
fn accumulate_paragraphs(
    lines: &[Line],
    kinds: &[LineKind],
    pos: usize,
    ctx: &mut ParseContext,
) -> usize {
    let mut texts: Vec<&str> = Vec::new();
    let mut i = pos;
    while i < lines.len()
        && kinds[i] == LineKind::Paragraph
        && !(i > pos && RE_YES_NO_PAIR.is_match(&lines[i].text))
    {
        texts.push(&lines[i].text);
        i += 1;
    }
    let consumed = (i - pos).max(1);
    let joined = texts.join(" ");

    // A single line directly above a grid, or above a blank with no label
    // of its own, is that field's title, captured later by look-back;
    // emitting it as consent text would duplicate it.
    let next_takes_title = match kinds.get(i) {
        Some(LineKind::CheckboxRow | LineKind::CategoryHeader) => true,
        Some(LineKind::FillInBlank) => !lines[i]
            .raw
            .chars()
            .take_while(|c| *c != '_')
            .any(char::is_alphabetic),
        _ => false,
    };
    if texts.len() == 1 && next_takes_title {
        return consumed;
    }

    if texts.len() == 1 {
        let single = texts[0].trim_end_matches(':').trim();
        // A lone field label ("Comments:") is an input, not consent text.
        if is_known_label(single) || (single.chars().count() <= 30 && texts[0].ends_with(':')) {
            ctx.push(Field::input(ctx.section.clone(), single));
            return consumed;
        }
    }

    if joined.chars().count() >= 40 || joined.contains(". ") || joined.ends_with('.') {
        let title: String = joined.split_whitespace().take(8).collect::<Vec<_>>().join(" ");
        ctx.push(Field::terms(ctx.section.clone(), title, &joined));
    } else if !joined.is_empty() {
        debug!("skipping stray line: {joined:?}");
    }
    consumed
}

/// Nearest preceding non-blank line that is neither a checkbox row nor a
/// category header, cleaned up for use as a title.
fn look_back_title(lines: &[Line], kinds: &[LineKind], pos: usize) -> Option<String> {
    for i in (0..pos).rev() {
        match kinds[i] {
            LineKind::Blank | LineKind::CheckboxRow | LineKind::CategoryHeader => continue,
            _ => {}
        }
        let text = lines[i].text.trim();
        if text.is_empty() {
            continue;
        }
        let stripped = RE_YES_NO_STRIP.replace(text, "");
        let title = stripped.trim().trim_end_matches(':').trim().to_string();
        if !title.is_empty() {
            return Some(title);
        }
    }
    None
}

/// Strip an inline "if yes, explain" clause and trailing punctuation
/// (keeping a question mark) from a question.
fn strip_instruction_suffix(question: &str) -> String {
    let cleaned = match RE_EXPLAIN_CUE.find(question) {
        Some(m) => &question[..m.start()],
        None => question,
    };
    cleaned
        .trim()
        .trim_end_matches([',', ';', ':', '-'])
        .trim()
        .to_string()
}

fn is_capitalized_sub_label(sub: &str) -> bool {
    let words: Vec<&str> = sub.split_whitespace().collect();
    if !(1..=3).contains(&words.len()) || sub.chars().count() > 25 {
        return false;
    }
    words.iter().all(|w| {
        w.chars().next().is_some_and(char::is_uppercase)
            && w.chars().all(|c| c.is_alphabetic() || c == '/' || c == '-')
    })
}

/// Choose a type from a title: dates and signatures are recognized, the
/// rest is free text.
fn title_field_type(title: &str) -> FieldType {
    let slug = slugify(title);
    if slug.contains("signature") {
        FieldType::Signature
    } else if slug.contains("date") || slug.contains("birth") {
        FieldType::Date
    } else {
        FieldType::Input
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::classify_lines;
    use crate::preprocess::preprocess;

    fn extract(text: &str) -> Vec<Field> {
        let lines = preprocess(text).unwrap();
        let kinds = classify_lines(&lines);
        run_state_machine(&lines, &kinds)
    }

    #[test]
    fn test_compound_yes_no_with_follow_up() {
        let fields =
            extract("Are you under a physician's care? [ ] Yes [ ] No If yes, please explain");
        assert_eq!(fields.len(), 2);
        assert_eq!(fields[0].field_type, FieldType::Radio);
        assert_eq!(fields[0].title, "Are you under a physician's care?");
        assert_eq!(fields[1].field_type, FieldType::Input);
        assert_eq!(fields[1].conditional_on[0].parent_key, fields[0].key);
        assert_eq!(fields[1].conditional_on[0].value, "yes");
        assert!(!fields[1].title.to_lowercase().contains("please"));
    }

    #[test]
    fn test_compound_without_cue_emits_radio_only() {
        let fields = extract("Do you smoke? Yes / No");
        assert_eq!(fields.len(), 1);
        assert_eq!(fields[0].field_type, FieldType::Radio);
    }

    #[test]
    fn test_compound_cue_on_next_line() {
        let fields = extract("Have you been hospitalized? [ ] Yes [ ] No\nIf yes, explain: ____________________");
        assert_eq!(fields.len(), 2);
        assert_eq!(fields[1].conditional_on[0].value, "yes");
    }

    #[test]
    fn test_multi_subfield_split() {
        let fields = extract("Phone:    Home      Work      Cell");
        let titles: Vec<&str> = fields.iter().map(|f| f.title.as_str()).collect();
        assert_eq!(titles, vec!["Home Phone", "Work Phone", "Cell Phone"]);
    }

    #[test]
    fn test_fill_in_blank_same_line_prefix() {
        let fields = extract("Employer: _______________________");
        assert_eq!(fields.len(), 1);
        assert_eq!(fields[0].title, "Employer");
        assert_eq!(fields[0].field_type, FieldType::Input);
    }

    #[test]
    fn test_fill_in_blank_date_type() {
        let fields = extract("Date of Birth: ___________________________");
        assert_eq!(fields[0].field_type, FieldType::Date);
    }

    #[test]
    fn test_fill_in_blank_title_from_previous_line() {
        let fields = extract("Please list any medications you are currently taking.\n_________________________________");
        // The instruction line is the blank's title, not a field of its own.
        assert_eq!(fields.len(), 1);
        assert_eq!(fields[0].field_type, FieldType::Input);
        assert!(fields[0].title.starts_with("Please list any medications"));
    }

    #[test]
    fn test_instruction_kept_when_blank_carries_its_own_label() {
        let text = "\
I certify the above information is complete and accurate.
Signature: ______________________";
        let fields = extract(text);
        assert_eq!(fields.len(), 2);
        assert_eq!(fields[0].field_type, FieldType::Terms);
        assert_eq!(fields[1].field_type, FieldType::Signature);
        assert_eq!(fields[1].title, "Signature");
    }

    #[test]
    fn test_known_label_split() {
        let fields = extract("Signature: ____________     Date: ____________");
        assert_eq!(fields.len(), 2);
        assert_eq!(fields[0].field_type, FieldType::Signature);
        assert_eq!(fields[1].field_type, FieldType::Date);
    }

    #[test]
    fn test_grid_emits_single_checkbox_group() {
        let text = "\
Have you ever had any of the following?
[ ] Diabetes   [ ] Asthma   [ ] Cancer
[ ] Arthritis  [ ] Emphysema [ ] AIDS";
        let fields = extract(text);
        assert_eq!(fields.len(), 1);
        let grid = &fields[0];
        assert_eq!(grid.field_type, FieldType::CheckboxGroup);
        assert_eq!(grid.title, "Have you ever had any of the following?");
        assert_eq!(grid.options.len(), 6);
    }

    #[test]
    fn test_grid_title_skips_category_header() {
        let text = "\
Do you have or have you had any of the following?
Cardiovascular
[ ] Heart Murmur   [ ] Angina
[ ] Stroke         [ ] High Blood Pressure";
        let fields = extract(text);
        assert_eq!(fields.len(), 1);
        assert!(fields[0].title.starts_with("Do you have"));
        assert!(fields[0].options.iter().all(|o| o.name != "Cardiovascular"));
    }

    #[test]
    fn test_section_tracking() {
        let text = "\
MEDICAL HISTORY
Are you diabetic? Yes / No
DENTAL HISTORY
Do your gums bleed? Yes / No";
        let fields = extract(text);
        assert_eq!(fields[0].section, "Medical History");
        assert_eq!(fields[1].section, "Dental History");
    }

    #[test]
    fn test_terms_accumulation_stops_at_compound() {
        let text = "\
I understand that the information provided is accurate to the best of my knowledge.
I agree to be responsible for payment of all services rendered on my behalf.
Have you ever had a serious reaction? Yes / No";
        let fields = extract(text);
        assert_eq!(fields.len(), 2);
        assert_eq!(fields[0].field_type, FieldType::Terms);
        assert_eq!(fields[1].field_type, FieldType::Radio);
    }

    #[test]
    fn test_lone_known_label_becomes_input() {
        let fields = extract("Comments:");
        assert_eq!(fields.len(), 1);
        assert_eq!(fields[0].title, "Comments");
        assert_eq!(fields[0].field_type, FieldType::Input);
    }

    #[test]
    fn test_key_collision_gets_suffix() {
        let text = "Phone: _______________________\nPhone: _______________________";
        let fields = extract(text);
        assert_eq!(fields.len(), 2);
        assert_ne!(fields[0].key, fields[1].key);
        assert!(fields[1].key.ends_with("_2"));
    }
}
