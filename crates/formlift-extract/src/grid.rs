//! Checkbox-grid column detection and assembly.
//!
//! A multi-column checkbox grid arrives as plain text lines: markers at
//! roughly repeating character offsets, labels between them, sometimes a
//! category header interleaved or a label orphaned onto the next line. The
//! [`detect_columns`] pass decides whether a run of checkbox rows really is
//! a grid by clustering marker offsets into [`ColumnAnchor`]s; the
//! [`assemble_grid`] pass then extracts one clean option list, bounding each
//! label by the next column so adjacent-column text cannot bleed through.
//!
//! When detection is inconclusive the caller falls back to per-line
//! extraction ([`options_from_line`]) — the conservative default that never
//! fabricates column structure and never drops a marker.

use crate::classify::{is_known_label, LineKind};
use crate::line::Line;
use formlift_core::{dedup_options, FieldOption};
use regex::Regex;
use std::sync::LazyLock;

/// Column offsets within this distance of each other belong to one column.
const CLUSTER_TOLERANCE: usize = 3;
/// Minimum fraction of lines that must carry a marker near an anchor.
const MIN_SUPPORT: f64 = 0.5;
/// Stricter support required when only two columns survive.
const TWO_COLUMN_SUPPORT: f64 = 0.7;

/// Trailing fragments that belong to a different logical column and bleed
/// into option labels ("Tobacco  How much" etc.).
static RE_TRAILING_LABEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\s+(?:frequency|how\s+much|how\s+long|how\s+often|comments?|date|y\s*/?\s*n)\s*:?\s*$")
        .expect("regex is compile-time constant")
});

/// Gap of two or more spaces, used to split orphaned label fragments.
static RE_FRAGMENT_GAP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s{2,}").expect("regex is compile-time constant"));

/// A clustered character offset believed to represent one visual column.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColumnAnchor {
    /// Median character offset of the cluster.
    pub position: usize,
    /// Fraction of sampled lines contributing a marker to this cluster.
    pub support: f64,
}

/// Cluster checkbox offsets across a run of checkbox rows.
///
/// Returns `None` when the run does not look like a genuine multi-column
/// grid: fewer than two lines, no cluster with enough support, or only one
/// or two weak clusters. The decision rule accepts three or more supported
/// clusters, or exactly two clusters that are both strongly supported.
#[must_use]
pub fn detect_columns(lines: &[&Line]) -> Option<Vec<ColumnAnchor>> {
    if lines.len() < 2 {
        return None;
    }

    // (offset, line index) pairs, sorted by offset.
    let mut offsets: Vec<(usize, usize)> = Vec::new();
    for (line_idx, line) in lines.iter().enumerate() {
        for pos in line.checkbox_positions() {
            offsets.push((pos, line_idx));
        }
    }
    if offsets.is_empty() {
        return None;
    }
    offsets.sort_unstable();

    // Greedy clustering: a new cluster starts when the offset drifts more
    // than the tolerance away from the cluster's seed.
    let mut clusters: Vec<Vec<(usize, usize)>> = Vec::new();
    for entry in offsets {
        let joined = match clusters.last_mut() {
            Some(cluster) if entry.0 - cluster[0].0 <= CLUSTER_TOLERANCE => {
                cluster.push(entry);
                true
            }
            _ => false,
        };
        if !joined {
            clusters.push(vec![entry]);
        }
    }

    let total_lines = lines.len() as f64;
    let mut anchors: Vec<ColumnAnchor> = Vec::new();
    for cluster in &clusters {
        let mut positions: Vec<usize> = cluster.iter().map(|(pos, _)| *pos).collect();
        positions.sort_unstable();
        let median = positions[positions.len() / 2];

        let mut contributing: Vec<usize> = cluster.iter().map(|(_, line)| *line).collect();
        contributing.sort_unstable();
        contributing.dedup();
        let support = contributing.len() as f64 / total_lines;

        if support >= MIN_SUPPORT {
            anchors.push(ColumnAnchor {
                position: median,
                support,
            });
        }
    }

    match anchors.len() {
        0 | 1 => None,
        2 if anchors.iter().all(|a| a.support >= TWO_COLUMN_SUPPORT) => Some(anchors),
        2 => None,
        _ => Some(anchors),
    }
}

/// Assemble the consolidated option list for an accepted grid.
///
/// `lines` is the full run (checkbox rows plus any interleaved category
/// headers, blanks, and orphan label lines) and `kinds` the matching
/// classifications. Category-header and blank lines never contribute
/// options. Duplicate option names are dropped first-wins.
#[must_use]
pub fn assemble_grid(anchors: &[ColumnAnchor], lines: &[&Line], kinds: &[LineKind]) -> Vec<FieldOption> {
    let mut options: Vec<FieldOption> = Vec::new();
    let mut skip_next = false;

    for (i, line) in lines.iter().enumerate() {
        if skip_next {
            skip_next = false;
            continue;
        }
        match kinds[i] {
            LineKind::Blank | LineKind::CategoryHeader | LineKind::Heading => continue,
            _ => {}
        }
        if line.markers.is_empty() {
            // Orphan label lines are consumed together with the marker line
            // above them; anything else without a marker is not ours.
            continue;
        }

        if line.is_marker_only() {
            if let Some(next) = lines.get(i + 1) {
                if next.markers.is_empty() && !next.text.is_empty() {
                    options.extend(zip_orphaned_labels(line, next));
                    skip_next = true;
                    continue;
                }
            }
            continue;
        }

        options.extend(options_from_grid_line(anchors, line));
    }

    dedup_options(options)
}

/// Extract options from one line of an accepted grid.
fn options_from_grid_line(anchors: &[ColumnAnchor], line: &Line) -> Vec<FieldOption> {
    let chars = line.raw_chars();
    let mut out = Vec::new();
    let mut used_markers = vec![false; line.markers.len()];

    // Match each anchor to the nearest unused marker within tolerance.
    let mut anchor_markers: Vec<Option<usize>> = Vec::with_capacity(anchors.len());
    for anchor in anchors {
        let mut best: Option<(usize, usize)> = None;
        for (mi, marker) in line.markers.iter().enumerate() {
            if used_markers[mi] {
                continue;
            }
            let distance = marker.start.abs_diff(anchor.position);
            if distance <= CLUSTER_TOLERANCE && best.map_or(true, |(_, d)| distance < d) {
                best = Some((mi, distance));
            }
        }
        if let Some((mi, _)) = best {
            used_markers[mi] = true;
        }
        anchor_markers.push(best.map(|(mi, _)| mi));
    }

    for (ai, matched) in anchor_markers.iter().enumerate() {
        // The label is bounded by the next column: either its matched
        // marker's start on this line, or the anchor offset itself.
        let end_bound = match anchor_markers.get(ai + 1) {
            Some(Some(next_marker)) => line.markers[*next_marker].start,
            Some(None) => anchors[ai + 1].position.min(chars.len()),
            None => chars.len(),
        };

        match matched {
            Some(mi) => {
                let marker = line.markers[*mi];
                let label = slice_chars(&chars, marker.end, end_bound);
                let label = clean_label(&label);
                if !label.is_empty() && label.chars().any(char::is_alphabetic) {
                    out.push(FieldOption::with_checked(label, marker.checked));
                }
            }
            None => {
                // Text with no marker at an established column: position
                // implies membership, but only if at least one other anchor
                // matched on this line and the text looks like an item.
                if anchor_markers.iter().any(Option::is_some) {
                    let start = anchors[ai].position.min(chars.len());
                    let label = clean_label(&slice_chars(&chars, start, end_bound));
                    if is_valid_text_only_item(&label) {
                        out.push(FieldOption::new(label));
                    }
                }
            }
        }
    }

    // Markers the anchors never claimed still carry data; bound each label
    // by the next marker so nothing is silently dropped.
    for (mi, marker) in line.markers.iter().enumerate() {
        if used_markers[mi] {
            continue;
        }
        let end_bound = line
            .markers
            .get(mi + 1)
            .map_or(chars.len(), |next| next.start);
        let label = clean_label(&slice_chars(&chars, marker.end, end_bound));
        if !label.is_empty() && label.chars().any(char::is_alphabetic) {
            out.push(FieldOption::with_checked(label, marker.checked));
        }
    }

    out
}

/// Zip a marker-only line to the short label fragments on the next line,
/// left to right.
fn zip_orphaned_labels(marker_line: &Line, label_line: &Line) -> Vec<FieldOption> {
    let fragments: Vec<&str> = RE_FRAGMENT_GAP
        .split(label_line.raw.trim())
        .map(str::trim)
        .filter(|f| !f.is_empty())
        .collect();

    marker_line
        .markers
        .iter()
        .zip(fragments)
        .filter(|(_, fragment)| fragment.chars().any(char::is_alphabetic))
        .map(|(marker, fragment)| FieldOption::with_checked(clean_label(fragment), marker.checked))
        .collect()
}

/// Fallback assembly for a run that column detection rejected.
///
/// Each line is treated independently (no column splitting), but orphaned
/// marker lines still zip to the label line below them and category
/// headers still never contribute. Every marker in the run is guaranteed
/// to surface as an option.
#[must_use]
pub fn assemble_fallback(lines: &[&Line], kinds: &[LineKind]) -> Vec<FieldOption> {
    let mut options: Vec<FieldOption> = Vec::new();
    let mut skip_next = false;
    for (i, line) in lines.iter().enumerate() {
        if skip_next {
            skip_next = false;
            continue;
        }
        match kinds[i] {
            LineKind::Blank | LineKind::CategoryHeader | LineKind::Heading => continue,
            _ => {}
        }
        if line.markers.is_empty() {
            continue;
        }
        if line.is_marker_only() {
            if let Some(next) = lines.get(i + 1) {
                if next.markers.is_empty() && !next.text.is_empty() {
                    options.extend(zip_orphaned_labels(line, next));
                    skip_next = true;
                    continue;
                }
            }
        }
        options.extend(options_from_line(line));
    }
    dedup_options(options)
}

/// Per-line fallback extraction used when column detection returns `None`.
///
/// Every marker yields an option; each label runs from just after its
/// marker to the next marker (or end of line).
#[must_use]
pub fn options_from_line(line: &Line) -> Vec<FieldOption> {
    let chars = line.raw_chars();
    let mut out = Vec::new();
    for (mi, marker) in line.markers.iter().enumerate() {
        let end_bound = line
            .markers
            .get(mi + 1)
            .map_or(chars.len(), |next| next.start);
        let label = clean_label(&slice_chars(&chars, marker.end, end_bound));
        let name = if label.chars().any(char::is_alphabetic) {
            label
        } else {
            // No adjacent text; keep the marker anyway so no checkbox is
            // ever lost, using its ordinal as a placeholder name.
            format!("Option {}", mi + 1)
        };
        out.push(FieldOption::with_checked(name, marker.checked));
    }
    out
}

/// Validation for text-only items (label present, marker missing).
fn is_valid_text_only_item(label: &str) -> bool {
    let len = label.chars().count();
    (3..=50).contains(&len)
        && label.chars().any(char::is_alphabetic)
        && label
            .chars()
            .find(|c| c.is_alphabetic())
            .is_some_and(char::is_uppercase)
        && !is_known_label(label)
}

fn slice_chars(chars: &[char], start: usize, end: usize) -> String {
    if start >= end || start >= chars.len() {
        return String::new();
    }
    chars[start..end.min(chars.len())].iter().collect()
}

/// Trim a raw label and strip trailing fragments from neighboring logical
/// columns ("Frequency", "How much", ...).
fn clean_label(label: &str) -> String {
    let trimmed = label.trim().trim_matches(|c: char| c == '_');
    let stripped = RE_TRAILING_LABEL.replace(trimmed, "");
    stripped
        .trim()
        .trim_end_matches([',', ';'])
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::classify_lines;
    use crate::preprocess::preprocess;

    fn grid_fixture(text: &str) -> (Vec<Line>, Vec<LineKind>) {
        let lines = preprocess(text).unwrap();
        let kinds = classify_lines(&lines);
        (lines, kinds)
    }

    #[test]
    fn test_four_column_clustering_full_support() {
        // Markers at offsets {2, 20, 38, 56} with ±1 noise across 4 lines.
        let text = "\
  [ ] Diabetes      [ ] Asthma        [ ] Cancer        [ ] Ulcers
   [ ] Anemia       [ ] Glaucoma      [ ] Stroke         [ ] Gout
  [ ] Epilepsy       [ ] Hepatitis    [ ] Arthritis     [ ] AIDS
  [ ] Jaundice      [ ] Emphysema      [ ] Angina       [ ] Lupus";
        let lines = preprocess(text).unwrap();
        let refs: Vec<&Line> = lines.iter().collect();
        let anchors = detect_columns(&refs).expect("grid expected");
        assert_eq!(anchors.len(), 4);
        for anchor in &anchors {
            assert!((anchor.support - 1.0).abs() < f64::EPSILON);
        }
        assert!(anchors[0].position.abs_diff(2) <= 1);
        assert!(anchors[3].position.abs_diff(56) <= 2);
    }

    #[test]
    fn test_two_strong_columns_accepted() {
        let text = "\
[ ] Diabetes          [ ] Asthma
[ ] Arthritis         [ ] Emphysema
[ ] Cancer            [ ] AIDS";
        let lines = preprocess(text).unwrap();
        let refs: Vec<&Line> = lines.iter().collect();
        let anchors = detect_columns(&refs).expect("two-column grid expected");
        assert_eq!(anchors.len(), 2);
    }

    #[test]
    fn test_scattered_markers_rejected() {
        // Offsets share no column structure; conservative fallback.
        let text = "\
[ ] Diabetes
          [ ] Asthma
                    [ ] Cancer";
        let lines = preprocess(text).unwrap();
        let refs: Vec<&Line> = lines.iter().collect();
        assert!(detect_columns(&refs).is_none());
    }

    #[test]
    fn test_single_line_is_not_a_grid() {
        let lines = preprocess("[ ] Diabetes   [ ] Asthma   [ ] Cancer").unwrap();
        let refs: Vec<&Line> = lines.iter().collect();
        assert!(detect_columns(&refs).is_none());
    }

    #[test]
    fn test_assembly_no_concatenation_no_loss() {
        let text = "\
[ ] Diabetes   [ ] Asthma   [ ] Cancer
[ ] Arthritis  [ ] Emphysema [ ] AIDS";
        let (lines, kinds) = grid_fixture(text);
        let refs: Vec<&Line> = lines.iter().collect();
        let anchors = detect_columns(&refs).expect("grid expected");
        let options = assemble_grid(&anchors, &refs, &kinds);
        let names: Vec<&str> = options.iter().map(|o| o.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["Diabetes", "Asthma", "Cancer", "Arthritis", "Emphysema", "AIDS"]
        );
    }

    #[test]
    fn test_orphaned_checkboxes_zip_to_next_line() {
        let text = "\
[ ] Hepatitis   [ ] Jaundice    [ ] Tuberculosis
[ ]      [ ]      [ ]
Anemia   Convulsions   Hay Fever";
        let (lines, kinds) = grid_fixture(text);
        let refs: Vec<&Line> = lines.iter().collect();
        let anchors = detect_columns(&refs).unwrap_or_default();
        let options = if anchors.is_empty() {
            // Orphan zipping also works without column anchors.
            assemble_grid(&[], &refs, &kinds)
        } else {
            assemble_grid(&anchors, &refs, &kinds)
        };
        let names: Vec<&str> = options.iter().map(|o| o.name.as_str()).collect();
        assert!(names.contains(&"Anemia"));
        assert!(names.contains(&"Convulsions"));
        assert!(names.contains(&"Hay Fever"));
    }

    #[test]
    fn test_category_header_never_becomes_option() {
        let text = "\
[ ] Heart Murmur     [ ] High Blood Pressure
Cardiovascular
[ ] Angina           [ ] Irregular Heartbeat";
        let (lines, kinds) = grid_fixture(text);
        let refs: Vec<&Line> = lines.iter().collect();
        let checkbox_rows: Vec<&Line> =
            refs.iter().copied().filter(|l| !l.markers.is_empty()).collect();
        let anchors = detect_columns(&checkbox_rows).expect("grid expected");
        let options = assemble_grid(&anchors, &refs, &kinds);
        assert!(options.iter().all(|o| o.name != "Cardiovascular"));
        assert_eq!(options.len(), 4);
    }

    #[test]
    fn test_trailing_column_label_stripped() {
        let text = "\
[ ] Tobacco        How much
[ ] Alcohol        How much";
        let (lines, kinds) = grid_fixture(text);
        let refs: Vec<&Line> = lines.iter().collect();
        // One column only; falls back to per-line extraction.
        assert!(detect_columns(&refs).is_none());
        let _ = kinds;
        let options: Vec<FieldOption> =
            refs.iter().flat_map(|l| options_from_line(l)).collect();
        let names: Vec<&str> = options.iter().map(|o| o.name.as_str()).collect();
        assert_eq!(names, vec!["Tobacco", "Alcohol"]);
    }

    #[test]
    fn test_text_only_item_at_established_column() {
        let text = "\
[ ] Diabetes      [ ] Asthma
[ ] Epilepsy      Hay Fever
[ ] Cancer        [ ] Stroke
[ ] Anemia        [ ] Gout";
        let (lines, kinds) = grid_fixture(text);
        let refs: Vec<&Line> = lines.iter().collect();
        let anchors = detect_columns(&refs).expect("grid expected");
        let options = assemble_grid(&anchors, &refs, &kinds);
        let names: Vec<&str> = options.iter().map(|o| o.name.as_str()).collect();
        assert!(names.contains(&"Hay Fever"), "text-only item kept: {names:?}");
    }

    #[test]
    fn test_duplicate_options_first_wins() {
        let text = "\
[x] Diabetes      [ ] Asthma
[ ] Diabetes      [ ] Stroke";
        let (lines, kinds) = grid_fixture(text);
        let refs: Vec<&Line> = lines.iter().collect();
        let anchors = detect_columns(&refs).expect("grid expected");
        let options = assemble_grid(&anchors, &refs, &kinds);
        let diabetes: Vec<&FieldOption> =
            options.iter().filter(|o| o.value == "diabetes").collect();
        assert_eq!(diabetes.len(), 1);
        assert_eq!(diabetes[0].checked, Some(true));
    }

    #[test]
    fn test_fallback_marker_without_text_is_kept() {
        let line = Line::new(0, "[ ] Diabetes   [ ]".to_string());
        let options = options_from_line(&line);
        assert_eq!(options.len(), 2);
        assert_eq!(options[0].name, "Diabetes");
        assert_eq!(options[1].name, "Option 2");
    }
}
