//! Post-processor chain.
//!
//! A fixed sequence of pure `Vec<Field> -> Vec<Field>` passes applied to
//! the state machine's output: duplicate consolidation, condition-grid
//! consolidation, section inference, title de-duplication, and signature
//! normalization, followed by a fail-soft invariant audit. The whole chain
//! is idempotent: running it on its own output changes nothing.

use crate::sections::{self, infer_section};
use formlift_core::slug::slugify;
use formlift_core::{Field, FieldOption, FieldType};
use log::{debug, warn};
use std::collections::{HashMap, HashSet};

/// Logical value families whose duplicates across scopes collapse to one
/// field: (family name, title-slug fragments identifying membership).
const DUPLICATE_FAMILIES: &[(&str, &[&str])] = &[
    ("date_of_birth", &["date_of_birth", "birth_date", "birthdate", "dob"]),
    ("ssn", &["ssn", "social_security"]),
    ("phone", &["phone", "phone_number"]),
    ("address", &["address", "street_address"]),
];

/// Condition names recognized for grid consolidation, by slug.
const CONDITION_SLUGS: &[&str] = &[
    "diabetes", "asthma", "cancer", "arthritis", "anemia", "aids", "hiv", "hepatitis",
    "epilepsy", "glaucoma", "stroke", "ulcers", "tuberculosis", "emphysema", "jaundice",
    "hay_fever", "convulsions", "heart_murmur", "high_blood_pressure", "low_blood_pressure",
    "angina", "irregular_heartbeat", "rheumatic_fever", "sinus_trouble", "thyroid_problems",
    "kidney_disease", "liver_disease", "venereal_disease", "cold_sores", "fainting",
];

/// Minimum number of per-condition fields before they are consolidated.
const CONDITION_GRID_MIN: usize = 5;

/// Run every pass in order.
#[must_use]
pub fn postprocess(fields: Vec<Field>) -> Vec<Field> {
    let fields = consolidate_duplicate_keys(fields);
    let fields = consolidate_condition_grids(fields);
    let fields = infer_missing_sections(fields);
    let fields = dedup_titles(fields);
    let fields = normalize_signatures(fields);
    audit(fields)
}

/// (1) Merge fields that capture the same logical value in several scopes,
/// keeping the instance in the most specific non-generic section.
fn consolidate_duplicate_keys(fields: Vec<Field>) -> Vec<Field> {
    // Group indices by (family, exact title slug).
    let mut groups: HashMap<(usize, String), Vec<usize>> = HashMap::new();
    for (idx, field) in fields.iter().enumerate() {
        let title_slug = slugify(&field.title);
        for (family_idx, (_, fragments)) in DUPLICATE_FAMILIES.iter().enumerate() {
            if fragments.iter().any(|f| title_slug.contains(f) || title_slug == *f) {
                groups
                    .entry((family_idx, title_slug.clone()))
                    .or_default()
                    .push(idx);
                break;
            }
        }
    }

    let mut dropped: HashMap<usize, usize> = HashMap::new(); // dropped idx -> kept idx
    for indices in groups.values() {
        if indices.len() < 2 {
            continue;
        }
        // Keep the first instance in a non-generic section, else the first.
        let kept = indices
            .iter()
            .copied()
            .find(|i| !fields[*i].section.is_empty())
            .unwrap_or(indices[0]);
        for &idx in indices {
            // Two non-generic sections both keep their copy: a phone number
            // in Patient Information and one in Emergency Contact are
            // different values.
            if idx != kept && (fields[idx].section.is_empty() || fields[idx].section == fields[kept].section)
            {
                dropped.insert(idx, kept);
            }
        }
    }

    if dropped.is_empty() {
        return fields;
    }

    let remap: HashMap<String, String> = dropped
        .iter()
        .map(|(d, k)| (fields[*d].key.clone(), fields[*k].key.clone()))
        .collect();

    let mut out: Vec<Field> = Vec::with_capacity(fields.len());
    for (idx, mut field) in fields.into_iter().enumerate() {
        if dropped.contains_key(&idx) {
            debug!("consolidating duplicate field '{}'", field.key);
            continue;
        }
        for cond in &mut field.conditional_on {
            if let Some(kept_key) = remap.get(&cond.parent_key) {
                cond.parent_key = kept_key.clone();
            }
        }
        out.push(field);
    }
    out
}

/// (2) Merge many small per-condition fields in one section into a single
/// multi-select grid.
fn consolidate_condition_grids(fields: Vec<Field>) -> Vec<Field> {
    let parent_keys: HashSet<String> = fields
        .iter()
        .flat_map(|f| f.conditional_on.iter().map(|c| c.parent_key.clone()))
        .collect();

    // Candidate indices per section, in order.
    let mut by_section: HashMap<String, Vec<usize>> = HashMap::new();
    for (idx, field) in fields.iter().enumerate() {
        if is_condition_candidate(field) && !parent_keys.contains(&field.key) {
            by_section.entry(field.section.clone()).or_default().push(idx);
        }
    }

    let mut merged: HashSet<usize> = HashSet::new();
    let mut replacements: HashMap<usize, Field> = HashMap::new(); // first idx -> merged field
    for (section, indices) in by_section {
        if indices.len() < CONDITION_GRID_MIN {
            continue;
        }
        let options: Vec<FieldOption> = indices
            .iter()
            .map(|&i| {
                let source = &fields[i];
                let mut option = FieldOption::new(source.title.clone());
                // Carry a state only when the source recorded one; an
                // unknown state stays unknown.
                if source.options.iter().any(|o| o.checked.is_some()) {
                    option.checked = Some(
                        source
                            .options
                            .iter()
                            .any(|o| o.checked == Some(true) && o.value != "no"),
                    );
                }
                option
            })
            .collect();

        let title = match section.as_str() {
            sections::DENTAL => "Dental Conditions",
            sections::MEDICAL => "Medical Conditions",
            _ => "Conditions",
        };
        let grid = Field::checkbox_group(section, title, options);
        replacements.insert(indices[0], grid);
        merged.extend(indices);
    }

    if merged.is_empty() {
        return fields;
    }

    let mut out = Vec::with_capacity(fields.len());
    for (idx, field) in fields.into_iter().enumerate() {
        if let Some(grid) = replacements.remove(&idx) {
            out.push(grid);
        } else if !merged.contains(&idx) {
            out.push(field);
        }
    }
    out
}

fn is_condition_candidate(field: &Field) -> bool {
    if !matches!(field.field_type, FieldType::Radio | FieldType::CheckboxGroup) {
        return false;
    }
    if field.options.len() > 3 || !field.conditional_on.is_empty() {
        return false;
    }
    let title_slug = slugify(&field.title);
    if CONDITION_SLUGS.contains(&title_slug.as_str()) {
        return true;
    }
    // In a medical/dental section, short capitalized titles count too.
    matches!(field.section.as_str(), sections::MEDICAL | sections::DENTAL)
        && field.title.split_whitespace().count() <= 3
        && field
            .title
            .chars()
            .next()
            .is_some_and(char::is_uppercase)
        && !field.title.ends_with('?')
}

/// (3) Assign a section to fields the state machine left in the default
/// one, using the two-tier keyword scheme.
fn infer_missing_sections(fields: Vec<Field>) -> Vec<Field> {
    fields
        .into_iter()
        .map(|mut field| {
            if field.section.is_empty() {
                let mut text = field.title.clone();
                for opt in &field.options {
                    text.push(' ');
                    text.push_str(&opt.name);
                }
                if let Some(section) = infer_section(&text) {
                    field.section = section.to_string();
                }
            }
            field
        })
        .collect()
}

/// (4) Disambiguate fields sharing a (section, title) pair.
fn dedup_titles(fields: Vec<Field>) -> Vec<Field> {
    let mut seen: HashMap<(String, String), usize> = HashMap::new();
    let titles: Vec<String> = fields.iter().map(|f| f.title.clone()).collect();
    let keys: Vec<String> = fields.iter().map(|f| f.key.clone()).collect();

    fields
        .into_iter()
        .enumerate()
        .map(|(idx, mut field)| {
            let group = (field.section.clone(), slugify(&field.title));
            let count = seen.entry(group).or_insert(0);
            *count += 1;
            if *count > 1 {
                field.title = disambiguated_title(&field, *count, &titles, &keys, idx);
                // Keys follow titles, so uniqueness is restored here too.
                field.key = formlift_core::slug::field_key(&field.section, &field.title);
            }
            field
        })
        .collect()
}

fn disambiguated_title(
    field: &Field,
    ordinal: usize,
    titles: &[String],
    keys: &[String],
    idx: usize,
) -> String {
    // (a) Lead with the parent question's opening words when this is a
    // conditional follow-up.
    if let Some(cond) = field.conditional_on.first() {
        if let Some(parent_idx) = keys.iter().position(|k| k == &cond.parent_key) {
            let lead: String = titles[parent_idx]
                .split_whitespace()
                .take(4)
                .collect::<Vec<_>>()
                .join(" ");
            if !lead.is_empty() && idx != parent_idx {
                return format!("{} ({})", field.title, lead);
            }
        }
    }
    // (b) A numeric scope suffix already present in the key.
    if let Some(suffix) = field.key.rsplit('_').next() {
        if suffix.chars().all(|c| c.is_ascii_digit()) && !suffix.is_empty() {
            return format!("{} {}", field.title, suffix);
        }
    }
    // (c) Generic ordinal.
    format!("{} ({})", field.title, ordinal)
}

/// (5) Coerce signature blocks to the canonical signature shape.
fn normalize_signatures(fields: Vec<Field>) -> Vec<Field> {
    fields
        .into_iter()
        .map(|mut field| {
            let slug = slugify(&field.title);
            let is_signature = slug.contains("signature") || slug.starts_with("sign_here");
            let is_date = slug.contains("date");
            if is_signature && !is_date {
                field.field_type = FieldType::Signature;
                field.options.clear();
                field.control_schema = Some(serde_json::json!({ "control": "signature" }));
            }
            field
        })
        .collect()
}

/// (6) Fail-soft invariant audit: duplicate keys or malformed fields are
/// logic defects; report and retain.
fn audit(fields: Vec<Field>) -> Vec<Field> {
    let mut seen_keys: HashSet<&str> = HashSet::new();
    for field in &fields {
        if !seen_keys.insert(field.key.as_str()) {
            warn!("duplicate field key in output: '{}'", field.key);
        }
        if let Some(violation) = field.validate() {
            warn!("invariant violation: {violation}");
        }
    }
    fields
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sections::{MEDICAL, PATIENT_INFO};

    fn condition(section: &str, name: &str) -> Field {
        Field::yes_no(section, name)
    }

    #[test]
    fn test_duplicate_dob_consolidated_into_specific_section() {
        let fields = vec![
            Field::new("", "Date of Birth", FieldType::Date),
            Field::new(PATIENT_INFO, "Date of Birth", FieldType::Date),
        ];
        let out = consolidate_duplicate_keys(fields);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].section, PATIENT_INFO);
    }

    #[test]
    fn test_phone_in_distinct_sections_kept() {
        let fields = vec![
            Field::new(PATIENT_INFO, "Phone", FieldType::Input),
            Field::new("Emergency Contact", "Phone", FieldType::Input),
        ];
        let out = consolidate_duplicate_keys(fields);
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn test_conditionals_remapped_after_consolidation() {
        let kept = Field::new(PATIENT_INFO, "Phone", FieldType::Input);
        let dropped = Field::new("", "Phone", FieldType::Input);
        let dependent =
            Field::input(PATIENT_INFO, "Best time to call").conditional_on(dropped.key.clone(), "yes");
        let out = consolidate_duplicate_keys(vec![dropped, kept.clone(), dependent]);
        assert_eq!(out.len(), 2);
        assert_eq!(out[1].conditional_on[0].parent_key, kept.key);
    }

    #[test]
    fn test_condition_grid_consolidation() {
        let fields = vec![
            condition(MEDICAL, "Diabetes"),
            condition(MEDICAL, "Asthma"),
            condition(MEDICAL, "Cancer"),
            condition(MEDICAL, "Arthritis"),
            condition(MEDICAL, "Hay Fever"),
            Field::input(MEDICAL, "Name of physician"),
        ];
        let out = consolidate_condition_grids(fields);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].field_type, FieldType::CheckboxGroup);
        assert_eq!(out[0].title, "Medical Conditions");
        assert_eq!(out[0].options.len(), 5);
        assert_eq!(out[1].title, "Name of physician");
    }

    #[test]
    fn test_condition_grid_checked_states() {
        let mut ticked = condition(MEDICAL, "Diabetes");
        ticked.options[0].checked = Some(true);
        ticked.options[1].checked = Some(false);
        let fields = vec![
            ticked,
            condition(MEDICAL, "Asthma"),
            condition(MEDICAL, "Cancer"),
            condition(MEDICAL, "Arthritis"),
            condition(MEDICAL, "Hay Fever"),
        ];
        let out = consolidate_condition_grids(fields);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].options[0].checked, Some(true));
        // Sources that never recorded a state stay unknown.
        assert_eq!(out[0].options[1].checked, None);
    }

    #[test]
    fn test_condition_grid_below_threshold_untouched() {
        let fields = vec![
            condition(MEDICAL, "Diabetes"),
            condition(MEDICAL, "Asthma"),
        ];
        let out = consolidate_condition_grids(fields.clone());
        assert_eq!(out, fields);
    }

    #[test]
    fn test_section_inference_strong_keyword() {
        let fields = vec![Field::input("", "Name of physician")];
        let out = infer_missing_sections(fields);
        assert_eq!(out[0].section, MEDICAL);
    }

    #[test]
    fn test_title_dedup_ordinal() {
        let fields = vec![
            Field::input(PATIENT_INFO, "Employer"),
            Field::input(PATIENT_INFO, "Employer"),
        ];
        let out = dedup_titles(fields);
        assert_eq!(out[0].title, "Employer");
        assert_eq!(out[1].title, "Employer (2)");
    }

    #[test]
    fn test_signature_normalized() {
        let fields = vec![
            Field::input("Consent", "Patient Signature"),
            Field::new("Consent", "Signature Date", FieldType::Date),
        ];
        let out = normalize_signatures(fields);
        assert_eq!(out[0].field_type, FieldType::Signature);
        assert_eq!(out[1].field_type, FieldType::Date);
    }

    #[test]
    fn test_chain_idempotent() {
        let fields = vec![
            Field::new("", "Date of Birth", FieldType::Date),
            Field::new(PATIENT_INFO, "Date of Birth", FieldType::Date),
            condition(MEDICAL, "Diabetes"),
            condition(MEDICAL, "Asthma"),
            condition(MEDICAL, "Cancer"),
            condition(MEDICAL, "Arthritis"),
            condition(MEDICAL, "Hay Fever"),
            Field::input("", "Name of physician"),
            Field::input(PATIENT_INFO, "Employer"),
            Field::input(PATIENT_INFO, "Employer"),
            Field::input("Consent", "Patient Signature"),
        ];
        let once = postprocess(fields);
        let twice = postprocess(once.clone());
        assert_eq!(once, twice);
    }
}
