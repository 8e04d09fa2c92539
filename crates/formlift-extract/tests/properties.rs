//! Property tests: totality of extraction, structural invariants of the
//! output, and idempotence of the post-processor chain.

use formlift_core::slug::slugify;
use formlift_core::Field;
use formlift_extract::extract_fields;
use formlift_extract::grid::options_from_line;
use formlift_extract::line::Line;
use formlift_extract::postprocess::postprocess;
use proptest::prelude::*;
use std::collections::HashSet;

fn field_strategy() -> impl Strategy<Value = Field> {
    let section = prop::sample::select(vec![
        "",
        "Medical History",
        "Patient Information",
        "Consent",
    ]);
    let title = "[A-Z][a-z]{2,10}( [A-Z][a-z]{2,10})?";
    (section, title, any::<bool>()).prop_map(|(section, title, yes_no)| {
        if yes_no {
            Field::yes_no(section, title)
        } else {
            Field::input(section, title)
        }
    })
}

proptest! {
    #[test]
    fn prop_slugify_ascii_and_deterministic(name in ".*") {
        let slug = slugify(&name);
        prop_assert!(!slug.is_empty());
        prop_assert!(slug
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_'));
        prop_assert!(!slug.ends_with('_'));
        prop_assert_eq!(slug, slugify(&name));
    }

    #[test]
    fn prop_extraction_is_total(text in "[ -~\n]{0,400}") {
        // Any printable input either extracts or reports malformed input;
        // it never panics.
        let _ = extract_fields(&text);
    }

    #[test]
    fn prop_output_keys_unique_and_links_resolve(text in "[ -~\n]{0,400}") {
        let Ok(fields) = extract_fields(&text) else { return Ok(()) };
        let keys: HashSet<&str> = fields.iter().map(|f| f.key.as_str()).collect();
        prop_assert_eq!(keys.len(), fields.len());
        for field in &fields {
            prop_assert!(!field.title.trim().is_empty());
            for opt in &field.options {
                prop_assert_eq!(&opt.value, &slugify(&opt.name));
            }
            for cond in &field.conditional_on {
                prop_assert!(
                    keys.contains(cond.parent_key.as_str()),
                    "dangling conditional parent '{}'",
                    cond.parent_key
                );
            }
        }
    }

    #[test]
    fn prop_postprocess_idempotent(fields in prop::collection::vec(field_strategy(), 0..12)) {
        let once = postprocess(fields);
        let twice = postprocess(once.clone());
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn prop_per_line_fallback_never_drops_markers(
        labels in prop::collection::vec("[A-Z][a-z]{2,8}", 1..5)
    ) {
        let raw: String = labels
            .iter()
            .map(|l| format!("[ ] {l:<13}"))
            .collect::<Vec<_>>()
            .join(" ");
        let line = Line::new(0, raw);
        let options = options_from_line(&line);
        prop_assert_eq!(options.len(), labels.len());
        for (opt, label) in options.iter().zip(&labels) {
            prop_assert_eq!(&opt.name, label);
        }
    }

    #[test]
    fn prop_aligned_grid_resolves_every_cell(
        labels in prop::collection::hash_set("[A-Z][a-z]{4,8}", 6..=6),
        cols in 2usize..=3,
    ) {
        let labels: Vec<String> = labels.into_iter().collect();
        let mut lines = vec!["Which of the following apply to you?".to_string()];
        for chunk in labels.chunks(cols) {
            let row: String = chunk
                .iter()
                .map(|l| format!("[ ] {l:<13} "))
                .collect();
            lines.push(row.trim_end().to_string());
        }
        let text = lines.join("\n");

        let fields = extract_fields(&text).unwrap();
        prop_assert_eq!(fields.len(), 1);
        prop_assert_eq!(fields[0].options.len(), labels.len());
        let values: HashSet<&str> = fields[0].options.iter().map(|o| o.value.as_str()).collect();
        prop_assert_eq!(values.len(), labels.len());
    }
}
