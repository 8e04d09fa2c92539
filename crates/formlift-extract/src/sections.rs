//! Section vocabularies and keyword scoring.
//!
//! Two consumers: the state machine scores heading text to track the
//! current section, and the post-processor infers a section for fields the
//! state machine left in the default (empty) section. Inference is
//! two-tier: one strong domain keyword is enough, weak keywords need two
//! hits.

/// Canonical section names.
pub const MEDICAL: &str = "Medical History";
pub const DENTAL: &str = "Dental History";
pub const INSURANCE: &str = "Insurance";
pub const PATIENT_INFO: &str = "Patient Information";
pub const EMERGENCY: &str = "Emergency Contact";
pub const CONSENT: &str = "Consent";

/// Heading vocabulary: (section, keywords). Scored by hit count; ties and
/// zero scores leave the current section unchanged.
const HEADING_VOCAB: &[(&str, &[&str])] = &[
    (MEDICAL, &["medical", "health", "physician", "conditions", "illness"]),
    (DENTAL, &["dental", "dentist", "oral", "teeth", "gums"]),
    (INSURANCE, &["insurance", "policy", "carrier", "coverage", "benefits", "subscriber"]),
    (PATIENT_INFO, &["patient", "personal", "registration", "demographics", "about you"]),
    (EMERGENCY, &["emergency"]),
    (CONSENT, &["consent", "authorization", "agreement", "acknowledgment", "release", "terms", "office policy"]),
];

/// Strong inference keywords: a single hit assigns the section.
const STRONG_VOCAB: &[(&str, &[&str])] = &[
    (MEDICAL, &["physician", "hospitalized", "surgery", "medication", "allerg", "pregnan", "illness", "diagnos"]),
    (DENTAL, &["dentist", "tooth", "teeth", "gums", "orthodontic", "floss"]),
    (INSURANCE, &["insurance", "insured", "policy number", "group number", "carrier", "subscriber"]),
    (EMERGENCY, &["emergency contact", "in case of emergency"]),
    (CONSENT, &["i authorize", "i consent", "i acknowledge", "i understand"]),
];

/// Weak inference keywords: require at least two hits.
const WEAK_VOCAB: &[(&str, &[&str])] = &[
    (MEDICAL, &["doctor", "condition", "treatment", "health"]),
    (DENTAL, &["cleaning", "cavity", "crown", "extraction"]),
    (PATIENT_INFO, &["name", "birth", "phone", "address", "employer", "occupation", "marital"]),
    (INSURANCE, &["group", "plan", "coverage", "benefits"]),
];

/// Score heading text against the section vocabularies.
///
/// Returns the winning section, or `None` on a tie or when nothing matched.
#[must_use]
pub fn score_heading(text: &str) -> Option<&'static str> {
    let lower = text.to_lowercase();
    let mut best: Option<(&'static str, usize)> = None;
    let mut tied = false;
    for (section, keywords) in HEADING_VOCAB {
        let score = keywords.iter().filter(|kw| lower.contains(*kw)).count();
        if score == 0 {
            continue;
        }
        match best {
            Some((_, top)) if score == top => tied = true,
            Some((_, top)) if score > top => {
                best = Some((section, score));
                tied = false;
            }
            None => best = Some((section, score)),
            _ => {}
        }
    }
    match (best, tied) {
        (Some((section, _)), false) => Some(section),
        _ => None,
    }
}

/// Infer a section from a field's own text (title plus option names).
#[must_use]
pub fn infer_section(text: &str) -> Option<&'static str> {
    let lower = text.to_lowercase();
    for (section, keywords) in STRONG_VOCAB {
        if keywords.iter().any(|kw| lower.contains(*kw)) {
            return Some(section);
        }
    }
    for (section, keywords) in WEAK_VOCAB {
        let hits = keywords.iter().filter(|kw| lower.contains(*kw)).count();
        if hits >= 2 {
            return Some(section);
        }
    }
    None
}
