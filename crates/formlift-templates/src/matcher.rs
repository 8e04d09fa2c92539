//! Field-to-template matching.
//!
//! Strategy order, first success wins: exact key, exact title, alias
//! table, fuzzy similarity. Fuzzy thresholds are data-driven — a table
//! keyed by section domain rather than inline conditionals — and scores
//! are boosted slightly for each domain keyword the field and template
//! share. A near-miss just below threshold is logged for catalog
//! maintenance but never applied.

use crate::catalog::{normalize, Template, TemplateCatalog};
use formlift_core::{Field, RunStats};
use log::{debug, info};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use strsim::normalized_levenshtein;

/// How a match was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchReason {
    Exact,
    Alias,
    Fuzzy,
    /// Best fuzzy score fell just below threshold; reported, not applied.
    Near,
    None,
}

/// The outcome of matching one field. Ephemeral.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchResult {
    pub template_key: Option<String>,
    pub score: f64,
    pub reason: MatchReason,
}

impl MatchResult {
    fn none() -> Self {
        Self {
            template_key: None,
            score: 0.0,
            reason: MatchReason::None,
        }
    }
}

/// Domain keywords that boost a fuzzy score when shared between field and
/// template titles.
const DOMAIN_KEYWORDS: &[&str] = &[
    "birth", "date", "name", "phone", "address", "city", "state", "zip", "ssn", "social",
    "email", "employer", "occupation", "insurance", "policy", "group", "emergency", "signature",
    "medical", "dental", "physician", "allergies", "medications",
];

/// Per-domain fuzzy thresholds, loadable from configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MatchThresholds {
    /// Accept threshold when no domain override applies.
    pub default: f64,
    /// Overrides keyed by domain. A field's section selects a domain when
    /// its lowercased name contains the key (underscores read as spaces),
    /// so adding an entry is all a caller needs to do.
    pub per_domain: BTreeMap<String, f64>,
    /// Width of the near-miss band below the accept threshold.
    pub near_band: f64,
    /// Boost per shared domain keyword.
    pub keyword_boost: f64,
}

impl Default for MatchThresholds {
    fn default() -> Self {
        let mut per_domain = BTreeMap::new();
        // Medical, dental, and patient-info titles vary the most across
        // forms; a lower bar recovers more of them.
        per_domain.insert("medical".to_string(), 0.65);
        per_domain.insert("dental".to_string(), 0.65);
        per_domain.insert("patient_info".to_string(), 0.65);
        Self {
            default: 0.72,
            per_domain,
            near_band: 0.08,
            keyword_boost: 0.05,
        }
    }
}

impl MatchThresholds {
    fn for_section(&self, section: &str) -> f64 {
        let section = section.to_lowercase();
        for (domain, threshold) in &self.per_domain {
            let needle = domain.to_lowercase().replace('_', " ");
            if section.contains(&needle) {
                return *threshold;
            }
        }
        self.default
    }
}

/// Matches extracted fields against a read-only [`TemplateCatalog`].
#[derive(Debug)]
pub struct Matcher<'a> {
    catalog: &'a TemplateCatalog,
    thresholds: MatchThresholds,
}

impl<'a> Matcher<'a> {
    #[must_use]
    pub fn new(catalog: &'a TemplateCatalog) -> Self {
        Self {
            catalog,
            thresholds: MatchThresholds::default(),
        }
    }

    #[must_use]
    pub fn with_thresholds(catalog: &'a TemplateCatalog, thresholds: MatchThresholds) -> Self {
        Self { catalog, thresholds }
    }

    /// Match one field without applying anything.
    #[must_use]
    pub fn match_field(&self, field: &Field) -> MatchResult {
        let key_norm = normalize(&field.key);
        let title_norm = normalize(&field.title);

        if let Some(idx) = self
            .catalog
            .lookup_key(&key_norm)
            .or_else(|| self.catalog.lookup_title(&title_norm))
        {
            return MatchResult {
                template_key: Some(self.catalog.get(idx).key.clone()),
                score: 1.0,
                reason: MatchReason::Exact,
            };
        }

        if let Some(idx) = self.catalog.lookup_alias(&title_norm) {
            return MatchResult {
                template_key: Some(self.catalog.get(idx).key.clone()),
                score: 1.0,
                reason: MatchReason::Alias,
            };
        }

        self.fuzzy_match(field, &title_norm)
    }

    fn fuzzy_match(&self, field: &Field, title_norm: &str) -> MatchResult {
        if title_norm.is_empty() || self.catalog.is_empty() {
            return MatchResult::none();
        }

        let threshold = self.thresholds.for_section(&field.section);
        let mut best: Option<(usize, f64)> = None;
        for (idx, template) in self.catalog.iter().enumerate() {
            let score = self.score(title_norm, template);
            if best.map_or(true, |(_, top)| score > top) {
                best = Some((idx, score));
            }
        }

        let Some((idx, score)) = best else {
            return MatchResult::none();
        };
        let template = self.catalog.get(idx);

        if score >= threshold {
            MatchResult {
                template_key: Some(template.key.clone()),
                score,
                reason: MatchReason::Fuzzy,
            }
        } else if score >= threshold - self.thresholds.near_band {
            debug!(
                "near miss: field '{}' vs template '{}' scored {score:.3} (threshold {threshold:.2})",
                field.title, template.title
            );
            MatchResult {
                template_key: Some(template.key.clone()),
                score,
                reason: MatchReason::Near,
            }
        } else {
            MatchResult::none()
        }
    }

    /// Similarity between a normalized field title and a template: plain
    /// edit distance or token-reordered edit distance, whichever is higher,
    /// plus the shared-keyword boost.
    fn score(&self, title_norm: &str, template: &Template) -> f64 {
        let template_norm = normalize(&template.title);
        let direct = normalized_levenshtein(title_norm, &template_norm);
        let reordered =
            normalized_levenshtein(&sorted_tokens(title_norm), &sorted_tokens(&template_norm));
        let base = direct.max(reordered);

        let field_words: HashSet<&str> = title_norm.split(' ').collect();
        let template_words: HashSet<&str> = template_norm.split(' ').collect();
        let shared = DOMAIN_KEYWORDS
            .iter()
            .filter(|kw| field_words.contains(**kw) && template_words.contains(**kw))
            .count();

        (base + self.thresholds.keyword_boost * shared as f64).min(1.0)
    }

    /// Match every field, merging successes with their template's canonical
    /// key, type, and control schema. The field's own options and
    /// conditional links are always preserved; unmatched fields pass
    /// through unchanged.
    #[must_use]
    pub fn apply(&self, fields: Vec<Field>, stats: &mut RunStats) -> Vec<Field> {
        let mut used_keys: HashSet<String> = fields.iter().map(|f| f.key.clone()).collect();
        let mut remap: HashMap<String, String> = HashMap::new();

        let mut out: Vec<Field> = Vec::with_capacity(fields.len());
        for field in fields {
            stats.fields_emitted += 1;
            let result = self.match_field(&field);
            match result.reason {
                MatchReason::Exact | MatchReason::Alias | MatchReason::Fuzzy => {
                    let template_key = result.template_key.unwrap_or_default();
                    let Some(idx) = self.catalog.lookup_key(&normalize(&template_key)) else {
                        out.push(field);
                        continue;
                    };
                    let template = self.catalog.get(idx);

                    // One template never claims two fields of the same
                    // document; the later field passes through unchanged.
                    if field.key != template.key && !used_keys.insert(template.key.clone()) {
                        debug!(
                            "template '{}' already used in this document; leaving '{}' unmatched",
                            template.key, field.key
                        );
                        stats.unmatched += 1;
                        out.push(field);
                        continue;
                    }

                    stats.record_match(&template.key);
                    out.push(merge(field, template, &mut remap));
                }
                MatchReason::Near => {
                    stats.near_misses += 1;
                    stats.unmatched += 1;
                    out.push(field);
                }
                MatchReason::None => {
                    debug!("no template for field '{}'", field.key);
                    stats.unmatched += 1;
                    out.push(field);
                }
            }
        }

        // Conditional links follow their parents onto canonical keys.
        for field in &mut out {
            for cond in &mut field.conditional_on {
                if let Some(new_key) = remap.get(&cond.parent_key) {
                    cond.parent_key = new_key.clone();
                }
            }
        }

        info!(
            "matched {} of {} fields ({:.0}% reuse)",
            stats.fields_matched,
            stats.fields_emitted,
            stats.reuse_percentage()
        );
        out
    }
}

/// Produce the merged field: canonical key, type, and control schema from
/// the template; options, conditionals, section, and title from the field.
fn merge(mut field: Field, template: &Template, remap: &mut HashMap<String, String>) -> Field {
    if field.key != template.key {
        remap.insert(field.key.clone(), template.key.clone());
        field.key = template.key.clone();
    }
    field.field_type = template.field_type;
    if template.control_schema.is_some() {
        field.control_schema = template.control_schema.clone();
    }
    field
}

fn sorted_tokens(text: &str) -> String {
    let mut tokens: Vec<&str> = text.split(' ').filter(|t| !t.is_empty()).collect();
    tokens.sort_unstable();
    tokens.join(" ")
}
