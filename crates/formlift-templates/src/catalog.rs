//! The template catalog: canonical field definitions loaded once per run.
//!
//! The catalog is read-only after load and carries no interior mutability,
//! so one instance can be shared across concurrent per-document workers.

use formlift_core::{FieldType, FormliftError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// One canonical field definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Template {
    /// Canonical key, unique within the catalog.
    pub key: String,
    /// Canonical human-readable title.
    pub title: String,
    /// Alternative titles seen in the wild, mapped onto this template.
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    /// Canonical control description merged onto matched fields.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub control_schema: Option<serde_json::Value>,
}

/// On-disk catalog shape: `{ "templates": [ ... ] }`.
#[derive(Debug, Serialize, Deserialize)]
struct CatalogFile {
    templates: Vec<Template>,
}

/// The immutable, pre-loaded set of canonical field definitions.
#[derive(Debug, Clone, Default)]
pub struct TemplateCatalog {
    templates: Vec<Template>,
    by_key: HashMap<String, usize>,
    by_title: HashMap<String, usize>,
    by_alias: HashMap<String, usize>,
}

impl TemplateCatalog {
    /// Build a catalog from template records.
    ///
    /// # Errors
    ///
    /// Returns [`FormliftError::Catalog`] on duplicate keys or empty titles.
    pub fn from_templates(templates: Vec<Template>) -> Result<Self> {
        let mut by_key = HashMap::new();
        let mut by_title = HashMap::new();
        let mut by_alias = HashMap::new();

        for (idx, template) in templates.iter().enumerate() {
            if template.title.trim().is_empty() {
                return Err(FormliftError::Catalog(format!(
                    "template '{}' has an empty title",
                    template.key
                )));
            }
            if by_key.insert(normalize(&template.key), idx).is_some() {
                return Err(FormliftError::Catalog(format!(
                    "duplicate template key '{}'",
                    template.key
                )));
            }
            by_title.insert(normalize(&template.title), idx);
            for alias in &template.aliases {
                // Alias table is many-to-one; a later template never steals
                // an alias already claimed.
                by_alias.entry(normalize(alias)).or_insert(idx);
            }
        }

        Ok(Self {
            templates,
            by_key,
            by_title,
            by_alias,
        })
    }

    /// Parse a catalog from its JSON dictionary representation.
    ///
    /// # Errors
    ///
    /// Returns [`FormliftError::Json`] for malformed JSON and
    /// [`FormliftError::Catalog`] for structurally invalid catalogs.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let file: CatalogFile = serde_json::from_str(json)?;
        Self::from_templates(file.templates)
    }

    /// Load a catalog from a JSON dictionary file.
    ///
    /// # Errors
    ///
    /// Returns [`FormliftError::Io`] when the file cannot be read, plus the
    /// conditions of [`TemplateCatalog::from_json_str`].
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let json = fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.templates.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    /// Iterate the templates in load order.
    pub fn iter(&self) -> impl Iterator<Item = &Template> {
        self.templates.iter()
    }

    pub(crate) fn get(&self, idx: usize) -> &Template {
        &self.templates[idx]
    }

    pub(crate) fn lookup_key(&self, normalized: &str) -> Option<usize> {
        self.by_key.get(normalized).copied()
    }

    pub(crate) fn lookup_title(&self, normalized: &str) -> Option<usize> {
        self.by_title.get(normalized).copied()
    }

    pub(crate) fn lookup_alias(&self, normalized: &str) -> Option<usize> {
        self.by_alias.get(normalized).copied()
    }
}

/// Normalization shared by every lookup: lowercase, alphanumeric words
/// joined by single spaces.
#[must_use]
pub(crate) fn normalize(text: &str) -> String {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vec<Template> {
        vec![
            Template {
                key: "date_of_birth".to_string(),
                title: "Birth Date".to_string(),
                aliases: vec!["DOB".to_string(), "Date of Birth".to_string()],
                field_type: FieldType::Date,
                control_schema: None,
            },
            Template {
                key: "first_name".to_string(),
                title: "First Name".to_string(),
                aliases: vec![],
                field_type: FieldType::Input,
                control_schema: None,
            },
        ]
    }

    #[test]
    fn test_indices_built() {
        let catalog = TemplateCatalog::from_templates(sample()).unwrap();
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.lookup_key("date of birth"), Some(0));
        assert_eq!(catalog.lookup_title("birth date"), Some(0));
        assert_eq!(catalog.lookup_alias("dob"), Some(0));
    }

    #[test]
    fn test_duplicate_key_rejected() {
        let mut templates = sample();
        templates.push(templates[0].clone());
        assert!(matches!(
            TemplateCatalog::from_templates(templates),
            Err(FormliftError::Catalog(_))
        ));
    }

    #[test]
    fn test_json_round_trip() {
        let json = r#"{
            "templates": [
                {
                    "key": "ssn",
                    "title": "Social Security Number",
                    "aliases": ["SSN", "Soc. Sec. #"],
                    "type": "input"
                }
            ]
        }"#;
        let catalog = TemplateCatalog::from_json_str(json).unwrap();
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.lookup_alias("soc sec"), Some(0));
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("Date-of-Birth:"), "date of birth");
        assert_eq!(normalize("  SSN #  "), "ssn");
    }
}
