//! The field record data model.
//!
//! A [`Field`] is the unit of output of the extraction engine: one logical
//! question, blank, option grid, or consent block recovered from document
//! text. Fields are created by the extraction state machine, refined by the
//! post-processor chain, and optionally merged with catalog templates by the
//! matcher. The `type` is a closed enum with a fixed shape per variant;
//! constructors validate the per-variant invariants (non-empty title,
//! non-empty options for option-bearing types).

use crate::slug::{field_key, slugify};
use serde::{Deserialize, Serialize};

/// The closed set of field types the engine can emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    /// Free-text entry (fill-in-the-blank)
    Input,
    /// Date entry
    Date,
    /// Single choice among options (Yes/No questions)
    Radio,
    /// Multi-select grid of checkboxes
    CheckboxGroup,
    /// Single choice rendered as a dropdown
    Dropdown,
    /// Consent / terms paragraph block
    Terms,
    /// Signature capture block
    Signature,
}

impl FieldType {
    /// Whether this type requires a non-empty option list.
    #[must_use]
    pub fn bears_options(self) -> bool {
        matches!(self, Self::Radio | Self::CheckboxGroup | Self::Dropdown)
    }
}

/// One selectable option inside a radio/checkbox/dropdown field.
///
/// `value` is always the deterministic slug of `name`; [`FieldOption::new`]
/// is the only way options are built, so the pair never drifts apart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldOption {
    pub name: String,
    pub value: String,
    /// Marked state recovered from the source document, if legible.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checked: Option<bool>,
}

impl FieldOption {
    /// Create an option, deriving `value` from `name`.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let value = slugify(&name);
        Self {
            name,
            value,
            checked: None,
        }
    }

    /// Create an option with a known checked state.
    #[must_use]
    pub fn with_checked(name: impl Into<String>, checked: bool) -> Self {
        let mut opt = Self::new(name);
        opt.checked = Some(checked);
        opt
    }
}

/// A dependency on a prior field's selected value.
///
/// A field carrying `Conditional { parent_key: "q", value: "yes" }` is only
/// presented when the field with key `q` was answered "yes".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conditional {
    pub parent_key: String,
    pub value: String,
}

/// One extracted field record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    /// Unique key within one document's output.
    pub key: String,
    /// Human-readable label. Never empty.
    pub title: String,
    /// Logical section of the form ("Medical History", ...). Empty means
    /// the section could not be determined.
    #[serde(default)]
    pub section: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<FieldOption>,
    /// Dependencies on prior fields, if any.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditional_on: Vec<Conditional>,
    /// Whether the form marks this entry as optional.
    #[serde(default)]
    pub optional: bool,
    /// Canonical control description attached by the template matcher.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub control_schema: Option<serde_json::Value>,
}

impl Field {
    /// Create a field with a key derived from `section` and `title`.
    ///
    /// An empty `title` is replaced with `"Untitled"` so the non-empty-title
    /// invariant holds at construction rather than being audited later.
    #[must_use]
    pub fn new(section: impl Into<String>, title: impl Into<String>, field_type: FieldType) -> Self {
        let section = section.into();
        let mut title = title.into().trim().to_string();
        if title.is_empty() {
            title = "Untitled".to_string();
        }
        let key = field_key(&section, &title);
        Self {
            key,
            title,
            section,
            field_type,
            options: Vec::new(),
            conditional_on: Vec::new(),
            optional: false,
            control_schema: None,
        }
    }

    /// Create a free-text input field.
    #[must_use]
    pub fn input(section: impl Into<String>, title: impl Into<String>) -> Self {
        Self::new(section, title, FieldType::Input)
    }

    /// Create a terms/consent paragraph field.
    #[must_use]
    pub fn terms(section: impl Into<String>, title: impl Into<String>, text: &str) -> Self {
        let mut field = Self::new(section, title, FieldType::Terms);
        field.control_schema = Some(serde_json::json!({ "text": text }));
        field
    }

    /// Create a Yes/No radio field.
    #[must_use]
    pub fn yes_no(section: impl Into<String>, title: impl Into<String>) -> Self {
        let mut field = Self::new(section, title, FieldType::Radio);
        field.options = vec![FieldOption::new("Yes"), FieldOption::new("No")];
        field
    }

    /// Create a checkbox group from already-assembled options.
    ///
    /// Duplicate option values are dropped first-wins, preserving order.
    #[must_use]
    pub fn checkbox_group(
        section: impl Into<String>,
        title: impl Into<String>,
        options: Vec<FieldOption>,
    ) -> Self {
        let mut field = Self::new(section, title, FieldType::CheckboxGroup);
        field.options = dedup_options(options);
        field
    }

    /// Attach a conditional dependency, builder-style.
    #[must_use]
    pub fn conditional_on(mut self, parent_key: impl Into<String>, value: impl Into<String>) -> Self {
        self.conditional_on.push(Conditional {
            parent_key: parent_key.into(),
            value: value.into(),
        });
        self
    }

    /// Check the per-variant shape invariants.
    ///
    /// Returns a description of the first violation, or `None` when the
    /// field is well-formed. Violations are reported, never fatal.
    #[must_use]
    pub fn validate(&self) -> Option<String> {
        if self.title.trim().is_empty() {
            return Some(format!("field '{}' has an empty title", self.key));
        }
        if self.field_type.bears_options() && self.options.is_empty() {
            return Some(format!(
                "field '{}' is {:?} but has no options",
                self.key, self.field_type
            ));
        }
        for opt in &self.options {
            if opt.value != slugify(&opt.name) {
                return Some(format!(
                    "option '{}' in field '{}' has a stale value slug",
                    opt.name, self.key
                ));
            }
        }
        None
    }
}

/// First-wins option de-duplication by value slug, order-preserving.
#[must_use]
pub fn dedup_options(options: Vec<FieldOption>) -> Vec<FieldOption> {
    let mut seen = std::collections::HashSet::new();
    options
        .into_iter()
        .filter(|opt| seen.insert(opt.value.clone()))
        .collect()
}
