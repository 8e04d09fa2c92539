//! # formlift-templates
//!
//! The canonical field template catalog and the matcher that merges
//! extracted fields with it.
//!
//! Forms repeat themselves: every intake form asks for a birth date, a
//! phone number, a signature. The [`TemplateCatalog`] holds one canonical
//! definition per such field; the [`Matcher`] reconciles the noisy titles
//! the extraction engine recovers against it — exact key, exact title,
//! alias table, then fuzzy similarity with per-domain thresholds — so
//! downstream consumers see stable keys and control schemas across
//! documents.
//!
//! ## Quick Start
//!
//! ```
//! use formlift_core::{Field, FieldType, RunStats};
//! use formlift_templates::{Matcher, TemplateCatalog};
//!
//! let catalog = TemplateCatalog::from_json_str(r#"{
//!     "templates": [
//!         { "key": "date_of_birth", "title": "Birth Date", "type": "date" }
//!     ]
//! }"#)?;
//!
//! let fields = vec![Field::new("Patient Information", "Date of Birth", FieldType::Input)];
//! let mut stats = RunStats::new();
//! let merged = Matcher::new(&catalog).apply(fields, &mut stats);
//!
//! assert_eq!(merged[0].key, "date_of_birth");
//! assert_eq!(merged[0].field_type, FieldType::Date);
//! # Ok::<(), formlift_core::FormliftError>(())
//! ```

pub mod catalog;
pub mod matcher;

pub use catalog::{Template, TemplateCatalog};
pub use matcher::{MatchReason, MatchResult, MatchThresholds, Matcher};
