//! # formlift-core
//!
//! Shared data model for formlift-rs: the [`Field`] record emitted by the
//! extraction engine, deterministic [`slug`] derivation for keys and option
//! values, error types, and run statistics.
//!
//! The extraction pipeline lives in `formlift-extract`; the template catalog
//! and matcher live in `formlift-templates`. This crate only defines the
//! types they exchange.
//!
//! ## Quick Start
//!
//! ```
//! use formlift_core::{Field, FieldOption, FieldType};
//!
//! let field = Field::checkbox_group(
//!     "Medical History",
//!     "Have you ever had any of the following?",
//!     vec![FieldOption::new("Diabetes"), FieldOption::new("Asthma")],
//! );
//!
//! assert_eq!(field.field_type, FieldType::CheckboxGroup);
//! assert_eq!(field.key, "medical_history.have_you_ever_had_any_of_the_following");
//! assert_eq!(field.options[0].value, "diabetes");
//! ```

pub mod error;
pub mod field;
pub mod slug;
pub mod stats;

pub use error::{FormliftError, Result};
pub use field::{dedup_options, Conditional, Field, FieldOption, FieldType};
pub use stats::RunStats;
