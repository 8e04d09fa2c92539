//! # formlift-extract
//!
//! Field extraction and checkbox-grid resolution for formlift-rs.
//!
//! Takes the layout-preserving text of one scanned or digital form and
//! recovers an ordered list of structured [`Field`] records: titles, types,
//! option lists, sections, and conditional follow-up links. The hard part
//! is re-discovering tabular structure from linearized text — multi-column
//! checkbox grids, orphaned checkbox labels, category headers interleaved
//! with data rows — using only character-position heuristics, without
//! fabricating structure that is not there.
//!
//! Pipeline: [`preprocess`](preprocess::preprocess) →
//! [`classify`](classify::classify_lines) → the extraction state machine →
//! the [`postprocess`](postprocess::postprocess) chain. Template matching
//! against a canonical catalog lives in `formlift-templates`.
//!
//! ## Quick Start
//!
//! ```
//! use formlift_extract::extract_fields;
//!
//! let text = "\
//! MEDICAL HISTORY
//! Are you under a physician's care? [ ] Yes [ ] No If yes, please explain
//! Have you ever had any of the following?
//! [ ] Diabetes   [ ] Asthma   [ ] Cancer
//! [ ] Arthritis  [ ] Emphysema [ ] AIDS";
//!
//! let fields = extract_fields(text)?;
//! assert_eq!(fields.len(), 3); // radio + conditional input + checkbox grid
//! assert_eq!(fields[2].options.len(), 6);
//! # Ok::<(), formlift_core::FormliftError>(())
//! ```
//!
//! Processing is single-threaded and synchronous per document, with no
//! shared mutable state between documents; a driver may parallelize at the
//! file level.

pub mod classify;
pub mod extract;
pub mod grid;
pub mod line;
pub mod postprocess;
pub mod preprocess;
pub mod sections;

use formlift_core::{Field, Result};

/// Extract structured fields from one document's text.
///
/// # Errors
///
/// Returns [`formlift_core::FormliftError::MalformedInput`] for degenerate
/// text (empty or letterless documents); callers processing a batch should
/// skip the document and continue.
pub fn extract_fields(text: &str) -> Result<Vec<Field>> {
    extract_fields_with(text, &preprocess::OcrCorrections::default())
}

/// [`extract_fields`] with a caller-supplied OCR correction table.
///
/// # Errors
///
/// Same conditions as [`extract_fields`].
pub fn extract_fields_with(
    text: &str,
    corrections: &preprocess::OcrCorrections,
) -> Result<Vec<Field>> {
    let lines = preprocess::preprocess_with(text, corrections)?;
    let kinds = classify::classify_lines(&lines);
    let fields = extract::run_state_machine(&lines, &kinds);
    Ok(postprocess::postprocess(fields))
}
