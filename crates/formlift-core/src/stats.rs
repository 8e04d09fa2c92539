//! Run-level statistics.
//!
//! Counters only; nothing here affects extraction output.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Statistics accumulated over one run (one or many documents).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunStats {
    /// Fields emitted by the extraction pipeline.
    pub fields_emitted: usize,
    /// Fields merged with a catalog template (exact, alias, or fuzzy).
    pub fields_matched: usize,
    /// Fuzzy scores that landed just below threshold (catalog maintenance signal).
    pub near_misses: usize,
    /// Fields that matched nothing in the catalog.
    pub unmatched: usize,
    /// How many times each template key was reused across the run.
    #[serde(default)]
    pub template_reuse: HashMap<String, usize>,
}

impl RunStats {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a successful template match.
    pub fn record_match(&mut self, template_key: &str) {
        self.fields_matched += 1;
        *self
            .template_reuse
            .entry(template_key.to_string())
            .or_insert(0) += 1;
    }

    /// Percentage of emitted fields that matched a template, 0.0 when
    /// nothing was emitted.
    #[must_use]
    pub fn reuse_percentage(&self) -> f64 {
        if self.fields_emitted == 0 {
            return 0.0;
        }
        #[allow(clippy::cast_precision_loss)]
        {
            100.0 * self.fields_matched as f64 / self.fields_emitted as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reuse_percentage() {
        let mut stats = RunStats::new();
        assert_eq!(stats.reuse_percentage(), 0.0);
        stats.fields_emitted = 4;
        stats.record_match("date_of_birth");
        stats.record_match("date_of_birth");
        stats.record_match("first_name");
        assert_eq!(stats.fields_matched, 3);
        assert_eq!(stats.template_reuse["date_of_birth"], 2);
        assert!((stats.reuse_percentage() - 75.0).abs() < f64::EPSILON);
    }
}
