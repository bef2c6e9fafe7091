//! Transformation and validation reports.
//!
//! The [`TransformationReport`] is the lineage artifact of a normalization
//! call: it lists every rename, cast, fill and drop in the order they
//! happened, so the evidence packager can explain each output column without
//! access to the raw extract.

use crate::RuleKind;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Kind of transformation recorded in the lineage log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    /// Raw column renamed to its canonical name
    Rename,
    /// Column values converted to the target dtype
    Cast,
    /// Missing values replaced, or an absent optional field materialized
    Fill,
    /// Raw column removed from the output
    Drop,
}

/// One lineage event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// What happened
    pub kind: EventKind,
    /// Canonical field (or raw column, for drops of unknown columns)
    pub field: String,
    /// Human-readable account of the transformation
    pub detail: String,
    /// Number of rows touched
    pub affected_row_count: usize,
}

/// A value that broke a validation rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleViolation {
    /// Canonical field
    pub field: String,
    /// Zero-based row index
    pub row: usize,
    /// Rule that failed
    pub rule: RuleKind,
    /// Rendered offending value
    pub value: String,
    /// Whether the contract marks this rule as blocking
    pub blocking: bool,
    /// Description of the failure
    pub message: String,
}

/// Non-fatal validation findings, keyed by field and row.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    /// Violations in field order, then row order
    pub violations: Vec<RuleViolation>,
}

impl ValidationReport {
    /// Creates an empty report.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if no value broke a rule.
    pub fn passed(&self) -> bool {
        self.violations.is_empty()
    }

    /// Adds a violation.
    pub fn add(&mut self, violation: RuleViolation) {
        self.violations.push(violation);
    }

    /// Violations grouped by field.
    pub fn by_field(&self) -> BTreeMap<&str, Vec<&RuleViolation>> {
        let mut grouped: BTreeMap<&str, Vec<&RuleViolation>> = BTreeMap::new();
        for violation in &self.violations {
            grouped
                .entry(violation.field.as_str())
                .or_default()
                .push(violation);
        }
        grouped
    }

    /// Violations of one field at one row.
    pub fn at(&self, field: &str, row: usize) -> Vec<&RuleViolation> {
        self.violations
            .iter()
            .filter(|v| v.field == field && v.row == row)
            .collect()
    }

    /// Violations of rules marked blocking.
    pub fn blocking(&self) -> Vec<&RuleViolation> {
        self.violations.iter().filter(|v| v.blocking).collect()
    }
}

/// Rows sharing one composite business key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuplicateKeyGroup {
    /// Rendered key parts, in `primary_keys` order
    pub key: Vec<String>,
    /// Zero-based row indices, ascending
    pub rows: Vec<usize>,
}

/// Complete lineage and diagnostics for one normalization call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformationReport {
    /// Dataset the contract belongs to
    pub dataset_id: String,
    /// Contract version applied
    pub version: u32,
    /// Content hash of the applied contract
    pub contract_hash: String,
    /// Number of rows processed
    pub rows: usize,
    /// Lineage events in the order they happened
    pub events: Vec<Event>,
    /// Number of rename events
    pub columns_renamed: usize,
    /// Number of cast events
    pub columns_cast: usize,
    /// Cells that could not be coerced, across the table
    pub total_invalid_coerced: usize,
    /// Cells that could not be coerced, per canonical field
    pub invalid_by_field: BTreeMap<String, usize>,
    /// Non-blocking validation findings
    pub validation: ValidationReport,
    /// Duplicate business keys, recorded when the contract tolerates them
    pub tolerated_duplicate_keys: Vec<DuplicateKeyGroup>,
}

impl TransformationReport {
    /// Returns the events of one kind.
    pub fn events_of(&self, kind: EventKind) -> Vec<&Event> {
        self.events.iter().filter(|e| e.kind == kind).collect()
    }

    /// Returns the events that touched one field.
    pub fn events_for(&self, field: &str) -> Vec<&Event> {
        self.events.iter().filter(|e| e.field == field).collect()
    }

    /// Serializes the report for the evidence packager.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn violation(field: &str, row: usize, blocking: bool) -> RuleViolation {
        RuleViolation {
            field: field.to_string(),
            row,
            rule: RuleKind::Min,
            value: "-1".to_string(),
            blocking,
            message: "below minimum".to_string(),
        }
    }

    #[test]
    fn test_validation_report_grouping() {
        let mut report = ValidationReport::new();
        assert!(report.passed());

        report.add(violation("amount", 0, false));
        report.add(violation("amount", 3, true));
        report.add(violation("rate", 3, false));

        assert!(!report.passed());
        assert_eq!(report.by_field()["amount"].len(), 2);
        assert_eq!(report.at("amount", 3).len(), 1);
        assert_eq!(report.blocking().len(), 1);
    }

    #[test]
    fn test_report_json_uses_lowercase_kinds() {
        let report = TransformationReport {
            dataset_id: "IPE_07".to_string(),
            version: 1,
            contract_hash: "sha256:00".to_string(),
            rows: 2,
            events: vec![Event {
                kind: EventKind::Rename,
                field: "customer_id".to_string(),
                detail: "'Customer No_' -> 'customer_id'".to_string(),
                affected_row_count: 2,
            }],
            columns_renamed: 1,
            columns_cast: 0,
            total_invalid_coerced: 0,
            invalid_by_field: BTreeMap::new(),
            validation: ValidationReport::new(),
            tolerated_duplicate_keys: Vec::new(),
        };

        let json = report.to_json().unwrap();
        assert!(json.contains("\"kind\": \"rename\""));
        assert_eq!(report.events_of(EventKind::Rename).len(), 1);
        assert_eq!(report.events_for("customer_id").len(), 1);
    }
}
