//! Typed findings collected by the normalization phases.
//!
//! Phases never fail on their own. Each one returns its best-effort output
//! together with [`Diagnostics`]; the orchestrator looks at the severities
//! and decides whether the call fails.

use contracts_core::{DuplicateKeyGroup, RuleViolation};

/// How much a finding matters for the call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    /// Recorded for lineage only
    Info,
    /// Reported alongside a successful result
    Warning,
    /// Fails the call
    Error,
}

/// What a phase found.
#[derive(Debug, Clone, PartialEq)]
pub enum Finding {
    /// A required field matched no raw column
    MissingRequired {
        /// Canonical field
        field: String,
    },
    /// Several raw columns matched the chosen alias of a field
    AmbiguousMatch {
        /// Canonical field
        field: String,
        /// Every matching raw column, the kept one first
        columns: Vec<String>,
    },
    /// A raw column no field claimed
    UnknownColumn {
        /// Raw column name
        column: String,
    },
    /// Missing values left in a field after the fill policy ran
    Unfilled {
        /// Canonical field
        field: String,
        /// Zero-based row indices
        rows: Vec<usize>,
    },
    /// Rows sharing a composite business key
    DuplicateKey(DuplicateKeyGroup),
    /// A value broke a validation rule
    Rule(RuleViolation),
}

/// A finding with its severity.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    /// How the finding affects the call
    pub severity: Severity,
    /// What was found
    pub finding: Finding,
}

/// Ordered collection of diagnostics.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Diagnostics {
    items: Vec<Diagnostic>,
}

impl Diagnostics {
    /// Creates an empty collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a finding.
    pub fn push(&mut self, severity: Severity, finding: Finding) {
        self.items.push(Diagnostic { severity, finding });
    }

    /// Returns true if any finding fails the call.
    pub fn has_errors(&self) -> bool {
        self.items.iter().any(|d| d.severity == Severity::Error)
    }

    /// Findings of a given severity, in recording order.
    pub fn with_severity(&self, severity: Severity) -> impl Iterator<Item = &Finding> {
        self.items
            .iter()
            .filter(move |d| d.severity == severity)
            .map(|d| &d.finding)
    }

    /// Findings that fail the call.
    pub fn errors(&self) -> impl Iterator<Item = &Finding> {
        self.with_severity(Severity::Error)
    }

    /// Every diagnostic, in recording order.
    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter()
    }

    /// Appends another collection.
    pub fn extend(&mut self, other: Diagnostics) {
        self.items.extend(other.items);
    }

    /// Number of diagnostics.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns true if nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Consumes the collection.
    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.items
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_filtering() {
        let mut diagnostics = Diagnostics::new();
        diagnostics.push(
            Severity::Warning,
            Finding::UnknownColumn {
                column: "Remarks".to_string(),
            },
        );
        assert!(!diagnostics.has_errors());

        diagnostics.push(
            Severity::Error,
            Finding::MissingRequired {
                field: "customer_id".to_string(),
            },
        );
        assert!(diagnostics.has_errors());
        assert_eq!(diagnostics.errors().count(), 1);
        assert_eq!(diagnostics.with_severity(Severity::Warning).count(), 1);
        assert_eq!(diagnostics.len(), 2);
    }
}
