//! Error types for normalization calls.
//!
//! Every variant that can describe several defects carries all of them: a
//! failed call tells the caller everything that has to be fixed, never just
//! the first problem.

use contracts_core::{ContractError, DuplicateKeyGroup, RuleViolation, TableError};
use thiserror::Error;

/// Result type for normalization operations.
pub type Result<T> = std::result::Result<T, NormalizeError>;

/// Raw columns that tied for a reconciliation-critical field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AmbiguousField {
    /// Canonical field
    pub field: String,
    /// Every matching raw column, in table order
    pub columns: Vec<String>,
}

/// Missing values left in a `fail_on_nan` field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FillViolation {
    /// Canonical field
    pub field: String,
    /// Number of missing values
    pub count: usize,
    /// Zero-based row indices
    pub rows: Vec<usize>,
}

/// Errors that fail a normalization call.
#[derive(Debug, Error)]
pub enum NormalizeError {
    /// Required fields that matched no raw column
    #[error("Missing required fields for {dataset_id}: {}", .fields.join(", "))]
    MissingRequiredFields {
        /// Dataset being normalized
        dataset_id: String,
        /// Every missing field, in contract order
        fields: Vec<String>,
    },

    /// Duplicate headers for reconciliation-critical fields
    #[error("Ambiguous columns for {dataset_id}: {}", describe_ambiguity(.fields))]
    AliasAmbiguity {
        /// Dataset being normalized
        dataset_id: String,
        /// Every ambiguous field, in contract order
        fields: Vec<AmbiguousField>,
    },

    /// Columns outside the contract, rejected in strict mode
    #[error("Unknown columns for {dataset_id}: {}", .columns.join(", "))]
    UnknownColumns {
        /// Dataset being normalized
        dataset_id: String,
        /// Every unknown raw column, in table order
        columns: Vec<String>,
    },

    /// Missing values in `fail_on_nan` fields
    #[error("Fill policy violated for {dataset_id}: {}", describe_fills(.violations))]
    FillPolicyViolation {
        /// Dataset being normalized
        dataset_id: String,
        /// One entry per violating field
        violations: Vec<FillViolation>,
    },

    /// Repeated composite business keys
    #[error(
        "Duplicate primary key ({}) for {dataset_id}: {}",
        .key_fields.join(", "),
        describe_groups(.groups)
    )]
    DuplicateKey {
        /// Dataset being normalized
        dataset_id: String,
        /// Primary key fields, in declared order
        key_fields: Vec<String>,
        /// Every repeated key, by first occurrence
        groups: Vec<DuplicateKeyGroup>,
    },

    /// Violations of rules the contract marks as blocking
    #[error(
        "Blocking validation rules violated for {dataset_id}: {} violation(s)",
        .violations.len()
    )]
    ValidationRuleViolation {
        /// Dataset being normalized
        dataset_id: String,
        /// Every blocking violation
        violations: Vec<RuleViolation>,
    },

    /// The caller cancelled the call
    #[error("Normalization of {dataset_id} cancelled after {rows_processed} rows: {reason}")]
    Cancelled {
        /// Dataset being normalized
        dataset_id: String,
        /// Reason given to the token
        reason: String,
        /// Rows coerced before the call stopped
        rows_processed: usize,
    },

    /// The contract could not be resolved or is invalid
    #[error(transparent)]
    Contract(#[from] ContractError),

    /// The output table could not be assembled
    #[error("Failed to assemble normalized table: {0}")]
    Table(#[from] TableError),
}

impl NormalizeError {
    /// Creates a missing-fields error.
    pub fn missing_fields(dataset_id: impl Into<String>, fields: Vec<String>) -> Self {
        Self::MissingRequiredFields {
            dataset_id: dataset_id.into(),
            fields,
        }
    }

    /// Creates a cancellation error.
    pub fn cancelled(
        dataset_id: impl Into<String>,
        reason: impl Into<String>,
        rows_processed: usize,
    ) -> Self {
        Self::Cancelled {
            dataset_id: dataset_id.into(),
            reason: reason.into(),
            rows_processed,
        }
    }
}

fn describe_ambiguity(fields: &[AmbiguousField]) -> String {
    fields
        .iter()
        .map(|f| format!("{} <- [{}]", f.field, f.columns.join(", ")))
        .collect::<Vec<_>>()
        .join("; ")
}

fn describe_fills(violations: &[FillViolation]) -> String {
    violations
        .iter()
        .map(|v| format!("{} has {} missing value(s) at rows {:?}", v.field, v.count, v.rows))
        .collect::<Vec<_>>()
        .join("; ")
}

fn describe_groups(groups: &[DuplicateKeyGroup]) -> String {
    groups
        .iter()
        .map(|g| format!("[{}] at rows {:?}", g.key.join(", "), g.rows))
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_fields_lists_all() {
        let err = NormalizeError::missing_fields(
            "IPE_07",
            vec!["customer_id".to_string(), "amount_lcy".to_string()],
        );
        assert_eq!(
            err.to_string(),
            "Missing required fields for IPE_07: customer_id, amount_lcy"
        );
    }

    #[test]
    fn test_fill_violation_message() {
        let err = NormalizeError::FillPolicyViolation {
            dataset_id: "IPE_07".to_string(),
            violations: vec![FillViolation {
                field: "amount_lcy".to_string(),
                count: 2,
                rows: vec![1, 4],
            }],
        };
        assert!(err.to_string().contains("amount_lcy has 2 missing value(s) at rows [1, 4]"));
    }

    #[test]
    fn test_duplicate_key_message() {
        let err = NormalizeError::DuplicateKey {
            dataset_id: "IPE_07".to_string(),
            key_fields: vec!["customer_id".to_string()],
            groups: vec![DuplicateKeyGroup {
                key: vec!["00123".to_string()],
                rows: vec![0, 1],
            }],
        };
        assert_eq!(
            err.to_string(),
            "Duplicate primary key (customer_id) for IPE_07: [00123] at rows [0, 1]"
        );
    }
}
