//! Error types for schema contracts.
//!
//! Registry and definition errors are fatal for a dataset: nothing is
//! normalized against a contract that failed to load. Definition problems are
//! collected into a single [`ContractParseError`] so one attempt reports every
//! defect in the document.

use crate::{Dtype, FillPolicy, RuleKind, UnknownVariant};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for contract operations.
pub type Result<T> = std::result::Result<T, ContractError>;

/// Errors raised while resolving or loading a contract.
#[derive(Error, Debug)]
pub enum ContractError {
    /// No definition exists for the dataset (or the requested version)
    #[error("{}", not_found_message(.dataset_id, .version))]
    NotFound {
        /// Dataset identifier
        dataset_id: String,
        /// Requested version, `None` when resolving the active contract
        version: Option<u32>,
    },

    /// The definition exists but violates the contract invariants
    #[error(transparent)]
    Parse(#[from] ContractParseError),

    /// The definition could not be read
    #[error("Failed to read contract definition '{}': {source}", .path.display())]
    Io {
        /// Path of the definition
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

fn not_found_message(dataset_id: &str, version: &Option<u32>) -> String {
    match version {
        Some(v) => format!("Contract not found: {dataset_id} v{v}"),
        None => format!("No active contract for dataset '{dataset_id}'"),
    }
}

impl ContractError {
    /// Creates a not-found error for a specific version.
    pub fn not_found(dataset_id: impl Into<String>, version: u32) -> Self {
        Self::NotFound {
            dataset_id: dataset_id.into(),
            version: Some(version),
        }
    }

    /// Creates a not-found error for the active-contract lookup.
    pub fn no_active(dataset_id: impl Into<String>) -> Self {
        Self::NotFound {
            dataset_id: dataset_id.into(),
            version: None,
        }
    }
}

/// A contract definition that failed validation.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("Invalid contract definition for {dataset_id} ({origin}): {}", ParseViolations(.violations))]
pub struct ContractParseError {
    /// Dataset identifier the definition was loaded for
    pub dataset_id: String,
    /// Where the definition came from (file path or source label)
    pub origin: String,
    /// Every violation found, in document order
    pub violations: Vec<ParseViolation>,
}

impl ContractParseError {
    /// Returns true if any violation matches the predicate.
    pub fn has(&self, predicate: impl Fn(&ParseViolation) -> bool) -> bool {
        self.violations.iter().any(predicate)
    }
}

struct ParseViolations<'a>(&'a [ParseViolation]);

impl fmt::Display for ParseViolations<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, violation) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{violation}")?;
        }
        Ok(())
    }
}

/// A single defect in a contract definition.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseViolation {
    /// YAML/TOML syntax or shape error
    #[error("syntax error: {0}")]
    Syntax(String),

    /// The document declares no dataset id
    #[error("dataset id is empty")]
    EmptyDatasetId,

    /// Dataset id differs from the one the definition was discovered under
    #[error("dataset id mismatch: expected '{expected}', found '{found}'")]
    DatasetIdMismatch {
        /// Id the definition was requested as
        expected: String,
        /// Id declared in the document
        found: String,
    },

    /// Version 0 or negative
    #[error("invalid version {0}: versions start at 1")]
    InvalidVersion(i64),

    /// Declared version does not fit the dataset's version sequence
    #[error("non-monotonic version: {detail}")]
    NonMonotonicVersion {
        /// What went wrong
        detail: String,
    },

    /// The contract declares no fields
    #[error("contract declares no fields")]
    EmptyFields,

    /// Two fields share a canonical name
    #[error("duplicate canonical field name '{0}'")]
    DuplicateCanonicalName(String),

    /// The same alias appears under two fields
    #[error("alias '{alias}' is declared by both '{first}' and '{second}'")]
    DuplicateAlias {
        /// The shared alias
        alias: String,
        /// Field that declared it first
        first: String,
        /// Field that declared it again
        second: String,
    },

    /// An enum attribute holds an unknown value
    #[error("field '{field}': {source}")]
    UnknownEnumValue {
        /// Field the attribute belongs to
        field: String,
        /// Parse failure
        #[source]
        source: UnknownVariant,
    },

    /// A primary key does not name a declared field
    #[error("primary key '{0}' is not a declared field")]
    UnknownPrimaryKey(String),

    /// Fill policy cannot produce a value of the field's dtype
    #[error("field '{field}': fill policy {policy} is not valid for dtype {dtype}")]
    FillPolicyMismatch {
        /// Field name
        field: String,
        /// Declared policy
        policy: FillPolicy,
        /// Declared dtype
        dtype: Dtype,
    },

    /// A pattern rule does not compile
    #[error("field '{field}': invalid pattern '{pattern}': {error}")]
    InvalidPattern {
        /// Field name
        field: String,
        /// Declared pattern
        pattern: String,
        /// Compiler message
        error: String,
    },

    /// A date format string is not usable
    #[error("field '{field}': invalid date format '{format}'")]
    InvalidDateFormat {
        /// Field name
        field: String,
        /// Declared format
        format: String,
    },

    /// `min` is greater than `max`
    #[error("field '{field}': min {min} is greater than max {max}")]
    InvertedRange {
        /// Field name
        field: String,
        /// Declared minimum
        min: f64,
        /// Declared maximum
        max: f64,
    },

    /// A rule is marked blocking but not configured
    #[error("field '{field}': rule '{rule}' is marked blocking but not declared")]
    UndeclaredBlockingRule {
        /// Field name
        field: String,
        /// Rule kind
        rule: RuleKind,
    },

    /// Mutually exclusive coercion rules are both enabled
    #[error("field '{field}': {detail}")]
    ConflictingCoercionRules {
        /// Field name
        field: String,
        /// Which rules conflict
        detail: String,
    },
}

/// Errors raised while assembling a table.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TableError {
    /// Columns of different length
    #[error("column '{column}' has {actual} rows, expected {expected}")]
    RaggedColumns {
        /// Offending column
        column: String,
        /// Length of the first column
        expected: usize,
        /// Length of the offending column
        actual: usize,
    },

    /// A record with the wrong number of cells
    #[error("record {row} has {actual} cells, expected {expected}")]
    RecordWidth {
        /// Zero-based record index
        row: usize,
        /// Header width
        expected: usize,
        /// Record width
        actual: usize,
    },
}
