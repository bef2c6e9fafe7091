//! Parser for schema contract documents (YAML/TOML formats).
//!
//! This crate turns contract documents into validated, strongly-typed
//! [`Contract`] values. Parsing never stops at the first defect: a document
//! with several problems fails with [`ParserError::Definition`] listing all of
//! them.
//!
//! # Example
//!
//! ```rust
//! use contracts_parser::parse_yaml;
//!
//! let yaml = r#"
//! dataset_id: IPE_07
//! version: 1
//! primary_keys: [customer_id]
//! fields:
//!   - name: customer_id
//!     required: true
//!     aliases: ["Customer No_", "customer_no"]
//!     dtype: string
//!     semantic_tag: id
//! "#;
//!
//! let contract = parse_yaml(yaml).expect("Failed to parse contract");
//! assert_eq!(contract.dataset_id, "IPE_07");
//! assert_eq!(contract.fields[0].aliases.len(), 2);
//! ```

mod document;

pub use document::{
    CoercionRulesDocument, ContractDocument, FieldDocument, ValidationRulesDocument,
    contract_violations,
};

use contracts_core::{Contract, ParseViolation};
use std::fmt;
use std::path::Path;
use thiserror::Error;
use tracing::debug;

/// Errors that can occur during contract parsing.
#[derive(Debug, Error)]
pub enum ParserError {
    /// YAML parsing or deserialization failed
    #[error("Failed to parse YAML: {0}")]
    YamlError(#[from] serde_yaml_ng::Error),

    /// TOML parsing or deserialization failed
    #[error("Failed to parse TOML: {0}")]
    TomlError(String),

    /// Unsupported file format
    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),

    /// Invalid file extension
    #[error("Invalid or missing file extension")]
    InvalidExtension,

    /// The document is well-formed but breaks contract invariants
    #[error("Invalid contract definition: {}", Violations(.0))]
    Definition(Vec<ParseViolation>),
}

impl ParserError {
    /// Flattens the error into definition violations.
    ///
    /// Syntax errors become a single [`ParseViolation::Syntax`].
    /// Format-detection errors are not definition defects and yield `None`.
    pub fn into_violations(self) -> Option<Vec<ParseViolation>> {
        match self {
            ParserError::YamlError(e) => Some(vec![ParseViolation::Syntax(e.to_string())]),
            ParserError::TomlError(msg) => Some(vec![ParseViolation::Syntax(msg)]),
            ParserError::Definition(violations) => Some(violations),
            ParserError::UnsupportedFormat(_) | ParserError::InvalidExtension => None,
        }
    }
}

struct Violations<'a>(&'a [ParseViolation]);

impl fmt::Display for Violations<'_> {
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

/// Result type alias for parser operations.
pub type Result<T> = std::result::Result<T, ParserError>;

/// Supported contract file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContractFormat {
    /// YAML format (.yml, .yaml)
    Yaml,
    /// TOML format (.toml)
    Toml,
}

/// Parse a contract from a YAML string.
///
/// # Arguments
///
/// * `content` - The YAML string to parse
///
/// # Example
///
/// ```rust
/// use contracts_parser::parse_yaml;
///
/// let yaml = r#"
/// dataset_id: CR_03
/// version: 2
/// fields:
///   - name: entry_no
///     dtype: int64
///     semantic_tag: key
/// "#;
///
/// let contract = parse_yaml(yaml).unwrap();
/// assert_eq!(contract.version, 2);
/// ```
pub fn parse_yaml(content: &str) -> Result<Contract> {
    let document: ContractDocument = serde_yaml_ng::from_str(content)?;
    document.into_contract().map_err(ParserError::Definition)
}

/// Parse a contract from a TOML string.
///
/// # Arguments
///
/// * `content` - The TOML string to parse
///
/// # Example
///
/// ```rust
/// use contracts_parser::parse_toml;
///
/// let toml = r#"
/// dataset_id = "CR_03"
/// version = 2
///
/// [[fields]]
/// name = "entry_no"
/// dtype = "int64"
/// semantic_tag = "key"
/// "#;
///
/// let contract = parse_toml(toml).unwrap();
/// assert_eq!(contract.dataset_id, "CR_03");
/// ```
pub fn parse_toml(content: &str) -> Result<Contract> {
    let document: ContractDocument =
        toml::from_str(content).map_err(|e| ParserError::TomlError(e.to_string()))?;
    document.into_contract().map_err(ParserError::Definition)
}

/// Parse a contract from a string in the given format.
pub fn parse_str(content: &str, format: ContractFormat) -> Result<Contract> {
    debug!(?format, bytes = content.len(), "parsing contract document");
    match format {
        ContractFormat::Yaml => parse_yaml(content),
        ContractFormat::Toml => parse_toml(content),
    }
}

/// Detect the contract format from a file path based on its extension.
///
/// # Arguments
///
/// * `path` - Path to the contract file
///
/// # Supported Extensions
///
/// * `.yaml`, `.yml` → `ContractFormat::Yaml`
/// * `.toml` → `ContractFormat::Toml`
///
/// # Errors
///
/// Returns `ParserError::InvalidExtension` if the file has no extension.
/// Returns `ParserError::UnsupportedFormat` if the extension is not recognized.
pub fn detect_format(path: &Path) -> Result<ContractFormat> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .ok_or(ParserError::InvalidExtension)?;

    match extension.to_lowercase().as_str() {
        "yaml" | "yml" => Ok(ContractFormat::Yaml),
        "toml" => Ok(ContractFormat::Toml),
        other => Err(ParserError::UnsupportedFormat(other.to_string())),
    }
}
