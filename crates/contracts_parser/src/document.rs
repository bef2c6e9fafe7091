//! Contract documents as written on disk.
//!
//! Enum-valued keys are read as plain strings and converted afterwards, so an
//! unknown `dtype` in one field does not hide an unknown `fill_policy` in
//! another: every defect is reported in one pass.

use contracts_core::{
    CoercionRules, Contract, Dtype, FieldSpec, FillPolicy, ParseViolation, RuleKind, SemanticTag,
    ValidationRules, definition_violations, sort_rule_kinds,
};
use regex::Regex;
use serde::Deserialize;
use std::str::FromStr;

/// Top-level contract document.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ContractDocument {
    /// Dataset identifier
    #[serde(default)]
    pub dataset_id: String,

    /// Declared version; signed so that `0` and negatives can be reported
    pub version: i64,

    /// Human-readable description
    #[serde(default)]
    pub description: Option<String>,

    /// Source system
    #[serde(default)]
    pub source_system: Option<String>,

    /// Composite business key
    #[serde(default)]
    pub primary_keys: Vec<String>,

    /// Lifecycle flag
    #[serde(default)]
    pub deprecated: bool,

    /// Tolerate repeated business keys
    #[serde(default)]
    pub allow_duplicate_keys: bool,

    /// Field definitions
    #[serde(default)]
    pub fields: Vec<FieldDocument>,
}

/// One field entry of a contract document.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FieldDocument {
    /// Canonical field name
    pub name: String,

    /// Fail when no raw column matches
    #[serde(default)]
    pub required: bool,

    /// Raw column names, highest priority first
    #[serde(default)]
    pub aliases: Vec<String>,

    /// Target type, validated after deserialization
    pub dtype: String,

    /// Business meaning; picks the default coercion
    #[serde(default)]
    pub semantic_tag: Option<String>,

    /// Duplicate headers for this field are fatal
    #[serde(default)]
    pub reconciliation_critical: bool,

    /// Explicit string transforms
    #[serde(default)]
    pub coercion_rules: Option<CoercionRulesDocument>,

    /// Missing-value handling
    #[serde(default)]
    pub fill_policy: Option<String>,

    /// Value checks
    #[serde(default)]
    pub validation_rules: Option<ValidationRulesDocument>,
}

/// `coercion_rules` block. Omitted switches are off.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CoercionRulesDocument {
    /// Trim surrounding whitespace
    pub strip_whitespace: bool,
    /// Remove `,` separators
    pub remove_commas: bool,
    /// Remove all whitespace
    pub remove_spaces: bool,
    /// Remove currency symbols
    pub remove_currency_symbols: bool,
    /// `,` is the decimal separator
    pub decimal_comma: bool,
    /// Accepted datetime formats
    pub date_formats: Option<Vec<String>>,
}

/// `validation_rules` block.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ValidationRulesDocument {
    /// `false` rejects negative numbers
    pub allow_negative: Option<bool>,
    /// Inclusive lower bound
    pub min: Option<f64>,
    /// Inclusive upper bound
    pub max: Option<f64>,
    /// Full-match regular expression
    pub pattern: Option<String>,
    /// Rule names whose violations are fatal
    pub blocking: Vec<String>,
}

impl From<CoercionRulesDocument> for CoercionRules {
    fn from(doc: CoercionRulesDocument) -> Self {
        CoercionRules {
            strip_whitespace: doc.strip_whitespace,
            remove_commas: doc.remove_commas,
            remove_spaces: doc.remove_spaces,
            remove_currency_symbols: doc.remove_currency_symbols,
            decimal_comma: doc.decimal_comma,
            date_formats: doc.date_formats,
        }
    }
}

fn parse_enum<T: FromStr<Err = contracts_core::UnknownVariant>>(
    field: &str,
    text: &str,
    fallback: T,
    violations: &mut Vec<ParseViolation>,
) -> T {
    match text.parse() {
        Ok(value) => value,
        Err(source) => {
            violations.push(ParseViolation::UnknownEnumValue {
                field: field.to_string(),
                source,
            });
            fallback
        }
    }
}

impl FieldDocument {
    fn into_spec(self, violations: &mut Vec<ParseViolation>) -> FieldSpec {
        let name = self.name;
        let dtype = parse_enum(&name, &self.dtype, Dtype::String, violations);
        let semantic_tag = self
            .semantic_tag
            .map(|tag| parse_enum(&name, &tag, SemanticTag::None, violations))
            .unwrap_or_default();
        let fill_policy = self
            .fill_policy
            .map(|policy| parse_enum(&name, &policy, FillPolicy::KeepNan, violations))
            .unwrap_or_default();

        let validation_rules = self.validation_rules.map(|doc| {
            let mut blocking = Vec::with_capacity(doc.blocking.len());
            for text in &doc.blocking {
                match text.parse::<RuleKind>() {
                    Ok(kind) => blocking.push(kind),
                    Err(source) => violations.push(ParseViolation::UnknownEnumValue {
                        field: name.clone(),
                        source,
                    }),
                }
            }
            sort_rule_kinds(&mut blocking);
            ValidationRules {
                allow_negative: doc.allow_negative,
                min: doc.min,
                max: doc.max,
                pattern: doc.pattern,
                blocking,
            }
        });

        FieldSpec {
            name,
            required: self.required,
            aliases: self.aliases,
            dtype,
            semantic_tag,
            reconciliation_critical: self.reconciliation_critical,
            coercion_rules: self.coercion_rules.map(CoercionRules::from),
            fill_policy,
            validation_rules,
        }
    }
}

impl ContractDocument {
    /// Converts the document into a contract, collecting every violation.
    pub fn into_contract(self) -> Result<Contract, Vec<ParseViolation>> {
        let mut violations = Vec::new();

        let version = match u32::try_from(self.version) {
            Ok(v) if v > 0 => v,
            _ => {
                violations.push(ParseViolation::InvalidVersion(self.version));
                // Placeholder so the structural checks below do not repeat the defect.
                1
            }
        };

        let fields: Vec<FieldSpec> = self
            .fields
            .into_iter()
            .map(|field| field.into_spec(&mut violations))
            .collect();

        let contract = Contract {
            dataset_id: self.dataset_id.trim().to_string(),
            version,
            description: self.description,
            source_system: self.source_system,
            primary_keys: self.primary_keys,
            deprecated: self.deprecated,
            allow_duplicate_keys: self.allow_duplicate_keys,
            fields,
        };

        violations.extend(contract_violations(&contract));

        if violations.is_empty() {
            Ok(contract)
        } else {
            Err(violations)
        }
    }
}

/// Checks every invariant of an already typed contract, including pattern
/// compilation.
pub fn contract_violations(contract: &Contract) -> Vec<ParseViolation> {
    let mut violations = definition_violations(contract);
    for field in &contract.fields {
        let Some(pattern) = field
            .validation_rules
            .as_ref()
            .and_then(|rules| rules.pattern.as_ref())
        else {
            continue;
        };
        if let Err(e) = Regex::new(pattern) {
            violations.push(ParseViolation::InvalidPattern {
                field: field.name.clone(),
                pattern: pattern.clone(),
                error: e.to_string(),
            });
        }
    }
    violations
}
