//! Value rules and business-key uniqueness.
//!
//! Runs on the coerced, filled table. Missing values skip every rule; rows with
//! a missing key component are left out of the uniqueness check.

use crate::diagnostics::{Diagnostics, Finding, Severity};
use chrono::NaiveDateTime;
use contracts_core::{
    Contract, DataValue, DuplicateKeyGroup, FieldSpec, NormalizedTable, ParseViolation, RuleKind,
    RuleViolation, ValidationRules,
};
use regex::Regex;
use std::collections::HashMap;
use tracing::debug;

/// Validates a normalized table against a contract.
pub struct Validator {
    /// Compiled, anchored patterns keyed by field name
    patterns: HashMap<String, Regex>,
}

impl Validator {
    /// Compiles every pattern rule of the contract.
    ///
    /// Patterns match the whole value: `[A-Z]{2}` accepts `DE` but not `DEU`.
    pub fn new(contract: &Contract) -> Result<Self, Vec<ParseViolation>> {
        let mut patterns = HashMap::new();
        let mut violations = Vec::new();

        for field in &contract.fields {
            let Some(pattern) = field
                .validation_rules
                .as_ref()
                .and_then(|r| r.pattern.as_deref())
            else {
                continue;
            };
            match Regex::new(&format!("^(?:{pattern})$")) {
                Ok(regex) => {
                    patterns.insert(field.name.clone(), regex);
                }
                Err(e) => violations.push(ParseViolation::InvalidPattern {
                    field: field.name.clone(),
                    pattern: pattern.to_string(),
                    error: e.to_string(),
                }),
            }
        }

        if violations.is_empty() {
            Ok(Self { patterns })
        } else {
            Err(violations)
        }
    }

    /// Runs the uniqueness check, then the value rules.
    pub fn validate(&self, contract: &Contract, table: &NormalizedTable) -> Diagnostics {
        let mut diagnostics = check_keys(contract, table);
        diagnostics.extend(self.check_rules(contract, table));
        diagnostics
    }

    /// Checks every value rule. Blocking rules produce errors, the rest warnings.
    pub fn check_rules(&self, contract: &Contract, table: &NormalizedTable) -> Diagnostics {
        let mut diagnostics = Diagnostics::new();

        for field in &contract.fields {
            let Some(rules) = &field.validation_rules else {
                continue;
            };
            let Some(column) = table.column(&field.name) else {
                continue;
            };

            let mut found = 0;
            for (row, value) in column.values.iter().enumerate() {
                for violation in self.check_value(field, rules, row, value) {
                    let severity = if violation.blocking {
                        Severity::Error
                    } else {
                        Severity::Warning
                    };
                    diagnostics.push(severity, Finding::Rule(violation));
                    found += 1;
                }
            }
            if found > 0 {
                debug!(field = %field.name, violations = found, "validation rules violated");
            }
        }

        diagnostics
    }

    fn check_value(
        &self,
        field: &FieldSpec,
        rules: &ValidationRules,
        row: usize,
        value: &DataValue,
    ) -> Vec<RuleViolation> {
        let mut violations = Vec::new();
        if value.is_null() {
            return violations;
        }

        let rendered = value.render().unwrap_or_default();
        let mut fail = |rule: RuleKind, message: String| {
            violations.push(RuleViolation {
                field: field.name.clone(),
                row,
                rule,
                value: rendered.clone(),
                blocking: rules.is_blocking(rule),
                message,
            });
        };

        if let Some(number) = value.as_float() {
            if rules.allow_negative == Some(false) && number < 0.0 {
                fail(RuleKind::Negative, format!("value {number} is negative"));
            }
            if let Some(min) = rules.min {
                if number < min {
                    fail(RuleKind::Min, format!("value {number} is below minimum {min}"));
                }
            }
            if let Some(max) = rules.max {
                if number > max {
                    fail(RuleKind::Max, format!("value {number} is above maximum {max}"));
                }
            }
        }

        if let Some(regex) = self.patterns.get(&field.name) {
            if !regex.is_match(&rendered) {
                let pattern = rules.pattern.as_deref().unwrap_or_default();
                fail(
                    RuleKind::Pattern,
                    format!("value '{rendered}' does not match pattern '{pattern}'"),
                );
            }
        }

        violations
    }
}

/// Typed component of a composite key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum KeyPart {
    Text(String),
    Int(i64),
    Float(u64),
    Datetime(NaiveDateTime),
}

impl KeyPart {
    fn from_value(value: &DataValue) -> Option<Self> {
        match value {
            DataValue::Null => None,
            DataValue::String(s) => Some(KeyPart::Text(s.clone())),
            DataValue::Int(i) => Some(KeyPart::Int(*i)),
            DataValue::Float(f) if f.is_nan() => None,
            // -0.0 and 0.0 are the same key.
            DataValue::Float(f) => Some(KeyPart::Float((f + 0.0).to_bits())),
            DataValue::Datetime(dt) => Some(KeyPart::Datetime(*dt)),
        }
    }
}

/// Finds rows sharing a composite business key.
///
/// Duplicates are errors unless the contract tolerates them.
pub fn check_keys(contract: &Contract, table: &NormalizedTable) -> Diagnostics {
    let mut diagnostics = Diagnostics::new();
    let groups = duplicate_key_groups(contract, table);
    let severity = if contract.allow_duplicate_keys {
        Severity::Warning
    } else {
        Severity::Error
    };
    if !groups.is_empty() {
        debug!(
            dataset_id = %contract.dataset_id,
            groups = groups.len(),
            tolerated = contract.allow_duplicate_keys,
            "duplicate business keys"
        );
    }
    for group in groups {
        diagnostics.push(severity, Finding::DuplicateKey(group));
    }
    diagnostics
}

/// Row-index groups of repeated keys, ordered by first occurrence.
pub fn duplicate_key_groups(contract: &Contract, table: &NormalizedTable) -> Vec<DuplicateKeyGroup> {
    if contract.primary_keys.is_empty() {
        return Vec::new();
    }
    let Some(columns) = contract
        .primary_keys
        .iter()
        .map(|key| table.column(key))
        .collect::<Option<Vec<_>>>()
    else {
        return Vec::new();
    };

    let mut index: HashMap<Vec<KeyPart>, usize> = HashMap::new();
    let mut groups: Vec<DuplicateKeyGroup> = Vec::new();

    for row in 0..table.row_count() {
        let Some(key) = columns
            .iter()
            .map(|c| KeyPart::from_value(&c.values[row]))
            .collect::<Option<Vec<_>>>()
        else {
            continue;
        };

        match index.get(&key) {
            Some(&group) => groups[group].rows.push(row),
            None => {
                index.insert(key, groups.len());
                groups.push(DuplicateKeyGroup {
                    key: columns
                        .iter()
                        .map(|c| c.values[row].render().unwrap_or_default())
                        .collect(),
                    rows: vec![row],
                });
            }
        }
    }

    groups.retain(|g| g.rows.len() > 1);
    groups
}
