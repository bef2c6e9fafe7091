//! Structural checks for contract definitions.
//!
//! These are the invariants every published contract must satisfy,
//! independent of the document format it was written in. Checks accumulate:
//! a definition with three defects reports three violations.

use crate::coercion::is_valid_date_format;
use crate::{Contract, Dtype, FillPolicy, ParseViolation, RuleKind};
use std::collections::{HashMap, HashSet};

/// Checks the data-model invariants of a contract.
///
/// Pattern compilation is left to the caller, which owns the regex engine.
pub fn definition_violations(contract: &Contract) -> Vec<ParseViolation> {
    let mut violations = Vec::new();

    if contract.dataset_id.trim().is_empty() {
        violations.push(ParseViolation::EmptyDatasetId);
    }

    if contract.version == 0 {
        violations.push(ParseViolation::InvalidVersion(0));
    }

    if contract.fields.is_empty() {
        violations.push(ParseViolation::EmptyFields);
    }

    let mut names = HashSet::new();
    for field in &contract.fields {
        if !names.insert(field.name.as_str()) {
            violations.push(ParseViolation::DuplicateCanonicalName(field.name.clone()));
        }
    }

    // Canonical names take part in header matching, so they share the alias namespace.
    let mut owners: HashMap<&str, &str> = HashMap::new();
    for field in &contract.fields {
        let mut own = HashSet::new();
        for alias in field.candidate_names() {
            if !own.insert(alias) {
                continue;
            }
            match owners.get(alias) {
                Some(first) if *first != field.name => {
                    violations.push(ParseViolation::DuplicateAlias {
                        alias: alias.to_string(),
                        first: first.to_string(),
                        second: field.name.clone(),
                    });
                }
                Some(_) => {}
                None => {
                    owners.insert(alias, field.name.as_str());
                }
            }
        }
    }

    for key in &contract.primary_keys {
        if contract.field(key).is_none() {
            violations.push(ParseViolation::UnknownPrimaryKey(key.clone()));
        }
    }

    for field in &contract.fields {
        let fill_ok = match field.fill_policy {
            FillPolicy::FillZero => field.dtype.is_numeric(),
            FillPolicy::FillEmpty => field.dtype == Dtype::String,
            FillPolicy::KeepNan | FillPolicy::FailOnNan => true,
        };
        if !fill_ok {
            violations.push(ParseViolation::FillPolicyMismatch {
                field: field.name.clone(),
                policy: field.fill_policy,
                dtype: field.dtype,
            });
        }

        if let Some(rules) = &field.coercion_rules {
            if rules.decimal_comma && rules.remove_commas {
                violations.push(ParseViolation::ConflictingCoercionRules {
                    field: field.name.clone(),
                    detail: "decimal_comma and remove_commas cannot both be enabled".to_string(),
                });
            }
            for format in rules.date_formats.iter().flatten() {
                if !is_valid_date_format(format) {
                    violations.push(ParseViolation::InvalidDateFormat {
                        field: field.name.clone(),
                        format: format.clone(),
                    });
                }
            }
        }

        if let Some(rules) = &field.validation_rules {
            if let (Some(min), Some(max)) = (rules.min, rules.max) {
                if min > max {
                    violations.push(ParseViolation::InvertedRange {
                        field: field.name.clone(),
                        min,
                        max,
                    });
                }
            }
            for rule in &rules.blocking {
                if !rules.declares(*rule) {
                    violations.push(ParseViolation::UndeclaredBlockingRule {
                        field: field.name.clone(),
                        rule: *rule,
                    });
                }
            }
        }
    }

    violations
}

/// Rule kinds in a stable order, used to canonicalize `blocking` lists.
pub fn sort_rule_kinds(kinds: &mut Vec<RuleKind>) {
    kinds.sort_by_key(|k| RuleKind::VARIANTS.iter().position(|v| *v == k.as_str()));
    kinds.dedup();
}
