//! Builder pattern for creating contracts.
//!
//! This module provides ergonomic builders for constructing contracts and
//! their fields with a fluent API. Builders do not validate; run
//! [`definition_violations`](crate::definition_violations) on the result when
//! the contract does not come from the parser.

use crate::{
    CoercionRules, Contract, Dtype, FieldSpec, FillPolicy, SemanticTag, ValidationRules,
};

/// Builder for creating a `Contract`.
///
/// # Example
///
/// ```rust
/// use contracts_core::{ContractBuilder, Dtype, FieldBuilder};
///
/// let contract = ContractBuilder::new("CR_03", 2)
///     .description("Control report extract")
///     .field(FieldBuilder::new("entry_no", Dtype::Int64).required(true).build())
///     .build();
///
/// assert_eq!(contract.version, 2);
/// assert_eq!(contract.fields.len(), 1);
/// ```
#[derive(Debug, Default)]
pub struct ContractBuilder {
    dataset_id: String,
    version: u32,
    description: Option<String>,
    source_system: Option<String>,
    primary_keys: Vec<String>,
    deprecated: bool,
    allow_duplicate_keys: bool,
    fields: Vec<FieldSpec>,
}

impl ContractBuilder {
    /// Creates a new contract builder.
    ///
    /// # Arguments
    ///
    /// * `dataset_id` - Dataset identifier
    /// * `version` - Contract version
    pub fn new(dataset_id: impl Into<String>, version: u32) -> Self {
        Self {
            dataset_id: dataset_id.into(),
            version,
            ..Default::default()
        }
    }

    /// Sets the contract description.
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Sets the source system.
    pub fn source_system(mut self, source_system: impl Into<String>) -> Self {
        self.source_system = Some(source_system.into());
        self
    }

    /// Appends a field to the composite business key.
    pub fn primary_key(mut self, field: impl Into<String>) -> Self {
        self.primary_keys.push(field.into());
        self
    }

    /// Marks the version as deprecated.
    pub fn deprecated(mut self, deprecated: bool) -> Self {
        self.deprecated = deprecated;
        self
    }

    /// Tolerates repeated business keys.
    pub fn allow_duplicate_keys(mut self, allow: bool) -> Self {
        self.allow_duplicate_keys = allow;
        self
    }

    /// Adds a field.
    pub fn field(mut self, field: FieldSpec) -> Self {
        self.fields.push(field);
        self
    }

    /// Adds multiple fields.
    pub fn fields(mut self, fields: Vec<FieldSpec>) -> Self {
        self.fields.extend(fields);
        self
    }

    /// Builds the contract.
    pub fn build(self) -> Contract {
        Contract {
            dataset_id: self.dataset_id,
            version: self.version,
            description: self.description,
            source_system: self.source_system,
            primary_keys: self.primary_keys,
            deprecated: self.deprecated,
            allow_duplicate_keys: self.allow_duplicate_keys,
            fields: self.fields,
        }
    }
}

/// Builder for creating a `FieldSpec`.
///
/// # Example
///
/// ```rust
/// use contracts_core::{Dtype, FieldBuilder, FillPolicy, SemanticTag};
///
/// let field = FieldBuilder::new("amount_lcy", Dtype::Float64)
///     .required(true)
///     .alias("rem_amt_LCY")
///     .semantic_tag(SemanticTag::Amount)
///     .fill_policy(FillPolicy::FailOnNan)
///     .build();
///
/// assert_eq!(field.aliases, vec!["rem_amt_LCY".to_string()]);
/// ```
#[derive(Debug)]
pub struct FieldBuilder {
    spec: FieldSpec,
}

impl FieldBuilder {
    /// Creates a new optional field with no aliases.
    ///
    /// # Arguments
    ///
    /// * `name` - Canonical field name
    /// * `dtype` - Target type
    pub fn new(name: impl Into<String>, dtype: Dtype) -> Self {
        Self {
            spec: FieldSpec {
                name: name.into(),
                required: false,
                aliases: Vec::new(),
                dtype,
                semantic_tag: SemanticTag::default(),
                reconciliation_critical: false,
                coercion_rules: None,
                fill_policy: FillPolicy::default(),
                validation_rules: None,
            },
        }
    }

    /// Sets whether the field is required.
    pub fn required(mut self, required: bool) -> Self {
        self.spec.required = required;
        self
    }

    /// Appends an alias (lower priority than the ones already added).
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.spec.aliases.push(alias.into());
        self
    }

    /// Appends several aliases in priority order.
    pub fn aliases(mut self, aliases: Vec<String>) -> Self {
        self.spec.aliases.extend(aliases);
        self
    }

    /// Sets the semantic tag.
    pub fn semantic_tag(mut self, tag: SemanticTag) -> Self {
        self.spec.semantic_tag = tag;
        self
    }

    /// Marks the field as reconciliation-critical.
    pub fn reconciliation_critical(mut self, critical: bool) -> Self {
        self.spec.reconciliation_critical = critical;
        self
    }

    /// Sets explicit coercion rules.
    pub fn coercion_rules(mut self, rules: CoercionRules) -> Self {
        self.spec.coercion_rules = Some(rules);
        self
    }

    /// Sets the fill policy.
    pub fn fill_policy(mut self, policy: FillPolicy) -> Self {
        self.spec.fill_policy = policy;
        self
    }

    /// Sets the validation rules.
    pub fn validation_rules(mut self, rules: ValidationRules) -> Self {
        self.spec.validation_rules = Some(rules);
        self
    }

    /// Builds the field.
    pub fn build(self) -> FieldSpec {
        self.spec
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_contract_builder_minimal() {
        let contract = ContractBuilder::new("IPE_07", 1).build();

        assert_eq!(contract.dataset_id, "IPE_07");
        assert_eq!(contract.version, 1);
        assert!(contract.description.is_none());
        assert!(contract.primary_keys.is_empty());
        assert!(!contract.deprecated);
        assert!(!contract.allow_duplicate_keys);
    }

    #[test]
    fn test_contract_builder_full() {
        let contract = ContractBuilder::new("IPE_07", 3)
            .description("Open customer ledger entries")
            .source_system("navision")
            .primary_key("customer_id")
            .primary_key("doc_no")
            .deprecated(true)
            .allow_duplicate_keys(true)
            .fields(vec![
                FieldBuilder::new("customer_id", Dtype::String).build(),
                FieldBuilder::new("doc_no", Dtype::String).build(),
            ])
            .build();

        assert_eq!(contract.primary_keys, vec!["customer_id", "doc_no"]);
        assert_eq!(contract.source_system.as_deref(), Some("navision"));
        assert_eq!(contract.canonical_names(), vec!["customer_id", "doc_no"]);
        assert!(contract.deprecated);
        assert_eq!(contract.label(), "IPE_07@v3");
    }

    #[test]
    fn test_field_builder_defaults() {
        let field = FieldBuilder::new("posting_date", Dtype::Datetime64).build();

        assert!(!field.required);
        assert!(field.aliases.is_empty());
        assert_eq!(field.semantic_tag, SemanticTag::None);
        assert_eq!(field.fill_policy, FillPolicy::KeepNan);
        assert!(field.coercion_rules.is_none());
        assert!(field.validation_rules.is_none());
    }

    #[test]
    fn test_field_builder_alias_order() {
        let field = FieldBuilder::new("customer_id", Dtype::String)
            .alias("Customer No_")
            .aliases(vec!["Customer No".to_string(), "customer_no".to_string()])
            .build();

        assert_eq!(
            field.aliases,
            vec!["Customer No_", "Customer No", "customer_no"]
        );
    }
}
