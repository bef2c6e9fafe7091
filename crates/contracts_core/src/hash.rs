//! Content hashing for contract versions.
//!
//! The hash is computed over a canonical JSON projection of the typed
//! contract, never over the document text, so comments, blank lines, key order
//! and the choice between YAML and TOML cannot change it. Everything that
//! changes how an extract is normalized does.

use crate::coercion::CoercionPlan;
use crate::definition::sort_rule_kinds;
use crate::{Contract, Dtype, FieldSpec, FillPolicy, RuleKind, SemanticTag, ValidationRules};
use serde::Serialize;
use sha2::{Digest, Sha256};

/// Version tag of the canonical projection, mixed into every digest.
const CANONICAL_FORM: &str = "schema-contract/v1";

#[derive(Serialize)]
struct CanonicalContract<'a> {
    form: &'static str,
    dataset_id: &'a str,
    version: u32,
    source_system: Option<&'a str>,
    primary_keys: &'a [String],
    allow_duplicate_keys: bool,
    fields: Vec<CanonicalField<'a>>,
}

#[derive(Serialize)]
struct CanonicalField<'a> {
    name: &'a str,
    required: bool,
    aliases: &'a [String],
    dtype: Dtype,
    semantic_tag: SemanticTag,
    reconciliation_critical: bool,
    coercion: CoercionPlan,
    fill_policy: FillPolicy,
    validation_rules: Option<CanonicalRules<'a>>,
}

#[derive(Serialize)]
struct CanonicalRules<'a> {
    allow_negative: Option<bool>,
    min: Option<f64>,
    max: Option<f64>,
    pattern: Option<&'a str>,
    blocking: Vec<RuleKind>,
}

impl<'a> CanonicalRules<'a> {
    /// Projects rules onto what they check. `allow_negative: true` is the
    /// default, and a block that checks nothing is the same as no block.
    fn project(rules: &'a ValidationRules) -> Option<Self> {
        let mut blocking = rules.blocking.clone();
        sort_rule_kinds(&mut blocking);
        let canonical = Self {
            allow_negative: rules.allow_negative.filter(|allowed| !allowed),
            min: rules.min,
            max: rules.max,
            pattern: rules.pattern.as_deref(),
            blocking,
        };
        let checks_nothing = canonical.allow_negative.is_none()
            && canonical.min.is_none()
            && canonical.max.is_none()
            && canonical.pattern.is_none()
            && canonical.blocking.is_empty();
        (!checks_nothing).then_some(canonical)
    }
}

/// The resolved plan without its provenance flag: spelling out the defaults
/// does not change behaviour.
fn canonical_plan(field: &FieldSpec) -> CoercionPlan {
    let mut plan = field.coercion_plan();
    plan.explicit = false;
    plan
}

/// Computes deterministic content hashes for contracts.
pub struct ContractHasher;

impl ContractHasher {
    /// Returns `sha256:<hex>` for the contract's semantic content.
    ///
    /// `description` and `deprecated` are lifecycle metadata and do not take
    /// part in the hash. Field order does.
    pub fn hash(contract: &Contract) -> String {
        let bytes = Self::canonical_bytes(contract);
        let digest = Sha256::digest(&bytes);
        format!("sha256:{}", hex::encode(digest))
    }

    /// The canonical serialization the hash is computed over.
    pub fn canonical_bytes(contract: &Contract) -> Vec<u8> {
        let canonical = CanonicalContract {
            form: CANONICAL_FORM,
            dataset_id: &contract.dataset_id,
            version: contract.version,
            source_system: contract.source_system.as_deref(),
            primary_keys: &contract.primary_keys,
            allow_duplicate_keys: contract.allow_duplicate_keys,
            fields: contract
                .fields
                .iter()
                .map(|field| CanonicalField {
                    name: &field.name,
                    required: field.required,
                    aliases: &field.aliases,
                    dtype: field.dtype,
                    semantic_tag: field.semantic_tag,
                    reconciliation_critical: field.reconciliation_critical,
                    coercion: canonical_plan(field),
                    fill_policy: field.fill_policy,
                    validation_rules: field
                        .validation_rules
                        .as_ref()
                        .and_then(CanonicalRules::project),
                })
                .collect(),
        };

        // Plain structs of strings, numbers and sequences always serialize.
        serde_json::to_vec(&canonical).unwrap_or_default()
    }
}
