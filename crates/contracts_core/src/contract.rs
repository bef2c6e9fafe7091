//! Schema contract types.
//!
//! A [`Contract`] is one published version of the canonical schema for a
//! dataset. It lists the canonical fields, the raw column names each field may
//! arrive under, the target type of every field and the rules that decide how
//! missing or out-of-range values are handled.

use crate::coercion::CoercionPlan;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A versioned schema contract for one dataset.
///
/// Contracts are immutable once published; the registry shares them as
/// `Arc<Contract>` for the lifetime of the process.
///
/// # Example
///
/// ```rust
/// use contracts_core::{ContractBuilder, Dtype, FieldBuilder, SemanticTag};
///
/// let contract = ContractBuilder::new("IPE_07", 1)
///     .source_system("navision")
///     .primary_key("customer_id")
///     .field(
///         FieldBuilder::new("customer_id", Dtype::String)
///             .required(true)
///             .alias("Customer No_")
///             .semantic_tag(SemanticTag::Id)
///             .build(),
///     )
///     .build();
///
/// assert_eq!(contract.field("customer_id").map(|f| f.dtype), Some(Dtype::String));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contract {
    /// Dataset identifier (e.g. `IPE_07`)
    pub dataset_id: String,

    /// Contract version, unique and increasing per dataset
    pub version: u32,

    /// Human-readable description of the dataset
    pub description: Option<String>,

    /// Source system the extract comes from
    pub source_system: Option<String>,

    /// Canonical fields forming the composite business key, in order
    pub primary_keys: Vec<String>,

    /// Deprecated versions are skipped when resolving the active contract
    pub deprecated: bool,

    /// Record repeated business keys instead of failing the call
    pub allow_duplicate_keys: bool,

    /// Canonical fields in declared order
    pub fields: Vec<FieldSpec>,
}

impl Contract {
    /// Looks up a field by canonical name.
    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Returns the position of a field in declared order.
    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    /// Returns the canonical field names in declared order.
    pub fn canonical_names(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.name.as_str()).collect()
    }

    /// Returns the fields that must be present in every extract.
    pub fn required_fields(&self) -> impl Iterator<Item = &FieldSpec> {
        self.fields.iter().filter(|f| f.required)
    }

    /// Resolves the coercion plan of every field, in declared order.
    pub fn coercion_plans(&self) -> Vec<CoercionPlan> {
        self.fields.iter().map(FieldSpec::coercion_plan).collect()
    }

    /// `dataset_id@vN`, used in log lines and error messages.
    pub fn label(&self) -> String {
        format!("{}@v{}", self.dataset_id, self.version)
    }
}

/// A single canonical field of a contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    /// Canonical field name
    pub name: String,

    /// Whether an extract without this field is rejected
    pub required: bool,

    /// Accepted raw column names, highest priority first
    pub aliases: Vec<String>,

    /// Target type of the normalized column
    pub dtype: Dtype,

    /// Classification driving default coercion behaviour
    pub semantic_tag: SemanticTag,

    /// Stricter duplicate-header handling for fields that drive reconciliation
    pub reconciliation_critical: bool,

    /// Explicit coercion rules; derived from the tag and dtype when absent
    pub coercion_rules: Option<CoercionRules>,

    /// Handling of values that are still missing after coercion
    pub fill_policy: FillPolicy,

    /// Optional value checks run after coercion and fills
    pub validation_rules: Option<ValidationRules>,
}

impl FieldSpec {
    /// Returns the resolved coercion plan for this field.
    pub fn coercion_plan(&self) -> CoercionPlan {
        CoercionPlan::for_field(self)
    }

    /// Names tried against the raw header, highest priority first.
    ///
    /// The canonical name is tried first unless it is already declared as an
    /// alias, in which case its declared position holds.
    pub fn candidate_names(&self) -> Vec<&str> {
        let mut names = Vec::with_capacity(self.aliases.len() + 1);
        if !self.aliases.iter().any(|a| a == &self.name) {
            names.push(self.name.as_str());
        }
        names.extend(self.aliases.iter().map(String::as_str));
        names
    }
}

/// Returned when a contract document names an enum value that does not exist.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind} '{value}', expected one of: {}", .expected.join(", "))]
pub struct UnknownVariant {
    /// Which enum was being parsed (e.g. `dtype`)
    pub kind: &'static str,
    /// The offending value
    pub value: String,
    /// Accepted spellings
    pub expected: &'static [&'static str],
}

macro_rules! string_enum {
    (
        $(#[$meta:meta])*
        $name:ident, $kind:literal {
            $( $(#[$vmeta:meta])* $variant:ident => $text:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $( $(#[$vmeta])* #[serde(rename = $text)] $variant ),+
        }

        impl $name {
            /// Every accepted spelling, in declaration order.
            pub const VARIANTS: &'static [&'static str] = &[$($text),+];

            /// Returns the document spelling of this value.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $( Self::$variant => $text ),+
                }
            }
        }

        impl FromStr for $name {
            type Err = UnknownVariant;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim() {
                    $( $text => Ok(Self::$variant), )+
                    other => Err(UnknownVariant {
                        kind: $kind,
                        value: other.to_string(),
                        expected: Self::VARIANTS,
                    }),
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

string_enum! {
    /// Physical type of a normalized column.
    Dtype, "dtype" {
        /// UTF-8 text
        String => "string",
        /// 64-bit float
        Float64 => "float64",
        /// 64-bit signed integer
        Int64 => "int64",
        /// Naive (UTC) timestamp
        Datetime64 => "datetime64",
    }
}

impl Dtype {
    /// Returns true for `int64` and `float64`.
    pub fn is_numeric(&self) -> bool {
        matches!(self, Dtype::Int64 | Dtype::Float64)
    }
}

string_enum! {
    /// Semantic classification of a field.
    SemanticTag, "semantic_tag" {
        Amount => "amount",
        Date => "date",
        Key => "key",
        Id => "id",
        Code => "code",
        Name => "name",
        Flag => "flag",
        Count => "count",
        Rate => "rate",
        None => "none",
    }
}

impl SemanticTag {
    /// Identifier-like tags keep their text verbatim apart from trimming.
    pub fn is_identifier(&self) -> bool {
        matches!(self, SemanticTag::Key | SemanticTag::Id | SemanticTag::Code)
    }
}

impl Default for SemanticTag {
    fn default() -> Self {
        SemanticTag::None
    }
}

string_enum! {
    /// What to do with values that are still missing after coercion.
    FillPolicy, "fill_policy" {
        /// Leave missing values as they are
        KeepNan => "keep_nan",
        /// Replace missing numeric values with zero
        FillZero => "fill_zero",
        /// Replace missing text with an empty string
        FillEmpty => "fill_empty",
        /// Fail the whole call if any value is missing
        FailOnNan => "fail_on_nan",
    }
}

impl Default for FillPolicy {
    fn default() -> Self {
        FillPolicy::KeepNan
    }
}

string_enum! {
    /// Individual value rules that can be marked as blocking.
    RuleKind, "validation rule" {
        /// `allow_negative: false`
        Negative => "allow_negative",
        /// Lower bound
        Min => "min",
        /// Upper bound
        Max => "max",
        /// Regular expression
        Pattern => "pattern",
    }
}

/// Explicit coercion rules for a field.
///
/// When a field declares this block, only the listed transforms run; the
/// tag-derived defaults are not merged in.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CoercionRules {
    /// Trim leading and trailing whitespace
    pub strip_whitespace: bool,

    /// Remove `,` grouping separators
    pub remove_commas: bool,

    /// Remove all whitespace, including non-breaking spaces
    pub remove_spaces: bool,

    /// Remove currency symbols such as `$`, `€` and `£`
    pub remove_currency_symbols: bool,

    /// Treat `,` as the decimal separator and `.` as grouping
    pub decimal_comma: bool,

    /// Accepted datetime formats, tried in order
    pub date_formats: Option<Vec<String>>,
}

/// Value checks applied to a coerced column.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationRules {
    /// `Some(false)` rejects negative numbers
    pub allow_negative: Option<bool>,

    /// Inclusive lower bound
    pub min: Option<f64>,

    /// Inclusive upper bound
    pub max: Option<f64>,

    /// Regular expression the whole value must match
    pub pattern: Option<String>,

    /// Rules whose violations fail the call instead of being reported
    pub blocking: Vec<RuleKind>,
}

impl ValidationRules {
    /// Returns true if the rule is actually configured on this field.
    pub fn declares(&self, kind: RuleKind) -> bool {
        match kind {
            RuleKind::Negative => self.allow_negative == Some(false),
            RuleKind::Min => self.min.is_some(),
            RuleKind::Max => self.max.is_some(),
            RuleKind::Pattern => self.pattern.is_some(),
        }
    }

    /// Returns true if violations of this rule are fatal.
    pub fn is_blocking(&self, kind: RuleKind) -> bool {
        self.blocking.contains(&kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FieldBuilder;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_enum_round_trip_through_text() {
        for text in Dtype::VARIANTS {
            let parsed: Dtype = text.parse().unwrap();
            assert_eq!(parsed.as_str(), *text);
        }
        assert_eq!("fail_on_nan".parse::<FillPolicy>(), Ok(FillPolicy::FailOnNan));
        assert_eq!(" amount ".parse::<SemanticTag>(), Ok(SemanticTag::Amount));
    }

    #[test]
    fn test_unknown_variant_lists_expected_values() {
        let err = "decimal".parse::<Dtype>().unwrap_err();
        assert_eq!(err.kind, "dtype");
        assert_eq!(err.value, "decimal");
        assert!(err.to_string().contains("float64"));
    }

    #[test]
    fn test_candidate_names_put_canonical_first() {
        let field = FieldBuilder::new("customer_id", Dtype::String)
            .aliases(vec!["Customer No_".to_string(), "customer_no".to_string()])
            .build();
        assert_eq!(
            field.candidate_names(),
            vec!["customer_id", "Customer No_", "customer_no"]
        );
    }

    #[test]
    fn test_candidate_names_respect_declared_canonical_position() {
        let field = FieldBuilder::new("amount", Dtype::Float64)
            .aliases(vec!["Amount (LCY)".to_string(), "amount".to_string()])
            .build();
        assert_eq!(field.candidate_names(), vec!["Amount (LCY)", "amount"]);
    }

    #[test]
    fn test_rule_declaration() {
        let rules = ValidationRules {
            allow_negative: Some(true),
            min: Some(0.0),
            ..Default::default()
        };
        assert!(!rules.declares(RuleKind::Negative));
        assert!(rules.declares(RuleKind::Min));
        assert!(!rules.declares(RuleKind::Pattern));
    }
}
