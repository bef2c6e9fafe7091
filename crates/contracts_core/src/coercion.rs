//! Coercion plans.
//!
//! Every field gets exactly one [`CoercionStrategy`], chosen from its dtype and
//! semantic tag before any row is touched. The plan also carries the resolved
//! string transforms, so the engine never inspects cell types to decide what to
//! do with a column.

use crate::{Dtype, FieldSpec, SemanticTag};
use chrono::format::{Item, StrftimeItems};
use serde::{Deserialize, Serialize};

/// Marker for RFC 3339 timestamps in a date format list.
pub const RFC3339: &str = "rfc3339";

/// Datetime formats tried when a field does not declare its own list.
pub const DEFAULT_DATE_FORMATS: &[&str] = &[
    RFC3339,
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d",
    "%d/%m/%Y",
    "%d.%m.%Y",
    "%Y%m%d",
];

/// How the values of a column are turned into the target type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoercionStrategy {
    /// Text passthrough after the string transforms
    Text,
    /// Text that is always trimmed, never case-folded (keys, ids, codes)
    TrimmedText,
    /// Locale-agnostic decimal number
    Decimal,
    /// Whole number; fractional values are rejected
    Integer,
    /// Timestamp parsed with an ordered list of formats
    Datetime,
}

impl CoercionStrategy {
    /// Selects the strategy for a dtype/tag combination.
    pub fn select(dtype: Dtype, tag: SemanticTag) -> Self {
        match dtype {
            Dtype::String if tag.is_identifier() => CoercionStrategy::TrimmedText,
            Dtype::String => CoercionStrategy::Text,
            Dtype::Float64 => CoercionStrategy::Decimal,
            Dtype::Int64 => CoercionStrategy::Integer,
            Dtype::Datetime64 => CoercionStrategy::Datetime,
        }
    }

    /// Short name used in lineage events.
    pub fn as_str(&self) -> &'static str {
        match self {
            CoercionStrategy::Text => "text",
            CoercionStrategy::TrimmedText => "trimmed_text",
            CoercionStrategy::Decimal => "decimal",
            CoercionStrategy::Integer => "integer",
            CoercionStrategy::Datetime => "datetime",
        }
    }
}

/// Fully resolved coercion behaviour for one field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoercionPlan {
    /// Target parse
    pub strategy: CoercionStrategy,
    /// Trim leading and trailing whitespace
    pub strip_whitespace: bool,
    /// Remove `,` grouping separators
    pub remove_commas: bool,
    /// Remove all whitespace
    pub remove_spaces: bool,
    /// Remove currency symbols
    pub remove_currency_symbols: bool,
    /// `,` is the decimal separator, `.` is grouping
    pub decimal_comma: bool,
    /// Datetime formats, tried in order (empty for non-datetime strategies)
    pub date_formats: Vec<String>,
    /// Whether the rules came from the contract rather than the defaults
    pub explicit: bool,
}

impl CoercionPlan {
    /// Resolves the plan for a field.
    ///
    /// Explicit `coercion_rules` replace the defaults wholesale. Without them
    /// the defaults depend on the strategy: numeric fields strip grouping
    /// characters, amounts and rates also lose currency symbols, everything
    /// else is only trimmed.
    pub fn for_field(field: &FieldSpec) -> Self {
        let strategy = CoercionStrategy::select(field.dtype, field.semantic_tag);
        let date_formats = |explicit: Option<&Vec<String>>| -> Vec<String> {
            if strategy != CoercionStrategy::Datetime {
                return Vec::new();
            }
            match explicit {
                Some(formats) if !formats.is_empty() => formats.clone(),
                _ => DEFAULT_DATE_FORMATS.iter().map(|f| f.to_string()).collect(),
            }
        };

        match &field.coercion_rules {
            Some(rules) => CoercionPlan {
                strategy,
                strip_whitespace: rules.strip_whitespace,
                remove_commas: rules.remove_commas,
                remove_spaces: rules.remove_spaces,
                remove_currency_symbols: rules.remove_currency_symbols,
                decimal_comma: rules.decimal_comma,
                date_formats: date_formats(rules.date_formats.as_ref()),
                explicit: true,
            },
            None => {
                let numeric = matches!(
                    strategy,
                    CoercionStrategy::Decimal | CoercionStrategy::Integer
                );
                let monetary_tag =
                    matches!(field.semantic_tag, SemanticTag::Amount | SemanticTag::Rate);
                let monetary = strategy == CoercionStrategy::Decimal || (numeric && monetary_tag);
                CoercionPlan {
                    strategy,
                    strip_whitespace: true,
                    remove_commas: numeric,
                    remove_spaces: numeric,
                    remove_currency_symbols: monetary,
                    decimal_comma: false,
                    date_formats: date_formats(None),
                    explicit: false,
                }
            }
        }
    }

    /// Names of the enabled string transforms, in application order.
    pub fn transform_names(&self) -> Vec<&'static str> {
        let mut names = Vec::new();
        if self.strip_whitespace || self.strategy == CoercionStrategy::TrimmedText {
            names.push("strip_whitespace");
        }
        if self.decimal_comma {
            names.push("decimal_comma");
        } else if self.remove_commas {
            names.push("remove_commas");
        }
        if self.remove_spaces {
            names.push("remove_spaces");
        }
        if self.remove_currency_symbols {
            names.push("remove_currency_symbols");
        }
        names
    }
}

/// Returns true if `format` is a usable chrono format string (or the RFC 3339 marker).
pub fn is_valid_date_format(format: &str) -> bool {
    if format == RFC3339 {
        return true;
    }
    !format.is_empty() && !StrftimeItems::new(format).any(|item| matches!(item, Item::Error))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CoercionRules, FieldBuilder};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_amount_defaults_strip_currency_and_grouping() {
        let field = FieldBuilder::new("amount_lcy", Dtype::Float64)
            .semantic_tag(SemanticTag::Amount)
            .build();
        let plan = field.coercion_plan();

        assert_eq!(plan.strategy, CoercionStrategy::Decimal);
        assert_eq!(
            plan.transform_names(),
            vec![
                "strip_whitespace",
                "remove_commas",
                "remove_spaces",
                "remove_currency_symbols"
            ]
        );
        assert!(!plan.explicit);
    }

    #[test]
    fn test_count_defaults_keep_currency_symbols() {
        let field = FieldBuilder::new("lines", Dtype::Int64)
            .semantic_tag(SemanticTag::Count)
            .build();
        let plan = field.coercion_plan();

        assert_eq!(plan.strategy, CoercionStrategy::Integer);
        assert!(plan.remove_commas);
        assert!(!plan.remove_currency_symbols);
    }

    #[test]
    fn test_identifier_tags_use_trimmed_text() {
        for tag in [SemanticTag::Key, SemanticTag::Id, SemanticTag::Code] {
            let field = FieldBuilder::new("k", Dtype::String).semantic_tag(tag).build();
            assert_eq!(field.coercion_plan().strategy, CoercionStrategy::TrimmedText);
        }
        let name = FieldBuilder::new("n", Dtype::String)
            .semantic_tag(SemanticTag::Name)
            .build();
        assert_eq!(name.coercion_plan().strategy, CoercionStrategy::Text);
    }

    #[test]
    fn test_explicit_rules_replace_defaults() {
        let field = FieldBuilder::new("posting_date", Dtype::Datetime64)
            .semantic_tag(SemanticTag::Date)
            .coercion_rules(CoercionRules {
                strip_whitespace: true,
                date_formats: Some(vec!["%m/%d/%Y".to_string()]),
                ..Default::default()
            })
            .build();
        let plan = field.coercion_plan();

        assert!(plan.explicit);
        assert_eq!(plan.date_formats, vec!["%m/%d/%Y".to_string()]);
        assert!(!plan.remove_commas);
    }

    #[test]
    fn test_default_date_formats_only_for_datetime() {
        let date = FieldBuilder::new("d", Dtype::Datetime64).build();
        assert_eq!(date.coercion_plan().date_formats.len(), DEFAULT_DATE_FORMATS.len());

        let text = FieldBuilder::new("t", Dtype::String).build();
        assert!(text.coercion_plan().date_formats.is_empty());
    }

    #[test]
    fn test_date_format_validity() {
        assert!(is_valid_date_format("%Y-%m-%d"));
        assert!(is_valid_date_format(RFC3339));
        assert!(!is_valid_date_format("%Q"));
        assert!(!is_valid_date_format(""));
    }
}
