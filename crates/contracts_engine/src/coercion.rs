//! Type coercion of resolved columns.
//!
//! A [`TypeCoercer`] is built once per field from its [`CoercionPlan`] and then
//! applied to every cell of the column. Single cells never fail the call: a
//! value that cannot be parsed becomes the missing-value marker and is
//! counted.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use contracts_core::{CoercionPlan, CoercionStrategy, DataValue, Dtype, FieldSpec, RFC3339};
use regex::Regex;
use std::sync::LazyLock;

static DECIMAL_GRAMMAR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[+-]?(?:\d+(?:\.\d*)?|\.\d+)(?:[eE][+-]?\d+)?$").expect("Invalid decimal regex")
});

static INTEGER_GRAMMAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[+-]?\d+$").expect("Invalid integer regex"));

static CURRENCY_SYMBOLS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\p{Sc}").expect("Invalid currency regex"));

/// Result of coercing one cell.
#[derive(Debug, Clone, PartialEq)]
pub enum Coerced {
    /// The converted value (or a missing value passed through)
    Value(DataValue),
    /// Empty or whitespace-only input, now missing; not counted as invalid
    Blank,
    /// Input that could not be parsed, now missing and counted
    Invalid,
}

/// Accumulated output of coercing a column, chunk by chunk.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CoercedColumn {
    /// Converted cells
    pub values: Vec<DataValue>,
    /// Rows whose value could not be parsed
    pub invalid_rows: Vec<usize>,
    /// Cells that were blank and became missing
    pub blank: usize,
    /// Cells whose value changed, blanks excluded
    pub converted: usize,
    /// Cells holding a value after coercion
    pub non_null: usize,
}

impl CoercedColumn {
    /// Creates an empty column with room for `rows` cells.
    pub fn with_capacity(rows: usize) -> Self {
        Self {
            values: Vec::with_capacity(rows),
            ..Default::default()
        }
    }

    /// Number of cells that could not be parsed.
    pub fn invalid(&self) -> usize {
        self.invalid_rows.len()
    }
}

/// Converts the cells of one field to its target type.
///
/// # Example
///
/// ```rust
/// use contracts_core::{DataValue, Dtype, FieldBuilder, SemanticTag};
/// use contracts_engine::{Coerced, TypeCoercer};
///
/// let field = FieldBuilder::new("amount_lcy", Dtype::Float64)
///     .semantic_tag(SemanticTag::Amount)
///     .build();
/// let coercer = TypeCoercer::new(&field);
///
/// assert_eq!(
///     coercer.coerce(&DataValue::from("$1,234.56")),
///     Coerced::Value(DataValue::Float(1234.56))
/// );
/// assert_eq!(coercer.coerce(&DataValue::from("N/A")), Coerced::Invalid);
/// ```
#[derive(Debug, Clone)]
pub struct TypeCoercer {
    dtype: Dtype,
    plan: CoercionPlan,
}

impl TypeCoercer {
    /// Creates a coercer from the field's resolved plan.
    pub fn new(field: &FieldSpec) -> Self {
        Self {
            dtype: field.dtype,
            plan: field.coercion_plan(),
        }
    }

    /// The plan this coercer applies.
    pub fn plan(&self) -> &CoercionPlan {
        &self.plan
    }

    /// Target dtype.
    pub fn dtype(&self) -> Dtype {
        self.dtype
    }

    /// Coerces a slice of cells starting at `first_row` and appends the
    /// results to `out`.
    pub fn coerce_into(&self, values: &[DataValue], first_row: usize, out: &mut CoercedColumn) {
        for (offset, value) in values.iter().enumerate() {
            let coerced = match self.coerce(value) {
                Coerced::Value(coerced) => {
                    if coerced != *value {
                        out.converted += 1;
                    }
                    coerced
                }
                Coerced::Blank => {
                    out.blank += 1;
                    DataValue::Null
                }
                Coerced::Invalid => {
                    out.invalid_rows.push(first_row + offset);
                    DataValue::Null
                }
            };
            if !coerced.is_null() {
                out.non_null += 1;
            }
            out.values.push(coerced);
        }
    }

    /// Coerces a single cell.
    pub fn coerce(&self, value: &DataValue) -> Coerced {
        if let DataValue::String(text) = value {
            if text.trim().is_empty() {
                return Coerced::Blank;
            }
        }

        match self.plan.strategy {
            CoercionStrategy::Text | CoercionStrategy::TrimmedText => match value {
                DataValue::Null => Coerced::Value(DataValue::Null),
                DataValue::String(text) => {
                    let text = self.transform(text);
                    if text.is_empty() {
                        Coerced::Blank
                    } else {
                        Coerced::Value(DataValue::String(text))
                    }
                }
                other => match other.render() {
                    Some(text) => Coerced::Value(DataValue::String(text)),
                    None => Coerced::Value(DataValue::Null),
                },
            },
            CoercionStrategy::Decimal => match value {
                DataValue::Null => Coerced::Value(DataValue::Null),
                DataValue::Float(f) if f.is_nan() => Coerced::Blank,
                DataValue::Float(f) if f.is_finite() => Coerced::Value(DataValue::Float(*f)),
                DataValue::Int(i) => int_to_float(*i).map_or(Coerced::Invalid, |f| {
                    Coerced::Value(DataValue::Float(f))
                }),
                DataValue::String(text) => self.parse_text(text),
                DataValue::Float(_) | DataValue::Datetime(_) => Coerced::Invalid,
            },
            CoercionStrategy::Integer => match value {
                DataValue::Null => Coerced::Value(DataValue::Null),
                DataValue::Int(i) => Coerced::Value(DataValue::Int(*i)),
                DataValue::Float(f) if f.is_nan() => Coerced::Blank,
                DataValue::Float(f) => float_to_int(*f).map_or(Coerced::Invalid, |i| {
                    Coerced::Value(DataValue::Int(i))
                }),
                DataValue::String(text) => self.parse_text(text),
                DataValue::Datetime(_) => Coerced::Invalid,
            },
            CoercionStrategy::Datetime => match value {
                DataValue::Null => Coerced::Value(DataValue::Null),
                DataValue::Datetime(dt) => Coerced::Value(DataValue::Datetime(*dt)),
                DataValue::String(text) => self.parse_text(text),
                DataValue::Int(i) => self.parse_text(&i.to_string()),
                DataValue::Float(f) if f.is_nan() => Coerced::Blank,
                DataValue::Float(_) => Coerced::Invalid,
            },
        }
    }

    /// Applies the plan's string transforms in their fixed order.
    pub fn transform(&self, text: &str) -> String {
        let strip = self.plan.strip_whitespace || self.plan.strategy == CoercionStrategy::TrimmedText;
        let mut out = if strip {
            text.trim().to_string()
        } else {
            text.to_string()
        };

        if self.plan.decimal_comma {
            out = out.replace('.', "").replace(',', ".");
        } else if self.plan.remove_commas {
            out.retain(|c| c != ',');
        }

        if self.plan.remove_spaces {
            out.retain(|c| !c.is_whitespace());
        }

        if self.plan.remove_currency_symbols {
            out = CURRENCY_SYMBOLS.replace_all(&out, "").into_owned();
            if strip {
                out = out.trim().to_string();
            }
        }

        out
    }

    fn parse_text(&self, text: &str) -> Coerced {
        let text = self.transform(text);
        let parsed = match self.plan.strategy {
            CoercionStrategy::Decimal => parse_decimal(&text).map(DataValue::Float),
            CoercionStrategy::Integer => parse_integer(&text).map(DataValue::Int),
            CoercionStrategy::Datetime => {
                parse_datetime(&text, &self.plan.date_formats).map(DataValue::Datetime)
            }
            CoercionStrategy::Text | CoercionStrategy::TrimmedText => {
                Some(DataValue::String(text))
            }
        };
        parsed.map_or(Coerced::Invalid, Coerced::Value)
    }
}

/// Splits accounting notation `(1234.56)` into a sign and a body.
fn accounting_sign(text: &str) -> (bool, &str) {
    match text.strip_prefix('(').and_then(|t| t.strip_suffix(')')) {
        Some(inner) if !inner.starts_with(['+', '-']) => (true, inner),
        _ => (false, text),
    }
}

/// Parses the locale-agnostic decimal grammar. `inf` and `nan` are rejected.
pub fn parse_decimal(text: &str) -> Option<f64> {
    let (negative, body) = accounting_sign(text);
    if !DECIMAL_GRAMMAR.is_match(body) {
        return None;
    }
    let value: f64 = body.parse().ok()?;
    if !value.is_finite() {
        return None;
    }
    Some(if negative { -value } else { value })
}

/// Parses an integer. Decimals are accepted only with a zero fraction.
pub fn parse_integer(text: &str) -> Option<i64> {
    let (negative, body) = accounting_sign(text);
    let value = if INTEGER_GRAMMAR.is_match(body) {
        body.parse::<i64>().ok()?
    } else {
        float_to_int(parse_decimal(body)?)?
    };
    if negative { value.checked_neg() } else { Some(value) }
}

/// Rejects integers beyond 2^53 that a float cannot hold exactly.
fn int_to_float(value: i64) -> Option<f64> {
    let converted = value as f64;
    (converted as i128 == i128::from(value)).then_some(converted)
}

fn float_to_int(value: f64) -> Option<i64> {
    // i64::MAX is not representable as f64; the bound below is 2^63.
    let in_range = value >= i64::MIN as f64 && value < i64::MAX as f64;
    (value.is_finite() && value.fract() == 0.0 && in_range).then_some(value as i64)
}

/// Tries each format in order; the first success wins.
pub fn parse_datetime(text: &str, formats: &[String]) -> Option<NaiveDateTime> {
    formats.iter().find_map(|format| {
        if format == RFC3339 {
            return DateTime::parse_from_rfc3339(text)
                .ok()
                .map(|dt| dt.naive_utc());
        }
        NaiveDateTime::parse_from_str(text, format).ok().or_else(|| {
            NaiveDate::parse_from_str(text, format)
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts_core::{CoercionRules, FieldBuilder, SemanticTag};
    use pretty_assertions::assert_eq;

    fn coercer(dtype: Dtype, tag: SemanticTag) -> TypeCoercer {
        TypeCoercer::new(&FieldBuilder::new("f", dtype).semantic_tag(tag).build())
    }

    fn value(coerced: Coerced) -> DataValue {
        match coerced {
            Coerced::Value(v) => v,
            other => panic!("expected a value, got {other:?}"),
        }
    }

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_amount_with_currency_and_grouping() {
        let amount = coercer(Dtype::Float64, SemanticTag::Amount);
        assert_eq!(
            value(amount.coerce(&"$1,234.56".into())),
            DataValue::Float(1234.56)
        );
        assert_eq!(
            value(amount.coerce(&" € 1 500,00 ".into())),
            DataValue::Float(150000.0)
        );
        assert_eq!(
            value(amount.coerce(&"1\u{a0}500.25".into())),
            DataValue::Float(1500.25)
        );
    }

    #[test]
    fn test_accounting_negative() {
        let amount = coercer(Dtype::Float64, SemanticTag::Amount);
        assert_eq!(
            value(amount.coerce(&"($1,234.56)".into())),
            DataValue::Float(-1234.56)
        );
        assert_eq!(amount.coerce(&"(-5)".into()), Coerced::Invalid);
    }

    #[test]
    fn test_unparseable_decimals() {
        let amount = coercer(Dtype::Float64, SemanticTag::Amount);
        for text in ["N/A", "inf", "NaN", "1.2.3", "12abc", "1e999"] {
            assert_eq!(amount.coerce(&text.into()), Coerced::Invalid, "{text}");
        }
    }

    #[test]
    fn test_blank_is_not_invalid() {
        let amount = coercer(Dtype::Float64, SemanticTag::Amount);
        assert_eq!(amount.coerce(&"   ".into()), Coerced::Blank);
        assert_eq!(amount.coerce(&"".into()), Coerced::Blank);
        assert_eq!(
            amount.coerce(&DataValue::Null),
            Coerced::Value(DataValue::Null)
        );
    }

    #[test]
    fn test_decimal_comma() {
        let field = FieldBuilder::new("rate", Dtype::Float64)
            .coercion_rules(CoercionRules {
                strip_whitespace: true,
                decimal_comma: true,
                ..Default::default()
            })
            .build();
        let rate = TypeCoercer::new(&field);
        assert_eq!(
            value(rate.coerce(&"1.234,56".into())),
            DataValue::Float(1234.56)
        );
    }

    #[test]
    fn test_integer_rejects_fractions() {
        let count = coercer(Dtype::Int64, SemanticTag::Count);
        assert_eq!(value(count.coerce(&"1,500".into())), DataValue::Int(1500));
        assert_eq!(value(count.coerce(&"12.0".into())), DataValue::Int(12));
        assert_eq!(value(count.coerce(&DataValue::Float(7.0))), DataValue::Int(7));
        assert_eq!(count.coerce(&"12.5".into()), Coerced::Invalid);
        assert_eq!(count.coerce(&DataValue::Float(2.5)), Coerced::Invalid);
        assert_eq!(
            count.coerce(&"99999999999999999999".into()),
            Coerced::Invalid
        );
    }

    #[test]
    fn test_large_integers_are_not_rounded_into_floats() {
        let amount = coercer(Dtype::Float64, SemanticTag::Amount);
        assert_eq!(
            value(amount.coerce(&DataValue::Int(1 << 53))),
            DataValue::Float(9_007_199_254_740_992.0)
        );
        assert_eq!(
            amount.coerce(&DataValue::Int((1 << 53) + 1)),
            Coerced::Invalid
        );
        assert_eq!(amount.coerce(&DataValue::Int(i64::MAX)), Coerced::Invalid);
        assert_eq!(value(amount.coerce(&DataValue::Int(-42))), DataValue::Float(-42.0));
    }

    #[test]
    fn test_datetime_default_formats() {
        let date = coercer(Dtype::Datetime64, SemanticTag::Date);
        assert_eq!(
            value(date.coerce(&"2024-01-31".into())),
            DataValue::Datetime(ymd(2024, 1, 31))
        );
        assert_eq!(
            value(date.coerce(&"31/01/2024".into())),
            DataValue::Datetime(ymd(2024, 1, 31))
        );
        assert_eq!(
            value(date.coerce(&"31.01.2024".into())),
            DataValue::Datetime(ymd(2024, 1, 31))
        );
        assert_eq!(
            value(date.coerce(&DataValue::Int(20240131))),
            DataValue::Datetime(ymd(2024, 1, 31))
        );
        let with_time = value(date.coerce(&"2024-01-31T10:15:00+02:00".into()));
        assert_eq!(
            with_time,
            DataValue::Datetime(ymd(2024, 1, 31) + chrono::Duration::hours(8) + chrono::Duration::minutes(15))
        );
        assert_eq!(date.coerce(&"31 Jan 2024".into()), Coerced::Invalid);
    }

    #[test]
    fn test_explicit_date_formats_replace_defaults() {
        let field = FieldBuilder::new("d", Dtype::Datetime64)
            .coercion_rules(CoercionRules {
                strip_whitespace: true,
                date_formats: Some(vec!["%m/%d/%Y".to_string()]),
                ..Default::default()
            })
            .build();
        let date = TypeCoercer::new(&field);
        assert_eq!(
            value(date.coerce(&"01/31/2024".into())),
            DataValue::Datetime(ymd(2024, 1, 31))
        );
        assert_eq!(date.coerce(&"2024-01-31".into()), Coerced::Invalid);
    }

    #[test]
    fn test_text_strategies() {
        let id = coercer(Dtype::String, SemanticTag::Id);
        assert_eq!(
            value(id.coerce(&"  00123 ".into())),
            DataValue::from("00123")
        );
        assert_eq!(value(id.coerce(&DataValue::Int(123))), DataValue::from("123"));

        let name = coercer(Dtype::String, SemanticTag::Name);
        assert_eq!(
            value(name.coerce(&" ACME  Corp ".into())),
            DataValue::from("ACME  Corp")
        );
    }

    #[test]
    fn test_coerce_into_counts() {
        let amount = coercer(Dtype::Float64, SemanticTag::Amount);
        let cells: Vec<DataValue> = vec![
            "1,500.00".into(),
            "N/A".into(),
            "".into(),
            DataValue::Null,
            DataValue::Float(2.0),
        ];
        let mut out = CoercedColumn::with_capacity(cells.len());
        amount.coerce_into(&cells[..2], 0, &mut out);
        amount.coerce_into(&cells[2..], 2, &mut out);

        assert_eq!(
            out.values,
            vec![
                DataValue::Float(1500.0),
                DataValue::Null,
                DataValue::Null,
                DataValue::Null,
                DataValue::Float(2.0),
            ]
        );
        assert_eq!(out.invalid_rows, vec![1]);
        assert_eq!(out.invalid(), 1);
        assert_eq!(out.blank, 1);
        assert_eq!(out.converted, 1);
        assert_eq!(out.non_null, 2);
    }
}
