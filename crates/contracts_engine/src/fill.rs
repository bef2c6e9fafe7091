//! Fill policies for values still missing after coercion.

use contracts_core::{DataValue, Dtype, FieldSpec, FillPolicy};

/// What a fill policy did to one column.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FillOutcome {
    /// Cells replaced by the policy's fill value
    pub filled: usize,
    /// Rows still missing under `fail_on_nan`
    pub unfilled_rows: Vec<usize>,
}

/// Applies a field's fill policy to its coerced values.
pub struct FillPolicyEngine;

impl FillPolicyEngine {
    /// The replacement value for a policy and dtype, if the policy fills.
    pub fn fill_value(policy: FillPolicy, dtype: Dtype) -> Option<DataValue> {
        match (policy, dtype) {
            (FillPolicy::FillZero, Dtype::Int64) => Some(DataValue::Int(0)),
            (FillPolicy::FillZero, Dtype::Float64) => Some(DataValue::Float(0.0)),
            (FillPolicy::FillEmpty, Dtype::String) => Some(DataValue::String(String::new())),
            _ => None,
        }
    }

    /// Applies the policy in place.
    ///
    /// `keep_nan` leaves the column untouched. `fail_on_nan` never modifies
    /// values; it reports the rows the orchestrator will fail on.
    pub fn apply(field: &FieldSpec, values: &mut [DataValue]) -> FillOutcome {
        let mut outcome = FillOutcome::default();
        match field.fill_policy {
            FillPolicy::KeepNan => {}
            FillPolicy::FailOnNan => {
                outcome.unfilled_rows = values
                    .iter()
                    .enumerate()
                    .filter_map(|(row, v)| v.is_null().then_some(row))
                    .collect();
            }
            FillPolicy::FillZero | FillPolicy::FillEmpty => {
                // Incompatible dtypes are rejected when the contract is loaded.
                let Some(fill) = Self::fill_value(field.fill_policy, field.dtype) else {
                    return outcome;
                };
                for value in values.iter_mut().filter(|v| v.is_null()) {
                    *value = fill.clone();
                    outcome.filled += 1;
                }
            }
        }
        outcome
    }
}
