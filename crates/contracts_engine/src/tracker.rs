//! Lineage log for one normalization call.

use crate::alias::FieldMapping;
use contracts_core::{
    CoercionStrategy, Contract, DuplicateKeyGroup, Dtype, Event, EventKind, TransformationReport,
    ValidationReport,
};
use std::collections::BTreeMap;

/// Records renames, casts, fills and drops as they happen.
///
/// With tracking off no events are stored, but every counter in the final
/// report is still maintained.
#[derive(Debug, Default)]
pub struct TransformationTracker {
    track: bool,
    events: Vec<Event>,
    columns_renamed: usize,
    columns_cast: usize,
    total_invalid: usize,
    invalid_by_field: BTreeMap<String, usize>,
}

impl TransformationTracker {
    /// Creates an empty tracker.
    pub fn new(track: bool) -> Self {
        Self {
            track,
            ..Default::default()
        }
    }

    fn record(&mut self, kind: EventKind, field: &str, detail: String, affected_row_count: usize) {
        if self.track {
            self.events.push(Event {
                kind,
                field: field.to_string(),
                detail,
                affected_row_count,
            });
        }
    }

    /// Records a raw column taking its canonical name.
    pub fn rename(&mut self, mapping: &FieldMapping, rows: usize) {
        self.columns_renamed += 1;
        let detail = format!(
            "'{}' -> '{}' (alias '{}', {})",
            mapping.raw_name,
            mapping.field,
            mapping.alias,
            mapping.tier.as_str()
        );
        self.record(EventKind::Rename, &mapping.field, detail, rows);
    }

    /// Records a column converted to its target dtype.
    pub fn cast(
        &mut self,
        field: &str,
        from: Option<Dtype>,
        to: Dtype,
        strategy: CoercionStrategy,
        affected: usize,
        invalid: usize,
    ) {
        self.columns_cast += 1;
        let source = from.map_or("untyped", |d| d.as_str());
        let detail = format!(
            "{source} -> {to} ({}, {affected} rows, {invalid} invalid)",
            strategy.as_str()
        );
        self.record(EventKind::Cast, field, detail, affected);
    }

    /// Records cells that could not be coerced.
    pub fn record_invalid(&mut self, field: &str, count: usize) {
        if count == 0 {
            return;
        }
        self.total_invalid += count;
        *self.invalid_by_field.entry(field.to_string()).or_default() += count;
    }

    /// Records missing values being filled, or an absent field materialized.
    pub fn fill(&mut self, field: &str, detail: impl Into<String>, rows: usize) {
        self.record(EventKind::Fill, field, detail.into(), rows);
    }

    /// Records a raw column removed from the output.
    pub fn drop_column(&mut self, column: &str, detail: impl Into<String>, rows: usize) {
        self.record(EventKind::Drop, column, detail.into(), rows);
    }

    /// Events recorded so far.
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// Cells that could not be coerced, across all fields.
    pub fn total_invalid(&self) -> usize {
        self.total_invalid
    }

    /// Consumes the tracker and assembles the report.
    pub fn finish(
        self,
        contract: &Contract,
        contract_hash: String,
        rows: usize,
        validation: ValidationReport,
        tolerated_duplicate_keys: Vec<DuplicateKeyGroup>,
    ) -> TransformationReport {
        TransformationReport {
            dataset_id: contract.dataset_id.clone(),
            version: contract.version,
            contract_hash,
            rows,
            events: self.events,
            columns_renamed: self.columns_renamed,
            columns_cast: self.columns_cast,
            total_invalid_coerced: self.total_invalid,
            invalid_by_field: self.invalid_by_field,
            validation,
            tolerated_duplicate_keys,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alias::MatchTier;
    use contracts_core::ContractBuilder;
    use pretty_assertions::assert_eq;

    fn mapping() -> FieldMapping {
        FieldMapping {
            field: "customer_id".to_string(),
            column: 0,
            raw_name: "Customer No_".to_string(),
            alias: "Customer No_".to_string(),
            tier: MatchTier::Exact,
        }
    }

    #[test]
    fn test_events_in_order() {
        let mut tracker = TransformationTracker::new(true);
        tracker.rename(&mapping(), 2);
        tracker.cast(
            "customer_id",
            None,
            Dtype::String,
            CoercionStrategy::TrimmedText,
            2,
            0,
        );
        tracker.drop_column("Remarks", "unknown column", 2);

        let kinds: Vec<_> = tracker.events().iter().map(|e| e.kind).collect();
        assert_eq!(kinds, vec![EventKind::Rename, EventKind::Cast, EventKind::Drop]);
        assert_eq!(
            tracker.events()[0].detail,
            "'Customer No_' -> 'customer_id' (alias 'Customer No_', exact)"
        );
        assert_eq!(
            tracker.events()[1].detail,
            "untyped -> string (trimmed_text, 2 rows, 0 invalid)"
        );
    }

    #[test]
    fn test_counters_without_tracking() {
        let contract = ContractBuilder::new("IPE_07", 1).build();
        let mut tracker = TransformationTracker::new(false);
        tracker.rename(&mapping(), 3);
        tracker.cast("amount_lcy", None, Dtype::Float64, CoercionStrategy::Decimal, 3, 1);
        tracker.record_invalid("amount_lcy", 1);
        tracker.record_invalid("amount_lcy", 2);

        let report = tracker.finish(
            &contract,
            "sha256:00".to_string(),
            3,
            ValidationReport::new(),
            Vec::new(),
        );
        assert!(report.events.is_empty());
        assert_eq!(report.columns_renamed, 1);
        assert_eq!(report.columns_cast, 1);
        assert_eq!(report.total_invalid_coerced, 3);
        assert_eq!(report.invalid_by_field.get("amount_lcy"), Some(&3));
    }
}
