//! The normalization pipeline.
//!
//! Phases run in a fixed order: alias resolution, coercion, fill, validation.
//! Each phase produces its output together with [`Diagnostics`]; fatal
//! findings are escalated between phases so that a failed call reports
//! everything wrong with the earliest failing phase.

use crate::alias::{AliasResolver, Resolution};
use crate::coercion::{CoercedColumn, TypeCoercer};
use crate::diagnostics::{Diagnostics, Finding, Severity};
use crate::error::{AmbiguousField, FillViolation, NormalizeError, Result};
use crate::fill::FillPolicyEngine;
use crate::options::NormalizeOptions;
use crate::tracker::TransformationTracker;
use crate::validate::Validator;
use contracts_core::{
    Column, Contract, ContractError, ContractHasher, ContractParseError, DataValue, FieldSpec,
    NormalizedTable, RawTable, TransformationReport, ValidationReport,
};
use tracing::{debug, info, warn};

/// One resolved field waiting to be coerced.
struct CoercionJob<'a> {
    index: usize,
    field: &'a FieldSpec,
    source: Column,
    coercer: TypeCoercer,
    out: CoercedColumn,
}

/// Applies contracts to raw tables.
pub struct Normalizer;

impl Normalizer {
    /// Normalizes a raw extract.
    ///
    /// Returns the canonical table and its lineage report, or the first fatal
    /// phase's error. No partial table is ever returned.
    pub fn apply(
        contract: &Contract,
        raw: RawTable,
        options: &NormalizeOptions,
    ) -> Result<(NormalizedTable, TransformationReport)> {
        let dataset_id = contract.dataset_id.as_str();
        let rows = raw.row_count();

        let validator = Validator::new(contract).map_err(|violations| {
            ContractError::Parse(ContractParseError {
                dataset_id: contract.dataset_id.clone(),
                origin: contract.label(),
                violations,
            })
        })?;
        check_cancelled(dataset_id, options, 0)?;

        debug!(
            dataset_id,
            version = contract.version,
            rows,
            columns = raw.columns().len(),
            "normalizing table"
        );

        // Alias phase
        let mut resolution = AliasResolver::new(contract)
            .with_precedence(options.precedence)
            .resolve(&raw.column_names());
        classify_unknown(&raw, &mut resolution, options);
        escalate(contract, &resolution.diagnostics)?;

        let mut tracker = TransformationTracker::new(options.track);
        let mut slots: Vec<Option<Column>> = raw.into_columns().into_iter().map(Some).collect();
        let mut jobs = Vec::with_capacity(resolution.mappings.len());

        for mapping in &resolution.mappings {
            let Some(index) = contract.field_index(&mapping.field) else {
                continue;
            };
            let Some(source) = slots[mapping.column].take() else {
                continue;
            };
            if mapping.is_rename() {
                tracker.rename(mapping, rows);
            }
            let field = &contract.fields[index];
            jobs.push(CoercionJob {
                index,
                field,
                source,
                coercer: TypeCoercer::new(field),
                out: CoercedColumn::with_capacity(rows),
            });
        }

        for duplicate in &resolution.duplicates {
            for &position in &duplicate.dropped {
                if let Some(column) = slots[position].take() {
                    tracker.drop_column(
                        &duplicate.field,
                        format!("duplicate header '{}' dropped", column.name),
                        rows,
                    );
                }
            }
        }

        if options.strict {
            for &position in &resolution.unknown {
                if let Some(column) = slots[position].take() {
                    tracker.drop_column(&column.name, "unknown column dropped", rows);
                }
            }
        }

        // Coercion phase
        if options.cast {
            let mut processed = 0;
            while processed < rows {
                check_cancelled(dataset_id, options, processed)?;
                let end = processed.saturating_add(options.chunk_size.max(1)).min(rows);
                for job in &mut jobs {
                    job.coercer
                        .coerce_into(&job.source.values[processed..end], processed, &mut job.out);
                }
                processed = end;
                if let Some(progress) = &options.progress {
                    progress.report(processed, rows);
                }
            }
        }
        check_cancelled(dataset_id, options, rows)?;

        let mut canonical = Vec::with_capacity(contract.fields.len());
        let mut jobs = jobs.into_iter().peekable();
        for (index, field) in contract.fields.iter().enumerate() {
            let column = match jobs.next_if(|job| job.index == index) {
                Some(job) if options.cast => finish_coercion(job, &mut tracker),
                Some(job) => Column {
                    name: field.name.clone(),
                    dtype: job.source.dtype,
                    values: job.source.values,
                },
                None => {
                    tracker.fill(&field.name, "absent optional field materialized", rows);
                    Column {
                        name: field.name.clone(),
                        dtype: Some(field.dtype),
                        values: vec![DataValue::Null; rows],
                    }
                }
            };
            canonical.push(column);
        }

        // Fill phase
        let mut fill_diagnostics = Diagnostics::new();
        for (field, column) in contract.fields.iter().zip(canonical.iter_mut()) {
            let outcome = FillPolicyEngine::apply(field, &mut column.values);
            if outcome.filled > 0 {
                debug!(field = %field.name, filled = outcome.filled, "filled missing values");
                tracker.fill(
                    &field.name,
                    format!("{}: {} missing values filled", field.fill_policy, outcome.filled),
                    outcome.filled,
                );
            }
            if !outcome.unfilled_rows.is_empty() {
                fill_diagnostics.push(
                    Severity::Error,
                    Finding::Unfilled {
                        field: field.name.clone(),
                        rows: outcome.unfilled_rows,
                    },
                );
            }
        }
        escalate(contract, &fill_diagnostics)?;
        check_cancelled(dataset_id, options, rows)?;

        if !options.strict {
            canonical.extend(resolution.unknown.iter().filter_map(|&i| slots[i].take()));
        }
        let table = NormalizedTable::from_columns(canonical)?;

        // Validation phase
        let diagnostics = validator.validate(contract, &table);
        escalate(contract, &diagnostics)?;

        let mut validation = ValidationReport::new();
        let mut tolerated = Vec::new();
        for finding in diagnostics.with_severity(Severity::Warning) {
            match finding {
                Finding::Rule(violation) => validation.add(violation.clone()),
                Finding::DuplicateKey(group) => tolerated.push(group.clone()),
                _ => {}
            }
        }

        let report = tracker.finish(
            contract,
            ContractHasher::hash(contract),
            rows,
            validation,
            tolerated,
        );

        info!(
            dataset_id,
            version = contract.version,
            rows,
            renamed = report.columns_renamed,
            cast = report.columns_cast,
            invalid = report.total_invalid_coerced,
            warnings = report.validation.violations.len(),
            "normalized table"
        );

        Ok((table, report))
    }
}

/// Checks that every named column is available in a table header.
///
/// Contract fields are resolved through their aliases; any other name must be
/// present verbatim. All missing names are reported together.
pub fn require_columns<S, N>(contract: &Contract, columns: &[S], names: &[N]) -> Result<()>
where
    S: AsRef<str>,
    N: AsRef<str>,
{
    let resolution = AliasResolver::new(contract).resolve(columns);
    let missing: Vec<String> = names
        .iter()
        .map(AsRef::as_ref)
        .filter(|name| match contract.field(name) {
            Some(_) => resolution.mapping(name).is_none(),
            None => !columns.iter().any(|c| c.as_ref() == *name),
        })
        .map(str::to_string)
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(NormalizeError::missing_fields(&contract.dataset_id, missing))
    }
}

fn check_cancelled(dataset_id: &str, options: &NormalizeOptions, processed: usize) -> Result<()> {
    match options.cancelled() {
        Some(reason) => {
            warn!(dataset_id, rows_processed = processed, reason = %reason, "normalization cancelled");
            Err(NormalizeError::cancelled(dataset_id, reason, processed))
        }
        None => Ok(()),
    }
}

/// Records a finding for every unclaimed raw column.
fn classify_unknown(raw: &RawTable, resolution: &mut Resolution, options: &NormalizeOptions) {
    let severity = match (options.strict, options.reject_unknown) {
        (false, _) => Severity::Info,
        (true, false) => Severity::Warning,
        (true, true) => Severity::Error,
    };
    for &position in &resolution.unknown {
        let column = raw.columns()[position].name.clone();
        debug!(column = %column, strict = options.strict, "column outside the contract");
        resolution
            .diagnostics
            .push(severity, Finding::UnknownColumn { column });
    }
}

fn finish_coercion(job: CoercionJob<'_>, tracker: &mut TransformationTracker) -> Column {
    let CoercionJob {
        field,
        source,
        coercer,
        out,
        ..
    } = job;
    let target = coercer.dtype();
    let retyped = source.dtype != Some(target);

    let invalid = out.invalid();
    if invalid > 0 {
        warn!(field = %field.name, invalid, "values could not be coerced");
        tracker.record_invalid(&field.name, invalid);
    }
    if retyped || out.converted > 0 {
        let affected = if retyped { out.non_null } else { out.converted };
        tracker.cast(
            &field.name,
            source.dtype,
            target,
            coercer.plan().strategy,
            affected,
            invalid,
        );
    }

    Column {
        name: field.name.clone(),
        dtype: Some(target),
        values: out.values,
    }
}

/// Turns error-severity findings into the call's error.
///
/// Findings are checked in phase order, so a table missing a required field
/// reports that before any later problem.
fn escalate(contract: &Contract, diagnostics: &Diagnostics) -> Result<()> {
    if !diagnostics.has_errors() {
        return Ok(());
    }
    let dataset_id = contract.dataset_id.clone();

    let missing: Vec<String> = diagnostics
        .errors()
        .filter_map(|f| match f {
            Finding::MissingRequired { field } => Some(field.clone()),
            _ => None,
        })
        .collect();
    if !missing.is_empty() {
        return Err(NormalizeError::missing_fields(dataset_id, missing));
    }

    let ambiguous: Vec<AmbiguousField> = diagnostics
        .errors()
        .filter_map(|f| match f {
            Finding::AmbiguousMatch { field, columns } => Some(AmbiguousField {
                field: field.clone(),
                columns: columns.clone(),
            }),
            _ => None,
        })
        .collect();
    if !ambiguous.is_empty() {
        return Err(NormalizeError::AliasAmbiguity {
            dataset_id,
            fields: ambiguous,
        });
    }

    let unknown: Vec<String> = diagnostics
        .errors()
        .filter_map(|f| match f {
            Finding::UnknownColumn { column } => Some(column.clone()),
            _ => None,
        })
        .collect();
    if !unknown.is_empty() {
        return Err(NormalizeError::UnknownColumns {
            dataset_id,
            columns: unknown,
        });
    }

    let unfilled: Vec<FillViolation> = diagnostics
        .errors()
        .filter_map(|f| match f {
            Finding::Unfilled { field, rows } => Some(FillViolation {
                field: field.clone(),
                count: rows.len(),
                rows: rows.clone(),
            }),
            _ => None,
        })
        .collect();
    if !unfilled.is_empty() {
        return Err(NormalizeError::FillPolicyViolation {
            dataset_id,
            violations: unfilled,
        });
    }

    let groups: Vec<_> = diagnostics
        .errors()
        .filter_map(|f| match f {
            Finding::DuplicateKey(group) => Some(group.clone()),
            _ => None,
        })
        .collect();
    if !groups.is_empty() {
        return Err(NormalizeError::DuplicateKey {
            dataset_id,
            key_fields: contract.primary_keys.clone(),
            groups,
        });
    }

    let violations: Vec<_> = diagnostics
        .errors()
        .filter_map(|f| match f {
            Finding::Rule(violation) => Some(violation.clone()),
            _ => None,
        })
        .collect();
    Err(NormalizeError::ValidationRuleViolation {
        dataset_id,
        violations,
    })
}
