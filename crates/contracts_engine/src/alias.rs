//! Alias resolution: raw column names to canonical fields.
//!
//! For each field, in declared order, candidate names are tried highest
//! priority first. Each candidate is matched exactly, then ignoring case, then
//! ignoring case and surrounding whitespace. Every other raw column matching
//! the chosen candidate at any tier is a duplicate header. A raw column can be
//! claimed by one field only; earlier fields win.

use crate::diagnostics::{Diagnostics, Finding, Severity};
use contracts_core::{Contract, FieldSpec};
use std::collections::HashSet;
use tracing::{debug, warn};

/// Which raw column wins when several match the same field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AliasPrecedence {
    /// Alias declaration order first, raw column order among equals
    #[default]
    AliasOrder,
    /// First raw column, in table order, that matches any alias
    ColumnOrder,
}

/// How closely a raw column name matched an alias.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum MatchTier {
    /// Byte-for-byte equal
    Exact,
    /// Equal ignoring case
    CaseInsensitive,
    /// Equal ignoring case and surrounding whitespace
    Trimmed,
}

impl MatchTier {
    const ALL: [MatchTier; 3] = [
        MatchTier::Exact,
        MatchTier::CaseInsensitive,
        MatchTier::Trimmed,
    ];

    /// Short name used in lineage events.
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchTier::Exact => "exact",
            MatchTier::CaseInsensitive => "case-insensitive",
            MatchTier::Trimmed => "trimmed",
        }
    }
}

/// A raw column resolved to a canonical field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldMapping {
    /// Canonical field name
    pub field: String,
    /// Position of the raw column in the table
    pub column: usize,
    /// Raw column name as delivered
    pub raw_name: String,
    /// Candidate name that matched
    pub alias: String,
    /// Matching tier
    pub tier: MatchTier,
}

impl FieldMapping {
    /// Returns true if the raw name differs from the canonical one.
    pub fn is_rename(&self) -> bool {
        self.raw_name != self.field
    }
}

/// Extra raw columns that tied with the kept one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateMatch {
    /// Canonical field
    pub field: String,
    /// Kept column position
    pub kept: usize,
    /// Dropped column positions, in table order
    pub dropped: Vec<usize>,
    /// Whether the field is reconciliation-critical
    pub critical: bool,
}

/// Outcome of resolving one table header.
#[derive(Debug, Clone, Default)]
pub struct Resolution {
    /// Matched fields, in contract order
    pub mappings: Vec<FieldMapping>,
    /// Optional fields with no matching column, in contract order
    pub absent: Vec<String>,
    /// Duplicate headers, in contract order
    pub duplicates: Vec<DuplicateMatch>,
    /// Positions of raw columns no field claimed, in table order
    pub unknown: Vec<usize>,
    /// Missing required fields and ambiguities
    pub diagnostics: Diagnostics,
}

impl Resolution {
    /// Returns the mapping of a canonical field.
    pub fn mapping(&self, field: &str) -> Option<&FieldMapping> {
        self.mappings.iter().find(|m| m.field == field)
    }
}

/// A name prepared for all three matching tiers.
struct Name<'a> {
    raw: &'a str,
    folded: String,
    trimmed: String,
}

impl<'a> Name<'a> {
    fn new(raw: &'a str) -> Self {
        Self {
            raw,
            folded: raw.to_lowercase(),
            trimmed: raw.trim().to_lowercase(),
        }
    }

    fn matches(&self, other: &Name<'_>, tier: MatchTier) -> bool {
        match tier {
            MatchTier::Exact => self.raw == other.raw,
            MatchTier::CaseInsensitive => self.folded == other.folded,
            MatchTier::Trimmed => self.trimmed == other.trimmed,
        }
    }
}

/// Maps raw column names onto the canonical fields of a contract.
///
/// # Example
///
/// ```rust
/// use contracts_core::{ContractBuilder, Dtype, FieldBuilder};
/// use contracts_engine::AliasResolver;
///
/// let contract = ContractBuilder::new("IPE_07", 1)
///     .field(
///         FieldBuilder::new("customer_id", Dtype::String)
///             .required(true)
///             .aliases(vec!["Customer No_".into(), "customer_no".into()])
///             .build(),
///     )
///     .build();
///
/// let resolution = AliasResolver::new(&contract).resolve(&["customer_no", "Remarks"]);
/// assert_eq!(resolution.mapping("customer_id").map(|m| m.column), Some(0));
/// assert_eq!(resolution.unknown, vec![1]);
/// ```
pub struct AliasResolver<'a> {
    contract: &'a Contract,
    precedence: AliasPrecedence,
}

impl<'a> AliasResolver<'a> {
    /// Creates a resolver with the default precedence.
    pub fn new(contract: &'a Contract) -> Self {
        Self {
            contract,
            precedence: AliasPrecedence::default(),
        }
    }

    /// Sets the precedence between tied raw columns.
    pub fn with_precedence(mut self, precedence: AliasPrecedence) -> Self {
        self.precedence = precedence;
        self
    }

    /// Resolves a header.
    pub fn resolve<S: AsRef<str>>(&self, columns: &[S]) -> Resolution {
        let headers: Vec<Name<'_>> = columns.iter().map(|c| Name::new(c.as_ref())).collect();

        let mut claimed: HashSet<usize> = HashSet::new();
        let mut resolution = Resolution::default();

        for field in &self.contract.fields {
            let candidates: Vec<Name<'_>> = field
                .candidate_names()
                .into_iter()
                .map(Name::new)
                .collect();

            let matched = match self.precedence {
                AliasPrecedence::AliasOrder => best_by_alias(&headers, &candidates, &claimed),
                AliasPrecedence::ColumnOrder => best_by_column(&headers, &candidates, &claimed),
            };

            let Some(matched) = matched else {
                if field.required {
                    debug!(field = %field.name, "required field has no matching column");
                    resolution.diagnostics.push(
                        Severity::Error,
                        Finding::MissingRequired {
                            field: field.name.clone(),
                        },
                    );
                } else {
                    resolution.absent.push(field.name.clone());
                }
                continue;
            };

            claimed.insert(matched.kept);
            claimed.extend(matched.dropped.iter().copied());

            if !matched.dropped.is_empty() {
                self.record_duplicate(field, &matched, &headers, &mut resolution);
            }

            let alias = candidates[matched.alias].raw.to_string();
            debug!(
                field = %field.name,
                column = headers[matched.kept].raw,
                alias = %alias,
                tier = matched.tier.as_str(),
                "resolved field"
            );
            resolution.mappings.push(FieldMapping {
                field: field.name.clone(),
                column: matched.kept,
                raw_name: headers[matched.kept].raw.to_string(),
                alias,
                tier: matched.tier,
            });
        }

        resolution.unknown = (0..headers.len()).filter(|i| !claimed.contains(i)).collect();
        resolution
    }

    fn record_duplicate(
        &self,
        field: &FieldSpec,
        matched: &Match,
        headers: &[Name<'_>],
        resolution: &mut Resolution,
    ) {
        let columns: Vec<String> = std::iter::once(matched.kept)
            .chain(matched.dropped.iter().copied())
            .map(|i| headers[i].raw.to_string())
            .collect();
        let severity = if field.reconciliation_critical {
            Severity::Error
        } else {
            Severity::Warning
        };
        warn!(
            field = %field.name,
            columns = ?columns,
            critical = field.reconciliation_critical,
            "several raw columns match the same field"
        );
        resolution.diagnostics.push(
            severity,
            Finding::AmbiguousMatch {
                field: field.name.clone(),
                columns,
            },
        );
        resolution.duplicates.push(DuplicateMatch {
            field: field.name.clone(),
            kept: matched.kept,
            dropped: matched.dropped.clone(),
            critical: field.reconciliation_critical,
        });
    }
}

struct Match {
    alias: usize,
    tier: MatchTier,
    kept: usize,
    dropped: Vec<usize>,
}

fn matching_columns(
    headers: &[Name<'_>],
    candidate: &Name<'_>,
    tier: MatchTier,
    claimed: &HashSet<usize>,
) -> Vec<usize> {
    headers
        .iter()
        .enumerate()
        .filter(|(i, h)| !claimed.contains(i) && h.matches(candidate, tier))
        .map(|(i, _)| i)
        .collect()
}

/// Columns besides `kept` that match the candidate at any tier.
fn duplicates_of(
    headers: &[Name<'_>],
    candidate: &Name<'_>,
    kept: usize,
    claimed: &HashSet<usize>,
) -> Vec<usize> {
    // Exact and case-insensitive matches are also trimmed matches.
    matching_columns(headers, candidate, MatchTier::Trimmed, claimed)
        .into_iter()
        .filter(|i| *i != kept)
        .collect()
}

fn best_by_alias(
    headers: &[Name<'_>],
    candidates: &[Name<'_>],
    claimed: &HashSet<usize>,
) -> Option<Match> {
    for (alias, candidate) in candidates.iter().enumerate() {
        for tier in MatchTier::ALL {
            let Some(kept) = matching_columns(headers, candidate, tier, claimed)
                .first()
                .copied()
            else {
                continue;
            };
            return Some(Match {
                alias,
                tier,
                kept,
                dropped: duplicates_of(headers, candidate, kept, claimed),
            });
        }
    }
    None
}

fn best_by_column(
    headers: &[Name<'_>],
    candidates: &[Name<'_>],
    claimed: &HashSet<usize>,
) -> Option<Match> {
    for (column, header) in headers.iter().enumerate() {
        if claimed.contains(&column) {
            continue;
        }
        for (alias, candidate) in candidates.iter().enumerate() {
            let Some(tier) = MatchTier::ALL
                .into_iter()
                .find(|tier| header.matches(candidate, *tier))
            else {
                continue;
            };
            return Some(Match {
                alias,
                tier,
                kept: column,
                dropped: duplicates_of(headers, candidate, column, claimed),
            });
        }
    }
    None
}
