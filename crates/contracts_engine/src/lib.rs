//! # Schema Contracts Engine
//!
//! Applies a schema contract to a raw extract and produces the canonical
//! table plus a lineage report. A call runs four phases:
//!
//! - Alias resolution (raw column names to canonical fields)
//! - Type coercion (per-field strategy, chunked, cancellable)
//! - Fill policies (missing-value handling)
//! - Validation (value rules and business-key uniqueness)
//!
//! ## Example
//!
//! ```rust
//! use contracts_core::{Column, ContractBuilder, DataValue, Dtype, FieldBuilder, RawTable, SemanticTag};
//! use contracts_engine::{NormalizeOptions, Normalizer};
//!
//! let contract = ContractBuilder::new("IPE_07", 1)
//!     .field(
//!         FieldBuilder::new("amount_lcy", Dtype::Float64)
//!             .required(true)
//!             .alias("rem_amt_LCY")
//!             .semantic_tag(SemanticTag::Amount)
//!             .build(),
//!     )
//!     .build();
//!
//! let raw = RawTable::new(vec![Column::untyped("rem_amt_LCY", ["1,500.00", "N/A"])]).unwrap();
//! let (table, report) = Normalizer::apply(&contract, raw, &NormalizeOptions::new()).unwrap();
//!
//! assert_eq!(table.value("amount_lcy", 0), Some(&DataValue::Float(1500.0)));
//! assert_eq!(report.total_invalid_coerced, 1);
//! ```

mod alias;
mod cancel;
mod coercion;
mod diagnostics;
mod error;
mod fill;
mod normalize;
mod options;
mod tracker;
mod validate;

pub use alias::*;
pub use cancel::*;
pub use coercion::*;
pub use diagnostics::*;
pub use error::*;
pub use fill::*;
pub use normalize::*;
pub use options::*;
pub use tracker::*;
pub use validate::*;
