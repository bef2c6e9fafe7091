//! # Schema Contracts Core
//!
//! Core data structures and types for schema-contract normalization.
//!
//! A schema contract is the versioned, declarative agreement between an
//! extraction query and the reconciliation logic downstream of it: which
//! canonical fields exist, which raw column names they may arrive under, what
//! type each one must have and how missing or suspicious values are treated.
//!
//! ## Key Concepts
//!
//! - **Contract**: one immutable version of a dataset's canonical schema
//! - **FieldSpec**: a canonical field with aliases, dtype and value rules
//! - **CoercionPlan**: the per-field conversion strategy, resolved up front
//! - **RawTable / NormalizedTable**: the untrusted input and the canonical output
//! - **TransformationReport**: the lineage log of one normalization call
//!
//! ## Example
//!
//! ```rust
//! use contracts_core::{
//!     ContractBuilder, ContractHasher, Dtype, FieldBuilder, SemanticTag, definition_violations,
//! };
//!
//! let contract = ContractBuilder::new("IPE_07", 1)
//!     .primary_key("customer_id")
//!     .field(
//!         FieldBuilder::new("customer_id", Dtype::String)
//!             .required(true)
//!             .alias("Customer No_")
//!             .semantic_tag(SemanticTag::Id)
//!             .build(),
//!     )
//!     .field(
//!         FieldBuilder::new("amount_lcy", Dtype::Float64)
//!             .required(true)
//!             .alias("rem_amt_LCY")
//!             .semantic_tag(SemanticTag::Amount)
//!             .build(),
//!     )
//!     .build();
//!
//! assert!(definition_violations(&contract).is_empty());
//! assert!(ContractHasher::hash(&contract).starts_with("sha256:"));
//! ```

pub mod builder;
pub mod coercion;
pub mod contract;
pub mod definition;
pub mod error;
pub mod hash;
pub mod report;
pub mod table;

pub use builder::*;
pub use coercion::*;
pub use contract::*;
pub use definition::*;
pub use error::*;
pub use hash::*;
pub use report::*;
pub use table::*;
