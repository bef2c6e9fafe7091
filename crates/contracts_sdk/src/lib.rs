//! # Schema Contracts SDK
//!
//! Public entry points for loading contracts and normalizing raw extracts.
//!
//! Every operation is available on a [`SchemaContracts`] instance and as a
//! free function over the process-wide default instance, which is configured
//! from the environment (see [`RegistryConfig`]).
//!
//! ## Example
//!
//! ```rust
//! use contracts_core::RawTable;
//! use contracts_sdk::{ContractRegistry, InMemorySource, SchemaContracts};
//!
//! let source = InMemorySource::new().with_yaml(
//!     "IPE_07",
//!     1,
//!     r#"
//! dataset_id: IPE_07
//! version: 1
//! fields:
//!   - name: customer_id
//!     required: true
//!     aliases: ["Customer No_"]
//!     dtype: string
//!     semantic_tag: id
//! "#,
//! );
//! let contracts = SchemaContracts::new(ContractRegistry::new(source));
//!
//! let raw = RawTable::from_rows(&["Customer No_"], vec![vec![" 00123 "]]).unwrap();
//! let (table, report) = contracts
//!     .apply_schema_contract(raw, "IPE_07", false, true, true)
//!     .unwrap();
//!
//! assert_eq!(table.column_names(), vec!["customer_id"]);
//! assert_eq!(report.columns_renamed, 1);
//! ```

mod config;
mod global;
mod registry;

pub use config::*;
pub use global::*;
pub use registry::*;

use contracts_core::{Contract, NormalizedTable, RawTable, TransformationReport};
use contracts_engine::{NormalizeOptions, Normalizer};
use std::sync::Arc;

pub use contracts_core::ContractError;
pub use contracts_engine::NormalizeError;

/// Contract registry plus the normalization entry points.
#[derive(Debug)]
pub struct SchemaContracts {
    registry: ContractRegistry,
}

impl Default for SchemaContracts {
    fn default() -> Self {
        Self::from_config(&RegistryConfig::default())
    }
}

impl SchemaContracts {
    /// Wraps an existing registry.
    pub fn new(registry: ContractRegistry) -> Self {
        Self { registry }
    }

    /// Builds a directory-backed instance from a configuration.
    pub fn from_config(config: &RegistryConfig) -> Self {
        let registry = ContractRegistry::new(DirectorySource::new(&config.contracts_dir))
            .with_pins(config.version_pins.clone());
        Self { registry }
    }

    /// Builds an instance from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self::from_config(&RegistryConfig::from_env()?))
    }

    /// The underlying registry.
    pub fn registry(&self) -> &ContractRegistry {
        &self.registry
    }

    /// Loads one version of a dataset's contract.
    pub fn load_contract(
        &self,
        dataset_id: &str,
        version: u32,
    ) -> Result<Arc<Contract>, ContractError> {
        self.registry.load(dataset_id, version)
    }

    /// Resolves the contract in force for a dataset.
    pub fn get_active_contract(&self, dataset_id: &str) -> Result<Arc<Contract>, ContractError> {
        self.registry.get_active(dataset_id)
    }

    /// Normalizes a raw extract with the dataset's active contract.
    pub fn apply_schema_contract(
        &self,
        raw: RawTable,
        dataset_id: &str,
        strict: bool,
        cast: bool,
        track: bool,
    ) -> Result<(NormalizedTable, TransformationReport), NormalizeError> {
        let options = NormalizeOptions::new()
            .with_strict(strict)
            .with_cast(cast)
            .with_track(track);
        self.apply_schema_contract_with(raw, dataset_id, &options)
    }

    /// Normalizes a raw extract with full control over the options.
    pub fn apply_schema_contract_with(
        &self,
        raw: RawTable,
        dataset_id: &str,
        options: &NormalizeOptions,
    ) -> Result<(NormalizedTable, TransformationReport), NormalizeError> {
        let contract = self.registry.get_active(dataset_id)?;
        Normalizer::apply(&contract, raw, options)
    }

    /// Checks that a table carries every named column.
    ///
    /// Contract fields resolve through their aliases; other names must be
    /// present verbatim.
    pub fn require_columns<N: AsRef<str>>(
        &self,
        table: &RawTable,
        dataset_id: &str,
        column_names: &[N],
    ) -> Result<(), NormalizeError> {
        let contract = self.registry.get_active(dataset_id)?;
        contracts_engine::require_columns(&contract, &table.column_names(), column_names)
    }

    /// Content hash of one contract version.
    pub fn contract_hash(&self, dataset_id: &str, version: u32) -> Result<String, ContractError> {
        self.registry.contract_hash(dataset_id, version)
    }
}

/// Loads one version of a dataset's contract from the default instance.
pub fn load_contract(dataset_id: &str, version: u32) -> Result<Arc<Contract>, ContractError> {
    global().load_contract(dataset_id, version)
}

/// Resolves the active contract of a dataset from the default instance.
pub fn get_active_contract(dataset_id: &str) -> Result<Arc<Contract>, ContractError> {
    global().get_active_contract(dataset_id)
}

/// Normalizes a raw extract with the default instance.
pub fn apply_schema_contract(
    raw: RawTable,
    dataset_id: &str,
    strict: bool,
    cast: bool,
    track: bool,
) -> Result<(NormalizedTable, TransformationReport), NormalizeError> {
    global().apply_schema_contract(raw, dataset_id, strict, cast, track)
}

/// Normalizes a raw extract with the default instance and explicit options.
pub fn apply_schema_contract_with(
    raw: RawTable,
    dataset_id: &str,
    options: &NormalizeOptions,
) -> Result<(NormalizedTable, TransformationReport), NormalizeError> {
    global().apply_schema_contract_with(raw, dataset_id, options)
}

/// Checks that a table carries every named column, using the default instance.
pub fn require_columns<N: AsRef<str>>(
    table: &RawTable,
    dataset_id: &str,
    column_names: &[N],
) -> Result<(), NormalizeError> {
    global().require_columns(table, dataset_id, column_names)
}

/// Content hash of one contract version, using the default instance.
pub fn contract_hash(dataset_id: &str, version: u32) -> Result<String, ContractError> {
    global().contract_hash(dataset_id, version)
}
