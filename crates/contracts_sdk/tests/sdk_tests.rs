//! Integration tests for directory-backed contracts and the public API.

use anyhow::Result;
use contracts_core::{ContractError, DataValue, RawTable};
use contracts_sdk::{
    ContractRegistry, DirectorySource, NormalizeError, RegistryConfig, SchemaContracts,
};
use pretty_assertions::assert_eq;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::thread;
use tempfile::TempDir;

const IPE_07_V1: &str = r#"
dataset_id: IPE_07
version: 1
description: Open customer ledger entries
source_system: navision
fields:
  - name: customer_id
    required: true
    aliases: ["Customer No_", "Customer No", "customer_no"]
    dtype: string
    semantic_tag: id
    reconciliation_critical: true
  - name: amount_lcy
    required: true
    aliases: ["rem_amt_LCY"]
    dtype: float64
    semantic_tag: amount
    fill_policy: fail_on_nan
    validation_rules: { allow_negative: true, max: 1.0e12 }
"#;

// Same contract: comments, blank lines and reordered keys.
const IPE_07_V1_REFORMATTED: &str = r#"
# Open items, reformatted by hand
version: 1
source_system: navision
dataset_id: IPE_07

fields:
  - dtype: string
    name: customer_id
    semantic_tag: id   # business key
    aliases:
      - "Customer No_"
      - "Customer No"
      - "customer_no"
    reconciliation_critical: true
    required: true

  - name: amount_lcy
    validation_rules:
      max: 1.0e12
      allow_negative: true
    fill_policy: fail_on_nan
    semantic_tag: amount
    dtype: float64
    aliases: ["rem_amt_LCY"]
    required: true
description: A different description does not change the hash
"#;

const IPE_07_V1_TOML: &str = r#"
dataset_id = "IPE_07"
version = 1
source_system = "navision"

[[fields]]
name = "customer_id"
required = true
aliases = ["Customer No_", "Customer No", "customer_no"]
dtype = "string"
semantic_tag = "id"
reconciliation_critical = true

[[fields]]
name = "amount_lcy"
required = true
aliases = ["rem_amt_LCY"]
dtype = "float64"
semantic_tag = "amount"
fill_policy = "fail_on_nan"

[fields.validation_rules]
allow_negative = true
max = 1.0e12
"#;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn write(dir: &Path, name: &str, content: &str) -> Result<()> {
    fs::write(dir.join(name), content)?;
    Ok(())
}

fn contracts_dir(files: &[(&str, &str)]) -> Result<TempDir> {
    let dir = tempfile::tempdir()?;
    for (name, content) in files {
        write(dir.path(), name, content)?;
    }
    Ok(dir)
}

#[test]
fn test_directory_discovery() -> Result<()> {
    init_tracing();
    let v2 = IPE_07_V1.replace("version: 1", "version: 2");
    let dir = contracts_dir(&[
        ("IPE_07.v1.yml", IPE_07_V1),
        ("IPE_07.v2.yaml", &v2),
        ("README.md", "not a contract"),
    ])?;
    let registry = ContractRegistry::new(DirectorySource::new(dir.path()));

    assert_eq!(registry.versions("IPE_07")?, vec![1, 2]);
    assert_eq!(registry.get_active("IPE_07")?.version, 2);
    assert_eq!(registry.versions("CR_03")?, Vec::<u32>::new());
    Ok(())
}

#[test]
fn test_missing_directory_means_no_contracts() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let registry = ContractRegistry::new(DirectorySource::new(dir.path().join("absent")));

    let err = registry.load("IPE_07", 1).unwrap_err();
    assert_eq!(err.to_string(), "Contract not found: IPE_07 v1");
    Ok(())
}

#[test]
fn test_hash_is_stable_across_formatting() -> Result<()> {
    let first = contracts_dir(&[("IPE_07.v1.yml", IPE_07_V1)])?;
    let second = contracts_dir(&[("IPE_07.v1.yml", IPE_07_V1_REFORMATTED)])?;
    let third = contracts_dir(&[("IPE_07.v1.toml", IPE_07_V1_TOML)])?;

    let hash = |dir: &TempDir| {
        ContractRegistry::new(DirectorySource::new(dir.path())).contract_hash("IPE_07", 1)
    };

    let expected = hash(&first)?;
    assert!(expected.starts_with("sha256:"));
    assert_eq!(hash(&second)?, expected);
    assert_eq!(hash(&third)?, expected);
    Ok(())
}

#[test]
fn test_semantic_change_changes_hash() -> Result<()> {
    let changed = IPE_07_V1.replace("max: 1.0e12", "max: 1.0e9");
    let first = contracts_dir(&[("IPE_07.v1.yml", IPE_07_V1)])?;
    let second = contracts_dir(&[("IPE_07.v1.yml", &changed)])?;

    let a = ContractRegistry::new(DirectorySource::new(first.path())).contract_hash("IPE_07", 1)?;
    let b = ContractRegistry::new(DirectorySource::new(second.path())).contract_hash("IPE_07", 1)?;
    assert_ne!(a, b);
    Ok(())
}

#[test]
fn test_default_validation_rules_do_not_change_hash() -> Result<()> {
    let plain = IPE_07_V1.replace("    validation_rules: { allow_negative: true, max: 1.0e12 }\n", "");
    let empty = format!("{plain}    validation_rules: {{}}\n");
    let spelled_out = format!("{plain}    validation_rules: {{ allow_negative: true }}\n");

    let hash = |content: &str| -> Result<String> {
        let dir = contracts_dir(&[("IPE_07.v1.yml", content)])?;
        Ok(ContractRegistry::new(DirectorySource::new(dir.path())).contract_hash("IPE_07", 1)?)
    };

    let expected = hash(&plain)?;
    assert_eq!(hash(&empty)?, expected);
    assert_eq!(hash(&spelled_out)?, expected);
    assert_ne!(hash(IPE_07_V1)?, expected);
    Ok(())
}

#[test]
fn test_active_contract_survives_file_removal() -> Result<()> {
    let dir = contracts_dir(&[("IPE_07.v1.yml", IPE_07_V1)])?;
    let registry = ContractRegistry::new(DirectorySource::new(dir.path()));
    let first = registry.get_active("IPE_07")?;

    fs::remove_file(dir.path().join("IPE_07.v1.yml"))?;
    let again = registry.get_active("IPE_07")?;
    assert!(Arc::ptr_eq(&first, &again));

    registry.reload();
    assert!(registry.get_active("IPE_07").is_err());
    Ok(())
}

#[test]
fn test_concurrent_loads_share_one_instance() -> Result<()> {
    let dir = contracts_dir(&[("IPE_07.v1.yml", IPE_07_V1)])?;
    let registry = ContractRegistry::new(DirectorySource::new(dir.path()));

    let loaded: Vec<_> = thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|_| scope.spawn(|| registry.load("IPE_07", 1)))
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().expect("loader thread panicked"))
            .collect::<Result<Vec<_>, ContractError>>()
    })?;

    let first = &loaded[0];
    assert!(loaded.iter().all(|c| Arc::ptr_eq(c, first)));
    assert_eq!(registry.cached(), 1);
    Ok(())
}

#[test]
fn test_pins_from_config() -> Result<()> {
    let v2 = IPE_07_V1.replace("version: 1", "version: 2");
    let dir = contracts_dir(&[("IPE_07.v1.yml", IPE_07_V1), ("IPE_07.v2.yml", &v2)])?;
    let config = RegistryConfig::from_vars([
        ("SCHEMA_CONTRACTS_DIR", dir.path().to_string_lossy().into_owned()),
        ("SCHEMA_CONTRACT_VERSION_IPE_07", "1".to_string()),
    ])?;

    let contracts = SchemaContracts::from_config(&config);
    assert_eq!(contracts.get_active_contract("IPE_07")?.version, 1);
    Ok(())
}

#[test]
fn test_invalid_definition_blocks_the_dataset() -> Result<()> {
    let broken = IPE_07_V1.replace("dtype: float64", "dtype: money");
    let dir = contracts_dir(&[("IPE_07.v1.yml", &broken)])?;
    let contracts = SchemaContracts::from_config(&RegistryConfig::new(dir.path()));

    let raw = RawTable::from_rows(&["Customer No_", "rem_amt_LCY"], vec![vec!["1", "2"]])?;
    let err = contracts
        .apply_schema_contract(raw, "IPE_07", false, true, true)
        .unwrap_err();

    match err {
        NormalizeError::Contract(ContractError::Parse(parse)) => {
            assert!(parse.origin.ends_with("IPE_07.v1.yml"));
        }
        other => panic!("unexpected error: {other}"),
    }
    Ok(())
}

#[test]
fn test_apply_and_require_columns() -> Result<()> {
    let dir = contracts_dir(&[("IPE_07.v1.yml", IPE_07_V1)])?;
    let contracts = SchemaContracts::from_config(&RegistryConfig::new(dir.path()));
    let raw = RawTable::from_rows(
        &["Customer No_", "rem_amt_LCY", "Posting Date"],
        vec![vec!["00123", "1,500.00", "2024-01-31"]],
    )?;

    contracts.require_columns(&raw, "IPE_07", &["customer_id", "amount_lcy", "Posting Date"])?;
    let err = contracts
        .require_columns(&raw, "IPE_07", &["customer_id", "Due Date", "Currency"])
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "Missing required fields for IPE_07: Due Date, Currency"
    );

    let (table, report) = contracts.apply_schema_contract(raw, "IPE_07", true, true, true)?;
    assert_eq!(table.column_names(), vec!["customer_id", "amount_lcy"]);
    assert_eq!(table.value("amount_lcy", 0), Some(&DataValue::Float(1500.0)));
    assert_eq!(report.contract_hash, contracts.contract_hash("IPE_07", 1)?);
    Ok(())
}

// The only test touching the process-wide instance, so no other test races it.
#[test]
fn test_global_instance() -> Result<()> {
    let dir = contracts_dir(&[("IPE_07.v1.yml", IPE_07_V1)])?;
    contracts_sdk::init_global(SchemaContracts::from_config(&RegistryConfig::new(dir.path())));

    let contract = contracts_sdk::get_active_contract("IPE_07")?;
    assert!(Arc::ptr_eq(&contract, &contracts_sdk::load_contract("IPE_07", 1)?));

    let raw = RawTable::from_rows(&["customer_no", "rem_amt_LCY"], vec![vec!["7", "1"]])?;
    let (table, _) = contracts_sdk::apply_schema_contract(raw, "IPE_07", false, true, false)?;
    assert_eq!(table.value("customer_id", 0), Some(&DataValue::from("7")));

    contracts_sdk::reset_global();
    Ok(())
}
