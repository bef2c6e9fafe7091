//! Process-wide default instance.
//!
//! Created lazily from the environment on first use and shared read-mostly
//! afterwards. Nothing invalidates it implicitly; tests replace or reset it
//! explicitly.

use crate::SchemaContracts;
use parking_lot::RwLock;
use std::sync::{Arc, LazyLock};
use tracing::{info, warn};

static GLOBAL: LazyLock<RwLock<Option<Arc<SchemaContracts>>>> =
    LazyLock::new(|| RwLock::new(None));

/// Returns the default instance, creating it from the environment if needed.
///
/// An invalid environment configuration is logged and replaced by the
/// defaults.
pub fn global() -> Arc<SchemaContracts> {
    if let Some(contracts) = GLOBAL.read().as_ref() {
        return Arc::clone(contracts);
    }

    let mut slot = GLOBAL.write();
    let contracts = slot.get_or_insert_with(|| {
        let contracts = SchemaContracts::from_env().unwrap_or_else(|e| {
            warn!(error = %e, "invalid schema contract configuration, using defaults");
            SchemaContracts::default()
        });
        info!("schema contracts initialized from environment");
        Arc::new(contracts)
    });
    Arc::clone(contracts)
}

/// Installs a default instance, replacing any existing one.
pub fn init_global(contracts: SchemaContracts) -> Arc<SchemaContracts> {
    let contracts = Arc::new(contracts);
    *GLOBAL.write() = Some(Arc::clone(&contracts));
    contracts
}

/// Forgets the default instance. The next access rebuilds it.
pub fn reset_global() {
    *GLOBAL.write() = None;
}
