//! Contract discovery and caching.
//!
//! Definitions are found by naming convention rather than registered in
//! code: `<dataset_id>.v<version>.{yml,yaml,toml}`. Each (dataset, version)
//! is parsed once and shared as an `Arc<Contract>` until it is invalidated.
//! The version listing of each dataset is cached the same way, so documents
//! added or removed later are only seen after `invalidate` or `reload`.

use contracts_core::{
    Contract, ContractError, ContractHasher, ContractParseError, ParseViolation, Result,
};
use contracts_parser::{ContractFormat, detect_format, parse_str};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, info};

/// A contract document as read from its source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractText {
    /// Document body
    pub content: String,
    /// Document syntax
    pub format: ContractFormat,
    /// Where the document came from, for error messages
    pub origin: String,
}

/// Somewhere contract documents can be discovered and read.
pub trait ContractSource: Send + Sync {
    /// Versions available for a dataset, ascending.
    ///
    /// A version listed twice means two documents claim it.
    fn versions(&self, dataset_id: &str) -> Result<Vec<u32>>;

    /// Reads the document of one version.
    fn read(&self, dataset_id: &str, version: u32) -> Result<ContractText>;
}

/// Discovers contract documents in a directory.
#[derive(Debug, Clone)]
pub struct DirectorySource {
    dir: PathBuf,
}

impl DirectorySource {
    /// Creates a source over a directory. The directory is read lazily.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// The directory this source reads from.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Documents of a dataset, sorted by version then file name.
    fn documents(&self, dataset_id: &str) -> Result<Vec<(u32, PathBuf)>> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(dir = %self.dir.display(), "contracts directory does not exist");
                return Ok(Vec::new());
            }
            Err(source) => {
                return Err(ContractError::Io {
                    path: self.dir.clone(),
                    source,
                });
            }
        };

        let mut documents = Vec::new();
        for entry in entries {
            let path = entry
                .map_err(|source| ContractError::Io {
                    path: self.dir.clone(),
                    source,
                })?
                .path();
            if let Some((id, version)) = parse_file_name(&path) {
                if id == dataset_id {
                    documents.push((version, path));
                }
            }
        }
        documents.sort();
        debug!(dataset_id, found = documents.len(), "discovered contract documents");
        Ok(documents)
    }
}

/// Splits `IPE_07.v2.yml` into `("IPE_07", 2)`.
fn parse_file_name(path: &Path) -> Option<(String, u32)> {
    if !path.is_file() || detect_format(path).is_err() {
        return None;
    }
    let stem = path.file_stem()?.to_str()?;
    let (id, version) = stem.rsplit_once(".v")?;
    if id.is_empty() {
        return None;
    }
    Some((id.to_string(), version.parse().ok()?))
}

impl ContractSource for DirectorySource {
    fn versions(&self, dataset_id: &str) -> Result<Vec<u32>> {
        Ok(self
            .documents(dataset_id)?
            .into_iter()
            .map(|(version, _)| version)
            .collect())
    }

    fn read(&self, dataset_id: &str, version: u32) -> Result<ContractText> {
        let path = self
            .documents(dataset_id)?
            .into_iter()
            .find(|(v, _)| *v == version)
            .map(|(_, path)| path)
            .ok_or_else(|| ContractError::not_found(dataset_id, version))?;

        let content = fs::read_to_string(&path).map_err(|source| ContractError::Io {
            path: path.clone(),
            source,
        })?;
        let format = detect_format(&path).unwrap_or(ContractFormat::Yaml);

        Ok(ContractText {
            content,
            format,
            origin: path.display().to_string(),
        })
    }
}

/// Contract documents held in memory, for tests and embedded contracts.
#[derive(Debug, Default)]
pub struct InMemorySource {
    documents: RwLock<Vec<(String, u32, ContractText)>>,
    reads: AtomicUsize,
}

impl InMemorySource {
    /// Creates an empty source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a document.
    pub fn insert(
        &self,
        dataset_id: impl Into<String>,
        version: u32,
        content: impl Into<String>,
        format: ContractFormat,
    ) {
        let dataset_id = dataset_id.into();
        let origin = format!("memory:{dataset_id}.v{version}");
        self.documents.write().push((
            dataset_id,
            version,
            ContractText {
                content: content.into(),
                format,
                origin,
            },
        ));
    }

    /// Adds a YAML document.
    pub fn with_yaml(
        self,
        dataset_id: impl Into<String>,
        version: u32,
        content: impl Into<String>,
    ) -> Self {
        self.insert(dataset_id, version, content, ContractFormat::Yaml);
        self
    }

    /// Adds a TOML document.
    pub fn with_toml(
        self,
        dataset_id: impl Into<String>,
        version: u32,
        content: impl Into<String>,
    ) -> Self {
        self.insert(dataset_id, version, content, ContractFormat::Toml);
        self
    }

    /// Number of documents handed out so far.
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

impl ContractSource for InMemorySource {
    fn versions(&self, dataset_id: &str) -> Result<Vec<u32>> {
        let mut versions: Vec<u32> = self
            .documents
            .read()
            .iter()
            .filter(|(id, _, _)| id == dataset_id)
            .map(|(_, v, _)| *v)
            .collect();
        versions.sort_unstable();
        Ok(versions)
    }

    fn read(&self, dataset_id: &str, version: u32) -> Result<ContractText> {
        let text = self
            .documents
            .read()
            .iter()
            .find(|(id, v, _)| id == dataset_id && *v == version)
            .map(|(_, _, text)| text.clone())
            .ok_or_else(|| ContractError::not_found(dataset_id, version))?;
        self.reads.fetch_add(1, Ordering::SeqCst);
        Ok(text)
    }
}

impl<S: ContractSource + ?Sized> ContractSource for Arc<S> {
    fn versions(&self, dataset_id: &str) -> Result<Vec<u32>> {
        (**self).versions(dataset_id)
    }

    fn read(&self, dataset_id: &str, version: u32) -> Result<ContractText> {
        (**self).read(dataset_id, version)
    }
}

type CacheKey = (String, u32);

/// Versioned contract store with a read-mostly cache.
///
/// # Example
///
/// ```rust
/// use contracts_sdk::{ContractRegistry, InMemorySource};
///
/// let source = InMemorySource::new().with_yaml(
///     "IPE_07",
///     1,
///     r#"
/// dataset_id: IPE_07
/// version: 1
/// fields:
///   - name: customer_id
///     dtype: string
/// "#,
/// );
/// let registry = ContractRegistry::new(source);
///
/// let contract = registry.get_active("IPE_07").unwrap();
/// assert_eq!(contract.version, 1);
/// ```
pub struct ContractRegistry {
    source: Box<dyn ContractSource>,
    pins: BTreeMap<String, u32>,
    cache: RwLock<HashMap<CacheKey, Arc<Contract>>>,
    listings: RwLock<HashMap<String, Arc<[u32]>>>,
}

impl std::fmt::Debug for ContractRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContractRegistry")
            .field("pins", &self.pins)
            .field("cached", &self.cache.read().len())
            .field("listed", &self.listings.read().len())
            .finish_non_exhaustive()
    }
}

impl ContractRegistry {
    /// Creates a registry over a source, without version pins.
    pub fn new(source: impl ContractSource + 'static) -> Self {
        Self {
            source: Box::new(source),
            pins: BTreeMap::new(),
            cache: RwLock::new(HashMap::new()),
            listings: RwLock::new(HashMap::new()),
        }
    }

    /// Replaces the version pins.
    pub fn with_pins(mut self, pins: BTreeMap<String, u32>) -> Self {
        self.pins = pins;
        self
    }

    /// Pins one dataset to a version.
    pub fn with_pin(mut self, dataset_id: impl Into<String>, version: u32) -> Self {
        self.pins.insert(dataset_id.into(), version);
        self
    }

    /// Returns the pinned version of a dataset.
    pub fn pin(&self, dataset_id: &str) -> Option<u32> {
        self.pins.get(dataset_id).copied()
    }

    /// Loads one version of a dataset's contract.
    ///
    /// A cache hit never touches the source. On a miss the document is read
    /// and parsed without holding any lock; if several callers race, the first
    /// to publish wins and everyone gets that instance.
    pub fn load(&self, dataset_id: &str, version: u32) -> Result<Arc<Contract>> {
        let key = (dataset_id.to_string(), version);
        if let Some(contract) = self.cache.read().get(&key) {
            debug!(dataset_id, version, "contract cache hit");
            return Ok(Arc::clone(contract));
        }

        let versions = self.listing(dataset_id)?;
        let claims = versions.iter().filter(|v| **v == version).count();
        if claims == 0 {
            return Err(ContractError::not_found(dataset_id, version));
        }

        let text = self.source.read(dataset_id, version)?;
        let contract = parse_checked(dataset_id, version, claims, &text)?;

        let mut cache = self.cache.write();
        let published = Arc::clone(cache.entry(key).or_insert_with(|| Arc::new(contract)));
        info!(
            dataset_id,
            version,
            origin = %text.origin,
            fields = published.fields.len(),
            "contract loaded"
        );
        Ok(published)
    }

    /// Resolves the contract in force for a dataset.
    ///
    /// A version pin wins, even over a deprecated version. Otherwise the
    /// highest non-deprecated version is used.
    pub fn get_active(&self, dataset_id: &str) -> Result<Arc<Contract>> {
        if let Some(version) = self.pin(dataset_id) {
            debug!(dataset_id, version, "using pinned contract version");
            return self.load(dataset_id, version);
        }

        let mut versions = self.versions(dataset_id)?;
        versions.reverse();
        for version in versions {
            let contract = self.load(dataset_id, version)?;
            if contract.deprecated {
                debug!(dataset_id, version, "skipping deprecated contract version");
                continue;
            }
            return Ok(contract);
        }

        Err(ContractError::no_active(dataset_id))
    }

    /// Available versions of a dataset, ascending and without repeats.
    pub fn versions(&self, dataset_id: &str) -> Result<Vec<u32>> {
        let mut versions = self.listing(dataset_id)?.to_vec();
        versions.dedup();
        Ok(versions)
    }

    /// The source's version listing for a dataset, sorted, repeats kept.
    ///
    /// Listed once per dataset; later calls are answered from the cache.
    fn listing(&self, dataset_id: &str) -> Result<Arc<[u32]>> {
        if let Some(versions) = self.listings.read().get(dataset_id) {
            return Ok(Arc::clone(versions));
        }

        let mut versions = self.source.versions(dataset_id)?;
        versions.sort_unstable();
        let mut listings = self.listings.write();
        let published = listings
            .entry(dataset_id.to_string())
            .or_insert_with(|| versions.into());
        Ok(Arc::clone(published))
    }

    /// Content hash of one contract version.
    pub fn contract_hash(&self, dataset_id: &str, version: u32) -> Result<String> {
        let contract = self.load(dataset_id, version)?;
        Ok(ContractHasher::hash(&contract))
    }

    /// Drops every cached version of a dataset, and its version listing.
    pub fn invalidate(&self, dataset_id: &str) {
        let mut cache = self.cache.write();
        let before = cache.len();
        cache.retain(|(id, _), _| id != dataset_id);
        self.listings.write().remove(dataset_id);
        info!(dataset_id, evicted = before - cache.len(), "contract cache invalidated");
    }

    /// Drops the whole cache; contracts are listed and read again on next use.
    pub fn reload(&self) {
        let mut cache = self.cache.write();
        info!(evicted = cache.len(), "contract cache cleared");
        cache.clear();
        self.listings.write().clear();
    }

    /// Number of cached contracts.
    pub fn cached(&self) -> usize {
        self.cache.read().len()
    }
}

/// Parses a document and checks it against the key it was discovered under.
fn parse_checked(
    dataset_id: &str,
    version: u32,
    claims: usize,
    text: &ContractText,
) -> Result<Contract> {
    let mut violations = Vec::new();

    let parsed = match parse_str(&text.content, text.format) {
        Ok(contract) => Some(contract),
        Err(e) => {
            let message = e.to_string();
            violations.extend(
                e.into_violations()
                    .unwrap_or_else(|| vec![ParseViolation::Syntax(message)]),
            );
            None
        }
    };

    if let Some(contract) = &parsed {
        if !contract.dataset_id.is_empty() && contract.dataset_id != dataset_id {
            violations.push(ParseViolation::DatasetIdMismatch {
                expected: dataset_id.to_string(),
                found: contract.dataset_id.clone(),
            });
        }
        if contract.version != version {
            violations.push(ParseViolation::NonMonotonicVersion {
                detail: format!(
                    "document declares version {} but was discovered as version {version}",
                    contract.version
                ),
            });
        }
    }
    if claims > 1 {
        violations.push(ParseViolation::NonMonotonicVersion {
            detail: format!("{claims} documents claim version {version}"),
        });
    }

    match parsed {
        Some(contract) if violations.is_empty() => Ok(contract),
        _ => Err(ContractParseError {
            dataset_id: dataset_id.to_string(),
            origin: text.origin.clone(),
            violations,
        }
        .into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn document(version: u32, extra: &str) -> String {
        format!(
            r#"
dataset_id: IPE_07
version: {version}
{extra}
fields:
  - name: customer_id
    required: true
    aliases: ["Customer No_"]
    dtype: string
    semantic_tag: id
"#
        )
    }

    #[test]
    fn test_cache_hit_never_rereads() {
        let source = Arc::new(InMemorySource::new().with_yaml("IPE_07", 1, document(1, "")));
        let registry = ContractRegistry::new(Arc::clone(&source));

        let first = registry.load("IPE_07", 1).unwrap();
        let second = registry.load("IPE_07", 1).unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(source.reads(), 1);
    }

    #[test]
    fn test_unknown_version_is_not_found() {
        let registry =
            ContractRegistry::new(InMemorySource::new().with_yaml("IPE_07", 1, document(1, "")));

        let err = registry.load("IPE_07", 4).unwrap_err();
        assert!(matches!(
            err,
            ContractError::NotFound {
                version: Some(4),
                ..
            }
        ));
        assert!(matches!(
            registry.get_active("CR_03").unwrap_err(),
            ContractError::NotFound { version: None, .. }
        ));
    }

    #[test]
    fn test_active_skips_deprecated() {
        let registry = ContractRegistry::new(
            InMemorySource::new()
                .with_yaml("IPE_07", 1, document(1, ""))
                .with_yaml("IPE_07", 2, document(2, ""))
                .with_yaml("IPE_07", 3, document(3, "deprecated: true")),
        );

        assert_eq!(registry.get_active("IPE_07").unwrap().version, 2);
        assert_eq!(registry.versions("IPE_07").unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn test_pin_overrides_latest() {
        let source = InMemorySource::new()
            .with_yaml("IPE_07", 1, document(1, ""))
            .with_yaml("IPE_07", 2, document(2, "deprecated: true"));
        let registry = ContractRegistry::new(source).with_pin("IPE_07", 2);

        // Pins may select a deprecated version.
        assert_eq!(registry.get_active("IPE_07").unwrap().version, 2);
    }

    #[test]
    fn test_pin_to_missing_version() {
        let registry =
            ContractRegistry::new(InMemorySource::new().with_yaml("IPE_07", 1, document(1, "")))
                .with_pin("IPE_07", 7);

        let err = registry.get_active("IPE_07").unwrap_err();
        assert_eq!(err.to_string(), "Contract not found: IPE_07 v7");
    }

    #[test]
    fn test_discovery_key_mismatches() {
        let registry = ContractRegistry::new(
            InMemorySource::new()
                .with_yaml("IPE_07", 2, document(1, ""))
                .with_yaml("CR_03", 1, document(1, "")),
        );

        let err = registry.load("IPE_07", 2).unwrap_err();
        let ContractError::Parse(parse) = err else {
            panic!("expected a parse error");
        };
        assert!(parse.has(|v| matches!(v, ParseViolation::NonMonotonicVersion { .. })));

        let err = registry.load("CR_03", 1).unwrap_err();
        let ContractError::Parse(parse) = err else {
            panic!("expected a parse error");
        };
        assert_eq!(
            parse.violations,
            vec![ParseViolation::DatasetIdMismatch {
                expected: "CR_03".to_string(),
                found: "IPE_07".to_string(),
            }]
        );
    }

    #[test]
    fn test_duplicate_version_claims() {
        let registry = ContractRegistry::new(
            InMemorySource::new()
                .with_yaml("IPE_07", 1, document(1, ""))
                .with_yaml("IPE_07", 1, document(1, "description: copy")),
        );

        let err = registry.load("IPE_07", 1).unwrap_err();
        assert!(err.to_string().contains("2 documents claim version 1"));
    }

    #[test]
    fn test_parse_errors_collect_every_violation() {
        let yaml = r#"
dataset_id: IPE_07
version: 1
primary_keys: [doc_no]
fields:
  - name: amount
    dtype: money
    fill_policy: fill_empty
"#;
        let registry = ContractRegistry::new(InMemorySource::new().with_yaml("IPE_07", 1, yaml));

        let ContractError::Parse(parse) = registry.load("IPE_07", 1).unwrap_err() else {
            panic!("expected a parse error");
        };
        assert!(parse.violations.len() >= 2);
        assert!(parse.has(|v| matches!(v, ParseViolation::UnknownEnumValue { .. })));
        assert!(parse.has(|v| matches!(v, ParseViolation::UnknownPrimaryKey(_))));
        assert_eq!(registry.cached(), 0);
    }

    #[test]
    fn test_invalidate_and_reload() {
        let source = Arc::new(
            InMemorySource::new()
                .with_yaml("IPE_07", 1, document(1, ""))
                .with_yaml("CR_03", 1, document(1, "").replace("IPE_07", "CR_03")),
        );
        let registry = ContractRegistry::new(Arc::clone(&source));
        registry.load("IPE_07", 1).unwrap();
        registry.load("CR_03", 1).unwrap();

        registry.invalidate("IPE_07");
        assert_eq!(registry.cached(), 1);
        registry.load("IPE_07", 1).unwrap();
        assert_eq!(source.reads(), 3);

        registry.reload();
        assert_eq!(registry.cached(), 0);
    }

    #[test]
    fn test_listing_is_cached_until_invalidated() {
        let source = Arc::new(InMemorySource::new().with_yaml("IPE_07", 1, document(1, "")));
        let registry = ContractRegistry::new(Arc::clone(&source));
        assert_eq!(registry.get_active("IPE_07").unwrap().version, 1);

        source.insert("IPE_07", 2, document(2, ""), ContractFormat::Yaml);
        assert_eq!(registry.get_active("IPE_07").unwrap().version, 1);
        assert_eq!(registry.versions("IPE_07").unwrap(), vec![1]);

        registry.invalidate("IPE_07");
        assert_eq!(registry.get_active("IPE_07").unwrap().version, 2);
    }

    #[test]
    fn test_parse_file_name() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["IPE_07.v1.yml", "IPE_07.v12.toml", "IPE_07.yml", "notes.v1.txt"] {
            fs::write(dir.path().join(name), "").unwrap();
        }

        assert_eq!(
            parse_file_name(&dir.path().join("IPE_07.v1.yml")),
            Some(("IPE_07".to_string(), 1))
        );
        assert_eq!(
            parse_file_name(&dir.path().join("IPE_07.v12.toml")),
            Some(("IPE_07".to_string(), 12))
        );
        assert_eq!(parse_file_name(&dir.path().join("IPE_07.yml")), None);
        assert_eq!(parse_file_name(&dir.path().join("notes.v1.txt")), None);
    }
}
