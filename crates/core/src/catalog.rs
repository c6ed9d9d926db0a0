//! Availability of platform APIs on target platforms.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::TargetPlatform;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Catalog does not know target {0}")]
    UnknownTarget(TargetPlatform),
    #[error("Failed to read catalog at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse catalog: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Catalog lookup failed: {0}")]
    Lookup(String),
}

/// Answers "is this API present on that target".
///
/// An API the catalog has never heard of is unavailable, not an error. Errors
/// are reserved for the catalog itself failing, and abort the whole analysis.
pub trait PortabilityCatalog: Send + Sync {
    fn is_available(&self, doc_id: &str, target: &TargetPlatform) -> Result<bool, CatalogError>;
}

impl<F> PortabilityCatalog for F
where
    F: Fn(&str, &TargetPlatform) -> Result<bool, CatalogError> + Send + Sync,
{
    fn is_available(&self, doc_id: &str, target: &TargetPlatform) -> Result<bool, CatalogError> {
        self(doc_id, target)
    }
}

/// On-disk catalog layout.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct CatalogFile {
    targets: Vec<TargetPlatform>,
    #[serde(default)]
    apis: BTreeMap<String, Vec<TargetPlatform>>,
}

/// In-memory catalog loaded from `{ "targets": [...], "apis": { docId: [targets] } }`.
#[derive(Debug, Clone, Default)]
pub struct JsonCatalog {
    targets: BTreeSet<TargetPlatform>,
    apis: BTreeMap<String, BTreeSet<TargetPlatform>>,
}

impl JsonCatalog {
    pub fn from_json(json: &str) -> Result<Self, CatalogError> {
        let file: CatalogFile = serde_json::from_str(json)?;
        Ok(Self::from_file(file))
    }

    pub fn from_path(path: &Path) -> Result<Self, CatalogError> {
        let json = fs::read_to_string(path)
            .map_err(|source| CatalogError::Io { path: path.to_path_buf(), source })?;
        Self::from_json(&json)
    }

    fn from_file(file: CatalogFile) -> Self {
        let mut targets: BTreeSet<TargetPlatform> = file.targets.into_iter().collect();
        let apis = file
            .apis
            .into_iter()
            .map(|(doc_id, available)| {
                let available: BTreeSet<TargetPlatform> = available.into_iter().collect();
                // Anything an API is listed on is a known target.
                targets.extend(available.iter().cloned());
                (doc_id, available)
            })
            .collect();
        Self { targets, apis }
    }

    /// Record `doc_id` as available on `targets`, declaring the targets as needed.
    pub fn insert<I>(&mut self, doc_id: impl Into<String>, targets: I)
    where
        I: IntoIterator<Item = TargetPlatform>,
    {
        let entry = self.apis.entry(doc_id.into()).or_default();
        for target in targets {
            self.targets.insert(target.clone());
            entry.insert(target);
        }
    }

    /// Declared targets, sorted.
    pub fn targets(&self) -> impl Iterator<Item = &TargetPlatform> {
        self.targets.iter()
    }

    pub fn len(&self) -> usize {
        self.apis.len()
    }

    pub fn is_empty(&self) -> bool {
        self.apis.is_empty()
    }
}

impl PortabilityCatalog for JsonCatalog {
    fn is_available(&self, doc_id: &str, target: &TargetPlatform) -> Result<bool, CatalogError> {
        if !self.targets.contains(target) {
            return Err(CatalogError::UnknownTarget(target.clone()));
        }
        Ok(self.apis.get(doc_id).is_some_and(|available| available.contains(target)))
    }
}
