//! Analysis entry point: modules and targets in, one [`AnalyzeResponse`] out.

use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::catalog::{CatalogError, PortabilityCatalog};
use crate::filter::DependencyFilter;
use crate::finder::{DependencyFinder, DependencySet, ModuleDependencies};
use crate::metadata::{open_module, open_module_path, ReadError};
use crate::model::{
    AnalyzeResponse, AssemblyIdentity, FailureKind, MissingDependency, ModuleFailure,
    TargetPlatform,
};
use crate::resolver::ResolveError;

/// One binary submitted for analysis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModuleSource {
    Bytes { name: String, data: Vec<u8> },
    Path(PathBuf),
}

impl ModuleSource {
    pub fn bytes(name: impl Into<String>, data: Vec<u8>) -> Self {
        ModuleSource::Bytes { name: name.into(), data }
    }

    /// Name used in failure records and logs.
    pub fn display_name(&self) -> String {
        match self {
            ModuleSource::Bytes { name, .. } => name.clone(),
            ModuleSource::Path(path) => path.display().to_string(),
        }
    }
}

impl fmt::Display for ModuleSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display_name())
    }
}

/// A full analysis submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisRequest {
    pub submission_id: String,
    pub modules: Vec<ModuleSource>,
    pub targets: Vec<TargetPlatform>,
}

/// Failure confined to a single module; recorded, never propagated.
#[derive(Debug, Error)]
pub enum ModuleError {
    #[error(transparent)]
    Read(#[from] ReadError),
    #[error(transparent)]
    Resolve(#[from] ResolveError),
}

impl ModuleError {
    pub fn kind(&self) -> FailureKind {
        match self {
            ModuleError::Read(ReadError::Io { .. }) => FailureKind::Io,
            ModuleError::Read(ReadError::Parse { .. }) => FailureKind::Parse,
            ModuleError::Resolve(ResolveError::SystemObjectNotFound { .. }) => {
                FailureKind::SystemObjectNotFound
            }
            ModuleError::Resolve(ResolveError::AmbiguousSystemObject { .. }) => {
                FailureKind::AmbiguousSystemObject
            }
        }
    }
}

/// Failure of the request as a whole; no partial report is produced.
#[derive(Debug, Error)]
pub enum AnalyzeError {
    #[error("No target platforms were requested")]
    NoTargets,
    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

/// Bundles the collaborators an analysis needs.
pub struct Analyzer<'a> {
    pub filter: &'a dyn DependencyFilter,
    pub catalog: &'a dyn PortabilityCatalog,
}

impl<'a> Analyzer<'a> {
    pub fn new(filter: &'a dyn DependencyFilter, catalog: &'a dyn PortabilityCatalog) -> Self {
        Self { filter, catalog }
    }

    pub fn analyze(&self, request: &AnalysisRequest) -> Result<AnalyzeResponse, AnalyzeError> {
        analyze(
            &request.modules,
            &request.targets,
            &request.submission_id,
            self.filter,
            self.catalog,
        )
    }

    /// Read one module and extract its platform dependencies.
    pub fn analyze_module(&self, source: &ModuleSource) -> Result<ModuleDependencies, ModuleError> {
        let metadata = match source {
            ModuleSource::Bytes { name, data } => open_module(data, name)?,
            ModuleSource::Path(path) => open_module_path(path)?,
        };
        Ok(DependencyFinder::new(self.filter).find(&metadata)?)
    }
}

/// Analyze `modules` against `targets`.
///
/// Modules are processed in parallel; a module that fails to read or resolve
/// is reported in `module_failures` and the rest still contribute. Catalog
/// failures and an empty target list fail the whole call.
pub fn analyze(
    modules: &[ModuleSource],
    targets: &[TargetPlatform],
    submission_id: &str,
    filter: &dyn DependencyFilter,
    catalog: &dyn PortabilityCatalog,
) -> Result<AnalyzeResponse, AnalyzeError> {
    let targets: Vec<TargetPlatform> =
        targets.iter().cloned().collect::<BTreeSet<_>>().into_iter().collect();
    if targets.is_empty() {
        return Err(AnalyzeError::NoTargets);
    }

    let analyzer = Analyzer::new(filter, catalog);
    let outcomes: Vec<(String, Result<ModuleDependencies, ModuleError>)> = modules
        .par_iter()
        .map(|source| (source.display_name(), analyzer.analyze_module(source)))
        .collect();

    let mut dependencies = DependencySet::default();
    let mut analyzed_names = BTreeSet::new();
    let mut referenced_user: BTreeSet<AssemblyIdentity> = BTreeSet::new();
    let mut failures = Vec::new();
    for (module, outcome) in outcomes {
        match outcome {
            Ok(found) => {
                debug!(
                    module = %module,
                    dependencies = found.dependencies.len(),
                    "module analyzed"
                );
                if let Some(identity) = &found.identity {
                    analyzed_names.insert(identity.name().to_string());
                }
                for dependency in found.dependencies {
                    dependencies.insert(dependency);
                }
                referenced_user.extend(found.user_assemblies);
            }
            Err(err) => {
                warn!(module = %module, error = %err, "module analysis failed");
                failures.push(ModuleFailure { kind: err.kind(), message: err.to_string(), module });
            }
        }
    }
    failures.sort_by(|a, b| a.module.cmp(&b.module).then_with(|| a.message.cmp(&b.message)));

    let mut missing = Vec::new();
    for dependency in dependencies.into_sorted_vec() {
        let mut missing_on = Vec::new();
        for target in &targets {
            if !catalog.is_available(&dependency.member_doc_id, target)? {
                missing_on.push(target.clone());
            }
        }
        if !missing_on.is_empty() {
            missing.push(MissingDependency { dependency, missing_on });
        }
    }

    let unresolved = unresolved_user_assemblies(referenced_user, &analyzed_names);

    info!(
        submission_id,
        modules = modules.len(),
        failed = failures.len(),
        missing = missing.len(),
        unresolved = unresolved.len(),
        "analysis complete"
    );
    Ok(AnalyzeResponse::new(submission_id.to_string(), targets, missing, unresolved, failures))
}

/// User assemblies referenced by some module but not supplied (and readable) in the request.
fn unresolved_user_assemblies(
    referenced: BTreeSet<AssemblyIdentity>,
    analyzed_names: &BTreeSet<String>,
) -> Vec<String> {
    let by_name: BTreeSet<(String, String)> = referenced
        .into_iter()
        .filter(|assembly| !analyzed_names.contains(assembly.name()))
        .map(|assembly| (assembly.name().to_string(), assembly.to_string()))
        .collect();
    by_name.into_iter().map(|(_, display)| display).collect()
}
