use serde::{Deserialize, Serialize};

use crate::model::{AssemblyIdentity, TargetPlatform};

/// A single externally observed platform API usage.
///
/// Two dependencies describe the same API when they share `member_doc_id` and
/// the defining assembly's name; see [`MemberDependency::key`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MemberDependency {
    /// Doc id of the declaring type (`T:Namespace.Type`).
    pub defining_type: String,
    /// Member name as written in metadata (`.ctor`, `WriteLine`, ...).
    pub member_name: String,
    /// Canonical doc id used for catalog lookups (`M:System.Console.WriteLine(System.String)`).
    pub member_doc_id: String,
    pub defining_assembly: AssemblyIdentity,
}

impl MemberDependency {
    /// Uniqueness key: doc id plus defining assembly name.
    pub fn key(&self) -> (&str, &str) {
        (self.member_doc_id.as_str(), self.defining_assembly.name())
    }

    /// Report ordering key: assembly name first, then doc id.
    pub fn sort_key(&self) -> (&str, &str) {
        (self.defining_assembly.name(), self.member_doc_id.as_str())
    }
}

/// A platform dependency together with the requested targets that lack it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MissingDependency {
    #[serde(flatten)]
    pub dependency: MemberDependency,
    /// Sorted, never empty.
    pub missing_on: Vec<TargetPlatform>,
}

/// Why a single module could not contribute to the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Io,
    Parse,
    SystemObjectNotFound,
    AmbiguousSystemObject,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::Io => "io",
            FailureKind::Parse => "parse",
            FailureKind::SystemObjectNotFound => "system_object_not_found",
            FailureKind::AmbiguousSystemObject => "ambiguous_system_object",
        }
    }
}

/// Per-module failure recorded alongside the partial report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ModuleFailure {
    pub module: String,
    pub kind: FailureKind,
    pub message: String,
}

/// Aggregate result of one analysis submission.
///
/// Built once by the aggregator with every collection already sorted; there
/// is no mutation API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AnalyzeResponse {
    submission_id: String,
    targets: Vec<TargetPlatform>,
    missing_dependencies: Vec<MissingDependency>,
    unresolved_user_assemblies: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    module_failures: Vec<ModuleFailure>,
}

impl AnalyzeResponse {
    pub(crate) fn new(
        submission_id: String,
        targets: Vec<TargetPlatform>,
        missing_dependencies: Vec<MissingDependency>,
        unresolved_user_assemblies: Vec<String>,
        module_failures: Vec<ModuleFailure>,
    ) -> Self {
        Self {
            submission_id,
            targets,
            missing_dependencies,
            unresolved_user_assemblies,
            module_failures,
        }
    }

    pub fn submission_id(&self) -> &str {
        &self.submission_id
    }

    pub fn targets(&self) -> &[TargetPlatform] {
        &self.targets
    }

    pub fn missing_dependencies(&self) -> &[MissingDependency] {
        &self.missing_dependencies
    }

    /// Missing dependencies for one target, in report order.
    pub fn missing_on<'a>(
        &'a self,
        target: &'a TargetPlatform,
    ) -> impl Iterator<Item = &'a MemberDependency> + 'a {
        self.missing_dependencies
            .iter()
            .filter(move |m| m.missing_on.contains(target))
            .map(|m| &m.dependency)
    }

    pub fn unresolved_user_assemblies(&self) -> &[String] {
        &self.unresolved_user_assemblies
    }

    pub fn module_failures(&self) -> &[ModuleFailure] {
        &self.module_failures
    }
}
