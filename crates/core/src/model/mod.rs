//! Core data model: assembly identities, dependencies, and analysis responses.
//!
//! Every type that crosses the kernel boundary lives here and serializes with
//! the PascalCase field names report consumers expect
//! (`SubmissionId`, `Targets`, `MissingDependencies`, `UnresolvedUserAssemblies`).

mod identity;
mod response;

pub use identity::{
    AssemblyIdentity, AssemblyVersion, IdentityParseError, TargetPlatform, NEUTRAL_CULTURE,
};
pub use response::{
    AnalyzeResponse, FailureKind, MemberDependency, MissingDependency, ModuleFailure,
};
