//! Resolution of the assembly that supplies the root object type.
//!
//! A module compiled against the full framework references `System.Object`
//! through `mscorlib`; one compiled against .NET Standard goes through the
//! `netstandard` facade; split runtimes go through `System.Runtime` or
//! `System.Private.CoreLib`. The resolver picks the one identity every
//! root-family reference in the module should be normalized to.

use thiserror::Error;
use tracing::debug;

use crate::filter::DependencyFilter;
use crate::metadata::ModuleMetadata;
use crate::model::AssemblyIdentity;

/// Assembly names that may define the root object type.
pub static PLATFORM_FAMILY: [&str; 4] =
    ["mscorlib", "netstandard", "System.Private.CoreLib", "System.Runtime"];

pub fn is_platform_family(name: &str) -> bool {
    PLATFORM_FAMILY.contains(&name)
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ResolveError {
    #[error(
        "Could not find System.Object in {module}. Assembly references: [{}]",
        display_list(candidates)
    )]
    SystemObjectNotFound { module: String, candidates: Vec<AssemblyIdentity> },
    #[error(
        "Ambiguous System.Object in {module}: several assemblies share the highest version: [{}]",
        display_list(candidates)
    )]
    AmbiguousSystemObject { module: String, candidates: Vec<AssemblyIdentity> },
}

fn display_list(identities: &[AssemblyIdentity]) -> String {
    identities.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ")
}

pub struct SystemObjectFinder<'a> {
    filter: &'a dyn DependencyFilter,
}

impl<'a> SystemObjectFinder<'a> {
    pub fn new(filter: &'a dyn DependencyFilter) -> Self {
        Self { filter }
    }

    /// Identity of the root-object assembly referenced by `module`.
    pub fn resolve(&self, module: &ModuleMetadata) -> Result<AssemblyIdentity, ResolveError> {
        let references = module.assembly_references();
        let mut candidates: Vec<&AssemblyIdentity> = references
            .iter()
            .filter(|r| self.filter.is_framework_assembly(r))
            .filter(|r| is_platform_family(r.name()))
            .collect();
        candidates.sort();
        candidates.dedup();

        let Some(top) = candidates.iter().map(|c| c.version()).max() else {
            return Err(ResolveError::SystemObjectNotFound {
                module: module.name().to_string(),
                candidates: references.to_vec(),
            });
        };

        let winners: Vec<&AssemblyIdentity> =
            candidates.into_iter().filter(|c| c.version() == top).collect();
        match winners.as_slice() {
            [only] => {
                debug!(module = module.name(), system_object = %only, "resolved system object");
                Ok((*only).clone())
            }
            _ => Err(ResolveError::AmbiguousSystemObject {
                module: module.name().to_string(),
                candidates: winners.into_iter().cloned().collect(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::DotNetFrameworkFilter;
    use crate::model::AssemblyVersion;

    fn identity(name: &str, version: (u16, u16), token: &str) -> AssemblyIdentity {
        AssemblyIdentity::new(name, AssemblyVersion::new(version.0, version.1, 0, 0), "", token)
    }

    fn module(references: Vec<AssemblyIdentity>) -> ModuleMetadata {
        ModuleMetadata::new("test.dll", None, references, Vec::new())
    }

    #[test]
    fn highest_mscorlib_wins() {
        let filter = DotNetFrameworkFilter::new();
        let module = module(vec![
            identity("mscorlib", (2, 0), "b77a5c561934e089"),
            identity("mscorlib", (4, 0), "b77a5c561934e089"),
            identity("System.Core", (4, 0), "b77a5c561934e089"),
        ]);
        let resolved = SystemObjectFinder::new(&filter).resolve(&module).unwrap();
        assert_eq!(resolved, identity("mscorlib", (4, 0), "b77a5c561934e089"));
    }

    #[test]
    fn identical_duplicates_collapse() {
        let filter = DotNetFrameworkFilter::new();
        let ns = identity("netstandard", (2, 0), "cc7b13ffcd2ddd51");
        let module = module(vec![ns.clone(), ns.clone()]);
        assert_eq!(SystemObjectFinder::new(&filter).resolve(&module).unwrap(), ns);
    }

    #[test]
    fn distinct_identities_at_top_version_are_ambiguous() {
        let filter = DotNetFrameworkFilter::new();
        let module = module(vec![
            identity("mscorlib", (4, 0), "b77a5c561934e089"),
            identity("System.Runtime", (4, 0), "b03f5f7f11d50a3a"),
        ]);
        let err = SystemObjectFinder::new(&filter).resolve(&module).unwrap_err();
        match err {
            ResolveError::AmbiguousSystemObject { candidates, .. } => {
                assert_eq!(candidates.len(), 2)
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn not_found_carries_every_reference() {
        let filter = DotNetFrameworkFilter::new();
        let refs = vec![
            identity("Contoso.Core", (1, 0), ""),
            // Name matches the family but the key is not a framework key.
            identity("mscorlib", (4, 0), "0123456789abcdef"),
        ];
        let err = SystemObjectFinder::new(&filter).resolve(&module(refs.clone())).unwrap_err();
        assert_eq!(
            err,
            ResolveError::SystemObjectNotFound { module: "test.dll".into(), candidates: refs }
        );
        assert!(err.to_string().contains("Contoso.Core"));
    }
}
