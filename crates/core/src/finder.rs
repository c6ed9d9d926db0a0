//! Extraction of the canonical platform dependency set of one module.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use tracing::debug;

use crate::filter::DependencyFilter;
use crate::metadata::ModuleMetadata;
use crate::model::{AssemblyIdentity, MemberDependency};
use crate::resolver::{is_platform_family, ResolveError, SystemObjectFinder};

/// Everything the aggregator needs from one successfully analyzed module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleDependencies {
    pub module: String,
    /// The module's own assembly identity, if it has one.
    pub identity: Option<AssemblyIdentity>,
    /// Resolved only when a root-family reference needed normalizing.
    pub system_object: Option<AssemblyIdentity>,
    /// Sorted by assembly name, then doc id; unique per (doc id, assembly name).
    pub dependencies: Vec<MemberDependency>,
    /// Referenced assemblies classified as user code, sorted and unique.
    pub user_assemblies: Vec<AssemblyIdentity>,
}

pub struct DependencyFinder<'a> {
    filter: &'a dyn DependencyFilter,
}

impl<'a> DependencyFinder<'a> {
    pub fn new(filter: &'a dyn DependencyFilter) -> Self {
        Self { filter }
    }

    pub fn find(&self, module: &ModuleMetadata) -> Result<ModuleDependencies, ResolveError> {
        let mut system_object: Option<AssemblyIdentity> = None;

        let mut unique = DependencySet::default();
        for reference in module.member_references() {
            if !self.filter.is_framework_assembly(&reference.assembly) {
                continue;
            }
            let defining_assembly = if is_platform_family(reference.assembly.name()) {
                let resolved = match system_object.take() {
                    Some(resolved) => resolved,
                    None => SystemObjectFinder::new(self.filter).resolve(module)?,
                };
                system_object = Some(resolved.clone());
                resolved
            } else {
                reference.assembly.clone()
            };
            unique.insert(MemberDependency {
                defining_type: reference.defining_type.clone(),
                member_name: reference.member_name.clone(),
                member_doc_id: reference.doc_id.clone(),
                defining_assembly,
            });
        }

        let mut user_assemblies: Vec<AssemblyIdentity> = module
            .assembly_references()
            .iter()
            .filter(|a| !self.filter.is_framework_assembly(a))
            .cloned()
            .collect();
        user_assemblies.sort();
        user_assemblies.dedup();

        let dependencies = unique.into_sorted_vec();
        debug!(
            module = module.name(),
            dependencies = dependencies.len(),
            user_assemblies = user_assemblies.len(),
            "found module dependencies"
        );
        Ok(ModuleDependencies {
            module: module.name().to_string(),
            identity: module.identity().cloned(),
            system_object,
            dependencies,
            user_assemblies,
        })
    }
}

/// Dependencies keyed by (doc id, assembly name), with every root-family
/// assembly sharing one key so `mscorlib` and `netstandard` spellings of the
/// same API merge across modules.
///
/// On a key collision the record with the higher defining assembly wins
/// (version first, then display form), so the result is independent of
/// insertion order.
#[derive(Debug, Default)]
pub(crate) struct DependencySet {
    entries: BTreeMap<(String, String), MemberDependency>,
}

impl DependencySet {
    pub(crate) fn insert(&mut self, dependency: MemberDependency) {
        let key = (dependency.member_doc_id.clone(), assembly_key(&dependency.defining_assembly));
        let replace = self.entries.get(&key).map_or(true, |existing| {
            compare_assemblies(&existing.defining_assembly, &dependency.defining_assembly)
                == Ordering::Less
        });
        if replace {
            self.entries.insert(key, dependency);
        }
    }

    pub(crate) fn into_sorted_vec(self) -> Vec<MemberDependency> {
        let mut dependencies: Vec<MemberDependency> = self.entries.into_values().collect();
        dependencies.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
        dependencies
    }
}

/// Empty for the root family, which no real assembly name can collide with.
fn assembly_key(assembly: &AssemblyIdentity) -> String {
    if is_platform_family(assembly.name()) {
        String::new()
    } else {
        assembly.name().to_string()
    }
}

fn compare_assemblies(a: &AssemblyIdentity, b: &AssemblyIdentity) -> Ordering {
    a.version().cmp(&b.version()).then_with(|| a.to_string().cmp(&b.to_string()))
}
