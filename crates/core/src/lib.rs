//! apiport-core
//!
//! Core library for .NET API portability analysis.
//!
//! This crate reads the metadata of compiled .NET modules, classifies the
//! assemblies they reference as platform or user code, resolves which platform
//! assembly supplies `System.Object`, and joins the resulting dependency set
//! against a portability catalog to report APIs missing on each target.
//!
//! All substantive logic lives here so it is fully testable and reusable from
//! multiple frontends (the `apiport` CLI, services that queue analysis jobs,
//! report writers).

pub mod aggregator;
pub mod catalog;
pub mod config;
pub mod filter;
pub mod finder;
pub mod metadata;
pub mod model;
pub mod resolver;

pub use aggregator::{analyze, AnalysisRequest, AnalyzeError, Analyzer, ModuleError, ModuleSource};
pub use catalog::{CatalogError, JsonCatalog, PortabilityCatalog};
pub use config::{AnalysisConfig, FilterConfig, FilterKind};
pub use filter::{AssemblyNameFilter, DependencyFilter, DotNetFrameworkFilter};
pub use finder::{DependencyFinder, ModuleDependencies};
pub use metadata::{
    open_module, open_module_path, MemberReference, ModuleMetadata, ParseError, ReadError,
};
pub use model::{
    AnalyzeResponse, AssemblyIdentity, AssemblyVersion, MemberDependency, MissingDependency,
    ModuleFailure, TargetPlatform,
};
pub use resolver::{ResolveError, SystemObjectFinder, PLATFORM_FAMILY};

/// Returns the library version as encoded at compile time.
///
/// Useful for tests and for frontends to report consistent version info.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
