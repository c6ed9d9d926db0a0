use anyhow::{Context, Result};
use apiport_core::{DependencyFilter, DependencyFinder, SystemObjectFinder};
use serde::Serialize;

use crate::commands::{build_filter, load_config, open_module_file};

/// Print the platform dependencies of one module.
pub fn dependencies_command(file: &str, config: Option<&str>, json: bool) -> Result<()> {
    let config = load_config(config)?;
    let filter = build_filter(config.as_ref());
    let module = open_module_file(file)?;
    let found = DependencyFinder::new(filter.as_ref())
        .find(&module)
        .with_context(|| format!("Failed to find dependencies of {file}"))?;

    if json {
        let serialized = serde_json::to_string_pretty(&found.dependencies)?;
        println!("{}", serialized);
        return Ok(());
    }

    match &found.system_object {
        Some(system_object) => println!(
            "Dependencies of {} (System.Object from {}):",
            module.name(),
            system_object
        ),
        None => println!("Dependencies of {}:", module.name()),
    }
    if found.dependencies.is_empty() {
        println!("(none)");
    }
    for dependency in &found.dependencies {
        println!("- {} [{}]", dependency.member_doc_id, dependency.defining_assembly);
    }
    Ok(())
}

/// Print the assembly that supplies `System.Object` for one module.
pub fn system_object_command(file: &str, config: Option<&str>, json: bool) -> Result<()> {
    let config = load_config(config)?;
    let filter = build_filter(config.as_ref());
    let module = open_module_file(file)?;
    let resolved = SystemObjectFinder::new(filter.as_ref())
        .resolve(&module)
        .with_context(|| format!("Failed to resolve System.Object for {file}"))?;

    if json {
        let serialized = serde_json::to_string_pretty(&resolved)?;
        println!("{}", serialized);
        return Ok(());
    }
    println!("{}", resolved);
    Ok(())
}

#[derive(Serialize)]
pub struct ReferenceInfo {
    pub assembly: String,
    pub platform: bool,
}

/// List a module's assembly references with their platform/user classification.
pub fn references_command(file: &str, config: Option<&str>, json: bool) -> Result<()> {
    let config = load_config(config)?;
    let filter = build_filter(config.as_ref());
    let module = open_module_file(file)?;

    let references: Vec<ReferenceInfo> = module
        .assembly_references()
        .iter()
        .map(|r| ReferenceInfo {
            assembly: r.to_string(),
            platform: filter.is_framework_assembly(r),
        })
        .collect();

    if json {
        let serialized = serde_json::to_string_pretty(&references)?;
        println!("{}", serialized);
        return Ok(());
    }

    println!("Assembly references of {}:", module.name());
    if references.is_empty() {
        println!("(none)");
    }
    for reference in references {
        let kind = if reference.platform { "platform" } else { "user" };
        println!("- {} ({})", reference.assembly, kind);
    }
    Ok(())
}
