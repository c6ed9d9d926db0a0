use std::fs;
use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use apiport_core::{AnalysisRequest, Analyzer, AnalyzeResponse, JsonCatalog, ModuleSource};

use crate::commands::{build_filter, load_config, resolve_targets};
use crate::submission_id;

/// Options for the `analyze` command, mirroring its flags.
#[derive(Debug, Default)]
pub struct AnalyzeOptions {
    pub files: Vec<String>,
    pub targets: Vec<String>,
    pub catalog: Option<String>,
    pub config: Option<String>,
    pub submission_id: Option<String>,
    pub output: Option<String>,
    pub json: bool,
}

/// Analyze modules against targets and print (or write) the report.
pub fn analyze_command(options: AnalyzeOptions) -> Result<()> {
    if options.files.is_empty() {
        return Err(anyhow!("No modules given: pass at least one --file"));
    }
    let config = load_config(options.config.as_deref())?;
    let targets = resolve_targets(&options.targets, config.as_ref())?;

    let catalog_path = options
        .catalog
        .map(PathBuf::from)
        .or_else(|| config.as_ref().and_then(|c| c.catalog_path()))
        .ok_or_else(|| anyhow!("No catalog given: pass --catalog or set catalog in the config"))?;
    let catalog = JsonCatalog::from_path(&catalog_path)
        .with_context(|| format!("Failed to load catalog at {}", catalog_path.display()))?;
    let undeclared: Vec<&str> = targets
        .iter()
        .filter(|target| !catalog.targets().any(|known| known == *target))
        .map(|target| target.as_str())
        .collect();
    if !undeclared.is_empty() {
        return Err(anyhow!(
            "Catalog at {} does not declare target(s): {}",
            catalog_path.display(),
            undeclared.join("; ")
        ));
    }

    let paths: Vec<PathBuf> = options.files.iter().map(PathBuf::from).collect();
    let submission = match options.submission_id {
        Some(id) => id,
        None => submission_id(&paths, &targets),
    };

    let filter = build_filter(config.as_ref());
    let analyzer = Analyzer::new(filter.as_ref(), &catalog);
    let request = AnalysisRequest {
        submission_id: submission,
        modules: paths.into_iter().map(ModuleSource::Path).collect(),
        targets,
    };
    let response = analyzer.analyze(&request).context("Analysis failed")?;

    if let Some(output) = options.output {
        let serialized = serde_json::to_string_pretty(&response)?;
        fs::write(&output, serialized)
            .with_context(|| format!("Failed to write report to {output}"))?;
        if !options.json {
            println!("Wrote report to {output}");
        }
    }

    if options.json {
        let serialized = serde_json::to_string_pretty(&response)?;
        println!("{}", serialized);
        return Ok(());
    }

    print_summary(&response);
    Ok(())
}

fn print_summary(response: &AnalyzeResponse) {
    println!("Submission: {}", response.submission_id());
    println!(
        "Targets: {}",
        response.targets().iter().map(|t| t.as_str()).collect::<Vec<_>>().join("; ")
    );

    for target in response.targets() {
        let missing: Vec<_> = response.missing_on(target).collect();
        println!("Missing on {} ({}):", target, missing.len());
        if missing.is_empty() {
            println!("(none)");
        }
        for dependency in missing {
            println!("- {} [{}]", dependency.member_doc_id, dependency.defining_assembly.name());
        }
    }

    println!("Unresolved user assemblies:");
    if response.unresolved_user_assemblies().is_empty() {
        println!("(none)");
    }
    for assembly in response.unresolved_user_assemblies() {
        println!("- {}", assembly);
    }

    if !response.module_failures().is_empty() {
        println!("Module failures:");
        for failure in response.module_failures() {
            println!("- {} ({}): {}", failure.module, failure.kind.as_str(), failure.message);
        }
    }
}
