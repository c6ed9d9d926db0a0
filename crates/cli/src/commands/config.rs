use anyhow::{anyhow, Result};
use apiport_core::config::CONFIG_FILE_NAME;
use apiport_core::AnalysisConfig;

use crate::{canonicalize_or_current, infer_project_name};

/// Write a default `apiport.json` at `root`.
pub fn init_config_command(root: &str, name: Option<String>, force: bool) -> Result<()> {
    let root_path = canonicalize_or_current(root)?;
    let config_path = root_path.join(CONFIG_FILE_NAME);
    if config_path.exists() && !force {
        return Err(anyhow!(
            "Config already exists at {} (use --force to overwrite)",
            config_path.display()
        ));
    }

    // Derive the name from the root directory if not provided.
    let config_name = match name {
        Some(n) => n,
        None => infer_project_name(&root_path),
    };
    let config = AnalysisConfig::new(&config_name);
    config.save(&config_path)?;

    println!("Initialized apiport config:");
    println!("  Name: {}", config.name);
    println!("  Config: {}", config_path.display());
    println!("  Filter: {}", config.filter.kind.as_str());
    Ok(())
}
