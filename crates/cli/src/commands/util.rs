use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use apiport_core::config::CONFIG_FILE_NAME;
use apiport_core::{AnalysisConfig, DependencyFilter, FilterConfig, ModuleMetadata, TargetPlatform};

use crate::canonicalize_or_current;

/// Load the config named by `--config`, or `apiport.json` in the current
/// directory if present. `None` means built-in defaults apply.
pub fn load_config(config: Option<&str>) -> Result<Option<AnalysisConfig>> {
    let path = match config {
        Some(path) => PathBuf::from(path),
        None => {
            let default = canonicalize_or_current(".")?.join(CONFIG_FILE_NAME);
            if !default.is_file() {
                return Ok(None);
            }
            default
        }
    };
    let loaded = AnalysisConfig::load(&path)?;
    tracing::debug!(config = %path.display(), name = %loaded.name, "loaded config");
    Ok(Some(loaded))
}

/// Dependency filter from config, defaulting to the public-key-token filter.
pub fn build_filter(config: Option<&AnalysisConfig>) -> Box<dyn DependencyFilter> {
    match config {
        Some(config) => config.filter.build(),
        None => FilterConfig::default().build(),
    }
}

/// Parse `--target` values, falling back to the config's default targets.
pub fn resolve_targets(
    targets: &[String],
    config: Option<&AnalysisConfig>,
) -> Result<Vec<TargetPlatform>> {
    if targets.is_empty() {
        let defaults = config.map(|c| c.default_targets.clone()).unwrap_or_default();
        if defaults.is_empty() {
            return Err(anyhow!(
                "No targets given: pass --target or set default_targets in the config"
            ));
        }
        return Ok(defaults);
    }
    targets
        .iter()
        .map(|t| TargetPlatform::new(t).with_context(|| format!("Invalid target '{t}'")))
        .collect()
}

/// Open one module for the inspection commands.
pub fn open_module_file(file: &str) -> Result<ModuleMetadata> {
    let path = Path::new(file);
    if !path.exists() {
        return Err(anyhow!("Module file does not exist: {}", path.display()));
    }
    apiport_core::open_module_path(path)
        .with_context(|| format!("Failed to read module {}", path.display()))
}
