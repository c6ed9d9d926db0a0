use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::filter::{
    AssemblyNameFilter, DependencyFilter, DotNetFrameworkFilter, DEFAULT_NAME_PREFIXES,
};
use crate::model::TargetPlatform;

/// Default config file name written by `init-config` and looked up in a project root.
pub const CONFIG_FILE_NAME: &str = "apiport.json";

/// Which built-in dependency filter to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterKind {
    #[default]
    DotNetFramework,
    AssemblyName,
}

impl FilterKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FilterKind::DotNetFramework => "dot_net_framework",
            FilterKind::AssemblyName => "assembly_name",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterConfig {
    #[serde(default)]
    pub kind: FilterKind,
    /// Additional public key tokens treated as platform (`dot_net_framework` only).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extra_public_key_tokens: Vec<String>,
    /// Name prefixes treated as platform (`assembly_name` only). Empty means defaults.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub name_prefixes: Vec<String>,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            kind: FilterKind::DotNetFramework,
            extra_public_key_tokens: Vec::new(),
            name_prefixes: Vec::new(),
        }
    }
}

impl FilterConfig {
    pub fn build(&self) -> Box<dyn DependencyFilter> {
        match self.kind {
            FilterKind::DotNetFramework => {
                Box::new(DotNetFrameworkFilter::with_extra_tokens(&self.extra_public_key_tokens))
            }
            FilterKind::AssemblyName if self.name_prefixes.is_empty() => {
                Box::new(AssemblyNameFilter::new(DEFAULT_NAME_PREFIXES.iter().copied()))
            }
            FilterKind::AssemblyName => {
                Box::new(AssemblyNameFilter::new(self.name_prefixes.iter().cloned()))
            }
        }
    }
}

/// Serializable analysis settings, stored as `apiport.json` (or YAML).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Human-friendly project name.
    pub name: String,
    /// Schema/config version. This is about the config format, not the analyzed binaries.
    pub config_version: String,
    #[serde(default)]
    pub filter: FilterConfig,
    /// Targets used when none are given on the command line.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub default_targets: Vec<TargetPlatform>,
    /// Catalog file as written; see [`AnalysisConfig::catalog_path`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub catalog: Option<PathBuf>,
    /// Directory of the file this config was loaded from.
    #[serde(skip)]
    base_dir: Option<PathBuf>,
}

impl AnalysisConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            config_version: "0.1.0".to_string(),
            filter: FilterConfig::default(),
            default_targets: Vec::new(),
            catalog: None,
            base_dir: None,
        }
    }

    /// Catalog path with a relative `catalog` resolved against the loaded
    /// file's directory.
    pub fn catalog_path(&self) -> Option<PathBuf> {
        let catalog = self.catalog.as_ref()?;
        match &self.base_dir {
            Some(base) if catalog.is_relative() => Some(base.join(catalog)),
            _ => Some(catalog.clone()),
        }
    }

    /// Load from JSON (`.json`) or YAML (anything else).
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = fs::read(path)
            .with_context(|| format!("Failed to read config at {}", path.display()))?;
        let mut config: AnalysisConfig = if is_json(path) {
            serde_json::from_slice(&bytes).context("Failed to parse config JSON")?
        } else {
            serde_yaml::from_slice(&bytes).context("Failed to parse config YAML")?
        };
        config.validate()?;

        config.base_dir = Some(path.parent().unwrap_or_else(|| Path::new(".")).to_path_buf());
        Ok(config)
    }

    /// Write as JSON or YAML according to the path's extension.
    pub fn save(&self, path: &Path) -> Result<()> {
        let body = if is_json(path) {
            serde_json::to_string_pretty(self).context("Failed to serialize config JSON")?
        } else {
            serde_yaml::to_string(self).context("Failed to serialize config YAML")?
        };
        fs::write(path, body)
            .with_context(|| format!("Failed to write config to {}", path.display()))
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            bail!("Config name must not be empty");
        }
        if self.filter.kind == FilterKind::DotNetFramework {
            for token in &self.filter.extra_public_key_tokens {
                if token.len() != 16 || !token.chars().all(|c| c.is_ascii_hexdigit()) {
                    bail!("Invalid public key token '{token}': expected 16 hex characters");
                }
            }
        }
        Ok(())
    }
}

fn is_json(path: &Path) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some("json")
}
