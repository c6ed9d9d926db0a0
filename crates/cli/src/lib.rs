use std::env;
use std::fs;
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use apiport_core::TargetPlatform;
use sha2::{Digest, Sha256};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub mod commands;

/// Canonicalize the root path if possible, falling back to the given string
/// relative to the current working directory.
pub fn canonicalize_or_current(root: &str) -> Result<PathBuf> {
    let path = Path::new(root);
    if path == Path::new(".") {
        Ok(env::current_dir().context("Failed to get current directory")?)
    } else {
        // Try to canonicalize; if it fails (e.g., path does not yet exist),
        // join it with the current dir to get an absolute path.
        match path.canonicalize() {
            Ok(p) => Ok(p),
            Err(_) => {
                let cwd = env::current_dir().context("Failed to get current directory")?;
                Ok(cwd.join(path))
            }
        }
    }
}

/// Infer a project name from the root path.
///
/// If the root has no final component (e.g., `/`), fallback to `unnamed-project`.
pub fn infer_project_name(root: &Path) -> String {
    root.file_name().and_then(|os_str| os_str.to_str()).unwrap_or("unnamed-project").to_string()
}

/// Default submission id: SHA-256 over each module's content digest (in the
/// given order) followed by the sorted target names.
///
/// A module that cannot be read contributes its path text instead, so the id
/// never blocks the analysis that will report that module as a failure.
pub fn submission_id(modules: &[PathBuf], targets: &[TargetPlatform]) -> String {
    let mut hasher = Sha256::new();
    for module in modules {
        match file_digest(module) {
            Ok(digest) => {
                hasher.update(b"file\0");
                hasher.update(digest);
            }
            Err(err) => {
                tracing::debug!(
                    module = %module.display(),
                    error = %err,
                    "module unreadable, hashing its path"
                );
                hasher.update(b"path\0");
                hasher.update(module.to_string_lossy().as_bytes());
                hasher.update([0u8]);
            }
        }
    }
    let mut names: Vec<&str> = targets.iter().map(TargetPlatform::as_str).collect();
    names.sort_unstable();
    names.dedup();
    for name in names {
        hasher.update(name.as_bytes());
        hasher.update([0u8]);
    }
    format!("{:x}", hasher.finalize())
}

fn file_digest(path: &Path) -> io::Result<Vec<u8>> {
    let mut reader = BufReader::new(fs::File::open(path)?);
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 8192];

    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hasher.finalize().to_vec())
}

/// Install the stderr log subscriber. `RUST_LOG` wins over `verbose`.
pub fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("apiport=debug,apiport_core=debug"))
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("apiport=info,apiport_core=info"))
    };

    // A second initialization (e.g. from tests) keeps the first subscriber.
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .compact(),
        )
        .try_init();
}
