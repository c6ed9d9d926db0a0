use anyhow::Result;
use apiport::commands::{
    analyze_command, dependencies_command, init_config_command, references_command,
    system_object_command, AnalyzeOptions,
};
use apiport::init_logging;
use clap::{Parser, Subcommand};

/// API portability analysis for compiled .NET binaries.
///
/// This CLI is a thin wrapper around `apiport-core` (exposed in code as `apiport_core`).
/// All substantive logic lives in the library so it can be tested thoroughly
/// and reused from other frontends.
#[derive(Parser, Debug)]
#[command(
    name = "apiport",
    version,
    about = "Report .NET APIs a binary uses that are missing on target platforms",
    long_about = None
)]
struct Cli {
    /// Log debug output to stderr (overridden by RUST_LOG).
    #[arg(long, short, global = true, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Analyze modules against target platforms using a portability catalog.
    ///
    /// Prints the APIs missing on each target, referenced user assemblies that
    /// were not supplied, and any modules that could not be analyzed.
    Analyze {
        /// Module to analyze (repeatable).
        #[arg(long = "file", required = true)]
        files: Vec<String>,

        /// Target platform, e.g. `.NETCoreApp,Version=v2.0` (repeatable).
        /// Defaults to the config's `default_targets`.
        #[arg(long = "target")]
        targets: Vec<String>,

        /// Catalog JSON file. Defaults to the config's `catalog`.
        #[arg(long)]
        catalog: Option<String>,

        /// Config file (JSON or YAML). Defaults to `./apiport.json` if present.
        #[arg(long)]
        config: Option<String>,

        /// Submission id to stamp on the report. Defaults to a SHA-256 of the inputs.
        #[arg(long)]
        submission_id: Option<String>,

        /// Also write the JSON report to this path.
        #[arg(long)]
        output: Option<String>,

        /// Emit JSON instead of human-readable text.
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// List the platform dependencies of one module.
    Dependencies {
        /// Module to inspect.
        #[arg(long)]
        file: String,

        #[arg(long)]
        config: Option<String>,

        /// Emit JSON instead of human-readable text.
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Show which assembly supplies System.Object for one module.
    SystemObject {
        /// Module to inspect.
        #[arg(long)]
        file: String,

        #[arg(long)]
        config: Option<String>,

        /// Emit JSON instead of human-readable text.
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// List a module's assembly references and their platform/user classification.
    References {
        /// Module to inspect.
        #[arg(long)]
        file: String,

        #[arg(long)]
        config: Option<String>,

        /// Emit JSON instead of human-readable text.
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Write a default `apiport.json` config.
    InitConfig {
        /// Directory to write the config into. Defaults to the current working directory.
        #[arg(long, default_value = ".")]
        root: String,

        /// Optional config name. If omitted, the name is derived from the root directory.
        #[arg(long)]
        name: Option<String>,

        /// Overwrite an existing config.
        #[arg(long, default_value_t = false)]
        force: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Command::Analyze { files, targets, catalog, config, submission_id, output, json } => {
            analyze_command(AnalyzeOptions {
                files,
                targets,
                catalog,
                config,
                submission_id,
                output,
                json,
            })?
        }
        Command::Dependencies { file, config, json } => {
            dependencies_command(&file, config.as_deref(), json)?
        }
        Command::SystemObject { file, config, json } => {
            system_object_command(&file, config.as_deref(), json)?
        }
        Command::References { file, config, json } => {
            references_command(&file, config.as_deref(), json)?
        }
        Command::InitConfig { root, name, force } => init_config_command(&root, name, force)?,
    }

    Ok(())
}
