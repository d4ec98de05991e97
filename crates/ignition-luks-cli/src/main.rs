//! Ignition LUKS command-line host: renders, checks and diffs `ignition_luks` attributes.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use ignition_luks_core::{
    attributes::RENDERED, logging, DataSource, LuksDataSource, RenderConfig, ResourceData,
};
use log::debug;
use schemars::schema_for;
use serde_json::{to_string_pretty, Value};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Top-level command-line options shared by every subcommand.
#[derive(Parser, Debug)]
#[command(
    name = "ignition-luks",
    version,
    about = "Render Ignition LUKS configuration fragments from declarative attributes."
)]
struct Cli {
    /// Optional renderer configuration (TOML or YAML).
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Build, validate and print the rendered document and its identifier.
    Render {
        /// Attribute file (JSON, or YAML for any other extension).
        #[arg(short = 'f', long)]
        file: PathBuf,

        /// Print only the identifier.
        #[arg(long)]
        id_only: bool,
    },

    /// Check whether the attributes still render to the given identifier.
    Exists {
        #[arg(short = 'f', long)]
        file: PathBuf,

        /// Identifier recorded by a previous render.
        #[arg(long)]
        id: String,
    },

    /// List attributes whose change forces the device to be replaced.
    Diff {
        #[arg(long)]
        prior: PathBuf,

        #[arg(long)]
        proposed: PathBuf,
    },

    /// Print the `ignition_luks` attribute schema.
    Schema,

    /// Validate a renderer configuration file or emit its JSON schema.
    ValidateConfig {
        #[arg(short = 'f', long)]
        file: Option<PathBuf>,

        /// Output the JSON schema instead of validating a file.
        #[arg(long)]
        schema: bool,
    },
}

/// Entry point: parse arguments and surface errors with an exit code.
fn main() {
    if let Err(err) = run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;
    logging::init(&config.logging.level);
    let source = LuksDataSource::new(Arc::new(config));

    match cli.command {
        Commands::Render { file, id_only } => {
            let mut data = load_attributes(&source, &file)?;
            source
                .read(&mut data)
                .with_context(|| format!("failed to render {}", file.display()))?;
            let id = data.id().unwrap_or_default();
            if id_only {
                println!("{id}");
            } else {
                let rendered = data.get(RENDERED).and_then(Value::as_str).unwrap_or_default();
                println!("{rendered}");
                eprintln!("id: {id}");
            }
        }
        Commands::Exists { file, id } => {
            let data = load_attributes(&source, &file)?.with_id(id);
            let exists = source
                .exists(&data)
                .with_context(|| format!("failed to render {}", file.display()))?;
            println!("{exists}");
        }
        Commands::Diff { prior, proposed } => {
            let before = load_attributes(&source, &prior)?;
            let after = load_attributes(&source, &proposed)?;
            let replacements = source.schema().replacements(&before, &after);
            if replacements.is_empty() {
                println!("no changes requiring replacement");
            } else {
                for name in replacements {
                    println!("{name} (forces replacement)");
                }
            }
        }
        Commands::Schema => {
            println!("{}", to_string_pretty(source.schema())?);
        }
        Commands::ValidateConfig { file, schema } => {
            if schema {
                println!("{}", to_string_pretty(&schema_for!(RenderConfig))?);
            } else {
                let path = file
                    .or(cli.config)
                    .context("pass --file or --config to validate a configuration")?;
                let cfg = load_config(Some(&path))?;
                println!(
                    "{} is valid ({} extra option token(s))",
                    cfg.path.display(),
                    cfg.options.extra_option_tokens.len()
                );
            }
        }
    }

    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<RenderConfig> {
    match path {
        Some(path) => RenderConfig::load(path)
            .with_context(|| format!("failed to load configuration from {}", path.display())),
        None => Ok(RenderConfig::default()),
    }
}

/// Read an attribute file and conform it against the data source schema.
fn load_attributes(source: &LuksDataSource, path: &Path) -> Result<ResourceData> {
    let contents =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    let is_json = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    let value: Value = if is_json {
        serde_json::from_str(&contents)
            .with_context(|| format!("{} is not valid JSON", path.display()))?
    } else {
        serde_yaml::from_str(&contents)
            .with_context(|| format!("{} is not valid YAML", path.display()))?
    };
    debug!("loaded attributes from {}", path.display());
    source
        .load(value)
        .with_context(|| format!("{} does not match the ignition_luks schema", path.display()))
}
