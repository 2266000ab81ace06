//! Searchstack CLI - compile a search-backend definition into a manifest

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use searchstack::config::StackConfig;
use searchstack::stack::StackCompiler;

/// Searchstack - declarative provisioning for a serverless search backend
#[derive(Parser, Debug)]
#[command(name = "searchstack", version, about, long_about = None)]
struct Cli {
    /// Print the stack configuration JSON schema and exit
    #[arg(long)]
    schema: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Compile a stack configuration into a desired-state manifest
    ///
    /// The manifest describes every resource the reconciliation engine must
    /// converge on: the collection, its security and data-access policies,
    /// the compute bindings, the HTTP surface, and a valid creation order.
    Synth(SynthArgs),
}

/// Synth mode arguments
#[derive(Parser, Debug)]
struct SynthArgs {
    /// Path to the stack YAML configuration file
    #[arg(short = 'f', long = "config")]
    config_file: PathBuf,

    /// Engine-assigned collection reference
    ///
    /// On a first deployment, pass the engine's symbolic reference for the
    /// collection; on subsequent synths, the settled identifier.
    #[arg(long, env = "COLLECTION_REF")]
    collection_ref: String,

    /// Manifest output format
    #[arg(long, value_enum, default_value = "json")]
    output: OutputFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    /// Pretty-printed JSON
    Json,
    /// YAML
    Yaml,
}

fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    if cli.schema {
        // Generate the configuration schema
        let schema = schemars::schema_for!(StackConfig);
        println!("{}", serde_json::to_string_pretty(&schema)?);
        return Ok(());
    }

    match cli.command {
        Some(Commands::Synth(args)) => run_synth(args),
        None => anyhow::bail!("no command given; run `searchstack synth` or `searchstack --schema`"),
    }
}

fn run_synth(args: SynthArgs) -> anyhow::Result<()> {
    let document = std::fs::read_to_string(&args.config_file)
        .with_context(|| format!("failed to read {}", args.config_file.display()))?;
    let config = StackConfig::from_yaml(&document)?;

    let stack = StackCompiler::compile(&config, &args.collection_ref)?;
    let manifest = stack.manifest()?;

    let rendered = match args.output {
        OutputFormat::Json => manifest.to_json()?,
        OutputFormat::Yaml => manifest.to_yaml()?,
    };
    println!("{rendered}");
    Ok(())
}
