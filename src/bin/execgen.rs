//! Execgen command line interface
//!
//! Generates type-specialized source files from their templates.
//!
//! # Usage
//!
//! ```bash
//! # Generate every registered output into the configured output dir
//! execgen
//!
//! # Generate one file into a specific directory
//! execgen min_max_agg.eg.rs --output-dir src/colexec
//!
//! # Print a generated file instead of writing it
//! execgen min_max_agg.eg.rs --stdout --no-fmt
//!
//! # List outputs and their template dependencies
//! execgen --list
//! ```

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;

use execgen::{ConfigLoader, GeneratorRegistry, OverloadTable};

#[derive(Parser)]
#[command(name = "execgen")]
#[command(version = "0.1.0")]
#[command(about = "Generate type-specialized aggregate kernels from templates")]
struct Cli {
    /// Outputs to generate (all when empty)
    outputs: Vec<String>,

    /// Config file (YAML)
    #[arg(long, short, env = "EXECGEN_CONFIG")]
    config: Option<PathBuf>,

    /// Directory holding template sources
    #[arg(long)]
    template_dir: Option<PathBuf>,

    /// Directory generated files are written to
    #[arg(long, short)]
    output_dir: Option<PathBuf>,

    /// Overload table (YAML) replacing the built-in same-type comparisons
    #[arg(long)]
    overloads: Option<PathBuf>,

    /// List outputs and template dependencies, then exit
    #[arg(long)]
    list: bool,

    /// Print generated source to stdout instead of writing files
    #[arg(long)]
    stdout: bool,

    /// Skip rustfmt
    #[arg(long)]
    no_fmt: bool,
}

fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let loader = match &cli.config {
        Some(path) => ConfigLoader::new(path),
        None => ConfigLoader::from_env(),
    };
    let mut config = loader
        .load()
        .with_context(|| format!("Failed to load {}", loader.config_path().display()))?;
    if let Some(dir) = cli.template_dir {
        config.template_dir = dir;
    }
    if let Some(dir) = cli.output_dir {
        config.output_dir = dir;
    }
    if cli.no_fmt {
        config.format = false;
    }

    let table = match &cli.overloads {
        Some(path) => {
            let yaml = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            OverloadTable::from_yaml_str(&yaml)
                .with_context(|| format!("Failed to parse {}", path.display()))?
        }
        None => OverloadTable::same_type_comparisons(),
    };

    let registry = GeneratorRegistry::builtin(&config, Arc::new(table));

    if cli.list {
        for (output, template) in registry.dependencies() {
            println!("{}\t{}", output, template.display());
        }
        return Ok(());
    }

    let outputs: Vec<String> = if cli.outputs.is_empty() {
        registry.outputs().into_iter().map(String::from).collect()
    } else {
        cli.outputs
    };

    for output in &outputs {
        if registry.get(output).is_none() {
            bail!(
                "Unknown output '{}'. Available: {:?}",
                output,
                registry.outputs()
            );
        }
    }

    if cli.stdout {
        let stdout = std::io::stdout();
        let mut lock = stdout.lock();
        for output in &outputs {
            let contents = registry
                .render(output, config.format)
                .with_context(|| format!("Failed to generate {}", output))?;
            lock.write_all(&contents)?;
        }
        return Ok(());
    }

    std::fs::create_dir_all(&config.output_dir)
        .with_context(|| format!("Failed to create {}", config.output_dir.display()))?;
    for output in &outputs {
        let path = registry
            .generate_to_dir(output, &config.output_dir, config.format)
            .with_context(|| format!("Failed to generate {}", output))?;
        eprintln!("generated {}", path.display());
    }

    Ok(())
}
