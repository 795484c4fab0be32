//! Model Resolution CLI
//!
//! Resolves a declarative model and prints what emitters would consume.
//!
//! Usage:
//!   model-resolve resolve ./model
//!   model-resolve order ./model --module sales
//!   model-resolve imports ./model --module sales
//!   model-resolve dot ./model -o model.dot
//!   model-resolve config --output resolver.toml

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use entity_resolver::graph::to_dot;
use entity_resolver::model::load;
use entity_resolver::{ModelGraph, OutputFormat, Resolution, ResolverConfig};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "model-resolve")]
#[command(about = "Resolve relations, inheritance, emission order and imports of a domain model")]
struct Cli {
    /// Config file layered over the default locations
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the full resolution report as JSON
    Resolve {
        /// Model file or directory (default: [model].path)
        model: Option<PathBuf>,
    },

    /// Print the emission order
    Order {
        model: Option<PathBuf>,

        /// Only this module
        #[arg(short, long)]
        module: Option<String>,
    },

    /// Print the import facts of a module
    Imports {
        model: Option<PathBuf>,

        #[arg(short, long)]
        module: String,
    },

    /// Export the entity graph as GraphViz DOT
    Dot {
        model: Option<PathBuf>,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Write the effective configuration as TOML
    Config {
        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = ResolverConfig::load_from(cli.config.as_deref()).context("loading configuration")?;

    match cli.command {
        Commands::Resolve { model } => {
            let resolution = resolve(&config, model.as_deref())?;
            let report = resolution.report()?;
            let json = match config.report.output_format {
                OutputFormat::Pretty => serde_json::to_string_pretty(&report)?,
                OutputFormat::Compact => serde_json::to_string(&report)?,
            };
            println!("{}", json);
        }

        Commands::Order { model, module } => {
            let resolution = resolve(&config, model.as_deref())?;
            let graph = resolution.graph();
            let modules = match module {
                Some(name) => vec![find_module(graph, &name)?],
                None => graph.module_ids().collect(),
            };

            for module in modules {
                println!("{}:", graph.module(module).name);
                for entity in resolution.sequence_module(module)? {
                    let marker = if graph.entity(*entity).is_abstract { " (abstract)" } else { "" };
                    println!("  {}{}", graph.entity_name(*entity), marker);
                }
            }
        }

        Commands::Imports { model, module } => {
            let resolution = resolve(&config, model.as_deref())?;
            let module = find_module(resolution.graph(), &module)?;
            let imports = resolution.imports_for(module)?;
            println!("{}", serde_json::to_string_pretty(&imports)?);
        }

        Commands::Dot { model, output } => {
            let resolution = resolve(&config, model.as_deref())?;
            let dot = to_dot(resolution.graph());
            match output {
                Some(path) => {
                    std::fs::write(&path, &dot)
                        .with_context(|| format!("writing {}", path.display()))?;
                    info!(path = %path.display(), "DOT exported");
                }
                None => print!("{}", dot),
            }
        }

        Commands::Config { output } => match output {
            Some(path) => {
                config
                    .save(&path)
                    .with_context(|| format!("writing {}", path.display()))?;
                info!(path = %path.display(), "configuration written");
            }
            None => print!("{}", config.to_toml()?),
        },
    }

    Ok(())
}

fn resolve(config: &ResolverConfig, model: Option<&Path>) -> Result<Resolution> {
    let path = model.map(Path::to_path_buf).unwrap_or_else(|| config.model_path());
    let model = load(&path, &config.load_config())
        .with_context(|| format!("loading model from {}", path.display()))?;

    let resolution = Resolution::from_model(&model, &config.resolution)?;
    info!(
        modules = resolution.graph().module_count(),
        entities = resolution.graph().entity_count(),
        diagnostics = resolution.diagnostics().len(),
        "model resolved"
    );
    Ok(resolution)
}

fn find_module(graph: &ModelGraph, name: &str) -> Result<entity_resolver::ModuleId> {
    graph
        .find_module(name)
        .ok_or_else(|| anyhow!("unknown module '{}'", name))
}
