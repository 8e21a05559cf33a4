//! conveyor - graph runtime for the Conveyor data-integration engine
//!
//! # Usage
//!
//! ```bash
//! # Run the graph described by a config file
//! conveyor -c conveyor.yaml
//!
//! # Validate the configuration and print the wiring
//! conveyor -c conveyor.yaml validate
//!
//! # List registered component types
//! conveyor components
//!
//! # Show the config schema for a component type
//! conveyor schema sequence
//! ```
//!
//! Exit code is 0 iff every source loop ended by exhaustion (or a
//! requested stop); non-zero if any loop died on an unrouted failure.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use conveyor_core::components::{FieldTransformConfig, SequenceSourceConfig, StdoutSinkConfig};
use conveyor_core::{ComponentRegistry, EngineConfig, EngineError};

#[derive(Parser)]
#[command(name = "conveyor")]
#[command(version, about = "Graph runtime for the Conveyor data-integration engine")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "conveyor.yaml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the configured graph (default)
    Run,
    /// Validate the configuration file and print the wiring
    Validate,
    /// List registered component types
    Components,
    /// Show the config schema for a component type
    Schema {
        /// Component type (e.g. sequence, field-transform, stdout)
        component: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    // commands that don't need config
    match &cli.command {
        Some(Commands::Components) => return list_components(),
        Some(Commands::Schema { component }) => return show_schema(component),
        _ => {}
    }

    let config = EngineConfig::from_file(&cli.config)
        .with_context(|| format!("Failed to load config from {}", cli.config.display()))?;

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run(config).await,
        Commands::Validate => validate(config),
        Commands::Components | Commands::Schema { .. } => unreachable!(), // handled above
    }
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();
}

async fn run(config: EngineConfig) -> Result<()> {
    info!("Starting conveyor");

    let registry = ComponentRegistry::with_builtins();
    let adaptor = Arc::new(build_adaptor(&config, &registry)?);

    // cooperative shutdown on Ctrl+C; in-flight dispatch finishes first
    {
        let adaptor = adaptor.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Received shutdown signal (Ctrl+C)");
                adaptor.stop();
            }
        });
    }

    let summary = match adaptor.run().await {
        Ok(summary) => summary,
        Err(e) => {
            report_engine_error(&e);
            std::process::exit(1);
        }
    };

    for report in &summary.loops {
        match &report.result {
            Ok(end) => info!(
                source = %report.node,
                records_in = report.records_in,
                sink_arrivals = report.outcome.sink_arrivals,
                "source finished: {:?}",
                end
            ),
            Err(e) => error!(source = %report.node, error = %e, "source failed"),
        }
    }

    std::process::exit(summary.exit_code());
}

fn validate(config: EngineConfig) -> Result<()> {
    let registry = ComponentRegistry::with_builtins();
    let adaptor = build_adaptor(&config, &registry)?;

    println!("✓ Configuration valid!\n");

    println!("Adaptor: {}", adaptor.name());
    println!("Settings:");
    println!("  Poll timeout: {}ms", config.settings.poll_timeout_ms);
    println!(
        "  Mode: {}",
        if config.settings.concurrent {
            "concurrent (one task per source)"
        } else {
            "sequential"
        }
    );
    println!(
        "  History: {}",
        if config.settings.history {
            "enabled"
        } else {
            "disabled"
        }
    );
    println!();

    let map = adaptor.map();
    println!("Nodes ({}):", map.nodes().len());
    for node in map.nodes() {
        let process: Vec<&str> = map
            .process_destinations(node.id())
            .iter()
            .map(|n| n.id())
            .collect();
        let discard: Vec<&str> = map
            .discard_destinations(node.id())
            .iter()
            .map(|n| n.id())
            .collect();
        print!("  {} ({})", node.id(), node.kind_label());
        if !process.is_empty() {
            print!(" → {:?}", process);
        }
        if !discard.is_empty() {
            print!(" discard → {:?}", discard);
        }
        println!();
        for (kind, destinations) in map.error_bindings(node.id()) {
            let ids: Vec<&str> = destinations.iter().map(|n| n.id()).collect();
            println!("      on {} → {:?}", kind, ids);
        }
    }

    Ok(())
}

fn build_adaptor(
    config: &EngineConfig,
    registry: &ComponentRegistry,
) -> Result<conveyor_core::Adaptor> {
    let adaptor = config
        .build(registry)
        .map_err(|e| anyhow::anyhow!("{}", e))?;
    if let Err(e) = adaptor.validate() {
        report_engine_error(&e);
        anyhow::bail!("validation failed");
    }
    Ok(adaptor)
}

fn report_engine_error(error: &EngineError) {
    match error {
        EngineError::Validation(issues) => {
            eprintln!("✗ Validation failed with {} issue(s):", issues.len());
            for issue in issues {
                eprintln!("  - {}", issue);
            }
        }
        other => eprintln!("✗ {}", other),
    }
}

fn list_components() -> Result<()> {
    let registry = ComponentRegistry::with_builtins();

    println!("Available component types:\n");
    println!("Sources:");
    for name in registry.list_sources() {
        println!("  {}", name);
    }
    println!("Stages:");
    for name in registry.list_stages() {
        println!("  {}", name);
    }
    println!("Sinks:");
    for name in registry.list_sinks() {
        println!("  {}", name);
    }
    println!();
    println!("Use 'conveyor schema <component>' to see config options");

    Ok(())
}

fn show_schema(component: &str) -> Result<()> {
    use schemars::schema_for;

    let schema = match component {
        "sequence" => serde_json::to_value(schema_for!(SequenceSourceConfig))?,
        "field-transform" => serde_json::to_value(schema_for!(FieldTransformConfig))?,
        "stdout" => serde_json::to_value(schema_for!(StdoutSinkConfig))?,
        unknown => {
            anyhow::bail!(
                "Unknown component type: '{}'\nUse 'conveyor components' to list available types",
                unknown
            );
        }
    };

    println!("{}", serde_json::to_string_pretty(&schema)?);
    Ok(())
}
