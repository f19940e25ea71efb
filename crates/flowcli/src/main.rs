// crates/flowcli/src/main.rs

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use flowcore::{validate, Flow, NodeSettings, Schema, SharedState};
use flownodes::{register_core, DynamicRunnerNode};
use flowruntime::{
    DefinitionStore, NodeDefinition, NodeFactory, RegistrationManager, RegistryEvent,
    SharedRegistry,
};
use serde_json::json;
use std::path::{Path, PathBuf};
use tokio::sync::broadcast;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "flow")]
#[command(about = "Flow Engine CLI", long_about = None)]
struct Cli {
    /// Show debug output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a stored node definition
    Run {
        /// Definitions file or directory of *.json files
        #[arg(short, long)]
        defs: PathBuf,

        /// Name of the definition to run
        #[arg(short, long)]
        name: String,

        /// Initial shared state as a JSON object
        #[arg(short, long)]
        input: Option<String>,
    },

    /// List available node kinds
    Nodes {
        /// Only kinds in this domain, e.g. `core`
        #[arg(short, long)]
        category: Option<String>,
    },

    /// Validate a JSON value against a schema
    Validate {
        /// Path to schema JSON file
        #[arg(short, long)]
        schema: PathBuf,

        /// Path to value JSON file
        #[arg(long)]
        value: PathBuf,
    },

    /// Create an example definitions file
    Init {
        /// Output file path
        #[arg(short, long, default_value = "defs.json")]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)),
        )
        .init();

    match cli.command {
        Commands::Run { defs, name, input } => {
            run_definition(&defs, &name, input, cli.verbose).await?;
        }

        Commands::Nodes { category } => {
            list_nodes(category.as_deref()).await?;
        }

        Commands::Validate { schema, value } => {
            validate_value(&schema, &value)?;
        }

        Commands::Init { output } => {
            create_example_definitions(&output)?;
        }
    }

    Ok(())
}

/// Fresh registry with the core plugin, plus a receiver subscribed
/// before registration so it sees every registration event.
async fn default_registry() -> Result<(SharedRegistry, broadcast::Receiver<RegistryEvent>)> {
    let registry = RegistrationManager::new().into_shared();
    let events = registry.read().await.subscribe();
    register_core(&registry)
        .await
        .context("Failed to register core nodes")?;
    Ok((registry, events))
}

async fn run_definition(
    defs: &Path,
    name: &str,
    input: Option<String>,
    verbose: bool,
) -> Result<()> {
    println!("🚀 Loading definitions from: {}", defs.display());

    let store = DefinitionStore::load_path(defs)?;
    let definition = store.require(name)?;

    println!("📋 Definition: {} ({})", definition.key(), definition.kind);
    if let Some(description) = &definition.description {
        println!("   {}", description);
    }
    println!();

    let mut shared = match input {
        Some(input) => {
            let json: serde_json::Value =
                serde_json::from_str(&input).context("Input is not valid JSON")?;
            SharedState::try_from(json).context("Input must be a JSON object")?
        }
        None => SharedState::new(),
    };
    shared.insert(DynamicRunnerNode::DEFAULT_KEY, serde_json::to_value(definition)?);

    let (registry, mut events) = default_registry().await?;
    if verbose {
        while let Ok(event) = events.try_recv() {
            if let RegistryEvent::AfterRegister { kind, .. } = event {
                println!("  🔌 Registered {}", kind);
            }
        }
    }

    let mut flow = Flow::new(NodeSettings::new())?;
    flow.start(DynamicRunnerNode::new(NodeSettings::new(), &registry)?);

    let action = flow.run(&mut shared).await?;
    tracing::debug!("Shared state holds {} key(s)", shared.len());

    println!("✨ Finished with action: {}", action.as_deref().unwrap_or("(none)"));
    println!();
    println!("📤 Shared state:");
    println!("{}", serde_json::to_string_pretty(&shared)?);

    Ok(())
}

async fn list_nodes(category: Option<&str>) -> Result<()> {
    println!("📦 Available Node Kinds:");
    println!();

    let (registry, _) = default_registry().await?;
    let registry = registry.read().await;

    let kinds: Vec<String> = match category {
        Some(prefix) => registry
            .get_node_classes_by_category(prefix)
            .iter()
            .map(|factory| factory.kind().to_string())
            .collect(),
        None => registry.kinds(),
    };

    for kind in kinds {
        let owner = registry.owner_of(&kind).unwrap_or("-");
        match registry.get_metadata(&kind) {
            Some(metadata) if !metadata.description.is_empty() => {
                println!("  • {} [{}]", kind, owner);
                println!("    {}", metadata.description);
                for key in &metadata.reads {
                    let required = if key.required { " (required)" } else { "" };
                    println!("    reads  {}{}: {}", key.name, required, key.description);
                }
                for key in &metadata.writes {
                    println!("    writes {}: {}", key.name, key.description);
                }
            }
            _ => println!("  • {} [{}]", kind, owner),
        }
    }

    Ok(())
}

fn read_json(path: &Path) -> Result<serde_json::Value> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("Failed to parse {}", path.display()))
}

fn validate_value(schema: &Path, value: &Path) -> Result<()> {
    println!("🔍 Validating {} against {}", value.display(), schema.display());

    let schema: Schema = serde_json::from_value(read_json(schema)?).context("Invalid schema")?;
    let value = read_json(value)?;

    let result = validate(&value, &schema);
    if result.is_valid() {
        println!("✅ Value is valid");
        return Ok(());
    }

    let errors = result.into_errors();
    println!("❌ Value is invalid:");
    for error in &errors {
        println!("   - {}", error);
    }
    bail!("{} validation error(s)", errors.len())
}

fn create_example_definitions(output: &Path) -> Result<()> {
    let definitions = vec![
        NodeDefinition::new("core:set")
            .with_name("greet")
            .with_config(json!({ "values": { "greeting": "hello" } })),
        NodeDefinition::new("core:debug")
            .with_name("inspect")
            .with_config(json!({ "label": "example" })),
        NodeDefinition::new("core:delay")
            .with_name("pause")
            .with_config(json!({ "ms": 250 }))
            .with_retry(3, 100),
    ];

    let json = serde_json::to_string_pretty(&definitions)?;
    std::fs::write(output, json)?;

    println!("✨ Created example definitions: {}", output.display());
    println!();
    println!("Run one with:");
    println!(
        "  flow run --defs {} --name inspect --input '{{\"user\": \"ada\"}}'",
        output.display()
    );

    Ok(())
}
