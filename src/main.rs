use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use cyphergen::config::{CliConfig, EngineConfig};
use cyphergen::{Operation, RequestContext, SchemaModel, TranslationEngine};

/// Cyphergen - translate a graph API operation into Cypher
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Schema definition file (YAML or JSON)
    #[arg(long)]
    schema: PathBuf,

    /// Operation file (JSON)
    #[arg(long)]
    operation: PathBuf,

    /// Request context file (JSON with optional `jwt` and `context`)
    #[arg(long)]
    context: Option<PathBuf>,

    /// Engine configuration file (YAML); overrides environment settings
    #[arg(long)]
    config: Option<PathBuf>,

    /// Enforce @authorization and @authentication rules
    #[arg(long)]
    authorization: bool,

    /// JWT claim alias, `name=dotted.path`; repeatable
    #[arg(long = "jwt-claim")]
    jwt_claims: Vec<String>,

    /// Return change events from mutations
    #[arg(long)]
    subscriptions: bool,

    /// Maximum relationship nesting depth
    #[arg(long, default_value_t = 32)]
    max_depth: usize,
}

impl From<&Cli> for CliConfig {
    fn from(cli: &Cli) -> Self {
        CliConfig {
            authorization_enabled: cli.authorization,
            jwt_claims: cli.jwt_claims.clone(),
            subscriptions_enabled: cli.subscriptions,
            max_depth: cli.max_depth,
        }
    }
}

fn load_config(cli: &Cli) -> anyhow::Result<EngineConfig> {
    let mut config = match &cli.config {
        Some(path) => EngineConfig::from_yaml_file(path)?,
        None => EngineConfig::from_env()?,
    };
    // Flags only override file and environment settings when given
    let flags = EngineConfig::from_cli(cli.into())?;
    config.authorization_enabled |= flags.authorization_enabled;
    config.subscriptions_enabled |= flags.subscriptions_enabled;
    config.jwt_claims.extend(flags.jwt_claims);
    if cli.max_depth != EngineConfig::default().max_depth {
        config.max_depth = flags.max_depth;
    }
    Ok(config)
}

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    // Defaults to INFO level, can be overridden with RUST_LOG env var
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = load_config(&cli).context("invalid engine configuration")?;

    let model = SchemaModel::from_file(&cli.schema)
        .with_context(|| format!("failed to load schema {}", cli.schema.display()))?;
    let operation: Operation = serde_json::from_str(
        &std::fs::read_to_string(&cli.operation)
            .with_context(|| format!("failed to read {}", cli.operation.display()))?,
    )
    .context("invalid operation")?;
    let request: RequestContext = match &cli.context {
        Some(path) => serde_json::from_str(
            &std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?,
        )
        .context("invalid request context")?,
        None => RequestContext::anonymous(),
    };

    let engine = TranslationEngine::new(Arc::new(model), config);
    let query = engine.translate(&operation, &request)?;

    println!("{}", query.text);
    println!();
    println!("{}", serde_json::to_string_pretty(&query.params)?);
    Ok(())
}
