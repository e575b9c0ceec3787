#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::missing_errors_doc, clippy::missing_panics_doc)]

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use conductor::Config;
use conductor::credentials::{infer_provider, normalize_provider};
use conductor::executor::{Executor, HttpAgentBackend};
use conductor::notify::Notifier;
use conductor::oracle::HttpOracle;
use conductor::orchestrator::Orchestrator;
use conductor::registry::{CapabilityStatus, NewCapability, Registry, SqliteRegistry};
use conductor::routing::{ArbiterClient, Router};
use conductor::server;
use conductor::synthesis::{CapabilitySynthesizer, load_template};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "conductor", version, about = "Capability-routing task orchestrator")]
struct Cli {
    /// Path to config.toml (defaults to the platform config directory).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the intake server.
    Serve {
        /// Bind host override.
        #[arg(long)]
        host: Option<String>,
        /// Bind port override.
        #[arg(long)]
        port: Option<u16>,
    },
    /// Store a provider credential so gated capabilities can run.
    StoreCredential {
        /// Provider tag, e.g. `stripe` or `google_search_console`.
        provider: String,
        /// The secret value.
        secret: String,
    },
    /// Register a capability from a JSON template file.
    InstallTemplate {
        /// Path to `{name, description, system_prompt}` JSON.
        path: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Command::Serve { host, port } => {
            let host = host.unwrap_or_else(|| config.server.host.clone());
            let port = port.unwrap_or(config.server.port);
            let orchestrator = build_orchestrator(&config).await?;
            server::run(&host, port, orchestrator).await
        }
        Command::StoreCredential { provider, secret } => {
            let provider = normalize_provider(Some(&provider))
                .context("provider tag must contain at least one alphanumeric character")?;
            let registry = open_registry(&config).await?;
            registry.store_credential(&provider, &secret).await?;
            println!("stored credential for provider '{provider}'");
            Ok(())
        }
        Command::InstallTemplate { path } => {
            let spec = load_template(&path).await?;
            let required_provider =
                infer_provider(&format!("{}\n{}\n{}", spec.name, spec.description, spec.instructions))
                    .map(ToString::to_string);
            let registry = open_registry(&config).await?;
            let capability = registry
                .insert_if_absent(&NewCapability {
                    name: spec.name,
                    description: spec.description,
                    instructions: spec.instructions,
                    status: CapabilityStatus::Ready,
                    required_provider,
                })
                .await?;
            println!("installed capability '{}'", capability.name);
            Ok(())
        }
    }
}

async fn open_registry(config: &Config) -> Result<Arc<SqliteRegistry>> {
    let db_path = config.registry.resolved_db_path();
    Ok(Arc::new(SqliteRegistry::new(&db_path).await?))
}

async fn build_orchestrator(config: &Config) -> Result<Arc<Orchestrator>> {
    let registry = open_registry(config).await?;

    let oracle = Arc::new(HttpOracle::new(
        &config.oracle.base_url,
        &config.oracle.model,
        config.oracle.temperature,
        config.oracle.api_key.as_deref(),
        config.oracle.timeout_secs,
    ));

    let router = Router::new(
        config.routing,
        ArbiterClient::new(Arc::clone(&oracle) as Arc<dyn conductor::oracle::Oracle>, config.arbiter),
    );
    let synthesizer = CapabilitySynthesizer::new(
        Arc::clone(&oracle) as Arc<dyn conductor::oracle::Oracle>,
        config.execution.timeout_secs,
    );
    let executor = Executor::new(
        Arc::new(HttpAgentBackend::new(
            &config.backend.base_url,
            config.backend.api_key.as_deref(),
        )),
        config.execution,
    );
    let notifier = Notifier::new(
        config.notify.webhook_url.as_deref(),
        config.notify.api_key.as_deref(),
        config.notify.dry_run,
    );

    Ok(Arc::new(Orchestrator::new(
        registry as Arc<dyn Registry>,
        router,
        synthesizer,
        executor,
        notifier,
        config.execution.timeout_secs,
        config.notify.progress_updates,
    )))
}
