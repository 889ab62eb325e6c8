//! Pipeline CRM - Main Server
//!
//! CRM backend with Neo4j storage, pipeline automation and an AI copilot.

use anyhow::Result;
use clap::{Parser, Subcommand};
use pipeline_crm::crm::seed::{seed_demo_data, SeedOutcome};
use pipeline_crm::neo4j::UserRole;
use pipeline_crm::{AppState, Config};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "crm-server")]
#[command(about = "Small-business CRM backend")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the API server
    Serve {
        /// Port to listen on (overrides config.yaml and SERVER_PORT)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Load the demo data set into the configured store
    Seed,

    /// Create allowlisted users that do not exist yet
    SetupUsers,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,pipeline_crm=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    // Load configuration
    let mut config = Config::from_env()?;

    match cli.command {
        Commands::Serve { port } => {
            if let Some(port) = port {
                config.server_port = port;
            }
            pipeline_crm::start_server(config).await
        }
        Commands::Seed => run_seed(config).await,
        Commands::SetupUsers => run_setup_users(config).await,
    }
}

async fn run_seed(config: Config) -> Result<()> {
    let state = AppState::new(config).await?;
    tracing::info!("Connected to Neo4j");

    // Demo records are owned by the first admin, if any
    let owner_id = state
        .store
        .list_users()
        .await?
        .into_iter()
        .find(|u| u.role == UserRole::Admin)
        .map(|u| u.user_id)
        .unwrap_or_else(|| "system".to_string());

    match seed_demo_data(state.store.as_ref(), &owner_id).await? {
        SeedOutcome::Seeded {
            organizations,
            opportunities,
            activities,
        } => tracing::info!(
            "Seed complete: {} organizations, {} opportunities, {} activities",
            organizations,
            opportunities,
            activities
        ),
        SeedOutcome::AlreadySeeded => tracing::info!("Data already seeded, nothing to do"),
    }

    Ok(())
}

async fn run_setup_users(config: Config) -> Result<()> {
    let state = AppState::new(config).await?;
    let report = state.provision_users().await?;

    tracing::info!(
        "User setup complete: {} created, {} already present",
        report.created.len(),
        report.existing.len()
    );
    for email in &report.created {
        tracing::info!(%email, "Created user with the default password");
    }

    Ok(())
}
