//! trader-init — provisions the local trader and twitter stores
//!
//! Usage:
//!   trader-init --home ~/.trader           — create missing stores
//!   trader-init --home ~/.trader verify    — check both stores against their seed data

use clap::{Parser, Subcommand};
use persistence::repository::{
    verify_store, ApiServiceRecord, BrokerRecord, FollowedAccountRecord, FollowingRepository,
    NamedRecord, ReferenceRepository,
};
use persistence::{Database, Initializer, StoreKind, StoreOutcome, REMEDIATION};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{error, info};

const APP_VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), "-", env!("GIT_HASH"));

#[derive(Parser)]
#[command(name = "trader-init")]
#[command(about = "Create and seed the trader and twitter SQLite stores", long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Directory holding trader.db and twitter.db
    #[arg(long, global = true, default_value = ".")]
    home: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create any missing store (default)
    Init,
    /// Check both stores against the declared schema and seed rows
    Verify {
        /// Print the reference data as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Serialize)]
struct ReferenceSummary {
    schema_version: u32,
    strategies: Vec<NamedRecord>,
    actions: Vec<NamedRecord>,
    statuses: Vec<NamedRecord>,
    brokers: Vec<BrokerRecord>,
    api_services: Vec<ApiServiceRecord>,
    following: Vec<FollowedAccountRecord>,
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = if verbose {
        EnvFilter::new("debug,persistence=debug,trader_init=debug")
    } else {
        EnvFilter::new("info,persistence=info,trader_init=info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).compact())
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command.unwrap_or(Commands::Init) {
        Commands::Init => cmd_init(&cli.home).await?,
        Commands::Verify { json } => cmd_verify(&cli.home, json).await?,
    }

    Ok(())
}

// ============================================================================
// Init command
// ============================================================================

async fn cmd_init(home: &Path) -> anyhow::Result<()> {
    info!("trader-init v{} starting...", APP_VERSION);

    let report = Initializer::new(home).run().await;
    for store in &report.stores {
        match &store.result {
            Ok(StoreOutcome::Created) => println!("created  {}", store.path.display()),
            Ok(StoreOutcome::Skipped) => println!("present  {}", store.path.display()),
            Err(e) => println!("failed   {}: {}", store.path.display(), e),
        }
    }

    report
        .into_result()
        .map_err(|e| anyhow::anyhow!("Database initialization failed: {}", e))?;
    Ok(())
}

// ============================================================================
// Verify command
// ============================================================================

async fn cmd_verify(home: &Path, json: bool) -> anyhow::Result<()> {
    let trader = open_verified(home, StoreKind::Trader).await?;
    let twitter = open_verified(home, StoreKind::Twitter).await?;

    let reference = ReferenceRepository::new(trader.pool());
    let summary = ReferenceSummary {
        schema_version: trader.schema_version().await?,
        strategies: reference.strategies().await?,
        actions: reference.actions().await?,
        statuses: reference.statuses().await?,
        brokers: reference.brokers().await?,
        api_services: reference.api_services().await?,
        following: FollowingRepository::new(twitter.pool()).following().await?,
    };

    trader.close().await;
    twitter.close().await;

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    println!("\n=== trader-init v{} ===", APP_VERSION);
    println!("Home:           {}", home.display());
    println!("Schema version: {}", summary.schema_version);
    println!("Strategies:     {}", names(&summary.strategies));
    println!("Actions:        {}", names(&summary.actions));
    println!("Statuses:       {}", names(&summary.statuses));
    for broker in &summary.brokers {
        let state = if broker.supported { "supported" } else { "unsupported" };
        println!("Broker:         {} ({})", broker.name, state);
    }
    for api in &summary.api_services {
        println!("API:            {} [{}]", api.service, api.inputs.join(", "));
    }
    for account in &summary.following {
        println!("Following:      @{} ({})", account.username, account.name);
    }
    Ok(())
}

async fn open_verified(home: &Path, kind: StoreKind) -> anyhow::Result<Database> {
    let path = home.join(kind.file_name());
    let db = Database::open(&path).await.map_err(|e| {
        error!("Failed to open {} database: {}", kind, e);
        anyhow::anyhow!("{} ({})", e, REMEDIATION)
    })?;

    if let Err(e) = verify_store(kind, db.pool()).await {
        error!("{} database does not match its seed data: {}", kind, e);
        return Err(anyhow::anyhow!("{} ({})", e, REMEDIATION));
    }
    info!("{} database verified: {}", kind, path.display());
    Ok(db)
}

fn names(records: &[NamedRecord]) -> String {
    records
        .iter()
        .map(|r| r.name.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}
