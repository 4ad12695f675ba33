use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Local;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use otb_sink::{RestSinkClient, SinkConfig, SinkReplacer, SinkStore};
use otb_source::{PgSourceStore, SourceStore};
use otb_sync::{jobs, start_scheduler, Orchestrator, SyncConfig};
use otb_web::AppState;

#[derive(Debug, Parser)]
#[command(name = "otb-cli")]
#[command(about = "On-the-books dashboard replicator")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run one replication pass now, ignoring operating hours.
    Sync,
    /// Run the scheduler and the web API (default).
    Serve,
    /// Report whether the operating-hours gate is currently open.
    Gate,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();
    let config = SyncConfig::from_env();

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Sync => {
            let orchestrator = build_orchestrator(&config).await?;
            let outcomes = orchestrator.run_all_ungated().await;
            if outcomes.is_empty() {
                println!("sync skipped: sink store not configured");
                return Ok(());
            }
            for outcome in &outcomes {
                match &outcome.error {
                    None => println!("{}: ok, {} rows", outcome.job, outcome.rows),
                    Some(err) => println!("{}: FAILED ({err})", outcome.job),
                }
            }
            let failed = outcomes.iter().filter(|o| !o.ok).count();
            println!("done: {} jobs, {} failed", outcomes.len(), failed);
        }
        Commands::Serve => {
            let orchestrator = Arc::new(build_orchestrator(&config).await?);
            let mut scheduler = start_scheduler(orchestrator.clone(), config.sync_interval).await?;
            otb_web::serve(AppState::new(orchestrator), config.web_port).await?;
            scheduler.shutdown().await.ok();
        }
        Commands::Gate => {
            let now = Local::now();
            let open = config.gate().is_open(now);
            println!(
                "{} local: gate {} ({:02}:00-{:02}:00)",
                now.format("%Y-%m-%d %H:%M"),
                if open { "open" } else { "closed" },
                config.gate_start_hour,
                config.gate_end_hour
            );
        }
    }

    Ok(())
}

async fn build_orchestrator(config: &SyncConfig) -> Result<Orchestrator> {
    let source = PgSourceStore::connect(&config.source_database_url)
        .await
        .context("connecting to the source store")?;
    let source: Arc<dyn SourceStore> = Arc::new(source);

    let sink = match SinkConfig::from_env() {
        Some(sink_config) => {
            let client = RestSinkClient::new(sink_config).context("building the sink client")?;
            Some(Arc::new(client) as Arc<dyn SinkStore>)
        }
        None => {
            info!("sink credentials absent; running source-only");
            None
        }
    };

    Ok(Orchestrator::new(
        source,
        Arc::new(SinkReplacer::new(sink)),
        config.gate(),
        jobs::registry(),
    ))
}
