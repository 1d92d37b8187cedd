use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::AsyncReadExt;

use epic_sync::config::EpicSyncConfig;
use epic_sync::handler::handle_event_with_report;
use epic_sync::telemetry::init_telemetry;
use epic_sync::{server, ClubhouseClient, ResourceClient};

#[derive(Parser)]
#[command(name = "epic-sync")]
#[command(about = "Clubhouse webhook that moves epics between 'to do' and 'in progress' as their stories progress")]
struct Cli {
    /// Configuration file (defaults to ./epic-sync.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the webhook server
    Serve {
        /// Port to listen on (overrides configuration)
        #[arg(long)]
        port: Option<u16>,
    },
    /// Handle a single webhook delivery and print the acknowledged event
    Handle {
        /// Path to the event JSON, or '-' for stdin
        #[arg(long, default_value = "-")]
        event: String,
    },
    /// Show the effective configuration (token masked)
    Config,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    EpicSyncConfig::load_env_file()?;
    let mut settings = EpicSyncConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Config => {
            print!("{}", settings.to_toml_redacted()?);
            Ok(())
        }
        Commands::Serve { port } => {
            if let Some(port) = port {
                settings.server.port = port;
            }
            tokio::runtime::Runtime::new()?.block_on(async { serve_command(settings).await })
        }
        Commands::Handle { event } => {
            tokio::runtime::Runtime::new()?.block_on(async { handle_command(settings, &event).await })
        }
    }
}

fn build_client(settings: &EpicSyncConfig) -> Result<Arc<dyn ResourceClient>> {
    let token = settings.api_token()?.to_string();
    let client = ClubhouseClient::new(&settings.clubhouse, token)
        .context("Failed to build Clubhouse HTTP client")?;
    Ok(Arc::new(client))
}

async fn serve_command(settings: EpicSyncConfig) -> Result<()> {
    init_telemetry(&settings.observability.log_level, settings.observability.json_logs)?;
    let client = build_client(&settings)?;

    server::serve(&settings.server, client).await
}

async fn handle_command(settings: EpicSyncConfig, event_path: &str) -> Result<()> {
    init_telemetry(&settings.observability.log_level, settings.observability.json_logs)?;
    let client = build_client(&settings)?;

    let body = if event_path == "-" {
        let mut body = String::new();
        tokio::io::stdin()
            .read_to_string(&mut body)
            .await
            .context("Failed to read event from stdin")?;
        body
    } else {
        tokio::fs::read_to_string(event_path)
            .await
            .with_context(|| format!("Failed to read event from {event_path}"))?
    };

    let report = handle_event_with_report(client.as_ref(), &body).await?;

    if report.side_effect_fired {
        eprintln!("🔄 Side effect fired: {} epic transition(s)", report.transitions.len());
        for transition in &report.transitions {
            eprintln!(
                "   → epic {}: state {} → {}",
                transition.epic_id, transition.from, transition.to
            );
        }
    } else {
        eprintln!(
            "📋 No actionable side effect in event {}",
            report.event.id.as_deref().unwrap_or("<no id>")
        );
    }

    println!("{}", serde_json::to_string_pretty(&report.event)?);
    Ok(())
}
