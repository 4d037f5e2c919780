use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::info;

use eventdex::config::{CatalogKind, EmbeddingBackend};
use eventdex::display::{create_events_table, create_health_table, create_search_table};
use eventdex::io::ExitCode;
use eventdex::refresh::RefreshEvent;
use eventdex::{EventSearchService, Settings, logging};

/// Semantic event search
#[derive(Parser)]
#[command(
    name = "eventdex",
    version = env!("CARGO_PKG_VERSION"),
    about = "Semantic search over an event catalog",
    long_about = "Index an event catalog into embeddings, keep the index fresh, and answer natural-language queries.",
    next_line_help = true
)]
struct Cli {
    /// Path to custom settings.toml file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Read events from this JSON file instead of the configured catalog
    #[arg(long, global = true, env = "EVENTDEX_CATALOG_FILE")]
    catalog: Option<PathBuf>,

    /// Override the embedding backend
    #[arg(long, global = true, value_enum)]
    backend: Option<BackendArg>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum BackendArg {
    Fastembed,
    Hash,
}

impl From<BackendArg> for EmbeddingBackend {
    fn from(arg: BackendArg) -> Self {
        match arg {
            BackendArg::Fastembed => EmbeddingBackend::Fastembed,
            BackendArg::Hash => EmbeddingBackend::Hash,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Set up .eventdex directory with default configuration")]
    Init {
        /// Force overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },

    #[command(about = "Display active settings")]
    Config,

    #[command(about = "Rebuild the index from the catalog now")]
    Refresh {
        #[arg(long)]
        json: bool,
    },

    #[command(about = "Search events with a natural-language query")]
    Search {
        /// e.g. "free tech meetup in san francisco"
        query: String,

        /// Include private events owned by this user
        #[arg(short, long)]
        user: Option<String>,

        #[arg(long)]
        json: bool,
    },

    #[command(about = "List indexed events in catalog order")]
    Events {
        #[arg(short, long)]
        limit: Option<usize>,

        #[arg(long)]
        json: bool,
    },

    #[command(about = "Show index health and refresh status")]
    Health {
        #[arg(long)]
        json: bool,
    },

    #[command(about = "Keep the index fresh on the configured interval until Ctrl-C")]
    Watch,
}

#[tokio::main]
async fn main() -> std::process::ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(code) => code.into(),
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::GeneralError.into()
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let loaded = match &cli.config {
        Some(path) => Settings::load_from(path),
        None => Settings::load(),
    };
    let mut settings = match loaded {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            return Ok(ExitCode::ConfigError);
        }
    };

    // CLI overrides
    if let Some(path) = cli.catalog {
        settings.catalog.kind = CatalogKind::JsonFile;
        settings.catalog.path = Some(path);
    }
    if let Some(backend) = cli.backend {
        settings.embedding.backend = backend.into();
    }

    logging::init(&settings.logging);

    match cli.command {
        Commands::Init { force } => {
            match Settings::init_config_file(force) {
                Ok(path) => {
                    println!("Created configuration file at: {}", path.display());
                    println!("Edit this file to customize your settings.");
                    Ok(ExitCode::Success)
                }
                Err(e) => {
                    eprintln!("Error: {e}");
                    Ok(ExitCode::GeneralError)
                }
            }
        }

        Commands::Config => {
            println!("Current Configuration:");
            println!("{}", "=".repeat(50));
            println!(
                "{}",
                toml::to_string_pretty(&settings).context("serializing settings")?
            );
            Ok(ExitCode::Success)
        }

        command => {
            let service = match EventSearchService::from_settings(&settings) {
                Ok(service) => service,
                Err(e) => {
                    eprintln!("Error [{}]: {e}", e.status_code());
                    return Ok(ExitCode::from_startup_error(&e));
                }
            };
            run_service_command(&service, command).await
        }
    }
}

async fn run_service_command(
    service: &EventSearchService,
    command: Commands,
) -> anyhow::Result<ExitCode> {
    match command {
        Commands::Refresh { json } => {
            let outcome = service.manual_refresh().await;
            if json {
                println!("{}", serde_json::to_string_pretty(&outcome)?);
            } else {
                println!("Refresh {outcome}");
            }
            Ok(ExitCode::from_refresh(&outcome))
        }

        Commands::Search { query, user, json } => {
            ensure_index(service).await;
            let hits = match service.search(&query, user.as_deref()) {
                Ok(hits) => hits,
                Err(e) => {
                    eprintln!("Error [{}]: {e}", e.status_code());
                    return Ok(ExitCode::GeneralError);
                }
            };
            if json {
                println!("{}", serde_json::to_string_pretty(&hits)?);
            } else if hits.is_empty() {
                println!("No events found for '{query}'");
            } else {
                println!("{}", create_search_table(&hits));
            }
            Ok(ExitCode::from_results(&hits))
        }

        Commands::Events { limit, json } => {
            ensure_index(service).await;
            let page = service.get_all(limit);
            if json {
                println!("{}", serde_json::to_string_pretty(&page)?);
            } else {
                println!("{}", create_events_table(&page.events));
                println!("Showing {} of {} events", page.events.len(), page.total);
            }
            Ok(ExitCode::from_results(&page.events))
        }

        Commands::Health { json } => {
            let health = service.health();
            if json {
                let report = serde_json::json!({
                    "health": health,
                    "status": service.status(),
                });
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("{}", create_health_table(&health, &service.status()));
            }
            Ok(ExitCode::Success)
        }

        Commands::Watch => {
            let cancel = CancellationToken::new();
            let mut events = service.subscribe();
            let scheduler = service.start_scheduler(cancel.clone());

            loop {
                tokio::select! {
                    signal = tokio::signal::ctrl_c() => {
                        signal.context("listening for Ctrl-C")?;
                        info!("shutting down");
                        break;
                    }
                    event = events.recv() => match event {
                        Ok(RefreshEvent::Published { entries, skipped }) => {
                            println!("Published snapshot: {entries} entries, {skipped} skipped");
                        }
                        Ok(RefreshEvent::Failed { reason }) => {
                            eprintln!("Refresh failed: {reason}");
                        }
                        Ok(_) => {}
                        Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                            info!(missed = n, "refresh event listener lagged");
                        }
                        Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                    }
                }
            }

            cancel.cancel();
            scheduler.await.context("waiting for the scheduler to stop")?;
            Ok(ExitCode::Success)
        }

        Commands::Init { .. } | Commands::Config => Ok(ExitCode::Success),
    }
}

/// One-shot commands build the index on first use when nothing is persisted.
async fn ensure_index(service: &EventSearchService) {
    if !service.health().index_ready {
        info!("no index yet, refreshing before answering");
        let outcome = service.manual_refresh().await;
        if !outcome.is_success() {
            eprintln!("Warning: refresh {outcome}");
        }
    }
}
