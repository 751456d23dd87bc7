use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tokio::sync::Mutex;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ladder_tracker::api::{build_router, state::AppState};
use ladder_tracker::calculate::{LeaderboardService, DEFAULT_TOP_N};
use ladder_tracker::config::AppConfig;
use ladder_tracker::fetch::Fetcher;
use ladder_tracker::parse_duration;
use ladder_tracker::storage::Store;
use ladder_tracker::sync::{SnapshotAssembler, SyncOrchestrator};

#[derive(Parser)]
#[command(name = "ladder-tracker")]
#[command(about = "Ranked ladder scraper with rating history and analytics")]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(long, default_value = "./config.toml")]
    config: PathBuf,

    /// Database file (overrides the config file)
    #[arg(long)]
    database: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error); overrides the config file
    #[arg(long)]
    log_level: Option<String>,

    /// Output logs as JSON
    #[arg(long)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scrape every configured target
    Scrape {
        /// Run once and exit (default)
        #[arg(long)]
        once: bool,

        /// Run continuously at interval
        #[arg(long, conflicts_with = "once")]
        watch: bool,

        /// Interval override for watch mode (e.g., "1h", "30m")
        #[arg(long)]
        interval: Option<String>,
    },

    /// Start the API server
    Serve {
        /// Bind address (overrides the config file)
        #[arg(long)]
        host: Option<String>,

        /// Port number (overrides the config file)
        #[arg(long)]
        port: Option<u16>,

        /// Also scrape periodically in the background
        #[arg(long)]
        scrape: bool,
    },

    /// Print analytics as JSON
    Query {
        #[command(subcommand)]
        action: QueryAction,
    },
}

#[derive(Args)]
struct LadderArgs {
    /// Upstream leaderboard id
    #[arg(long, default_value = "battlegrounds")]
    leaderboard: String,

    /// Upstream region code
    #[arg(long, default_value = "EU")]
    region: String,
}

#[derive(Subcommand)]
enum QueryAction {
    /// Ladders that have history
    Leaderboards,

    /// Row counts
    Stats,

    /// Top of the latest ladder snapshot
    Top {
        #[command(flatten)]
        ladder: LadderArgs,

        #[arg(long, default_value_t = DEFAULT_TOP_N)]
        limit: usize,
    },

    /// The whole latest ladder snapshot
    Ladder {
        #[command(flatten)]
        ladder: LadderArgs,
    },

    /// Biggest rating swings over the last 24 hours
    Movers {
        #[command(flatten)]
        ladder: LadderArgs,
    },

    /// Rating statistics for one player
    Player {
        battle_tag: String,

        #[command(flatten)]
        ladder: LadderArgs,
    },

    /// Most recent history rows for one player
    History {
        battle_tag: String,

        #[command(flatten)]
        ladder: LadderArgs,
    },

    /// Rating series for charting one player
    Chart {
        battle_tag: String,

        #[command(flatten)]
        ladder: LadderArgs,
    },

    /// Compare two players over the last 30 days
    Compare {
        first: String,
        second: String,

        #[command(flatten)]
        ladder: LadderArgs,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = AppConfig::load(&cli.config)
        .with_context(|| format!("Failed to load config from {}", cli.config.display()))?;
    if let Some(database) = &cli.database {
        config.database_path = database.clone();
    }

    init_tracing(cli.log_level.as_deref().unwrap_or(&config.log_level), cli.json_logs);

    tracing::info!("Starting ladder-tracker v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::Scrape {
            once: _,
            watch,
            interval,
        } => {
            if let Some(interval) = interval {
                if parse_duration(&interval).map_or(true, |d| d.is_zero()) {
                    bail!("Invalid --interval: {}", interval);
                }
                config.scrape.interval = interval;
            }

            let store = open_shared_store(&config)?;
            let orchestrator = build_orchestrator(&config, store)?;

            if watch {
                let orchestrator = Arc::new(orchestrator);
                tokio::select! {
                    _ = orchestrator.clone().run_periodic() => {}
                    _ = tokio::signal::ctrl_c() => {
                        tracing::info!("Interrupted, stopping scraper");
                        orchestrator.cancel().await;
                    }
                }
            } else {
                let report = orchestrator.sync_once().await?;
                print_json(&report)?;
                if report.succeeded() == 0 {
                    bail!("All {} targets failed", report.failed());
                }
            }
        }
        Commands::Serve { host, port, scrape } => {
            let store = open_shared_store(&config)?;

            if scrape {
                let orchestrator = Arc::new(build_orchestrator(&config, store.clone())?);
                tokio::spawn(orchestrator.run_periodic());
            }

            let app = build_router(AppState::new(store), &config.server.cors_origin);
            let addr = format!(
                "{}:{}",
                host.unwrap_or(config.server.host.clone()),
                port.unwrap_or(config.server.port)
            );
            let listener = tokio::net::TcpListener::bind(&addr).await?;
            tracing::info!("API listening on http://{}", addr);
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = tokio::signal::ctrl_c().await;
                })
                .await?;
        }
        Commands::Query { action } => {
            let store = Store::open(&config.database_path)?;
            run_query(&LeaderboardService::new(&store), action)?;
        }
    }

    Ok(())
}

fn init_tracing(level: &str, json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

fn open_shared_store(config: &AppConfig) -> Result<Arc<Mutex<Store>>> {
    let store = Store::open(&config.database_path).with_context(|| {
        format!(
            "Failed to open database {}",
            config.database_path.display()
        )
    })?;
    Ok(Arc::new(Mutex::new(store)))
}

fn build_orchestrator(config: &AppConfig, store: Arc<Mutex<Store>>) -> Result<SyncOrchestrator> {
    let fetcher_config = config.to_fetcher_config();
    let fetcher = Fetcher::http(&fetcher_config)?;
    let assembler = SnapshotAssembler::new(
        fetcher,
        fetcher_config.base_url.clone(),
        fetcher_config.page_concurrency,
    );
    Ok(SyncOrchestrator::new(config.to_sync_config()?, assembler, store))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn run_query(service: &LeaderboardService<'_>, action: QueryAction) -> Result<()> {
    let now = chrono::Utc::now();
    match action {
        QueryAction::Leaderboards => print_json(&service.available_leaderboards()?),
        QueryAction::Stats => print_json(&service.db_stats()?),
        QueryAction::Top { ladder, limit } => {
            print_json(&service.top_players(&ladder.leaderboard, &ladder.region, limit)?)
        }
        QueryAction::Ladder { ladder } => {
            print_json(&service.full_leaderboard(&ladder.leaderboard, &ladder.region)?)
        }
        QueryAction::Movers { ladder } => {
            print_json(&service.daily_movers(&ladder.leaderboard, &ladder.region, now)?)
        }
        QueryAction::Player { battle_tag, ladder } => print_json(&service.player_stats(
            &ladder.leaderboard,
            &ladder.region,
            &battle_tag,
        )?),
        QueryAction::History { battle_tag, ladder } => {
            match service.player_history(&ladder.leaderboard, &ladder.region, &battle_tag)? {
                Some(history) => print_json(&history),
                None => bail!("Player not found: {}", battle_tag),
            }
        }
        QueryAction::Chart { battle_tag, ladder } => print_json(&service.rating_chart(
            &ladder.leaderboard,
            &ladder.region,
            &battle_tag,
        )?),
        QueryAction::Compare {
            first,
            second,
            ladder,
        } => print_json(&service.compare(
            &ladder.leaderboard,
            &ladder.region,
            (first.as_str(), second.as_str()),
            now,
        )?),
    }
}
