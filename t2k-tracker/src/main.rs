//! t2k-tracker - NPO Radio 2 Top 2000 live tracker
//!
//! Polls the station's "now playing" sources, resolves each airing to the
//! chart, publishes current + upcoming songs with trend and cover art, and
//! issues notifications for songs users care about.
//!
//! Serves a read-only HTTP API (default `127.0.0.1:5730`) with `/health`,
//! `/state`, `/current`, `/upcoming` and an SSE stream at `/events`.
//!
//! Subcommands edit the database and exit:
//!
//! - `rules list|add|remove|enable|disable`: notification rules
//! - `notify`: show or change notification settings
//! - `init-config`: write the effective configuration as TOML
//!
//! A running tracker picks up rule and settings changes on its next reload.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::sync::Arc;
use t2k_common::config::{
    get_user_agent, load_toml_config_or_default, user_config_path, write_toml_config,
    RootFolderInitializer, RootFolderResolver, TomlConfig,
};
use t2k_common::events::EventBus;
use t2k_tracker::chart::ChartStore;
use t2k_tracker::config::TrackerSettings;
use t2k_tracker::coordinator::{CoordinatorConfig, Pipeline, UpdateCoordinator};
use t2k_tracker::coverart::{CoverArtResolver, MusicBrainzCoverArt};
use t2k_tracker::matcher::FuzzyMatcher;
use t2k_tracker::models::{ChartEntry, RuleId, RuleKind};
use t2k_tracker::notify::{EventBusSink, FanoutSink, LogSink, NotificationSink};
use t2k_tracker::scraper::http::build_client;
use t2k_tracker::scraper::{
    AiringSource, EmbeddedDataSource, MetadataScraper, PlaylistPageSource, StructuredSource,
};
use t2k_tracker::service::TrackerService;
use t2k_tracker::trend::TrendEngine;
use t2k_tracker::{db, reload, AppState};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "t2k-tracker", version, about = "NPO Radio 2 Top 2000 live tracker")]
struct Args {
    /// TOML config file (default: ~/.config/t2k/config.toml)
    #[arg(long, env = "T2K_CONFIG")]
    config: Option<PathBuf>,

    /// Root folder holding the chart database (env: T2K_ROOT_FOLDER)
    #[arg(long)]
    root_folder: Option<PathBuf>,

    /// Chart database path (default: <root_folder>/top2000.db)
    #[arg(long)]
    database: Option<PathBuf>,

    /// Import a JSON chart seed into the database before starting
    #[arg(long)]
    seed_json: Option<PathBuf>,

    /// HTTP bind address (overrides [http] bind)
    #[arg(long)]
    bind: Option<String>,

    /// Run a single poll, print the snapshot as JSON and exit
    #[arg(long)]
    once: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Manage notification rules
    Rules {
        #[command(subcommand)]
        action: RulesAction,
    },

    /// Show notification settings, or change the given fields
    Notify(NotifyArgs),

    /// Write the effective configuration to the config file
    InitConfig {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[derive(Subcommand, Debug)]
enum RulesAction {
    /// Print every stored rule
    List,

    /// Add an enabled rule
    Add {
        /// `artist` or `title`
        #[arg(long)]
        kind: String,

        /// Case-insensitive substring to look for
        #[arg(long)]
        pattern: String,
    },

    Remove { id: i64 },

    Enable { id: i64 },

    Disable { id: i64 },
}

#[derive(clap::Args, Debug)]
struct NotifyArgs {
    /// Replace the target list (comma separated, e.g. persistent_notification,mobile_app_phone)
    #[arg(long, value_delimiter = ',')]
    targets: Option<Vec<String>>,

    /// Notify when a matching song starts playing
    #[arg(long)]
    current: Option<bool>,

    /// Notify when a matching song is coming up
    #[arg(long)]
    upcoming: Option<bool>,

    /// Upcoming offsets to notify about (comma separated, 1 = next song)
    #[arg(long, value_delimiter = ',')]
    positions: Option<Vec<u32>>,
}

fn init_tracing(config: &TomlConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.logging.level))
        .context("Invalid log level")?;

    match &config.logging.file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(std::sync::Mutex::new(file))
                .init();
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
    Ok(())
}

fn init_config(config: &TomlConfig, path: Option<PathBuf>, force: bool) -> Result<()> {
    let Some(path) = path.or_else(user_config_path) else {
        bail!("No config directory on this platform; pass --config");
    };
    if path.exists() && !force {
        bail!("{} already exists; pass --force to overwrite", path.display());
    }

    write_toml_config(config, &path)?;
    info!("Wrote config to {}", path.display());
    println!("{}", path.display());
    Ok(())
}

async fn run_rules(pool: &SqlitePool, action: RulesAction) -> Result<()> {
    let (id, enabled) = match action {
        RulesAction::List => {
            for rule in db::notifications::load_rules(pool).await?.iter() {
                let state = if rule.enabled { "enabled" } else { "disabled" };
                println!("{}\t{}\t{}\t{}", rule.id, rule.kind.as_str(), state, rule.pattern);
            }
            return Ok(());
        }
        RulesAction::Add { kind, pattern } => {
            let kind: RuleKind = kind.parse()?;
            let rule = db::notifications::add_rule(pool, kind, &pattern).await?;
            println!("{}", rule.id);
            return Ok(());
        }
        RulesAction::Remove { id } => {
            if !db::notifications::delete_rule(pool, RuleId(id)).await? {
                bail!("No rule with id {}", id);
            }
            info!(rule_id = id, "Notification rule removed");
            return Ok(());
        }
        RulesAction::Enable { id } => (id, true),
        RulesAction::Disable { id } => (id, false),
    };

    if !db::notifications::set_rule_enabled(pool, RuleId(id), enabled).await? {
        bail!("No rule with id {}", id);
    }
    info!(rule_id = id, enabled, "Notification rule updated");
    Ok(())
}

async fn run_notify(pool: &SqlitePool, args: NotifyArgs) -> Result<()> {
    let mut settings = db::notifications::load_settings(pool).await?;
    let mut changed = false;

    if let Some(targets) = args.targets {
        settings.targets = targets
            .into_iter()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();
        changed = true;
    }
    if let Some(current) = args.current {
        settings.notify_current = current;
        changed = true;
    }
    if let Some(upcoming) = args.upcoming {
        settings.notify_upcoming = upcoming;
        changed = true;
    }
    if let Some(positions) = args.positions {
        if positions.contains(&0) {
            bail!("Upcoming positions start at 1");
        }
        settings.upcoming_positions = positions.into_iter().collect();
        changed = true;
    }

    if changed {
        db::notifications::save_settings(pool, &settings).await?;
        info!("Notification settings saved");
    }
    println!("{}", serde_json::to_string_pretty(&settings)?);
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = load_toml_config_or_default(args.config.as_deref())?;
    init_tracing(&config)?;

    info!(
        "Starting t2k-tracker v{} ({}, built {}, {})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    if let Some(Command::InitConfig { force }) = args.command {
        return init_config(&config, args.config.clone(), force);
    }

    let settings = TrackerSettings::from_toml(&config)?;

    // Root folder: CLI → ENV → TOML → OS default
    let root_folder = RootFolderResolver::new("tracker")
        .with_cli_arg(args.root_folder.clone())
        .with_toml_root(config.root_folder.clone())
        .resolve();
    let initializer = RootFolderInitializer::new(root_folder);
    initializer
        .ensure_directory_exists()
        .map_err(|e| anyhow::anyhow!("Failed to initialize root folder: {}", e))?;

    let db_path = match args.database.clone().or_else(|| config.database_path.clone()) {
        Some(path) => path,
        None => {
            if !initializer.database_exists() {
                info!("No database in root folder yet, creating one");
            }
            initializer.database_path()
        }
    };
    info!("Database: {}", db_path.display());
    let pool = db::init_database_pool(&db_path).await?;

    match args.command {
        Some(Command::Rules { action }) => return run_rules(&pool, action).await,
        Some(Command::Notify(notify)) => return run_notify(&pool, notify).await,
        Some(Command::InitConfig { .. }) | None => {}
    }

    if let Some(seed) = &args.seed_json {
        let seeded = ChartStore::from_json_file(seed, settings.edition_year)?;
        let entries: Vec<ChartEntry> = seeded.entries().map(|e| e.as_ref().clone()).collect();
        db::chart::save_chart(&pool, &entries).await?;
    }

    let chart = Arc::new(db::chart::load_chart(&pool, settings.edition_year).await?);
    if chart.is_empty() {
        anyhow::bail!(
            "Chart database {} is empty; import a chart with --seed-json",
            db_path.display()
        );
    }
    let rules = db::notifications::load_rules(&pool).await?;
    let notification_settings = db::notifications::load_settings(&pool).await?;

    let client = build_client(settings.tier_timeout)?;
    let tiers: Vec<Arc<dyn AiringSource>> = vec![
        Arc::new(StructuredSource::new(client.clone(), &settings.sources.structured)),
        Arc::new(EmbeddedDataSource::new(client.clone(), &settings.sources.embedded)?),
        Arc::new(PlaylistPageSource::new(client, &settings.sources.html)?),
    ];
    let lookup = MusicBrainzCoverArt::new(
        &settings.sources.musicbrainz,
        &settings.sources.cover_art_archive,
        get_user_agent(),
    )?;

    let event_bus = EventBus::new(100);
    let sink: Arc<dyn NotificationSink> = Arc::new(FanoutSink::new(vec![
        Arc::new(LogSink),
        Arc::new(EventBusSink::new(event_bus.clone())),
    ]));

    let pipeline = Pipeline {
        chart: Arc::clone(&chart),
        scraper: MetadataScraper::new(tiers, settings.tier_timeout, settings.metadata_ttl),
        matcher: FuzzyMatcher::new(settings.matching),
        trend: TrendEngine::new(settings.edition_year, settings.history_limit),
        cover_art: CoverArtResolver::new(Arc::new(lookup), settings.cover_art_ttl),
    };
    let coordinator = UpdateCoordinator::new(
        pipeline,
        sink,
        event_bus.clone(),
        CoordinatorConfig::from(&settings),
    )
    .with_rules(rules)
    .with_settings(notification_settings);
    let coordinator = Arc::new(coordinator);
    let service = TrackerService::new(Arc::clone(&coordinator), settings.update_interval);

    if args.once {
        let outcome = service.poll_once().await;
        info!(?outcome, "Single poll finished");
        println!("{}", serde_json::to_string_pretty(&*service.snapshot())?);
        return Ok(());
    }

    service.start().await;

    let shutdown = service.cancellation_token();
    let reloader = reload::spawn_reloader(
        pool.clone(),
        coordinator,
        settings.update_interval,
        shutdown.clone(),
    );
    if config.http.enabled {
        let bind = args.bind.clone().unwrap_or_else(|| config.http.bind.clone());
        let state = AppState::new(
            service.subscribe(),
            service.subscribe_diagnostics(),
            event_bus,
            chart.len(),
            chart.edition_year(),
        )
        .with_shutdown(shutdown.clone());
        let app = t2k_tracker::build_router(state);

        let listener = tokio::net::TcpListener::bind(&bind)
            .await
            .with_context(|| format!("Failed to bind {}", bind))?;
        info!("Listening on http://{}", bind);
        info!("Health check: http://{}/health", bind);

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                shutdown_signal().await;
                shutdown.cancel();
            })
            .await?;
    } else {
        warn!("HTTP API disabled");
        shutdown_signal().await;
    }

    info!("Shutting down");
    service.stop().await;
    if let Err(e) = reloader.await {
        warn!(error = %e, "Notification reloader ended abnormally");
    }

    Ok(())
}
