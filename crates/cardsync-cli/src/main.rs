//! cardsync - inspect and synchronize the offline deck/card cache.
//!
//! Every command reads from the local cache first; `sync` and `watch` talk
//! to the remote service when it is reachable.

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cardsync_core::config::Config;
use cardsync_core::guard::CleanupTier;
use cardsync_core::identity::{SessionData, SessionIdentity};
use cardsync_core::sync::{SkipReason, SyncOutcome};
use cardsync_core::utils::truncate_string;
use cardsync_core::Services;

// ============================================================================
// Constants
// ============================================================================

/// How often `watch` re-probes connectivity
const WATCH_PROBE_INTERVAL: Duration = Duration::from_secs(10);

/// Maximum characters of card text shown per line
const CARD_TEXT_WIDTH: usize = 48;

/// Log file prefix inside `log_dir`
const LOG_FILE_PREFIX: &str = "cardsync.log";

// ============================================================================
// Arguments
// ============================================================================

#[derive(Debug, Parser)]
#[command(name = "cardsync", version, about = "Offline-first deck and card cache")]
struct Cli {
    /// Config file to use instead of the default location
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Connectivity, owner and cache freshness
    Status,
    /// List decks (cache first)
    Decks,
    /// List cards of the given decks (cache first)
    Cards {
        #[arg(required = true)]
        deck_ids: Vec<String>,
    },
    /// Run a full resynchronization now
    Sync,
    /// Delete every cached image of the current owner
    PurgeAssets,
    /// Clear temporary image-editing files
    CleanTemp {
        #[arg(long, value_enum, default_value_t = TierArg::Gentle)]
        tier: TierArg,
    },
    /// Follow connectivity and resync whenever it comes back
    Watch,
    /// Inspect or change the persisted session
    Session {
        #[command(subcommand)]
        action: SessionAction,
    },
}

#[derive(Debug, Subcommand)]
enum SessionAction {
    Show,
    Set {
        owner_id: String,
        #[arg(long)]
        token: Option<String>,
    },
    Clear,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum TierArg {
    Minimal,
    Gentle,
    Force,
    Emergency,
}

impl From<TierArg> for CleanupTier {
    fn from(tier: TierArg) -> Self {
        match tier {
            TierArg::Minimal => CleanupTier::Minimal,
            TierArg::Gentle => CleanupTier::Gentle,
            TierArg::Force => CleanupTier::Force,
            TierArg::Emergency => CleanupTier::Emergency,
        }
    }
}

// ============================================================================
// Setup
// ============================================================================

/// Initialize the tracing subscriber for logging. The returned guard must
/// live until exit so buffered file output is flushed.
fn init_tracing(log_dir: Option<&PathBuf>) -> Result<Option<WorkerGuard>> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create log directory {}", dir.display()))?;
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_writer(writer).with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .init();
    Ok(guard)
}

fn load_config(path: Option<&PathBuf>) -> Result<Config> {
    let mut config = match path {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    config.apply_env();
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_ref())?;
    let _log_guard = init_tracing(config.log_dir.as_ref())?;
    info!(command = ?cli.command, "cardsync starting");

    if let Command::Session { action } = &cli.command {
        return session_command(&config, action);
    }

    let services = Services::from_config(&config)?;
    let result = match cli.command {
        Command::Status => status(&config, &services).await,
        Command::Decks => decks(&services).await,
        Command::Cards { deck_ids } => cards(&services, &deck_ids).await,
        Command::Sync => sync(&services).await,
        Command::PurgeAssets => purge_assets(&services).await,
        Command::CleanTemp { tier } => clean_temp(&services, tier.into()),
        Command::Watch => watch(&services).await,
        Command::Session { .. } => Ok(()),
    };
    services.shutdown().await;
    result
}

// ============================================================================
// Commands
// ============================================================================

async fn status(config: &Config, services: &Services) -> Result<()> {
    let online = services.network.is_online().await;
    println!("Connectivity: {}", if online { "online" } else { "offline" });

    let Some(owner) = services.access.owner().await else {
        println!("Owner:        none (set a session or owner_id)");
        return Ok(());
    };
    println!("Owner:        {}", owner);

    match services.cache.metadata(&owner) {
        Some(meta) => {
            let age = services.cache.cache_age(&owner).unwrap_or_default();
            let stale = services.cache.is_stale(&owner, config.stale_after());
            println!(
                "Cache:        {} decks, {} cards, updated {}{}",
                meta.decks.len(),
                meta.card_count,
                age,
                if stale { " (stale)" } else { "" }
            );
        }
        None => println!("Cache:        empty"),
    }

    let (files, bytes) = services.assets.usage(&owner);
    println!("Images:       {} files, {} KiB", files, bytes / 1024);
    Ok(())
}

async fn decks(services: &Services) -> Result<()> {
    let decks = services.access.list_decks().await?;
    if decks.is_empty() {
        println!("No decks");
    }
    for deck in decks {
        println!("{:>4}  {:<24}  {}", deck.order_index, deck.id, deck.name);
    }
    Ok(())
}

async fn cards(services: &Services, deck_ids: &[String]) -> Result<()> {
    let cards = services.access.list_cards(deck_ids).await?;
    let owner = services.access.owner().await;
    if cards.is_empty() {
        println!("No cards");
    }
    for card in cards {
        let image = match (&owner, &card.image_url) {
            (Some(owner), Some(url)) => match services.assets.local_path(owner, url) {
                Some(path) => format!("  [{}]", path.display()),
                None => "  [image not cached]".to_string(),
            },
            _ => String::new(),
        };
        println!(
            "{:<24}  {:<16}  {}{}",
            card.id,
            card.deck_id,
            truncate_string(&card.original_text, CARD_TEXT_WIDTH),
            image
        );
    }
    Ok(())
}

async fn sync(services: &Services) -> Result<()> {
    match services.sync.full_sync().await? {
        SyncOutcome::Completed(report) => println!(
            "Synced {} decks and {} cards for {} in {} ms",
            report.decks,
            report.cards,
            report.owner,
            report.elapsed.as_millis()
        ),
        SyncOutcome::Skipped(reason) => println!("Sync skipped: {}", skip_message(reason)),
    }
    Ok(())
}

fn skip_message(reason: SkipReason) -> &'static str {
    match reason {
        SkipReason::AlreadyRunning => "another sync is running",
        SkipReason::Offline => "offline",
        SkipReason::NoOwner => "no signed-in owner",
    }
}

async fn purge_assets(services: &Services) -> Result<()> {
    let owner = services
        .access
        .owner()
        .await
        .context("No owner to purge images for")?;
    let removed = services.assets.purge_all(&owner).await?;
    println!("Removed {} cached images", removed);
    Ok(())
}

fn clean_temp(services: &Services, tier: CleanupTier) -> Result<()> {
    let report = services.guard.cleanup(tier, &[]);
    println!(
        "{} cleanup: {} tracked files, {} temp entries, {} KiB freed, {} failures",
        report.tier,
        report.files_removed,
        report.temp_entries_removed,
        report.bytes_freed / 1024,
        report.failures
    );
    Ok(())
}

async fn watch(services: &Services) -> Result<()> {
    let poller = services.network.spawn_poller(WATCH_PROBE_INTERVAL);
    let _resync = services.sync.watch_connectivity();
    let mut connectivity = services.network.watch();
    let mut syncing = services.sync.subscribe_status();

    println!("Watching connectivity, Ctrl-C to stop");
    loop {
        tokio::select! {
            changed = connectivity.changed() => {
                if changed.is_err() {
                    break;
                }
                let online = *connectivity.borrow_and_update();
                println!("Connectivity: {}", if online { "online" } else { "offline" });
            }
            changed = syncing.changed() => {
                if changed.is_err() {
                    break;
                }
                if *syncing.borrow_and_update() {
                    println!("Sync started");
                } else if let Some(report) = services.sync.last_report() {
                    println!("Sync finished: {} decks, {} cards", report.decks, report.cards);
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }
    poller.abort();
    Ok(())
}

fn session_command(config: &Config, action: &SessionAction) -> Result<()> {
    let session = SessionIdentity::new(config.session_dir()?);
    match action {
        SessionAction::Show => match session.data() {
            Some(data) => println!(
                "Owner {} since {} ({})",
                data.owner_id,
                data.created_at.format("%Y-%m-%d %H:%M"),
                if data.is_expired() { "expired" } else { "valid" }
            ),
            None => println!("No session"),
        },
        SessionAction::Set { owner_id, token } => {
            session.update(SessionData::new(owner_id.clone(), token.clone()))?;
            println!("Session saved for {}", owner_id);
        }
        SessionAction::Clear => {
            session.clear()?;
            println!("Session cleared");
        }
    }
    Ok(())
}
