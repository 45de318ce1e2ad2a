//! rosterwatch - Live game server roster for Discord communities
//!
//! Main entry point for the rosterwatch CLI.

use anyhow::Context;
use clap::{Parser, Subcommand};
use rosterwatch::config::Settings;
use rosterwatch::configurator::{Intent, Navigator};
use rosterwatch::controller::{ControllerEvent, SyncController};
use rosterwatch::engine::ReconciliationEngine;
use rosterwatch::publisher::DiscordPublisher;
use rosterwatch::store::{SqliteTargetStore, TargetStore};
use rosterwatch::target::{CommunityId, DestinationId, TargetStatus};
use rosterwatch::upstream::UpstreamClient;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;

/// rosterwatch - Keep a live server roster posted in Discord
#[derive(Parser, Debug)]
#[command(name = "rosterwatch")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to config file (default: ~/.config/rosterwatch/config.yaml)
    #[arg(short, long, env = "ROSTERWATCH_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Write a default configuration file
    Init {
        /// Status API URL to put in the file
        #[arg(long)]
        api_url: Option<String>,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Run the sync loop until interrupted
    Run,

    /// Run a single sync pass and print what happened
    Tick {
        /// Print the report as JSON
        #[arg(long)]
        json: bool,

        /// Print Prometheus metrics after the pass
        #[arg(long)]
        metrics: bool,
    },

    /// List configured targets
    Targets,

    /// Show the target configured for a community
    Status {
        /// Community (guild) ID
        community: CommunityId,
    },

    /// Configure a community's roster display and publish it now
    Add {
        /// Community (guild) ID
        community: CommunityId,

        /// Channel ID to post in
        channel: DestinationId,

        /// Embed title (default from configuration)
        #[arg(short, long)]
        title: Option<String>,
    },

    /// Remove a community's roster display
    Remove {
        /// Community (guild) ID
        community: CommunityId,
    },

    /// Record that the bot joined a community
    Join {
        /// Community (guild) ID
        community: CommunityId,
    },

    /// Forget a community the bot left
    Leave {
        /// Community (guild) ID
        community: CommunityId,
    },
}

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}

fn config_path(cli: &Cli) -> PathBuf {
    cli.config.clone().unwrap_or_else(Settings::default_path)
}

fn load_settings(path: &Path) -> anyhow::Result<Settings> {
    let mut settings = Settings::load_or_default(path)
        .with_context(|| format!("Failed to load config from {}", path.display()))?;
    settings.apply_env_overrides()?;
    Ok(settings)
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let path = config_path(&cli);

    // Init writes the config, so it runs before any is loaded
    if let Commands::Init { api_url, force } = &cli.command {
        if let Err(e) = rosterwatch::logging::init("info") {
            eprintln!("Failed to initialize logging: {}", e);
        }
        return handle_init_command(&path, api_url.clone(), *force);
    }

    let settings = load_settings(&path)?;
    if let Err(e) = rosterwatch::logging::init(&settings.log_level) {
        eprintln!("Failed to initialize logging: {}", e);
    }

    match cli.command {
        Commands::Init { .. } => unreachable!("Init is handled before settings are loaded"),
        Commands::Run => {
            settings.validate()?;
            let engine = build_engine(&settings)?;
            let mut controller = SyncController::new(engine, settings.controller_config());

            let mut events = controller.subscribe();
            tokio::spawn(async move {
                while let Ok(event) = events.recv().await {
                    if let ControllerEvent::TickAborted { reason } = event {
                        tracing::debug!(reason = %reason, "Tick aborted");
                    }
                }
            });

            controller.run().await?;
        }
        Commands::Tick { json, metrics } => {
            settings.validate()?;
            let engine = build_engine(&settings)?;
            let report = engine.tick().await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("{}", report.summary());
                for target in &report.targets {
                    println!(
                        "  {} -> {}: {}",
                        target.community, target.destination, target.outcome
                    );
                }
            }

            if metrics {
                print!("{}", rosterwatch::metrics::encode_metrics()?);
            }
        }
        Commands::Targets => {
            let store = open_store(&settings)?;
            let targets = store.list()?;
            if targets.is_empty() {
                println!("No targets configured.");
            }
            for target in targets {
                let message = target
                    .message
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| "-".to_string());
                println!(
                    "{}  channel {}  message {}  {}",
                    target.community, target.destination, message, target.title
                );
            }
        }
        Commands::Status { community } => {
            let store = open_store(&settings)?;
            match store.get(community)? {
                Some(target) => println!("{}", TargetStatus::from(target)),
                None => println!("No server list configured for {}.", community),
            }
        }
        Commands::Add {
            community,
            channel,
            title,
        } => {
            settings.validate()?;
            let engine = build_engine(&settings)?;

            let mut nav = Navigator::new(
                community,
                engine.current_status(community)?,
                settings.default_title.clone(),
            );
            nav.open_create();
            if let Some(title) = title {
                nav.set_title(&title);
            }
            nav.select_destination(channel);

            if let Some(Intent::CreateOrReplace {
                community,
                destination,
                title,
            }) = nav.submit()
            {
                let status = engine
                    .create_or_replace(community, destination, &title)
                    .await?;
                println!("{}", status);
            }
        }
        Commands::Remove { community } => {
            settings.validate()?;
            let engine = build_engine(&settings)?;
            let nav = Navigator::new(
                community,
                engine.current_status(community)?,
                settings.default_title.clone(),
            );
            match nav.delete() {
                Some(Intent::Delete { community }) => {
                    engine.delete(community).await?;
                    println!("Server list removed for {}.", community);
                }
                _ => println!("No server list configured for {}.", community),
            }
        }
        Commands::Join { community } => {
            let store = open_store(&settings)?;
            store.on_membership_gained(community)?;
            println!("Joined {}.", community);
        }
        Commands::Leave { community } => {
            let store = open_store(&settings)?;
            let removed = store.on_membership_lost(community)?;
            println!("Left {} ({} target(s) removed).", community, removed.len());
        }
    }

    Ok(())
}

fn open_store(settings: &Settings) -> anyhow::Result<SqliteTargetStore> {
    SqliteTargetStore::open(&settings.store_config()).with_context(|| {
        format!(
            "Failed to open target store at {}",
            settings.db_path.display()
        )
    })
}

fn build_engine(settings: &Settings) -> anyhow::Result<Arc<ReconciliationEngine>> {
    let token = Settings::discord_token()?;
    let source = UpstreamClient::new(settings.api_url.clone(), settings.fetch_timeout())?;
    let publisher = DiscordPublisher::new(
        settings.discord_api_url.clone(),
        &token,
        settings.publish_timeout(),
    )?;
    let store = open_store(settings)?;

    Ok(Arc::new(ReconciliationEngine::new(
        Arc::new(source),
        Arc::new(store),
        Arc::new(publisher),
        settings.engine_config(),
    )))
}

fn handle_init_command(
    path: &Path,
    api_url: Option<String>,
    force: bool,
) -> anyhow::Result<()> {
    if path.exists() && !force {
        println!("Config already exists at {}", path.display());
        println!("Use --force to overwrite it.");
        return Ok(());
    }

    let settings = Settings {
        api_url: api_url.unwrap_or_default(),
        ..Default::default()
    };
    settings
        .save(path)
        .with_context(|| format!("Failed to write config to {}", path.display()))?;

    println!("Created config at {}", path.display());
    if settings.api_url.is_empty() {
        println!("Set api_url (or ROSTERWATCH_API_URL) before running.");
    }
    println!("Set DISCORD_TOKEN in the environment or a .env file.");
    Ok(())
}
