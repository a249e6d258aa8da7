//! # ClawGuard CLI
//!
//! Bulk moderation for Telegram groups from the command line.
//!
//! Usage:
//!   clawguard purge --group -1001234 --soft                 # Kick every tracked member
//!   clawguard propagate --identity 777 --mode mute          # Mute one identity everywhere
//!   clawguard presence record --group -1001234 --identity 7 # Track a member by hand
//!   clawguard presence list --group -1001234                # Show tracked members
//!   clawguard config show                                   # Show configuration
//!
//! Ctrl+C while a job runs aborts it; the summary is still printed.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use clawguard_bulk::{Collaborators, JobHandle, ModerationService};
use clawguard_channels::{ConsoleStatus, TelegramClient};
use clawguard_core::traits::StatusSink;
use clawguard_core::types::{JobKind, JobRequest, Priority, PropagationMode};
use clawguard_core::GuardConfig;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Actor name for jobs started and aborted from this terminal.
const CONSOLE_ACTOR: &str = "console";

#[derive(Parser)]
#[command(
    name = "clawguard",
    version,
    about = "🛡️ ClawGuard — bulk moderation for chat groups",
    long_about = "Purge groups and propagate moderation decisions across groups.\nRate-limit aware, prioritized, abortable."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log as JSON lines
    #[arg(long, global = true)]
    log_json: bool,
}

#[derive(clap::Args)]
struct JobArgs {
    /// Operator submitting the job
    #[arg(short, long, default_value = CONSOLE_ACTOR)]
    actor: String,

    /// low, normal, high, critical or a weight in 0..=1000
    #[arg(short, long)]
    priority: Option<String>,

    /// Post progress to this chat instead of the terminal
    #[arg(long)]
    report_chat: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Remove every tracked member of a group
    Purge {
        /// Group id
        #[arg(short, long)]
        group: String,

        /// Lift each ban right away (kick instead of ban)
        #[arg(long)]
        soft: bool,

        #[command(flatten)]
        job: JobArgs,
    },

    /// Apply a decision about one identity in every group it was seen in
    Propagate {
        /// Identity to sanction
        #[arg(short, long)]
        identity: String,

        /// mute or remove
        #[arg(short, long, default_value = "remove")]
        mode: String,

        /// Group where the decision was made; left untouched
        #[arg(long)]
        origin: Option<String>,

        #[command(flatten)]
        job: JobArgs,
    },

    /// Inspect or edit the presence store
    Presence {
        #[command(subcommand)]
        action: PresenceAction,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum PresenceAction {
    /// Record that an identity was seen in a group
    Record {
        #[arg(short, long)]
        group: String,
        #[arg(short, long)]
        identity: String,
    },
    /// List identities tracked in a group
    List {
        #[arg(short, long)]
        group: String,
    },
    /// List groups an identity was seen in
    Groups {
        #[arg(short, long)]
        identity: String,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show current configuration (token masked)
    Show,
    /// Write a default config file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        "clawguard=debug,clawguard_bulk=debug,clawguard_scheduler=debug,clawguard_channels=debug"
    } else {
        "clawguard=info,clawguard_bulk=info,clawguard_scheduler=info"
    };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));
    if cli.log_json {
        tracing_subscriber::fmt().json().with_env_filter(env_filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).with_target(false).init();
    }

    let config_path = cli.config.as_deref().map(|p| std::path::PathBuf::from(shellexpand::tilde(p).into_owned()));

    // Load config (init starts from defaults)
    let config = match (&cli.command, &config_path) {
        (Commands::Config { action: ConfigAction::Init { .. } }, _) => GuardConfig::default(),
        (_, Some(path)) => GuardConfig::load_from(path)?,
        (_, None) => GuardConfig::load()?,
    };

    match cli.command {
        Commands::Purge { group, soft, job } => {
            let kind = JobKind::PurgeMembers { group_id: group, soft };
            run_job(&config, kind, job).await?;
        }

        Commands::Propagate { identity, mode, origin, job } => {
            let mode: PropagationMode = mode.parse()?;
            let kind = JobKind::Propagate { identity, mode, origin_group: origin };
            run_job(&config, kind, job).await?;
        }

        Commands::Presence { action } => {
            let presence = clawguard_presence::create_presence(&config)?;
            match action {
                PresenceAction::Record { group, identity } => {
                    presence.record_seen(&group, &identity).await?;
                    println!("✅ Recorded {identity} in {group}");
                }
                PresenceAction::List { group } => {
                    let targets = presence.get_known_targets(&group).await?;
                    println!("👥 {} tracked in {group}", targets.len());
                    for t in targets {
                        println!("   {t}");
                    }
                }
                PresenceAction::Groups { identity } => {
                    let groups = presence.get_groups_for_identity(&identity).await?;
                    println!("🌐 {identity} seen in {} group(s)", groups.len());
                    for g in groups {
                        println!("   {g}");
                    }
                }
            }
        }

        Commands::Config { action } => match action {
            ConfigAction::Show => {
                println!("{}", config.to_masked_toml()?);
            }
            ConfigAction::Init { force } => {
                let path = config_path.unwrap_or_else(GuardConfig::default_path);
                if path.exists() && !force {
                    anyhow::bail!("{} already exists (use --force to overwrite)", path.display());
                }
                config.save_to(&path)?;
                println!("✅ Config written to: {}", path.display());
            }
        },
    }

    Ok(())
}

async fn run_job(config: &GuardConfig, kind: JobKind, args: JobArgs) -> Result<()> {
    let telegram = Arc::new(
        TelegramClient::from_config(config)?.with_operators([CONSOLE_ACTOR.to_string()]),
    );
    let presence = clawguard_presence::create_presence(config)?;
    let (status, chat): (Arc<dyn StatusSink>, String) = match args.report_chat {
        Some(chat) => (telegram.clone() as Arc<dyn StatusSink>, chat),
        None => (Arc::new(ConsoleStatus::new()) as Arc<dyn StatusSink>, CONSOLE_ACTOR.to_string()),
    };

    let collab = Collaborators { presence, platform: telegram.clone(), auth: telegram, status };
    let service = ModerationService::new(config, collab)?;
    let priority = args.priority.as_deref().map(str::parse::<Priority>).transpose()?;

    let request = JobRequest::new(kind, args.actor).reply_to(chat);
    let handle = service.submit_job(request, priority).await?;
    wait_with_abort(&service, handle).await
}

/// Wait for the job; the first Ctrl+C aborts it, a second one exits at once.
async fn wait_with_abort(service: &ModerationService, handle: JobHandle) -> Result<()> {
    let key = handle.key.clone();
    let wait = handle.wait();
    tokio::pin!(wait);

    let result = tokio::select! {
        result = &mut wait => result,
        signal = tokio::signal::ctrl_c() => {
            signal.context("listening for Ctrl+C")?;
            if service.request_abort(&key, CONSOLE_ACTOR).await {
                eprintln!("🛑 Abort requested, finishing current targets… (Ctrl+C again to quit)");
            }
            tokio::select! {
                result = &mut wait => result,
                _ = tokio::signal::ctrl_c() => anyhow::bail!("interrupted"),
            }
        }
    };

    match result.summary {
        Some(summary) if summary.snapshot.aborted => {
            tracing::warn!("Job {key} aborted after {}/{}", summary.snapshot.processed, summary.snapshot.total);
            Ok(())
        }
        Some(_) => Ok(()),
        None => anyhow::bail!("job {key} ended with status {:?}", result.status),
    }
}
