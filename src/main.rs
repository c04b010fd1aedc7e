#![forbid(unsafe_code)]

//! `workboard`: local-first task and discovery board.
//!
//! Edits the local cache directly, mirrors it to the companion server on
//! request (`push`, `pull`, `backup`, `stats`) or on a timer (`watch`), and
//! can run that companion server itself (`serve`).

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use workboard::board::{DiscoveryBoard, TaskBoard};
use workboard::cache::{FileStore, LocalCache, WriteOutcome};
use workboard::config::GlobalConfig;
use workboard::sync::{ConnectivityProber, SyncClient, SyncController, SyncOutcome, TimerScope};
use workboard::{server, AppError, Result};

#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "workboard", about = "Local-first task and discovery board", version, long_about = None)]
struct Cli {
    /// Path to the TOML configuration file. Defaults apply when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log output format (text or json).
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    /// Override the companion server base URL.
    #[arg(long)]
    server_url: Option<String>,

    /// Override the data directory.
    #[arg(long)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Manage tasks in the local cache.
    #[command(subcommand)]
    Task(TaskCommand),

    /// Manage discoveries in the local cache.
    #[command(subcommand)]
    Discovery(DiscoveryCommand),

    /// Send the local collections to the server.
    Push,

    /// Replace the local collections with the server's copy.
    Pull,

    /// Check whether the server is reachable.
    Probe,

    /// Ask the server to write a backup file.
    Backup,

    /// Show the server's statistics.
    Stats,

    /// Probe and auto-sync on their intervals until interrupted.
    Watch,

    /// Run the companion server until interrupted.
    Serve,
}

#[derive(Debug, Subcommand)]
enum TaskCommand {
    /// Add a task at the top of the list.
    Add {
        /// Task text.
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,
    },

    /// Toggle a task's completion flag.
    Done {
        /// Task id.
        id: String,
    },

    /// Delete a task.
    Rm {
        /// Task id.
        id: String,
    },

    /// List tasks, newest first.
    List,
}

#[derive(Debug, Subcommand)]
enum DiscoveryCommand {
    /// Record a discovery at the top of the list.
    Add {
        /// Discovery text.
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,
    },

    /// Delete the discovery at a list position (0 is the newest).
    Rm {
        /// Position as shown by `discovery list`.
        index: usize,
    },

    /// List discoveries, newest first.
    List,
}

fn main() -> Result<ExitCode> {
    let args = Cli::parse();
    init_tracing(args.log_format)?;

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| AppError::Config(format!("failed to build tokio runtime: {err}")))?
        .block_on(run(args))
}

async fn run(args: Cli) -> Result<ExitCode> {
    // ── Load configuration ──────────────────────────────
    let mut config = match &args.config {
        Some(path) => GlobalConfig::load_from_path(path)?,
        None => GlobalConfig::default(),
    };
    if let Some(url) = args.server_url {
        config.server_url = url;
    }
    if let Some(dir) = args.data_dir {
        config.data_dir = dir;
    }
    config.validate()?;

    let open_cache = || {
        let store = FileStore::new(config.cache_path());
        Arc::new(LocalCache::new(Arc::new(store), config.cache.quota_bytes))
    };

    match args.command {
        Command::Task(command) => Ok(run_task(&command, open_cache())),
        Command::Discovery(command) => Ok(run_discovery(&command, open_cache())),
        Command::Push => {
            let client = SyncClient::from_config(&config, open_cache())?;
            Ok(report(&client.push().await))
        }
        Command::Pull => {
            let client = SyncClient::from_config(&config, open_cache())?;
            Ok(report(&client.pull().await))
        }
        Command::Backup => {
            let client = SyncClient::from_config(&config, open_cache())?;
            Ok(report(&client.backup().await))
        }
        Command::Stats => {
            let client = SyncClient::from_config(&config, open_cache())?;
            let outcome = client.stats().await;
            if let Some(stats) = &outcome.data {
                println!("{}", serde_json::to_string_pretty(stats)?);
            }
            Ok(report(&outcome))
        }
        Command::Probe => {
            let prober = ConnectivityProber::new(&config.server_url, config.request_timeout())?;
            if prober.probe().await {
                println!("online: {}", config.server_url);
                Ok(ExitCode::SUCCESS)
            } else {
                println!("offline: {}", config.server_url);
                Ok(ExitCode::FAILURE)
            }
        }
        Command::Watch => watch(&config, open_cache()).await,
        Command::Serve => serve(&config).await,
    }
}

fn run_task(command: &TaskCommand, cache: Arc<LocalCache>) -> ExitCode {
    let mut board = TaskBoard::load(cache);
    match command {
        TaskCommand::Add { text } => {
            let Some(task) = board.add(&text.join(" ")) else {
                eprintln!("nothing added: task text is blank");
                return ExitCode::FAILURE;
            };
            println!("added {}", task.id);
        }
        TaskCommand::Done { id } => {
            if !board.toggle(id) {
                eprintln!("no task with id {id}");
                return ExitCode::FAILURE;
            }
            let done = board.get(id).is_some_and(|t| t.done);
            println!("{id} {}", if done { "done" } else { "reopened" });
        }
        TaskCommand::Rm { id } => {
            let Some(task) = board.remove(id) else {
                eprintln!("no task with id {id}");
                return ExitCode::FAILURE;
            };
            println!("removed {}", task.id);
        }
        TaskCommand::List => {
            for task in board.tasks() {
                println!(
                    "[{}] {}  {}  {}",
                    if task.done { 'x' } else { ' ' },
                    task.id,
                    task.date.as_deref().unwrap_or("----------"),
                    task.text
                );
            }
            let stats = board.stats();
            println!(
                "{} tasks, {} done, {} pending",
                stats.total_tasks,
                stats.completed_tasks,
                stats.pending_tasks()
            );
        }
    }
    persisted(board.last_write())
}

fn run_discovery(command: &DiscoveryCommand, cache: Arc<LocalCache>) -> ExitCode {
    let mut board = DiscoveryBoard::load(cache);
    match command {
        DiscoveryCommand::Add { text } => {
            if board.add(&text.join(" ")).is_none() {
                eprintln!("nothing added: discovery text is blank");
                return ExitCode::FAILURE;
            }
            println!("recorded");
        }
        DiscoveryCommand::Rm { index } => {
            let Some(discovery) = board.remove(*index) else {
                eprintln!("no discovery at position {index}");
                return ExitCode::FAILURE;
            };
            println!("removed {:?}", discovery.text);
        }
        DiscoveryCommand::List => {
            for (index, discovery) in board.discoveries().iter().enumerate() {
                println!("{index:>3}  {}  {}", discovery.date, discovery.text);
            }
        }
    }
    persisted(board.last_write())
}

/// A mutation that could not be stored is lost when the process exits.
fn persisted(outcome: Option<WriteOutcome>) -> ExitCode {
    match outcome {
        None | Some(WriteOutcome::Written) => ExitCode::SUCCESS,
        Some(outcome) => {
            eprintln!("change was not saved ({outcome:?})");
            ExitCode::FAILURE
        }
    }
}

fn report<T>(outcome: &SyncOutcome<T>) -> ExitCode {
    if outcome.success {
        println!("{}", outcome.message);
        ExitCode::SUCCESS
    } else {
        eprintln!("{}", outcome.message);
        ExitCode::FAILURE
    }
}

async fn watch(config: &GlobalConfig, cache: Arc<LocalCache>) -> Result<ExitCode> {
    let client = Arc::new(SyncClient::from_config(config, cache)?);
    let controller = SyncController::from_config(config, client)?;

    let ct = cancel_on_signal();
    let mut timers = TimerScope::with_parent(&ct);
    controller.start(&mut timers);
    info!(
        server = %config.server_url,
        timers = ?timers.active(),
        "watching for sync"
    );

    ct.cancelled().await;
    timers.shutdown().await;
    info!(
        connected = controller.status().is_connected(),
        last_synced = %controller.status().last_synced_label(),
        "watch stopped"
    );
    Ok(ExitCode::SUCCESS)
}

async fn serve(config: &GlobalConfig) -> Result<ExitCode> {
    let ct = cancel_on_signal();
    server::serve(config, ct).await?;
    info!("workboard server stopped");
    Ok(ExitCode::SUCCESS)
}

/// Token cancelled on the first Ctrl-C or SIGTERM.
fn cancel_on_signal() -> CancellationToken {
    let ct = CancellationToken::new();
    let signal_ct = ct.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("shutdown signal received");
        signal_ct.cancel();
    });
    ct
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(err) => {
                warn!(%err, "failed to register SIGTERM handler, using ctrl-c only");
                let _ = ctrl_c.await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(err) = ctrl_c.await {
            tracing::error!(%err, "ctrl-c signal handler failed");
        }
    }
}

fn init_tracing(log_format: LogFormat) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = fmt().with_env_filter(env_filter).with_writer(std::io::stderr);

    match log_format {
        LogFormat::Text => subscriber
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
        LogFormat::Json => subscriber
            .json()
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
    }

    Ok(())
}
