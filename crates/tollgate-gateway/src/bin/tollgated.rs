//! `tollgated`: the Tollgate daemon and its operator client.
//!
//! With no subcommand (or `serve`) it runs the JSON-RPC daemon. The other
//! subcommands connect to a running daemon and print the JSON reply, which
//! is how an operator lists pending approvals and records decisions.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use jsonrpsee::ws_client::{WsClient, WsClientBuilder};
use serde::Serialize;
use serde_json::Value;

use tollgate_config::{Config, LoadOptions, LoggingSection, ResolvedConfig, ShowFormat};
use tollgate_core::{RequestId, SessionId};
use tollgate_gateway::{TollgateRpcClient, TollgateServer};
use tollgate_telemetry::{LogConfig, LogFormat, setup_logging};

/// Tollgate daemon: human-in-the-loop approval orchestrator.
#[derive(Parser)]
#[command(name = "tollgated")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Extra config file merged over `~/.tollgate/config.toml`.
    #[arg(short, long, global = true, env = "TOLLGATE_CONFIG")]
    config: Option<PathBuf>,

    /// Daemon URL for client commands (defaults to `ws://<gateway.bind>`).
    #[arg(long, global = true)]
    url: Option<String>,

    /// Enable debug logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the daemon (default)
    Serve {
        /// Override `gateway.bind`
        #[arg(long)]
        bind: Option<String>,
    },

    /// Inspect the resolved configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },

    /// Start a session from a prompt or raw JSON input
    Start {
        /// Prompt text, sent as `{"prompt": ...}`
        prompt: Option<String>,
        /// Raw JSON input instead of a prompt
        #[arg(long, conflicts_with = "prompt")]
        input: Option<String>,
        /// Use this session ID instead of a generated one
        #[arg(long)]
        session_id: Option<String>,
    },

    /// List pending approval requests
    Pending {
        /// Only this session
        #[arg(long)]
        session_id: Option<String>,
    },

    /// Approve a pending request
    Approve {
        /// Session ID
        session_id: String,
        /// Request ID
        request_id: String,
        /// JSON decision payload handed to the computation
        #[arg(long)]
        decision: Option<String>,
        /// Who is approving
        #[arg(long)]
        approver: Option<String>,
        /// Skip approval for this action for the rest of the session
        #[arg(long)]
        trust: bool,
    },

    /// Reject a pending request
    Reject {
        /// Session ID
        session_id: String,
        /// Request ID
        request_id: String,
        /// Why the request was rejected
        #[arg(long)]
        reason: Option<String>,
        /// Who is rejecting
        #[arg(long)]
        approver: Option<String>,
    },

    /// Deliver the recorded decision to a suspended session
    Resume {
        /// Session ID
        session_id: String,
    },

    /// Show a finished session's outcome
    Result {
        /// Session ID
        session_id: String,
    },

    /// Show a session's current state
    Status {
        /// Session ID
        session_id: String,
    },

    /// Show whether any session is running
    Liveness,

    /// Forget a finished session
    Cleanup {
        /// Session ID
        session_id: String,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Print the resolved configuration with value sources
    Show {
        /// Output format
        #[arg(long, value_enum, default_value_t = ShowArg::Toml)]
        format: ShowArg,
        /// Only this section
        #[arg(long)]
        section: Option<String>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ShowArg {
    Toml,
    Json,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let resolved = Config::load_with(&LoadOptions {
        explicit_file: cli.config.clone(),
        ..LoadOptions::default()
    })
    .context("failed to load configuration")?;

    match cli.command {
        None => serve(resolved, None, cli.verbose).await,
        Some(Commands::Serve { bind }) => serve(resolved, bind, cli.verbose).await,
        Some(Commands::Config {
            command: ConfigCommands::Show { format, section },
        }) => {
            let format = match format {
                ShowArg::Toml => ShowFormat::Toml,
                ShowArg::Json => ShowFormat::Json,
            };
            let rendered = resolved
                .show(format, section.as_deref())
                .map_err(|_| anyhow::anyhow!("cannot render configuration section"))?;
            println!("{rendered}");
            Ok(())
        },
        Some(command) => {
            let url = cli
                .url
                .unwrap_or_else(|| format!("ws://{}", resolved.config.gateway.bind));
            let client = connect(&url).await?;
            run_client(&client, command).await
        },
    }
}

async fn serve(resolved: ResolvedConfig, bind: Option<String>, verbose: bool) -> Result<()> {
    let mut config = resolved.config;
    if let Some(bind) = bind {
        config.gateway.bind = bind;
    }

    if let Err(e) = setup_logging(&log_config(&config.logging, verbose)) {
        eprintln!("Failed to initialize logging: {e}");
    }
    for file in &resolved.loaded_files {
        tracing::info!(path = %file, "Using config file");
    }

    let (daemon, handle, addr) = TollgateServer::start(&config).await?;
    println!("tollgated listening on ws://{addr}");

    let reaper = daemon.spawn_reaper_loop();

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    println!("\nShutting down daemon...");

    daemon.shutdown();
    if let Some(reaper) = reaper {
        let _ = reaper.await;
    }

    handle.stop()?;
    handle.stopped().await;
    Ok(())
}

fn log_config(logging: &LoggingSection, verbose: bool) -> LogConfig {
    let level = if verbose { "debug" } else { logging.level.as_str() };
    let format = logging.format.parse().unwrap_or(LogFormat::Compact);
    let config = LogConfig::new(level)
        .with_format(format)
        .with_directives(logging.directives.iter().cloned());
    match &logging.directory {
        Some(dir) => config.with_file_logging(dir),
        None => config,
    }
}

async fn connect(url: &str) -> Result<WsClient> {
    WsClientBuilder::default()
        .connection_timeout(Duration::from_secs(5))
        .build(url)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to connect to daemon at {url}: {e}"))
}

async fn run_client(client: &WsClient, command: Commands) -> Result<()> {
    match command {
        Commands::Start {
            prompt,
            input,
            session_id,
        } => {
            let input = match (prompt, input) {
                (_, Some(raw)) => parse_json("input", &raw)?,
                (Some(prompt), None) => serde_json::json!({ "prompt": prompt }),
                (None, None) => bail!("provide a prompt or --input"),
            };
            let session_id = session_id.map(session).transpose()?;
            print_json(&client.start(input, session_id).await?)
        },
        Commands::Pending { session_id } => {
            let session_id = session_id.map(session).transpose()?;
            print_json(&client.list_pending(session_id).await?)
        },
        Commands::Approve {
            session_id,
            request_id,
            decision,
            approver,
            trust,
        } => {
            let decision = decision.map(|d| parse_json("decision", &d)).transpose()?;
            let record = client
                .approve(
                    session(session_id)?,
                    request(&request_id)?,
                    decision,
                    approver,
                    Some(trust),
                )
                .await?;
            print_json(&record)
        },
        Commands::Reject {
            session_id,
            request_id,
            reason,
            approver,
        } => {
            let record = client
                .reject(session(session_id)?, request(&request_id)?, reason, approver)
                .await?;
            print_json(&record)
        },
        Commands::Resume { session_id } => print_json(&client.resume(session(session_id)?).await?),
        Commands::Result { session_id } => print_json(&client.result(session(session_id)?).await?),
        Commands::Status { session_id } => print_json(&client.status(session(session_id)?).await?),
        Commands::Liveness => print_json(&client.liveness().await?),
        Commands::Cleanup { session_id } => {
            client.cleanup(session(session_id)?).await?;
            println!("cleaned up");
            Ok(())
        },
        Commands::Serve { .. } | Commands::Config { .. } => {
            bail!("not a client command")
        },
    }
}

fn session(raw: String) -> Result<SessionId> {
    SessionId::parse(raw).context("invalid session id")
}

fn request(raw: &str) -> Result<RequestId> {
    raw.parse().context("invalid request id")
}

fn parse_json(what: &str, raw: &str) -> Result<Value> {
    serde_json::from_str(raw).with_context(|| format!("--{what} is not valid JSON"))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
