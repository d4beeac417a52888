//! StreamPass Demo CLI
//!
//! Command-line host that mounts the subscription engine and renders its
//! view model in a terminal.

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;
mod ui;

#[derive(Parser)]
#[command(name = "streampass-demo")]
#[command(about = "StreamPass Demo CLI - Watch and extend an access pass", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Custom storage directory (can also be set via STREAMPASS_DEMO_DIR env var)
    #[arg(long, global = true)]
    storage_dir: Option<String>,

    /// Use an in-memory simulated backend instead of HTTP
    #[arg(long, global = true)]
    simulate: bool,

    /// Bearer token, overriding the configured one
    #[arg(long, global = true)]
    token: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show time remaining on the pass
    Status,

    /// List purchasable plans
    Plans,

    /// Show a live countdown
    Watch {
        /// Stop after this many seconds
        #[arg(short, long)]
        seconds: Option<u64>,
    },

    /// Purchase or extend a pass
    Buy {
        /// Plan to buy
        plan_id: String,

        /// Action (purchase or extend); chosen from the current status if omitted
        #[arg(short, long)]
        kind: Option<String>,
    },

    /// Manage demo configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Write backend and engine settings
    Init {
        /// Backend API base URL
        #[arg(long, default_value = "http://127.0.0.1:8080/api")]
        base_url: String,

        /// Bearer token
        #[arg(long)]
        token: Option<String>,

        /// Request timeout in seconds
        #[arg(long)]
        timeout_secs: Option<u64>,

        /// Periodic sync interval in seconds
        #[arg(long)]
        sync_period_secs: Option<u64>,
    },

    /// Show the active configuration
    Show,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    if cli.verbose {
        tracing_subscriber::fmt()
            .with_env_filter("streampass_demo_cli=debug,streampass_lib=debug,streampass_sync=debug")
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter("streampass_demo_cli=info,streampass_lib=warn,streampass_sync=warn")
            .init();
    }

    // Setup storage directory
    let storage_dir = if let Some(dir) = cli.storage_dir {
        std::path::PathBuf::from(dir)
    } else if let Ok(dir) = std::env::var("STREAMPASS_DEMO_DIR") {
        std::path::PathBuf::from(dir)
    } else {
        dirs::data_local_dir()
            .unwrap_or_else(|| std::path::PathBuf::from("."))
            .join("streampass-demo")
    };

    let backend = commands::Backend {
        simulate: cli.simulate,
        token: cli.token,
    };

    // Dispatch commands
    match cli.command {
        Commands::Status => {
            commands::status::run(&storage_dir, &backend, cli.verbose).await?;
        }
        Commands::Plans => {
            commands::plans::run(&storage_dir, &backend, cli.verbose).await?;
        }
        Commands::Watch { seconds } => {
            commands::watch::run(&storage_dir, &backend, seconds, cli.verbose).await?;
        }
        Commands::Buy { plan_id, kind } => {
            commands::buy::run(
                &storage_dir,
                &backend,
                &plan_id,
                kind.as_deref(),
                cli.verbose,
            )
            .await?;
        }
        Commands::Config { action } => match action {
            ConfigAction::Init {
                base_url,
                token,
                timeout_secs,
                sync_period_secs,
            } => {
                commands::config::init(
                    &storage_dir,
                    &base_url,
                    token.as_deref(),
                    timeout_secs,
                    sync_period_secs,
                    cli.verbose,
                )
                .await?;
            }
            ConfigAction::Show => {
                commands::config::show(&storage_dir, cli.verbose).await?;
            }
        },
    }

    Ok(())
}
