//! Worktree View
//!
//! Lists the git worktrees of a workspace as a flat tree for IDE sidebars,
//! either once on the command line or continuously over a WebSocket bridge.

mod config;
mod git;
mod server;
mod tree;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use config::ProjectConfig;
use git::{resolve_workspace, SystemCommandRunner, WorktreeLister};
use server::{ServerConfig, WebSocketServer};
use tree::{DisplayNode, TreeDataProvider, WorktreeTreeProvider};

/// Worktree View
///
/// Git worktree tree view for IDE sidebars
#[derive(Parser, Debug)]
#[command(name = "worktree-view")]
#[command(version, about, long_about = None)]
struct Args {
    /// Workspace folder (defaults to the current directory)
    #[arg(short, long, global = true)]
    workspace: Option<PathBuf>,

    /// Config file (defaults to .worktree-view/config.toml in the workspace)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the worktree tree once
    List {
        /// Print nodes as JSON
        #[arg(long)]
        json: bool,
    },
    /// Serve the tree to IDE hosts over WebSocket
    Serve {
        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,

        /// Bind address
        #[arg(long)]
        bind: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };

    FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(log_level.into())
                .from_env_lossy(),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();

    let config = load_config(&args)?;

    let location = args.workspace.clone().or_else(|| config.workspace.clone());
    let repo_root = resolve_workspace(location.as_deref())?;

    let lister = WorktreeLister::new(&repo_root, SystemCommandRunner)
        .with_git_program(config.git_program.clone());
    let provider = Arc::new(WorktreeTreeProvider::new(lister, config.display.clone()));
    info!(
        "Listing worktrees of {} with {}",
        provider.lister().repo_root().display(),
        provider.lister().git_program()
    );

    match args.command {
        Command::List { json } => {
            let nodes = provider.produce_children(None).await?;
            print_nodes(&repo_root, &nodes, json)?;
        }
        Command::Serve { port, bind } => {
            let server_config = ServerConfig::new(
                bind.unwrap_or(config.server.bind),
                port.unwrap_or(config.server.port),
            );
            serve(server_config, provider, &repo_root).await?;
        }
    }

    Ok(())
}

/// Load the explicit config file, or the one at the workspace's repository root
fn load_config(args: &Args) -> anyhow::Result<ProjectConfig> {
    if let Some(path) = &args.config {
        return ProjectConfig::load_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()));
    }

    let project_path = match &args.workspace {
        Some(path) => path.clone(),
        None => std::env::current_dir()?,
    };
    Ok(ProjectConfig::load_for_location(&project_path)?)
}

fn print_nodes(repo_root: &Path, nodes: &[DisplayNode], json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(nodes)?);
        return Ok(());
    }

    println!("{}", repo_root.display());
    let width = nodes.iter().map(|n| n.label.chars().count()).max().unwrap_or(0);
    for node in nodes {
        let mut line = format!("  {:<width$}  {}", node.label, node.description, width = width);
        if node.locked {
            line.push_str(" (locked)");
        }
        if node.prunable {
            line.push_str(" (prunable)");
        }
        println!("{}", line.trim_end());
    }
    Ok(())
}

async fn serve<P: TreeDataProvider + 'static>(
    config: ServerConfig,
    provider: Arc<P>,
    repo_root: &Path,
) -> anyhow::Result<()> {
    info!("Worktree View v{}", env!("CARGO_PKG_VERSION"));

    let server = Arc::new(WebSocketServer::new(
        config,
        provider,
        repo_root.display().to_string(),
    ));
    let server_handle = Arc::clone(&server);

    // Spawn shutdown signal handler
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("Initiating graceful shutdown...");
        server_handle.shutdown();
    });

    server.run().await?;

    info!("Server shutdown complete");
    Ok(())
}

/// Wait for shutdown signal (SIGTERM or SIGINT)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT (Ctrl+C)");
        }
        _ = terminate => {
            info!("Received SIGTERM");
        }
    }
}
