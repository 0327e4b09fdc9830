//! RAX Static Server - Entry Point
//!
//! Serves a directory over HTTP with path confinement and extension
//! filtering, and optionally cleans unused files out of it first.

use clap::{Args, Parser, Subcommand, ValueEnum};
use log::{info, warn};
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;

use rax_static_server::cleanup::{CleanupReport, LivenessScanner, OpenFileSet};
use rax_static_server::config::ServerConfig;
use rax_static_server::error::handlers::{exit_code, handle_error};
use rax_static_server::error::{AppError, CleanupError};
use rax_static_server::resolve::RoutingMode;
use rax_static_server::server::{Server, shutdown_signal};
use rax_static_server::utils::logging::setup_logging;

#[derive(Parser)]
#[command(name = "rax-static-server", version, about)]
struct Cli {
    /// TOML config file (default: ./rax-static.toml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Serve files from the server root (default)
    Serve(ServeArgs),
    /// Remove files under DIR that no process is using
    Clean {
        /// Directory to clean (default: the server root)
        dir: Option<PathBuf>,
    },
}

#[derive(Args, Default)]
struct ServeArgs {
    /// Directory to serve
    #[arg(short, long)]
    root: Option<PathBuf>,

    /// First port to try
    #[arg(short, long)]
    port: Option<u16>,

    /// Routing mode for unknown paths
    #[arg(long, value_enum)]
    mode: Option<ModeArg>,

    /// Clean unused files from the root before serving
    #[arg(long)]
    clean: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum ModeArg {
    Static,
    Spa,
}

impl From<ModeArg> for RoutingMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Static => RoutingMode::Static,
            ModeArg::Spa => RoutingMode::Spa,
        }
    }
}

impl ServeArgs {
    fn apply(&self, config: &mut ServerConfig) {
        if let Some(root) = &self.root {
            config.server_root = root.clone();
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(mode) = self.mode {
            config.routing_mode = mode.into();
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let config = ServerConfig::load(cli.config.as_deref());
    setup_logging(config.as_ref().ok().and_then(|c| c.log_file.as_deref()));

    let outcome = match config {
        Ok(config) => run(cli.command, config).await,
        Err(e) => Err(e.into()),
    };
    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            handle_error(&e);
            ExitCode::from(u8::try_from(exit_code(&e)).unwrap_or(1))
        }
    }
}

async fn run(command: Option<Command>, mut config: ServerConfig) -> Result<(), AppError> {
    match command.unwrap_or(Command::Serve(ServeArgs::default())) {
        Command::Clean { dir } => {
            let dir = dir.unwrap_or_else(|| config.server_root.clone());
            run_cleanup(dir).await?;
            Ok(())
        }
        Command::Serve(args) => {
            args.apply(&mut config);
            config.validate()?;

            if args.clean {
                let outcome = run_cleanup(config.server_root.clone()).await;
                if !continue_after_cleanup(outcome)? {
                    info!("Operation cancelled, not starting the server");
                    return Ok(());
                }
            }

            info!("Launching static server...");
            let server = Server::bind(config).await?;
            server.run(shutdown_signal()).await?;
            Ok(())
        }
    }
}

/// Whether `serve --clean` goes on to serve. A cancelled cleanup ends the run.
fn continue_after_cleanup(outcome: Result<CleanupReport, AppError>) -> Result<bool, AppError> {
    match outcome {
        Ok(report) => Ok(!report.cancelled),
        // The server creates the root
        Err(AppError::Cleanup(CleanupError::DirectoryMissing(dir))) => {
            warn!("Skipping cleanup, {} does not exist yet", dir.display());
            Ok(true)
        }
        Err(e) => Err(e),
    }
}

/// Run a cleanup on a blocking thread; Ctrl+C cancels between files.
async fn run_cleanup(dir: PathBuf) -> Result<CleanupReport, AppError> {
    let cancel = CancellationToken::new();
    let interrupt = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupt received, cancelling cleanup");
                cancel.cancel();
            }
        })
    };

    let outcome = tokio::task::spawn_blocking(move || {
        let open_files = OpenFileSet::from_processes();
        info!("{} files are open across running processes", open_files.len());
        LivenessScanner::new(dir).clean(&open_files, &cancel)
    })
    .await;
    interrupt.abort();

    let report = outcome.map_err(|e| AppError::Io(io::Error::other(e)))??;
    info!(
        "Cleanup of {}: {} removed, {} in use, {} errors{}",
        report.directory.display(),
        report.removed,
        report.in_use_count(),
        report.error_count(),
        if report.cancelled { " (cancelled)" } else { "" }
    );
    Ok(report)
}
