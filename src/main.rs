use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use tracing::{info, warn};

use step_registry_lsp::logging::{self, LogFormat, LoggingConfig};
use step_registry_lsp::lsp;

#[derive(Parser, Debug)]
#[command(
    name = "step-registry-lsp",
    version,
    about = "Language server for ci-operator configuration and the step registry",
    long_about = "Language server for ci-operator configuration and the step registry.\n\n\
        Open a release repository checkout as the single workspace folder. \
        Go-to-definition on `workflow`, `chain`, `ref` and `commands` lines jumps to the \
        matching file under ci-operator/step-registry.\n\n\
        Examples:\n  \
        step-registry-lsp\n  \
        step-registry-lsp --logs /tmp/step-registry-lsp.log --log-level debug\n  \
        step-registry-lsp --listen 127.0.0.1:9257"
)]
struct Cli {
    #[arg(long, help = "Append logs to this file instead of stderr")]
    logs: Option<PathBuf>,

    #[arg(
        long,
        default_value = "info",
        help = "Level at which to log output: trace, debug, info, warn, error"
    )]
    log_level: String,

    #[arg(long, value_enum, default_value = "text", help = "Log output format")]
    log_format: LogFormat,

    #[arg(long, help = "Serve one TCP connection on this address instead of stdio")]
    listen: Option<SocketAddr>,

    #[arg(
        long,
        default_value = "10",
        help = "Seconds to let the server finish after SIGINT/SIGTERM"
    )]
    grace_period: u64,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    logging::init_logging(&LoggingConfig {
        level: cli.log_level,
        format: cli.log_format,
        file: cli.logs,
    })?;
    info!(version = env!("CARGO_PKG_VERSION"), "starting");

    let grace = Duration::from_secs(cli.grace_period);
    let listen = cli.listen;
    let serve = async move {
        match listen {
            Some(addr) => lsp::serve_tcp(addr).await,
            None => {
                lsp::serve_stdio().await;
                Ok(())
            }
        }
    };
    tokio::pin!(serve);

    tokio::select! {
        result = &mut serve => {
            result?;
            info!("client disconnected");
        }
        _ = shutdown_signal() => {
            info!(grace_period = ?grace, "shutdown signal received");
            match tokio::time::timeout(grace, &mut serve).await {
                Ok(result) => result?,
                Err(_) => warn!("grace period elapsed, stopping"),
            }
        }
    }

    Ok(ExitCode::SUCCESS)
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
