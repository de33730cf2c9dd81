use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};

use gapscan_core::{NoopHttpClient, ReqwestHttpClient, Shutdown, YahooAdapter};
use gapscan_daemon::{Cli, DaemonError, Scanner, ScannerConfig};
use gapscan_store::{CacheStore, InstanceLock};

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run() -> Result<ExitCode, DaemonError> {
    let cli = Cli::parse();

    gapscan_daemon::telemetry::init_tracing("info")?;

    let mut config = ScannerConfig::from_env()?;
    cli.apply(&mut config);

    let mut lock = InstanceLock::acquire(&config.lock_path)?;

    let shutdown = Shutdown::new();
    spawn_signal_handler(shutdown.clone());

    let adapter = if cli.offline {
        YahooAdapter::with_http_client(Arc::new(NoopHttpClient))
    } else {
        YahooAdapter::with_http_client(Arc::new(ReqwestHttpClient::new()))
    };

    let store = CacheStore::with_thresholds(&config.cache_path, config.freshness);
    let scanner = Scanner::new(Arc::new(adapter), store, config, shutdown);

    if cli.once {
        scanner.scan_once("full").await;
    } else {
        scanner.run().await;
    }

    lock.release();
    info!("shutdown complete");
    Ok(ExitCode::SUCCESS)
}

/// Trigger cooperative shutdown on SIGINT or SIGTERM. The in-flight request
/// finishes; only the sleeps between requests are interrupted.
fn spawn_signal_handler(shutdown: Shutdown) {
    tokio::spawn(async move {
        let interrupted = wait_for_signal().await;
        if interrupted {
            info!("shutdown signal received");
        } else {
            error!("signal listener failed, shutting down");
        }
        shutdown.trigger();
    });
}

#[cfg(unix)]
async fn wait_for_signal() -> bool {
    use tokio::signal::unix::{signal, SignalKind};

    let mut term = match signal(SignalKind::terminate()) {
        Ok(term) => term,
        Err(_) => return false,
    };

    tokio::select! {
        result = tokio::signal::ctrl_c() => result.is_ok(),
        _ = term.recv() => true,
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() -> bool {
    tokio::signal::ctrl_c().await.is_ok()
}
