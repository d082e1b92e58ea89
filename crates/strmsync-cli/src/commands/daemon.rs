use super::{load_config, open_service};
use crate::output::Output;
use color_eyre::Result;
use futures::future::join_all;
use library_sync_config::PathManager;
use tokio::sync::watch;
use tracing::{info, warn};

pub async fn run_daemon(no_startup_sync: bool, output: &Output) -> Result<()> {
    let paths = PathManager::default();
    let mut config = load_config(&paths)?;
    if no_startup_sync {
        config.scheduler.run_on_startup = false;
    }

    let service = open_service(&paths, config)?;

    // The media center may still be starting up; the scheduler re-ingests later
    if let Err(e) = service.ingest().refresh_all().await {
        warn!(operation = "daemon_start", error = %e, "Initial library read failed");
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let tasks = service.start(shutdown_rx);
    output.info("strmsync daemon running. Press Ctrl-C to stop.");
    info!(
        operation = "daemon_start",
        library_path = %service.config().library.library_path.display(),
        "Daemon started"
    );

    wait_for_shutdown().await?;

    info!(operation = "daemon_stop", "Shutting down");
    // Receivers are gone only if every task already exited
    let _ = shutdown_tx.send(true);
    for result in join_all(tasks).await {
        if let Err(e) = result {
            warn!(operation = "daemon_stop", error = %e, "Background task ended abnormally");
        }
    }
    output.success("Daemon stopped");
    Ok(())
}

#[cfg(unix)]
async fn wait_for_shutdown() -> Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = signal(SignalKind::terminate())?;
    tokio::select! {
        result = tokio::signal::ctrl_c() => result?,
        _ = terminate.recv() => {}
    }
    Ok(())
}

#[cfg(not(unix))]
async fn wait_for_shutdown() -> Result<()> {
    tokio::signal::ctrl_c().await?;
    Ok(())
}
