use super::open_loaded_service;
use crate::output::Output;
use color_eyre::eyre::eyre;
use color_eyre::Result;

pub async fn run_sync(force: bool, output: &Output) -> Result<()> {
    tracing::debug!("Sync command started");

    let service = open_loaded_service().await?;
    if !service.config().is_trakt_configured() {
        return Err(eyre!("Trakt is not configured. Set [trakt] in the config file and run 'strmsync auth trakt'."));
    }

    let report = service
        .sync_tracking(force)
        .await
        .map_err(|e| eyre!("Tracking refresh failed: {}", e))?;

    if output.is_human() {
        if report.skipped {
            output.info("Nothing changed on the tracking service since the last refresh");
            return Ok(());
        }
        if report.first_run {
            output.info("First refresh: applied everything the tracking service holds");
        }
        for step in &report.completed {
            output.success(format!("{} refreshed", step));
        }
        for step in &report.failed {
            output.warn(format!("{} failed and will be retried next time", step));
        }
    } else {
        output.json(&serde_json::to_value(&report)?);
    }

    if !report.failed.is_empty() {
        return Err(eyre!("{} refresh step(s) failed", report.failed.len()));
    }
    Ok(())
}
