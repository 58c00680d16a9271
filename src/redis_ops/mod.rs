use anyhow::Result;

use crate::{
    config::{DumpConfig, RestoreConfig},
    keyspace::parse_keyspaces,
    progress::TransferProgress,
    snapshot::Instance,
};

mod connection;
mod dump;
#[cfg(test)]
mod mock;
mod report;
mod restore;
mod store;

pub use report::DatabaseReport;

fn log_report(progress: &TransferProgress, report: &DatabaseReport) {
    progress.suspend(|| {
        for failure in &report.failures {
            tracing::warn!(
                db = report.db,
                key = %failure.key,
                command = failure.command,
                error = %failure.error,
                "key operation failed"
            );
        }
        tracing::info!(
            db = report.db,
            succeeded = report.succeeded,
            failed = report.failed,
            skipped = report.skipped,
            "{report}"
        );
    });
}

fn completion_message(action: &str, reports: &[DatabaseReport]) -> String {
    let failed: usize = reports.iter().map(|report| report.failed).sum();
    if failed > 0 {
        format!("{action} completed with {failed} failed keys")
    } else {
        format!("{action} completed")
    }
}

/// Export every database reported by `INFO keyspace` into a snapshot file.
pub async fn run_dump(config: DumpConfig) -> Result<()> {
    if !config.silent {
        println!(
            "📡 Connecting to {}:{}...",
            config.connection.host, config.connection.port
        );
    }
    let mut connection = connection::connect_redis(&config.connection).await?;
    let summary = connection::keyspace_summary(&mut connection).await?;
    let spaces = parse_keyspaces(&summary);
    for space in &spaces {
        tracing::debug!(
            db = space.db,
            keys = space.approx_size,
            expires = space.expires,
            avg_ttl_ms = space.avg_ttl_millis,
            "keyspace resolved"
        );
    }

    let approx_keys: i64 = spaces.iter().map(|space| space.approx_size.max(0)).sum();
    let progress = TransferProgress::new(approx_keys as u64, config.silent);
    let result = dump::dump_instance(&mut connection, &spaces, &progress, |report| {
        log_report(&progress, report)
    })
    .await;
    match &result {
        Ok((_, reports)) => progress.finish(&completion_message("Dump", reports)),
        Err(_) => progress.abandon("Dump aborted"),
    }
    let (instance, _) = result?;

    instance.write_to(&config.output_file).await?;
    if !config.silent {
        println!("📁 Snapshot saved: {}", config.output_file.display());
    }
    Ok(())
}

/// Replay a snapshot file against the configured server.
pub async fn run_restore(config: RestoreConfig) -> Result<()> {
    let instance = Instance::read_from(&config.input_file).await?;

    if !config.silent {
        println!(
            "📡 Connecting to {}:{}...",
            config.connection.host, config.connection.port
        );
    }
    let mut connection = connection::connect_redis(&config.connection).await?;

    let progress = TransferProgress::new(instance.key_count() as u64, config.silent);
    let result = restore::restore_instance(&mut connection, &instance, &progress, |report| {
        log_report(&progress, report)
    })
    .await;
    match &result {
        Ok(reports) => progress.finish(&completion_message("Restore", reports)),
        Err(_) => progress.abandon("Restore aborted"),
    }
    result?;

    if !config.silent {
        println!("✅ Restored from: {}", config.input_file.display());
    }
    Ok(())
}
