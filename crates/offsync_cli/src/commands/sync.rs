//! Sync command implementation.

use offsync_cache::HttpFetcher;
use offsync_engine::{ChannelSink, EngineEvent, SyncConfig, SyncController, SyncState};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Runs the sync command.
pub async fn run(
    path: &Path,
    url: &str,
    key_field: &str,
    apply: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let store = Arc::new(super::open_store(path)?);
    info!(
        path = %path.display(),
        records = store.record_count(),
        "opened replica"
    );
    let fetcher = Arc::new(HttpFetcher::new()?);
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let sink = Arc::new(ChannelSink::new(tx));

    let controller = SyncController::new(
        SyncConfig::new(url).with_key_field(key_field),
        Arc::clone(&store),
        fetcher,
        sink,
    );

    info!(url, "checking origin for a newer dataset revision");
    let state = controller.check_for_update().await?;
    match state {
        SyncState::UpToDate => {
            println!("Replica is up to date ({} records)", store.record_count());
        }
        SyncState::Error => {
            println!(
                "Origin unreachable; operating on {} cached records",
                store.record_count()
            );
        }
        SyncState::UpdateAvailable => {
            let Some(EngineEvent::UpdateAvailable { marker }) = rx.recv().await else {
                return Err("update detected but no marker event was delivered".into());
            };
            if apply {
                let outcome = controller.apply_update(&marker).await?;
                println!(
                    "Applied revision {}: {} records written, {} skipped",
                    marker, outcome.written, outcome.skipped
                );
            } else {
                println!("Update available (revision {marker}); re-run with --apply");
            }
        }
        other => {
            println!("Sync finished in state {other:?}");
        }
    }

    Ok(())
}
