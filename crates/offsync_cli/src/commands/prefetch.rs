//! Prefetch command implementation.

use offsync_cache::{HttpFetcher, PartitionName};
use offsync_engine::{ChannelSink, EngineEvent, Prefetcher};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Runs the prefetch command.
pub async fn run(
    path: &Path,
    list: &Path,
    concurrency: usize,
) -> Result<(), Box<dyn std::error::Error>> {
    let urls: Vec<String> = std::fs::read_to_string(list)?
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect();
    if urls.is_empty() {
        return Err(format!("No URLs found in {}", list.display()).into());
    }

    info!(
        list = %list.display(),
        urls = urls.len(),
        concurrency,
        "starting prefetch job"
    );
    let partition = Arc::new(super::open_partition(path, PartitionName::Assets)?);
    let fetcher = Arc::new(HttpFetcher::new()?);
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let sink = Arc::new(ChannelSink::new(tx));

    let printer = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            if let EngineEvent::PrefetchProgress {
                completed,
                total,
                failed,
            } = event
            {
                println!("  {completed}/{total} fetched ({failed} failed)");
            }
        }
    });

    let prefetcher = Prefetcher::new(Arc::clone(&partition), fetcher, sink);
    let report = prefetcher.run(&urls, concurrency).await?;
    drop(prefetcher);
    printer.await?;

    println!();
    println!(
        "Prefetch finished: {} of {} items cached, {} failed",
        report.completed - report.failed,
        report.total,
        report.failed
    );
    println!("Partition now holds {} entries", partition.len());

    if report.all_succeeded() {
        Ok(())
    } else {
        Err("some items failed to prefetch; re-run to retry the missing ones".into())
    }
}
