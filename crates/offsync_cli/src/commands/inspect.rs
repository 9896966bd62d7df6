//! Inspect command implementation.

use offsync_cache::PartitionName;
use offsync_store::REVISION_MARKER_KEY;
use serde::Serialize;
use std::path::Path;

/// Replica inspection result.
#[derive(Debug, Serialize)]
pub struct InspectResult {
    /// Replica path.
    pub path: String,
    /// Snapshot schema version.
    pub schema_version: u32,
    /// Number of dataset records.
    pub record_count: usize,
    /// Locally persisted revision marker, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revision_marker: Option<String>,
    /// Per-partition statistics.
    pub partitions: Vec<PartitionStats>,
}

/// Statistics for a single cache partition.
#[derive(Debug, Serialize)]
pub struct PartitionStats {
    /// Partition name.
    pub name: String,
    /// Number of cached responses.
    pub entry_count: usize,
    /// Snapshot file size in bytes.
    pub snapshot_size: u64,
}

/// Runs the inspect command.
pub fn run(path: &Path, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    if !path.exists() {
        return Err(format!("No replica found at {}", path.display()).into());
    }

    let store = super::open_store(path)?;
    let mut result = InspectResult {
        path: path.display().to_string(),
        schema_version: offsync_store::SCHEMA_VERSION,
        record_count: store.record_count(),
        revision_marker: store.metadata(REVISION_MARKER_KEY),
        partitions: Vec::new(),
    };

    for name in [
        PartitionName::Shell,
        PartitionName::Data,
        PartitionName::Assets,
    ] {
        let dir = path.join("partitions").join(name.as_str());
        if !dir.exists() {
            continue;
        }
        let partition = super::open_partition(path, name)?;
        let snapshot_size = std::fs::metadata(dir.join(super::SNAPSHOT_FILE))
            .map(|m| m.len())
            .unwrap_or(0);
        result.partitions.push(PartitionStats {
            name: name.as_str().to_string(),
            entry_count: partition.len(),
            snapshot_size,
        });
    }

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        _ => {
            print_text_output(&result);
        }
    }

    Ok(())
}

fn print_text_output(result: &InspectResult) {
    println!("offsync Replica Inspection");
    println!("==========================");
    println!();
    println!("Path: {}", result.path);
    println!();
    println!("Dataset:");
    println!("  Schema version:  {}", result.schema_version);
    println!("  Records:         {}", result.record_count);
    println!(
        "  Revision marker: {}",
        result.revision_marker.as_deref().unwrap_or("(none)")
    );

    if !result.partitions.is_empty() {
        println!();
        println!("Partitions:");
        for p in &result.partitions {
            println!(
                "  [{}] {} entries, {} bytes",
                p.name, p.entry_count, p.snapshot_size
            );
        }
    }
}
