use std::path::Path;

use anyhow::Context;
use tracing::info;

use crate::models::RiskSnapshot;

/// Reads a JSON array of snapshots, rejecting the file if any entry is invalid.
pub fn read_snapshots(path: &Path) -> anyhow::Result<Vec<RiskSnapshot>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let snapshots = parse_snapshots(&raw)
        .with_context(|| format!("invalid snapshot file {}", path.display()))?;
    info!(count = snapshots.len(), path = %path.display(), "loaded snapshots");
    Ok(snapshots)
}

/// Snapshots validate while deserializing, so one bad entry rejects the file.
pub fn parse_snapshots(raw: &str) -> anyhow::Result<Vec<RiskSnapshot>> {
    Ok(serde_json::from_str(raw)?)
}
