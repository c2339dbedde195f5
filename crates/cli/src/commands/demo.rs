//! Demo mode backend persistence.
//!
//! The in-memory backend is restored from `backend.json` in the data
//! directory before a command and written back after it.

use std::path::{Path, PathBuf};

use vitrine_storefront::backend::{BackendSnapshot, InMemoryBackend};

const SNAPSHOT_FILE: &str = "backend.json";

fn snapshot_path(data_dir: &Path) -> PathBuf {
    data_dir.join(SNAPSHOT_FILE)
}

/// Restore the demo backend, or start empty.
///
/// # Errors
///
/// Returns an error if the snapshot exists but cannot be read or decoded.
pub fn load(data_dir: &Path) -> Result<InMemoryBackend, Box<dyn std::error::Error>> {
    let path = snapshot_path(data_dir);
    if !path.exists() {
        tracing::info!(path = %path.display(), "No demo snapshot, starting empty");
        return Ok(InMemoryBackend::new());
    }
    let raw = std::fs::read_to_string(&path)?;
    let snapshot: BackendSnapshot = serde_json::from_str(&raw)
        .map_err(|e| format!("corrupt demo snapshot {}: {e}", path.display()))?;
    tracing::debug!(
        products = snapshot.products.len(),
        orders = snapshot.orders.len(),
        "Demo snapshot restored"
    );
    Ok(InMemoryBackend::from_snapshot(snapshot))
}

/// Write the demo backend back to disk.
///
/// # Errors
///
/// Returns an error if the data directory cannot be written.
pub fn save(data_dir: &Path, backend: &InMemoryBackend) -> Result<(), Box<dyn std::error::Error>> {
    std::fs::create_dir_all(data_dir)?;
    let raw = serde_json::to_string_pretty(&backend.snapshot())?;
    std::fs::write(snapshot_path(data_dir), raw)?;
    Ok(())
}
