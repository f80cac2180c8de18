//! Seed import: load `<resource>.json` arrays into empty stores at startup.

use std::error::Error;
use std::path::Path;

use gantry_storage::RecordStore;

/// Import seed records for one resource. Skipped when the store already
/// has records, so restarting against the same database never duplicates.
pub(crate) fn import(store: &RecordStore, seed_dir: &Path) -> Result<(), Box<dyn Error>> {
    let path = seed_dir.join(format!("{}.json", store.resource()));
    if !path.is_file() {
        return Ok(());
    }
    if store.count()? > 0 {
        tracing::debug!(resource = %store.resource(), "store not empty, skipping seed import");
        return Ok(());
    }

    let text = std::fs::read_to_string(&path)?;
    let records: Vec<serde_json::Value> = serde_json::from_str(&text)
        .map_err(|e| format!("seed file {} is not a JSON array: {}", path.display(), e))?;

    let total = records.len();
    for record in records {
        store.insert(record)?;
    }
    tracing::info!(resource = %store.resource(), count = total, "imported seed records");
    Ok(())
}
