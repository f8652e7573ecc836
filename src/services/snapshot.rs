use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use tracing::info;
use uuid::Uuid;

use crate::error::Result;
use crate::services::vector_index::{CocktailVectorIndex, IndexSnapshot};

const MANIFEST_FILE: &str = "manifest.json";

/// Pointer to the active snapshot. Replaced atomically (write-temp,
/// rename) so a crash mid-save never leaves a torn pointer; stale snapshot
/// files are cleaned up out of band.
#[derive(Debug, Serialize, Deserialize)]
pub struct SnapshotManifest {
    pub active: String,
    pub saved_at: DateTime<Utc>,
}

/// On-disk persistence for the vector index. Each save writes a fresh
/// snapshot file named by a generated id and repoints the manifest at it.
pub struct SnapshotStore {
    root: PathBuf,
}

impl SnapshotStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn save(&self, snapshot: &IndexSnapshot) -> Result<String> {
        fs::create_dir_all(&self.root)?;

        let file_name = format!("cocktail_index_{}.json", Uuid::new_v4());
        fs::write(self.root.join(&file_name), serde_json::to_vec(snapshot)?)?;

        let manifest = SnapshotManifest {
            active: file_name.clone(),
            saved_at: Utc::now(),
        };
        let tmp_path = self.root.join(format!("{MANIFEST_FILE}.tmp"));
        fs::write(&tmp_path, serde_json::to_vec_pretty(&manifest)?)?;
        fs::rename(&tmp_path, self.root.join(MANIFEST_FILE))?;

        info!(snapshot = %file_name, rows = snapshot.ids.len(), "saved index snapshot");
        Ok(file_name)
    }

    /// The active snapshot, or `None` when nothing has been saved yet.
    pub fn load(&self) -> Result<Option<IndexSnapshot>> {
        let manifest_path = self.root.join(MANIFEST_FILE);
        if !manifest_path.exists() {
            return Ok(None);
        }

        let manifest: SnapshotManifest = serde_json::from_slice(&fs::read(manifest_path)?)?;
        let snapshot: IndexSnapshot =
            serde_json::from_slice(&fs::read(self.root.join(&manifest.active))?)?;
        Ok(Some(snapshot))
    }

    /// Load and rebuild the index in one step.
    pub fn load_index(
        &self,
        clustering_threshold: Option<usize>,
        probe_count: usize,
    ) -> Result<Option<CocktailVectorIndex>> {
        self.load()?
            .map(|snapshot| {
                CocktailVectorIndex::from_snapshot(snapshot, clustering_threshold, probe_count)
            })
            .transpose()
    }
}
