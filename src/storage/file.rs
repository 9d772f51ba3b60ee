// =============================================================================
// storage/file.rs — SNAPSHOTS ON DISK
// =============================================================================
//
// `latest.json` always holds the newest snapshot. In append mode every run
// also leaves a `snapshot-<timestamp>.json` behind; in replace mode those
// history files are removed so only the newest run remains.
// =============================================================================

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tracing::debug;

use super::SnapshotSink;
use crate::config::StorageMode;
use crate::error::RateResult;
use crate::models::RateSnapshot;

const LATEST_FILE: &str = "latest.json";
const HISTORY_PREFIX: &str = "snapshot-";

pub struct JsonFileSink {
    dir: PathBuf,
    mode: StorageMode,
}

impl JsonFileSink {
    pub fn new(dir: impl AsRef<Path>, mode: StorageMode) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            mode,
        }
    }

    /// History file name for a snapshot, sortable by capture time.
    pub fn history_file_name(snapshot: &RateSnapshot) -> String {
        format!(
            "{HISTORY_PREFIX}{}.json",
            snapshot.captured_at.format("%Y%m%dT%H%M%S%.6fZ")
        )
    }

    async fn clear_history(&self) -> RateResult<()> {
        let mut entries = fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if name.starts_with(HISTORY_PREFIX) && name.ends_with(".json") {
                fs::remove_file(entry.path()).await?;
            }
        }
        Ok(())
    }
}

/// Write to a sibling temp file first, then rename over the target.
async fn write_atomically(path: &Path, contents: &[u8]) -> RateResult<()> {
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, contents).await?;
    fs::rename(&tmp, path).await?;
    Ok(())
}

#[async_trait]
impl SnapshotSink for JsonFileSink {
    async fn write(&self, snapshot: &RateSnapshot) -> RateResult<()> {
        fs::create_dir_all(&self.dir).await?;
        let json = serde_json::to_vec_pretty(snapshot)?;

        match self.mode {
            StorageMode::Replace => self.clear_history().await?,
            StorageMode::Append => {
                let history = self.dir.join(Self::history_file_name(snapshot));
                write_atomically(&history, &json).await?;
            }
        }
        write_atomically(&self.dir.join(LATEST_FILE), &json).await?;

        debug!(
            snapshot_id = %snapshot.id,
            dir = %self.dir.display(),
            mode = %self.mode,
            "Snapshot written to disk"
        );
        Ok(())
    }

    async fn latest(&self) -> RateResult<Option<RateSnapshot>> {
        match fs::read(self.dir.join(LATEST_FILE)).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
