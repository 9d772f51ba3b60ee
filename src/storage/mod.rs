// =============================================================================
// storage/mod.rs — WHERE SNAPSHOTS GO TO LIVE
// =============================================================================
//
// One trait, two homes:
//
//   RedisSink     latest snapshot under fixed keys, history in a sorted set
//   JsonFileSink  latest.json, plus one timestamped file per run in history
//
// StorageMode decides what happens to older runs:
//
//   Replace  the new snapshot is the only one left (history is cleared)
//   Append   the new snapshot becomes latest and is added to history
//
// A sink sees complete snapshots only. The pipeline never writes partial runs.
// =============================================================================

pub mod file;
pub mod redis;

use async_trait::async_trait;
use tracing::info;

use crate::config::{Config, StorageBackend};
use crate::error::RateResult;
use crate::models::RateSnapshot;

pub use self::file::JsonFileSink;
pub use self::redis::RedisSink;

#[async_trait]
pub trait SnapshotSink: Send + Sync {
    /// Persist a complete snapshot according to the sink's mode.
    async fn write(&self, snapshot: &RateSnapshot) -> RateResult<()>;

    /// The most recently written snapshot, if any.
    async fn latest(&self) -> RateResult<Option<RateSnapshot>>;
}

/// Build the sink the configuration asks for.
pub async fn open_sink(config: &Config) -> RateResult<Box<dyn SnapshotSink>> {
    let sink: Box<dyn SnapshotSink> = match config.storage_backend {
        StorageBackend::Redis => Box::new(RedisSink::connect(config).await?),
        StorageBackend::File => Box::new(JsonFileSink::new(&config.snapshot_dir, config.storage_mode)),
    };
    info!(
        backend = %config.storage_backend,
        mode = %config.storage_mode,
        "✅ Snapshot sink ready"
    );
    Ok(sink)
}

/// In-memory sink for tests.
#[cfg(test)]
pub mod memory {
    use std::sync::Arc;

    use async_trait::async_trait;
    use parking_lot::Mutex;

    use super::SnapshotSink;
    use crate::config::StorageMode;
    use crate::error::{RateError, RateResult};
    use crate::models::RateSnapshot;

    #[derive(Clone)]
    pub struct MemorySink {
        mode: StorageMode,
        stored: Arc<Mutex<Vec<RateSnapshot>>>,
        broken: bool,
    }

    impl MemorySink {
        pub fn new(mode: StorageMode) -> Self {
            Self { mode, stored: Arc::default(), broken: false }
        }

        /// A sink whose every write fails with a storage error.
        pub fn broken() -> Self {
            Self { broken: true, ..Self::new(StorageMode::Replace) }
        }

        pub fn stored(&self) -> Vec<RateSnapshot> {
            self.stored.lock().clone()
        }
    }

    #[async_trait]
    impl SnapshotSink for MemorySink {
        async fn write(&self, snapshot: &RateSnapshot) -> RateResult<()> {
            if self.broken {
                return Err(RateError::Storage("sink unavailable".into()));
            }
            let mut stored = self.stored.lock();
            if self.mode == StorageMode::Replace {
                stored.clear();
            }
            stored.push(snapshot.clone());
            Ok(())
        }

        async fn latest(&self) -> RateResult<Option<RateSnapshot>> {
            Ok(self.stored.lock().last().cloned())
        }
    }
}
