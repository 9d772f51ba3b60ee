// =============================================================================
// storage/redis.rs — SNAPSHOTS IN REDIS
// =============================================================================
//
// Key layout (prefix defaults to "rates"):
//
//   rates:latest            the whole snapshot as JSON
//   rates:latest:deposits   just the deposit rows, for consumers that only
//   rates:latest:loans      care about one product family
//   rates:history           sorted set of snapshots, scored by capture time
//
// Every write goes out as one MULTI/EXEC pipeline, so a reader never sees a
// deposits key from one run next to a loans key from another.
// =============================================================================

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tracing::{debug, info};

use super::SnapshotSink;
use crate::config::{Config, StorageMode};
use crate::error::RateResult;
use crate::models::RateSnapshot;

pub struct RedisSink {
    con: ConnectionManager,
    keys: RedisKeys,
    mode: StorageMode,
}

/// Every key the sink writes, derived from one prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedisKeys {
    pub latest: String,
    pub deposits: String,
    pub loans: String,
    pub history: String,
}

impl RedisKeys {
    pub fn new(prefix: &str) -> Self {
        Self {
            latest: format!("{prefix}:latest"),
            deposits: format!("{prefix}:latest:deposits"),
            loans: format!("{prefix}:latest:loans"),
            history: format!("{prefix}:history"),
        }
    }
}

impl RedisSink {
    pub async fn connect(config: &Config) -> RateResult<Self> {
        let client = redis::Client::open(config.redis_url.as_str())?;
        let con = ConnectionManager::new(client).await?;
        info!(prefix = %config.redis_key_prefix, "Redis connection established");
        Ok(Self {
            con,
            keys: RedisKeys::new(&config.redis_key_prefix),
            mode: config.storage_mode,
        })
    }
}

#[async_trait]
impl SnapshotSink for RedisSink {
    async fn write(&self, snapshot: &RateSnapshot) -> RateResult<()> {
        let whole = serde_json::to_string(snapshot)?;
        let deposits = serde_json::to_string(&snapshot.deposits)?;
        let loans = serde_json::to_string(&snapshot.loans)?;

        let mut pipe = redis::pipe();
        pipe.atomic()
            .set(&self.keys.latest, &whole)
            .ignore()
            .set(&self.keys.deposits, &deposits)
            .ignore()
            .set(&self.keys.loans, &loans)
            .ignore();

        match self.mode {
            StorageMode::Replace => {
                pipe.del(&self.keys.history).ignore();
            }
            StorageMode::Append => {
                // Score is the capture time so history reads back in run order
                let score = snapshot.captured_at.timestamp_millis() as f64;
                pipe.zadd(&self.keys.history, &whole, score).ignore();
            }
        }

        let mut con = self.con.clone();
        let _: () = pipe.query_async(&mut con).await?;

        debug!(
            snapshot_id = %snapshot.id,
            bytes = whole.len(),
            mode = %self.mode,
            "Snapshot written to Redis"
        );
        Ok(())
    }

    async fn latest(&self) -> RateResult<Option<RateSnapshot>> {
        let mut con = self.con.clone();
        let raw: Option<String> = con.get(&self.keys.latest).await?;
        Ok(match raw {
            Some(json) => Some(serde_json::from_str(&json)?),
            None => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys_share_the_prefix() {
        let keys = RedisKeys::new("rates");
        assert_eq!(keys.latest, "rates:latest");
        assert_eq!(keys.deposits, "rates:latest:deposits");
        assert_eq!(keys.loans, "rates:latest:loans");
        assert_eq!(keys.history, "rates:history");
    }

    #[tokio::test]
    #[ignore] // Requires a Redis server on RATE_ENGINE_REDIS_URL
    async fn test_round_trip_against_live_redis() {
        let config = Config {
            redis_key_prefix: format!("rates-test-{}", uuid::Uuid::new_v4()),
            storage_mode: StorageMode::Append,
            ..Config::from_env().unwrap()
        };
        let sink = RedisSink::connect(&config).await.unwrap();
        assert!(sink.latest().await.unwrap().is_none());

        let snapshot = RateSnapshot::new(Vec::new(), Vec::new(), Vec::new());
        sink.write(&snapshot).await.unwrap();
        assert_eq!(sink.latest().await.unwrap(), Some(snapshot));

        let mut con = sink.con.clone();
        let history: usize = con.zcard(&sink.keys.history).await.unwrap();
        assert_eq!(history, 1);
        let _: () = con
            .del(&[&sink.keys.latest, &sink.keys.deposits, &sink.keys.loans, &sink.keys.history])
            .await
            .unwrap();
    }
}
