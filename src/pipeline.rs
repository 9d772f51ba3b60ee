// =============================================================================
// pipeline.rs — ONE SWEEP, START TO FINISH
// =============================================================================
//
// The driver. For every bank in registry order:
//
//   deposits  one extractor call
//   loans     one sweep per term in LOAN_MATURITIES, every tier each time
//
// Everything runs strictly in sequence because the browser is a single tab.
// Transient failures are retried inside the extractors; whatever still fails
// is logged, counted and listed in the snapshot's `failures`. Config and
// storage errors end the run on the spot and nothing is written.
// =============================================================================

use tracing::{error, info, warn};

use crate::config::Config;
use crate::error::RateResult;
use crate::extract::{DepositExtractor, LoanExtractor};
use crate::metrics::{RunStats, RunStatsSnapshot};
use crate::models::{ExtractionFailure, FailureStage, RateSnapshot, LOAN_MATURITIES};
use crate::registry::SourceRegistry;
use crate::render::{PageFetcher, PageRenderer};
use crate::retry::RetryPolicy;
use crate::storage::SnapshotSink;

pub struct RatePipeline {
    config: Config,
    registry: SourceRegistry,
    fetcher: Box<dyn PageFetcher>,
    renderer: Box<dyn PageRenderer>,
    sink: Box<dyn SnapshotSink>,
    stats: RunStats,
}

impl RatePipeline {
    pub fn new(
        config: Config,
        registry: SourceRegistry,
        fetcher: Box<dyn PageFetcher>,
        renderer: Box<dyn PageRenderer>,
        sink: Box<dyn SnapshotSink>,
    ) -> Self {
        Self {
            config,
            registry,
            fetcher,
            renderer,
            sink,
            stats: RunStats::new(),
        }
    }

    /// Sweep every bank and return the assembled snapshot without storing it.
    pub async fn run(&mut self) -> RateResult<RateSnapshot> {
        self.stats = RunStats::new();
        let policy = RetryPolicy::from_config(&self.config);

        info!(
            banks = self.registry.len(),
            maturities = LOAN_MATURITIES.len(),
            "🏦 Rate sweep starting"
        );

        let mut deposits = Vec::new();
        let mut loans = Vec::new();
        let mut failures = Vec::new();

        for source in self.registry.iter() {
            let bank = source.short_name.as_str();
            self.stats.increment_banks();

            let deposit =
                DepositExtractor::new(self.fetcher.as_ref(), &self.config, policy, &self.stats);
            match deposit.extract(bank).await {
                Ok(rows) => {
                    self.stats.add_deposit_rows(rows.len());
                    deposits.extend(rows);
                }
                Err(err) if err.is_retryable() => {
                    error!(bank = bank, error = %err, "Deposit rates unavailable, skipping bank");
                    self.stats.increment_deposit_failures();
                    failures.push(ExtractionFailure {
                        bank: bank.to_string(),
                        stage: FailureStage::Deposit,
                        kind: err.kind().to_string(),
                        message: err.to_string(),
                    });
                }
                Err(err) => return Err(err),
            }

            let mut loan =
                LoanExtractor::new(self.renderer.as_mut(), &self.config, policy, &self.stats);
            for maturity in LOAN_MATURITIES {
                let sweep = loan.extract_maturity(source, maturity).await?;
                info!(
                    bank = bank,
                    maturity = maturity,
                    rows = sweep.rows.len(),
                    failures = sweep.failures.len(),
                    "Maturity swept"
                );
                loans.extend(sweep.rows);
                failures.extend(sweep.failures);
            }
        }

        let snapshot = RateSnapshot::new(deposits, loans, failures);
        self.stats.log_summary();
        if !snapshot.failures.is_empty() {
            warn!(failures = snapshot.failures.len(), "Sweep finished with gaps");
        }
        info!(snapshot = %snapshot, "✅ Rate sweep complete");
        Ok(snapshot)
    }

    /// Run a sweep and store the result. Nothing is written if the sweep fails.
    pub async fn update_rates(&mut self) -> RateResult<RateSnapshot> {
        let snapshot = self.run().await?;
        self.sink.write(&snapshot).await?;
        info!(snapshot_id = %snapshot.id, "💾 Snapshot stored");
        Ok(snapshot)
    }

    /// The newest stored snapshot.
    pub async fn read_rates(&self) -> RateResult<Option<RateSnapshot>> {
        self.sink.latest().await
    }

    /// Counters from the most recent `run`.
    pub fn stats(&self) -> RunStatsSnapshot {
        self.stats.snapshot()
    }

    /// Release the browser session.
    pub async fn shutdown(&mut self) -> RateResult<()> {
        self.renderer.shutdown().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StorageMode;
    use crate::error::RateError;
    use crate::extract::deposit::tests::DEPOSIT_PAGE;
    use crate::extract::loan::tests::{renderer_for, source, test_config};
    use crate::render::fakes::{FakeFetcher, FakeRenderer};
    use crate::storage::memory::MemorySink;
    use std::time::Duration;

    const AKBANK_TIERS: &[u64] = &[10_000, 50_000, 100_000];
    const ZIRAAT_TIERS: &[u64] = &[10_000];

    fn config() -> Config {
        Config {
            retry_delay: Duration::ZERO,
            ..test_config()
        }
    }

    fn registry() -> SourceRegistry {
        SourceRegistry::from_sources(vec![source("akbank", AKBANK_TIERS), source("ziraat", ZIRAAT_TIERS)]).unwrap()
    }

    fn fetcher() -> FakeFetcher {
        FakeFetcher::default()
            .with_page("https://rates.test/mevduat/akbank", DEPOSIT_PAGE)
            .with_page("https://rates.test/mevduat/ziraat", "<html><body></body></html>")
    }

    fn renderer() -> FakeRenderer {
        let r = renderer_for(FakeRenderer::default(), "akbank", AKBANK_TIERS, ("1.000-250.000TL", "3-36Ay"));
        renderer_for(r, "ziraat", ZIRAAT_TIERS, ("5.000-75.000TL", "3-24Ay"))
    }

    fn pipeline(fetcher: FakeFetcher, renderer: FakeRenderer, sink: MemorySink) -> RatePipeline {
        RatePipeline::new(config(), registry(), Box::new(fetcher), Box::new(renderer), Box::new(sink))
    }

    #[tokio::test]
    async fn test_two_bank_sweep() {
        let renderer = renderer();
        let log = renderer.clone();
        let mut pipeline = pipeline(fetcher(), renderer, MemorySink::new(StorageMode::Replace));

        let snapshot = pipeline.run().await.unwrap();

        // akbank: 8 terms at 10k, 6 at 50k, 4 at 100k. ziraat lends up to 24 months.
        assert_eq!(snapshot.loans.len(), 8 + 6 + 4 + 6);
        assert_eq!(snapshot.deposits.len(), 7);
        assert!(snapshot.deposits.iter().all(|d| d.bank == "akbank"));
        assert!(snapshot.failures.is_empty());
        assert_eq!(snapshot.banks(), vec!["akbank", "ziraat"]);

        // Rows arrive in sweep order: bank, then term, then tier.
        let first: Vec<_> = snapshot.loans.iter().take(3).map(|l| (l.maturity, l.amount_tier)).collect();
        assert_eq!(first, vec![(3, 10_000), (3, 50_000), (3, 100_000)]);

        let navigations = log.navigations();
        assert!(!navigations.iter().any(|u| u.contains("amount=100000&maturity=18")));
        assert!(!navigations.iter().any(|u| u.contains("amount=50000&maturity=30")));
        assert!(!navigations.iter().any(|u| u.contains("ziraat?amount=10000&maturity=36")));
        assert_eq!(navigations.len(), 18 * 2 + 6 * 2 + 2);

        let stats = pipeline.stats();
        assert_eq!(stats.banks, 2);
        assert_eq!(stats.loan_ineligible, 6);
        assert_eq!(stats.loan_out_of_envelope, 2);
        assert_eq!(stats.loan_rows, 24);
    }

    #[tokio::test]
    async fn test_repeated_runs_agree() {
        let mut pipeline = pipeline(fetcher(), renderer(), MemorySink::new(StorageMode::Replace));
        let first = pipeline.run().await.unwrap();
        let second = pipeline.run().await.unwrap();

        assert_eq!(first.deposits, second.deposits);
        assert_eq!(first.loans, second.loans);
        assert_ne!(first.id, second.id);
        assert_eq!(pipeline.stats().loan_rows, 24);
    }

    #[tokio::test]
    async fn test_deposit_failure_is_reported_not_fatal() {
        let fetcher = FakeFetcher::default().with_page("https://rates.test/mevduat/akbank", DEPOSIT_PAGE);
        let mut pipeline = pipeline(fetcher, renderer(), MemorySink::new(StorageMode::Replace));

        let snapshot = pipeline.run().await.unwrap();
        assert_eq!(snapshot.failures.len(), 1);
        assert_eq!(snapshot.failures[0].bank, "ziraat");
        assert_eq!(snapshot.failures[0].stage, FailureStage::Deposit);
        assert_eq!(snapshot.loans.len(), 24);
        assert_eq!(pipeline.stats().deposit_failures, 1);
    }

    #[tokio::test]
    async fn test_update_then_read_back() {
        let sink = MemorySink::new(StorageMode::Append);
        let mut pipeline = pipeline(fetcher(), renderer(), sink.clone());
        assert!(pipeline.read_rates().await.unwrap().is_none());

        let stored = pipeline.update_rates().await.unwrap();
        assert_eq!(pipeline.read_rates().await.unwrap(), Some(stored));
        assert_eq!(sink.stored().len(), 1);
    }

    #[tokio::test]
    async fn test_storage_failure_is_fatal() {
        let mut pipeline = pipeline(fetcher(), renderer(), MemorySink::broken());
        let err = pipeline.update_rates().await.unwrap_err();
        assert!(matches!(err, RateError::Storage(_)));
    }

    #[tokio::test]
    async fn test_bad_loan_url_aborts_the_run() {
        let mut bad = source("akbank", &[10_000]);
        bad.loan_url_template = "no scheme here".into();
        let sink = MemorySink::new(StorageMode::Replace);
        let mut pipeline = RatePipeline::new(
            config(),
            SourceRegistry::from_sources(vec![bad]).unwrap(),
            Box::new(fetcher()),
            Box::new(renderer()),
            Box::new(sink.clone()),
        );
        assert!(matches!(pipeline.update_rates().await, Err(RateError::Config(_))));
        assert!(sink.stored().is_empty());
    }
}
