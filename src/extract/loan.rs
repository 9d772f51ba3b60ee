// =============================================================================
// extract/loan.rs — ONE QUOTE PER (BANK, TERM, AMOUNT)
// =============================================================================
//
// Loan quotes only exist after the site's JavaScript has run, so this side of
// the house drives the browser tab. For every combination that survives the
// eligibility gate:
//
//   1. listing page  -> "10.000-100.000TL" and "3-36Ay", the bank's envelope
//   2. term outside the envelope -> nothing to ask for, no row
//   3. detail page   -> monthly rate ("%3,49") and fee ("1.250,00 TL")
//   4. fee becomes a percentage of the principal
//
// Big loans over long terms are never offered, so they are skipped without
// touching the network. Skips are not failures.
// =============================================================================

use tracing::{debug, error, info};
use url::Url;

use crate::config::Config;
use crate::error::{RateError, RateResult};
use crate::locale;
use crate::metrics::RunStats;
use crate::models::{ExtractionFailure, FailureStage, LoanEnvelope, LoanRateRow, SourceConfig};
use crate::render::PageRenderer;
use crate::retry::RetryPolicy;

pub const AMOUNT_RANGE_XPATH: &str =
    r#"//*[@id="bank-interest-rates-list"]/table[1]/tbody[1]/tr[1]/td[1]/div[1]/span[1]"#;
pub const MATURITY_RANGE_XPATH: &str =
    r#"//*[@id="bank-interest-rates-list"]/table[1]/tbody[1]/tr[1]/td[2]/div[1]/span[1]"#;
pub const INTEREST_RATE_XPATH: &str =
    r#"//*[@id="pfc__graph-and-details"]/div[1]/div[2]/div[2]/div[1]/dl[1]/dd[1]"#;
pub const FEE_XPATH: &str =
    r#"//*[@id="pfc__graph-and-details"]/div[1]/div[2]/div[2]/div[1]/dl[1]/dd[6]"#;

/// Whether a (tier, term) combination is worth asking the site about.
pub fn is_eligible(amount_tier: u64, maturity: u32) -> bool {
    let excluded =
        (amount_tier >= 100_000 && maturity > 12) || (amount_tier >= 50_000 && maturity > 24);
    !excluded
}

/// Fee as a percentage of the principal: divide first, then scale.
pub fn fee_percentage(fee: f64, amount_tier: u64) -> f64 {
    fee / amount_tier as f64 * 100.0
}

/// Detail page URL for one combination. Templates with `{amount}` or
/// `{maturity}` placeholders are filled in; anything else gets the two
/// values appended as query parameters.
pub fn detail_url(template: &str, amount_tier: u64, maturity: u32) -> RateResult<String> {
    if template.contains("{amount}") || template.contains("{maturity}") {
        return Ok(template
            .replace("{amount}", &amount_tier.to_string())
            .replace("{maturity}", &maturity.to_string()));
    }

    let mut url = Url::parse(template)
        .map_err(|e| RateError::Config(format!("bad loan URL {template:?}: {e}")))?;
    url.query_pairs_mut()
        .append_pair("amount", &amount_tier.to_string())
        .append_pair("maturity", &maturity.to_string());
    Ok(url.to_string())
}

/// What one maturity sweep over a bank's tiers produced.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct LoanSweep {
    pub rows: Vec<LoanRateRow>,
    pub failures: Vec<ExtractionFailure>,
}

pub struct LoanExtractor<'a> {
    renderer: &'a mut dyn PageRenderer,
    config: &'a Config,
    policy: RetryPolicy,
    stats: &'a RunStats,
}

impl<'a> LoanExtractor<'a> {
    pub fn new(
        renderer: &'a mut dyn PageRenderer,
        config: &'a Config,
        policy: RetryPolicy,
        stats: &'a RunStats,
    ) -> Self {
        Self { renderer, config, policy, stats }
    }

    /// Every configured tier for one term, in registry order. Combinations
    /// that run out of retries are logged and reported, not propagated.
    pub async fn extract_maturity(
        &mut self,
        source: &SourceConfig,
        maturity: u32,
    ) -> RateResult<LoanSweep> {
        let mut sweep = LoanSweep::default();

        for &amount_tier in &source.amount_tiers {
            match self.extract(source, maturity, amount_tier).await {
                Ok(Some(row)) => sweep.rows.push(row),
                Ok(None) => {}
                Err(err) if err.is_retryable() => {
                    error!(
                        bank = %source.short_name,
                        maturity = maturity,
                        amount_tier = amount_tier,
                        error = %err,
                        "Loan quote unavailable, skipping combination"
                    );
                    self.stats.increment_loan_failures();
                    sweep.failures.push(ExtractionFailure {
                        bank: source.short_name.clone(),
                        stage: FailureStage::Loan { maturity, amount_tier },
                        kind: err.kind().to_string(),
                        message: err.to_string(),
                    });
                }
                Err(err) => return Err(err),
            }
        }

        Ok(sweep)
    }

    /// A single quote. `Ok(None)` when the combination is ineligible or the
    /// bank does not lend for this term.
    pub async fn extract(
        &mut self,
        source: &SourceConfig,
        maturity: u32,
        amount_tier: u64,
    ) -> RateResult<Option<LoanRateRow>> {
        let bank = source.short_name.as_str();
        if !is_eligible(amount_tier, maturity) {
            debug!(bank = bank, maturity = maturity, amount_tier = amount_tier, "Ineligible, skipped");
            self.stats.increment_loan_ineligible();
            return Ok(None);
        }

        let listing = self.config.loan_listing_url(bank);
        let detail = detail_url(&source.loan_url_template, amount_tier, maturity)?;
        self.stats.increment_loan_attempts();

        let mut attempts = self
            .policy
            .begin(format!("loan {bank} {maturity}m {amount_tier}"));
        let outcome = loop {
            match self.attempt(bank, &listing, &detail, maturity, amount_tier).await {
                Ok(found) => break Ok(found),
                Err(err) => {
                    if let Err(err) = attempts.absorb(err).await {
                        break Err(err);
                    }
                }
            }
        };
        self.stats.add_retries(attempts.retries());

        match outcome? {
            Some(row) => {
                self.stats.increment_loan_rows();
                Ok(Some(row))
            }
            None => {
                self.stats.increment_loan_out_of_envelope();
                Ok(None)
            }
        }
    }

    /// Read the amount and term range from the first row of a listing page.
    pub async fn read_envelope(&mut self, listing_url: &str) -> RateResult<LoanEnvelope> {
        let timeout = self.config.render_timeout;
        self.renderer.navigate(listing_url).await?;
        let amounts = self.renderer.wait_for_text(AMOUNT_RANGE_XPATH, timeout).await?;
        let terms = self.renderer.wait_for_text(MATURITY_RANGE_XPATH, timeout).await?;

        let (min_amount, max_amount) = locale::parse_range(&amounts)?;
        let (min_maturity, max_maturity) = locale::parse_range(&terms)?;
        let min_maturity = narrow(min_maturity, &terms)?;
        let max_maturity = narrow(max_maturity, &terms)?;

        Ok(LoanEnvelope { min_amount, max_amount, min_maturity, max_maturity })
    }

    async fn attempt(
        &mut self,
        bank: &str,
        listing_url: &str,
        detail: &str,
        maturity: u32,
        amount_tier: u64,
    ) -> RateResult<Option<LoanRateRow>> {
        let envelope = self.read_envelope(listing_url).await?;
        if !envelope.covers_maturity(maturity) {
            debug!(
                bank = bank,
                maturity = maturity,
                min_maturity = envelope.min_maturity,
                max_maturity = envelope.max_maturity,
                "Term outside the bank's envelope"
            );
            return Ok(None);
        }

        let timeout = self.config.render_timeout;
        self.renderer.navigate(detail).await?;
        let rate_text = self.renderer.wait_for_text(INTEREST_RATE_XPATH, timeout).await?;
        let fee_text = self.renderer.wait_for_text(FEE_XPATH, timeout).await?;

        let interest_rate = locale::parse_decimal(&rate_text)?;
        let fee = locale::parse_decimal(&fee_text)?;
        if interest_rate < 0.0 || fee < 0.0 {
            return Err(RateError::parse(format!(
                "negative quote for {bank}: rate {rate_text:?}, fee {fee_text:?}"
            )));
        }

        let row = LoanRateRow::new(
            bank,
            amount_tier,
            maturity,
            interest_rate,
            fee_percentage(fee, amount_tier),
            envelope,
        );
        info!(
            bank = bank,
            maturity = maturity,
            amount_tier = amount_tier,
            interest_rate = row.interest_rate,
            fee_pct = row.fee_pct,
            "Loan quote"
        );
        Ok(Some(row))
    }
}

fn narrow(months: u64, raw: &str) -> RateResult<u32> {
    u32::try_from(months).map_err(|_| RateError::parse(format!("term out of range in {raw:?}")))
}
