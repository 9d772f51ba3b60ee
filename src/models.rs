// =============================================================================
// models.rs — THE ROWS WE ACTUALLY KEEP
// =============================================================================
//
// Everything the engine produces ends up in one of these structs. Rows are
// built fresh every run and never updated in place; a run produces one
// RateSnapshot and that snapshot is the unit the sinks store and hand back.
//
// Numbers are already numbers by the time they get here. If a value is still
// text, it never made it out of the extractor.
// =============================================================================

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Loan terms (in months) swept for every bank, in sweep order.
pub const LOAN_MATURITIES: [u32; 8] = [3, 6, 9, 12, 18, 24, 30, 36];

/// One bank as described by the source registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Registry key and the slug used in every page URL for this bank.
    pub short_name: String,

    /// Detail page URL, either with `{amount}` / `{maturity}` placeholders or
    /// a bare URL that gets `amount=..&maturity=..` appended.
    pub loan_url_template: String,

    /// Loan principals to quote, in configured order.
    pub amount_tiers: Vec<u64>,
}

/// A single deposit rate: one cell of a bank's deposit table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DepositRateRow {
    pub bank: String,

    /// Upper bound of the principal bracket the row applies to.
    pub principal_tier: u64,

    /// Day range such as "1-32" or "33-45", reconstructed from the headers.
    pub maturity_bucket: String,

    /// Annual rate in percent.
    pub rate: f64,
}

/// The amount and term range a bank advertises on its loan listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoanEnvelope {
    pub min_amount: u64,
    pub max_amount: u64,
    pub min_maturity: u32,
    pub max_maturity: u32,
}

impl LoanEnvelope {
    pub fn covers_maturity(&self, maturity: u32) -> bool {
        self.min_maturity <= maturity && maturity <= self.max_maturity
    }
}

/// One loan quote for a (bank, maturity, amount tier) combination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanRateRow {
    pub bank: String,
    pub amount_tier: u64,
    pub maturity: u32,
    /// Monthly interest rate in percent.
    pub interest_rate: f64,
    /// Origination fee as a percentage of the principal.
    pub fee_pct: f64,
    pub min_amount: u64,
    pub max_amount: u64,
    pub min_maturity: u32,
    pub max_maturity: u32,
}

impl LoanRateRow {
    pub fn new(
        bank: impl Into<String>,
        amount_tier: u64,
        maturity: u32,
        interest_rate: f64,
        fee_pct: f64,
        envelope: LoanEnvelope,
    ) -> Self {
        Self {
            bank: bank.into(),
            amount_tier,
            maturity,
            interest_rate,
            fee_pct,
            min_amount: envelope.min_amount,
            max_amount: envelope.max_amount,
            min_maturity: envelope.min_maturity,
            max_maturity: envelope.max_maturity,
        }
    }
}

/// Where in the sweep an extraction gave up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "stage", rename_all = "snake_case")]
pub enum FailureStage {
    Deposit,
    Loan { maturity: u32, amount_tier: u64 },
}

impl fmt::Display for FailureStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureStage::Deposit => write!(f, "deposit"),
            FailureStage::Loan { maturity, amount_tier } => {
                write!(f, "loan {}m / {}", maturity, amount_tier)
            }
        }
    }
}

/// A combination that exhausted its retries. Kept in the snapshot so a
/// consumer can tell "bank had no data" apart from "we could not get it".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionFailure {
    pub bank: String,
    #[serde(flatten)]
    pub stage: FailureStage,
    pub kind: String,
    pub message: String,
}

/// Everything one pipeline run produced, stamped with a single capture time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateSnapshot {
    pub id: Uuid,
    pub captured_at: DateTime<Utc>,
    pub deposits: Vec<DepositRateRow>,
    pub loans: Vec<LoanRateRow>,
    #[serde(default)]
    pub failures: Vec<ExtractionFailure>,
}

impl RateSnapshot {
    pub fn new(
        deposits: Vec<DepositRateRow>,
        loans: Vec<LoanRateRow>,
        failures: Vec<ExtractionFailure>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            captured_at: Utc::now(),
            deposits,
            loans,
            failures,
        }
    }

    /// Distinct banks that contributed at least one row, in first-seen order.
    pub fn banks(&self) -> Vec<&str> {
        let mut seen: Vec<&str> = Vec::new();
        let names = self
            .deposits
            .iter()
            .map(|d| d.bank.as_str())
            .chain(self.loans.iter().map(|l| l.bank.as_str()));
        for name in names {
            if !seen.contains(&name) {
                seen.push(name);
            }
        }
        seen
    }
}

impl fmt::Display for RateSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}: {} deposit rows, {} loan rows, {} failures",
            self.id,
            self.captured_at.to_rfc3339(),
            self.deposits.len(),
            self.loans.len(),
            self.failures.len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn envelope() -> LoanEnvelope {
        LoanEnvelope {
            min_amount: 1_000,
            max_amount: 100_000,
            min_maturity: 3,
            max_maturity: 36,
        }
    }

    #[test]
    fn test_envelope_bounds_are_inclusive() {
        let env = envelope();
        assert!(env.covers_maturity(3));
        assert!(env.covers_maturity(36));
        assert!(!env.covers_maturity(2));
        assert!(!env.covers_maturity(37));
    }

    #[test]
    fn test_loan_row_copies_envelope() {
        let row = LoanRateRow::new("akbank", 50_000, 12, 3.49, 2.5, envelope());
        assert_eq!(row.min_amount, 1_000);
        assert_eq!(row.max_maturity, 36);
        assert_eq!(row.bank, "akbank");
    }

    #[test]
    fn test_failure_serializes_flat() {
        let failure = ExtractionFailure {
            bank: "akbank".into(),
            stage: FailureStage::Loan { maturity: 12, amount_tier: 50_000 },
            kind: "timeout".into(),
            message: "gave up".into(),
        };
        let json = serde_json::to_value(&failure).unwrap();
        assert_eq!(json["stage"], "loan");
        assert_eq!(json["maturity"], 12);
        assert_eq!(json["amount_tier"], 50_000);
    }

    #[test]
    fn test_banks_are_listed_once_in_order() {
        let deposit = |bank: &str| DepositRateRow {
            bank: bank.into(),
            principal_tier: 50_000,
            maturity_bucket: "1-32".into(),
            rate: 45.0,
        };
        let snapshot = RateSnapshot::new(
            vec![deposit("garanti"), deposit("garanti"), deposit("akbank")],
            vec![LoanRateRow::new("ziraat", 10_000, 3, 3.1, 1.0, envelope())],
            Vec::new(),
        );
        assert_eq!(snapshot.banks(), vec!["garanti", "akbank", "ziraat"]);
    }
}
