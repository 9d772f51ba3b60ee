// =============================================================================
// extract/mod.rs — TURNING PAGES INTO ROWS
// =============================================================================
//
// Two extractors, one per product family:
//
//   deposit  plain HTTP + HTML tables, one call per bank
//   loan     browser tab, one call per (bank, term, amount tier)
//
// Both share the retry policy and report into the same RunStats.
// =============================================================================

pub mod deposit;
pub mod loan;

pub use deposit::{DepositExtractor, DepositTable};
pub use loan::{LoanExtractor, LoanSweep};
