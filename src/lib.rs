// =============================================================================
// RATE HARVEST ENGINE
// =============================================================================
//
// Walks every bank in the source registry, pulls deposit tables over plain
// HTTP and loan quotes through a headless browser, turns Turkish-formatted
// numbers into real ones and hands one timestamped snapshot to a sink.
//
//   registry -> extract::{deposit, loan} -> pipeline -> storage
//
// The binary in main.rs runs exactly one sweep. Scheduling is someone
// else's job (cron, a systemd timer, whatever is on hand).
// =============================================================================

pub mod config;
pub mod error;
pub mod extract;
pub mod locale;
pub mod metrics;
pub mod models;
pub mod pipeline;
pub mod registry;
pub mod render;
pub mod retry;
pub mod storage;

pub use config::Config;
pub use error::{RateError, RateResult};
pub use models::{DepositRateRow, LoanRateRow, RateSnapshot};
pub use pipeline::RatePipeline;
pub use registry::SourceRegistry;
