// ██████╗  █████╗ ████████╗███████╗
// ██╔══██╗██╔══██╗╚══██╔══╝██╔════╝
// ██████╔╝███████║   ██║   █████╗
// ██╔══██╗██╔══██║   ██║   ██╔══╝
// ██║  ██║██║  ██║   ██║   ███████╗
// ╚═╝  ╚═╝╚═╝  ╚═╝   ╚═╝   ╚══════╝
//
// H A R V E S T   E N G I N E
//
// One sweep over every configured bank: deposits, loans, one snapshot.
// Run it from cron as often as the rates change.

use anyhow::{Context, Result};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use rate_harvest_engine::render::{ChromiumRenderer, HttpFetcher};
use rate_harvest_engine::storage::open_sink;
use rate_harvest_engine::{Config, RatePipeline, SourceRegistry};

fn print_banner(config: &Config) {
    let banner = format!(
        r#"
    ╔══════════════════════════════════════════════════════════════╗
    ║                                                              ║
    ║        🏦  RATE HARVEST ENGINE                               ║
    ║                                                              ║
    ║   Deposits:  HTTP + HTML tables                              ║
    ║   Loans:     headless Chromium, one tab, strictly in order   ║
    ║   Storage:   {:<48}║
    ║                                                              ║
    ╚══════════════════════════════════════════════════════════════╝
"#,
        format!("{} ({})", config.storage_backend, config.storage_mode)
    );
    println!("{}", banner);
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env().context("invalid configuration")?;

    let subscriber = fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .with_file(true)
        .with_line_number(true);
    if config.log_json {
        subscriber.json().init();
    } else {
        subscriber.with_ansi(true).init();
    }

    print_banner(&config);
    info!(
        sources = %config.sources_path.display(),
        attempts = config.retry_attempts,
        render_timeout_secs = config.render_timeout.as_secs(),
        "✅ Configuration loaded"
    );

    let registry = SourceRegistry::load(&config.sources_path)
        .with_context(|| format!("cannot load {}", config.sources_path.display()))?;
    let fetcher = HttpFetcher::new(&config)?;
    let sink = open_sink(&config).await.context("cannot open snapshot sink")?;
    let renderer = ChromiumRenderer::launch(&config)
        .await
        .context("cannot start the browser")?;
    info!("✅ Browser session ready");

    let mut pipeline = RatePipeline::new(
        config,
        registry,
        Box::new(fetcher),
        Box::new(renderer),
        sink,
    );

    let outcome = tokio::select! {
        result = pipeline.update_rates() => result.map(Some),
        _ = signal::ctrl_c() => {
            warn!("🛑 Interrupted, nothing was stored");
            Ok(None)
        }
    };

    if let Err(e) = pipeline.shutdown().await {
        error!(error = %e, "Browser shutdown failed");
    }

    if let Some(snapshot) = outcome.context("rate sweep failed")? {
        info!(
            snapshot_id = %snapshot.id,
            deposits = snapshot.deposits.len(),
            loans = snapshot.loans.len(),
            failures = snapshot.failures.len(),
            "🏁 RATE HARVEST ENGINE: done"
        );
    }
    Ok(())
}
