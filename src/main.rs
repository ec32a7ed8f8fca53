//! SWAPDESK: custodial cross-venue token swap service.
//!
//! Entry point. Loads configuration, initialises structured logging, wires
//! the venue and settlement collaborators into the settlement coordinator
//! and serves the HTTP API until Ctrl+C.

use anyhow::{bail, Result};
use std::sync::Arc;
use tracing::{info, warn};

use swapdesk::api::{self, ApiState};
use swapdesk::config;
use swapdesk::engine::events::TracingObserver;
use swapdesk::engine::orchestrator::SwapOrchestrator;
use swapdesk::engine::settlement::SettlementCoordinator;
use swapdesk::storage::SettlementJournal;
use swapdesk::venue::hyperliquid::HyperliquidInfoClient;
use swapdesk::venue::paper::{DryRunRail, PaperGateway};
use swapdesk::venue::MarketDataSource;

const BANNER: &str = r#"
 ___ _    _  _   ___ ___  ___ ___ _  __
/ __| |  | |/_\ | _ \   \| __/ __| |/ /
\__ \ |/\| / _ \|  _/ |) | _|\__ \ ' <
|___/__/\__/_/ \_\_| |___/|___|___/_|\_\

  Cross-venue swap and settlement service
  v0.1.0
"#;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    let cfg = config::AppConfig::load("config.toml")?;

    init_logging();

    println!("{BANNER}");
    info!(
        service = %cfg.service.name,
        paper_trading = cfg.venue.paper_trading,
        source = %cfg.settlement.source_asset,
        destination = %cfg.settlement.destination_asset,
        "SWAPDESK starting up"
    );

    if !cfg.venue.paper_trading {
        bail!("Live order routing needs an external signing gateway; set venue.paper_trading = true");
    }

    // -- Initialise components -------------------------------------------

    let market_data: Arc<dyn MarketDataSource> = Arc::new(HyperliquidInfoClient::new(
        cfg.venue.info_url.as_deref(),
        Some(cfg.request_timeout()),
    )?);

    warn!("[PAPER] Orders fill at live mids and transfers are not broadcast");
    let gateway = Arc::new(PaperGateway::new(market_data.clone()));
    let rail = Arc::new(DryRunRail::new(cfg.settlement.system_address.clone()));

    let orchestrator = Arc::new(SwapOrchestrator::new(
        market_data,
        gateway,
        Arc::new(TracingObserver),
        cfg.orchestrator_settings(),
    ));

    let journal = Arc::new(SettlementJournal::new(&cfg.storage.journal_path));
    match journal.pending() {
        Ok(pending) if !pending.is_empty() => warn!(
            count = pending.len(),
            path = %cfg.storage.journal_path,
            "Settlements awaiting reconciliation"
        ),
        Ok(_) => {}
        Err(e) => warn!(error = %e, "Could not read settlement journal"),
    }

    let coordinator = Arc::new(
        SettlementCoordinator::new(rail, orchestrator, cfg.settlement_plan()?)
            .with_journal(journal.clone()),
    );

    let signer = match cfg.signer_key() {
        Ok(key) => key,
        Err(e) => {
            warn!(error = %e, "No signer key configured; using an empty key for dry-run transfers");
            secrecy::SecretString::new(String::new())
        }
    };

    // -- Serve -----------------------------------------------------------

    if !cfg.api.enabled {
        info!("API disabled. Nothing to serve; exiting.");
        return Ok(());
    }

    let state = Arc::new(ApiState {
        service_name: cfg.service.name.clone(),
        coordinator,
        signer,
        journal: Some(journal),
    });

    info!(port = cfg.api.port, "Press Ctrl+C to stop.");
    api::serve(state, cfg.api.port, async {
        let _ = tokio::signal::ctrl_c().await;
        info!("Shutdown signal received.");
    })
    .await?;

    info!("SWAPDESK shut down cleanly.");
    Ok(())
}

/// Initialise the `tracing` subscriber.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("swapdesk=info"));

    let json_logging = std::env::var("SWAPDESK_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    }
}
