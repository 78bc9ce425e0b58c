pub mod cli;
pub mod core;
pub mod providers;
pub mod store;

use crate::cli::estimate::EstimateOptions;
use crate::core::cache::Store;
use crate::core::config::AppConfig;
use crate::core::positions::{POSITIONS_COLLECTION, PositionStore};
use crate::core::{
    BatchOrchestrator, FundProcessor, HistoryRange, IntradaySeries, ValuationEstimator,
};
use crate::providers::{EastmoneyHistoryProvider, EastmoneyHoldingsProvider, SinaQuoteProvider};
use crate::store::KeyValueStore;
use anyhow::{Context, Result};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

const HISTORY_COLLECTION: &str = "nav_history";

#[derive(Debug, Clone, PartialEq)]
pub enum AppCommand {
    Estimate {
        details: bool,
        json: bool,
        watch: Option<u64>,
    },
    Add {
        code: String,
        amount: f64,
        name: Option<String>,
        profit: Option<f64>,
    },
    Remove {
        code: String,
    },
    List,
    History {
        code: String,
        range: HistoryRange,
    },
}

pub async fn run_command(command: AppCommand, config_path: Option<&str>) -> Result<()> {
    info!("navcast starting...");

    let config = match config_path {
        Some(path) => AppConfig::load_from_path(path)?,
        None => AppConfig::load()?,
    };
    debug!("Loaded config: {config:#?}");

    let store = KeyValueStore::open(&config.data_path()?)?;
    execute(command, &config, &store).await
}

/// Runs `command` against an already opened store.
pub async fn execute(command: AppCommand, config: &AppConfig, store: &KeyValueStore) -> Result<()> {
    let positions = PositionStore::new(
        store
            .get_collection(POSITIONS_COLLECTION, true, true)
            .context("Failed to open positions collection")?,
    );
    let holdings = Arc::new(EastmoneyHoldingsProvider::new(
        config.providers.eastmoney_url(),
    )?);

    match command {
        AppCommand::Estimate {
            details,
            json,
            watch,
        } => {
            let prices = Arc::new(SinaQuoteProvider::new(config.providers.sina_url())?);
            let processor = FundProcessor::new(holdings, prices)
                .with_estimator(ValuationEstimator::new(
                    config.estimator.missing_quote_policy,
                ))
                .with_fetch_timeout(config.estimator.fetch_timeout());
            let batch = BatchOrchestrator::new(Arc::new(processor))
                .with_max_concurrency(config.estimator.max_concurrency);
            let options = EstimateOptions { details, json };

            match watch {
                Some(secs) => {
                    watch_estimates(&batch, &positions, options, secs, interrupted()).await?;
                    Ok(())
                }
                None => {
                    let requests = positions.requests().await?;
                    cli::estimate::run(&batch, &requests, options).await?;
                    Ok(())
                }
            }
        }
        AppCommand::Add {
            code,
            amount,
            name,
            profit,
        } => {
            cli::positions::add(
                &positions,
                holdings.as_ref(),
                &code,
                amount,
                name.as_deref(),
                profit,
            )
            .await?;
            Ok(())
        }
        AppCommand::Remove { code } => {
            cli::positions::remove(&positions, &code).await?;
            Ok(())
        }
        AppCommand::List => cli::positions::list(&positions).await,
        AppCommand::History { code, range } => {
            let cache = store
                .get_collection(HISTORY_COLLECTION, true, true)
                .context("Failed to open history cache")?;
            let history =
                EastmoneyHistoryProvider::new(config.providers.eastmoney_history_url(), cache)?;
            cli::history::run(&history, &code, range).await
        }
    }
}

/// Resolves on Ctrl+C. Never resolves if the handler cannot be installed.
async fn interrupted() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Could not listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
}

/// Re-runs the estimate every `secs` seconds until `shutdown` resolves,
/// including while a round is in flight. Returns the intraday series
/// collected over the session.
pub(crate) async fn watch_estimates(
    batch: &BatchOrchestrator,
    positions: &PositionStore,
    options: EstimateOptions,
    secs: u64,
    shutdown: impl Future<Output = ()>,
) -> Result<IntradaySeries> {
    tokio::pin!(shutdown);
    let mut interval = tokio::time::interval(Duration::from_secs(secs.max(1)));
    let mut series = IntradaySeries::new();

    loop {
        tokio::select! {
            biased;
            _ = &mut shutdown => break,
            _ = interval.tick() => {}
        }

        // Positions may change between rounds
        let round = async {
            let requests = positions.requests().await?;
            cli::estimate::run(batch, &requests, options).await
        };
        let outcomes = tokio::select! {
            biased;
            _ = &mut shutdown => break,
            outcomes = round => outcomes?,
        };

        let added = series.record(&outcomes);
        debug!(added, "Intraday points recorded");
        if !options.json {
            if let Some(table) = cli::estimate::render_intraday(&series, &outcomes) {
                println!(
                    "\n{}\n{table}",
                    cli::ui::style_text("Intraday estimates", cli::ui::StyleType::Title)
                );
            }
            println!(
                "{}",
                cli::ui::style_text(
                    &format!("Refreshing every {secs}s, press Ctrl+C to stop"),
                    cli::ui::StyleType::Subtle,
                )
            );
        }
    }

    info!("Watch stopped");
    Ok(series)
}
