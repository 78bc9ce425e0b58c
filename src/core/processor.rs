//! Single-fund pipeline: holdings, then quotes, then the weighted estimate.
use crate::core::holdings::{FundHoldings, HoldingsSource};
use crate::core::outcome::{FundOutcome, FundRequest, FundStatus, estimated_profit};
use crate::core::quote::{PriceSource, QuoteMap};
use crate::core::valuation::ValuationEstimator;
use anyhow::{Result, ensure};
use chrono::Local;
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, instrument, warn};

pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Runs the estimate for one fund and always produces a [`FundOutcome`].
///
/// Only a holdings failure stops the pipeline early. A failed or timed out
/// quote fetch degrades to an empty quote map, and any fault raised while
/// quoting or estimating becomes [`FundStatus::ProcessingError`].
pub struct FundProcessor {
    holdings_source: Arc<dyn HoldingsSource>,
    price_source: Arc<dyn PriceSource>,
    estimator: ValuationEstimator,
    fetch_timeout: Duration,
}

impl FundProcessor {
    pub fn new(holdings_source: Arc<dyn HoldingsSource>, price_source: Arc<dyn PriceSource>) -> Self {
        Self {
            holdings_source,
            price_source,
            estimator: ValuationEstimator::default(),
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
        }
    }

    pub fn with_estimator(mut self, estimator: ValuationEstimator) -> Self {
        self.estimator = estimator;
        self
    }

    pub fn with_fetch_timeout(mut self, fetch_timeout: Duration) -> Self {
        self.fetch_timeout = fetch_timeout;
        self
    }

    #[instrument(name = "FundProcess", skip(self, request), fields(fund = %request.fund_code))]
    pub async fn process(&self, request: &FundRequest) -> FundOutcome {
        let fund = match timeout(
            self.fetch_timeout,
            self.holdings_source.fetch_holdings(&request.fund_code),
        )
        .await
        {
            Ok(Ok(fund)) => fund,
            Ok(Err(e)) => {
                warn!(error = %e, "Holdings fetch failed");
                return FundOutcome::failed(request, FundStatus::HoldingsFetchFailed);
            }
            Err(_) => {
                warn!(timeout = ?self.fetch_timeout, "Holdings fetch timed out");
                return FundOutcome::failed(request, FundStatus::HoldingsFetchFailed);
            }
        };

        match AssertUnwindSafe(self.evaluate(request, fund))
            .catch_unwind()
            .await
        {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(e)) => {
                warn!(error = %e, "Fund processing failed");
                FundOutcome::failed(request, FundStatus::ProcessingError(format!("{e:#}")))
            }
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                warn!(%message, "Fund processing panicked");
                FundOutcome::failed(request, FundStatus::ProcessingError(message))
            }
        }
    }

    async fn evaluate(&self, request: &FundRequest, fund: FundHoldings) -> Result<FundOutcome> {
        let codes: Vec<String> = fund
            .holdings
            .iter()
            .map(|h| h.quote_key().to_string())
            .collect();
        let quotes = self.fetch_quotes(&codes).await;
        debug!(
            holdings = codes.len(),
            quoted = quotes.len(),
            "Quotes collected"
        );

        let valuation = self.estimator.estimate(&fund.holdings, &quotes);
        if let Some(change) = valuation.estimated_change {
            ensure!(
                change.is_finite(),
                "Estimate for fund {} is not a finite number",
                request.fund_code
            );
        }

        Ok(FundOutcome {
            fund_code: request.fund_code.clone(),
            fund_name: fund.fund_name,
            report_date: fund.report_date,
            status: FundStatus::Success,
            estimated_change: valuation.estimated_change,
            total_weight_used: valuation.total_weight_used,
            position_amount: request.position_amount,
            estimated_profit: estimated_profit(request.position_amount, valuation.estimated_change),
            details: valuation.details,
            computed_at: Local::now(),
        })
    }

    async fn fetch_quotes(&self, codes: &[String]) -> QuoteMap {
        if codes.is_empty() {
            return QuoteMap::new();
        }

        match timeout(self.fetch_timeout, self.price_source.fetch_quotes(codes)).await {
            Ok(Ok(quotes)) => quotes,
            Ok(Err(e)) => {
                warn!(error = %e, "Quote fetch failed, estimating without quotes");
                QuoteMap::new()
            }
            Err(_) => {
                warn!(timeout = ?self.fetch_timeout, "Quote fetch timed out, estimating without quotes");
                QuoteMap::new()
            }
        }
    }
}

pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unexpected panic".to_string()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::core::holdings::Holding;
    use crate::core::quote::PriceQuote;
    use anyhow::anyhow;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Holdings keyed by fund code; unknown funds fail.
    pub(crate) struct MockHoldingsSource {
        pub funds: HashMap<String, FundHoldings>,
        pub delays: HashMap<String, Duration>,
        pub panic_on: Option<String>,
    }

    impl MockHoldingsSource {
        pub fn new(funds: Vec<(&str, FundHoldings)>) -> Self {
            Self {
                funds: funds
                    .into_iter()
                    .map(|(code, fund)| (code.to_string(), fund))
                    .collect(),
                delays: HashMap::new(),
                panic_on: None,
            }
        }
    }

    #[async_trait]
    impl HoldingsSource for MockHoldingsSource {
        async fn fetch_holdings(&self, fund_code: &str) -> Result<FundHoldings> {
            if let Some(delay) = self.delays.get(fund_code) {
                tokio::time::sleep(*delay).await;
            }
            if self.panic_on.as_deref() == Some(fund_code) {
                panic!("holdings source blew up for {fund_code}");
            }
            self.funds
                .get(fund_code)
                .cloned()
                .ok_or_else(|| anyhow!("No holdings for {fund_code}"))
        }
    }

    pub(crate) struct MockPriceSource {
        pub quotes: QuoteMap,
        pub fail: bool,
        pub delay: Option<Duration>,
        pub calls: AtomicUsize,
    }

    impl MockPriceSource {
        pub fn new(quotes: Vec<(&str, f64, f64)>) -> Self {
            Self {
                quotes: quotes
                    .into_iter()
                    .map(|(code, price, change)| {
                        (
                            code.to_string(),
                            PriceQuote {
                                code: code.to_string(),
                                price: Some(price),
                                change,
                            },
                        )
                    })
                    .collect(),
                fail: false,
                delay: None,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl PriceSource for MockPriceSource {
        async fn fetch_quotes(&self, codes: &[String]) -> Result<QuoteMap> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if self.fail {
                return Err(anyhow!("quote service unreachable"));
            }
            Ok(codes
                .iter()
                .filter_map(|c| self.quotes.get(c).map(|q| (c.clone(), q.clone())))
                .collect())
        }
    }

    pub(crate) fn fund(name: &str, holdings: Vec<Holding>) -> FundHoldings {
        FundHoldings {
            fund_name: name.to_string(),
            holdings,
            report_date: "2026-06-30".to_string(),
        }
    }

    pub(crate) fn f1() -> FundHoldings {
        fund(
            "Fund One",
            vec![
                Holding::new("600519", "A", 60.0),
                Holding::new("000858", "B", 40.0),
            ],
        )
    }

    pub(crate) fn f1_quotes() -> MockPriceSource {
        MockPriceSource::new(vec![("sh600519", 10.0, 2.0), ("sz000858", 20.0, -1.0)])
    }

    #[tokio::test]
    async fn test_process_success() {
        let processor = FundProcessor::new(
            Arc::new(MockHoldingsSource::new(vec![("F1", f1())])),
            Arc::new(f1_quotes()),
        );

        let outcome = processor.process(&FundRequest::new("F1", 10000.0)).await;

        assert_eq!(outcome.status, FundStatus::Success);
        assert_eq!(outcome.fund_name, "Fund One");
        assert_eq!(outcome.report_date, "2026-06-30");
        assert!((outcome.estimated_change.unwrap() - 0.8).abs() < 1e-9);
        assert!((outcome.estimated_profit.unwrap() - 80.0).abs() < 1e-9);
        assert_eq!(outcome.total_weight_used, Some(100.0));
        assert_eq!(outcome.details.len(), 2);
    }

    #[tokio::test]
    async fn test_holdings_failure_skips_quote_fetch() {
        let prices = Arc::new(f1_quotes());
        let processor = FundProcessor::new(
            Arc::new(MockHoldingsSource::new(vec![])),
            prices.clone(),
        );

        let outcome = processor.process(&FundRequest::new("F2", 5000.0)).await;

        assert_eq!(outcome.status, FundStatus::HoldingsFetchFailed);
        assert!(outcome.estimated_change.is_none());
        assert!(outcome.estimated_profit.is_none());
        assert_eq!(outcome.position_amount, 5000.0);
        assert!(outcome.details.is_empty());
        assert_eq!(prices.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_quote_failure_degrades_to_zero_estimate() {
        let mut prices = f1_quotes();
        prices.fail = true;
        let processor = FundProcessor::new(
            Arc::new(MockHoldingsSource::new(vec![("F1", f1())])),
            Arc::new(prices),
        );

        let outcome = processor.process(&FundRequest::new("F1", 10000.0)).await;

        assert_eq!(outcome.status, FundStatus::Success);
        assert_eq!(outcome.estimated_change, Some(0.0));
        assert_eq!(outcome.estimated_profit, Some(0.0));
        assert!(outcome.details.iter().all(|d| d.price.is_none()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_holdings_timeout_is_a_fetch_failure() {
        let mut holdings = MockHoldingsSource::new(vec![("F1", f1())]);
        holdings
            .delays
            .insert("F1".to_string(), Duration::from_secs(30));
        let processor = FundProcessor::new(Arc::new(holdings), Arc::new(f1_quotes()))
            .with_fetch_timeout(Duration::from_secs(1));

        let outcome = processor.process(&FundRequest::new("F1", 10000.0)).await;

        assert_eq!(outcome.status, FundStatus::HoldingsFetchFailed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_quote_timeout_degrades() {
        let mut prices = f1_quotes();
        prices.delay = Some(Duration::from_secs(30));
        let processor = FundProcessor::new(
            Arc::new(MockHoldingsSource::new(vec![("F1", f1())])),
            Arc::new(prices),
        )
        .with_fetch_timeout(Duration::from_secs(1));

        let outcome = processor.process(&FundRequest::new("F1", 10000.0)).await;

        assert_eq!(outcome.status, FundStatus::Success);
        assert_eq!(outcome.estimated_change, Some(0.0));
    }

    #[tokio::test]
    async fn test_empty_holdings_succeed_without_estimate() {
        let prices = Arc::new(f1_quotes());
        let processor = FundProcessor::new(
            Arc::new(MockHoldingsSource::new(vec![("F3", fund("Empty", vec![]))])),
            prices.clone(),
        );

        let outcome = processor.process(&FundRequest::new("F3", 100.0)).await;

        assert_eq!(outcome.status, FundStatus::Success);
        assert!(outcome.estimated_change.is_none());
        assert!(outcome.estimated_profit.is_none());
        assert_eq!(prices.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_non_finite_estimate_is_processing_error() {
        let processor = FundProcessor::new(
            Arc::new(MockHoldingsSource::new(vec![(
                "F4",
                fund("Broken", vec![Holding::new("600519", "A", f64::NAN)]),
            )])),
            Arc::new(f1_quotes()),
        );

        let outcome = processor.process(&FundRequest::new("F4", 100.0)).await;

        assert!(matches!(outcome.status, FundStatus::ProcessingError(_)));
        assert!(outcome.estimated_change.is_none());
        assert!(outcome.estimated_profit.is_none());
        assert!(outcome.total_weight_used.is_none());
    }

    struct PanickingPriceSource;

    #[async_trait]
    impl PriceSource for PanickingPriceSource {
        async fn fetch_quotes(&self, _codes: &[String]) -> Result<QuoteMap> {
            panic!("quote parser invariant broken");
        }
    }

    #[tokio::test]
    async fn test_panic_while_quoting_is_processing_error() {
        let processor = FundProcessor::new(
            Arc::new(MockHoldingsSource::new(vec![("F1", f1())])),
            Arc::new(PanickingPriceSource),
        );

        let outcome = processor.process(&FundRequest::new("F1", 100.0)).await;

        assert_eq!(
            outcome.status,
            FundStatus::ProcessingError("quote parser invariant broken".to_string())
        );
        assert_eq!(outcome.position_amount, 100.0);
    }
}
