//! Concurrent fan-out of [`FundProcessor`] over a batch of requests.
use crate::core::outcome::{FundOutcome, FundRequest, FundStatus};
use crate::core::processor::{FundProcessor, panic_message};
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use tracing::{error, info};

pub const DEFAULT_MAX_CONCURRENCY: usize = 5;

/// Runs every request through a shared [`FundProcessor`] with a bounded
/// number of funds in flight.
pub struct BatchOrchestrator {
    processor: Arc<FundProcessor>,
    max_concurrency: usize,
}

impl BatchOrchestrator {
    pub fn new(processor: Arc<FundProcessor>) -> Self {
        Self {
            processor,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
        }
    }

    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency.max(1);
        self
    }

    /// Returns one outcome per request, in request order.
    ///
    /// `on_progress` is called with `(completed, total)` after each fund
    /// finishes, in completion order.
    pub async fn run(
        &self,
        requests: &[FundRequest],
        on_progress: &(dyn Fn(usize, usize) + Sync),
    ) -> Vec<FundOutcome> {
        let total = requests.len();
        info!(total, max_concurrency = self.max_concurrency, "Starting batch");

        let mut slots: Vec<Option<FundOutcome>> = vec![None; total];

        let tasks = requests.iter().cloned().enumerate().map(|(index, request)| {
            let processor = Arc::clone(&self.processor);
            async move {
                let handle = tokio::spawn({
                    let request = request.clone();
                    async move { processor.process(&request).await }
                });
                let outcome = match handle.await {
                    Ok(outcome) => outcome,
                    Err(e) => {
                        let message = if e.is_panic() {
                            panic_message(e.into_panic().as_ref())
                        } else {
                            e.to_string()
                        };
                        error!(fund = %request.fund_code, %message, "Fund task aborted");
                        FundOutcome::failed(&request, FundStatus::ProcessingError(message))
                    }
                };
                (index, outcome)
            }
        });

        let mut completed = 0;
        let mut results = stream::iter(tasks).buffer_unordered(self.max_concurrency);
        while let Some((index, outcome)) = results.next().await {
            slots[index] = Some(outcome);
            completed += 1;
            on_progress(completed, total);
        }

        let outcomes: Vec<FundOutcome> = slots
            .into_iter()
            .zip(requests)
            .map(|(slot, request)| {
                slot.unwrap_or_else(|| {
                    FundOutcome::failed(
                        request,
                        FundStatus::ProcessingError("Fund task produced no outcome".to_string()),
                    )
                })
            })
            .collect();

        let succeeded = outcomes.iter().filter(|o| o.is_success()).count();
        info!(total, succeeded, failed = total - succeeded, "Batch finished");
        outcomes
    }
}
