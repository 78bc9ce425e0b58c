//! Estimates collected across refreshes of one watch session.
use crate::core::outcome::FundOutcome;
use chrono::{DateTime, Local};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IntradayPoint {
    pub at: DateTime<Local>,
    pub change: f64,
}

/// Per-fund `(time, estimated change)` series for the current trading day.
#[derive(Debug, Default)]
pub struct IntradaySeries {
    series: HashMap<String, Vec<IntradayPoint>>,
}

impl IntradaySeries {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends one point per successful estimate and returns how many were
    /// added. A point from a new day starts that fund's series over.
    pub fn record(&mut self, outcomes: &[FundOutcome]) -> usize {
        let mut added = 0;
        for outcome in outcomes.iter().filter(|o| o.is_success()) {
            let Some(change) = outcome.estimated_change else {
                continue;
            };
            let points = self.series.entry(outcome.fund_code.clone()).or_default();
            if points
                .last()
                .is_some_and(|last| last.at.date_naive() != outcome.computed_at.date_naive())
            {
                points.clear();
            }
            points.push(IntradayPoint {
                at: outcome.computed_at,
                change,
            });
            added += 1;
        }
        added
    }

    pub fn points(&self, fund_code: &str) -> &[IntradayPoint] {
        self.series
            .get(fund_code)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Movement of the estimate since the first point of the day.
    pub fn trend(&self, fund_code: &str) -> Option<f64> {
        match self.points(fund_code) {
            [first, .., last] => Some(last.change - first.change),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }
}
