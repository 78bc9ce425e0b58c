//! Historical NAV abstractions

use anyhow::Result;
use async_trait::async_trait;
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub enum HistoryRange {
    OneWeek,
    OneMonth,
    ThreeMonths,
    SixMonths,
    OneYear,
}

impl Display for HistoryRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                HistoryRange::OneWeek => "1W",
                HistoryRange::OneMonth => "1M",
                HistoryRange::ThreeMonths => "3M",
                HistoryRange::SixMonths => "6M",
                HistoryRange::OneYear => "1Y",
            }
        )
    }
}

impl HistoryRange {
    pub fn to_duration(&self) -> Duration {
        match self {
            HistoryRange::OneWeek => Duration::days(7),
            HistoryRange::OneMonth => Duration::days(30),
            HistoryRange::ThreeMonths => Duration::days(90),
            HistoryRange::SixMonths => Duration::days(180),
            HistoryRange::OneYear => Duration::days(365),
        }
    }

    /// Keeps the points dated on or after `today - range`.
    pub fn filter<'a>(&self, points: &'a [NavPoint], today: NaiveDate) -> &'a [NavPoint] {
        let start = today - self.to_duration();
        let first = points.partition_point(|p| p.date < start);
        &points[first..]
    }
}

impl FromStr for HistoryRange {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "1W" => Ok(HistoryRange::OneWeek),
            "1M" => Ok(HistoryRange::OneMonth),
            "3M" => Ok(HistoryRange::ThreeMonths),
            "6M" => Ok(HistoryRange::SixMonths),
            "1Y" => Ok(HistoryRange::OneYear),
            _ => Err(anyhow::anyhow!("Invalid history range: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NavPoint {
    pub date: NaiveDate,
    pub nav: f64,
}

#[async_trait]
pub trait HistorySource: Send + Sync {
    /// Returns up to `days` most recent points, oldest first.
    async fn fetch_history(&self, fund_code: &str, days: u32) -> Result<Vec<NavPoint>>;
}
