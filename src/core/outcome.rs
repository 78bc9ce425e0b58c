//! Per-fund request and result records.

use crate::core::valuation::HoldingDetail;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// Placeholder shown when the fund name or report date is unknown.
pub const PLACEHOLDER: &str = "--";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FundRequest {
    pub fund_code: String,
    pub position_amount: f64,
}

impl FundRequest {
    pub fn new(fund_code: &str, position_amount: f64) -> Self {
        Self {
            fund_code: fund_code.to_string(),
            position_amount,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "message")]
pub enum FundStatus {
    Success,
    HoldingsFetchFailed,
    ProcessingError(String),
}

impl Display for FundStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FundStatus::Success => write!(f, "OK"),
            FundStatus::HoldingsFetchFailed => write!(f, "Holdings unavailable"),
            FundStatus::ProcessingError(msg) => write!(f, "Error: {msg}"),
        }
    }
}

/// Terminal result for one fund request, produced whether or not the
/// pipeline succeeded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FundOutcome {
    pub fund_code: String,
    pub fund_name: String,
    pub report_date: String,
    pub status: FundStatus,
    pub estimated_change: Option<f64>,
    pub total_weight_used: Option<f64>,
    pub position_amount: f64,
    pub estimated_profit: Option<f64>,
    pub details: Vec<HoldingDetail>,
    pub computed_at: DateTime<Local>,
}

impl FundOutcome {
    /// An outcome carrying only the request echo and a failure status.
    pub fn failed(request: &FundRequest, status: FundStatus) -> Self {
        Self {
            fund_code: request.fund_code.clone(),
            fund_name: PLACEHOLDER.to_string(),
            report_date: PLACEHOLDER.to_string(),
            status,
            estimated_change: None,
            total_weight_used: None,
            position_amount: request.position_amount,
            estimated_profit: None,
            details: Vec::new(),
            computed_at: Local::now(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == FundStatus::Success
    }
}

/// Profit implied by a percentage change on a position.
pub fn estimated_profit(position_amount: f64, estimated_change: Option<f64>) -> Option<f64> {
    estimated_change.map(|change| position_amount * change / 100.0)
}
