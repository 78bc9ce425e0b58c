//! Disclosed fund holdings and the source abstraction that provides them.

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// One disclosed position within a fund's top-N portfolio.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Holding {
    pub code: String,
    pub name: String,
    /// Percentage of the fund's net assets, 0-100.
    pub weight: f64,
    /// Market-qualified identifier used to query a price source.
    pub fetch_code: Option<String>,
}

impl Holding {
    /// Builds a holding and derives its fetch identifier from the instrument code.
    pub fn new(code: &str, name: &str, weight: f64) -> Self {
        Self {
            code: code.to_string(),
            name: name.to_string(),
            weight,
            fetch_code: fetch_code_for(code),
        }
    }

    /// Key used to look this holding up in a quote mapping.
    pub fn quote_key(&self) -> &str {
        self.fetch_code.as_deref().unwrap_or(&self.code)
    }
}

/// Everything a holdings source knows about a fund at its last report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FundHoldings {
    pub fund_name: String,
    pub holdings: Vec<Holding>,
    pub report_date: String,
}

#[async_trait]
pub trait HoldingsSource: Send + Sync {
    async fn fetch_holdings(&self, fund_code: &str) -> Result<FundHoldings>;
}

/// Routes an instrument code to its quoting market.
///
/// Six digit mainland codes are routed by their leading digit, five digit
/// codes are Hong Kong listings. Anything else has no qualified form.
pub fn fetch_code_for(code: &str) -> Option<String> {
    let code = code.trim();
    if !code.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }

    let market = match code.len() {
        6 => match code.as_bytes()[0] {
            b'5' | b'6' | b'9' => "sh",
            b'4' | b'8' => "bj",
            _ => "sz",
        },
        5 => "hk",
        _ => return None,
    };
    Some(format!("{market}{code}"))
}
