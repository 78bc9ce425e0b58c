//! Weighted intraday change estimation from disclosed holdings.
use crate::core::holdings::Holding;
use crate::core::quote::QuoteMap;
use serde::{Deserialize, Serialize};

/// How holdings without a quote affect the weighted estimate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingQuotePolicy {
    /// Unquoted holdings contribute a zero change but keep their weight in
    /// the denominator, pulling the estimate toward zero.
    #[default]
    ZeroFill,
    /// Unquoted holdings are dropped from the denominator and the estimate
    /// is normalized over the quoted weight only.
    Renormalize,
}

/// Per-holding row of a valuation, in the order holdings were disclosed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HoldingDetail {
    pub code: String,
    pub name: String,
    pub weight: f64,
    pub price: Option<f64>,
    pub change: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValuationResult {
    pub total_weight_used: Option<f64>,
    pub estimated_change: Option<f64>,
    pub details: Vec<HoldingDetail>,
}

/// Combines holdings with quotes into a weighted change estimate.
#[derive(Debug, Clone, Copy, Default)]
pub struct ValuationEstimator {
    policy: MissingQuotePolicy,
}

impl ValuationEstimator {
    pub fn new(policy: MissingQuotePolicy) -> Self {
        Self { policy }
    }

    pub fn estimate(&self, holdings: &[Holding], quotes: &QuoteMap) -> ValuationResult {
        if holdings.is_empty() {
            return ValuationResult::default();
        }

        let total_weight: f64 = holdings.iter().map(|h| h.weight).sum();
        if total_weight == 0.0 {
            return ValuationResult {
                total_weight_used: Some(0.0),
                estimated_change: None,
                details: Vec::new(),
            };
        }

        let details: Vec<HoldingDetail> = holdings
            .iter()
            .map(|h| {
                let quote = quotes.get(h.quote_key());
                HoldingDetail {
                    code: h.code.clone(),
                    name: h.name.clone(),
                    weight: h.weight,
                    price: quote.and_then(|q| q.price),
                    change: quote.map_or(0.0, |q| q.change),
                }
            })
            .collect();

        let denominator = match self.policy {
            MissingQuotePolicy::ZeroFill => total_weight,
            MissingQuotePolicy::Renormalize => holdings
                .iter()
                .filter(|h| quotes.contains_key(h.quote_key()))
                .map(|h| h.weight)
                .sum(),
        };

        if denominator == 0.0 {
            return ValuationResult {
                total_weight_used: Some(0.0),
                estimated_change: None,
                details,
            };
        }

        let weighted_change = details
            .iter()
            .map(|d| d.change * d.weight / denominator)
            .sum();

        ValuationResult {
            total_weight_used: Some(denominator),
            estimated_change: Some(weighted_change),
            details,
        }
    }
}
