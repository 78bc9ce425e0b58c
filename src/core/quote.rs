//! Real-time quote types

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceQuote {
    pub code: String,
    /// `None` when the instrument has no usable current price (e.g. suspended).
    pub price: Option<f64>,
    /// Percentage change since the prior close.
    pub change: f64,
}

/// Quote lookup keyed by fetch identifier.
pub type QuoteMap = HashMap<String, PriceQuote>;

#[async_trait]
pub trait PriceSource: Send + Sync {
    /// Identifiers without data are absent from the returned map.
    async fn fetch_quotes(&self, codes: &[String]) -> Result<QuoteMap>;
}
