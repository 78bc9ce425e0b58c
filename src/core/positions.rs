//! User positions, one record per fund code.
use crate::core::cache::KeyValueCollection;
use crate::core::holdings::HoldingsSource;
use crate::core::outcome::FundRequest;
use anyhow::{Context, Result, ensure};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

pub const POSITIONS_COLLECTION: &str = "positions";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionRecord {
    pub code: String,
    pub name: String,
    pub amount: f64,
    #[serde(default)]
    pub holding_profit: f64,
    pub updated_at: DateTime<Local>,
}

pub struct PositionStore {
    collection: Arc<dyn KeyValueCollection>,
}

impl PositionStore {
    pub fn new(collection: Arc<dyn KeyValueCollection>) -> Self {
        Self { collection }
    }

    /// Inserts or replaces the position for `code`.
    ///
    /// Without a name the holdings source is asked for the fund name; a
    /// lookup failure leaves the name empty. Without a holding profit the
    /// stored one is kept.
    pub async fn upsert(
        &self,
        code: &str,
        amount: f64,
        name: Option<&str>,
        holding_profit: Option<f64>,
        names: Option<&dyn HoldingsSource>,
    ) -> Result<PositionRecord> {
        let code = code.trim();
        ensure!(!code.is_empty(), "Fund code must not be empty");
        ensure!(
            amount.is_finite() && amount >= 0.0,
            "Position amount must be a non-negative number, got {amount}"
        );
        if let Some(profit) = holding_profit {
            ensure!(profit.is_finite(), "Holding profit must be a number, got {profit}");
        }

        let name = match (name, names) {
            (Some(name), _) => name.to_string(),
            (None, Some(source)) => match source.fetch_holdings(code).await {
                Ok(fund) => fund.fund_name,
                Err(e) => {
                    warn!(fund = %code, error = %e, "Could not look up fund name");
                    String::new()
                }
            },
            (None, None) => String::new(),
        };

        let holding_profit = match holding_profit {
            Some(profit) => profit,
            None => self.get(code).await?.map_or(0.0, |r| r.holding_profit),
        };
        let record = PositionRecord {
            code: code.to_string(),
            name,
            amount,
            holding_profit,
            updated_at: Local::now(),
        };
        self.collection
            .put(code.as_bytes(), &serde_json::to_vec(&record)?, None)
            .await
            .with_context(|| format!("Failed to save position {code}"))?;
        debug!(fund = %code, amount, "Position saved");
        Ok(record)
    }

    pub async fn get(&self, code: &str) -> Result<Option<PositionRecord>> {
        self.collection
            .get(code.as_bytes())
            .await
            .map(|raw| serde_json::from_slice(&raw))
            .transpose()
            .with_context(|| format!("Corrupt position record for {code}"))
    }

    pub async fn remove(&self, code: &str) -> Result<bool> {
        self.collection
            .remove(code.trim().as_bytes())
            .await
            .with_context(|| format!("Failed to remove position {code}"))
    }

    /// All positions ordered by fund code.
    pub async fn list(&self) -> Result<Vec<PositionRecord>> {
        let mut records = Vec::new();
        for (key, raw) in self.collection.entries().await? {
            match serde_json::from_slice::<PositionRecord>(&raw) {
                Ok(record) => records.push(record),
                Err(e) => warn!(
                    key = %String::from_utf8_lossy(&key),
                    error = %e,
                    "Skipping unreadable position record"
                ),
            }
        }
        records.sort_by(|a, b| a.code.cmp(&b.code));
        Ok(records)
    }

    /// Estimation requests for every stored position, in list order.
    pub async fn requests(&self) -> Result<Vec<FundRequest>> {
        Ok(self
            .list()
            .await?
            .into_iter()
            .map(|r| FundRequest::new(&r.code, r.amount))
            .collect())
    }
}
