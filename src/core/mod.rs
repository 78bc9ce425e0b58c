//! Core estimation pipeline and the abstractions around it

pub mod batch;
pub mod cache;
pub mod config;
pub mod history;
pub mod holdings;
pub mod intraday;
pub mod log;
pub mod outcome;
pub mod positions;
pub mod processor;
pub mod quote;
pub mod valuation;

// Re-export main types for cleaner imports
pub use batch::BatchOrchestrator;
pub use history::{HistoryRange, HistorySource, NavPoint};
pub use holdings::{FundHoldings, Holding, HoldingsSource};
pub use intraday::{IntradayPoint, IntradaySeries};
pub use outcome::{FundOutcome, FundRequest, FundStatus};
pub use processor::FundProcessor;
pub use quote::{PriceQuote, PriceSource, QuoteMap};
pub use valuation::{MissingQuotePolicy, ValuationEstimator, ValuationResult};
