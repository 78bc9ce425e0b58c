use super::util::{get_with_retry, http_client};
use crate::core::quote::{PriceQuote, PriceSource, QuoteMap};
use anyhow::{Context, Result};
use async_trait::async_trait;
use encoding_rs::GBK;
use tracing::{debug, instrument};

const SINA_REFERER: &str = "https://finance.sina.com.cn";

/// Real-time quotes from the Sina `hq` endpoint.
pub struct SinaQuoteProvider {
    base_url: String,
    client: reqwest::Client,
}

impl SinaQuoteProvider {
    pub fn new(base_url: &str) -> Result<Self> {
        Ok(SinaQuoteProvider {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: http_client()?,
        })
    }
}

#[async_trait]
impl PriceSource for SinaQuoteProvider {
    #[instrument(name = "SinaQuoteFetch", skip(self, codes), fields(count = codes.len()))]
    async fn fetch_quotes(&self, codes: &[String]) -> Result<QuoteMap> {
        if codes.is_empty() {
            return Ok(QuoteMap::new());
        }

        let url = format!("{}/list={}", self.base_url, codes.join(","));
        debug!("Requesting quotes from {}", url);

        let response = get_with_retry(&self.client, &url, Some(SINA_REFERER)).await?;
        let bytes = response
            .bytes()
            .await
            .context("Failed to read quote response")?;

        let (body, _, had_errors) = GBK.decode(&bytes);
        if had_errors {
            debug!("Quote response contained invalid GBK sequences");
        }

        let quotes = parse_quotes(&body);
        debug!(requested = codes.len(), received = quotes.len(), "Parsed quotes");
        Ok(quotes)
    }
}

/// Parses a `var hq_str_<code>="f0,f1,...";` response body.
pub(crate) fn parse_quotes(body: &str) -> QuoteMap {
    body.lines()
        .filter_map(parse_quote_line)
        .map(|quote| (quote.code.clone(), quote))
        .collect()
}

fn parse_quote_line(line: &str) -> Option<PriceQuote> {
    let (lhs, rhs) = line.split_once('=')?;
    let code = lhs.trim().strip_prefix("var hq_str_")?;
    let payload = rhs.trim().trim_end_matches(';').trim_matches('"');
    if payload.is_empty() {
        return None;
    }

    let fields: Vec<&str> = payload.split(',').collect();
    // Hong Kong rows lead with the English and Chinese names
    let (prev_close_idx, price_idx) = if code.starts_with("hk") { (3, 6) } else { (2, 3) };
    let prev_close: f64 = fields.get(prev_close_idx)?.trim().parse().ok()?;
    let price: f64 = fields.get(price_idx)?.trim().parse().ok()?;

    if !prev_close.is_finite() || !price.is_finite() || prev_close <= 0.0 {
        return None;
    }

    // Suspended instruments report a zero price
    if price <= 0.0 {
        return Some(PriceQuote {
            code: code.to_string(),
            price: None,
            change: 0.0,
        });
    }

    Some(PriceQuote {
        code: code.to_string(),
        price: Some(price),
        change: (price - prev_close) / prev_close * 100.0,
    })
}
