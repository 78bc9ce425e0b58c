use super::util::{get_with_retry, http_client};
use crate::core::cache::KeyValueCollection;
use crate::core::history::{HistorySource, NavPoint};
use crate::core::holdings::{FundHoldings, Holding, HoldingsSource};
use crate::core::outcome::PLACEHOLDER;
use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use chrono::NaiveDate;
use scraper::{ElementRef, Html, Selector};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Only the top ten holdings are disclosed quarterly.
const MAX_HOLDINGS: usize = 10;
const HISTORY_TTL: Duration = Duration::from_secs(60 * 60);

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| anyhow!("Invalid selector '{css}': {e:?}"))
}

fn element_text(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

/// Disclosed holdings scraped from the fund archive pages.
pub struct EastmoneyHoldingsProvider {
    base_url: String,
    client: reqwest::Client,
}

impl EastmoneyHoldingsProvider {
    pub fn new(base_url: &str) -> Result<Self> {
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: http_client()?,
        })
    }
}

#[async_trait]
impl HoldingsSource for EastmoneyHoldingsProvider {
    #[instrument(name = "EastmoneyHoldingsFetch", skip(self), fields(fund = %fund_code))]
    async fn fetch_holdings(&self, fund_code: &str) -> Result<FundHoldings> {
        let url = format!("{}/ccmx_{}.html", self.base_url, fund_code);
        debug!("Requesting holdings from {}", url);

        let page = get_with_retry(&self.client, &url, None)
            .await?
            .text()
            .await
            .with_context(|| format!("Failed to read holdings page for fund {fund_code}"))?;

        let fund = parse_holdings_page(fund_code, &page)?;
        debug!(
            holdings = fund.holdings.len(),
            report_date = %fund.report_date,
            "Parsed holdings"
        );
        Ok(fund)
    }
}

pub(crate) fn parse_holdings_page(fund_code: &str, page: &str) -> Result<FundHoldings> {
    let document = Html::parse_document(page);

    let fund_name = document
        .select(&selector(".fundDetail-tit .funCurFundName")?)
        .next()
        .map(element_text)
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| format!("Fund {fund_code}"));

    let table = document
        .select(&selector("#cctable tbody")?)
        .next()
        .ok_or_else(|| anyhow!("No holdings table for fund {fund_code}"))?;

    let row_selector = selector("tr")?;
    let cell_selector = selector("td")?;
    let mut holdings = Vec::new();
    for row in table.select(&row_selector).take(MAX_HOLDINGS) {
        let cells: Vec<String> = row.select(&cell_selector).map(element_text).collect();
        if cells.len() < 4 {
            continue;
        }
        let weight: f64 = cells[3]
            .trim_end_matches('%')
            .trim()
            .parse()
            .with_context(|| {
                format!(
                    "Invalid weight '{}' for holding {} of fund {fund_code}",
                    cells[3], cells[1]
                )
            })?;
        holdings.push(Holding::new(&cells[1], &cells[2], weight));
    }

    let report_date = document
        .select(&selector(".subtitle .time")?)
        .next()
        .map(element_text)
        .filter(|date| !date.is_empty())
        .unwrap_or_else(|| PLACEHOLDER.to_string());

    Ok(FundHoldings {
        fund_name,
        holdings,
        report_date,
    })
}

/// Daily NAV history, cached for an hour per fund and window.
pub struct EastmoneyHistoryProvider {
    base_url: String,
    client: reqwest::Client,
    cache: Arc<dyn KeyValueCollection>,
}

impl EastmoneyHistoryProvider {
    pub fn new(base_url: &str, cache: Arc<dyn KeyValueCollection>) -> Result<Self> {
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: http_client()?,
            cache,
        })
    }
}

#[async_trait]
impl HistorySource for EastmoneyHistoryProvider {
    #[instrument(name = "EastmoneyHistoryFetch", skip(self), fields(fund = %fund_code))]
    async fn fetch_history(&self, fund_code: &str, days: u32) -> Result<Vec<NavPoint>> {
        let cache_key = format!("{fund_code}:{days}");
        if let Some(cached) = self.cache.get(cache_key.as_bytes()).await {
            match serde_json::from_slice(&cached) {
                Ok(points) => return Ok(points),
                Err(e) => warn!(error = %e, "Discarding unreadable cached history"),
            }
        }

        let url = format!(
            "{}/f10/F10DataApi.aspx?type=lsjz&code={}&page=1&per={}&sdate=&edate=",
            self.base_url, fund_code, days
        );
        debug!("Requesting NAV history from {}", url);

        let body = get_with_retry(&self.client, &url, None)
            .await?
            .text()
            .await
            .with_context(|| format!("Failed to read NAV history for fund {fund_code}"))?;

        let points = parse_history(&body)
            .with_context(|| format!("Failed to parse NAV history for fund {fund_code}"))?;

        if let Err(e) = self
            .cache
            .put(
                cache_key.as_bytes(),
                &serde_json::to_vec(&points)?,
                Some(HISTORY_TTL),
            )
            .await
        {
            warn!(error = %e, "Failed to cache NAV history");
        }
        Ok(points)
    }
}

/// Extracts the `<table>` embedded in the `apidata` script and reads
/// `(date, unit NAV)` from each row, oldest first.
pub(crate) fn parse_history(body: &str) -> Result<Vec<NavPoint>> {
    let start = body
        .find("<table")
        .ok_or_else(|| anyhow!("No history table in response"))?;
    let end = body[start..]
        .find("</table>")
        .map(|i| start + i + "</table>".len())
        .ok_or_else(|| anyhow!("Unterminated history table in response"))?;

    let fragment = Html::parse_fragment(&body[start..end]);
    let row_selector = selector("tbody tr")?;
    let cell_selector = selector("td")?;

    let mut points: Vec<NavPoint> = fragment
        .select(&row_selector)
        .filter_map(|row| {
            let cells: Vec<String> = row.select(&cell_selector).map(element_text).collect();
            let date = NaiveDate::parse_from_str(cells.first()?, "%Y-%m-%d").ok()?;
            let nav: f64 = cells.get(1)?.parse().ok()?;
            Some(NavPoint { date, nav })
        })
        .collect();

    points.sort_by_key(|p| p.date);
    points.dedup_by_key(|p| p.date);
    Ok(points)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryCollection;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const FUND: &str = "002611";

    const HOLDINGS_PAGE: &str = r#"
<html><body>
  <div class="fundDetail-tit"><div class="funCurFundName">博时黄金ETF联接C</div></div>
  <div class="subtitle"><label class="time">2026-06-30</label></div>
  <table id="cctable">
    <thead><tr><th>序号</th><th>股票代码</th><th>股票名称</th><th>占净值比例</th></tr></thead>
    <tbody>
      <tr><td>1</td><td>600519</td><td>贵州茅台</td><td>9.85%</td></tr>
      <tr><td>2</td><td>000858</td><td>五粮液</td><td>7.10%</td></tr>
      <tr><td>3</td><td>00700</td><td>腾讯控股</td><td>5.05%</td></tr>
      <tr><td colspan="4">--</td></tr>
    </tbody>
  </table>
</body></html>"#;

    const HISTORY_BODY: &str = concat!(
        "var apidata={ content:\"<table class='w782 comm lsjz'><thead><tr><th class='first'>净值日期</th>",
        "<th>单位净值</th><th>累计净值</th><th>日增长率</th></tr></thead><tbody>",
        "<tr><td>2026-10-16</td><td class='tor bold'>1.2500</td><td>2.1000</td><td class='tor bold red'>0.81%</td></tr>",
        "<tr><td>2026-10-15</td><td class='tor bold'>1.2400</td><td>2.0900</td><td class='tor bold grn'>-0.40%</td></tr>",
        "<tr><td>2026-10-14</td><td class='tor bold'>1.2450</td><td>2.0950</td><td class='tor bold'>0.00%</td></tr>",
        "</tbody></table>\",records:3,pages:1,curpage:1};"
    );

    #[test]
    fn test_parse_holdings_page() {
        let fund = parse_holdings_page(FUND, HOLDINGS_PAGE).unwrap();

        assert_eq!(fund.fund_name, "博时黄金ETF联接C");
        assert_eq!(fund.report_date, "2026-06-30");
        assert_eq!(fund.holdings.len(), 3);
        assert_eq!(fund.holdings[0].code, "600519");
        assert_eq!(fund.holdings[0].name, "贵州茅台");
        assert_eq!(fund.holdings[0].weight, 9.85);
        assert_eq!(fund.holdings[0].fetch_code.as_deref(), Some("sh600519"));
        assert_eq!(fund.holdings[1].fetch_code.as_deref(), Some("sz000858"));
        assert_eq!(fund.holdings[2].fetch_code.as_deref(), Some("hk00700"));
    }

    #[test]
    fn test_parse_holdings_page_fallbacks() {
        let page = r#"<table id="cctable"><tbody>
            <tr><td>1</td><td>600036</td><td>招商银行</td><td>3.5%</td></tr>
        </tbody></table>"#;
        let fund = parse_holdings_page(FUND, page).unwrap();

        assert_eq!(fund.fund_name, "Fund 002611");
        assert_eq!(fund.report_date, PLACEHOLDER);
        assert_eq!(fund.holdings.len(), 1);
    }

    #[test]
    fn test_parse_holdings_page_takes_top_ten() {
        let rows: String = (0..15)
            .map(|i| format!("<tr><td>{i}</td><td>6000{i:02}</td><td>S{i}</td><td>1.0%</td></tr>"))
            .collect();
        let page = format!(r#"<table id="cctable"><tbody>{rows}</tbody></table>"#);

        let fund = parse_holdings_page(FUND, &page).unwrap();
        assert_eq!(fund.holdings.len(), 10);
        assert_eq!(fund.holdings[9].code, "600009");
    }

    #[test]
    fn test_parse_holdings_page_errors() {
        assert!(parse_holdings_page(FUND, "<html><body>not found</body></html>").is_err());

        let bad_weight = r#"<table id="cctable"><tbody>
            <tr><td>1</td><td>600036</td><td>招商银行</td><td>n/a</td></tr>
        </tbody></table>"#;
        let err = parse_holdings_page(FUND, bad_weight).unwrap_err();
        assert!(err.to_string().contains("Invalid weight"));
    }

    #[test]
    fn test_parse_history() {
        let points = parse_history(HISTORY_BODY).unwrap();

        assert_eq!(points.len(), 3);
        assert_eq!(points[0].date, NaiveDate::from_ymd_opt(2026, 10, 14).unwrap());
        assert_eq!(points[0].nav, 1.245);
        assert_eq!(points[2].nav, 1.25);
    }

    #[test]
    fn test_parse_history_skips_placeholder_rows() {
        let body = "var apidata={ content:\"<table><tbody><tr><td colspan='7'>暂无数据!</td></tr></tbody></table>\",records:0};";
        assert!(parse_history(body).unwrap().is_empty());
        assert!(parse_history("var apidata={};").is_err());
    }

    #[tokio::test]
    async fn test_fetch_holdings() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("/ccmx_{FUND}.html")))
            .respond_with(ResponseTemplate::new(200).set_body_string(HOLDINGS_PAGE))
            .mount(&mock_server)
            .await;

        let provider = EastmoneyHoldingsProvider::new(&mock_server.uri()).unwrap();
        let fund = provider.fetch_holdings(FUND).await.unwrap();

        assert_eq!(fund.holdings.len(), 3);
        assert_eq!(fund.report_date, "2026-06-30");
    }

    #[tokio::test]
    async fn test_fetch_holdings_not_found() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&mock_server)
            .await;

        let provider = EastmoneyHoldingsProvider::new(&mock_server.uri()).unwrap();
        assert!(provider.fetch_holdings(FUND).await.is_err());
    }

    #[tokio::test]
    async fn test_fetch_history_uses_cache() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/f10/F10DataApi.aspx"))
            .and(query_param("code", FUND))
            .and(query_param("per", "365"))
            .respond_with(ResponseTemplate::new(200).set_body_string(HISTORY_BODY))
            .expect(1)
            .mount(&mock_server)
            .await;

        let cache = Arc::new(MemoryCollection::new());
        let provider = EastmoneyHistoryProvider::new(&mock_server.uri(), cache).unwrap();

        let first = provider.fetch_history(FUND, 365).await.unwrap();
        let second = provider.fetch_history(FUND, 365).await.unwrap();
        assert_eq!(first.len(), 3);
        assert_eq!(first, second);
    }
}
