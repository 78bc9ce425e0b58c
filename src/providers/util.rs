use anyhow::{Context, Error, Result};
use reqwest::header::REFERER;
use std::future::Future;
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_RETRIES: usize = 2;
pub const DEFAULT_RETRY_DELAY_MS: u64 = 300;

const USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko)";

/// Retries an async operation with configurable attempts and delays
///
/// # Parameters
/// - `operation`: Closure returning a future
/// - `retries`: Number of retry attempts (total runs = 1 initial + retries)
/// - `delay_ms`: Milliseconds between retry attempts
///
/// # Returns
/// Either the successful result or the error after all attempts
pub async fn with_retry<F, Fut, T>(
    mut operation: F,
    retries: usize,
    delay_ms: u64,
) -> Result<T, Error>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, reqwest::Error>>,
{
    let mut attempt = 1;
    loop {
        match operation().await.map_err(anyhow::Error::from) {
            Ok(val) => return Ok(val),
            Err(err) => {
                if attempt > retries {
                    return Err(err);
                }
                debug!(
                    "Attempt {}/{} failed: {}. Retrying...",
                    attempt, retries, err
                );
                attempt += 1;
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            }
        }
    }
}

pub fn http_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .build()
        .context("Failed to build HTTP client")
}

/// GETs `url`, retrying transport errors and non-success statuses.
pub async fn get_with_retry(
    client: &reqwest::Client,
    url: &str,
    referer: Option<&str>,
) -> Result<reqwest::Response> {
    with_retry(
        || async {
            let mut request = client.get(url);
            if let Some(referer) = referer {
                request = request.header(REFERER, referer);
            }
            request
                .send()
                .await
                .and_then(reqwest::Response::error_for_status)
        },
        DEFAULT_RETRIES,
        DEFAULT_RETRY_DELAY_MS,
    )
    .await
    .with_context(|| format!("Request failed: {url}"))
}
