//! Client for the external summarization service.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::{Client, Url};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::time::Duration;

/// One synchronous call: merged plaintext per owner in, summary text per
/// owner out. Any non-success status or malformed body is an error; the
/// worker treats every error here as a dispatch failure and requeues.
#[async_trait]
pub trait SummarizerService: Send + Sync {
    async fn summarize(&self, entries: &BTreeMap<i64, String>) -> Result<HashMap<i64, String>>;
}

pub struct HttpSummarizer {
    http: Client,
    endpoint: Url,
    api_key: String,
}

impl fmt::Debug for HttpSummarizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpSummarizer")
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

impl HttpSummarizer {
    /// `timeout` bounds the whole request; a summarizer that stalls past it
    /// turns into a dispatch failure.
    pub fn new(endpoint: &str, api_key: String, timeout: Duration) -> Result<Self> {
        let endpoint = Url::parse(endpoint).context("invalid summarizer endpoint")?;
        let http = Client::builder()
            .user_agent("daybook/0.1")
            .timeout(timeout)
            .build()
            .context("failed to build summarizer HTTP client")?;
        Ok(Self {
            http,
            endpoint,
            api_key,
        })
    }
}

#[async_trait]
impl SummarizerService for HttpSummarizer {
    async fn summarize(&self, entries: &BTreeMap<i64, String>) -> Result<HashMap<i64, String>> {
        let res = self
            .http
            .post(self.endpoint.clone())
            .header("x-api-key", &self.api_key)
            .json(entries)
            .send()
            .await
            .context("failed to reach summarizer")?;

        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(anyhow!("summarizer error {}: {}", status, body));
        }

        res.json::<HashMap<i64, String>>()
            .await
            .context("invalid summarizer response JSON")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_invalid_endpoint() {
        let err = HttpSummarizer::new("not a url", "key".into(), Duration::from_secs(5));
        assert!(err.is_err());
    }

    #[test]
    fn debug_hides_api_key() {
        let client = HttpSummarizer::new(
            "http://localhost:3001/summaries",
            "super-secret".into(),
            Duration::from_secs(5),
        )
        .unwrap();
        let rendered = format!("{client:?}");
        assert!(!rendered.contains("super-secret"));
    }
}
