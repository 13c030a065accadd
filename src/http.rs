use std::future::Future;
use std::time::Duration;

use crate::error::{Result, ScrapeError};

const TIMEOUT_SECS: u64 = 30;

pub struct Response {
    pub status: u16,
    pub body: Vec<u8>,
}

/// The HTTP side of the scraper: one GET, status plus body.
pub trait Fetch: Send + Sync {
    fn get(&self, url: &str) -> impl Future<Output = Result<Response>> + Send;
}

pub struct HttpClient {
    client: reqwest::Client,
}

impl HttpClient {
    pub fn new(user_agent: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(Duration::from_secs(TIMEOUT_SECS))
            .build()
            .map_err(|e| ScrapeError::fetch("<client>", e.to_string()))?;
        Ok(HttpClient { client })
    }
}

impl Fetch for HttpClient {
    async fn get(&self, url: &str) -> Result<Response> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| ScrapeError::fetch(url, e.to_string()))?;
        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|e| ScrapeError::fetch(url, e.to_string()))?;
        Ok(Response {
            status,
            body: body.to_vec(),
        })
    }
}

/// GET that only accepts a 200 with a non-empty body.
pub async fn get_ok<F: Fetch>(fetcher: &F, url: &str) -> Result<Vec<u8>> {
    let response = fetcher.get(url).await?;
    if response.status != 200 {
        return Err(ScrapeError::fetch(url, format!("HTTP {}", response.status)));
    }
    if response.body.is_empty() {
        return Err(ScrapeError::fetch(url, "empty body"));
    }
    Ok(response.body)
}

pub async fn get_text<F: Fetch>(fetcher: &F, url: &str) -> Result<String> {
    let body = get_ok(fetcher, url).await?;
    Ok(String::from_utf8_lossy(&body).into_owned())
}


#[cfg(test)]
mod tests {
    use super::fake::FakeFetch;
    use super::*;

    #[tokio::test]
    async fn non_200_is_a_fetch_error() {
        let fetch = FakeFetch::default().with("http://x/a", 500, "oops");
        let err = get_ok(&fetch, "http://x/a").await.unwrap_err();
        assert!(matches!(err, ScrapeError::Fetch { .. }));
    }

    #[tokio::test]
    async fn empty_body_is_a_fetch_error() {
        let fetch = FakeFetch::default().with("http://x/a", 200, "");
        assert!(get_ok(&fetch, "http://x/a").await.is_err());
    }

    #[tokio::test]
    async fn ok_body_is_returned() {
        let fetch = FakeFetch::default().with("http://x/a", 200, "hello");
        assert_eq!(get_text(&fetch, "http://x/a").await.unwrap(), "hello");
        assert_eq!(fetch.calls(), 1);
    }
}
