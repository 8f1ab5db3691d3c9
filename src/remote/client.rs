use anyhow::{bail, Context, Result};
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct UpstreamClient {
    client: Client,
    pub url: String,
}

impl UpstreamClient {
    pub fn new(url: String, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("couldn't build upstream http client")?;
        Ok(Self {
            client,
            url: url.trim_end_matches('/').to_string(),
        })
    }
    async fn get(&self, path: String) -> Result<Response> {
        let response = self
            .client
            .get(self.url.clone() + path.as_str())
            .send()
            .await
            .with_context(|| format!("couldn't reach {}{}", self.url, path))?;
        Ok(response)
    }
    /// `None` when the upstream answers 404.
    pub async fn get_json<T: DeserializeOwned>(&self, path: String) -> Result<Option<T>> {
        let response = self.get(path).await?;
        match response.status() {
            StatusCode::OK => Ok(Some(response.json::<T>().await?)),
            StatusCode::NOT_FOUND => Ok(None),
            status => bail!("{}: {}", status, response.text().await?),
        }
    }
}
