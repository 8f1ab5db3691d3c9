use super::client::UpstreamClient;
use crate::api::{NewPredictionRequest, VerificationRequest};
use crate::upstream::{PredictionProducer, VerificationOracle};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::time::Duration;

/// Producer and oracle reached over HTTP.
///
/// `GET {url}/predictions/{subject}` returns a [`NewPredictionRequest`],
/// `GET {url}/verifications/{prediction}` a [`VerificationRequest`] or 404
/// while the outcome is unknown.
#[derive(Debug, Clone)]
pub struct RemoteUpstream {
    client: UpstreamClient,
}
impl RemoteUpstream {
    pub fn new(url: String, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: UpstreamClient::new(url, timeout)?,
        })
    }
}
#[async_trait]
impl PredictionProducer for RemoteUpstream {
    async fn fetch_prediction(&self, subject: &str) -> Result<NewPredictionRequest> {
        self.client
            .get_json(format!("/predictions/{}", subject.trim()))
            .await?
            .ok_or_else(|| anyhow!("No prediction available for subject {}", subject))
    }
}
#[async_trait]
impl VerificationOracle for RemoteUpstream {
    async fn fetch_outcome(&self, prediction: &str) -> Result<Option<VerificationRequest>> {
        self.client
            .get_json(format!("/verifications/{}", prediction.trim()))
            .await
    }
}
