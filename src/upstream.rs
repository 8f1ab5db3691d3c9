use crate::api::{NewPredictionRequest, VerificationRequest};
use anyhow::{bail, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Source of mortality predictions for a subject.
#[async_trait]
pub trait PredictionProducer {
    async fn fetch_prediction(&self, subject: &str) -> Result<NewPredictionRequest>;
}
/// Source of verified outcomes. `None` while the outcome is still unknown.
#[async_trait]
pub trait VerificationOracle {
    async fn fetch_outcome(&self, prediction: &str) -> Result<Option<VerificationRequest>>;
}

/// Upstream that answers from seeded records, used when no upstream url is
/// configured and in tests.
#[derive(Debug, Default, Clone)]
pub struct InMemoryUpstream {
    predictions: Arc<Mutex<HashMap<String, NewPredictionRequest>>>,
    outcomes: Arc<Mutex<HashMap<String, VerificationRequest>>>,
    delay: Option<Duration>,
}
impl InMemoryUpstream {
    /// Every answer is held back by `delay`, to simulate a slow collaborator.
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Default::default()
        }
    }
    pub fn add_prediction(&self, subject: impl Into<String>, prediction: NewPredictionRequest) {
        self.predictions
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(subject.into(), prediction);
    }
    pub fn add_outcome(&self, outcome: VerificationRequest) {
        self.outcomes
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(outcome.prediction.clone(), outcome);
    }
    async fn wait(&self) {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
    }
}
#[async_trait]
impl PredictionProducer for InMemoryUpstream {
    async fn fetch_prediction(&self, subject: &str) -> Result<NewPredictionRequest> {
        self.wait().await;
        let predictions = self.predictions.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(prediction) = predictions.get(subject.trim()) {
            Ok(prediction.clone())
        } else {
            bail!("No prediction available for subject {}", subject)
        }
    }
}
#[async_trait]
impl VerificationOracle for InMemoryUpstream {
    async fn fetch_outcome(&self, prediction: &str) -> Result<Option<VerificationRequest>> {
        self.wait().await;
        let outcomes = self.outcomes.lock().unwrap_or_else(|e| e.into_inner());
        Ok(outcomes.get(prediction.trim()).cloned())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use chrono::NaiveDate;

    #[tokio::test]
    async fn answers_from_seeded_records() {
        let upstream = InMemoryUpstream::default();
        upstream.add_prediction(
            "demo-user-1",
            NewPredictionRequest {
                prediction: None,
                subject: "demo-user-1".into(),
                target_date: NaiveDate::from_ymd_opt(2061, 3, 14).unwrap(),
                cause: "Heart disease".into(),
                confidence: "87.35".into(),
            },
        );
        let prediction = upstream.fetch_prediction("demo-user-1").await.unwrap();
        assert_eq!(prediction.cause, "Heart disease");
        upstream.fetch_prediction("demo-user-2").await.unwrap_err();

        assert_eq!(upstream.fetch_outcome("p-1").await.unwrap(), None);
        upstream.add_outcome(VerificationRequest {
            prediction: "p-1".into(),
            actual_date: NaiveDate::from_ymd_opt(2061, 3, 14).unwrap(),
            cause: "Heart disease".into(),
            source: "registry".into(),
            confidence: "0.99".into(),
        });
        assert!(upstream.fetch_outcome("p-1").await.unwrap().is_some());
    }
}
