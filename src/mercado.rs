use crate::api::*;
use crate::db::DB;
use crate::error::{MarketError, Result};
use crate::upstream::{PredictionProducer, VerificationOracle};
use crate::validation::{normalize_identifier, require_text, validate_confidence, IdKind};
use chrono::{DateTime, SubsecRound, Utc};
use log::{debug, error, warn};
use std::collections::HashMap;
use std::future::Future;
use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

pub const DEFAULT_LEADERBOARD_SIZE: u32 = 50;
pub const MAX_LEADERBOARD_SIZE: u32 = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum LockKey {
    Market(MarketId),
    /// Serializes market creation per prediction.
    Prediction(PredictionId),
}
/// Held while a market's aggregates are read and written.
#[derive(Debug, Default)]
pub(crate) struct MarketGuard {
    halted: Option<String>,
}
impl MarketGuard {
    pub(crate) fn ensure_running(&self, market: &MarketId) -> Result<()> {
        match &self.halted {
            Some(detail) => Err(MarketError::InvariantViolation {
                market: *market,
                detail: format!("market is halted: {}", detail),
            }),
            None => Ok(()),
        }
    }
    pub(crate) fn halt(&mut self, market: &MarketId, detail: String) {
        error!("Halting market {}: {}", market, detail);
        self.halted = Some(detail);
    }
    /// Freezes the market if `result` is an invariant violation.
    pub(crate) fn halt_on<T>(&mut self, result: Result<T>) -> Result<T> {
        if let Err(MarketError::InvariantViolation { market, detail }) = &result {
            self.halt(market, detail.clone());
        }
        result
    }
}

type LockRegistry = Mutex<HashMap<LockKey, Arc<AsyncMutex<MarketGuard>>>>;

/// An acquired [`MarketGuard`]. On release the registry entry is dropped
/// unless someone else is waiting for it or the market is halted.
pub(crate) struct MarketLock<'a> {
    key: LockKey,
    guard: OwnedMutexGuard<MarketGuard>,
    registry: &'a LockRegistry,
}
impl Deref for MarketLock<'_> {
    type Target = MarketGuard;

    fn deref(&self) -> &MarketGuard {
        &self.guard
    }
}
impl DerefMut for MarketLock<'_> {
    fn deref_mut(&mut self) -> &mut MarketGuard {
        &mut self.guard
    }
}
impl Drop for MarketLock<'_> {
    fn drop(&mut self) {
        if self.guard.halted.is_some() {
            return;
        }
        let mut locks = self.registry.lock().unwrap_or_else(PoisonError::into_inner);
        // One reference in the registry, one in our guard. Waiters clone
        // under the registry lock, so nobody can pick it up after this.
        if locks
            .get(&self.key)
            .map_or(false, |lock| Arc::strong_count(lock) == 2)
        {
            locks.remove(&self.key);
        }
    }
}

pub struct Mercado {
    pub(crate) db: Arc<Box<dyn DB + Send + Sync>>,
    pub(crate) producer: Arc<Box<dyn PredictionProducer + Send + Sync>>,
    pub(crate) oracle: Arc<Box<dyn VerificationOracle + Send + Sync>>,
    upstream_timeout: Duration,
    locks: LockRegistry,
}

impl Mercado {
    /// Audits every active market before accepting work; inconsistent ones
    /// start out halted.
    pub async fn new(
        db: Box<dyn DB + Send + Sync>,
        producer: Box<dyn PredictionProducer + Send + Sync>,
        oracle: Box<dyn VerificationOracle + Send + Sync>,
        upstream_timeout: Duration,
    ) -> Result<Self> {
        let me = Self {
            db: Arc::new(db),
            producer: Arc::new(producer),
            oracle: Arc::new(oracle),
            upstream_timeout,
            locks: Mutex::new(HashMap::new()),
        };
        let markets = me.db.get_active_markets().await?;
        let mut halted = 0;
        for market in &markets {
            if !me.audit_market(*market).await?.consistent {
                halted += 1;
            }
        }
        debug!(
            "Audited {} active markets, {} halted",
            markets.len(),
            halted
        );
        Ok(me)
    }
    pub async fn shutdown(&self) {
        self.db.close().await;
        debug!("Mercado shut down");
    }
    pub(crate) async fn lock(&self, key: LockKey) -> MarketLock<'_> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            locks.entry(key).or_default().clone()
        };
        MarketLock {
            key,
            guard: lock.lock_owned().await,
            registry: &self.locks,
        }
    }
    pub(crate) async fn call_upstream<T, F>(&self, collaborator: &'static str, call: F) -> Result<T>
    where
        F: Future<Output = anyhow::Result<T>>,
    {
        match tokio::time::timeout(self.upstream_timeout, call).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(source)) => Err(MarketError::Upstream {
                collaborator,
                source,
            }),
            Err(_) => {
                warn!(
                    "{} did not answer within {:?}",
                    collaborator, self.upstream_timeout
                );
                Err(MarketError::UpstreamTimeout {
                    collaborator,
                    timeout: self.upstream_timeout,
                })
            }
        }
    }

    /// Stores a producer record. Without an explicit id, the prediction id is
    /// derived from subject and target date, so replays collide.
    pub async fn record_prediction(&self, request: NewPredictionRequest) -> Result<Prediction> {
        let subject = normalize_identifier(&request.subject, IdKind::Subject)?;
        let id = match &request.prediction {
            Some(raw) => normalize_identifier(raw, IdKind::Prediction)?,
            None => normalize_identifier(
                &format!("{}:{}", subject, request.target_date),
                IdKind::Prediction,
            )?,
        };
        let prediction = Prediction {
            id,
            subject,
            target_date: request.target_date,
            cause: require_text("cause", &request.cause)?,
            confidence: validate_confidence(&request.confidence)?,
            created_at: now(),
        };
        if !self.db.add_prediction(&prediction).await? {
            return Err(MarketError::DuplicatePrediction(id));
        }
        debug!(
            "Recorded prediction {} for subject {}: {} on {}",
            id, subject, prediction.cause, prediction.target_date
        );
        Ok(prediction)
    }
    pub async fn get_prediction(&self, prediction: &str) -> Result<Prediction> {
        let prediction = normalize_identifier(prediction, IdKind::Prediction)?;
        self.db
            .get_prediction(&prediction)
            .await?
            .ok_or_else(|| MarketError::not_found("prediction", prediction))
    }
    /// Asks the producer for the subject's prediction and opens its market.
    /// A prediction that was recorded before is reused.
    pub async fn open_market_for_subject(&self, subject: &str) -> Result<Market> {
        normalize_identifier(subject, IdKind::Subject)?;
        let request = self
            .call_upstream(
                "prediction producer",
                self.producer.fetch_prediction(subject.trim()),
            )
            .await?;
        let prediction = match self.record_prediction(request).await {
            Ok(prediction) => prediction.id,
            Err(MarketError::DuplicatePrediction(id)) => id,
            Err(e) => return Err(e),
        };
        self.create_market(&prediction.to_string()).await
    }
    pub async fn leaderboard(&self, limit: Option<u32>) -> Result<Vec<LeaderboardEntry>> {
        let limit = limit
            .unwrap_or(DEFAULT_LEADERBOARD_SIZE)
            .clamp(1, MAX_LEADERBOARD_SIZE);
        Ok(self.db.get_leaderboard(limit).await?)
    }
}

/// Current time at storage precision.
pub(crate) fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

#[cfg(test)]
pub(crate) mod test {
    use super::*;
    use crate::db::SQLite;
    use crate::upstream::InMemoryUpstream;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    pub(crate) async fn mercado_with(upstream: InMemoryUpstream, timeout: Duration) -> Mercado {
        Mercado::new(
            Box::new(SQLite::new("sqlite::memory:", 1).await.unwrap()),
            Box::new(upstream.clone()),
            Box::new(upstream),
            timeout,
        )
        .await
        .unwrap()
    }
    pub(crate) async fn mercado() -> Mercado {
        mercado_with(InMemoryUpstream::default(), Duration::from_secs(5)).await
    }
    pub(crate) fn prediction_request(subject: &str, target_date: NaiveDate) -> NewPredictionRequest {
        NewPredictionRequest {
            prediction: None,
            subject: subject.into(),
            target_date,
            cause: "Cardiovascular disease".into(),
            confidence: "87.35".into(),
        }
    }
    pub(crate) fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }
    fn registered_locks(mercado: &Mercado) -> usize {
        mercado.locks.lock().unwrap().len()
    }

    #[tokio::test]
    async fn predictions_are_recorded_once() {
        let mercado = mercado().await;
        let request = prediction_request("demo-user-1750144109460", date(2061, 3, 14));
        let prediction = mercado.record_prediction(request.clone()).await.unwrap();
        assert_eq!(prediction.confidence, dec!(87.35));
        assert_eq!(
            mercado
                .get_prediction(&prediction.id.to_string())
                .await
                .unwrap(),
            prediction
        );
        let e = mercado.record_prediction(request).await.unwrap_err();
        assert_eq!(e.kind(), "DuplicatePrediction");

        let mut bad = prediction_request("someone", date(2061, 3, 14));
        bad.confidence = "101".into();
        assert_eq!(
            mercado.record_prediction(bad).await.unwrap_err().kind(),
            "AboveMaximum"
        );
        let mut bad = prediction_request("someone", date(2061, 3, 14));
        bad.cause = "  ".into();
        assert_eq!(
            mercado.record_prediction(bad).await.unwrap_err().kind(),
            "EmptyField"
        );
        assert_eq!(
            mercado
                .get_prediction("unknown")
                .await
                .unwrap_err()
                .kind(),
            "NotFound"
        );
    }
    #[tokio::test]
    async fn opens_market_through_producer() {
        let upstream = InMemoryUpstream::default();
        upstream.add_prediction(
            "subject-42",
            prediction_request("subject-42", date(2070, 1, 1)),
        );
        let mercado = mercado_with(upstream, Duration::from_secs(5)).await;
        let market = mercado.open_market_for_subject("subject-42").await.unwrap();
        assert_eq!(market.status, MarketStatus::Active);
        assert_eq!(
            mercado
                .open_market_for_subject("subject-42")
                .await
                .unwrap_err()
                .kind(),
            "DuplicateMarket"
        );
        let e = mercado
            .open_market_for_subject("subject-43")
            .await
            .unwrap_err();
        assert_eq!(e.kind(), "UpstreamFailure");
    }
    #[tokio::test]
    async fn slow_producer_times_out() {
        let upstream = InMemoryUpstream::with_delay(Duration::from_millis(500));
        upstream.add_prediction("slow", prediction_request("slow", date(2070, 1, 1)));
        let mercado = mercado_with(upstream, Duration::from_millis(50)).await;
        let e = mercado.open_market_for_subject("slow").await.unwrap_err();
        assert_eq!(e.kind(), "UpstreamTimeout");
        assert!(e.is_retryable());
        assert!(mercado.get_markets().await.unwrap().is_empty());
    }
    #[tokio::test]
    async fn leaderboard_orders_by_confidence_then_pool() {
        let mercado = mercado().await;
        let mut low = prediction_request("low", date(2061, 3, 14));
        low.confidence = "40.00".into();
        let low = mercado.record_prediction(low).await.unwrap();
        let high_a = mercado
            .record_prediction(prediction_request("high-a", date(2062, 1, 1)))
            .await
            .unwrap();
        let high_b = mercado
            .record_prediction(prediction_request("high-b", date(2062, 1, 1)))
            .await
            .unwrap();
        let market = mercado
            .create_market(&high_b.id.to_string())
            .await
            .unwrap();
        mercado
            .place_bet(&market.id.to_string(), "bettor", "after", "20.00")
            .await
            .unwrap();

        let board = mercado.leaderboard(None).await.unwrap();
        let order: Vec<_> = board.iter().map(|e| e.prediction).collect();
        assert_eq!(order, vec![high_b.id, high_a.id, low.id]);
        assert_eq!(board[0].market, Some(market.id));
        assert_eq!(board[0].total_pool, dec!(20.00));
        assert_eq!(board[0].bet_count, 1);
        assert_eq!(board[1].market, None);
        assert_eq!(mercado.leaderboard(Some(1)).await.unwrap().len(), 1);
    }
    #[tokio::test]
    async fn idle_locks_are_released_but_halts_stick() {
        let mercado = mercado().await;
        let prediction = mercado
            .record_prediction(prediction_request("subject", date(2061, 3, 14)))
            .await
            .unwrap();
        let market = mercado
            .create_market(&prediction.id.to_string())
            .await
            .unwrap();
        assert_eq!(registered_locks(&mercado), 0);
        mercado
            .place_bet(&market.id.to_string(), "b", "exact", "10.00")
            .await
            .unwrap();
        assert_eq!(registered_locks(&mercado), 0);

        // A waiter keeps the entry alive for the next holder.
        let held = mercado.lock(LockKey::Market(market.id)).await;
        let waiter = {
            let mercado = &mercado;
            async move { mercado.lock(LockKey::Market(market.id)).await }
        };
        let (_, waited) = tokio::join!(
            async move {
                tokio::task::yield_now().await;
                drop(held);
            },
            waiter
        );
        assert_eq!(registered_locks(&mercado), 1);
        drop(waited);
        assert_eq!(registered_locks(&mercado), 0);

        mercado
            .lock(LockKey::Market(market.id))
            .await
            .halt(&market.id, "inspection".into());
        assert_eq!(registered_locks(&mercado), 1);
        let e = mercado
            .place_bet(&market.id.to_string(), "b", "exact", "10.00")
            .await
            .unwrap_err();
        assert_eq!(e.kind(), "InvariantViolation");
        assert_eq!(registered_locks(&mercado), 1);
    }
}
