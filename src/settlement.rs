use crate::api::*;
use crate::error::{MarketError, Result};
use crate::ledger::settle_bets;
use crate::market_store::{close_market, mismatch};
use crate::mercado::{now, LockKey, Mercado};
use crate::validation::{normalize_identifier, IdKind};
use chrono::NaiveDate;
use log::{debug, warn};
use rust_decimal::Decimal;
use std::cmp::Ordering;
use std::str::FromStr;

/// Which bet type an actual date pays out. The cause of death is recorded
/// but never decides the winner.
pub fn winning_type(target_date: NaiveDate, actual_date: NaiveDate) -> BetType {
    match actual_date.cmp(&target_date) {
        Ordering::Less => BetType::Before,
        Ordering::Equal => BetType::Exact,
        Ordering::Greater => BetType::After,
    }
}

struct Outcome {
    prediction: PredictionId,
    actual_date: NaiveDate,
    cause: String,
    source: String,
    confidence: Decimal,
}
fn validate_outcome(request: &VerificationRequest) -> Result<Outcome> {
    let prediction = normalize_identifier(&request.prediction, IdKind::Prediction)?;
    let confidence = Decimal::from_str(request.confidence.trim()).map_err(|_| {
        MarketError::InvalidVerification(format!(
            "confidence must be a number, got {:?}",
            request.confidence
        ))
    })?;
    if confidence < Decimal::ZERO || confidence > Decimal::ONE {
        return Err(MarketError::InvalidVerification(format!(
            "confidence must be within [0, 1], got {}",
            confidence
        )));
    }
    let source = request.source.trim();
    if source.is_empty() {
        return Err(MarketError::InvalidVerification(
            "source must not be empty".into(),
        ));
    }
    let cause = request.cause.trim();
    if cause.is_empty() {
        return Err(MarketError::InvalidVerification(
            "cause must not be empty".into(),
        ));
    }
    Ok(Outcome {
        prediction,
        actual_date: request.actual_date,
        cause: cause.to_string(),
        source: source.to_string(),
        confidence,
    })
}

impl Mercado {
    /// Resolves the market of a prediction against a verified outcome.
    ///
    /// Bets of the winning type are marked won and owe their recorded
    /// payout, all others are lost. The market closes for good; a second
    /// outcome for it is rejected with `AlreadyClosed` and changes nothing.
    pub async fn settle(&self, request: VerificationRequest) -> Result<SettlementResponse> {
        let outcome = validate_outcome(&request)?;
        let prediction = self
            .db
            .get_prediction(&outcome.prediction)
            .await?
            .ok_or_else(|| MarketError::not_found("prediction", outcome.prediction))?;
        let market = self
            .db
            .get_market_for_prediction(&prediction.id)
            .await?
            .ok_or_else(|| MarketError::not_found("market for prediction", prediction.id))?;
        let mut guard = self.lock(LockKey::Market(market.id)).await;
        guard.ensure_running(&market.id)?;
        let result = self.resolve(&prediction, market.id, outcome).await;
        guard.halt_on(result)
    }
    async fn resolve(
        &self,
        prediction: &Prediction,
        market: MarketId,
        outcome: Outcome,
    ) -> Result<SettlementResponse> {
        let mut tx = self.db.begin().await?;
        let market = tx
            .get_market(&market)
            .await?
            .ok_or_else(|| MarketError::not_found("market", market))?;
        if market.status == MarketStatus::Closed {
            return Err(MarketError::AlreadyClosed(market.id));
        }
        let stakes = tx.get_stakes(&market.id).await?;
        if stakes.total() != market.total_pool || stakes.count != market.bet_count {
            return Err(MarketError::InvariantViolation {
                market: market.id,
                detail: mismatch(
                    market.total_pool,
                    market.bet_count,
                    stakes.total(),
                    stakes.count,
                ),
            });
        }
        let winning_type = winning_type(prediction.target_date, outcome.actual_date);
        let bets = settle_bets(tx.as_mut(), &market.id, winning_type).await?;
        let settlement = Settlement {
            market: market.id,
            prediction: prediction.id,
            actual_date: outcome.actual_date,
            cause: outcome.cause,
            source: outcome.source,
            confidence: outcome.confidence,
            winning_type,
            resolved_at: now(),
        };
        let market = close_market(tx.as_mut(), market, &settlement).await?;
        tx.commit().await?;

        let mut winners = 0;
        let mut total_owed = Decimal::new(0, 2);
        for bet in bets.iter().filter(|bet| bet.status == BetStatus::Won) {
            winners += 1;
            total_owed += bet.potential_payout;
        }
        let losers = bets.len() as u32 - winners;
        if total_owed > market.total_pool {
            warn!(
                "Market {} owes {} to {} winners from a pool of {}",
                market.id, total_owed, winners, market.total_pool
            );
        }
        debug!(
            "Settled market {} on {}: {} won, {} lost",
            market.id, winning_type, winners, losers
        );
        Ok(SettlementResponse {
            settlement,
            market,
            bets,
            winners,
            losers,
            total_owed,
        })
    }
    /// Asks the oracle for the prediction's outcome and settles on it.
    pub async fn settle_from_oracle(&self, prediction: &str) -> Result<SettlementResponse> {
        let prediction = normalize_identifier(prediction, IdKind::Prediction)?;
        let outcome = self
            .call_upstream(
                "verification oracle",
                self.oracle.fetch_outcome(&prediction.to_string()),
            )
            .await?
            .ok_or_else(|| MarketError::not_found("verification", prediction))?;
        self.settle(outcome).await
    }
    pub async fn get_settlement(&self, prediction: &str) -> Result<Settlement> {
        let prediction = normalize_identifier(prediction, IdKind::Prediction)?;
        self.db
            .get_settlement(&prediction)
            .await?
            .ok_or_else(|| MarketError::not_found("settlement", prediction))
    }
}
