use crate::api::*;
use crate::db::MarketTx;
use crate::error::{MarketError, Result};
use crate::mercado::{now, LockKey, Mercado};
use crate::odds::{compute_odds, BASELINE_ODDS};
use crate::validation::{normalize_identifier, IdKind};
use log::debug;
use rust_decimal::Decimal;
use uuid::Uuid;

impl Mercado {
    pub async fn create_market(&self, prediction: &str) -> Result<Market> {
        let prediction = normalize_identifier(prediction, IdKind::Prediction)?;
        let _guard = self.lock(LockKey::Prediction(prediction)).await;
        if self.db.get_prediction(&prediction).await?.is_none() {
            return Err(MarketError::not_found("prediction", prediction));
        }
        let mut tx = self.db.begin().await?;
        if let Some(settled) = tx.settled_market(&prediction).await? {
            return Err(MarketError::AlreadyClosed(settled));
        }
        if tx
            .get_active_market_for_prediction(&prediction)
            .await?
            .is_some()
        {
            return Err(MarketError::DuplicateMarket(prediction));
        }
        let created_at = now();
        let market = Market {
            id: Uuid::new_v4(),
            prediction,
            status: MarketStatus::Active,
            total_pool: Decimal::new(0, 2),
            bet_count: 0,
            odds: BASELINE_ODDS,
            created_at,
            updated_at: created_at,
        };
        tx.insert_market(&market).await?;
        tx.commit().await?;
        debug!("Created market {} for prediction {}", market.id, prediction);
        Ok(market)
    }
    pub async fn get_market(&self, market: &str) -> Result<Market> {
        let market = normalize_identifier(market, IdKind::Market)?;
        self.db
            .get_market(&market)
            .await?
            .ok_or_else(|| MarketError::not_found("market", market))
    }
    /// The newest market opened for a prediction.
    pub async fn get_market_for_prediction(&self, prediction: &str) -> Result<Market> {
        let prediction = normalize_identifier(prediction, IdKind::Prediction)?;
        self.db
            .get_market_for_prediction(&prediction)
            .await?
            .ok_or_else(|| MarketError::not_found("market for prediction", prediction))
    }
    pub async fn get_markets(&self) -> Result<Vec<Market>> {
        Ok(self.db.get_markets().await?)
    }
    /// Recomputes pool and bet count from the ledger. A mismatch halts the
    /// market.
    pub async fn verify_market(&self, market: &str) -> Result<MarketAudit> {
        let market = normalize_identifier(market, IdKind::Market)?;
        self.audit_market(market).await
    }
    pub(crate) async fn audit_market(&self, market: MarketId) -> Result<MarketAudit> {
        let mut guard = self.lock(LockKey::Market(market)).await;
        let mut tx = self.db.begin().await?;
        let recorded = tx
            .get_market(&market)
            .await?
            .ok_or_else(|| MarketError::not_found("market", market))?;
        let stakes = tx.get_stakes(&market).await?;
        drop(tx);
        let audit = MarketAudit {
            market,
            recorded_pool: recorded.total_pool,
            ledger_pool: stakes.total(),
            recorded_count: recorded.bet_count,
            ledger_count: stakes.count,
            consistent: recorded.total_pool == stakes.total() && recorded.bet_count == stakes.count,
        };
        if !audit.consistent {
            guard.halt(
                &market,
                mismatch(
                    audit.recorded_pool,
                    audit.recorded_count,
                    audit.ledger_pool,
                    audit.ledger_count,
                ),
            );
        }
        debug!("Audited market {}: consistent = {}", market, audit.consistent);
        Ok(audit)
    }
}

/// Adds an already inserted bet to the market aggregates and reprices it.
pub(crate) async fn apply_bet(
    tx: &mut (dyn MarketTx + Send),
    mut market: Market,
    bet: &Bet,
) -> Result<Market> {
    if market.status != MarketStatus::Active {
        return Err(MarketError::MarketClosed(market.id));
    }
    market.total_pool += bet.amount;
    market.bet_count += 1;
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
    market.odds = compute_odds(market.total_pool, &stakes);
    market.updated_at = bet.placed_at;
    tx.update_market(&market).await?;
    Ok(market)
}
pub(crate) fn mismatch(pool: Decimal, count: u32, ledger_pool: Decimal, ledger_count: u32) -> String {
    format!(
        "aggregate pool {} over {} bets, ledger holds {} over {} bets",
        pool, count, ledger_pool, ledger_count
    )
}
/// Writes the settlement record and closes the market for good.
pub(crate) async fn close_market(
    tx: &mut (dyn MarketTx + Send),
    mut market: Market,
    settlement: &Settlement,
) -> Result<Market> {
    if market.status == MarketStatus::Closed {
        return Err(MarketError::AlreadyClosed(market.id));
    }
    tx.insert_settlement(settlement).await?;
    market.status = MarketStatus::Closed;
    market.updated_at = settlement.resolved_at;
    tx.update_market(&market).await?;
    Ok(market)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::mercado::test::{date, mercado, prediction_request};
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn new_market_starts_at_baseline() {
        let mercado = mercado().await;
        let prediction = mercado
            .record_prediction(prediction_request("p1-subject", date(2061, 3, 14)))
            .await
            .unwrap();
        let market = mercado
            .create_market(&prediction.id.to_string())
            .await
            .unwrap();
        assert_eq!(market.odds, BASELINE_ODDS);
        assert_eq!(market.total_pool, dec!(0));
        assert_eq!(market.bet_count, 0);
        assert_eq!(
            mercado.get_market(&market.id.to_string()).await.unwrap(),
            market
        );
        assert_eq!(
            mercado
                .get_market_for_prediction(&prediction.id.to_string())
                .await
                .unwrap(),
            market
        );
        assert_eq!(mercado.get_markets().await.unwrap(), vec![market]);
    }
    #[tokio::test]
    async fn one_active_market_per_prediction() {
        let mercado = mercado().await;
        let prediction = mercado
            .record_prediction(prediction_request("subject", date(2061, 3, 14)))
            .await
            .unwrap();
        mercado
            .create_market(&prediction.id.to_string())
            .await
            .unwrap();
        let e = mercado
            .create_market(&prediction.id.to_string())
            .await
            .unwrap_err();
        assert_eq!(e.kind(), "DuplicateMarket");
        let e = mercado.create_market("never-predicted").await.unwrap_err();
        assert_eq!(e.kind(), "NotFound");
        let e = mercado.get_market(&Uuid::new_v4().to_string()).await.unwrap_err();
        assert_eq!(e.kind(), "NotFound");
    }
    #[tokio::test]
    async fn consistent_market_passes_audit() {
        let mercado = mercado().await;
        let prediction = mercado
            .record_prediction(prediction_request("subject", date(2061, 3, 14)))
            .await
            .unwrap();
        let market = mercado
            .create_market(&prediction.id.to_string())
            .await
            .unwrap();
        for amount in ["10.00", "2.50", "99.99"] {
            mercado
                .place_bet(&market.id.to_string(), "b", "exact", amount)
                .await
                .unwrap();
        }
        let audit = mercado.verify_market(&market.id.to_string()).await.unwrap();
        assert!(audit.consistent);
        assert_eq!(audit.recorded_pool, dec!(112.49));
        assert_eq!(audit.ledger_count, 3);
    }
    #[tokio::test]
    async fn tampered_aggregate_halts_market() {
        let mercado = mercado().await;
        let prediction = mercado
            .record_prediction(prediction_request("subject", date(2061, 3, 14)))
            .await
            .unwrap();
        let market = mercado
            .create_market(&prediction.id.to_string())
            .await
            .unwrap();
        let mut tampered = market.clone();
        tampered.total_pool = dec!(500.00);
        let mut tx = mercado.db.begin().await.unwrap();
        tx.update_market(&tampered).await.unwrap();
        tx.commit().await.unwrap();

        let audit = mercado.verify_market(&market.id.to_string()).await.unwrap();
        assert!(!audit.consistent);
        assert_eq!(audit.ledger_pool, dec!(0));
        let e = mercado
            .place_bet(&market.id.to_string(), "b", "before", "10.00")
            .await
            .unwrap_err();
        assert_eq!(e.kind(), "InvariantViolation");
        let page = mercado
            .list_bets(&market.id.to_string(), None, None)
            .await
            .unwrap();
        assert!(page.bets.is_empty());
    }
}
