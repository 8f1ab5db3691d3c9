use crate::api::*;
use crate::db::MarketTx;
use crate::error::{MarketError, Result};
use crate::market_store::apply_bet;
use crate::mercado::{now, LockKey, Mercado};
use crate::odds::potential_payout;
use crate::validation::{check_payout, normalize_identifier, parse_bet_type, validate_amount, IdKind};
use futures_util::stream::{self, Stream, TryStreamExt};
use log::debug;
use rust_decimal::Decimal;
use uuid::Uuid;

pub const DEFAULT_PAGE_SIZE: u32 = 50;
pub const MAX_PAGE_SIZE: u32 = 200;

impl Mercado {
    /// Validates and appends a bet, then updates the market aggregates in the
    /// same transaction. The payout is fixed at the odds in force right now.
    pub async fn place_bet(
        &self,
        market: &str,
        bettor: &str,
        bet_type: &str,
        amount: &str,
    ) -> Result<Bet> {
        let market = normalize_identifier(market, IdKind::Market)?;
        let bettor = normalize_identifier(bettor, IdKind::Bettor)?;
        let bet_type = parse_bet_type(bet_type)?;
        let amount = validate_amount(amount)?;
        let mut guard = self.lock(LockKey::Market(market)).await;
        guard.ensure_running(&market)?;
        let result = self.append_bet(market, bettor, bet_type, amount).await;
        guard.halt_on(result)
    }
    async fn append_bet(
        &self,
        market: MarketId,
        bettor: BettorId,
        bet_type: BetType,
        amount: Decimal,
    ) -> Result<Bet> {
        let mut tx = self.db.begin().await?;
        let current = tx
            .get_market(&market)
            .await?
            .ok_or_else(|| MarketError::not_found("market", market))?;
        if current.status != MarketStatus::Active {
            return Err(MarketError::MarketClosed(market));
        }
        let payout = check_payout(potential_payout(amount, current.odds.get(bet_type)))?;
        let bet = Bet {
            id: Uuid::new_v4(),
            market,
            bettor,
            bet_type,
            amount,
            potential_payout: payout,
            status: BetStatus::Active,
            placed_at: now(),
        };
        tx.insert_bet(&bet).await?;
        let updated = apply_bet(tx.as_mut(), current, &bet).await?;
        tx.commit().await?;
        debug!(
            "Placed bet {} on {} for {} paying {} in market {}, pool {}",
            bet.id, bet_type, amount, payout, market, updated.total_pool
        );
        Ok(bet)
    }
    /// Newest first. Pass the returned cursor back to continue.
    pub async fn list_bets(
        &self,
        market: &str,
        cursor: Option<BetCursor>,
        limit: Option<u32>,
    ) -> Result<BetPage> {
        let market = normalize_identifier(market, IdKind::Market)?;
        if self.db.get_market(&market).await?.is_none() {
            return Err(MarketError::not_found("market", market));
        }
        let limit = limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
        Ok(self.db.get_bets_page(&market, cursor, limit).await?)
    }
    /// Every bet of a market, newest first, fetched a page at a time as the
    /// stream is polled.
    pub fn bet_stream(
        &self,
        market: MarketId,
        page_size: u32,
    ) -> impl Stream<Item = Result<Bet>> + Send + '_ {
        let pages = stream::try_unfold(
            Some(None),
            move |cursor: Option<Option<BetCursor>>| async move {
                let Some(cursor) = cursor else {
                    return Ok::<_, MarketError>(None);
                };
                let page = self.db.get_bets_page(&market, cursor, page_size).await?;
                Ok(Some((page.bets, page.next.map(Some))))
            },
        );
        pages
            .map_ok(|bets| stream::iter(bets.into_iter().map(Ok::<Bet, MarketError>)))
            .try_flatten()
    }
    pub async fn get_bettor_bets(&self, bettor: &str) -> Result<Vec<Bet>> {
        let bettor = normalize_identifier(bettor, IdKind::Bettor)?;
        Ok(self.db.get_bettor_bets(&bettor).await?)
    }
}

/// Resolves every active bet of a market against the winning type.
pub(crate) async fn settle_bets(
    tx: &mut (dyn MarketTx + Send),
    market: &MarketId,
    winning_type: BetType,
) -> Result<Vec<Bet>> {
    let mut bets = tx.get_active_bets(market).await?;
    for bet in bets.iter_mut() {
        bet.status = if bet.bet_type == winning_type {
            BetStatus::Won
        } else {
            BetStatus::Lost
        };
        tx.set_bet_status(&bet.id, bet.status).await?;
    }
    Ok(bets)
}
