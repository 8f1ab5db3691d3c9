use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::*;

/// What the market query endpoint reports about a single market.
#[derive(PartialEq, Eq, Debug, Serialize, Deserialize, Clone)]
pub struct MarketOverviewResponse {
    pub id: MarketId,
    pub prediction: PredictionId,
    pub status: MarketStatus,
    pub pool: Decimal,
    pub bet_count: u32,
    pub odds: Odds,
    pub updated_at: DateTime<Utc>,
}
impl From<Market> for MarketOverviewResponse {
    fn from(market: Market) -> Self {
        Self {
            id: market.id,
            prediction: market.prediction,
            status: market.status,
            pool: market.total_pool,
            bet_count: market.bet_count,
            odds: market.odds,
            updated_at: market.updated_at,
        }
    }
}
#[derive(PartialEq, Eq, Debug, Serialize, Deserialize, Clone)]
pub struct BetPage {
    pub bets: Vec<Bet>,
    /// Pass back to continue the listing; `None` once exhausted.
    pub next: Option<BetCursor>,
}
#[derive(PartialEq, Eq, Debug, Serialize, Deserialize, Clone)]
pub struct SettlementResponse {
    pub settlement: Settlement,
    pub market: Market,
    pub bets: Vec<Bet>,
    pub winners: u32,
    pub losers: u32,
    /// Sum of potential payouts of the won bets.
    pub total_owed: Decimal,
}
#[derive(PartialEq, Eq, Debug, Serialize, Deserialize, Clone)]
pub struct MarketAudit {
    pub market: MarketId,
    pub recorded_pool: Decimal,
    pub ledger_pool: Decimal,
    pub recorded_count: u32,
    pub ledger_count: u32,
    pub consistent: bool,
}
#[derive(PartialEq, Eq, Debug, Serialize, Deserialize, Clone)]
pub struct LeaderboardEntry {
    pub prediction: PredictionId,
    pub subject: SubjectId,
    pub target_date: NaiveDate,
    pub cause: String,
    pub confidence: Decimal,
    pub market: Option<MarketId>,
    pub total_pool: Decimal,
    pub bet_count: u32,
}
#[derive(PartialEq, Eq, Debug, Serialize, Deserialize, Clone, Copy)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Validation,
    Conflict,
    NotFound,
    UpstreamTimeout,
    Upstream,
    InvariantViolation,
    Internal,
}
/// Body of every rejected request.
#[derive(PartialEq, Eq, Debug, Serialize, Deserialize, Clone)]
pub struct ErrorResponse {
    pub category: ErrorCategory,
    pub kind: String,
    pub reason: String,
}
