use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type PredictionId = Uuid;
pub type MarketId = Uuid;
pub type BetId = Uuid;
pub type SubjectId = Uuid;
pub type BettorId = Uuid;

/// A mortality prediction as recorded from the producer. Never mutated.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Prediction {
    pub id: PredictionId,
    pub subject: SubjectId,
    pub target_date: NaiveDate,
    pub cause: String,
    /// Percentage in [0, 100] with two decimals.
    pub confidence: Decimal,
    pub created_at: DateTime<Utc>,
}
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Market {
    pub id: MarketId,
    pub prediction: PredictionId,
    pub status: MarketStatus,
    pub total_pool: Decimal,
    pub bet_count: u32,
    pub odds: Odds,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
#[derive(PartialEq, Eq, Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarketStatus {
    Active,
    Closed,
}
/// Payout multipliers per bet type.
#[derive(PartialEq, Eq, Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Odds {
    pub before: Decimal,
    pub exact: Decimal,
    pub after: Decimal,
}
impl Odds {
    pub fn get(&self, bet_type: BetType) -> Decimal {
        match bet_type {
            BetType::Before => self.before,
            BetType::Exact => self.exact,
            BetType::After => self.after,
        }
    }
}
#[derive(PartialEq, Eq, Hash, Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BetType {
    Before,
    Exact,
    After,
}
impl BetType {
    pub const ALL: [BetType; 3] = [BetType::Before, BetType::Exact, BetType::After];
}
#[derive(PartialEq, Eq, Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BetStatus {
    Active,
    Won,
    Lost,
}
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Bet {
    pub id: BetId,
    pub market: MarketId,
    pub bettor: BettorId,
    pub bet_type: BetType,
    pub amount: Decimal,
    pub potential_payout: Decimal,
    pub status: BetStatus,
    pub placed_at: DateTime<Utc>,
}
/// Terminal record written when a market is resolved.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Settlement {
    pub market: MarketId,
    pub prediction: PredictionId,
    pub actual_date: NaiveDate,
    pub cause: String,
    pub source: String,
    pub confidence: Decimal,
    pub winning_type: BetType,
    pub resolved_at: DateTime<Utc>,
}
/// Position in a bet listing, newest first. `seq` breaks ties between bets
/// placed in the same microsecond.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct BetCursor {
    pub placed_at: i64,
    pub seq: i64,
}
