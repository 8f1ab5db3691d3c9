use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::*;

// Identifiers and numbers arrive raw; the server canonicalizes and validates them.

/// A prediction as emitted by the producer.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct NewPredictionRequest {
    pub prediction: Option<String>,
    pub subject: String,
    pub target_date: NaiveDate,
    pub cause: String,
    pub confidence: String,
}
/// A verified outcome as asserted by the oracle.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct VerificationRequest {
    pub prediction: String,
    pub actual_date: NaiveDate,
    pub cause: String,
    pub source: String,
    pub confidence: String,
}
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct PlaceBetRequest {
    pub market: String,
    pub bettor: String,
    pub bet_type: String,
    pub amount: String,
}
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct PredictionRequest {
    pub prediction: String,
}
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct MarketRequest {
    pub market: String,
}
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct SubjectRequest {
    pub subject: String,
}
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct BettorRequest {
    pub bettor: String,
}
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct BetsRequest {
    pub market: String,
    pub cursor: Option<BetCursor>,
    pub limit: Option<u32>,
}
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, Default)]
pub struct LeaderboardRequest {
    pub limit: Option<u32>,
}
