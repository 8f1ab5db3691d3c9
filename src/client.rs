use anyhow::{bail, Result};
use reqwest::Response;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::api::*;

/// Typed client for the market server. Rejections come back as an
/// [`ErrorResponse`] inside the returned error.
pub struct Client {
    url: String,
    client: reqwest::Client,
}
impl Client {
    pub fn new(url: String) -> Self {
        let client = reqwest::Client::new();
        Self { url, client }
    }
    async fn post<T: DeserializeOwned>(&self, path: &str, request: &impl Serialize) -> Result<T> {
        let response = self
            .client
            .post(self.url.clone() + path)
            .json(request)
            .send()
            .await?;
        parse_response(response).await
    }
    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = self.client.get(self.url.clone() + path).send().await?;
        parse_response(response).await
    }
    pub async fn new_prediction(&self, request: NewPredictionRequest) -> Result<Prediction> {
        self.post("/new_prediction", &request).await
    }
    pub async fn get_prediction(&self, prediction: String) -> Result<Prediction> {
        self.post("/get_prediction", &PredictionRequest { prediction })
            .await
    }
    pub async fn create_market(&self, prediction: String) -> Result<Market> {
        self.post("/create_market", &PredictionRequest { prediction })
            .await
    }
    pub async fn open_market(&self, subject: String) -> Result<Market> {
        self.post("/open_market", &SubjectRequest { subject }).await
    }
    pub async fn get_market(&self, market: String) -> Result<MarketOverviewResponse> {
        self.post("/get_market", &MarketRequest { market }).await
    }
    pub async fn get_market_for_prediction(
        &self,
        prediction: String,
    ) -> Result<MarketOverviewResponse> {
        self.post("/get_market_for_prediction", &PredictionRequest { prediction })
            .await
    }
    pub async fn get_markets(&self) -> Result<Vec<Market>> {
        self.get("/get_markets").await
    }
    pub async fn place_bet(&self, request: PlaceBetRequest) -> Result<Bet> {
        self.post("/place_bet", &request).await
    }
    pub async fn get_bets(&self, request: BetsRequest) -> Result<BetPage> {
        self.post("/get_bets", &request).await
    }
    pub async fn get_bettor_bets(&self, bettor: String) -> Result<Vec<Bet>> {
        self.post("/get_bettor_bets", &BettorRequest { bettor }).await
    }
    pub async fn submit_verification(
        &self,
        request: VerificationRequest,
    ) -> Result<SettlementResponse> {
        self.post("/submit_verification", &request).await
    }
    pub async fn poll_verification(&self, prediction: String) -> Result<SettlementResponse> {
        self.post("/poll_verification", &PredictionRequest { prediction })
            .await
    }
    pub async fn get_settlement(&self, prediction: String) -> Result<Settlement> {
        self.post("/get_settlement", &PredictionRequest { prediction })
            .await
    }
    pub async fn verify_market(&self, market: String) -> Result<MarketAudit> {
        self.post("/verify_market", &MarketRequest { market }).await
    }
    pub async fn get_leaderboard(&self, limit: Option<u32>) -> Result<Vec<LeaderboardEntry>> {
        self.post("/get_leaderboard", &LeaderboardRequest { limit })
            .await
    }
}

async fn parse_response<T: DeserializeOwned>(response: Response) -> Result<T> {
    let status = response.status();
    if status.is_success() {
        return Ok(response.json::<T>().await?);
    }
    let text = response.text().await?;
    match serde_json::from_str::<ErrorResponse>(&text) {
        Ok(rejection) => Err(rejection.into()),
        Err(_) => bail!("{}: {}", status, text),
    }
}
