use crate::api::*;
use crate::config::Settings;
use crate::db::SQLite;
use crate::error::map_market_err;
use crate::mercado::Mercado;
use crate::remote::RemoteUpstream;
use crate::upstream::{InMemoryUpstream, PredictionProducer, VerificationOracle};
use anyhow::{anyhow, Context, Result};
use axum::extract::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::Router;
use axum_macros::debug_handler;
use clap::Parser;
use env_logger::{Builder, WriteStyle};
use log::{debug, error, LevelFilter};
use std::future::Future;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use tokio::task::JoinHandle;

mod api;
#[cfg(test)]
mod client;
mod config;
mod db;
mod error;
mod ledger;
mod market_store;
mod mercado;
mod odds;
mod remote;
mod settlement;
mod upstream;
mod validation;

type ApiResult<T> = std::result::Result<T, (StatusCode, Json<ErrorResponse>)>;

#[debug_handler]
async fn new_prediction(
    State(state): State<Arc<Mercado>>,
    Json(request): Json<NewPredictionRequest>,
) -> ApiResult<(StatusCode, Json<Prediction>)> {
    let prediction = state
        .record_prediction(request)
        .await
        .map_err(map_market_err)?;
    Ok((StatusCode::CREATED, Json(prediction)))
}
async fn get_prediction(
    State(state): State<Arc<Mercado>>,
    Json(request): Json<PredictionRequest>,
) -> ApiResult<Json<Prediction>> {
    let prediction = state
        .get_prediction(&request.prediction)
        .await
        .map_err(map_market_err)?;
    Ok(Json(prediction))
}
#[debug_handler]
async fn create_market(
    State(state): State<Arc<Mercado>>,
    Json(request): Json<PredictionRequest>,
) -> ApiResult<(StatusCode, Json<Market>)> {
    let market = state
        .create_market(&request.prediction)
        .await
        .map_err(map_market_err)?;
    Ok((StatusCode::CREATED, Json(market)))
}
async fn open_market(
    State(state): State<Arc<Mercado>>,
    Json(request): Json<SubjectRequest>,
) -> ApiResult<(StatusCode, Json<Market>)> {
    debug!("Opening market for subject {}", request.subject);
    let market = state
        .open_market_for_subject(&request.subject)
        .await
        .map_err(map_market_err)?;
    Ok((StatusCode::CREATED, Json(market)))
}
async fn get_market(
    State(state): State<Arc<Mercado>>,
    Json(request): Json<MarketRequest>,
) -> ApiResult<Json<MarketOverviewResponse>> {
    let market = state
        .get_market(&request.market)
        .await
        .map_err(map_market_err)?;
    Ok(Json(market.into()))
}
async fn get_market_for_prediction(
    State(state): State<Arc<Mercado>>,
    Json(request): Json<PredictionRequest>,
) -> ApiResult<Json<MarketOverviewResponse>> {
    let market = state
        .get_market_for_prediction(&request.prediction)
        .await
        .map_err(map_market_err)?;
    Ok(Json(market.into()))
}
async fn get_markets(State(state): State<Arc<Mercado>>) -> ApiResult<Json<Vec<Market>>> {
    let markets = state.get_markets().await.map_err(map_market_err)?;
    Ok(Json(markets))
}
#[debug_handler]
async fn place_bet(
    State(state): State<Arc<Mercado>>,
    Json(request): Json<PlaceBetRequest>,
) -> ApiResult<(StatusCode, Json<Bet>)> {
    debug!(
        "Placing {} bet of {} on market {} for bettor {}",
        request.bet_type, request.amount, request.market, request.bettor
    );
    let bet = state
        .place_bet(
            &request.market,
            &request.bettor,
            &request.bet_type,
            &request.amount,
        )
        .await
        .map_err(map_market_err)?;
    Ok((StatusCode::CREATED, Json(bet)))
}
async fn get_bets(
    State(state): State<Arc<Mercado>>,
    Json(request): Json<BetsRequest>,
) -> ApiResult<Json<BetPage>> {
    let page = state
        .list_bets(&request.market, request.cursor, request.limit)
        .await
        .map_err(map_market_err)?;
    Ok(Json(page))
}
async fn get_bettor_bets(
    State(state): State<Arc<Mercado>>,
    Json(request): Json<BettorRequest>,
) -> ApiResult<Json<Vec<Bet>>> {
    let bets = state
        .get_bettor_bets(&request.bettor)
        .await
        .map_err(map_market_err)?;
    Ok(Json(bets))
}
#[debug_handler]
async fn submit_verification(
    State(state): State<Arc<Mercado>>,
    Json(request): Json<VerificationRequest>,
) -> ApiResult<Json<SettlementResponse>> {
    debug!(
        "Verification for prediction {}: {} ({}) from {}",
        request.prediction, request.actual_date, request.cause, request.source
    );
    let response = state.settle(request).await.map_err(map_market_err)?;
    Ok(Json(response))
}
async fn poll_verification(
    State(state): State<Arc<Mercado>>,
    Json(request): Json<PredictionRequest>,
) -> ApiResult<Json<SettlementResponse>> {
    let response = state
        .settle_from_oracle(&request.prediction)
        .await
        .map_err(map_market_err)?;
    Ok(Json(response))
}
async fn get_settlement(
    State(state): State<Arc<Mercado>>,
    Json(request): Json<PredictionRequest>,
) -> ApiResult<Json<Settlement>> {
    let settlement = state
        .get_settlement(&request.prediction)
        .await
        .map_err(map_market_err)?;
    Ok(Json(settlement))
}
async fn verify_market(
    State(state): State<Arc<Mercado>>,
    Json(request): Json<MarketRequest>,
) -> ApiResult<Json<MarketAudit>> {
    let audit = state
        .verify_market(&request.market)
        .await
        .map_err(map_market_err)?;
    Ok(Json(audit))
}
async fn get_leaderboard(
    State(state): State<Arc<Mercado>>,
    Json(request): Json<LeaderboardRequest>,
) -> ApiResult<Json<Vec<LeaderboardEntry>>> {
    let entries = state
        .leaderboard(request.limit)
        .await
        .map_err(map_market_err)?;
    Ok(Json(entries))
}

#[derive(Parser)]
struct Args {
    /// Settings file, overrides `deathcast.*` in the working directory
    #[arg(short, long)]
    config: Option<PathBuf>,
    #[arg(short, long)]
    port: Option<u16>,
    #[arg(short, long)]
    db: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Args::parse();
    let mut settings = Settings::load(cli.config.as_deref())?;
    if let Some(port) = cli.port {
        settings.server.port = port;
    }
    if let Some(db) = cli.db {
        settings.database.url = db;
    }
    let level = LevelFilter::from_str(&settings.log.level)
        .map_err(|_| anyhow!("Invalid log level {}", settings.log.level))?;
    Builder::default()
        .filter_level(level)
        .parse_default_env()
        .write_style(WriteStyle::Always)
        .init();
    let (_port, handle) = run_server(&settings, shutdown_signal()).await?;
    handle.await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Couldn't listen for ctrl-c: {}", e);
    }
    debug!("Shutting down");
}

async fn build_mercado(settings: &Settings) -> Result<Mercado> {
    let db = SQLite::new(&settings.database.url, settings.database.max_connections).await?;
    let timeout = settings.upstream.timeout();
    let (producer, oracle): (
        Box<dyn PredictionProducer + Send + Sync>,
        Box<dyn VerificationOracle + Send + Sync>,
    ) = match &settings.upstream.url {
        Some(url) => {
            let upstream = RemoteUpstream::new(url.clone(), timeout)?;
            debug!("Using upstream at {}", url);
            (Box::new(upstream.clone()), Box::new(upstream))
        }
        None => {
            let upstream = InMemoryUpstream::default();
            debug!("No upstream configured, using in-memory upstream");
            (Box::new(upstream.clone()), Box::new(upstream))
        }
    };
    Ok(Mercado::new(Box::new(db), producer, oracle, timeout).await?)
}

fn router(state: Arc<Mercado>) -> Router {
    Router::new()
        .route("/new_prediction", post(new_prediction))
        .route("/get_prediction", post(get_prediction))
        .route("/create_market", post(create_market))
        .route("/open_market", post(open_market))
        .route("/get_market", post(get_market))
        .route("/get_market_for_prediction", post(get_market_for_prediction))
        .route("/get_markets", get(get_markets))
        .route("/place_bet", post(place_bet))
        .route("/get_bets", post(get_bets))
        .route("/get_bettor_bets", post(get_bettor_bets))
        .route("/submit_verification", post(submit_verification))
        .route("/poll_verification", post(poll_verification))
        .route("/get_settlement", post(get_settlement))
        .route("/verify_market", post(verify_market))
        .route("/get_leaderboard", post(get_leaderboard))
        .with_state(state)
}

/// Serves until `shutdown` resolves, then closes the store.
async fn run_server(
    settings: &Settings,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<(u16, JoinHandle<()>)> {
    let state = Arc::new(build_mercado(settings).await?);
    let app = router(state.clone());

    let addr: SocketAddr = format!("{}:{}", settings.server.host, settings.server.port)
        .parse()
        .context("Invalid listen address")?;
    let server = axum::Server::try_bind(&addr)
        .with_context(|| format!("Couldn't bind {}", addr))?
        .serve(app.into_make_service());
    let port = server.local_addr().port();
    debug!("Listening on {}", server.local_addr());
    let handle = tokio::spawn(async move {
        if let Err(e) = server.with_graceful_shutdown(shutdown).await {
            error!("Server error: {}", e);
        }
        state.shutdown().await;
    });
    Ok((port, handle))
}
