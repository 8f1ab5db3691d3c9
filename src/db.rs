use crate::api::*;
use crate::odds::Stakes;
use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use log::{debug, trace};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow};
use sqlx::{query, Executor, Row, Sqlite, SqlitePool, Transaction};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

/// Read access to the market tables plus the entry point for writes.
///
/// Every write goes through a [`MarketTx`], so a bet and the aggregate it
/// changes are committed together.
#[async_trait]
pub trait DB {
    /// Returns `false` if a prediction with the same id already exists.
    async fn add_prediction(&self, prediction: &Prediction) -> Result<bool>;
    async fn get_prediction(&self, prediction: &PredictionId) -> Result<Option<Prediction>>;
    async fn get_market(&self, market: &MarketId) -> Result<Option<Market>>;
    async fn get_market_for_prediction(&self, prediction: &PredictionId)
        -> Result<Option<Market>>;
    async fn get_markets(&self) -> Result<Vec<Market>>;
    async fn get_active_markets(&self) -> Result<Vec<MarketId>>;
    async fn get_bets_page(
        &self,
        market: &MarketId,
        cursor: Option<BetCursor>,
        limit: u32,
    ) -> Result<BetPage>;
    async fn get_bettor_bets(&self, bettor: &BettorId) -> Result<Vec<Bet>>;
    async fn get_settlement(&self, prediction: &PredictionId) -> Result<Option<Settlement>>;
    async fn get_leaderboard(&self, limit: u32) -> Result<Vec<LeaderboardEntry>>;
    async fn begin(&self) -> Result<Box<dyn MarketTx + Send>>;
    async fn close(&self);
}

/// A unit of work. Dropping it without [`MarketTx::commit`] rolls back.
#[async_trait]
pub trait MarketTx {
    async fn get_market(&mut self, market: &MarketId) -> Result<Option<Market>>;
    async fn get_active_market_for_prediction(
        &mut self,
        prediction: &PredictionId,
    ) -> Result<Option<Market>>;
    /// The market a prediction was settled on, if any.
    async fn settled_market(&mut self, prediction: &PredictionId) -> Result<Option<MarketId>>;
    async fn insert_market(&mut self, market: &Market) -> Result<()>;
    async fn update_market(&mut self, market: &Market) -> Result<()>;
    async fn insert_bet(&mut self, bet: &Bet) -> Result<()>;
    async fn get_active_bets(&mut self, market: &MarketId) -> Result<Vec<Bet>>;
    async fn set_bet_status(&mut self, bet: &BetId, status: BetStatus) -> Result<()>;
    async fn get_stakes(&mut self, market: &MarketId) -> Result<Stakes>;
    async fn insert_settlement(&mut self, settlement: &Settlement) -> Result<()>;
    async fn commit(self: Box<Self>) -> Result<()>;
}

const SCHEMA: [&str; 7] = [
    "CREATE TABLE IF NOT EXISTS predictions (\
        id TEXT PRIMARY KEY,\
        subject TEXT NOT NULL,\
        target_date TEXT NOT NULL,\
        cause TEXT NOT NULL,\
        confidence INTEGER NOT NULL,\
        created_at INTEGER NOT NULL\
        )",
    "CREATE TABLE IF NOT EXISTS markets (\
        id TEXT PRIMARY KEY,\
        prediction TEXT NOT NULL,\
        status TEXT NOT NULL,\
        total_pool INTEGER NOT NULL DEFAULT 0,\
        bet_count INTEGER NOT NULL DEFAULT 0,\
        odds_before INTEGER NOT NULL,\
        odds_exact INTEGER NOT NULL,\
        odds_after INTEGER NOT NULL,\
        created_at INTEGER NOT NULL,\
        updated_at INTEGER NOT NULL\
        )",
    "CREATE UNIQUE INDEX IF NOT EXISTS markets_active_prediction \
        ON markets (prediction) WHERE status = 'active'",
    "CREATE TABLE IF NOT EXISTS bets (\
        id TEXT PRIMARY KEY,\
        market TEXT NOT NULL,\
        bettor TEXT NOT NULL,\
        bet_type TEXT NOT NULL,\
        amount INTEGER NOT NULL,\
        potential_payout INTEGER NOT NULL,\
        status TEXT NOT NULL,\
        placed_at INTEGER NOT NULL\
        )",
    "CREATE INDEX IF NOT EXISTS bets_market_placed ON bets (market, placed_at)",
    "CREATE INDEX IF NOT EXISTS bets_bettor ON bets (bettor)",
    "CREATE TABLE IF NOT EXISTS settlements (\
        market TEXT PRIMARY KEY,\
        prediction TEXT NOT NULL UNIQUE,\
        actual_date TEXT NOT NULL,\
        cause TEXT NOT NULL,\
        source TEXT NOT NULL,\
        confidence TEXT NOT NULL,\
        winning_type TEXT NOT NULL,\
        resolved_at INTEGER NOT NULL\
        )",
];
const MARKET_COLUMNS: &str = "id, prediction, status, total_pool, bet_count, \
    odds_before, odds_exact, odds_after, created_at, updated_at";
const BET_COLUMNS: &str = "rowid AS seq, id, market, bettor, bet_type, amount, \
    potential_payout, status, placed_at";

pub struct SQLite {
    connection: SqlitePool,
    /// Held by every open [`MarketTx`]. SQLite admits one writer at a time and
    /// a deferred transaction that loses the race to upgrade its read lock
    /// fails with `SQLITE_BUSY` instead of waiting, so writers queue here.
    writer: Arc<Mutex<()>>,
}
impl SQLite {
    pub async fn new(url: &str, max_connections: u32) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)
            .with_context(|| format!("invalid database url {}", url))?
            .create_if_missing(true)
            .busy_timeout(Duration::from_secs(5));
        // Every connection to an in-memory database is a separate database,
        // so those pools hold exactly one connection that never expires.
        let (options, pool_options) = if url.contains(":memory:") || url.contains("mode=memory")
        {
            let pool_options = SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None);
            (options, pool_options)
        } else {
            // Readers keep going while a bet is being written.
            let options = options.journal_mode(SqliteJournalMode::Wal);
            let pool_options = SqlitePoolOptions::new().max_connections(max_connections.max(1));
            (options, pool_options)
        };
        let connection = pool_options
            .connect_with(options)
            .await
            .with_context(|| format!("couldn't open database {}", url))?;
        for statement in SCHEMA {
            connection
                .execute(statement)
                .await
                .context("couldn't create schema")?;
        }
        debug!("Opened database {}", url);
        Ok(Self {
            connection,
            writer: Arc::new(Mutex::new(())),
        })
    }
}
#[async_trait]
impl DB for SQLite {
    async fn add_prediction(&self, prediction: &Prediction) -> Result<bool> {
        let inserted = self
            .connection
            .execute(
                query(
                    "INSERT OR IGNORE INTO predictions (\
                id,\
                subject,\
                target_date,\
                cause,\
                confidence,\
                created_at) \
                VALUES (?,?,?,?,?,?)",
                )
                .bind(prediction.id.to_string())
                .bind(prediction.subject.to_string())
                .bind(prediction.target_date.to_string())
                .bind(prediction.cause.clone())
                .bind(to_cents(prediction.confidence)?)
                .bind(prediction.created_at.timestamp_micros()),
            )
            .await
            .with_context(|| format!("couldn't insert prediction {}", prediction.id))?
            .rows_affected();
        Ok(inserted == 1)
    }
    async fn get_prediction(&self, prediction: &PredictionId) -> Result<Option<Prediction>> {
        let row = self
            .connection
            .fetch_optional(
                query(
                    "SELECT id, subject, target_date, cause, confidence, created_at \
                FROM predictions WHERE id = ?",
                )
                .bind(prediction.to_string()),
            )
            .await
            .with_context(|| format!("couldn't get prediction {}", prediction))?;
        row.map(|row| prediction_from_row(&row)).transpose()
    }
    async fn get_market(&self, market: &MarketId) -> Result<Option<Market>> {
        fetch_market(&self.connection, market).await
    }
    async fn get_market_for_prediction(
        &self,
        prediction: &PredictionId,
    ) -> Result<Option<Market>> {
        let sql = format!(
            "SELECT {} FROM markets WHERE prediction = ? \
            ORDER BY created_at DESC LIMIT 1",
            MARKET_COLUMNS
        );
        let row = self
            .connection
            .fetch_optional(query(&sql).bind(prediction.to_string()))
            .await
            .with_context(|| format!("couldn't get market for prediction {}", prediction))?;
        row.map(|row| market_from_row(&row)).transpose()
    }
    async fn get_markets(&self) -> Result<Vec<Market>> {
        let sql = format!(
            "SELECT {} FROM markets ORDER BY created_at DESC",
            MARKET_COLUMNS
        );
        let rows = self
            .connection
            .fetch_all(query(&sql))
            .await
            .context("couldn't list markets")?;
        rows.iter().map(market_from_row).collect()
    }
    async fn get_active_markets(&self) -> Result<Vec<MarketId>> {
        let rows = self
            .connection
            .fetch_all(query("SELECT id FROM markets WHERE status = 'active'"))
            .await
            .context("couldn't list active markets")?;
        rows.iter().map(|row| parse_id(row, "id")).collect()
    }
    async fn get_bets_page(
        &self,
        market: &MarketId,
        cursor: Option<BetCursor>,
        limit: u32,
    ) -> Result<BetPage> {
        let limit = limit.max(1);
        // One extra row tells us whether another page exists.
        let rows = match cursor {
            None => {
                let sql = format!(
                    "SELECT {} FROM bets WHERE market = ? \
                    ORDER BY placed_at DESC, rowid DESC LIMIT ?",
                    BET_COLUMNS
                );
                self.connection
                    .fetch_all(
                        query(&sql)
                            .bind(market.to_string())
                            .bind(i64::from(limit) + 1),
                    )
                    .await
            }
            Some(cursor) => {
                let sql = format!(
                    "SELECT {} FROM bets WHERE market = ? \
                    AND (placed_at < ? OR (placed_at = ? AND rowid < ?)) \
                    ORDER BY placed_at DESC, rowid DESC LIMIT ?",
                    BET_COLUMNS
                );
                self.connection
                    .fetch_all(
                        query(&sql)
                            .bind(market.to_string())
                            .bind(cursor.placed_at)
                            .bind(cursor.placed_at)
                            .bind(cursor.seq)
                            .bind(i64::from(limit) + 1),
                    )
                    .await
            }
        }
        .with_context(|| format!("couldn't list bets of market {}", market))?;
        let has_more = rows.len() > limit as usize;
        let mut bets = Vec::with_capacity(limit as usize);
        let mut next = None;
        for row in rows.iter().take(limit as usize) {
            bets.push(bet_from_row(row)?);
            next = Some(BetCursor {
                placed_at: row.try_get("placed_at")?,
                seq: row.try_get("seq")?,
            });
        }
        Ok(BetPage {
            bets,
            next: if has_more { next } else { None },
        })
    }
    async fn get_bettor_bets(&self, bettor: &BettorId) -> Result<Vec<Bet>> {
        let sql = format!(
            "SELECT {} FROM bets WHERE bettor = ? ORDER BY placed_at DESC, rowid DESC",
            BET_COLUMNS
        );
        let rows = self
            .connection
            .fetch_all(query(&sql).bind(bettor.to_string()))
            .await
            .with_context(|| format!("couldn't list bets of bettor {}", bettor))?;
        rows.iter().map(bet_from_row).collect()
    }
    async fn get_settlement(&self, prediction: &PredictionId) -> Result<Option<Settlement>> {
        let row = self
            .connection
            .fetch_optional(
                query(
                    "SELECT market, prediction, actual_date, cause, source, confidence, \
                winning_type, resolved_at \
                FROM settlements WHERE prediction = ?",
                )
                .bind(prediction.to_string()),
            )
            .await
            .with_context(|| format!("couldn't get settlement of prediction {}", prediction))?;
        row.map(|row| settlement_from_row(&row)).transpose()
    }
    async fn get_leaderboard(&self, limit: u32) -> Result<Vec<LeaderboardEntry>> {
        let stmt = query(
            "SELECT predictions.id, predictions.subject, predictions.target_date, \
            predictions.cause, predictions.confidence, markets.id AS market, \
            COALESCE(markets.total_pool, 0) AS total_pool, \
            COALESCE(markets.bet_count, 0) AS bet_count \
            FROM predictions \
            LEFT JOIN markets ON markets.prediction = predictions.id \
            ORDER BY predictions.confidence DESC, total_pool DESC, predictions.created_at ASC \
            LIMIT ?",
        );
        let rows = self
            .connection
            .fetch_all(stmt.bind(i64::from(limit)))
            .await
            .context("couldn't get leaderboard")?;
        let mut entries = Vec::with_capacity(rows.len());
        for row in rows {
            let market: Option<String> = row.try_get("market")?;
            entries.push(LeaderboardEntry {
                prediction: parse_id(&row, "id")?,
                subject: parse_id(&row, "subject")?,
                target_date: parse_date(row.try_get("target_date")?)?,
                cause: row.try_get("cause")?,
                confidence: from_cents(row.try_get("confidence")?),
                market: market.map(|m| Uuid::parse_str(&m)).transpose()?,
                total_pool: from_cents(row.try_get("total_pool")?),
                bet_count: to_count(row.try_get("bet_count")?)?,
            });
        }
        Ok(entries)
    }
    async fn begin(&self) -> Result<Box<dyn MarketTx + Send>> {
        let writer = self.writer.clone().lock_owned().await;
        let tx = self
            .connection
            .begin()
            .await
            .context("couldn't start transaction")?;
        Ok(Box::new(SQLiteTx { tx, writer }))
    }
    async fn close(&self) {
        self.connection.close().await;
        debug!("Closed database");
    }
}

/// Fields drop in order: the transaction rolls back before the writer slot
/// is released.
pub struct SQLiteTx {
    tx: Transaction<'static, Sqlite>,
    writer: OwnedMutexGuard<()>,
}
#[async_trait]
impl MarketTx for SQLiteTx {
    async fn get_market(&mut self, market: &MarketId) -> Result<Option<Market>> {
        fetch_market(&mut *self.tx, market).await
    }
    async fn get_active_market_for_prediction(
        &mut self,
        prediction: &PredictionId,
    ) -> Result<Option<Market>> {
        let sql = format!(
            "SELECT {} FROM markets WHERE prediction = ? AND status = 'active'",
            MARKET_COLUMNS
        );
        let row = query(&sql)
            .bind(prediction.to_string())
            .fetch_optional(&mut *self.tx)
            .await
            .with_context(|| format!("couldn't get active market for {}", prediction))?;
        row.map(|row| market_from_row(&row)).transpose()
    }
    async fn settled_market(&mut self, prediction: &PredictionId) -> Result<Option<MarketId>> {
        let row = query("SELECT market FROM settlements WHERE prediction = ?")
            .bind(prediction.to_string())
            .fetch_optional(&mut *self.tx)
            .await
            .with_context(|| format!("couldn't check settlement of {}", prediction))?;
        row.map(|row| parse_id(&row, "market")).transpose()
    }
    async fn insert_market(&mut self, market: &Market) -> Result<()> {
        query(
            "INSERT INTO markets (\
            id,\
            prediction,\
            status,\
            total_pool,\
            bet_count,\
            odds_before,\
            odds_exact,\
            odds_after,\
            created_at,\
            updated_at) \
            VALUES (?,?,?,?,?,?,?,?,?,?)",
        )
        .bind(market.id.to_string())
        .bind(market.prediction.to_string())
        .bind(market.status.to_string())
        .bind(to_cents(market.total_pool)?)
        .bind(i64::from(market.bet_count))
        .bind(to_cents(market.odds.before)?)
        .bind(to_cents(market.odds.exact)?)
        .bind(to_cents(market.odds.after)?)
        .bind(market.created_at.timestamp_micros())
        .bind(market.updated_at.timestamp_micros())
        .execute(&mut *self.tx)
        .await
        .with_context(|| format!("couldn't insert market {}", market.id))?;
        Ok(())
    }
    async fn update_market(&mut self, market: &Market) -> Result<()> {
        let updated = query(
            "UPDATE markets SET \
            status = ?, \
            total_pool = ?, \
            bet_count = ?, \
            odds_before = ?, \
            odds_exact = ?, \
            odds_after = ?, \
            updated_at = ? \
            WHERE id = ?",
        )
        .bind(market.status.to_string())
        .bind(to_cents(market.total_pool)?)
        .bind(i64::from(market.bet_count))
        .bind(to_cents(market.odds.before)?)
        .bind(to_cents(market.odds.exact)?)
        .bind(to_cents(market.odds.after)?)
        .bind(market.updated_at.timestamp_micros())
        .bind(market.id.to_string())
        .execute(&mut *self.tx)
        .await
        .with_context(|| format!("couldn't update market {}", market.id))?
        .rows_affected();
        if updated != 1 {
            bail!("market {} vanished during update", market.id);
        }
        Ok(())
    }
    async fn insert_bet(&mut self, bet: &Bet) -> Result<()> {
        query(
            "INSERT INTO bets ( \
            id, \
            market, \
            bettor, \
            bet_type, \
            amount, \
            potential_payout, \
            status, \
            placed_at) \
            VALUES (?,?,?,?,?,?,?,?)",
        )
        .bind(bet.id.to_string())
        .bind(bet.market.to_string())
        .bind(bet.bettor.to_string())
        .bind(bet.bet_type.to_string())
        .bind(to_cents(bet.amount)?)
        .bind(to_cents(bet.potential_payout)?)
        .bind(bet.status.to_string())
        .bind(bet.placed_at.timestamp_micros())
        .execute(&mut *self.tx)
        .await
        .with_context(|| format!("couldn't insert bet {}", bet.id))?;
        trace!("Inserted bet {} into market {}", bet.id, bet.market);
        Ok(())
    }
    async fn get_active_bets(&mut self, market: &MarketId) -> Result<Vec<Bet>> {
        let sql = format!(
            "SELECT {} FROM bets WHERE market = ? AND status = 'active' \
            ORDER BY placed_at ASC, rowid ASC",
            BET_COLUMNS
        );
        let rows = query(&sql)
            .bind(market.to_string())
            .fetch_all(&mut *self.tx)
            .await
            .with_context(|| format!("couldn't get active bets of market {}", market))?;
        rows.iter().map(bet_from_row).collect()
    }
    async fn set_bet_status(&mut self, bet: &BetId, status: BetStatus) -> Result<()> {
        query("UPDATE bets SET status = ? WHERE id = ?")
            .bind(status.to_string())
            .bind(bet.to_string())
            .execute(&mut *self.tx)
            .await
            .with_context(|| format!("couldn't set status of bet {}", bet))?;
        Ok(())
    }
    async fn get_stakes(&mut self, market: &MarketId) -> Result<Stakes> {
        let rows = query(
            "SELECT bet_type, SUM(amount) AS stake, COUNT(*) AS bets \
            FROM bets WHERE market = ? GROUP BY bet_type",
        )
        .bind(market.to_string())
        .fetch_all(&mut *self.tx)
        .await
        .with_context(|| format!("couldn't sum stakes of market {}", market))?;
        let mut stakes = Stakes::default();
        for row in rows {
            let bet_type = BetType::from_str(row.try_get("bet_type")?)?;
            let stake = from_cents(row.try_get("stake")?);
            match bet_type {
                BetType::Before => stakes.before = stake,
                BetType::Exact => stakes.exact = stake,
                BetType::After => stakes.after = stake,
            }
            stakes.count += to_count(row.try_get("bets")?)?;
        }
        Ok(stakes)
    }
    async fn insert_settlement(&mut self, settlement: &Settlement) -> Result<()> {
        query(
            "INSERT INTO settlements (\
            market,\
            prediction,\
            actual_date,\
            cause,\
            source,\
            confidence,\
            winning_type,\
            resolved_at) \
            VALUES (?,?,?,?,?,?,?,?)",
        )
        .bind(settlement.market.to_string())
        .bind(settlement.prediction.to_string())
        .bind(settlement.actual_date.to_string())
        .bind(settlement.cause.clone())
        .bind(settlement.source.clone())
        .bind(settlement.confidence.to_string())
        .bind(settlement.winning_type.to_string())
        .bind(settlement.resolved_at.timestamp_micros())
        .execute(&mut *self.tx)
        .await
        .with_context(|| format!("couldn't insert settlement of {}", settlement.market))?;
        Ok(())
    }
    async fn commit(self: Box<Self>) -> Result<()> {
        let SQLiteTx { tx, writer } = *self;
        let committed = tx.commit().await.context("couldn't commit transaction");
        drop(writer);
        committed
    }
}

async fn fetch_market<'e, E>(executor: E, market: &MarketId) -> Result<Option<Market>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = format!("SELECT {} FROM markets WHERE id = ?", MARKET_COLUMNS);
    let row = executor
        .fetch_optional(query(&sql).bind(market.to_string()))
        .await
        .with_context(|| format!("couldn't get market {}", market))?;
    row.map(|row| market_from_row(&row)).transpose()
}
fn prediction_from_row(row: &SqliteRow) -> Result<Prediction> {
    Ok(Prediction {
        id: parse_id(row, "id")?,
        subject: parse_id(row, "subject")?,
        target_date: parse_date(row.try_get("target_date")?)?,
        cause: row.try_get("cause")?,
        confidence: from_cents(row.try_get("confidence")?),
        created_at: from_micros(row.try_get("created_at")?)?,
    })
}
fn market_from_row(row: &SqliteRow) -> Result<Market> {
    Ok(Market {
        id: parse_id(row, "id")?,
        prediction: parse_id(row, "prediction")?,
        status: MarketStatus::from_str(row.try_get("status")?)?,
        total_pool: from_cents(row.try_get("total_pool")?),
        bet_count: to_count(row.try_get("bet_count")?)?,
        odds: Odds {
            before: from_cents(row.try_get("odds_before")?),
            exact: from_cents(row.try_get("odds_exact")?),
            after: from_cents(row.try_get("odds_after")?),
        },
        created_at: from_micros(row.try_get("created_at")?)?,
        updated_at: from_micros(row.try_get("updated_at")?)?,
    })
}
fn bet_from_row(row: &SqliteRow) -> Result<Bet> {
    Ok(Bet {
        id: parse_id(row, "id")?,
        market: parse_id(row, "market")?,
        bettor: parse_id(row, "bettor")?,
        bet_type: BetType::from_str(row.try_get("bet_type")?)?,
        amount: from_cents(row.try_get("amount")?),
        potential_payout: from_cents(row.try_get("potential_payout")?),
        status: BetStatus::from_str(row.try_get("status")?)?,
        placed_at: from_micros(row.try_get("placed_at")?)?,
    })
}
fn settlement_from_row(row: &SqliteRow) -> Result<Settlement> {
    let confidence: String = row.try_get("confidence")?;
    Ok(Settlement {
        market: parse_id(row, "market")?,
        prediction: parse_id(row, "prediction")?,
        actual_date: parse_date(row.try_get("actual_date")?)?,
        cause: row.try_get("cause")?,
        source: row.try_get("source")?,
        confidence: Decimal::from_str(&confidence)
            .with_context(|| format!("bad confidence {} in settlements", confidence))?,
        winning_type: BetType::from_str(row.try_get("winning_type")?)?,
        resolved_at: from_micros(row.try_get("resolved_at")?)?,
    })
}
fn parse_id(row: &SqliteRow, column: &str) -> Result<Uuid> {
    let raw: &str = row.try_get(column)?;
    Uuid::parse_str(raw).with_context(|| format!("bad id {} in column {}", raw, column))
}
fn parse_date(raw: &str) -> Result<NaiveDate> {
    NaiveDate::from_str(raw).with_context(|| format!("bad date {}", raw))
}
/// Money, odds and confidence are stored as integer hundredths.
fn to_cents(value: Decimal) -> Result<i64> {
    let cents = value * Decimal::ONE_HUNDRED;
    if !cents.fract().is_zero() {
        bail!("{} has more than two decimal places", value);
    }
    cents
        .to_i64()
        .ok_or_else(|| anyhow!("{} does not fit the storage format", value))
}
fn from_cents(cents: i64) -> Decimal {
    Decimal::new(cents, 2)
}
fn to_count(count: i64) -> Result<u32> {
    u32::try_from(count).with_context(|| format!("bad count {}", count))
}
fn from_micros(micros: i64) -> Result<DateTime<Utc>> {
    let nanos = (micros.rem_euclid(1_000_000) * 1_000) as u32;
    Utc.timestamp_opt(micros.div_euclid(1_000_000), nanos)
        .single()
        .ok_or_else(|| anyhow!("bad timestamp {}", micros))
}
