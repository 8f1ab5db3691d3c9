use anyhow::Result;
use api::*;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use serde::Serialize;

use crate::client::Client;

mod api;
mod client;

#[derive(Parser)]
struct Args {
    #[command(subcommand)]
    command: Commands,
    #[arg(short, long, default_value = "http://127.0.0.1:8081")]
    url: String,
}
#[derive(Subcommand)]
enum Commands {
    NewPrediction {
        #[arg(short, long)]
        subject: String,
        #[arg(short, long)]
        target_date: NaiveDate,
        #[arg(short, long)]
        cause: String,
        #[arg(long)]
        confidence: String,
        #[arg(short, long)]
        prediction: Option<String>,
    },
    GetPrediction {
        #[arg(short, long)]
        prediction: String,
    },
    CreateMarket {
        #[arg(short, long)]
        prediction: String,
    },
    OpenMarket {
        #[arg(short, long)]
        subject: String,
    },
    GetMarket {
        #[arg(short, long)]
        market: Option<String>,
        #[arg(short, long)]
        prediction: Option<String>,
    },
    GetMarkets,
    PlaceBet {
        #[arg(short, long)]
        market: String,
        #[arg(short, long)]
        bettor: String,
        #[arg(short = 't', long)]
        bet_type: String,
        #[arg(short, long)]
        amount: String,
    },
    GetBets {
        #[arg(short, long)]
        market: String,
        #[arg(short, long)]
        limit: Option<u32>,
        /// Continue a listing from a printed `placed_at:seq` cursor
        #[arg(long)]
        cursor: Option<BetCursor>,
        /// Follow the cursor until every bet is listed
        #[arg(long)]
        all: bool,
    },
    BettorBets {
        #[arg(short, long)]
        bettor: String,
    },
    Verify {
        #[arg(short, long)]
        prediction: String,
        #[arg(short = 'd', long)]
        actual_date: NaiveDate,
        #[arg(short, long)]
        cause: String,
        #[arg(short, long)]
        source: String,
        #[arg(long)]
        confidence: String,
    },
    PollVerification {
        #[arg(short, long)]
        prediction: String,
    },
    GetSettlement {
        #[arg(short, long)]
        prediction: String,
    },
    VerifyMarket {
        #[arg(short, long)]
        market: String,
    },
    Leaderboard {
        #[arg(short, long)]
        limit: Option<u32>,
    },
}

fn print(value: &impl Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Args::parse();
    let client = Client::new(cli.url);

    match cli.command {
        Commands::NewPrediction {
            subject,
            target_date,
            cause,
            confidence,
            prediction,
        } => {
            let request = NewPredictionRequest {
                prediction,
                subject,
                target_date,
                cause,
                confidence,
            };
            print(&client.new_prediction(request).await?)?;
        }
        Commands::GetPrediction { prediction } => {
            print(&client.get_prediction(prediction).await?)?;
        }
        Commands::CreateMarket { prediction } => {
            print(&client.create_market(prediction).await?)?;
        }
        Commands::OpenMarket { subject } => {
            print(&client.open_market(subject).await?)?;
        }
        Commands::GetMarket { market, prediction } => match (market, prediction) {
            (Some(market), _) => print(&client.get_market(market).await?)?,
            (None, Some(prediction)) => {
                print(&client.get_market_for_prediction(prediction).await?)?
            }
            (None, None) => anyhow::bail!("Pass --market or --prediction"),
        },
        Commands::GetMarkets => {
            print(&client.get_markets().await?)?;
        }
        Commands::PlaceBet {
            market,
            bettor,
            bet_type,
            amount,
        } => {
            let request = PlaceBetRequest {
                market,
                bettor,
                bet_type,
                amount,
            };
            print(&client.place_bet(request).await?)?;
        }
        Commands::GetBets {
            market,
            limit,
            mut cursor,
            all,
        } => loop {
            let page = client
                .get_bets(BetsRequest {
                    market: market.clone(),
                    cursor,
                    limit,
                })
                .await?;
            print(&page.bets)?;
            cursor = page.next;
            if !all || cursor.is_none() {
                if let Some(next) = cursor {
                    println!("next: {}", next);
                }
                break;
            }
        },
        Commands::BettorBets { bettor } => {
            print(&client.get_bettor_bets(bettor).await?)?;
        }
        Commands::Verify {
            prediction,
            actual_date,
            cause,
            source,
            confidence,
        } => {
            let request = VerificationRequest {
                prediction,
                actual_date,
                cause,
                source,
                confidence,
            };
            print(&client.submit_verification(request).await?)?;
        }
        Commands::PollVerification { prediction } => {
            print(&client.poll_verification(prediction).await?)?;
        }
        Commands::GetSettlement { prediction } => {
            print(&client.get_settlement(prediction).await?)?;
        }
        Commands::VerifyMarket { market } => {
            print(&client.verify_market(market).await?)?;
        }
        Commands::Leaderboard { limit } => {
            print(&client.get_leaderboard(limit).await?)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn bet_listing_resumes_from_printed_cursor() {
        let args = Args::try_parse_from([
            "cli",
            "get-bets",
            "--market",
            "market-1",
            "--cursor",
            "1750144109460123:42",
        ])
        .unwrap();
        let Commands::GetBets { cursor, all, .. } = args.command else {
            panic!("parsed into another command");
        };
        assert_eq!(
            cursor,
            Some(BetCursor {
                placed_at: 1_750_144_109_460_123,
                seq: 42,
            })
        );
        assert!(!all);
        assert!(Args::try_parse_from(["cli", "get-bets", "-m", "m", "--cursor", "soon"]).is_err());
    }
}
