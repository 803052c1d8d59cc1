//! trade_struct.rs
//!
//! the stock_trades row and the random values the generator fills it with

use std::str::FromStr;
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use rand::distributions::{Distribution, Standard};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgRow;
use sqlx::{FromRow, Row};
use strum::{Display, EnumString};
use uuid::Uuid;

pub const STOCK_NAMES: [&str; 5] = ["AAPL", "GOOG", "MSFT", "AMZN", "TSLA"];

// prices are drawn as whole cents so they always carry exactly two decimal places
pub const PRICE_MIN_CENTS: i64 = 5_000;
pub const PRICE_MAX_CENTS: i64 = 50_000;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "UPPERCASE")]
pub enum TradeSide {
    #[serde(rename = "BUY")]
    Buy,
    #[serde(rename = "SELL")]
    Sell,
}

impl TradeSide {
    pub fn flipped(self) -> TradeSide {
        match self {
            TradeSide::Buy => TradeSide::Sell,
            TradeSide::Sell => TradeSide::Buy,
        }
    }
}

impl Distribution<TradeSide> for Standard {
    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> TradeSide {
        if rng.gen::<bool>() { TradeSide::Buy } else { TradeSide::Sell }
    }
}

/// One row of stock_trades
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct StockTrade {
    pub trade_id: String,
    pub stock_name: String,
    pub stock_price: BigDecimal,
    pub stock_purchase_choice: TradeSide,
    pub trader_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StockTrade {
    /// A brand new trade with fresh ids, a random symbol, price and side
    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> StockTrade {
        let now = Utc::now();
        StockTrade {
            trade_id: Uuid::new_v4().to_string(),
            stock_name: random_stock_name(rng).to_string(),
            stock_price: random_price(rng),
            stock_purchase_choice: rng.gen(),
            trader_id: Uuid::new_v4().to_string(),
            created_at: now,
            updated_at: now,
        }
    }
}

// the side is stored as plain text guarded by a CHECK constraint, so decode it by hand rather
// than through a postgres enum type
impl<'r> FromRow<'r, PgRow> for StockTrade {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        let side: String = row.try_get("stock_purchase_choice")?;
        let stock_purchase_choice = TradeSide::from_str(&side).map_err(|e| sqlx::Error::ColumnDecode {
            index: "stock_purchase_choice".to_string(),
            source: Box::new(e),
        })?;

        Ok(StockTrade {
            trade_id: row.try_get("trade_id")?,
            stock_name: row.try_get("stock_name")?,
            stock_price: row.try_get("stock_price")?,
            stock_purchase_choice,
            trader_id: row.try_get("trader_id")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

pub fn random_stock_name<R: Rng + ?Sized>(rng: &mut R) -> &'static str {
    // STOCK_NAMES is never empty
    STOCK_NAMES.choose(rng).copied().unwrap_or(STOCK_NAMES[0])
}

/// Uniform price in [50.00, 500.00] with a scale of exactly 2
pub fn random_price<R: Rng + ?Sized>(rng: &mut R) -> BigDecimal {
    let cents = rng.gen_range(PRICE_MIN_CENTS..=PRICE_MAX_CENTS);
    (BigDecimal::from(cents) / BigDecimal::from(100)).with_scale(2)
}

pub fn price_in_range(price: &BigDecimal) -> bool {
    let (_, scale) = price.as_bigint_and_exponent();
    scale == 2 && *price >= BigDecimal::from(50) && *price <= BigDecimal::from(500)
}
