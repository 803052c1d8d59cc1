//! db.rs
//!
//! The trade store: the three mutations the generator issues plus the bulk insert used by the
//! loader. Every call runs in its own transaction; dropping the transaction on an error rolls it
//! back, so a failed call leaves the table as it was.

use bigdecimal::BigDecimal;
use sqlx::PgPool;
use crate::error::StoreError;
use crate::settings::Settings;
use crate::sqlx_pool::create_sqlx_pg_pool;
use crate::trade_struct::StockTrade;

/// What the event generator needs from a place that holds trades
///
/// The generator is the only mutator of its store, hence `&mut self` everywhere.
#[allow(async_fn_in_trait)]
pub trait TradeStore {
    /// persist a new trade and return it as committed
    async fn insert(&mut self, trade: &StockTrade) -> Result<StockTrade, StoreError>;

    /// pick one existing trade at random, give it `new_price`, flip its side and refresh
    /// updated_at; Ok(None) when there is nothing to update
    async fn update_random_existing(&mut self, new_price: &BigDecimal) -> Result<Option<String>, StoreError>;

    /// pick one existing trade at random and remove it; Ok(None) when the store is empty
    async fn delete_random_existing(&mut self) -> Result<Option<String>, StoreError>;

    /// all or nothing
    async fn insert_many(&mut self, trades: &[StockTrade]) -> Result<usize, StoreError>;

    async fn count(&mut self) -> Result<i64, StoreError>;
}

const CREATE_TABLE: &str = r#"
    create table if not exists stock_trades (
        trade_id varchar primary key,
        stock_name varchar not null,
        stock_price numeric(12, 2) not null,
        stock_purchase_choice varchar not null check (stock_purchase_choice in ('BUY', 'SELL')),
        trader_id varchar not null,
        created_at timestamptz not null default now(),
        updated_at timestamptz not null default now()
    )
"#;

const INSERT_TRADE: &str = r#"
    insert into stock_trades
        (trade_id, stock_name, stock_price, stock_purchase_choice, trader_id, created_at, updated_at)
    values ($1, $2, $3, $4, $5, $6, $7)
    returning trade_id, stock_name, stock_price, stock_purchase_choice, trader_id, created_at, updated_at
"#;

// selection and mutation are one statement so two producers racing for the same row can't both
// touch it; the loser's update matches zero rows and comes back empty
const UPDATE_RANDOM_TRADE: &str = r#"
    with random_trade as (
        select trade_id from stock_trades order by random() limit 1
    )
    update stock_trades
    set stock_price = $1,
        stock_purchase_choice = case stock_purchase_choice when 'BUY' then 'SELL' else 'BUY' end,
        updated_at = greatest(now(), stock_trades.updated_at + interval '1 microsecond')
    from random_trade
    where stock_trades.trade_id = random_trade.trade_id
    returning stock_trades.trade_id
"#;

const DELETE_RANDOM_TRADE: &str = r#"
    with to_delete as (
        select trade_id from stock_trades order by random() limit 1
    )
    delete from stock_trades
    using to_delete
    where stock_trades.trade_id = to_delete.trade_id
    returning stock_trades.trade_id
"#;

/// Trade store backed by a sqlx Postgres pool
pub struct PgTradeStore {
    pool: PgPool,
}

impl PgTradeStore {
    pub fn new(pool: PgPool) -> PgTradeStore {
        PgTradeStore { pool }
    }

    /// open the pool; any failure here is a connectivity error
    pub async fn connect(settings: &Settings) -> Result<PgTradeStore, StoreError> {
        let pool = create_sqlx_pg_pool(settings).await?;
        Ok(PgTradeStore::new(pool))
    }

    /// create stock_trades if it isn't there yet
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        sqlx::query(CREATE_TABLE).execute(&self.pool).await?;
        tracing::debug!("[ensure_schema] stock_trades ready");
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

impl TradeStore for PgTradeStore {
    async fn insert(&mut self, trade: &StockTrade) -> Result<StockTrade, StoreError> {
        let mut tx = self.pool.begin().await?;
        let saved = insert_trade(trade, &mut tx).await?;
        tx.commit().await?;
        Ok(saved)
    }

    async fn update_random_existing(&mut self, new_price: &BigDecimal) -> Result<Option<String>, StoreError> {
        let mut tx = self.pool.begin().await?;
        let updated: Option<String> = sqlx::query_scalar(UPDATE_RANDOM_TRADE)
            .bind(new_price)
            .fetch_optional(&mut tx)
            .await?;
        tx.commit().await?;
        Ok(updated)
    }

    async fn delete_random_existing(&mut self) -> Result<Option<String>, StoreError> {
        let mut tx = self.pool.begin().await?;
        let deleted: Option<String> = sqlx::query_scalar(DELETE_RANDOM_TRADE)
            .fetch_optional(&mut tx)
            .await?;
        tx.commit().await?;
        Ok(deleted)
    }

    async fn insert_many(&mut self, trades: &[StockTrade]) -> Result<usize, StoreError> {
        let mut tx = self.pool.begin().await?;
        for trade in trades {
            insert_trade(trade, &mut tx).await?;
        }
        tx.commit().await?;
        Ok(trades.len())
    }

    async fn count(&mut self) -> Result<i64, StoreError> {
        let count: i64 = sqlx::query_scalar("select count(*) from stock_trades")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

async fn insert_trade(trade: &StockTrade, tx: &mut sqlx::Transaction<'_, sqlx::Postgres>) -> Result<StockTrade, sqlx::Error> {
    sqlx::query_as::<_, StockTrade>(INSERT_TRADE)
        .bind(&trade.trade_id)
        .bind(&trade.stock_name)
        .bind(&trade.stock_price)
        .bind(trade.stock_purchase_choice.to_string())
        .bind(&trade.trader_id)
        .bind(trade.created_at)
        .bind(trade.updated_at)
        .fetch_one(tx)
        .await
}
