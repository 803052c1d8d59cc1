//! memory_store.rs
//!
//! In-process trade store with the same semantics as the Postgres one. Backs --dry-run and the
//! tests; fail_next() makes the next mutations fail without touching the rows.

use bigdecimal::BigDecimal;
use chrono::{Duration, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use crate::db::TradeStore;
use crate::error::StoreError;
use crate::trade_struct::StockTrade;

pub struct MemoryTradeStore {
    rows: Vec<StockTrade>,
    rng: StdRng,
    failures_pending: usize,
}

impl MemoryTradeStore {
    pub fn new() -> MemoryTradeStore {
        MemoryTradeStore::with_rng(StdRng::from_entropy())
    }

    pub fn seeded(seed: u64) -> MemoryTradeStore {
        MemoryTradeStore::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(rng: StdRng) -> MemoryTradeStore {
        MemoryTradeStore { rows: vec![], rng, failures_pending: 0 }
    }

    /// the next `n` mutating calls return StoreError::Operation
    pub fn fail_next(&mut self, n: usize) {
        self.failures_pending = n;
    }

    pub fn rows(&self) -> &[StockTrade] {
        &self.rows
    }

    pub fn get(&self, trade_id: &str) -> Option<&StockTrade> {
        self.rows.iter().find(|t| t.trade_id == trade_id)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn check_failure(&mut self) -> Result<(), StoreError> {
        if self.failures_pending > 0 {
            self.failures_pending -= 1;
            return Err(StoreError::Operation("injected failure".to_string()));
        }
        Ok(())
    }

    fn random_index(&mut self) -> Option<usize> {
        if self.rows.is_empty() {
            None
        } else {
            Some(self.rng.gen_range(0..self.rows.len()))
        }
    }

    fn check_row(&self, trade: &StockTrade) -> Result<(), StoreError> {
        if self.get(&trade.trade_id).is_some() {
            return Err(StoreError::Operation(format!("duplicate trade_id {}", trade.trade_id)));
        }
        Ok(())
    }
}

impl Default for MemoryTradeStore {
    fn default() -> Self {
        MemoryTradeStore::new()
    }
}

impl TradeStore for MemoryTradeStore {
    async fn insert(&mut self, trade: &StockTrade) -> Result<StockTrade, StoreError> {
        self.check_failure()?;
        self.check_row(trade)?;
        self.rows.push(trade.clone());
        Ok(trade.clone())
    }

    async fn update_random_existing(&mut self, new_price: &BigDecimal) -> Result<Option<String>, StoreError> {
        self.check_failure()?;
        let Some(index) = self.random_index() else {
            return Ok(None);
        };

        let trade = &mut self.rows[index];
        let now = Utc::now();
        trade.stock_price = new_price.clone();
        trade.stock_purchase_choice = trade.stock_purchase_choice.flipped();
        trade.updated_at = if now > trade.updated_at { now } else { trade.updated_at + Duration::microseconds(1) };
        Ok(Some(trade.trade_id.clone()))
    }

    async fn delete_random_existing(&mut self) -> Result<Option<String>, StoreError> {
        self.check_failure()?;
        match self.random_index() {
            Some(index) => Ok(Some(self.rows.swap_remove(index).trade_id)),
            None => Ok(None),
        }
    }

    async fn insert_many(&mut self, trades: &[StockTrade]) -> Result<usize, StoreError> {
        self.check_failure()?;
        for (i, trade) in trades.iter().enumerate() {
            self.check_row(trade)?;
            if trades[..i].iter().any(|t| t.trade_id == trade.trade_id) {
                return Err(StoreError::Operation(format!("duplicate trade_id {}", trade.trade_id)));
            }
        }
        self.rows.extend_from_slice(trades);
        Ok(trades.len())
    }

    async fn count(&mut self) -> Result<i64, StoreError> {
        Ok(self.rows.len() as i64)
    }
}
