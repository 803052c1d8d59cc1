//! loader.rs
//!
//! bulk-load random trades in a single transaction, e.g. to seed stock_trades before starting the
//! generator

use rand::Rng;
use crate::db::TradeStore;
use crate::error::StoreError;
use crate::trade_struct::StockTrade;

/// insert `record_count` random trades; all of them land or none do
pub async fn load_trades<S: TradeStore, R: Rng + ?Sized>(store: &mut S, rng: &mut R, record_count: usize) -> Result<usize, StoreError> {
    let trades: Vec<StockTrade> = (0..record_count).map(|_| StockTrade::random(rng)).collect();
    for trade in trades.iter() {
        tracing::info!("Inserting trade {} {}", &trade.trade_id, &trade.stock_name);
    }

    match store.insert_many(&trades).await {
        Ok(inserted) => {
            tracing::info!("Inserted {} trades.", inserted);
            Ok(inserted)
        }
        Err(e) => {
            tracing::error!("[load_trades] load of {} trades rolled back: {}", record_count, &e);
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory_store::MemoryTradeStore;
    use crate::trade_struct::price_in_range;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[tokio::test]
    async fn loads_the_requested_number_of_trades() {
        let mut store = MemoryTradeStore::seeded(1);
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(load_trades(&mut store, &mut rng, 25).await.unwrap(), 25);
        assert_eq!(store.count().await.unwrap(), 25);
        assert!(store.rows().iter().all(|t| price_in_range(&t.stock_price)));
    }

    #[tokio::test]
    async fn zero_records_is_fine() {
        let mut store = MemoryTradeStore::seeded(2);
        let mut rng = StdRng::seed_from_u64(2);
        assert_eq!(load_trades(&mut store, &mut rng, 0).await.unwrap(), 0);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn failed_load_inserts_nothing() {
        let mut store = MemoryTradeStore::seeded(3);
        let mut rng = StdRng::seed_from_u64(3);
        store.fail_next(1);
        assert!(load_trades(&mut store, &mut rng, 10).await.is_err());
        assert!(store.is_empty());
    }
}
