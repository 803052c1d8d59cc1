//! event_generator.rs
//!
//! Continuously generate random stock trade events (insert, update, delete) against a trade store.
//!
//! Each tick picks one operation uniformly at random, runs it in its own transaction, logs what
//! happened and then sleeps 1/rate seconds. A failed tick is logged and dropped; it is never
//! retried and never stops the loop. The loop only ends when the shutdown future resolves, and
//! that is only looked at between ticks, so an in-flight tick always runs to completion.

use std::future::Future;
use std::time::Duration;
use rand::distributions::{Distribution, Standard};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use strum::Display;
use crate::db::TradeStore;
use crate::error::{InvalidRate, StoreError};
use crate::trade_struct::{random_price, StockTrade};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "UPPERCASE")]
pub enum Operation {
    Insert,
    Update,
    Delete,
}

impl Distribution<Operation> for Standard {
    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Operation {
        match rng.gen_range(0..3) {
            0 => Operation::Insert,
            1 => Operation::Update,
            _ => Operation::Delete,
        }
    }
}

/// What a single tick did
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    Inserted(String),
    Updated(String),
    Deleted(String),
    /// update/delete found no row
    Skipped(Operation),
    Failed(Operation, StoreError),
}

impl TickOutcome {
    pub fn operation(&self) -> Operation {
        match self {
            TickOutcome::Inserted(_) => Operation::Insert,
            TickOutcome::Updated(_) => Operation::Update,
            TickOutcome::Deleted(_) => Operation::Delete,
            TickOutcome::Skipped(op) | TickOutcome::Failed(op, _) => *op,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, TickOutcome::Failed(..))
    }

    pub fn log(&self) {
        match self {
            TickOutcome::Inserted(id) => tracing::info!("Inserted: {}", id),
            TickOutcome::Updated(id) => tracing::info!("Updated: {}", id),
            TickOutcome::Deleted(id) => tracing::info!("Deleted: {}", id),
            TickOutcome::Skipped(Operation::Update) => tracing::info!("Update skipped: no record found"),
            TickOutcome::Skipped(Operation::Delete) => tracing::info!("Delete skipped: no record found"),
            TickOutcome::Skipped(Operation::Insert) => tracing::info!("Insert skipped"),
            TickOutcome::Failed(op, e) => tracing::error!("{} failed: {}", op, e),
        }
    }
}

/// Target operations per second, validated > 0 and finite, with an interval that fits a Duration
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rate {
    ops_per_sec: f64,
    interval: Duration,
}

impl Rate {
    pub fn new(ops_per_sec: f64) -> Result<Rate, InvalidRate> {
        if !(ops_per_sec.is_finite() && ops_per_sec > 0.0) {
            return Err(InvalidRate(ops_per_sec));
        }
        // tiny rates give a reciprocal too large for a Duration
        match Duration::try_from_secs_f64(1.0 / ops_per_sec) {
            Ok(interval) => Ok(Rate { ops_per_sec, interval }),
            Err(_) => Err(InvalidRate(ops_per_sec)),
        }
    }

    pub fn ops_per_sec(&self) -> f64 {
        self.ops_per_sec
    }

    /// sleep between ticks; tick execution time is not subtracted
    pub fn interval(&self) -> Duration {
        self.interval
    }
}

/// Tally of tick outcomes over one run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    pub inserted: u64,
    pub updated: u64,
    pub deleted: u64,
    pub skipped: u64,
    pub failed: u64,
}

impl RunStats {
    pub fn record(&mut self, outcome: &TickOutcome) {
        match outcome {
            TickOutcome::Inserted(_) => self.inserted += 1,
            TickOutcome::Updated(_) => self.updated += 1,
            TickOutcome::Deleted(_) => self.deleted += 1,
            TickOutcome::Skipped(_) => self.skipped += 1,
            TickOutcome::Failed(..) => self.failed += 1,
        }
    }

    pub fn ticks(&self) -> u64 {
        self.inserted + self.updated + self.deleted + self.skipped + self.failed
    }
}

/// Owns the store for its whole lifetime; one generator is the single mutator of its store.
pub struct EventGenerator<S: TradeStore, R: Rng = StdRng> {
    store: S,
    rng: R,
    rate: Rate,
}

impl<S: TradeStore> EventGenerator<S, StdRng> {
    pub fn new(store: S, rate: Rate) -> EventGenerator<S, StdRng> {
        EventGenerator::with_rng(store, rate, StdRng::from_entropy())
    }
}

impl<S: TradeStore, R: Rng> EventGenerator<S, R> {
    pub fn with_rng(store: S, rate: Rate, rng: R) -> EventGenerator<S, R> {
        EventGenerator { store, rng, rate }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    /// one random operation; never returns an error, failures come back as TickOutcome::Failed
    pub async fn tick(&mut self) -> TickOutcome {
        let op: Operation = self.rng.gen();
        self.execute(op).await
    }

    pub async fn execute(&mut self, op: Operation) -> TickOutcome {
        let result = match op {
            Operation::Insert => {
                let trade = StockTrade::random(&mut self.rng);
                self.store.insert(&trade).await.map(|saved| Some(saved.trade_id))
            }
            Operation::Update => {
                let price = random_price(&mut self.rng);
                self.store.update_random_existing(&price).await
            }
            Operation::Delete => self.store.delete_random_existing().await,
        };

        match (op, result) {
            (Operation::Insert, Ok(Some(id))) => TickOutcome::Inserted(id),
            (Operation::Update, Ok(Some(id))) => TickOutcome::Updated(id),
            (Operation::Delete, Ok(Some(id))) => TickOutcome::Deleted(id),
            (op, Ok(None)) => TickOutcome::Skipped(op),
            (op, Err(e)) => TickOutcome::Failed(op, e),
        }
    }

    /// Tick, log, sleep, until `shutdown` resolves.
    ///
    /// No catch-up: if a tick is slow the schedule just slides.
    pub async fn run<F>(&mut self, shutdown: F) -> RunStats
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let interval = self.rate.interval();
        let mut stats = RunStats::default();

        tracing::info!("[run] generating events at {} ops/sec", self.rate.ops_per_sec());

        loop {
            let outcome = self.tick().await;
            outcome.log();
            stats.record(&outcome);

            tokio::select! {
                biased;
                _ = &mut shutdown => break,
                _ = tokio::time::sleep(interval) => {}
            }
        }

        tracing::info!("Generator stopped by user.");
        tracing::info!(
            "[run] ticks: {}, inserted: {}, updated: {}, deleted: {}, skipped: {}, failed: {}",
            stats.ticks(), stats.inserted, stats.updated, stats.deleted, stats.skipped, stats.failed
        );
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory_store::MemoryTradeStore;
    use crate::trade_struct::price_in_range;
    use bigdecimal::BigDecimal;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use tokio::sync::oneshot;
    use tokio::time::Instant;

    /// memory store whose calls suspend for `delay` before touching the rows
    struct SlowStore {
        inner: MemoryTradeStore,
        delay: Duration,
        stop_sent: Arc<AtomicBool>,
        calls: usize,
        stopped_mid_call: bool,
    }

    impl SlowStore {
        async fn wait(&mut self) {
            self.calls += 1;
            tokio::time::sleep(self.delay).await;
            if self.stop_sent.load(Ordering::SeqCst) {
                self.stopped_mid_call = true;
            }
        }
    }

    impl TradeStore for SlowStore {
        async fn insert(&mut self, trade: &StockTrade) -> Result<StockTrade, StoreError> {
            self.wait().await;
            self.inner.insert(trade).await
        }

        async fn update_random_existing(&mut self, new_price: &BigDecimal) -> Result<Option<String>, StoreError> {
            self.wait().await;
            self.inner.update_random_existing(new_price).await
        }

        async fn delete_random_existing(&mut self) -> Result<Option<String>, StoreError> {
            self.wait().await;
            self.inner.delete_random_existing().await
        }

        async fn insert_many(&mut self, trades: &[StockTrade]) -> Result<usize, StoreError> {
            self.wait().await;
            self.inner.insert_many(trades).await
        }

        async fn count(&mut self) -> Result<i64, StoreError> {
            self.inner.count().await
        }
    }

    fn generator(rate: f64, seed: u64) -> EventGenerator<MemoryTradeStore, StdRng> {
        EventGenerator::with_rng(
            MemoryTradeStore::seeded(seed),
            Rate::new(rate).unwrap(),
            StdRng::seed_from_u64(seed),
        )
    }

    #[test]
    fn rate_must_be_positive_and_finite() {
        assert!(Rate::new(0.0).is_err());
        assert!(Rate::new(-1.0).is_err());
        assert!(Rate::new(f64::NAN).is_err());
        assert!(Rate::new(f64::INFINITY).is_err());
        assert_eq!(Rate::new(1e-300).unwrap_err(), InvalidRate(1e-300));
        assert!(Rate::new(f64::MIN_POSITIVE).is_err());
        assert_eq!(Rate::new(0.25).unwrap().interval(), Duration::from_secs(4));
        assert_eq!(Rate::new(2.0).unwrap().interval(), Duration::from_millis(500));
        assert_eq!(Rate::new(0.5).unwrap().interval(), Duration::from_secs(2));
    }

    #[test]
    fn operations_are_drawn_uniformly() {
        let mut rng = StdRng::seed_from_u64(11);
        let mut counts = [0u32; 3];
        for _ in 0..30_000 {
            match rng.gen::<Operation>() {
                Operation::Insert => counts[0] += 1,
                Operation::Update => counts[1] += 1,
                Operation::Delete => counts[2] += 1,
            }
        }
        for c in counts {
            assert!((9_000..=11_000).contains(&c), "counts {:?}", counts);
        }
    }

    #[test]
    fn operation_names() {
        assert_eq!(Operation::Insert.to_string(), "INSERT");
        assert_eq!(Operation::Update.to_string(), "UPDATE");
        assert_eq!(Operation::Delete.to_string(), "DELETE");
    }

    #[tokio::test]
    async fn update_and_delete_skip_on_empty_store() {
        let mut gen = generator(1.0, 1);
        assert_eq!(gen.execute(Operation::Update).await, TickOutcome::Skipped(Operation::Update));
        assert_eq!(gen.execute(Operation::Delete).await, TickOutcome::Skipped(Operation::Delete));
        assert!(gen.store().is_empty());
    }

    #[tokio::test]
    async fn insert_produces_a_valid_row() {
        let mut gen = generator(1.0, 2);
        let TickOutcome::Inserted(id) = gen.execute(Operation::Insert).await else {
            panic!("expected an insert");
        };
        let row = gen.store().get(&id).unwrap();
        assert!(price_in_range(&row.stock_price));
        assert_eq!(gen.store().len(), 1);
    }

    #[tokio::test]
    async fn update_flips_side_with_a_new_price() {
        let mut gen = generator(1.0, 3);
        let TickOutcome::Inserted(id) = gen.execute(Operation::Insert).await else {
            panic!("expected an insert");
        };
        let before = gen.store().get(&id).unwrap().clone();

        assert_eq!(gen.execute(Operation::Update).await, TickOutcome::Updated(id.clone()));
        let after = gen.store().get(&id).unwrap();
        assert_eq!(after.stock_purchase_choice, before.stock_purchase_choice.flipped());
        assert!(price_in_range(&after.stock_price));
        assert!(after.updated_at > before.updated_at);
    }

    #[tokio::test]
    async fn delete_shrinks_the_store_by_one() {
        let mut gen = generator(1.0, 4);
        for _ in 0..3 {
            gen.execute(Operation::Insert).await;
        }
        assert!(matches!(gen.execute(Operation::Delete).await, TickOutcome::Deleted(_)));
        assert_eq!(gen.store().len(), 2);
    }

    #[tokio::test]
    async fn failed_tick_changes_nothing_and_the_next_one_works() {
        let mut gen = generator(1.0, 5);
        gen.execute(Operation::Insert).await;
        let before = gen.store().rows().to_vec();

        gen.store_mut().fail_next(1);
        let outcome = gen.execute(Operation::Delete).await;
        assert!(outcome.is_failure());
        assert_eq!(outcome.operation(), Operation::Delete);
        assert_eq!(gen.store().rows(), before.as_slice());

        assert!(matches!(gen.execute(Operation::Insert).await, TickOutcome::Inserted(_)));
        assert_eq!(gen.store().len(), 2);
    }

    #[tokio::test]
    async fn every_tick_has_exactly_one_outcome() {
        let mut gen = generator(2.0, 6);
        let mut stats = RunStats::default();
        for i in 0..300 {
            if i % 17 == 0 {
                gen.store_mut().fail_next(1);
            }
            let before = gen.store().len();
            let outcome = gen.tick().await;
            let after = gen.store().len();
            match &outcome {
                TickOutcome::Inserted(_) => assert_eq!(after, before + 1),
                TickOutcome::Deleted(_) => assert_eq!(after + 1, before),
                TickOutcome::Updated(_) | TickOutcome::Skipped(_) | TickOutcome::Failed(..) => assert_eq!(after, before),
            }
            stats.record(&outcome);
        }
        assert_eq!(stats.ticks(), 300);
        assert!(stats.failed >= 1);
    }

    #[tokio::test]
    async fn three_ticks_on_an_empty_store() {
        let mut gen = generator(2.0, 7);
        for _ in 0..3 {
            gen.tick().await;
        }
        assert!(gen.store().len() <= 3);
        for row in gen.store().rows() {
            assert!(price_in_range(&row.stock_price));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn interrupt_during_sleep_stops_without_another_tick() {
        let mut gen = generator(1.0, 8);
        let start = Instant::now();

        // ticks at 0s and 1s, interrupt lands while sleeping towards 2s
        let stats = gen.run(tokio::time::sleep(Duration::from_millis(1_250))).await;

        assert_eq!(stats.ticks(), 2);
        assert!(start.elapsed() >= Duration::from_millis(1_250));
        assert!(start.elapsed() < Duration::from_millis(2_000));
    }

    #[tokio::test(start_paused = true)]
    async fn elapsed_time_tracks_ticks_over_rate() {
        let mut gen = generator(2.0, 9);
        let start = Instant::now();

        let stats = gen.run(tokio::time::sleep(Duration::from_millis(4_750))).await;

        // one tick every 500ms from t=0: 0.0, 0.5, ..., 4.5
        assert_eq!(stats.ticks(), 10);
        let expected = Duration::from_secs_f64(stats.ticks() as f64 / 2.0);
        assert!(start.elapsed() >= expected - Duration::from_millis(500));
        assert!(start.elapsed() <= expected);
    }

    #[tokio::test(start_paused = true)]
    async fn failures_do_not_stop_the_loop() {
        let mut gen = generator(10.0, 10);
        gen.store_mut().fail_next(2);

        let stats = gen.run(tokio::time::sleep(Duration::from_millis(450))).await;

        assert_eq!(stats.ticks(), 5);
        assert_eq!(stats.failed, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn interrupt_during_a_tick_lets_it_finish() {
        let stop_sent = Arc::new(AtomicBool::new(false));
        let store = SlowStore {
            inner: MemoryTradeStore::seeded(12),
            delay: Duration::from_millis(200),
            stop_sent: Arc::clone(&stop_sent),
            calls: 0,
            stopped_mid_call: false,
        };
        let mut gen = EventGenerator::with_rng(store, Rate::new(1.0).unwrap(), StdRng::seed_from_u64(12));

        // the stop arrives 50ms into the first tick's 200ms store call
        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            stop_sent.store(true, Ordering::SeqCst);
            let _ = stop_tx.send(());
        });

        let start = Instant::now();
        let stats = gen.run(async move {
            let _ = stop_rx.await;
        }).await;

        assert_eq!(stats.ticks(), 1);
        assert_eq!(gen.store().calls, 1);
        assert!(gen.store().stopped_mid_call);
        assert!(start.elapsed() >= Duration::from_millis(200));
        assert!(start.elapsed() < Duration::from_secs(1));

        // the interrupted tick's change was kept: an insert left its row, update/delete found nothing
        assert_eq!(gen.store().inner.len() as u64, stats.inserted);

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(gen.store().calls, 1);
        assert_eq!(gen.store().inner.len() as u64, stats.inserted);
    }
}
