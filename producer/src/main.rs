//! main.rs
//!
//! stock_events: drive a stream of random trade inserts/updates/deletes into Postgres for the
//! CDC pipeline to pick up, or bulk-load a batch of trades.
#![forbid(unsafe_code)]

pub mod args;

use std::process::ExitCode;
use anyhow::Context;
use common_lib::db::{PgTradeStore, TradeStore};
use common_lib::event_generator::{EventGenerator, Rate};
use common_lib::init::init;
use common_lib::loader::load_trades;
use common_lib::memory_store::MemoryTradeStore;
use common_lib::settings::Settings;
use tokio::sync::oneshot;
use crate::args::{parse_args, ArgsError, Command};

/// main
fn main() -> ExitCode {
    init(env!("CARGO_MANIFEST_DIR"));

    let command = match parse_args(std::env::args().skip(1)) {
        Ok(command) => command,
        Err(ArgsError::Help) => {
            println!("{}", args::USAGE);
            return ExitCode::SUCCESS;
        }
        Err(e) => {
            eprintln!("{}\n\n{}", e, args::USAGE);
            return ExitCode::from(2);
        }
    };

    // single mutator; two workers leave room for the signal listener
    let tokio_runtime = match tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .thread_name("stock_events")
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            tracing::error!("[main] tokio runtime didn't start: {:?}", &e);
            return ExitCode::FAILURE;
        }
    };

    match tokio_runtime.block_on(run(command)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("[main] {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Command) -> anyhow::Result<()> {
    match command {
        Command::Generate { rate, dry_run: true } => {
            tracing::info!("[run] dry run, trades stay in memory");
            generate(MemoryTradeStore::new(), rate).await
        }
        Command::Generate { rate, dry_run: false } => generate(connect().await?, rate).await,
        Command::Load { record_count, dry_run: true } => {
            tracing::info!("[run] dry run, trades stay in memory");
            load(MemoryTradeStore::new(), record_count).await
        }
        Command::Load { record_count, dry_run: false } => load(connect().await?, record_count).await,
    }
}

/// settings, pool and table; any failure here ends the process before the first tick
async fn connect() -> anyhow::Result<PgTradeStore> {
    let settings = Settings::load().context("loading database settings")?;
    tracing::debug!("[connect] settings: {:?}", &settings);

    let store = PgTradeStore::connect(&settings).await.context("connecting to the trade store")?;
    store.ensure_schema().await.context("creating stock_trades")?;
    Ok(store)
}

async fn generate<S: TradeStore>(store: S, rate: Rate) -> anyhow::Result<()> {
    // listen for Ctrl-C from the start so a signal that lands mid-tick is seen at the next sleep
    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                let _ = stop_tx.send(());
            }
            Err(e) => {
                tracing::error!("[generate] can't listen for Ctrl-C: {:?}", &e);
                // hold the sender so the generator keeps running
                std::future::pending::<()>().await;
                drop(stop_tx);
            }
        }
    });

    let mut generator = EventGenerator::new(store, rate);
    generator.run(async move {
        let _ = stop_rx.await;
    }).await;
    Ok(())
}

async fn load<S: TradeStore>(mut store: S, record_count: usize) -> anyhow::Result<()> {
    let mut rng = rand::thread_rng();
    load_trades(&mut store, &mut rng, record_count).await.context("bulk load")?;
    Ok(())
}
