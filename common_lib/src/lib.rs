//! common_lib/src/lib.rs

pub mod db;
pub mod error;
pub mod event_generator;
pub mod init;
pub mod loader;
pub mod memory_store;
pub mod settings;
pub mod sqlx_pool;
pub mod trade_struct;
