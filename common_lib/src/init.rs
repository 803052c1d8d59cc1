//! init.rs
//!
//! load .env and start tracing; call once at the top of main

use std::path::Path;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// `manifest_dir` is the calling crate's CARGO_MANIFEST_DIR; a .env there wins over one in the
/// working directory
pub fn init(manifest_dir: &str) {
    let env_path = Path::new(manifest_dir).join(".env");
    let env_loaded = match dotenvy::from_path(&env_path) {
        Ok(_) => Some(env_path.display().to_string()),
        Err(_) => dotenvy::dotenv().ok().map(|p| p.display().to_string()),
    };

    let _ = tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn")))
        .with(tracing_subscriber::fmt::layer())
        .try_init();

    match env_loaded {
        Some(path) => tracing::debug!("[init] loaded {}", path),
        None => tracing::debug!("[init] no .env found, using the process environment"),
    }
}
