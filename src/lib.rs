pub mod commands;
pub mod db;
pub mod events;
pub mod geometry;
pub mod models;
pub mod occupancy;
pub mod render;
pub mod services;
pub mod settings;
pub mod theme;
mod utils;
pub mod zones;

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};

use commands::{handle_line, AppState};
use db::Database;
use events::StdoutEventSink;
use settings::SettingsStore;

fn data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("PARKZONE_DATA_DIR") {
        return PathBuf::from(dir);
    }
    match std::env::var_os("HOME") {
        Some(home) => PathBuf::from(home).join(".parkzone"),
        None => PathBuf::from("parkzone-data"),
    }
}

fn simulate_enabled() -> bool {
    std::env::var("PARKZONE_SIMULATE")
        .map(|value| matches!(value.trim(), "1" | "true" | "TRUE" | "yes"))
        .unwrap_or(false)
}

fn write_line(value: &serde_json::Value) {
    let stdout = std::io::stdout();
    let mut handle = stdout.lock();
    if let Err(err) = writeln!(handle, "{value}").and_then(|_| handle.flush()) {
        log::error!("failed to write response: {err}");
    }
}

async fn serve(state: AppState) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("failed to read stdin")? {
        if line.trim().is_empty() {
            continue;
        }
        let reply = handle_line(&state, &line).await;
        write_line(&reply);
    }
    log::info!("stdin closed, shutting down");
    Ok(())
}

pub fn run() -> Result<()> {
    // Reads RUST_LOG on top of the Info default. Logs go to stderr so stdout
    // stays a clean JSON stream.
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    log::info!("parkzone starting up...");

    let app_data_dir = data_dir();
    std::fs::create_dir_all(&app_data_dir).with_context(|| {
        format!("failed to create data directory {}", app_data_dir.display())
    })?;

    let database = Database::new(app_data_dir.join("parkzone.sqlite3"))?;
    let settings_store = SettingsStore::new(app_data_dir.join("settings.json"))?;

    let runtime = tokio::runtime::Runtime::new().context("failed to start tokio runtime")?;
    runtime.block_on(async move {
        let state = AppState::new(
            database,
            settings_store,
            Arc::new(StdoutEventSink),
            simulate_enabled(),
        );
        serve(state).await
    })
}
