// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! SpaceHub Environment - standalone Space lifecycle runtime.
//!
//! Runs the core services against in-memory collaborators until Ctrl-C.

use tracing::{info, warn};

use spacehub_environment::config::Config;
use spacehub_environment::runtime::SpaceRuntime;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "spacehub_environment=info,spacehub_core=info".into()),
        )
        .init();

    // Load .env file if present
    if let Err(e) = dotenvy::dotenv() {
        warn!("No .env file loaded: {}", e);
    }

    let config = Config::from_env()?;

    info!(
        npu_quota = config.standalone_npu_quota,
        survival_secs = config.standalone_survival_time.as_secs(),
        boot_file = %config.core.space.boot_file_name,
        "Starting SpaceHub Environment"
    );

    let runtime = SpaceRuntime::standalone(&config).build()?.start().await?;

    info!("SpaceHub Environment ready");

    // Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received");

    runtime.shutdown().await?;

    info!("SpaceHub Environment shut down");

    Ok(())
}
