// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Nutrilog Sync API Server
//!
//! Connects Nutrilog accounts to Fitbit and syncs daily step counts
//! into the activity store.

use nutrilog_sync::{
    config::Config,
    db::PostgrestDb,
    services::{FitbitClient, FitbitService, SyncService},
    AppState,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging
    init_logging();

    // Load configuration from environment
    let config = Config::from_env().expect("Failed to load configuration");
    tracing::info!(port = config.port, "Starting Nutrilog Sync API");

    // Initialize the Supabase REST client
    let db = PostgrestDb::new(&config.supabase_url, &config.supabase_service_role_key);

    // Initialize the Fitbit services
    let fitbit = FitbitService::new(
        FitbitClient::new(config.fitbit_client_id.clone()),
        db.clone(),
    );
    let sync = SyncService::new(db.clone(), fitbit.clone());

    // Build shared state
    let state = Arc::new(AppState {
        config: config.clone(),
        db,
        fitbit,
        sync,
    });

    // Build router
    let app = nutrilog_sync::routes::create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Initialize structured JSON logging.
fn init_logging() {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("nutrilog_sync=debug".parse().unwrap())
                .add_directive("info".parse().unwrap()),
        )
        .with(format)
        .init();
}
