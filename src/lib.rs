// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Nutrilog-Sync: Fitbit integration backend for the Nutrilog app.
//!
//! This crate provides the API for connecting a user's Fitbit account
//! and syncing their daily step totals into the app's activity store.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;

use config::Config;
use db::PostgrestDb;
use services::{FitbitService, SyncService};

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub db: PostgrestDb,
    pub fitbit: FitbitService,
    pub sync: SyncService,
}
