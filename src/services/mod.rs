// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod fitbit;
pub mod pkce;
pub mod sync;

pub use fitbit::{FitbitClient, FitbitService};
pub use sync::{SyncOutcome, SyncService};
