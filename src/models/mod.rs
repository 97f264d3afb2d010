// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod activity;
pub mod connection;
pub mod profile;
pub mod session;
pub mod token;

pub use activity::DailyActivity;
pub use connection::Connection;
pub use profile::Profile;
pub use session::OAuthSession;
pub use token::TokenRecord;
