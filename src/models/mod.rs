// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod glucose;
pub mod token;

pub use glucose::{DataSource, GlucoseReading, GlucoseWindow, ResolvedReadings, Trend};
pub use token::TokenRecord;
